// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Types for the tablet metadata crate.
//!
//! Identifiers, logical timestamps and the fixed-layout codec shared by every
//! persisted tablet metadata record.

use std::fmt;

use bytes::BufMut;
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod error;

pub use crate::codec::{Codec, Cursor, Encode};
pub use crate::error::CodecError;

/// Identifier of a log stream: the replication/ordering partition that groups
/// tablets under one consensus log.
#[derive(
    Arbitrary, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LsId(pub i64);

impl LsId {
    pub const INVALID: LsId = LsId(-1);

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for LsId {
    fn default() -> Self {
        LsId::INVALID
    }
}

impl fmt::Display for LsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ls{}", self.0)
    }
}

impl fmt::Debug for LsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LsId({})", self.0)
    }
}

/// Identifier of a tablet within its log stream.
#[derive(
    Arbitrary, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TabletId(pub u64);

impl TabletId {
    pub const INVALID: TabletId = TabletId(0);

    pub fn is_valid(&self) -> bool {
        *self != TabletId::INVALID
    }
}

impl fmt::Display for TabletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Debug for TabletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TabletId({})", self.0)
    }
}

/// A monotonic logical timestamp, used for versioning and recovery ordering.
#[derive(
    Arbitrary, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Scn(pub i64);

impl Scn {
    pub const INVALID: Scn = Scn(-1);
    /// The beginning of time.
    pub const MIN: Scn = Scn(0);
    /// Where a freshly created tablet starts its checkpoint watermarks.
    pub const INIT_CLOG_CHECKPOINT: Scn = Scn(1);

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for Scn {
    fn default() -> Self {
        Scn::INVALID
    }
}

impl fmt::Display for Scn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scn:{}", self.0)
    }
}

impl fmt::Debug for Scn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scn({})", self.0)
    }
}

/// The execution compatibility dialect a tablet's data was written under.
#[derive(
    Arbitrary,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum CompatMode {
    #[default]
    Invalid,
    MySql,
    Oracle,
}

impl CompatMode {
    pub fn is_valid(&self) -> bool {
        *self != CompatMode::Invalid
    }

    fn tag(&self) -> u8 {
        match self {
            CompatMode::Invalid => 0,
            CompatMode::MySql => 1,
            CompatMode::Oracle => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<CompatMode> {
        match tag {
            0 => Some(CompatMode::Invalid),
            1 => Some(CompatMode::MySql),
            2 => Some(CompatMode::Oracle),
            _ => None,
        }
    }
}

impl Encode for LsId {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i64(self.0);
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

impl Codec for LsId {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(LsId(buf.read_i64()?))
    }
}

impl Encode for TabletId {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u64(self.0);
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

impl Codec for TabletId {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(TabletId(buf.read_u64()?))
    }
}

impl Encode for Scn {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i64(self.0);
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

impl Codec for Scn {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(Scn(buf.read_i64()?))
    }
}

impl Encode for CompatMode {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u8(self.tag());
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl Codec for CompatMode {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        buf.read_tag("compat mode", CompatMode::from_tag)
    }
}
