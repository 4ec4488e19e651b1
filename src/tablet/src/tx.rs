// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Transaction side-data of a tablet.

use bytes::BufMut;
use mz_tablet_types::{Codec, CodecError, Cursor, Encode, Scn};
use proptest_derive::Arbitrary;
use serde::Serialize;

/// Lifecycle state of a tablet as driven by the transaction that created or
/// dropped it.
#[derive(Arbitrary, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TabletStatus {
    Creating,
    Normal,
    Deleting,
    Deleted,
    /// Unknown, e.g. before any transaction touched the tablet.
    #[default]
    Max,
}

impl TabletStatus {
    fn tag(&self) -> u8 {
        match self {
            TabletStatus::Creating => 0,
            TabletStatus::Normal => 1,
            TabletStatus::Deleting => 2,
            TabletStatus::Deleted => 3,
            TabletStatus::Max => 4,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => TabletStatus::Creating,
            1 => TabletStatus::Normal,
            2 => TabletStatus::Deleting,
            3 => TabletStatus::Deleted,
            4 => TabletStatus::Max,
            _ => return None,
        })
    }
}

/// The latest transaction related multi-source data of a tablet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TabletTxData {
    /// Zero when no transaction is in flight.
    pub tx_id: i64,
    pub tx_scn: Scn,
    pub tablet_status: TabletStatus,
}

impl TabletTxData {
    pub fn is_in_tx(&self) -> bool {
        self.tx_id > 0
    }
}

impl Default for TabletTxData {
    fn default() -> Self {
        TabletTxData {
            tx_id: 0,
            tx_scn: Scn::INVALID,
            tablet_status: TabletStatus::Max,
        }
    }
}

impl Encode for TabletTxData {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i64(self.tx_id);
        self.tx_scn.encode(buf);
        buf.put_u8(self.tablet_status.tag());
    }

    fn encoded_len(&self) -> usize {
        8 + self.tx_scn.encoded_len() + 1
    }
}

impl Codec for TabletTxData {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(TabletTxData {
            tx_id: buf.read_i64()?,
            tx_scn: Scn::decode(buf)?,
            tablet_status: buf.read_tag("tablet status", TabletStatus::from_tag)?,
        })
    }
}
