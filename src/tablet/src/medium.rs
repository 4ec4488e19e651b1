// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Medium compaction history of a tablet.

use bytes::BufMut;
use mz_tablet_types::{Codec, CodecError, Cursor, Encode};
use proptest_derive::Arbitrary;
use serde::Serialize;

use crate::alloc::{AllocError, ArenaAllocator, ArenaCodec, ArenaVec};
use crate::error::TabletMetaError;

/// Smallest encoding of a [`MediumCompactionInfo`].
const MEDIUM_INFO_ENCODED_LEN: usize = 8 + 1 + 1 + 8 + 8;

#[derive(Arbitrary, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CompactionType {
    #[default]
    Medium,
    Major,
}

impl CompactionType {
    fn tag(&self) -> u8 {
        match self {
            CompactionType::Medium => 0,
            CompactionType::Major => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompactionType::Medium),
            1 => Some(CompactionType::Major),
            _ => None,
        }
    }
}

/// Why a medium compaction was scheduled.
#[derive(Arbitrary, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum MergeReason {
    #[default]
    None,
    TenantMajor,
    UserRequest,
    Rebuild,
}

impl MergeReason {
    fn tag(&self) -> u8 {
        match self {
            MergeReason::None => 0,
            MergeReason::TenantMajor => 1,
            MergeReason::UserRequest => 2,
            MergeReason::Rebuild => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MergeReason::None),
            1 => Some(MergeReason::TenantMajor),
            2 => Some(MergeReason::UserRequest),
            3 => Some(MergeReason::Rebuild),
            _ => None,
        }
    }
}

/// A scheduled medium compaction that has not finished yet.
#[derive(Arbitrary, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MediumCompactionInfo {
    pub medium_snapshot: i64,
    pub compaction_type: CompactionType,
    pub merge_reason: MergeReason,
    pub cluster_id: u64,
    pub data_version: u64,
}

impl Encode for MediumCompactionInfo {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i64(self.medium_snapshot);
        buf.put_u8(self.compaction_type.tag());
        buf.put_u8(self.merge_reason.tag());
        buf.put_u64(self.cluster_id);
        buf.put_u64(self.data_version);
    }

    fn encoded_len(&self) -> usize {
        MEDIUM_INFO_ENCODED_LEN
    }
}

impl Codec for MediumCompactionInfo {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(MediumCompactionInfo {
            medium_snapshot: buf.read_i64()?,
            compaction_type: buf.read_tag("compaction type", CompactionType::from_tag)?,
            merge_reason: buf.read_tag("merge reason", MergeReason::from_tag)?,
            cluster_id: buf.read_u64()?,
            data_version: buf.read_u64()?,
        })
    }
}

/// Pending medium compactions of a tablet, ordered by snapshot, plus a
/// record of the last one that finished.
///
/// Invariants:
/// - `last_medium_scn >= 0`
/// - `infos` are strictly increasing by `medium_snapshot`
/// - every pending snapshot is newer than `last_medium_scn`
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct MediumCompactionInfoList {
    infos: ArenaVec<MediumCompactionInfo>,
    pub last_compaction_type: CompactionType,
    pub last_medium_scn: i64,
    pub wait_check_flag: bool,
}

impl MediumCompactionInfoList {
    pub fn infos(&self) -> &[MediumCompactionInfo] {
        &self.infos
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.last_medium_scn >= 0
            && self
                .infos
                .first()
                .is_none_or(|first| first.medium_snapshot > self.last_medium_scn)
            && self
                .infos
                .windows(2)
                .all(|w| w[0].medium_snapshot < w[1].medium_snapshot)
    }

    /// The oldest compaction still to run.
    pub fn next_medium_snapshot(&self) -> Option<i64> {
        self.infos.first().map(|info| info.medium_snapshot)
    }

    /// Appends `info`, charging the grown list to `arena`.
    pub fn push_info(
        &mut self,
        info: MediumCompactionInfo,
        arena: &ArenaAllocator,
    ) -> Result<(), TabletMetaError> {
        let floor = self
            .infos
            .last()
            .map_or(self.last_medium_scn, |last| last.medium_snapshot);
        if info.medium_snapshot <= floor {
            return Err(TabletMetaError::invariant(format!(
                "medium snapshot {} is not after {}",
                info.medium_snapshot, floor
            )));
        }
        self.infos = self.infos.with_pushed(info, arena)?;
        Ok(())
    }
}

impl Encode for MediumCompactionInfoList {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u8(self.last_compaction_type.tag());
        buf.put_i64(self.last_medium_scn);
        self.wait_check_flag.encode(buf);
        self.infos.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        1 + 8 + 1 + self.infos.encoded_len()
    }
}

impl ArenaCodec for MediumCompactionInfoList {
    fn decode_in(buf: &mut Cursor<'_>, arena: &ArenaAllocator) -> Result<Self, TabletMetaError> {
        let list = MediumCompactionInfoList {
            last_compaction_type: buf.read_tag("compaction type", CompactionType::from_tag)?,
            last_medium_scn: buf.read_i64()?,
            wait_check_flag: buf.read_bool()?,
            infos: ArenaVec::decode_in(buf, arena, MEDIUM_INFO_ENCODED_LEN)?,
        };
        if !list.is_valid() {
            return Err(CodecError::corrupt(format!(
                "medium compaction infos out of order: {:?}",
                list
            ))
            .into());
        }
        Ok(list)
    }

    fn deep_copy(&self, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        Ok(MediumCompactionInfoList {
            infos: self.infos.deep_copy(arena)?,
            last_compaction_type: self.last_compaction_type,
            last_medium_scn: self.last_medium_scn,
            wait_check_flag: self.wait_check_flag,
        })
    }
}
