// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! DDL binding side-data: which tablets a tablet is linked to.

use bytes::BufMut;
use mz_tablet_types::{Codec, Cursor, Encode, TabletId};
use serde::Serialize;

use crate::alloc::{AllocError, ArenaAllocator, ArenaCodec, ArenaVec};
use crate::error::TabletMetaError;

/// DDL/binding data of a tablet, e.g. where lookups on a table being
/// redefined are redirected to.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TabletBindingInfo {
    /// Set once an offline DDL has swapped in the hidden tablets.
    pub redefined: bool,
    pub snapshot_version: i64,
    pub schema_version: i64,
    pub data_tablet_id: TabletId,
    pub lob_meta_tablet_id: TabletId,
    pub lob_piece_tablet_id: TabletId,
    hidden_tablet_ids: ArenaVec<TabletId>,
}

impl TabletBindingInfo {
    /// Binding data with no hidden tablets.
    pub fn new(
        data_tablet_id: TabletId,
        lob_meta_tablet_id: TabletId,
        lob_piece_tablet_id: TabletId,
    ) -> Self {
        TabletBindingInfo {
            redefined: false,
            snapshot_version: 0,
            schema_version: 0,
            data_tablet_id,
            lob_meta_tablet_id,
            lob_piece_tablet_id,
            hidden_tablet_ids: ArenaVec::new(),
        }
    }

    pub fn hidden_tablet_ids(&self) -> &[TabletId] {
        &self.hidden_tablet_ids
    }

    /// Replaces the hidden tablets, charging the list to `arena`.
    pub fn set_hidden_tablet_ids(
        &mut self,
        ids: &[TabletId],
        arena: &ArenaAllocator,
    ) -> Result<(), TabletMetaError> {
        if let Some(id) = ids.iter().find(|id| !id.is_valid()) {
            return Err(TabletMetaError::invalid_argument(format!(
                "invalid hidden tablet id {}",
                id
            )));
        }
        self.hidden_tablet_ids = ArenaVec::from_slice_in(ids, arena)?;
        Ok(())
    }
}

impl Default for TabletBindingInfo {
    fn default() -> Self {
        TabletBindingInfo::new(TabletId::INVALID, TabletId::INVALID, TabletId::INVALID)
    }
}

impl Encode for TabletBindingInfo {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        self.redefined.encode(buf);
        buf.put_i64(self.snapshot_version);
        buf.put_i64(self.schema_version);
        self.data_tablet_id.encode(buf);
        self.lob_meta_tablet_id.encode(buf);
        self.lob_piece_tablet_id.encode(buf);
        self.hidden_tablet_ids.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        1 + 8 + 8 + 8 * 3 + self.hidden_tablet_ids.encoded_len()
    }
}

impl ArenaCodec for TabletBindingInfo {
    fn decode_in(buf: &mut Cursor<'_>, arena: &ArenaAllocator) -> Result<Self, TabletMetaError> {
        Ok(TabletBindingInfo {
            redefined: buf.read_bool()?,
            snapshot_version: buf.read_i64()?,
            schema_version: buf.read_i64()?,
            data_tablet_id: TabletId::decode(buf)?,
            lob_meta_tablet_id: TabletId::decode(buf)?,
            lob_piece_tablet_id: TabletId::decode(buf)?,
            hidden_tablet_ids: ArenaVec::decode_in(buf, arena, 8)?,
        })
    }

    fn deep_copy(&self, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        Ok(TabletBindingInfo {
            redefined: self.redefined,
            snapshot_version: self.snapshot_version,
            schema_version: self.schema_version,
            data_tablet_id: self.data_tablet_id,
            lob_meta_tablet_id: self.lob_meta_tablet_id,
            lob_piece_tablet_id: self.lob_piece_tablet_id,
            hidden_tablet_ids: self.hidden_tablet_ids.deep_copy(arena)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_tablets_are_arena_backed() {
        let arena = ArenaAllocator::new("binding");
        let mut info = TabletBindingInfo::new(TabletId(1), TabletId(2), TabletId(3));
        info.set_hidden_tablet_ids(&[TabletId(10), TabletId(11)], &arena)
            .unwrap();
        assert_eq!(arena.used(), 16);

        let copy_arena = ArenaAllocator::new("copy");
        let copy = info.deep_copy(&copy_arena).unwrap();
        assert_eq!(copy, info);
        assert_eq!(copy_arena.used(), 16);

        let buf = info.encode_to_vec();
        assert_eq!(buf.len(), info.encoded_len());
        let decoded = TabletBindingInfo::decode_in(&mut Cursor::new(&buf), &arena).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn rejects_invalid_hidden_tablet() {
        let arena = ArenaAllocator::new("binding");
        let mut info = TabletBindingInfo::default();
        let err = info
            .set_hidden_tablet_ids(&[TabletId(5), TabletId::INVALID], &arena)
            .unwrap_err();
        assert!(matches!(err, TabletMetaError::InvalidArgument(_)));
        assert!(info.hidden_tablet_ids().is_empty());
        assert_eq!(arena.used(), 0);
    }
}
