// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytes::BufMut;
use mz_tablet_types::{Codec, CodecError, Cursor, Encode};
use serde::Serialize;

const WITHOUT_MAJOR_SSTABLE: u64 = 1;

/// Storage-layout hints for a tablet's table store.
///
/// Encoded as a `u64` bit set; unknown bits are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TableStoreFlag {
    /// Whether the table store is expected to contain a major storage unit.
    /// Restore placeholders and tablets created by an in-flight DDL do not.
    pub with_major_sstable: bool,
}

impl TableStoreFlag {
    pub fn without_major_sstable() -> Self {
        TableStoreFlag {
            with_major_sstable: false,
        }
    }
}

impl Default for TableStoreFlag {
    fn default() -> Self {
        TableStoreFlag {
            with_major_sstable: true,
        }
    }
}

impl Encode for TableStoreFlag {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        let bits = if self.with_major_sstable {
            0
        } else {
            WITHOUT_MAJOR_SSTABLE
        };
        buf.put_u64(bits);
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

impl Codec for TableStoreFlag {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let bits = buf.read_u64()?;
        if bits & !WITHOUT_MAJOR_SSTABLE != 0 {
            return Err(CodecError::corrupt(format!(
                "unknown table store flag bits {:#x}",
                bits
            )));
        }
        Ok(TableStoreFlag {
            with_major_sstable: bits & WITHOUT_MAJOR_SSTABLE == 0,
        })
    }
}
