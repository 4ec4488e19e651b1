// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Auto-increment sequence state carried by a tablet.

use std::collections::BTreeSet;

use bytes::BufMut;
use mz_tablet_types::{Codec, CodecError, Cursor, Encode};
use serde::Serialize;

use crate::alloc::{AllocError, ArenaAllocator, ArenaCodec, ArenaVec};
use crate::error::TabletMetaError;

/// The next value to hand out for one auto-increment column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AutoincInterval {
    pub column_id: u64,
    pub next_value: u64,
}

impl Encode for AutoincInterval {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u64(self.column_id);
        buf.put_u64(self.next_value);
    }

    fn encoded_len(&self) -> usize {
        16
    }
}

impl Codec for AutoincInterval {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(AutoincInterval {
            column_id: buf.read_u64()?,
            next_value: buf.read_u64()?,
        })
    }
}

/// Auto-increment state of a tablet: at most one interval per column.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct TabletAutoincSeq {
    intervals: ArenaVec<AutoincInterval>,
}

impl TabletAutoincSeq {
    pub fn new_in(
        intervals: &[AutoincInterval],
        arena: &ArenaAllocator,
    ) -> Result<Self, TabletMetaError> {
        let seq = TabletAutoincSeq {
            intervals: ArenaVec::from_slice_in(intervals, arena)?,
        };
        if !seq.is_valid() {
            return Err(TabletMetaError::invalid_argument(format!(
                "duplicate autoinc column in {:?}",
                intervals
            )));
        }
        Ok(seq)
    }

    pub fn intervals(&self) -> &[AutoincInterval] {
        &self.intervals
    }

    pub fn next_value(&self, column_id: u64) -> Option<u64> {
        self.intervals
            .iter()
            .find(|i| i.column_id == column_id)
            .map(|i| i.next_value)
    }

    /// Returns a copy where `column_id` hands out `next_value` next.
    ///
    /// Auto-increment values only move forward.
    pub fn with_next_value(
        &self,
        column_id: u64,
        next_value: u64,
        arena: &ArenaAllocator,
    ) -> Result<Self, TabletMetaError> {
        match self.next_value(column_id) {
            Some(current) if next_value < current => Err(TabletMetaError::invariant(format!(
                "autoinc for column {} would move back from {} to {}",
                column_id, current, next_value
            ))),
            Some(_) => {
                let intervals: Vec<_> = self
                    .intervals
                    .iter()
                    .map(|i| {
                        if i.column_id == column_id {
                            AutoincInterval {
                                column_id,
                                next_value,
                            }
                        } else {
                            *i
                        }
                    })
                    .collect();
                Ok(TabletAutoincSeq {
                    intervals: ArenaVec::from_vec_in(intervals, arena)?,
                })
            }
            None => Ok(TabletAutoincSeq {
                intervals: self.intervals.with_pushed(
                    AutoincInterval {
                        column_id,
                        next_value,
                    },
                    arena,
                )?,
            }),
        }
    }

    pub fn is_valid(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.intervals.iter().all(|i| seen.insert(i.column_id))
    }
}

impl Encode for TabletAutoincSeq {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        self.intervals.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        self.intervals.encoded_len()
    }
}

impl ArenaCodec for TabletAutoincSeq {
    fn decode_in(buf: &mut Cursor<'_>, arena: &ArenaAllocator) -> Result<Self, TabletMetaError> {
        let seq = TabletAutoincSeq {
            intervals: ArenaVec::decode_in(buf, arena, 16)?,
        };
        if !seq.is_valid() {
            return Err(CodecError::corrupt("duplicate autoinc column").into());
        }
        Ok(seq)
    }

    fn deep_copy(&self, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        Ok(TabletAutoincSeq {
            intervals: self.intervals.deep_copy(arena)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(column_id: u64, next_value: u64) -> AutoincInterval {
        AutoincInterval {
            column_id,
            next_value,
        }
    }

    #[test]
    fn rejects_duplicate_columns() {
        let arena = ArenaAllocator::new("autoinc");
        let err = TabletAutoincSeq::new_in(&[interval(16, 1), interval(16, 5)], &arena)
            .unwrap_err();
        assert!(matches!(err, TabletMetaError::InvalidArgument(_)));
    }

    #[test]
    fn next_value_only_moves_forward() {
        let arena = ArenaAllocator::new("autoinc");
        let seq = TabletAutoincSeq::new_in(&[interval(16, 10)], &arena).unwrap();

        let advanced = seq.with_next_value(16, 20, &arena).unwrap();
        assert_eq!(advanced.next_value(16), Some(20));
        assert_eq!(seq.next_value(16), Some(10));

        let added = seq.with_next_value(17, 1, &arena).unwrap();
        assert_eq!(added.intervals().len(), 2);
        assert_eq!(added.next_value(17), Some(1));

        let err = seq.with_next_value(16, 9, &arena).unwrap_err();
        assert!(matches!(err, TabletMetaError::InvariantViolation(_)));
    }

    #[test]
    fn decode_rejects_duplicates() {
        let arena = ArenaAllocator::new("autoinc");
        let seq = TabletAutoincSeq::new_in(&[interval(1, 1)], &arena).unwrap();
        let mut buf = Vec::new();
        // Hand-build a list with the same column twice.
        mz_tablet_types::codec::put_len(&mut buf, 2);
        seq.intervals()[0].encode(&mut buf);
        seq.intervals()[0].encode(&mut buf);
        let err = TabletAutoincSeq::decode_in(&mut Cursor::new(&buf), &arena).unwrap_err();
        assert!(matches!(err, TabletMetaError::Codec(CodecError::Corrupt(_))));
    }
}
