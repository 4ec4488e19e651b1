// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! High-availability readiness of a tablet replica.

use bytes::BufMut;
use mz_tablet_types::{Codec, CodecError, Cursor, Encode};
use proptest_derive::Arbitrary;
use serde::Serialize;

/// How much of a restored tablet has been brought back.
#[derive(Arbitrary, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RestoreStatus {
    /// Not being restored, or restore finished.
    #[default]
    Full,
    /// A placeholder: the tablet exists but nothing has been restored yet.
    Pending,
    /// Restore created the tablet with no data.
    Empty,
    /// Metadata of the minor and major storage units is restored; data is
    /// still being fetched.
    MinorAndMajorMeta,
}

/// Whether the replica holds all of its data.
#[derive(Arbitrary, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum DataStatus {
    #[default]
    Complete,
    Incomplete,
}

/// Replication readiness, reported back to the control plane.
///
/// Encoded as a packed `u64`: restore status in bits 0..8, data status in
/// bits 8..16, everything above reserved and zero.
#[derive(Arbitrary, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TabletHaStatus {
    pub restore_status: RestoreStatus,
    pub data_status: DataStatus,
}

impl TabletHaStatus {
    /// The status of a freshly created tablet.
    pub fn fresh() -> Self {
        TabletHaStatus::default()
    }

    /// The status of a restore placeholder.
    pub fn restore_pending() -> Self {
        TabletHaStatus {
            restore_status: RestoreStatus::Pending,
            data_status: DataStatus::Incomplete,
        }
    }

    /// A pending placeholder cannot claim complete data.
    pub fn is_valid(&self) -> bool {
        !(self.restore_status == RestoreStatus::Pending
            && self.data_status == DataStatus::Complete)
    }

    pub fn is_restore_status_pending(&self) -> bool {
        self.restore_status == RestoreStatus::Pending
    }

    pub fn is_data_status_complete(&self) -> bool {
        self.data_status == DataStatus::Complete
    }

    fn pack(&self) -> u64 {
        let restore: u64 = match self.restore_status {
            RestoreStatus::Full => 0,
            RestoreStatus::Pending => 1,
            RestoreStatus::Empty => 2,
            RestoreStatus::MinorAndMajorMeta => 3,
        };
        let data: u64 = match self.data_status {
            DataStatus::Complete => 0,
            DataStatus::Incomplete => 1,
        };
        restore | (data << 8)
    }

    fn unpack(packed: u64) -> Result<Self, CodecError> {
        let restore_status = match packed & 0xff {
            0 => RestoreStatus::Full,
            1 => RestoreStatus::Pending,
            2 => RestoreStatus::Empty,
            3 => RestoreStatus::MinorAndMajorMeta,
            x => return Err(CodecError::corrupt(format!("unknown restore status {}", x))),
        };
        let data_status = match (packed >> 8) & 0xff {
            0 => DataStatus::Complete,
            1 => DataStatus::Incomplete,
            x => return Err(CodecError::corrupt(format!("unknown data status {}", x))),
        };
        if packed >> 16 != 0 {
            return Err(CodecError::corrupt(format!(
                "reserved ha status bits set: {:#x}",
                packed
            )));
        }
        Ok(TabletHaStatus {
            restore_status,
            data_status,
        })
    }
}

impl Encode for TabletHaStatus {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u64(self.pack());
    }

    fn encoded_len(&self) -> usize {
        8
    }
}

impl Codec for TabletHaStatus {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        TabletHaStatus::unpack(buf.read_u64()?)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn validity() {
        assert!(TabletHaStatus::fresh().is_valid());
        assert!(TabletHaStatus::restore_pending().is_valid());
        let bogus = TabletHaStatus {
            restore_status: RestoreStatus::Pending,
            data_status: DataStatus::Complete,
        };
        assert!(!bogus.is_valid());
    }

    #[test]
    fn packing() {
        let status = TabletHaStatus {
            restore_status: RestoreStatus::MinorAndMajorMeta,
            data_status: DataStatus::Incomplete,
        };
        assert_eq!(status.pack(), 0x103);
        let buf = status.encode_to_vec();
        assert_eq!(TabletHaStatus::decode(&mut Cursor::new(&buf)), Ok(status));

        let mut c = Cursor::new(&[0, 0, 0, 1, 0, 0, 0, 0]);
        assert!(matches!(
            TabletHaStatus::decode(&mut c),
            Err(CodecError::Corrupt(_))
        ));
    }

    proptest! {
        #[test]
        fn packed_roundtrip(status: TabletHaStatus) {
            let buf = status.encode_to_vec();
            prop_assert_eq!(buf.len(), status.encoded_len());
            prop_assert_eq!(TabletHaStatus::decode(&mut Cursor::new(&buf)), Ok(status));
        }
    }
}
