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

use crate::error::TabletMetaError;

/// What the control plane needs to know about a tablet's latest major
/// storage unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MajorSummary {
    pub snapshot_version: i64,
    pub data_checksum: i64,
    pub row_count: i64,
}

/// Reporting watermark of a tablet towards the control plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TabletReportStatus {
    pub merge_snapshot_version: i64,
    pub cur_report_version: i64,
    pub data_checksum: i64,
    pub row_count: i64,
}

impl TabletReportStatus {
    /// Builds a report status from the latest major storage unit, if any.
    pub fn init_report_info(
        major: Option<&MajorSummary>,
        report_version: i64,
    ) -> Result<Self, TabletMetaError> {
        if report_version < 0 {
            return Err(TabletMetaError::invalid_argument(format!(
                "negative report version {}",
                report_version
            )));
        }
        let status = match major {
            None => TabletReportStatus {
                cur_report_version: report_version,
                ..Default::default()
            },
            Some(major) => TabletReportStatus {
                merge_snapshot_version: major.snapshot_version,
                cur_report_version: report_version,
                data_checksum: major.data_checksum,
                row_count: major.row_count,
            },
        };
        Ok(status)
    }

    /// Whether a merge finished that the control plane has not heard of.
    pub fn need_report(&self) -> bool {
        self.merge_snapshot_version > self.cur_report_version
    }
}

impl Encode for TabletReportStatus {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i64(self.merge_snapshot_version);
        buf.put_i64(self.cur_report_version);
        buf.put_i64(self.data_checksum);
        buf.put_i64(self.row_count);
    }

    fn encoded_len(&self) -> usize {
        32
    }
}

impl Codec for TabletReportStatus {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(TabletReportStatus {
            merge_snapshot_version: buf.read_i64()?,
            cur_report_version: buf.read_i64()?,
            data_checksum: buf.read_i64()?,
            row_count: buf.read_i64()?,
        })
    }
}
