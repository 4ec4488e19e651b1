// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The transferable snapshot of a tablet's metadata.
//!
//! A [`MigrationTabletParam`] is built on the sending node (field by field,
//! by [`MigrationTabletParam::assign`] or from an existing
//! [`TabletMeta`]), validated, serialized, shipped, deserialized on the
//! receiving node and consumed by [`TabletMeta::init`] or
//! [`TabletMeta::update`].
//!
//! Unlike [`TabletMeta`], a param owns its arena. Everything variable-length
//! it holds is charged there, bounded by
//! [`TabletMetaConfig::param_arena_limit_bytes`], and released when the
//! param is reset or dropped.
//!
//! Encoded as a record with the same `[version][length]` header as
//! [`TabletMeta`], followed by the fields in declaration order. The three DDL
//! watermarks are optional on the wire.

use std::fmt;

use bytes::BufMut;
use mz_tablet_types::codec::{self, RECORD_HEADER_LEN};
use mz_tablet_types::{Codec, CodecError, CompatMode, Encode, LsId, Scn, TabletId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alloc::{ArenaAllocator, ArenaCodec};
use crate::autoinc::TabletAutoincSeq;
use crate::binding::TabletBindingInfo;
use crate::cfg::TabletMetaConfig;
use crate::error::TabletMetaError;
use crate::flag::TableStoreFlag;
use crate::ha::TabletHaStatus;
use crate::medium::MediumCompactionInfoList;
use crate::meta::{TabletMeta, create_scn_precedes_start};
use crate::report::TabletReportStatus;
use crate::schema::StorageSchema;
use crate::tx::TabletTxData;

/// The current encoding version of [`MigrationTabletParam`].
pub const MIGRATION_TABLET_PARAM_VERSION: i32 = 1;

#[derive(Serialize)]
pub struct MigrationTabletParam {
    #[serde(skip)]
    allocator: ArenaAllocator,
    #[serde(skip)]
    cfg: TabletMetaConfig,
    pub ls_id: LsId,
    pub tablet_id: TabletId,
    pub data_tablet_id: TabletId,
    pub ref_tablet_id: TabletId,
    pub create_scn: Scn,
    pub start_scn: Scn,
    pub clog_checkpoint_ts: Scn,
    pub ddl_checkpoint_ts: Option<Scn>,
    pub ddl_start_log_ts: Option<Scn>,
    pub ddl_snapshot_version: Option<i64>,
    pub snapshot_version: i64,
    pub multi_version_start: i64,
    pub compat_mode: CompatMode,
    autoinc_seq: TabletAutoincSeq,
    pub ha_status: TabletHaStatus,
    pub report_status: TabletReportStatus,
    pub tx_data: TabletTxData,
    ddl_data: TabletBindingInfo,
    storage_schema: StorageSchema,
    medium_info_list: MediumCompactionInfoList,
    pub table_store_flag: TableStoreFlag,
    /// May trail `storage_schema.schema_version`: the schema can be updated
    /// ahead of the last confirmed sync point.
    pub max_sync_storage_schema_version: i64,
}

impl MigrationTabletParam {
    /// An empty param with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&TabletMetaConfig::default())
    }

    /// An empty param whose arena is limited per `cfg`.
    pub fn with_config(cfg: &TabletMetaConfig) -> Self {
        MigrationTabletParam {
            allocator: ArenaAllocator::with_limit(
                "migration_tablet_param",
                cfg.param_arena_limit_bytes,
            ),
            cfg: cfg.clone(),
            ls_id: LsId::INVALID,
            tablet_id: TabletId::INVALID,
            data_tablet_id: TabletId::INVALID,
            ref_tablet_id: TabletId::INVALID,
            create_scn: Scn::INVALID,
            start_scn: Scn::INVALID,
            clog_checkpoint_ts: Scn::INVALID,
            ddl_checkpoint_ts: None,
            ddl_start_log_ts: None,
            ddl_snapshot_version: None,
            snapshot_version: 0,
            multi_version_start: 0,
            compat_mode: CompatMode::Invalid,
            autoinc_seq: TabletAutoincSeq::default(),
            ha_status: TabletHaStatus::fresh(),
            report_status: TabletReportStatus::default(),
            tx_data: TabletTxData::default(),
            ddl_data: TabletBindingInfo::default(),
            storage_schema: StorageSchema::default(),
            medium_info_list: MediumCompactionInfoList::default(),
            table_store_flag: TableStoreFlag::default(),
            max_sync_storage_schema_version: 0,
        }
    }

    /// Snapshots an initialized `meta` together with the schema and
    /// compaction history the tablet carries alongside it.
    pub fn from_tablet_meta(
        meta: &TabletMeta,
        storage_schema: &StorageSchema,
        medium_info_list: &MediumCompactionInfoList,
    ) -> Result<Self, TabletMetaError> {
        if !meta.is_inited() {
            return Err(TabletMetaError::NotInit);
        }
        if !meta.is_valid() {
            return Err(TabletMetaError::invalid_argument(format!(
                "cannot build a migration param from invalid tablet meta {:?}",
                meta
            )));
        }
        let mut param = MigrationTabletParam::new();
        param.ls_id = meta.ls_id();
        param.tablet_id = meta.tablet_id();
        param.data_tablet_id = meta.data_tablet_id();
        param.ref_tablet_id = meta.ref_tablet_id();
        param.create_scn = meta.create_scn();
        param.start_scn = meta.start_scn();
        param.clog_checkpoint_ts = meta.clog_checkpoint_ts();
        param.ddl_checkpoint_ts = Some(meta.ddl_checkpoint_ts());
        param.ddl_start_log_ts = Some(meta.ddl_start_log_ts());
        param.ddl_snapshot_version = Some(meta.ddl_snapshot_version());
        param.snapshot_version = meta.snapshot_version();
        param.multi_version_start = meta.multi_version_start();
        param.compat_mode = meta.compat_mode();
        param.ha_status = meta.ha_status();
        param.report_status = meta.report_status();
        param.tx_data = meta.tx_data();
        param.table_store_flag = meta.table_store_flag();
        param.max_sync_storage_schema_version = meta.max_sync_storage_schema_version();
        param.set_autoinc_seq(meta.autoinc_seq())?;
        param.set_ddl_data(meta.ddl_data())?;
        param.set_storage_schema(storage_schema)?;
        param.set_medium_info_list(medium_info_list)?;
        Ok(param)
    }

    /// A param for a tablet whose restore has not started: the schema is a
    /// placeholder, the restore status pending and there is no major storage
    /// unit yet.
    pub fn new_restore_placeholder(
        ls_id: LsId,
        tablet_id: TabletId,
        data_tablet_id: TabletId,
        create_scn: Scn,
    ) -> Result<Self, TabletMetaError> {
        let mut param = MigrationTabletParam::new();
        param.ls_id = ls_id;
        param.tablet_id = tablet_id;
        param.data_tablet_id = data_tablet_id;
        param.create_scn = create_scn;
        param.start_scn = Scn::INIT_CLOG_CHECKPOINT;
        param.clog_checkpoint_ts = Scn::INIT_CLOG_CHECKPOINT;
        param.compat_mode = CompatMode::MySql;
        param.ha_status = TabletHaStatus::restore_pending();
        param.table_store_flag = TableStoreFlag::without_major_sstable();
        param.storage_schema = Self::construct_placeholder_storage_schema(&param.allocator)?;
        if !param.is_valid() {
            return Err(TabletMetaError::invalid_argument(format!(
                "invalid restore placeholder for {} {}",
                ls_id, tablet_id
            )));
        }
        info!(
            "constructed restore placeholder param for {} {}",
            ls_id, tablet_id
        );
        Ok(param)
    }

    /// The storage schema of a restore placeholder tablet, charged to
    /// `allocator`.
    ///
    /// The result is marked as a placeholder and refuses
    /// [`StorageSchema::check_queryable`].
    pub fn construct_placeholder_storage_schema(
        allocator: &ArenaAllocator,
    ) -> Result<StorageSchema, TabletMetaError> {
        let schema = StorageSchema::placeholder(allocator)?;
        info!(
            "constructed placeholder storage schema in arena {}",
            allocator.label()
        );
        Ok(schema)
    }

    /// Replaces the contents of `self` with a deep copy of `other`, charged to
    /// `self`'s arena. On failure `self` is unchanged.
    pub fn assign(&mut self, other: &MigrationTabletParam) -> Result<(), TabletMetaError> {
        if !other.is_valid() {
            warn!(
                "refusing to assign invalid migration param for {} {}",
                other.ls_id, other.tablet_id
            );
            return Err(TabletMetaError::invalid_argument(
                "cannot assign from an invalid migration tablet param",
            ));
        }
        let autoinc_seq = other.autoinc_seq.deep_copy(&self.allocator)?;
        let ddl_data = other.ddl_data.deep_copy(&self.allocator)?;
        let storage_schema = other.storage_schema.deep_copy(&self.allocator)?;
        let medium_info_list = other.medium_info_list.deep_copy(&self.allocator)?;
        self.ls_id = other.ls_id;
        self.tablet_id = other.tablet_id;
        self.data_tablet_id = other.data_tablet_id;
        self.ref_tablet_id = other.ref_tablet_id;
        self.create_scn = other.create_scn;
        self.start_scn = other.start_scn;
        self.clog_checkpoint_ts = other.clog_checkpoint_ts;
        self.ddl_checkpoint_ts = other.ddl_checkpoint_ts;
        self.ddl_start_log_ts = other.ddl_start_log_ts;
        self.ddl_snapshot_version = other.ddl_snapshot_version;
        self.snapshot_version = other.snapshot_version;
        self.multi_version_start = other.multi_version_start;
        self.compat_mode = other.compat_mode;
        self.autoinc_seq = autoinc_seq;
        self.ha_status = other.ha_status;
        self.report_status = other.report_status;
        self.tx_data = other.tx_data;
        self.ddl_data = ddl_data;
        self.storage_schema = storage_schema;
        self.medium_info_list = medium_info_list;
        self.table_store_flag = other.table_store_flag;
        self.max_sync_storage_schema_version = other.max_sync_storage_schema_version;
        Ok(())
    }

    /// Clears every field, releasing all arena charges. The arena and its
    /// limit are kept.
    pub fn reset(&mut self) {
        *self = MigrationTabletParam {
            allocator: self.allocator.clone(),
            ..MigrationTabletParam::with_config(&self.cfg)
        };
    }

    pub fn is_valid(&self) -> bool {
        self.ls_id.is_valid()
            && self.tablet_id.is_valid()
            && self.data_tablet_id.is_valid()
            && self.create_scn.is_valid()
            && create_scn_precedes_start(self.create_scn, self.start_scn)
            && self.multi_version_start >= 0
            && self.multi_version_start <= self.snapshot_version
            && self.compat_mode.is_valid()
            && self.ha_status.is_valid()
            && self.storage_schema.is_valid()
            && self.medium_info_list.is_valid()
    }

    /// Whether this param describes a restore placeholder tablet.
    pub fn is_placeholder(&self) -> bool {
        self.storage_schema.is_placeholder()
    }

    /// The arena every variable-length field of this param is charged to.
    pub fn allocator(&self) -> &ArenaAllocator {
        &self.allocator
    }

    pub fn autoinc_seq(&self) -> &TabletAutoincSeq {
        &self.autoinc_seq
    }

    pub fn ddl_data(&self) -> &TabletBindingInfo {
        &self.ddl_data
    }

    pub fn storage_schema(&self) -> &StorageSchema {
        &self.storage_schema
    }

    pub fn medium_info_list(&self) -> &MediumCompactionInfoList {
        &self.medium_info_list
    }

    pub fn set_autoinc_seq(&mut self, seq: &TabletAutoincSeq) -> Result<(), TabletMetaError> {
        self.autoinc_seq = seq.deep_copy(&self.allocator)?;
        Ok(())
    }

    pub fn set_ddl_data(&mut self, ddl_data: &TabletBindingInfo) -> Result<(), TabletMetaError> {
        self.ddl_data = ddl_data.deep_copy(&self.allocator)?;
        Ok(())
    }

    pub fn set_storage_schema(&mut self, schema: &StorageSchema) -> Result<(), TabletMetaError> {
        self.storage_schema = schema.deep_copy(&self.allocator)?;
        Ok(())
    }

    pub fn set_medium_info_list(
        &mut self,
        list: &MediumCompactionInfoList,
    ) -> Result<(), TabletMetaError> {
        self.medium_info_list = list.deep_copy(&self.allocator)?;
        Ok(())
    }

    pub fn get_serialize_size(&self) -> usize {
        RECORD_HEADER_LEN + Body(self).encoded_len()
    }

    /// Writes the encoded record into `buf` at `*pos`, advancing `*pos` past
    /// it. Invalid params are refused, as are records longer than this
    /// param's `max_record_bytes`.
    pub fn serialize(&self, buf: &mut [u8], pos: &mut usize) -> Result<(), TabletMetaError> {
        if !self.is_valid() {
            warn!("refusing to serialize invalid migration param {:?}", self);
            return Err(TabletMetaError::invalid_argument(
                "cannot serialize an invalid migration tablet param",
            ));
        }
        codec::write_record(
            MIGRATION_TABLET_PARAM_VERSION,
            &Body(self),
            self.cfg.max_record_bytes,
            buf,
            pos,
        )?;
        Ok(())
    }

    pub fn serialize_to_vec(&self) -> Result<Vec<u8>, TabletMetaError> {
        let mut buf = vec![0; self.get_serialize_size()];
        let mut pos = 0;
        self.serialize(&mut buf, &mut pos)?;
        Ok(buf)
    }

    /// Decodes the record at `*pos` into `self`, charging variable-length
    /// fields to `self`'s arena.
    ///
    /// On failure neither `self` nor `*pos` change.
    pub fn deserialize(&mut self, buf: &[u8], pos: &mut usize) -> Result<(), TabletMetaError> {
        match self.decode_record(buf, *pos) {
            Ok((decoded, len)) => {
                *self = decoded;
                *pos += len;
                debug!(
                    "deserialized migration param {} {} ({} bytes)",
                    self.ls_id, self.tablet_id, len
                );
                Ok(())
            }
            Err(err) => {
                warn!("failed to deserialize migration param at {}: {}", pos, err);
                Err(err)
            }
        }
    }

    fn decode_record(
        &self,
        buf: &[u8],
        pos: usize,
    ) -> Result<(MigrationTabletParam, usize), TabletMetaError> {
        let (header, mut body) = codec::read_record(
            buf,
            pos,
            MIGRATION_TABLET_PARAM_VERSION,
            self.cfg.max_record_bytes,
        )?;
        let arena = &self.allocator;
        let c = &mut body;
        let param = MigrationTabletParam {
            allocator: arena.clone(),
            cfg: self.cfg.clone(),
            ls_id: LsId::decode(c)?,
            tablet_id: TabletId::decode(c)?,
            data_tablet_id: TabletId::decode(c)?,
            ref_tablet_id: TabletId::decode(c)?,
            create_scn: Scn::decode(c)?,
            start_scn: Scn::decode(c)?,
            clog_checkpoint_ts: Scn::decode(c)?,
            ddl_checkpoint_ts: Option::<Scn>::decode(c)?,
            ddl_start_log_ts: Option::<Scn>::decode(c)?,
            ddl_snapshot_version: Option::<i64>::decode(c)?,
            snapshot_version: c.read_i64()?,
            multi_version_start: c.read_i64()?,
            compat_mode: CompatMode::decode(c)?,
            autoinc_seq: TabletAutoincSeq::decode_in(c, arena)?,
            ha_status: TabletHaStatus::decode(c)?,
            report_status: TabletReportStatus::decode(c)?,
            tx_data: TabletTxData::decode(c)?,
            ddl_data: TabletBindingInfo::decode_in(c, arena)?,
            storage_schema: StorageSchema::decode_in(c, arena)?,
            medium_info_list: MediumCompactionInfoList::decode_in(c, arena)?,
            table_store_flag: TableStoreFlag::decode(c)?,
            max_sync_storage_schema_version: c.read_i64()?,
        };
        codec::expect_consumed(&body)?;
        if !param.is_valid() {
            return Err(CodecError::corrupt(format!(
                "decoded migration param is not valid: {:?}",
                param
            ))
            .into());
        }
        Ok((param, header.len()))
    }

    /// A JSON rendering of the param for diagnostics.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Default for MigrationTabletParam {
    fn default() -> Self {
        MigrationTabletParam::new()
    }
}

/// The fields of a [`MigrationTabletParam`] record after the header.
struct Body<'a>(&'a MigrationTabletParam);

impl Encode for Body<'_> {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        let p = self.0;
        p.ls_id.encode(buf);
        p.tablet_id.encode(buf);
        p.data_tablet_id.encode(buf);
        p.ref_tablet_id.encode(buf);
        p.create_scn.encode(buf);
        p.start_scn.encode(buf);
        p.clog_checkpoint_ts.encode(buf);
        p.ddl_checkpoint_ts.encode(buf);
        p.ddl_start_log_ts.encode(buf);
        p.ddl_snapshot_version.encode(buf);
        p.snapshot_version.encode(buf);
        p.multi_version_start.encode(buf);
        p.compat_mode.encode(buf);
        p.autoinc_seq.encode(buf);
        p.ha_status.encode(buf);
        p.report_status.encode(buf);
        p.tx_data.encode(buf);
        p.ddl_data.encode(buf);
        p.storage_schema.encode(buf);
        p.medium_info_list.encode(buf);
        p.table_store_flag.encode(buf);
        p.max_sync_storage_schema_version.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        let p = self.0;
        p.ls_id.encoded_len()
            + p.tablet_id.encoded_len()
            + p.data_tablet_id.encoded_len()
            + p.ref_tablet_id.encoded_len()
            + p.create_scn.encoded_len()
            + p.start_scn.encoded_len()
            + p.clog_checkpoint_ts.encoded_len()
            + p.ddl_checkpoint_ts.encoded_len()
            + p.ddl_start_log_ts.encoded_len()
            + p.ddl_snapshot_version.encoded_len()
            + p.snapshot_version.encoded_len()
            + p.multi_version_start.encoded_len()
            + p.compat_mode.encoded_len()
            + p.autoinc_seq.encoded_len()
            + p.ha_status.encoded_len()
            + p.report_status.encoded_len()
            + p.tx_data.encoded_len()
            + p.ddl_data.encoded_len()
            + p.storage_schema.encoded_len()
            + p.medium_info_list.encoded_len()
            + p.table_store_flag.encoded_len()
            + p.max_sync_storage_schema_version.encoded_len()
    }
}

/// Compares the transferred fields; the arena and its configuration are not
/// part of a param's value.
impl PartialEq for MigrationTabletParam {
    fn eq(&self, other: &Self) -> bool {
        self.ls_id == other.ls_id
            && self.tablet_id == other.tablet_id
            && self.data_tablet_id == other.data_tablet_id
            && self.ref_tablet_id == other.ref_tablet_id
            && self.create_scn == other.create_scn
            && self.start_scn == other.start_scn
            && self.clog_checkpoint_ts == other.clog_checkpoint_ts
            && self.ddl_checkpoint_ts == other.ddl_checkpoint_ts
            && self.ddl_start_log_ts == other.ddl_start_log_ts
            && self.ddl_snapshot_version == other.ddl_snapshot_version
            && self.snapshot_version == other.snapshot_version
            && self.multi_version_start == other.multi_version_start
            && self.compat_mode == other.compat_mode
            && self.autoinc_seq == other.autoinc_seq
            && self.ha_status == other.ha_status
            && self.report_status == other.report_status
            && self.tx_data == other.tx_data
            && self.ddl_data == other.ddl_data
            && self.storage_schema == other.storage_schema
            && self.medium_info_list == other.medium_info_list
            && self.table_store_flag == other.table_store_flag
            && self.max_sync_storage_schema_version == other.max_sync_storage_schema_version
    }
}

impl Eq for MigrationTabletParam {}

impl fmt::Debug for MigrationTabletParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationTabletParam")
            .field("arena", &self.allocator)
            .field("ls_id", &self.ls_id)
            .field("tablet_id", &self.tablet_id)
            .field("data_tablet_id", &self.data_tablet_id)
            .field("ref_tablet_id", &self.ref_tablet_id)
            .field("create_scn", &self.create_scn)
            .field("start_scn", &self.start_scn)
            .field("clog_checkpoint_ts", &self.clog_checkpoint_ts)
            .field("ddl_checkpoint_ts", &self.ddl_checkpoint_ts)
            .field("ddl_start_log_ts", &self.ddl_start_log_ts)
            .field("ddl_snapshot_version", &self.ddl_snapshot_version)
            .field("snapshot_version", &self.snapshot_version)
            .field("multi_version_start", &self.multi_version_start)
            .field("compat_mode", &self.compat_mode)
            .field("autoinc_seq", &self.autoinc_seq)
            .field("ha_status", &self.ha_status)
            .field("report_status", &self.report_status)
            .field("tx_data", &self.tx_data)
            .field("ddl_data", &self.ddl_data)
            .field("storage_schema", &self.storage_schema)
            .field("medium_info_list", &self.medium_info_list)
            .field("table_store_flag", &self.table_store_flag)
            .field(
                "max_sync_storage_schema_version",
                &self.max_sync_storage_schema_version,
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoinc::AutoincInterval;
    use crate::medium::{CompactionType, MediumCompactionInfo, MergeReason};
    use crate::schema::{ColumnSchema, ColumnType, RowkeyColumn, SortOrder};

    fn user_schema(arena: &ArenaAllocator) -> StorageSchema {
        StorageSchema::new_in(
            7,
            CompatMode::MySql,
            &[RowkeyColumn {
                column_idx: 16,
                meta_type: ColumnType::BigInt,
                order: SortOrder::Asc,
            }],
            &[ColumnSchema {
                meta_type: ColumnType::BigInt,
                is_column_stored_in_sstable: true,
                default_checksum: 0,
            }],
            arena,
        )
        .unwrap()
    }

    fn populated() -> MigrationTabletParam {
        let mut param = MigrationTabletParam::new();
        param.ls_id = LsId(1);
        param.tablet_id = TabletId(200);
        param.data_tablet_id = TabletId(200);
        param.create_scn = Scn(10);
        param.start_scn = Scn(20);
        param.clog_checkpoint_ts = Scn(30);
        param.ddl_checkpoint_ts = Some(Scn(25));
        param.snapshot_version = 40;
        param.multi_version_start = 35;
        param.compat_mode = CompatMode::MySql;
        param.max_sync_storage_schema_version = 5;

        let scratch = ArenaAllocator::new("scratch");
        param.set_storage_schema(&user_schema(&scratch)).unwrap();
        let seq = TabletAutoincSeq::new_in(
            &[AutoincInterval {
                column_id: 17,
                next_value: 100,
            }],
            &scratch,
        )
        .unwrap();
        param.set_autoinc_seq(&seq).unwrap();
        let mut medium = MediumCompactionInfoList::default();
        medium.last_medium_scn = 30;
        medium
            .push_info(
                MediumCompactionInfo {
                    medium_snapshot: 45,
                    compaction_type: CompactionType::Major,
                    merge_reason: MergeReason::TenantMajor,
                    cluster_id: 1,
                    data_version: 1,
                },
                &scratch,
            )
            .unwrap();
        param.set_medium_info_list(&medium).unwrap();
        param
    }

    #[test]
    fn validity_tolerates_schema_ahead_of_sync_point() {
        let param = populated();
        assert!(param.is_valid());
        assert!(param.max_sync_storage_schema_version < param.storage_schema().schema_version);
        assert!(!MigrationTabletParam::new().is_valid());
    }

    #[test]
    fn setters_charge_the_param_arena() {
        // The scratch arena the parts were built in is gone by now.
        let mut param = populated();
        let used = param.allocator().used();
        assert!(used > 0);
        param.set_autoinc_seq(&TabletAutoincSeq::default()).unwrap();
        assert_eq!(param.allocator().used(), used - 16);
        assert_eq!(MigrationTabletParam::new().allocator().used(), 0);
    }

    #[test]
    fn assign_deep_copies() {
        let src = populated();
        let mut dst = MigrationTabletParam::new();
        dst.assign(&src).unwrap();
        assert_eq!(dst, src);
        assert_eq!(dst.allocator().used(), src.allocator().used());
        assert!(!dst.allocator().same_arena(src.allocator()));

        let mut untouched = populated();
        let err = untouched.assign(&MigrationTabletParam::new()).unwrap_err();
        assert!(matches!(err, TabletMetaError::InvalidArgument(_)));
        assert_eq!(untouched, populated());
    }

    #[test]
    fn assign_respects_arena_limit() {
        let src = populated();
        let cfg = TabletMetaConfig {
            param_arena_limit_bytes: 8,
            ..Default::default()
        };
        let mut dst = MigrationTabletParam::with_config(&cfg);
        let err = dst.assign(&src).unwrap_err();
        assert!(matches!(err, TabletMetaError::Alloc(_)));
        assert_eq!(dst.allocator().used(), 0);
        assert!(!dst.is_valid());
    }

    #[test]
    fn reset_releases_charges() {
        let mut param = populated();
        param.reset();
        assert_eq!(param.allocator().used(), 0);
        assert!(!param.is_valid());
        assert_eq!(param, MigrationTabletParam::new());
    }

    #[test]
    fn serialize_roundtrip() {
        let param = populated();
        let buf = param.serialize_to_vec().unwrap();
        assert_eq!(buf.len(), param.get_serialize_size());

        let mut decoded = MigrationTabletParam::new();
        let mut pos = 0;
        decoded.deserialize(&buf, &mut pos).unwrap();
        assert_eq!(pos, buf.len());
        assert_eq!(decoded, param);
        assert_eq!(decoded.ddl_start_log_ts, None);
    }

    #[test]
    fn serialize_respects_record_limit() {
        let size = populated().get_serialize_size();
        let cfg = TabletMetaConfig {
            max_record_bytes: size - 1,
            ..Default::default()
        };
        let mut param = MigrationTabletParam::with_config(&cfg);
        param.assign(&populated()).unwrap();
        let mut buf = vec![0; size];
        let mut pos = 0;
        let err = param.serialize(&mut buf, &mut pos).unwrap_err();
        assert_eq!(err.kind(), crate::error::TabletMetaErrorKind::Format);
        assert_eq!(pos, 0);

        // At the limit it writes, and a param with the same config reads it.
        let cfg = TabletMetaConfig {
            max_record_bytes: size,
            ..Default::default()
        };
        let mut param = MigrationTabletParam::with_config(&cfg);
        param.assign(&populated()).unwrap();
        param.serialize(&mut buf, &mut pos).unwrap();
        let mut decoded = MigrationTabletParam::with_config(&cfg);
        decoded.deserialize(&buf, &mut 0).unwrap();
        assert_eq!(decoded, param);
    }

    #[test]
    fn created_after_start_is_invalid() {
        let mut param = populated();
        param.create_scn = Scn(21);
        assert!(!param.is_valid());
        // Before a start point is recorded there is no upper bound.
        param.start_scn = Scn::INIT_CLOG_CHECKPOINT;
        assert!(param.is_valid());
    }

    #[test]
    fn serialize_refuses_invalid() {
        let param = MigrationTabletParam::new();
        let mut buf = vec![0; param.get_serialize_size()];
        let err = param.serialize(&mut buf, &mut 0).unwrap_err();
        assert!(matches!(err, TabletMetaError::InvalidArgument(_)));
    }

    #[test]
    fn deserialize_failure_keeps_state() {
        let param = populated();
        let mut buf = param.serialize_to_vec().unwrap();
        buf[3] = 2;

        let mut target = populated();
        let mut pos = 0;
        let err = target.deserialize(&buf, &mut pos).unwrap_err();
        assert_eq!(
            err,
            TabletMetaError::Codec(CodecError::InvalidEncodingVersion {
                expected: MIGRATION_TABLET_PARAM_VERSION,
                actual: 2,
            })
        );
        assert_eq!(pos, 0);
        assert_eq!(target, populated());
    }

    #[test]
    fn restore_placeholder() {
        let param = MigrationTabletParam::new_restore_placeholder(
            LsId(1),
            TabletId(300),
            TabletId(300),
            Scn(5),
        )
        .unwrap();
        assert!(param.is_valid());
        assert!(param.is_placeholder());
        assert!(param.ha_status.is_restore_status_pending());
        assert!(!param.table_store_flag.with_major_sstable);
        assert!(param.storage_schema().check_queryable().is_err());
        assert!(!populated().is_placeholder());

        let buf = param.serialize_to_vec().unwrap();
        let mut decoded = MigrationTabletParam::new();
        decoded.deserialize(&buf, &mut 0).unwrap();
        assert!(decoded.is_placeholder());
    }

    #[test]
    fn json_dump() {
        let json = populated().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tablet_id"], 200);
        assert_eq!(value["ddl_start_log_ts"], serde_json::Value::Null);
        assert!(value.get("allocator").is_none());
    }
}
