// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The persistent descriptor of a tablet.
//!
//! A [`TabletMeta`] starts out uninitialized and becomes initialized through
//! exactly one successful [`TabletMeta::init`]. There are four ways in, one
//! per [`TabletMetaInit`] variant:
//!
//! - [`TabletMetaInit::Create`]: a brand new tablet.
//! - [`TabletMetaInit::Derive`]: a new generation of an existing tablet at a
//!   newer snapshot, e.g. after a minor compaction or a schema change.
//! - [`TabletMetaInit::FromParam`]: a tablet materialized from a
//!   [`MigrationTabletParam`] received from another node.
//! - [`TabletMetaInit::Override`]: an existing tablet patched by an optional
//!   migration param.
//!
//! Every path builds the result into a fresh value, runs the same shared
//! `inner_check` on it and only then commits it to `self`. A
//! failed `init` leaves `self` uninitialized.
//!
//! After initialization the meta changes only through [`TabletMeta::update`]
//! and [`TabletMeta::update_create_scn`], both of which also compute into a
//! copy and commit on success.
//!
//! The encoded form is a record:
//!
//! ```text
//! [version: i32][length: i32]
//! ls_id tablet_id data_tablet_id ref_tablet_id has_next_tablet
//! create_scn start_scn clog_checkpoint_ts ddl_checkpoint_ts ddl_start_log_ts
//! ddl_snapshot_version snapshot_version multi_version_start compat_mode
//! autoinc_seq ha_status report_status tx_data ddl_data table_store_flag
//! max_sync_storage_schema_version
//! ```
//!
//! with `length` covering the whole record. `ls_id` and `tablet_id` lead so
//! that [`TabletMeta::deserialize_id`] can route a record without decoding
//! the rest of it.

use std::cmp;
use std::fmt;

use bytes::BufMut;
use mz_tablet_types::codec::{self, RECORD_HEADER_LEN};
use mz_tablet_types::{Codec, CodecError, CompatMode, Encode, LsId, Scn, TabletId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::alloc::{ArenaAllocator, ArenaCodec};
use crate::autoinc::TabletAutoincSeq;
use crate::binding::TabletBindingInfo;
use crate::cfg::TabletMetaConfig;
use crate::error::TabletMetaError;
use crate::flag::TableStoreFlag;
use crate::ha::TabletHaStatus;
use crate::migration::MigrationTabletParam;
use crate::report::TabletReportStatus;
use crate::tx::TabletTxData;

/// The current encoding version of [`TabletMeta`].
pub const TABLET_META_VERSION: i32 = 1;

/// Arguments of [`TabletMetaInit::Create`].
#[derive(Clone, Debug)]
pub struct CreateTabletArgs {
    pub ls_id: LsId,
    pub tablet_id: TabletId,
    pub data_tablet_id: TabletId,
    pub lob_meta_tablet_id: TabletId,
    pub lob_piece_tablet_id: TabletId,
    pub create_scn: Scn,
    pub snapshot_version: i64,
    pub compat_mode: CompatMode,
    pub table_store_flag: TableStoreFlag,
    pub max_sync_storage_schema_version: i64,
}

/// Arguments of [`TabletMetaInit::Derive`].
///
/// The four trailing watermarks are optional. When one is absent the old
/// value is kept; when present the newer of old and new wins.
#[derive(Debug)]
pub struct DeriveTabletArgs<'a> {
    pub snapshot_version: i64,
    pub multi_version_start: i64,
    pub tx_data: TabletTxData,
    pub ddl_data: &'a TabletBindingInfo,
    pub autoinc_seq: &'a TabletAutoincSeq,
    pub max_sync_storage_schema_version: i64,
    pub clog_checkpoint_ts: Option<Scn>,
    pub ddl_checkpoint_ts: Option<Scn>,
    pub ddl_start_log_ts: Option<Scn>,
    pub ddl_snapshot_version: Option<i64>,
}

/// How to initialize a [`TabletMeta`].
#[derive(Debug)]
pub enum TabletMetaInit<'a> {
    /// A brand new tablet.
    Create(CreateTabletArgs),
    /// A new generation of `old` at a newer snapshot.
    Derive {
        old: &'a TabletMeta,
        args: DeriveTabletArgs<'a>,
    },
    /// A tablet taken entirely from a migration param.
    FromParam(&'a MigrationTabletParam),
    /// `old` with replaced side-data, optionally patched by `param`.
    Override {
        old: &'a TabletMeta,
        tx_data: TabletTxData,
        ddl_data: &'a TabletBindingInfo,
        autoinc_seq: &'a TabletAutoincSeq,
        param: Option<&'a MigrationTabletParam>,
    },
}

impl TabletMetaInit<'_> {
    fn name(&self) -> &'static str {
        match self {
            TabletMetaInit::Create(_) => "create",
            TabletMetaInit::Derive { .. } => "derive",
            TabletMetaInit::FromParam(_) => "from_param",
            TabletMetaInit::Override { .. } => "override",
        }
    }
}

/// The persistent descriptor of a tablet.
#[derive(Serialize)]
pub struct TabletMeta {
    version: i32,
    length: i32,
    ls_id: LsId,
    tablet_id: TabletId,
    data_tablet_id: TabletId,
    ref_tablet_id: TabletId,
    has_next_tablet: bool,
    create_scn: Scn,
    start_scn: Scn,
    clog_checkpoint_ts: Scn,
    ddl_checkpoint_ts: Scn,
    ddl_start_log_ts: Scn,
    ddl_snapshot_version: i64,
    snapshot_version: i64,
    multi_version_start: i64,
    compat_mode: CompatMode,
    autoinc_seq: TabletAutoincSeq,
    ha_status: TabletHaStatus,
    report_status: TabletReportStatus,
    tx_data: TabletTxData,
    ddl_data: TabletBindingInfo,
    table_store_flag: TableStoreFlag,
    max_sync_storage_schema_version: i64,
    #[serde(skip)]
    is_inited: bool,
    /// Where the variable-length fields are charged. Set by `init` and
    /// `deserialize`, and reused by `update`.
    #[serde(skip)]
    allocator: Option<ArenaAllocator>,
}

impl Default for TabletMeta {
    fn default() -> Self {
        TabletMeta {
            version: TABLET_META_VERSION,
            length: 0,
            ls_id: LsId::INVALID,
            tablet_id: TabletId::INVALID,
            data_tablet_id: TabletId::INVALID,
            ref_tablet_id: TabletId::INVALID,
            has_next_tablet: false,
            create_scn: Scn::INVALID,
            start_scn: Scn::INVALID,
            clog_checkpoint_ts: Scn::INVALID,
            ddl_checkpoint_ts: Scn::INVALID,
            ddl_start_log_ts: Scn::INVALID,
            ddl_snapshot_version: 0,
            snapshot_version: 0,
            multi_version_start: 0,
            compat_mode: CompatMode::Invalid,
            autoinc_seq: TabletAutoincSeq::default(),
            ha_status: TabletHaStatus::fresh(),
            report_status: TabletReportStatus::default(),
            tx_data: TabletTxData::default(),
            ddl_data: TabletBindingInfo::default(),
            table_store_flag: TableStoreFlag::default(),
            max_sync_storage_schema_version: 0,
            is_inited: false,
            allocator: None,
        }
    }
}

impl TabletMeta {
    /// Returns an uninitialized meta.
    pub fn new() -> Self {
        TabletMeta::default()
    }

    /// Initializes `self` along one of the four paths of [`TabletMetaInit`],
    /// charging variable-length fields to `allocator`.
    pub fn init(
        &mut self,
        allocator: &ArenaAllocator,
        init: TabletMetaInit<'_>,
    ) -> Result<(), TabletMetaError> {
        if self.is_inited {
            warn!(
                "tablet meta for {} {} already initialized, rejecting {} init",
                self.ls_id,
                self.tablet_id,
                init.name()
            );
            return Err(TabletMetaError::InitTwice);
        }
        let built = Self::build(allocator, &init).and_then(|candidate| {
            candidate.inner_check(&init)?;
            Ok(candidate)
        });
        match built {
            Ok(candidate) => {
                *self = candidate;
                debug!(
                    "initialized tablet meta {} {} via {}: snapshot_version={} multi_version_start={}",
                    self.ls_id,
                    self.tablet_id,
                    init.name(),
                    self.snapshot_version,
                    self.multi_version_start
                );
                Ok(())
            }
            Err(err) => {
                warn!("{} init of tablet meta failed: {}", init.name(), err);
                Err(err)
            }
        }
    }

    fn build(
        allocator: &ArenaAllocator,
        init: &TabletMetaInit<'_>,
    ) -> Result<TabletMeta, TabletMetaError> {
        let meta = match init {
            TabletMetaInit::Create(args) => TabletMeta {
                ls_id: args.ls_id,
                tablet_id: args.tablet_id,
                data_tablet_id: args.data_tablet_id,
                ref_tablet_id: args.lob_piece_tablet_id,
                create_scn: args.create_scn,
                start_scn: Scn::INIT_CLOG_CHECKPOINT,
                clog_checkpoint_ts: Scn::INIT_CLOG_CHECKPOINT,
                ddl_checkpoint_ts: Scn::INIT_CLOG_CHECKPOINT,
                ddl_start_log_ts: Scn::MIN,
                ddl_snapshot_version: 0,
                snapshot_version: args.snapshot_version,
                multi_version_start: args.snapshot_version,
                compat_mode: args.compat_mode,
                ha_status: TabletHaStatus::fresh(),
                report_status: TabletReportStatus {
                    merge_snapshot_version: args.snapshot_version,
                    cur_report_version: args.snapshot_version,
                    ..Default::default()
                },
                ddl_data: TabletBindingInfo::new(
                    args.data_tablet_id,
                    args.lob_meta_tablet_id,
                    args.lob_piece_tablet_id,
                ),
                table_store_flag: args.table_store_flag,
                max_sync_storage_schema_version: args.max_sync_storage_schema_version,
                ..Default::default()
            },
            TabletMetaInit::Derive { old, args } => TabletMeta {
                ls_id: old.ls_id,
                tablet_id: old.tablet_id,
                data_tablet_id: old.data_tablet_id,
                ref_tablet_id: old.ref_tablet_id,
                has_next_tablet: old.has_next_tablet,
                create_scn: old.create_scn,
                start_scn: old.start_scn,
                clog_checkpoint_ts: newer(old.clog_checkpoint_ts, args.clog_checkpoint_ts),
                ddl_checkpoint_ts: newer(old.ddl_checkpoint_ts, args.ddl_checkpoint_ts),
                ddl_start_log_ts: newer(old.ddl_start_log_ts, args.ddl_start_log_ts),
                ddl_snapshot_version: newer(old.ddl_snapshot_version, args.ddl_snapshot_version),
                snapshot_version: args.snapshot_version,
                multi_version_start: args.multi_version_start,
                compat_mode: old.compat_mode,
                autoinc_seq: args.autoinc_seq.deep_copy(allocator)?,
                ha_status: old.ha_status,
                report_status: old.report_status,
                tx_data: args.tx_data,
                ddl_data: args.ddl_data.deep_copy(allocator)?,
                table_store_flag: old.table_store_flag,
                max_sync_storage_schema_version: cmp::max(
                    old.max_sync_storage_schema_version,
                    args.max_sync_storage_schema_version,
                ),
                ..Default::default()
            },
            TabletMetaInit::FromParam(param) => TabletMeta {
                ls_id: param.ls_id,
                tablet_id: param.tablet_id,
                data_tablet_id: param.data_tablet_id,
                ref_tablet_id: param.ref_tablet_id,
                create_scn: param.create_scn,
                start_scn: param.start_scn,
                clog_checkpoint_ts: param.clog_checkpoint_ts,
                ddl_checkpoint_ts: param
                    .ddl_checkpoint_ts
                    .unwrap_or(Scn::INIT_CLOG_CHECKPOINT),
                ddl_start_log_ts: param.ddl_start_log_ts.unwrap_or(Scn::MIN),
                ddl_snapshot_version: param.ddl_snapshot_version.unwrap_or(0),
                snapshot_version: param.snapshot_version,
                multi_version_start: param.multi_version_start,
                compat_mode: param.compat_mode,
                autoinc_seq: param.autoinc_seq().deep_copy(allocator)?,
                ha_status: param.ha_status,
                report_status: param.report_status,
                tx_data: param.tx_data,
                ddl_data: param.ddl_data().deep_copy(allocator)?,
                table_store_flag: param.table_store_flag,
                max_sync_storage_schema_version: param.max_sync_storage_schema_version,
                ..Default::default()
            },
            TabletMetaInit::Override {
                old,
                tx_data,
                ddl_data,
                autoinc_seq,
                param,
            } => {
                let mut meta = TabletMeta {
                    ls_id: old.ls_id,
                    tablet_id: old.tablet_id,
                    data_tablet_id: old.data_tablet_id,
                    ref_tablet_id: old.ref_tablet_id,
                    has_next_tablet: old.has_next_tablet,
                    create_scn: old.create_scn,
                    start_scn: old.start_scn,
                    clog_checkpoint_ts: old.clog_checkpoint_ts,
                    ddl_checkpoint_ts: old.ddl_checkpoint_ts,
                    ddl_start_log_ts: old.ddl_start_log_ts,
                    ddl_snapshot_version: old.ddl_snapshot_version,
                    snapshot_version: old.snapshot_version,
                    multi_version_start: old.multi_version_start,
                    compat_mode: old.compat_mode,
                    autoinc_seq: autoinc_seq.deep_copy(allocator)?,
                    ha_status: old.ha_status,
                    report_status: old.report_status,
                    tx_data: *tx_data,
                    ddl_data: ddl_data.deep_copy(allocator)?,
                    table_store_flag: old.table_store_flag,
                    max_sync_storage_schema_version: old.max_sync_storage_schema_version,
                    ..Default::default()
                };
                if let Some(param) = param {
                    meta.clog_checkpoint_ts =
                        cmp::max(old.clog_checkpoint_ts, param.clog_checkpoint_ts);
                    meta.ddl_checkpoint_ts =
                        newer(old.ddl_checkpoint_ts, param.ddl_checkpoint_ts);
                    if let Some(ts) = param.ddl_start_log_ts {
                        meta.ddl_start_log_ts = ts;
                    }
                    if let Some(version) = param.ddl_snapshot_version {
                        meta.ddl_snapshot_version = version;
                    }
                    meta.snapshot_version = cmp::max(old.snapshot_version, param.snapshot_version);
                    meta.multi_version_start = cmp::min(
                        cmp::max(old.multi_version_start, param.multi_version_start),
                        meta.snapshot_version,
                    );
                    meta.max_sync_storage_schema_version = cmp::max(
                        old.max_sync_storage_schema_version,
                        param.max_sync_storage_schema_version,
                    );
                }
                meta
            }
        };
        let mut meta = TabletMeta {
            is_inited: true,
            allocator: Some(allocator.clone()),
            ..meta
        };
        meta.length = meta.record_length()?;
        Ok(meta)
    }

    /// The checks shared by all init paths: `self` is the candidate built
    /// from `init`.
    fn inner_check(&self, init: &TabletMetaInit<'_>) -> Result<(), TabletMetaError> {
        match init {
            TabletMetaInit::Create(args) => {
                if !args.ls_id.is_valid()
                    || !args.tablet_id.is_valid()
                    || !args.data_tablet_id.is_valid()
                {
                    return Err(TabletMetaError::invalid_argument(format!(
                        "invalid identity: ls_id={} tablet_id={} data_tablet_id={}",
                        args.ls_id, args.tablet_id, args.data_tablet_id
                    )));
                }
                if !args.create_scn.is_valid() {
                    return Err(TabletMetaError::invalid_argument(format!(
                        "invalid create_scn {}",
                        args.create_scn
                    )));
                }
                if args.snapshot_version < 0 || !args.compat_mode.is_valid() {
                    return Err(TabletMetaError::invalid_argument(format!(
                        "invalid snapshot_version {} or compat_mode {:?}",
                        args.snapshot_version, args.compat_mode
                    )));
                }
            }
            TabletMetaInit::Derive { old, args } => {
                if !old.is_valid() {
                    return Err(TabletMetaError::invalid_argument(
                        "old tablet meta is not valid",
                    ));
                }
                if args.multi_version_start > args.snapshot_version {
                    return Err(TabletMetaError::invariant(format!(
                        "multi_version_start {} is after snapshot_version {}",
                        args.multi_version_start, args.snapshot_version
                    )));
                }
                if args.snapshot_version < old.snapshot_version {
                    return Err(TabletMetaError::invariant(format!(
                        "snapshot_version would regress from {} to {}",
                        old.snapshot_version, args.snapshot_version
                    )));
                }
                if args.multi_version_start < old.multi_version_start {
                    return Err(TabletMetaError::invariant(format!(
                        "multi_version_start would regress from {} to {}",
                        old.multi_version_start, args.multi_version_start
                    )));
                }
            }
            TabletMetaInit::FromParam(param) => {
                if !param.is_valid() {
                    return Err(TabletMetaError::invalid_argument(
                        "migration tablet param is not valid",
                    ));
                }
            }
            TabletMetaInit::Override { old, param, .. } => {
                if !old.is_valid() {
                    return Err(TabletMetaError::invalid_argument(
                        "old tablet meta is not valid",
                    ));
                }
                if let Some(param) = param {
                    if !param.is_valid() {
                        return Err(TabletMetaError::invalid_argument(
                            "migration tablet param is not valid",
                        ));
                    }
                    if old.ls_id != param.ls_id || old.tablet_id != param.tablet_id {
                        return Err(TabletMetaError::invalid_argument(format!(
                            "param for {} {} cannot override tablet {} {}",
                            param.ls_id, param.tablet_id, old.ls_id, old.tablet_id
                        )));
                    }
                }
            }
        }
        if !self.is_valid() {
            return Err(TabletMetaError::invariant(format!(
                "resulting tablet meta is not valid: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Applies a later snapshot of this tablet's metadata.
    ///
    /// The three DDL watermarks are only overwritten when `param` carries
    /// them.
    pub fn update(&mut self, param: &MigrationTabletParam) -> Result<(), TabletMetaError> {
        let result = self.try_update(param);
        match &result {
            Ok(()) => debug!(
                "updated tablet meta {} {}: snapshot_version={} multi_version_start={}",
                self.ls_id, self.tablet_id, self.snapshot_version, self.multi_version_start
            ),
            Err(err) => warn!(
                "rejected update of tablet meta {} {}: {}",
                self.ls_id, self.tablet_id, err
            ),
        }
        result
    }

    fn try_update(&mut self, param: &MigrationTabletParam) -> Result<(), TabletMetaError> {
        if !self.is_inited {
            return Err(TabletMetaError::NotInit);
        }
        if !param.is_valid() {
            return Err(TabletMetaError::invalid_argument(
                "migration tablet param is not valid",
            ));
        }
        if self.ls_id != param.ls_id || self.tablet_id != param.tablet_id {
            return Err(TabletMetaError::invalid_argument(format!(
                "param for {} {} does not match tablet {} {}",
                param.ls_id, param.tablet_id, self.ls_id, self.tablet_id
            )));
        }
        let allocator = self
            .allocator
            .clone()
            .ok_or(TabletMetaError::NotInit)?;
        let mut updated = TabletMeta {
            version: self.version,
            length: self.length,
            ls_id: self.ls_id,
            tablet_id: self.tablet_id,
            data_tablet_id: param.data_tablet_id,
            ref_tablet_id: param.ref_tablet_id,
            has_next_tablet: self.has_next_tablet,
            create_scn: param.create_scn,
            start_scn: param.start_scn,
            clog_checkpoint_ts: param.clog_checkpoint_ts,
            ddl_checkpoint_ts: param.ddl_checkpoint_ts.unwrap_or(self.ddl_checkpoint_ts),
            ddl_start_log_ts: param.ddl_start_log_ts.unwrap_or(self.ddl_start_log_ts),
            ddl_snapshot_version: param
                .ddl_snapshot_version
                .unwrap_or(self.ddl_snapshot_version),
            snapshot_version: param.snapshot_version,
            multi_version_start: param.multi_version_start,
            compat_mode: param.compat_mode,
            autoinc_seq: param.autoinc_seq().deep_copy(&allocator)?,
            ha_status: param.ha_status,
            report_status: param.report_status,
            tx_data: param.tx_data,
            ddl_data: param.ddl_data().deep_copy(&allocator)?,
            table_store_flag: param.table_store_flag,
            max_sync_storage_schema_version: param.max_sync_storage_schema_version,
            is_inited: true,
            allocator: Some(allocator),
        };
        if !updated.is_valid() {
            return Err(TabletMetaError::invariant(format!(
                "updated tablet meta is not valid: {:?}",
                updated
            )));
        }
        updated.length = updated.record_length()?;
        *self = updated;
        Ok(())
    }

    /// Corrects the logical creation time of the tablet.
    ///
    /// Once a start point has been recorded, i.e. `start_scn` moved past
    /// [`Scn::INIT_CLOG_CHECKPOINT`], the tablet cannot have been created
    /// after it.
    pub fn update_create_scn(&mut self, create_scn: Scn) -> Result<(), TabletMetaError> {
        if !self.is_inited {
            return Err(TabletMetaError::NotInit);
        }
        if !create_scn.is_valid() {
            return Err(TabletMetaError::invalid_argument(format!(
                "invalid create_scn {}",
                create_scn
            )));
        }
        if !create_scn_precedes_start(create_scn, self.start_scn) {
            warn!(
                "rejected create_scn {} after start_scn {} for tablet {}",
                create_scn, self.start_scn, self.tablet_id
            );
            return Err(TabletMetaError::invariant(format!(
                "create_scn {} is after start_scn {}",
                create_scn, self.start_scn
            )));
        }
        self.create_scn = create_scn;
        Ok(())
    }

    /// Returns `self` to the uninitialized state, releasing arena charges.
    pub fn reset(&mut self) {
        *self = TabletMeta::default();
    }

    pub fn is_valid(&self) -> bool {
        let watermarks_ok = self.ha_status.is_restore_status_pending()
            || (self.start_scn >= Scn::INIT_CLOG_CHECKPOINT
                && self.clog_checkpoint_ts >= Scn::INIT_CLOG_CHECKPOINT);
        self.is_inited
            && self.ls_id.is_valid()
            && self.tablet_id.is_valid()
            && self.data_tablet_id.is_valid()
            && create_scn_precedes_start(self.create_scn, self.start_scn)
            && self.multi_version_start >= 0
            && self.multi_version_start <= self.snapshot_version
            && self.compat_mode.is_valid()
            && self.max_sync_storage_schema_version >= 0
            && self.ha_status.is_valid()
            && watermarks_ok
    }

    pub fn is_inited(&self) -> bool {
        self.is_inited
    }

    /// The exact number of bytes [`TabletMeta::serialize`] writes.
    pub fn get_serialize_size(&self) -> usize {
        RECORD_HEADER_LEN + Body(self).encoded_len()
    }

    fn record_length(&self) -> Result<i32, TabletMetaError> {
        Ok(i32::try_from(self.get_serialize_size()).map_err(CodecError::from)?)
    }

    /// Writes the encoded record into `buf` at `*pos`, advancing `*pos` past
    /// it.
    pub fn serialize(&self, buf: &mut [u8], pos: &mut usize) -> Result<(), TabletMetaError> {
        self.serialize_with_config(&TabletMetaConfig::default(), buf, pos)
    }

    /// Like [`TabletMeta::serialize`], refusing records longer than
    /// `cfg.max_record_bytes` so that whatever is written can be read back
    /// with the same config.
    pub fn serialize_with_config(
        &self,
        cfg: &TabletMetaConfig,
        buf: &mut [u8],
        pos: &mut usize,
    ) -> Result<(), TabletMetaError> {
        if !self.is_valid() {
            warn!("refusing to serialize invalid tablet meta {:?}", self);
            return Err(TabletMetaError::invalid_argument(
                "cannot serialize an invalid tablet meta",
            ));
        }
        codec::write_record(
            TABLET_META_VERSION,
            &Body(self),
            cfg.max_record_bytes,
            buf,
            pos,
        )?;
        Ok(())
    }

    /// Encodes into a fresh, exactly sized `Vec`.
    pub fn serialize_to_vec(&self) -> Result<Vec<u8>, TabletMetaError> {
        let mut buf = vec![0; self.get_serialize_size()];
        let mut pos = 0;
        self.serialize(&mut buf, &mut pos)?;
        Ok(buf)
    }

    /// Decodes the record at `*pos` into `self`, charging variable-length
    /// fields to `allocator`.
    ///
    /// On failure neither `self` nor `*pos` change.
    pub fn deserialize(
        &mut self,
        allocator: &ArenaAllocator,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<(), TabletMetaError> {
        self.deserialize_with_config(&TabletMetaConfig::default(), allocator, buf, pos)
    }

    /// Like [`TabletMeta::deserialize`], with an explicit bound on the record
    /// length.
    pub fn deserialize_with_config(
        &mut self,
        cfg: &TabletMetaConfig,
        allocator: &ArenaAllocator,
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<(), TabletMetaError> {
        if self.is_inited {
            return Err(TabletMetaError::InitTwice);
        }
        match Self::decode_record(cfg, allocator, buf, *pos) {
            Ok((meta, len)) => {
                *self = meta;
                *pos += len;
                debug!(
                    "deserialized tablet meta {} {} ({} bytes)",
                    self.ls_id, self.tablet_id, len
                );
                Ok(())
            }
            Err(err) => {
                warn!("failed to deserialize tablet meta at {}: {}", pos, err);
                Err(err)
            }
        }
    }

    fn decode_record(
        cfg: &TabletMetaConfig,
        allocator: &ArenaAllocator,
        buf: &[u8],
        pos: usize,
    ) -> Result<(TabletMeta, usize), TabletMetaError> {
        let (header, mut body) =
            codec::read_record(buf, pos, TABLET_META_VERSION, cfg.max_record_bytes)?;
        let c = &mut body;
        let meta = TabletMeta {
            version: header.version,
            length: header.length,
            ls_id: LsId::decode(c)?,
            tablet_id: TabletId::decode(c)?,
            data_tablet_id: TabletId::decode(c)?,
            ref_tablet_id: TabletId::decode(c)?,
            has_next_tablet: c.read_bool()?,
            create_scn: Scn::decode(c)?,
            start_scn: Scn::decode(c)?,
            clog_checkpoint_ts: Scn::decode(c)?,
            ddl_checkpoint_ts: Scn::decode(c)?,
            ddl_start_log_ts: Scn::decode(c)?,
            ddl_snapshot_version: c.read_i64()?,
            snapshot_version: c.read_i64()?,
            multi_version_start: c.read_i64()?,
            compat_mode: CompatMode::decode(c)?,
            autoinc_seq: TabletAutoincSeq::decode_in(c, allocator)?,
            ha_status: TabletHaStatus::decode(c)?,
            report_status: TabletReportStatus::decode(c)?,
            tx_data: TabletTxData::decode(c)?,
            ddl_data: TabletBindingInfo::decode_in(c, allocator)?,
            table_store_flag: TableStoreFlag::decode(c)?,
            max_sync_storage_schema_version: c.read_i64()?,
            is_inited: true,
            allocator: Some(allocator.clone()),
        };
        codec::expect_consumed(&body)?;
        if !meta.is_valid() {
            return Err(CodecError::corrupt(format!(
                "decoded tablet meta is not valid: {:?}",
                meta
            ))
            .into());
        }
        Ok((meta, header.len()))
    }

    /// Reads only the identity of the tablet meta record at `*pos`, advancing
    /// `*pos` past the identity fields.
    pub fn deserialize_id(
        buf: &[u8],
        pos: &mut usize,
    ) -> Result<(LsId, TabletId), TabletMetaError> {
        let (_, mut body) = codec::read_record(
            buf,
            *pos,
            TABLET_META_VERSION,
            TabletMetaConfig::default().max_record_bytes,
        )?;
        let ls_id = LsId::decode(&mut body)?;
        let tablet_id = TabletId::decode(&mut body)?;
        *pos += RECORD_HEADER_LEN + body.position();
        Ok((ls_id, tablet_id))
    }

    /// A JSON rendering of the meta for diagnostics.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// The length of the record this meta encodes to.
    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn ls_id(&self) -> LsId {
        self.ls_id
    }

    pub fn tablet_id(&self) -> TabletId {
        self.tablet_id
    }

    pub fn data_tablet_id(&self) -> TabletId {
        self.data_tablet_id
    }

    pub fn ref_tablet_id(&self) -> TabletId {
        self.ref_tablet_id
    }

    pub fn has_next_tablet(&self) -> bool {
        self.has_next_tablet
    }

    pub fn create_scn(&self) -> Scn {
        self.create_scn
    }

    pub fn start_scn(&self) -> Scn {
        self.start_scn
    }

    pub fn clog_checkpoint_ts(&self) -> Scn {
        self.clog_checkpoint_ts
    }

    pub fn ddl_checkpoint_ts(&self) -> Scn {
        self.ddl_checkpoint_ts
    }

    pub fn ddl_start_log_ts(&self) -> Scn {
        self.ddl_start_log_ts
    }

    pub fn ddl_snapshot_version(&self) -> i64 {
        self.ddl_snapshot_version
    }

    pub fn snapshot_version(&self) -> i64 {
        self.snapshot_version
    }

    pub fn multi_version_start(&self) -> i64 {
        self.multi_version_start
    }

    pub fn compat_mode(&self) -> CompatMode {
        self.compat_mode
    }

    pub fn autoinc_seq(&self) -> &TabletAutoincSeq {
        &self.autoinc_seq
    }

    pub fn ha_status(&self) -> TabletHaStatus {
        self.ha_status
    }

    pub fn report_status(&self) -> TabletReportStatus {
        self.report_status
    }

    pub fn tx_data(&self) -> TabletTxData {
        self.tx_data
    }

    pub fn ddl_data(&self) -> &TabletBindingInfo {
        &self.ddl_data
    }

    pub fn table_store_flag(&self) -> TableStoreFlag {
        self.table_store_flag
    }

    pub fn max_sync_storage_schema_version(&self) -> i64 {
        self.max_sync_storage_schema_version
    }
}

/// Once a start point has been recorded, i.e. `start_scn` moved past
/// [`Scn::INIT_CLOG_CHECKPOINT`], the tablet cannot have been created after it.
pub(crate) fn create_scn_precedes_start(create_scn: Scn, start_scn: Scn) -> bool {
    start_scn <= Scn::INIT_CLOG_CHECKPOINT || create_scn <= start_scn
}

/// The newer of `old` and an optionally supplied `new`.
fn newer<T: Ord>(old: T, new: Option<T>) -> T {
    match new {
        Some(new) => cmp::max(old, new),
        None => old,
    }
}

/// The fields of a [`TabletMeta`] record after the header.
struct Body<'a>(&'a TabletMeta);

impl Encode for Body<'_> {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        let m = self.0;
        m.ls_id.encode(buf);
        m.tablet_id.encode(buf);
        m.data_tablet_id.encode(buf);
        m.ref_tablet_id.encode(buf);
        m.has_next_tablet.encode(buf);
        m.create_scn.encode(buf);
        m.start_scn.encode(buf);
        m.clog_checkpoint_ts.encode(buf);
        m.ddl_checkpoint_ts.encode(buf);
        m.ddl_start_log_ts.encode(buf);
        m.ddl_snapshot_version.encode(buf);
        m.snapshot_version.encode(buf);
        m.multi_version_start.encode(buf);
        m.compat_mode.encode(buf);
        m.autoinc_seq.encode(buf);
        m.ha_status.encode(buf);
        m.report_status.encode(buf);
        m.tx_data.encode(buf);
        m.ddl_data.encode(buf);
        m.table_store_flag.encode(buf);
        m.max_sync_storage_schema_version.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        let m = self.0;
        m.ls_id.encoded_len()
            + m.tablet_id.encoded_len()
            + m.data_tablet_id.encoded_len()
            + m.ref_tablet_id.encoded_len()
            + m.has_next_tablet.encoded_len()
            + m.create_scn.encoded_len()
            + m.start_scn.encoded_len()
            + m.clog_checkpoint_ts.encoded_len()
            + m.ddl_checkpoint_ts.encoded_len()
            + m.ddl_start_log_ts.encoded_len()
            + m.ddl_snapshot_version.encoded_len()
            + m.snapshot_version.encoded_len()
            + m.multi_version_start.encoded_len()
            + m.compat_mode.encoded_len()
            + m.autoinc_seq.encoded_len()
            + m.ha_status.encoded_len()
            + m.report_status.encoded_len()
            + m.tx_data.encoded_len()
            + m.ddl_data.encoded_len()
            + m.table_store_flag.encoded_len()
            + m.max_sync_storage_schema_version.encoded_len()
    }
}

/// Compares the persistent fields and the initialization state; the
/// allocator handle is not part of a meta's value.
impl PartialEq for TabletMeta {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.length == other.length
            && self.ls_id == other.ls_id
            && self.tablet_id == other.tablet_id
            && self.data_tablet_id == other.data_tablet_id
            && self.ref_tablet_id == other.ref_tablet_id
            && self.has_next_tablet == other.has_next_tablet
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
            && self.table_store_flag == other.table_store_flag
            && self.max_sync_storage_schema_version == other.max_sync_storage_schema_version
            && self.is_inited == other.is_inited
    }
}

impl Eq for TabletMeta {}

impl fmt::Debug for TabletMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabletMeta")
            .field("version", &self.version)
            .field("length", &self.length)
            .field("ls_id", &self.ls_id)
            .field("tablet_id", &self.tablet_id)
            .field("data_tablet_id", &self.data_tablet_id)
            .field("ref_tablet_id", &self.ref_tablet_id)
            .field("has_next_tablet", &self.has_next_tablet)
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
            .field("table_store_flag", &self.table_store_flag)
            .field(
                "max_sync_storage_schema_version",
                &self.max_sync_storage_schema_version,
            )
            .field("is_inited", &self.is_inited)
            .finish()
    }
}
