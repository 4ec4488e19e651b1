// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Persistent tablet metadata and its migration snapshot.
//!
//! [`TabletMeta`] is the per-tablet descriptor a storage node keeps for every
//! tablet it hosts: identity, the watermarks that bound recovery and reads,
//! and a handful of side-data units (auto-increment state, replication
//! readiness, reporting state, transaction state, DDL bindings).
//!
//! [`MigrationTabletParam`] is the self-contained form of the same
//! information that is shipped between nodes when a tablet migrates or is
//! restored. It additionally carries the tablet's [`StorageSchema`] and
//! medium compaction history so the receiver needs nothing else to host the
//! tablet.
//!
//! Both are plain values without internal synchronization. Variable-length
//! parts are charged to an [`ArenaAllocator`] that the caller passes in (or,
//! for a migration param, that the param owns).

#![warn(missing_debug_implementations)]

pub mod alloc;
pub mod autoinc;
pub mod binding;
pub mod cfg;
pub mod error;
pub mod flag;
pub mod ha;
pub mod medium;
pub mod meta;
pub mod migration;
pub mod report;
pub mod schema;
pub mod tx;

pub use crate::alloc::{AllocError, ArenaAllocator, ArenaCodec, ArenaVec};
pub use crate::cfg::TabletMetaConfig;
pub use crate::error::{TabletMetaError, TabletMetaErrorKind};
pub use crate::meta::{
    CreateTabletArgs, DeriveTabletArgs, TABLET_META_VERSION, TabletMeta, TabletMetaInit,
};
pub use crate::migration::{MIGRATION_TABLET_PARAM_VERSION, MigrationTabletParam};
pub use crate::schema::StorageSchema;
