// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Wire format behavior of tablet meta records.

use mz_tablet::flag::TableStoreFlag;
use mz_tablet::{
    ArenaAllocator, CreateTabletArgs, TABLET_META_VERSION, TabletMeta, TabletMetaConfig,
    TabletMetaErrorKind, TabletMetaInit,
};
use mz_tablet_types::{CompatMode, LsId, Scn, TabletId};
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn create(
    arena: &ArenaAllocator,
    ls_id: i64,
    tablet_id: u64,
    snapshot_version: i64,
) -> TabletMeta {
    let mut meta = TabletMeta::new();
    meta.init(
        arena,
        TabletMetaInit::Create(CreateTabletArgs {
            ls_id: LsId(ls_id),
            tablet_id: TabletId(tablet_id),
            data_tablet_id: TabletId(tablet_id),
            lob_meta_tablet_id: TabletId(tablet_id + 1),
            lob_piece_tablet_id: TabletId(tablet_id + 2),
            create_scn: Scn(3),
            snapshot_version,
            compat_mode: CompatMode::Oracle,
            table_store_flag: TableStoreFlag::default(),
            max_sync_storage_schema_version: 1,
        }),
    )
    .expect("valid create args");
    meta
}

#[test]
fn size_matches_bytes_written() -> Result<(), anyhow::Error> {
    init_logging();
    let arena = ArenaAllocator::new("encoding");
    let meta = create(&arena, 1, 100, 1);
    let size = meta.get_serialize_size();
    let mut buf = vec![0u8; size];
    let mut pos = 0;
    meta.serialize(&mut buf, &mut pos)?;
    assert_eq!(pos, size);
    assert_eq!(i32::from_be_bytes(buf[0..4].try_into()?), TABLET_META_VERSION);
    assert_eq!(usize::try_from(i32::from_be_bytes(buf[4..8].try_into()?))?, size);
    Ok(())
}

#[test]
fn records_back_to_back() -> Result<(), anyhow::Error> {
    init_logging();
    let arena = ArenaAllocator::new("encoding");
    let a = create(&arena, 1, 100, 1);
    let b = create(&arena, 2, 200, 5);
    let mut buf = vec![0u8; a.get_serialize_size() + b.get_serialize_size()];
    let mut pos = 0;
    a.serialize(&mut buf, &mut pos)?;
    b.serialize(&mut buf, &mut pos)?;

    let mut pos = 0;
    let mut decoded_a = TabletMeta::new();
    decoded_a.deserialize(&arena, &buf, &mut pos)?;
    let mut id_pos = pos;
    let mut decoded_b = TabletMeta::new();
    decoded_b.deserialize(&arena, &buf, &mut pos)?;
    assert_eq!(pos, buf.len());
    assert_eq!(decoded_a, a);
    assert_eq!(decoded_b, b);

    let (ls_id, tablet_id) = TabletMeta::deserialize_id(&buf, &mut id_pos)?;
    assert_eq!((ls_id, tablet_id), (decoded_b.ls_id(), decoded_b.tablet_id()));
    Ok(())
}

#[test]
fn unknown_version_is_rejected_without_side_effects() -> Result<(), anyhow::Error> {
    init_logging();
    let arena = ArenaAllocator::new("encoding");
    let meta = create(&arena, 1, 100, 1);
    let mut buf = meta.serialize_to_vec()?;
    buf[0..4].copy_from_slice(&(TABLET_META_VERSION + 1).to_be_bytes());

    let mut target = TabletMeta::new();
    let mut pos = 0;
    let err = target.deserialize(&arena, &buf, &mut pos).unwrap_err();
    assert_eq!(err.kind(), TabletMetaErrorKind::Format);
    assert_eq!(pos, 0);
    assert!(!target.is_inited());
    assert_eq!(target, TabletMeta::new());
    assert_eq!(arena.used(), 0);

    let err = TabletMeta::deserialize_id(&buf, &mut pos).unwrap_err();
    assert_eq!(err.kind(), TabletMetaErrorKind::Format);
    assert_eq!(pos, 0);
    Ok(())
}

#[test]
fn truncated_and_oversized_records() -> Result<(), anyhow::Error> {
    init_logging();
    let arena = ArenaAllocator::new("encoding");
    let meta = create(&arena, 1, 100, 1);
    let buf = meta.serialize_to_vec()?;

    for cut in [0, 4, 8, buf.len() / 2, buf.len() - 1] {
        let mut target = TabletMeta::new();
        let mut pos = 0;
        let err = target.deserialize(&arena, &buf[..cut], &mut pos).unwrap_err();
        assert_eq!(err.kind(), TabletMetaErrorKind::Format, "cut at {}", cut);
        assert_eq!(pos, 0);
    }

    let cfg = TabletMetaConfig {
        max_record_bytes: buf.len() - 1,
        ..Default::default()
    };
    let mut target = TabletMeta::new();
    let err = target
        .deserialize_with_config(&cfg, &arena, &buf, &mut 0)
        .unwrap_err();
    assert_eq!(err.kind(), TabletMetaErrorKind::Format);

    let mut short_length = buf.clone();
    short_length[4..8].copy_from_slice(&4i32.to_be_bytes());
    let err = target
        .deserialize(&arena, &short_length, &mut 0)
        .unwrap_err();
    assert_eq!(err.kind(), TabletMetaErrorKind::Format);
    Ok(())
}

#[test]
fn invalid_meta_is_not_serialized() {
    init_logging();
    let meta = TabletMeta::new();
    let mut buf = vec![0u8; 1024];
    let mut pos = 0;
    let err = meta.serialize(&mut buf, &mut pos).unwrap_err();
    assert_eq!(err.kind(), TabletMetaErrorKind::InvalidArgument);
    assert_eq!(pos, 0);
}

#[test]
fn deserialize_into_initialized_meta_fails() -> Result<(), anyhow::Error> {
    init_logging();
    let arena = ArenaAllocator::new("encoding");
    let mut meta = create(&arena, 1, 100, 1);
    let buf = meta.serialize_to_vec()?;
    let err = meta.deserialize(&arena, &buf, &mut 0).unwrap_err();
    assert_eq!(err.kind(), TabletMetaErrorKind::ReInit);
    Ok(())
}

proptest! {
    #[test]
    fn deserialize_id_agrees_with_deserialize(
        ls_id in 0i64..,
        tablet_id in 1u64..u64::MAX - 2,
        snapshot_version in 0i64..,
        offset in 0usize..16,
    ) {
        let arena = ArenaAllocator::new("prop");
        let meta = create(&arena, ls_id, tablet_id, snapshot_version);
        let mut buf = vec![0u8; offset + meta.get_serialize_size()];
        let mut pos = offset;
        meta.serialize(&mut buf, &mut pos).unwrap();

        let mut id_pos = offset;
        let ids = TabletMeta::deserialize_id(&buf, &mut id_pos).unwrap();
        let mut full = TabletMeta::new();
        full.deserialize(&arena, &buf, &mut offset.clone()).unwrap();
        prop_assert_eq!(ids, (full.ls_id(), full.tablet_id()));
        prop_assert_eq!(full, meta);
    }

    #[test]
    fn garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let arena = ArenaAllocator::new("prop");
        let mut target = TabletMeta::new();
        let mut pos = 0;
        if target.deserialize(&arena, &bytes, &mut pos).is_err() {
            prop_assert_eq!(pos, 0);
            prop_assert!(!target.is_inited());
        }
        let _ = TabletMeta::deserialize_id(&bytes, &mut 0);
    }
}
