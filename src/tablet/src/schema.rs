// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The denormalized storage schema that travels with a migrating tablet.
//!
//! A storage schema is the subset of a table's schema the storage layer needs
//! to read and merge the tablet's data without consulting the catalog: the
//! rowkey, the column types and a handful of physical layout knobs. It is
//! carried inside a [`MigrationTabletParam`](crate::migration::MigrationTabletParam)
//! so the receiving node can materialize the tablet before the catalog has
//! caught up.
//!
//! A restore placeholder has no real schema yet. It gets a minimal one from
//! [`StorageSchema::placeholder`] with [`StorageSchema::is_placeholder`] set,
//! and [`StorageSchema::check_queryable`] refuses to let reads through it.

use bytes::BufMut;
use mz_tablet_types::{Codec, CodecError, CompatMode, Cursor, Encode};
use serde::Serialize;

use crate::alloc::{AllocError, ArenaAllocator, ArenaCodec, ArenaVec};
use crate::error::TabletMetaError;

/// Format version of the encoded storage schema.
pub const STORAGE_SCHEMA_VERSION: i32 = 1;

/// The smallest column id a user table column can have. Smaller ids are
/// reserved for hidden system columns.
pub const MIN_APP_COLUMN_ID: u64 = 16;

pub const DEFAULT_TABLET_SIZE: i64 = 128 * 1024 * 1024;
pub const DEFAULT_PCTFREE: i64 = 10;
pub const DEFAULT_BLOCK_SIZE: i64 = 16 * 1024;

macro_rules! tagged_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl Encode for $name {
            fn encode<B>(&self, buf: &mut B)
            where
                B: BufMut,
            {
                let tag: u8 = match self {
                    $($name::$variant => $tag),+
                };
                buf.put_u8(tag);
            }

            fn encoded_len(&self) -> usize {
                1
            }
        }

        impl Codec for $name {
            fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
                buf.read_tag(stringify!($name), |tag| match tag {
                    $($tag => Some($name::$variant),)+
                    _ => None,
                })
            }
        }
    };
}

tagged_enum!(
    /// The kind of table a tablet belongs to.
    TableType {
        System = 0,
        User = 1,
        Temporary = 2,
        Index = 3,
        MaterializedView = 4,
    }
);

tagged_enum!(
    /// For index tablets, the kind of index.
    IndexType {
        NotIndex = 0,
        NormalLocal = 1,
        UniqueLocal = 2,
        NormalGlobal = 3,
        UniqueGlobal = 4,
    }
);

tagged_enum!(
    /// Physical row layout of the tablet's storage units.
    RowStoreType {
        Flat = 0,
        Encoding = 1,
        SelectiveEncoding = 2,
    }
);

tagged_enum!(
    /// Storage type of a column value.
    ColumnType {
        Null = 0,
        TinyInt = 1,
        SmallInt = 2,
        Int = 3,
        BigInt = 4,
        UInt64 = 5,
        Float = 6,
        Double = 7,
        Number = 8,
        DateTime = 9,
        Timestamp = 10,
        Varchar = 11,
        Char = 12,
        Text = 13,
        Lob = 14,
    }
);

tagged_enum!(
    SortOrder {
        Asc = 0,
        Desc = 1,
    }
);

/// One column of the rowkey, in rowkey order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RowkeyColumn {
    pub column_idx: u64,
    pub meta_type: ColumnType,
    pub order: SortOrder,
}

impl Encode for RowkeyColumn {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u64(self.column_idx);
        self.meta_type.encode(buf);
        self.order.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        10
    }
}

impl Codec for RowkeyColumn {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(RowkeyColumn {
            column_idx: buf.read_u64()?,
            meta_type: ColumnType::decode(buf)?,
            order: SortOrder::decode(buf)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub meta_type: ColumnType,
    /// Virtual columns are computed on read and not stored.
    pub is_column_stored_in_sstable: bool,
    pub default_checksum: i64,
}

impl Encode for ColumnSchema {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        self.meta_type.encode(buf);
        self.is_column_stored_in_sstable.encode(buf);
        buf.put_i64(self.default_checksum);
    }

    fn encoded_len(&self) -> usize {
        10
    }
}

impl Codec for ColumnSchema {
    fn decode(buf: &mut Cursor<'_>) -> Result<Self, CodecError> {
        Ok(ColumnSchema {
            meta_type: ColumnType::decode(buf)?,
            is_column_stored_in_sstable: buf.read_bool()?,
            default_checksum: buf.read_i64()?,
        })
    }
}

/// The storage layer's view of a table schema.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct StorageSchema {
    pub storage_schema_version: i32,
    pub schema_version: i64,
    pub compat_mode: CompatMode,
    pub table_type: TableType,
    pub index_type: IndexType,
    pub row_store_type: RowStoreType,
    pub is_use_bloomfilter: bool,
    pub tablet_size: i64,
    pub pctfree: i64,
    pub block_size: i64,
    pub progressive_merge_round: i64,
    pub progressive_merge_num: i64,
    pub master_key_id: u64,
    rowkey_columns: ArenaVec<RowkeyColumn>,
    columns: ArenaVec<ColumnSchema>,
    is_placeholder: bool,
}

impl Default for StorageSchema {
    fn default() -> Self {
        StorageSchema {
            storage_schema_version: STORAGE_SCHEMA_VERSION,
            schema_version: 0,
            compat_mode: CompatMode::Invalid,
            table_type: TableType::User,
            index_type: IndexType::NotIndex,
            row_store_type: RowStoreType::Flat,
            is_use_bloomfilter: false,
            tablet_size: DEFAULT_TABLET_SIZE,
            pctfree: DEFAULT_PCTFREE,
            block_size: DEFAULT_BLOCK_SIZE,
            progressive_merge_round: 0,
            progressive_merge_num: 0,
            master_key_id: 0,
            rowkey_columns: ArenaVec::new(),
            columns: ArenaVec::new(),
            is_placeholder: false,
        }
    }
}

impl StorageSchema {
    /// Builds a user table schema with the given columns, charged to `arena`.
    pub fn new_in(
        schema_version: i64,
        compat_mode: CompatMode,
        rowkey_columns: &[RowkeyColumn],
        columns: &[ColumnSchema],
        arena: &ArenaAllocator,
    ) -> Result<Self, TabletMetaError> {
        let schema = StorageSchema {
            schema_version,
            compat_mode,
            rowkey_columns: ArenaVec::from_slice_in(rowkey_columns, arena)?,
            columns: ArenaVec::from_slice_in(columns, arena)?,
            ..Default::default()
        };
        if !schema.is_valid() {
            return Err(TabletMetaError::invalid_argument(format!(
                "invalid storage schema: {:?}",
                schema
            )));
        }
        Ok(schema)
    }

    /// The schema of a tablet whose restore has not started: a single tiny
    /// int rowkey column and nothing else.
    pub fn placeholder(arena: &ArenaAllocator) -> Result<Self, TabletMetaError> {
        let rowkey = RowkeyColumn {
            column_idx: MIN_APP_COLUMN_ID,
            meta_type: ColumnType::TinyInt,
            order: SortOrder::Asc,
        };
        let column = ColumnSchema {
            meta_type: ColumnType::TinyInt,
            is_column_stored_in_sstable: true,
            default_checksum: 0,
        };
        let mut schema = StorageSchema::new_in(0, CompatMode::MySql, &[rowkey], &[column], arena)?;
        schema.is_placeholder = true;
        Ok(schema)
    }

    pub fn is_placeholder(&self) -> bool {
        self.is_placeholder
    }

    pub fn rowkey_columns(&self) -> &[RowkeyColumn] {
        &self.rowkey_columns
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn rowkey_column_num(&self) -> usize {
        self.rowkey_columns.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of columns that are physically stored, i.e. not virtual.
    pub fn stored_column_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.is_column_stored_in_sstable)
            .count()
    }

    pub fn is_valid(&self) -> bool {
        self.storage_schema_version == STORAGE_SCHEMA_VERSION
            && self.schema_version >= 0
            && !self.rowkey_columns.is_empty()
            && self.columns.len() >= self.rowkey_columns.len()
            && self.compat_mode.is_valid()
            && self.block_size > 0
    }

    /// Fails for schemas that cannot be used to read data, i.e. restore
    /// placeholders.
    pub fn check_queryable(&self) -> Result<(), TabletMetaError> {
        if self.is_placeholder {
            return Err(TabletMetaError::invalid_argument(
                "placeholder storage schema is not queryable",
            ));
        }
        Ok(())
    }
}

impl Encode for StorageSchema {
    fn encode<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_i32(self.storage_schema_version);
        buf.put_i64(self.schema_version);
        self.compat_mode.encode(buf);
        self.table_type.encode(buf);
        self.index_type.encode(buf);
        self.row_store_type.encode(buf);
        self.is_use_bloomfilter.encode(buf);
        buf.put_i64(self.tablet_size);
        buf.put_i64(self.pctfree);
        buf.put_i64(self.block_size);
        buf.put_i64(self.progressive_merge_round);
        buf.put_i64(self.progressive_merge_num);
        buf.put_u64(self.master_key_id);
        self.is_placeholder.encode(buf);
        self.rowkey_columns.encode(buf);
        self.columns.encode(buf);
    }

    fn encoded_len(&self) -> usize {
        4 + 8
            + 5
            + 8 * 6
            + 1
            + self.rowkey_columns.encoded_len()
            + self.columns.encoded_len()
    }
}

impl ArenaCodec for StorageSchema {
    fn decode_in(buf: &mut Cursor<'_>, arena: &ArenaAllocator) -> Result<Self, TabletMetaError> {
        let storage_schema_version = buf.read_i32()?;
        if storage_schema_version != STORAGE_SCHEMA_VERSION {
            return Err(CodecError::InvalidEncodingVersion {
                expected: STORAGE_SCHEMA_VERSION,
                actual: storage_schema_version,
            }
            .into());
        }
        Ok(StorageSchema {
            storage_schema_version,
            schema_version: buf.read_i64()?,
            compat_mode: CompatMode::decode(buf)?,
            table_type: TableType::decode(buf)?,
            index_type: IndexType::decode(buf)?,
            row_store_type: RowStoreType::decode(buf)?,
            is_use_bloomfilter: buf.read_bool()?,
            tablet_size: buf.read_i64()?,
            pctfree: buf.read_i64()?,
            block_size: buf.read_i64()?,
            progressive_merge_round: buf.read_i64()?,
            progressive_merge_num: buf.read_i64()?,
            master_key_id: buf.read_u64()?,
            is_placeholder: buf.read_bool()?,
            rowkey_columns: ArenaVec::decode_in(buf, arena, 10)?,
            columns: ArenaVec::decode_in(buf, arena, 10)?,
        })
    }

    fn deep_copy(&self, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        Ok(StorageSchema {
            storage_schema_version: self.storage_schema_version,
            schema_version: self.schema_version,
            compat_mode: self.compat_mode,
            table_type: self.table_type,
            index_type: self.index_type,
            row_store_type: self.row_store_type,
            is_use_bloomfilter: self.is_use_bloomfilter,
            tablet_size: self.tablet_size,
            pctfree: self.pctfree,
            block_size: self.block_size,
            progressive_merge_round: self.progressive_merge_round,
            progressive_merge_num: self.progressive_merge_num,
            master_key_id: self.master_key_id,
            rowkey_columns: self.rowkey_columns.deep_copy(arena)?,
            columns: self.columns.deep_copy(arena)?,
            is_placeholder: self.is_placeholder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema(arena: &ArenaAllocator) -> StorageSchema {
        let rowkey = [RowkeyColumn {
            column_idx: 16,
            meta_type: ColumnType::BigInt,
            order: SortOrder::Asc,
        }];
        let columns = [
            ColumnSchema {
                meta_type: ColumnType::BigInt,
                is_column_stored_in_sstable: true,
                default_checksum: 0,
            },
            ColumnSchema {
                meta_type: ColumnType::Varchar,
                is_column_stored_in_sstable: false,
                default_checksum: 42,
            },
        ];
        StorageSchema::new_in(3, CompatMode::Oracle, &rowkey, &columns, arena).unwrap()
    }

    #[test]
    fn placeholder() {
        let arena = ArenaAllocator::new("schema");
        let schema = StorageSchema::placeholder(&arena).unwrap();
        assert!(schema.is_valid());
        assert!(schema.is_placeholder());
        assert_eq!(schema.rowkey_column_num(), 1);
        assert_eq!(schema.rowkey_columns()[0].column_idx, MIN_APP_COLUMN_ID);
        assert_eq!(schema.rowkey_columns()[0].meta_type, ColumnType::TinyInt);
        assert_eq!(schema.block_size, DEFAULT_BLOCK_SIZE);
        assert!(matches!(
            schema.check_queryable(),
            Err(TabletMetaError::InvalidArgument(_))
        ));
        assert!(user_schema(&arena).check_queryable().is_ok());
    }

    #[test]
    fn validity() {
        let arena = ArenaAllocator::new("schema");
        assert!(!StorageSchema::default().is_valid());
        let err = StorageSchema::new_in(1, CompatMode::MySql, &[], &[], &arena).unwrap_err();
        assert!(matches!(err, TabletMetaError::InvalidArgument(_)));

        let mut schema = user_schema(&arena);
        assert!(schema.is_valid());
        assert_eq!(schema.stored_column_count(), 1);
        schema.block_size = 0;
        assert!(!schema.is_valid());
    }

    #[test]
    fn codec_keeps_placeholder_marker() {
        let arena = ArenaAllocator::new("schema");
        let schema = StorageSchema::placeholder(&arena).unwrap();
        let buf = schema.encode_to_vec();
        assert_eq!(buf.len(), schema.encoded_len());
        let decoded = StorageSchema::decode_in(&mut Cursor::new(&buf), &arena).unwrap();
        assert!(decoded.is_placeholder());
        assert_eq!(decoded, schema);

        let schema = user_schema(&arena);
        let buf = schema.encode_to_vec();
        let decoded = StorageSchema::decode_in(&mut Cursor::new(&buf), &arena).unwrap();
        assert_eq!(decoded, schema);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let arena = ArenaAllocator::new("schema");
        let mut buf = user_schema(&arena).encode_to_vec();
        buf[3] = 9;
        let err = StorageSchema::decode_in(&mut Cursor::new(&buf), &arena).unwrap_err();
        assert_eq!(
            err,
            TabletMetaError::Codec(CodecError::InvalidEncodingVersion {
                expected: 1,
                actual: 9
            })
        );
    }

    #[test]
    fn deep_copy_charges_target() {
        let src = ArenaAllocator::new("src");
        let dst = ArenaAllocator::new("dst");
        let schema = user_schema(&src);
        let copy = schema.deep_copy(&dst).unwrap();
        assert_eq!(copy, schema);
        assert_eq!(dst.used(), src.used());
        drop(schema);
        assert_eq!(src.used(), 0);
        assert!(copy.is_valid());
    }
}
