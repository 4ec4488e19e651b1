// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Byte-accounted arenas for the variable-length parts of tablet metadata.
//!
//! An [`ArenaAllocator`] does not hand out raw memory. It accounts for the
//! bytes held by values built through it (see [`ArenaVec`]) and refuses
//! allocations past its limit. The accounting is released when the owning
//! value is dropped, so a value's footprint is always attributed to the arena
//! it was allocated from, never to a process-wide allocator.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BufMut;
use mz_tablet_types::{Codec, Cursor, Encode};
use serde::{Serialize, Serializer};

use crate::error::TabletMetaError;

/// An allocation request an arena could not satisfy.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error(
    "arena {label} exhausted: requested {requested} bytes with {used} of {limit} bytes in use"
)]
pub struct AllocError {
    pub label: String,
    pub requested: usize,
    pub used: usize,
    pub limit: usize,
}

/// A cheaply clonable handle to a byte-accounted arena.
#[derive(Clone)]
pub struct ArenaAllocator {
    inner: Arc<ArenaState>,
}

struct ArenaState {
    label: String,
    limit: usize,
    used: AtomicUsize,
}

impl ArenaAllocator {
    /// Returns an arena without a limit.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_limit(label, usize::MAX)
    }

    /// Returns an arena that refuses to hold more than `limit` bytes.
    pub fn with_limit(label: impl Into<String>, limit: usize) -> Self {
        ArenaAllocator {
            inner: Arc::new(ArenaState {
                label: label.into(),
                limit,
                used: AtomicUsize::new(0),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Bytes currently charged to this arena.
    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::SeqCst)
    }

    /// Charges `size` bytes to this arena.
    pub fn alloc(&self, size: usize) -> Result<ArenaCharge, AllocError> {
        let result = self
            .inner
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(size)
                    .filter(|total| *total <= self.inner.limit)
            });
        match result {
            Ok(_) => Ok(ArenaCharge {
                arena: self.clone(),
                size,
            }),
            Err(used) => Err(AllocError {
                label: self.inner.label.clone(),
                requested: size,
                used,
                limit: self.inner.limit,
            }),
        }
    }

    /// Returns the bytes of `charge` to this arena.
    ///
    /// Dropping the charge has the same effect.
    pub fn free(&self, charge: ArenaCharge) {
        debug_assert!(Arc::ptr_eq(&self.inner, &charge.arena.inner));
        drop(charge);
    }

    /// Whether `self` and `other` are handles to the same arena.
    pub fn same_arena(&self, other: &ArenaAllocator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ArenaAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("label", &self.inner.label)
            .field("used", &self.used())
            .field("limit", &self.inner.limit)
            .finish()
    }
}

/// Bytes held against an arena. Released on drop.
pub struct ArenaCharge {
    arena: ArenaAllocator,
    size: usize,
}

impl ArenaCharge {
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for ArenaCharge {
    fn drop(&mut self) {
        self.arena.inner.used.fetch_sub(self.size, Ordering::SeqCst);
    }
}

impl fmt::Debug for ArenaCharge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaCharge({}, {})", self.arena.label(), self.size)
    }
}

/// An owned list whose footprint is charged to an [`ArenaAllocator`].
///
/// There is no `Clone`: copies go through [`ArenaVec::deep_copy`] and are
/// charged to an explicit arena. Equality and serialization only look at the
/// elements.
pub struct ArenaVec<T> {
    items: Vec<T>,
    charge: Option<ArenaCharge>,
}

impl<T> ArenaVec<T> {
    /// An empty list. Holds no charge.
    pub fn new() -> Self {
        ArenaVec {
            items: Vec::new(),
            charge: None,
        }
    }

    /// Moves `items` into a list charged to `arena`.
    pub fn from_vec_in(items: Vec<T>, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        let charge = if items.is_empty() {
            None
        } else {
            Some(arena.alloc(items.len().saturating_mul(std::mem::size_of::<T>()))?)
        };
        Ok(ArenaVec { items, charge })
    }
}

impl<T: Clone> ArenaVec<T> {
    /// Copies `items` into a list charged to `arena`.
    pub fn from_slice_in(items: &[T], arena: &ArenaAllocator) -> Result<Self, AllocError> {
        Self::from_vec_in(items.to_vec(), arena)
    }

    /// Copies this list into `arena`.
    pub fn deep_copy(&self, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        Self::from_slice_in(&self.items, arena)
    }

    /// Returns a copy with `item` appended, charged to `arena`.
    pub fn with_pushed(&self, item: T, arena: &ArenaAllocator) -> Result<Self, AllocError> {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend_from_slice(&self.items);
        items.push(item);
        Self::from_vec_in(items, arena)
    }
}

impl<T: Encode> ArenaVec<T> {
    /// Encodes as a `u32` count followed by the elements.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        mz_tablet_types::codec::put_len(buf, self.items.len());
        for item in &self.items {
            item.encode(buf);
        }
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.items.iter().map(Encode::encoded_len).sum::<usize>()
    }
}

impl<T: Codec> ArenaVec<T> {
    /// Decodes a list written by [`ArenaVec::encode`] into `arena`.
    /// `min_elem_len` is the smallest encoding of one element.
    pub fn decode_in(
        buf: &mut Cursor<'_>,
        arena: &ArenaAllocator,
        min_elem_len: usize,
    ) -> Result<Self, TabletMetaError> {
        let count = buf.read_len(min_elem_len)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(buf)?);
        }
        Ok(Self::from_vec_in(items, arena)?)
    }
}

/// Decoding and copying for metadata values that own arena-backed data.
pub trait ArenaCodec: Encode + Sized {
    /// Decodes a value, charging its variable-length parts to `arena`.
    fn decode_in(buf: &mut Cursor<'_>, arena: &ArenaAllocator) -> Result<Self, TabletMetaError>;

    /// Copies this value, charging the copy to `arena`.
    fn deep_copy(&self, arena: &ArenaAllocator) -> Result<Self, AllocError>;
}

impl<T> Default for ArenaVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for ArenaVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq> PartialEq for ArenaVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Eq> Eq for ArenaVec<T> {}

impl<T: fmt::Debug> fmt::Debug for ArenaVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: Serialize> Serialize for ArenaVec<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_are_released_on_drop() {
        let arena = ArenaAllocator::new("test");
        let a = ArenaVec::from_slice_in(&[1u64, 2, 3], &arena).unwrap();
        assert_eq!(arena.used(), 24);
        let b = a.deep_copy(&arena).unwrap();
        assert_eq!(arena.used(), 48);
        assert_eq!(a, b);
        drop(a);
        assert_eq!(arena.used(), 24);
        drop(b);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn limit_is_enforced() {
        let arena = ArenaAllocator::with_limit("small", 16);
        let ok = arena.alloc(16).unwrap();
        assert_eq!(ok.size(), 16);
        let err = arena.alloc(1).unwrap_err();
        assert_eq!(
            err,
            AllocError {
                label: "small".into(),
                requested: 1,
                used: 16,
                limit: 16,
            }
        );
        arena.free(ok);
        assert_eq!(arena.used(), 0);
        assert!(ArenaVec::from_slice_in(&[0u64; 3], &arena).is_err());
        // Empty lists never charge, so they always fit.
        assert!(ArenaVec::<u64>::from_slice_in(&[], &arena).is_ok());
    }

    #[test]
    fn copies_are_charged_to_the_target_arena() {
        let src = ArenaAllocator::new("src");
        let dst = ArenaAllocator::new("dst");
        let a = ArenaVec::from_slice_in(&[7u32], &src).unwrap();
        let b = a.deep_copy(&dst).unwrap();
        assert_eq!(src.used(), 4);
        assert_eq!(dst.used(), 4);
        assert!(!src.same_arena(&dst));
        drop(a);
        assert_eq!(src.used(), 0);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn codec_roundtrip() {
        let arena = ArenaAllocator::new("codec");
        let a = ArenaVec::from_slice_in(&[1i64, -1], &arena).unwrap();
        let mut buf = Vec::new();
        a.encode(&mut buf);
        assert_eq!(buf.len(), a.encoded_len());
        let b = ArenaVec::<i64>::decode_in(&mut Cursor::new(&buf), &arena, 8).unwrap();
        assert_eq!(a, b);
    }
}
