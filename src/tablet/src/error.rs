// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Errors for the crate

use std::fmt;

use mz_tablet_types::CodecError;

use crate::alloc::AllocError;

/// An error from constructing, updating or (de)serializing tablet metadata.
///
/// Every failure is reported synchronously to the caller and nothing is
/// retried here. Retry policy, e.g. re-fetching a migration param after a
/// format error, belongs to the caller.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TabletMetaError {
    /// `init` was called on an already initialized instance.
    #[error("tablet meta is already initialized")]
    InitTwice,
    /// The operation needs an initialized instance.
    #[error("tablet meta is not initialized")]
    NotInit,
    /// A caller supplied identifier or value is unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The result of the operation would break a metadata invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// An arena refused an allocation.
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The encoded form is unreadable or from an unknown version.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Stable taxonomy of [`TabletMetaError`], independent of message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TabletMetaErrorKind {
    ReInit,
    NotInit,
    InvalidArgument,
    InvariantViolation,
    Alloc,
    Format,
}

impl TabletMetaError {
    pub fn kind(&self) -> TabletMetaErrorKind {
        match self {
            TabletMetaError::InitTwice => TabletMetaErrorKind::ReInit,
            TabletMetaError::NotInit => TabletMetaErrorKind::NotInit,
            TabletMetaError::InvalidArgument(_) => TabletMetaErrorKind::InvalidArgument,
            TabletMetaError::InvariantViolation(_) => TabletMetaErrorKind::InvariantViolation,
            TabletMetaError::Alloc(_) => TabletMetaErrorKind::Alloc,
            TabletMetaError::Codec(_) => TabletMetaErrorKind::Format,
        }
    }

    pub(crate) fn invalid_argument(msg: impl fmt::Display) -> Self {
        TabletMetaError::InvalidArgument(msg.to_string())
    }

    pub(crate) fn invariant(msg: impl fmt::Display) -> Self {
        TabletMetaError::InvariantViolation(msg.to_string())
    }
}

impl TabletMetaErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabletMetaErrorKind::ReInit => "re_init",
            TabletMetaErrorKind::NotInit => "not_init",
            TabletMetaErrorKind::InvalidArgument => "invalid_argument",
            TabletMetaErrorKind::InvariantViolation => "invariant_violation",
            TabletMetaErrorKind::Alloc => "alloc",
            TabletMetaErrorKind::Format => "format",
        }
    }
}

impl fmt::Display for TabletMetaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
