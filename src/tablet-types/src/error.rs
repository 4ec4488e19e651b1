// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Codec related errors.

/// A codec related error.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The encoding version is incompatible with what we can currently decode.
    #[error("invalid encoding version: expected {expected}, got {actual}")]
    InvalidEncodingVersion {
        /// The version this build knows how to decode.
        expected: i32,
        /// The version found in the buffer.
        actual: i32,
    },
    /// The buffer ended (or would end) before the value did.
    #[error("buffer too small: needed {needed} bytes, {remaining} remaining")]
    BufferTooSmall {
        /// Bytes required by the operation.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
    /// The bytes were readable but do not describe a legal value.
    #[error("corrupt encoding: {0}")]
    Corrupt(String),
}

impl CodecError {
    /// Shorthand for [`CodecError::Corrupt`].
    pub fn corrupt(msg: impl Into<String>) -> Self {
        CodecError::Corrupt(msg.into())
    }
}

impl From<std::num::TryFromIntError> for CodecError {
    fn from(e: std::num::TryFromIntError) -> Self {
        CodecError::Corrupt(e.to_string())
    }
}
