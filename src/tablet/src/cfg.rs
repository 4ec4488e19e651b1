// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The tunable knobs for tablet metadata.

use std::str::FromStr;

use tracing::warn;

/// The tunable knobs for tablet metadata.
///
/// - `param_arena_limit_bytes` bounds the variable-length data (schema
///   columns, medium compaction history, autoinc intervals) one
///   [`crate::MigrationTabletParam`] may hold. A param received over the wire
///   that needs more than this fails to decode with an allocation error
///   rather than growing without bound.
/// - `max_record_bytes` bounds the `length` field accepted when decoding a
///   record. Anything larger is treated as corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletMetaConfig {
    pub param_arena_limit_bytes: usize,
    pub max_record_bytes: usize,
}

impl TabletMetaConfig {
    pub const DEFAULT_PARAM_ARENA_LIMIT_BYTES: usize = 64 * 1024 * 1024;
    pub const DEFAULT_MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

    /// Returns the defaults, overridden by `MZ_TABLET_PARAM_ARENA_LIMIT_BYTES`
    /// and `MZ_TABLET_MAX_RECORD_BYTES` when those are set and parse.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = TabletMetaConfig::default();
        if let Some(limit) = knob(&var, "MZ_TABLET_PARAM_ARENA_LIMIT_BYTES") {
            cfg.param_arena_limit_bytes = limit;
        }
        if let Some(max) = knob(&var, "MZ_TABLET_MAX_RECORD_BYTES") {
            cfg.max_record_bytes = max;
        }
        cfg
    }
}

impl Default for TabletMetaConfig {
    fn default() -> Self {
        TabletMetaConfig {
            param_arena_limit_bytes: Self::DEFAULT_PARAM_ARENA_LIMIT_BYTES,
            max_record_bytes: Self::DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

fn knob<T: FromStr>(var: impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = var(name)?;
    parse_knob(name, &raw)
}

fn parse_knob<T: FromStr>(name: &str, raw: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match raw.trim().parse() {
        Ok(x) => Some(x),
        Err(err) => {
            warn!("ignoring invalid value {:?} for {}: {}", raw, name, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_knob_ignores_garbage() {
        assert_eq!(parse_knob::<usize>("X", " 1024 "), Some(1024));
        assert_eq!(parse_knob::<usize>("X", "lots"), None);
        assert_eq!(parse_knob::<usize>("X", "-1"), None);
    }

    #[test]
    fn defaults() {
        let cfg = TabletMetaConfig::default();
        assert_eq!(
            cfg.param_arena_limit_bytes,
            TabletMetaConfig::DEFAULT_PARAM_ARENA_LIMIT_BYTES
        );
        assert!(cfg.max_record_bytes > 0);
    }

    #[test]
    fn vars_override_defaults() {
        let cfg = TabletMetaConfig::from_vars(|name| match name {
            "MZ_TABLET_MAX_RECORD_BYTES" => Some("4096".into()),
            "MZ_TABLET_PARAM_ARENA_LIMIT_BYTES" => Some("not a number".into()),
            _ => None,
        });
        assert_eq!(cfg.max_record_bytes, 4096);
        assert_eq!(
            cfg.param_arena_limit_bytes,
            TabletMetaConfig::DEFAULT_PARAM_ARENA_LIMIT_BYTES
        );

        assert_eq!(
            TabletMetaConfig::from_vars(|_| None),
            TabletMetaConfig::default()
        );
    }
}
