//! Read-only snapshot of the inherited process environment.
//!
//! A runner captures one [`BaseEnvironment`] and shares it (behind an `Arc`)
//! with every request it executes. Each request gets its own copy with its
//! overrides applied, so no request can observe another's overrides.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::sync::Arc;

/// Immutable copy of environment variables taken at construction time.
#[derive(Debug, Clone)]
pub struct BaseEnvironment {
    vars: Arc<HashMap<OsString, OsString>>,
}

impl BaseEnvironment {
    /// Snapshot the current process environment.
    pub fn inherited() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: Arc::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy the snapshot and overlay `overrides` on top of it.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, String>) -> HashMap<OsString, OsString> {
        let mut effective = (*self.vars).clone();
        for (key, value) in overrides {
            effective.insert(OsString::from(key), OsString::from(value));
        }
        effective
    }
}

/// Same as [`BaseEnvironment::inherited`].
impl Default for BaseEnvironment {
    fn default() -> Self {
        Self::inherited()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
