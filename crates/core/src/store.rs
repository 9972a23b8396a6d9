// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory key/value store
//!
//! The store owns its map and lock; it is constructed explicitly and shared
//! via `Arc` rather than living in a process-wide global. A single
//! reader/writer lock covers the whole map: reads run in parallel, writes are
//! exclusive.
//!
//! The store is where size validation lives. The transaction logger trusts
//! its callers to have gone through the store first, so an oversized key or
//! value never reaches the log.

use crate::limits::SizeLimits;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors returned by store operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,
    #[error("key size too large, max permissible: {max}")]
    KeyTooLarge { max: usize },
    #[error("value size too large, max permissible: {max}")]
    ValueTooLarge { max: usize },
}

/// In-memory key/value map with size-bounded entries.
#[derive(Debug)]
pub struct Store {
    limits: SizeLimits,
    map: RwLock<HashMap<String, String>>,
}

impl Store {
    /// Create an empty store enforcing the given limits.
    pub fn new(limits: SizeLimits) -> Self {
        Self {
            limits,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// The limits this store enforces.
    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    /// Insert or overwrite a value. Last write wins.
    ///
    /// The new value is visible to all readers as soon as this returns.
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_key(key)?;
        if value.len() > self.limits.max_value_size {
            return Err(StoreError::ValueTooLarge {
                max: self.limits.max_value_size,
            });
        }

        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Look up the current value for a key.
    pub fn get(&self, key: &str) -> Result<String, StoreError> {
        self.check_key(key)?;

        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.get(key).cloned().ok_or(StoreError::KeyNotFound)
    }

    /// Ensure a key does not exist. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_key(key)?;

        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        let map = self.map.read().unwrap_or_else(|e| e.into_inner());
        map.len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_key(&self, key: &str) -> Result<(), StoreError> {
        if key.len() > self.limits.max_key_size {
            return Err(StoreError::KeyTooLarge {
                max: self.limits.max_key_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
