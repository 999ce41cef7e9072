//! Caches used by the computer.
//!
//! [`ObjectCache`] is the TTL get-or-compute store shared across evaluation
//! passes (and, for real backends, across processes). [`ParseCache`] memoizes
//! re-parses of historical wikitext within one pass; the computer clears it
//! when [`VariablesManager::begin_pass`](crate::VariablesManager::begin_pass)
//! is called.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::Mutex,
    time::{Duration, Instant},
};

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::{error::Error, services::ParserOutput};

pub trait ObjectCache {
    /// Returns the fresh cached value for `key`, or stores and returns the
    /// result of `callback`. Failed callbacks are not cached.
    fn get_with_set_callback(
        &self,
        key: &str,
        ttl: Duration,
        callback: &mut dyn FnMut() -> Result<serde_json::Value, Error>,
    ) -> Result<serde_json::Value, Error>;
}

#[derive(Debug)]
struct CacheEntry {
    expires_at: Instant,
    value: serde_json::Value,
}

/// Process-local [`ObjectCache`]; last write wins.
#[derive(Debug, Default)]
pub struct MemoryObjectCache {
    entries: Mutex<FxHashMap<String, CacheEntry>>,
}

impl MemoryObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }
}

impl ObjectCache for MemoryObjectCache {
    fn get_with_set_callback(
        &self,
        key: &str,
        ttl: Duration,
        callback: &mut dyn FnMut() -> Result<serde_json::Value, Error>,
    ) -> Result<serde_json::Value, Error> {
        if let Some(value) = self.lookup(key) {
            tracing::trace!("Object cache hit for {}", key);
            return Ok(value);
        }

        tracing::trace!("Object cache miss for {}", key);
        // The lock is not held while computing; concurrent misses both compute.
        let value = callback()?;
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                key.to_string(),
                CacheEntry {
                    expires_at: Instant::now() + ttl,
                    value: value.clone(),
                },
            );

        Ok(value)
    }
}

type ParseKey = (String, u64);

/// Memo of parser outputs keyed by (SHA-256 of the text, page id).
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: RefCell<FxHashMap<ParseKey, Rc<ParserOutput>>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_parse(
        &self,
        text: &str,
        page_id: u64,
        parse: impl FnOnce() -> Result<ParserOutput, Error>,
    ) -> Result<Rc<ParserOutput>, Error> {
        let key = (content_hash(text), page_id);
        if let Some(output) = self.entries.borrow().get(&key) {
            tracing::trace!("Parse cache hit for page {}", page_id);
            return Ok(Rc::clone(output));
        }

        let output = Rc::new(parse()?);
        self.entries.borrow_mut().insert(key, Rc::clone(&output));
        Ok(output)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

fn content_hash(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
