//! In-memory store double used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use keyshift::{Key, KeyValueStore, MigrationReport, ProgressReporter, StoreError, Ttl};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct Inner {
    data: BTreeMap<Key, (Vec<u8>, Ttl)>,
    calls: Vec<(&'static str, Key)>,
    ttl_failures: HashMap<Key, usize>,
    dump_failures: HashMap<Key, usize>,
    restore_errors: HashSet<Key>,
    vanish_before_dump: HashSet<Key>,
    ping_fails: bool,
    list_fails: bool,
}

/// A store kept in a `BTreeMap`, enumerated in key order, with fault injection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: &[(&str, &str, Option<u64>)]) -> Self {
        let store = Self::new();
        for (key, value, ttl_secs) in entries {
            store.insert(key, value.as_bytes(), *ttl_secs);
        }
        store
    }

    pub fn insert(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) {
        let ttl = match ttl_secs {
            Some(secs) => Ttl::Expires(Duration::from_secs(secs)),
            None => Ttl::Persistent,
        };
        self.inner
            .lock()
            .unwrap()
            .data
            .insert(Key::from(key), (value.to_vec(), ttl));
    }

    pub fn get(&self, key: &str) -> Option<(Vec<u8>, Ttl)> {
        self.inner.lock().unwrap().data.get(&Key::from(key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().data.len()
    }

    /// Makes the next `times` `PTTL` calls for `key` fail.
    pub fn fail_ttl(&self, key: &str, times: usize) {
        self.inner
            .lock()
            .unwrap()
            .ttl_failures
            .insert(Key::from(key), times);
    }

    /// Makes the next `times` `DUMP` calls for `key` fail.
    pub fn fail_dump(&self, key: &str, times: usize) {
        self.inner
            .lock()
            .unwrap()
            .dump_failures
            .insert(Key::from(key), times);
    }

    /// Makes every restore of `key` fail with a non-conflict error.
    pub fn fail_restore(&self, key: &str) {
        self.inner
            .lock()
            .unwrap()
            .restore_errors
            .insert(Key::from(key));
    }

    /// Deletes `key` right after its TTL is read, before the dump.
    pub fn vanish_before_dump(&self, key: &str) {
        self.inner
            .lock()
            .unwrap()
            .vanish_before_dump
            .insert(Key::from(key));
    }

    pub fn fail_ping(&self) {
        self.inner.lock().unwrap().ping_fails = true;
    }

    pub fn fail_list(&self) {
        self.inner.lock().unwrap().list_fails = true;
    }

    /// Operations issued against `key`, in order.
    pub fn calls_for(&self, key: &str) -> Vec<&'static str> {
        let key = Key::from(key);
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(_, k)| *k == key)
            .map(|(op, _)| *op)
            .collect()
    }
}

fn take_failure(failures: &mut HashMap<Key, usize>, key: &Key) -> bool {
    match failures.get_mut(key) {
        Some(left) if *left > 0 => {
            *left -= 1;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        if self.inner.lock().unwrap().ping_fails {
            return Err(StoreError::Other("connection refused".into()));
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<Key>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.list_fails {
            return Err(StoreError::Other("KEYS is disabled".into()));
        }
        Ok(inner.data.keys().cloned().collect())
    }

    async fn remaining_ttl(&self, key: &Key) -> Result<Option<Ttl>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(("ttl", key.clone()));
        if take_failure(&mut inner.ttl_failures, key) {
            return Err(StoreError::Other("i/o timeout".into()));
        }
        let ttl = inner.data.get(key).map(|(_, ttl)| *ttl);
        if inner.vanish_before_dump.contains(key) {
            inner.data.remove(key);
        }
        Ok(ttl)
    }

    async fn dump(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(("dump", key.clone()));
        if take_failure(&mut inner.dump_failures, key) {
            return Err(StoreError::Other("i/o timeout".into()));
        }
        Ok(inner.data.get(key).map(|(value, _)| value.clone()))
    }

    async fn restore(&self, key: &Key, ttl: Ttl, payload: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(("restore", key.clone()));
        if inner.restore_errors.contains(key) {
            return Err(StoreError::Other("OOM command not allowed".into()));
        }
        if inner.data.contains_key(key) {
            return Err(StoreError::KeyExists);
        }
        inner.data.insert(key.clone(), (payload.to_vec(), ttl));
        Ok(())
    }
}

/// Progress event recorded by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Copied(usize, usize, String),
    Conflict(usize, usize, String),
    Vanished(usize, usize, String),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub started: Option<(usize, usize)>,
    pub events: Vec<Event>,
    pub finished: Option<MigrationReport>,
}

impl ProgressReporter for RecordingReporter {
    fn on_start(&mut self, total: usize, resume_offset: usize) {
        self.started = Some((total, resume_offset));
    }

    fn on_copied(&mut self, index: usize, total: usize, key: &Key) {
        self.events.push(Event::Copied(index, total, key.to_string()));
    }

    fn on_conflict(&mut self, index: usize, total: usize, key: &Key) {
        self.events
            .push(Event::Conflict(index, total, key.to_string()));
    }

    fn on_vanished(&mut self, index: usize, total: usize, key: &Key) {
        self.events
            .push(Event::Vanished(index, total, key.to_string()));
    }

    fn on_finish(&mut self, report: &MigrationReport) {
        self.finished = Some(report.clone());
    }
}
