//! In-memory backend for tests/dev.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{Backend, BackendError, key_matcher};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process store with the same per-operation atomicity as the shared one.
///
/// - One mutex guards all keys, so every primitive is atomic
/// - `brpoplpush` parks on a condvar until a push arrives
/// - Keys are kept ordered, so scans are deterministic
/// - Connection drops can be injected to exercise reconnect paths
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: Mutex<BTreeMap<String, Entry>>,
    pushed: Condvar,
    drop_next_blocking_pop: AtomicBool,
    reconnects: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new())
    }

    /// Make the next `brpoplpush` fail as if the connection dropped.
    pub fn inject_connection_drop(&self) {
        self.drop_next_blocking_pop.store(true, Ordering::SeqCst);
    }

    /// Number of `reconnect` calls so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Snapshot of a list, head first.
    pub fn list(&self, list: &str) -> Result<Vec<String>, BackendError> {
        let mut entries = self.lock()?;
        Ok(match live(&mut entries, list) {
            Some(Entry { value: Value::List(items), .. }) => items.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Entry>>, BackendError> {
        self.entries.lock().map_err(|_| BackendError::Poisoned)
    }
}

/// Fetch a key, evicting it first if it has expired.
fn live<'a>(entries: &'a mut BTreeMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> BackendError {
    BackendError::Command(format!("WRONGTYPE operation against key {key}"))
}

fn list_mut<'a>(
    entries: &'a mut BTreeMap<String, Entry>,
    key: &str,
) -> Result<&'a mut VecDeque<String>, BackendError> {
    if live(entries, key).is_none() {
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            },
        );
    }
    match entries.get_mut(key) {
        Some(Entry { value: Value::List(items), .. }) => Ok(items),
        _ => Err(wrong_type(key)),
    }
}

/// Move the tail of `source` to the head of `destination`; drops emptied lists.
fn pop_push(
    entries: &mut BTreeMap<String, Entry>,
    source: &str,
    destination: &str,
) -> Result<Option<String>, BackendError> {
    let popped = match live(entries, source) {
        Some(Entry { value: Value::List(items), .. }) => items.pop_back(),
        Some(_) => return Err(wrong_type(source)),
        None => None,
    };
    let Some(value) = popped else {
        return Ok(None);
    };
    if matches!(entries.get(source), Some(Entry { value: Value::List(items), .. }) if items.is_empty())
    {
        entries.remove(source);
    }
    list_mut(entries, destination)?.push_front(value.clone());
    Ok(Some(value))
}

impl Backend for InMemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut entries = self.lock()?;
        match live(&mut entries, key) {
            Some(Entry { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let mut entries = self.lock()?;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        let mut entries = self.lock()?;
        let existed = live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    fn exists(&self, key: &str) -> Result<bool, BackendError> {
        let mut entries = self.lock()?;
        Ok(live(&mut entries, key).is_some())
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        let mut entries = self.lock()?;
        match live(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let matcher = key_matcher(pattern)?;
        let mut entries = self.lock()?;
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(entries
            .keys()
            .filter(|k| matcher.is_match(k.as_str()))
            .cloned()
            .collect())
    }

    fn lpush(&self, list: &str, value: &str) -> Result<(), BackendError> {
        let mut entries = self.lock()?;
        list_mut(&mut entries, list)?.push_front(value.to_string());
        drop(entries);
        self.pushed.notify_all();
        Ok(())
    }

    fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BackendError> {
        if self.drop_next_blocking_pop.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Connection("read error on connection".to_string()));
        }

        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        let mut entries = self.lock()?;

        loop {
            if let Some(value) = pop_push(&mut entries, source, destination)? {
                drop(entries);
                // The destination may be someone else's source.
                self.pushed.notify_all();
                return Ok(Some(value));
            }

            entries = match deadline {
                None => self.pushed.wait(entries).map_err(|_| BackendError::Poisoned)?,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.pushed
                        .wait_timeout(entries, deadline - now)
                        .map_err(|_| BackendError::Poisoned)?
                        .0
                }
            };
        }
    }

    fn lrem(&self, list: &str, count: usize, value: &str) -> Result<usize, BackendError> {
        let mut entries = self.lock()?;
        let items = match live(&mut entries, list) {
            Some(Entry { value: Value::List(items), .. }) => items,
            Some(_) => return Err(wrong_type(list)),
            None => return Ok(0),
        };

        let mut removed = 0;
        let mut kept = VecDeque::with_capacity(items.len());
        for item in items.drain(..) {
            if item == value && (count == 0 || removed < count) {
                removed += 1;
            } else {
                kept.push_back(item);
            }
        }
        *items = kept;

        if items.is_empty() {
            entries.remove(list);
        }
        Ok(removed)
    }

    fn llen(&self, list: &str) -> Result<usize, BackendError> {
        let mut entries = self.lock()?;
        match live(&mut entries, list) {
            Some(Entry { value: Value::List(items), .. }) => Ok(items.len()),
            Some(_) => Err(wrong_type(list)),
            None => Ok(0),
        }
    }

    fn ping(&self) -> Result<(), BackendError> {
        self.lock().map(|_| ())
    }

    fn reconnect(&self) -> Result<(), BackendError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {}
}
