//! Key-value/list store backends.
//!
//! The queue engine relies on a small set of primitives, each atomic on its
//! own. Nothing here spans more than one operation: there is no transaction
//! boundary, and callers must tolerate the windows between calls.
//!
//! - [`InMemoryBackend`]: single-process store for tests/dev
//! - `RedisBackend` (feature `redis`): the production store

use std::sync::Arc;
use std::time::Duration;

use core::str::FromStr;

use globset::{GlobBuilder, GlobMatcher};

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

/// Store backend error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The link to the store dropped (or could not be established).
    #[error("store connection error: {0}")]
    Connection(String),

    /// The store rejected or failed a command.
    #[error("store command error: {0}")]
    Command(String),

    /// Internal lock poisoning (in-process backends only).
    #[error("store state poisoned")]
    Poisoned,
}

impl BackendError {
    pub fn is_connection(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

/// Primitive operations of the shared store.
///
/// Lists are pushed on the left and popped on the right, so `lpush` +
/// `brpoplpush` gives FIFO order within a list.
pub trait Backend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Set a key that expires after `ttl`.
    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;

    /// Delete a key of any type. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, BackendError>;

    fn exists(&self, key: &str) -> Result<bool, BackendError>;

    /// Refresh the expiry of an existing key. Returns `false` (and creates
    /// nothing) when the key is absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError>;

    /// All keys matching a glob pattern (see [`key_matcher`]). Not a snapshot.
    fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError>;

    fn lpush(&self, list: &str, value: &str) -> Result<(), BackendError>;

    /// Block until `source` has an element (or `timeout` elapses), then move
    /// its rightmost element to the head of `destination` in one step.
    ///
    /// A zero `timeout` blocks indefinitely. Returns `None` on timeout.
    fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BackendError>;

    /// Remove up to `count` occurrences of `value` from `list` (head first).
    fn lrem(&self, list: &str, count: usize, value: &str) -> Result<usize, BackendError>;

    fn llen(&self, list: &str) -> Result<usize, BackendError>;

    fn ping(&self) -> Result<(), BackendError>;

    /// Drop and re-establish the connection.
    fn reconnect(&self) -> Result<(), BackendError>;

    /// Release the connection. Later calls may reconnect lazily.
    fn close(&self);
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).set(key, value)
    }

    fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        (**self).set_with_ttl(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool, BackendError> {
        (**self).exists(key)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, BackendError> {
        (**self).expire(key, ttl)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        (**self).keys(pattern)
    }

    fn lpush(&self, list: &str, value: &str) -> Result<(), BackendError> {
        (**self).lpush(list, value)
    }

    fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BackendError> {
        (**self).brpoplpush(source, destination, timeout)
    }

    fn lrem(&self, list: &str, count: usize, value: &str) -> Result<usize, BackendError> {
        (**self).lrem(list, count, value)
    }

    fn llen(&self, list: &str) -> Result<usize, BackendError> {
        (**self).llen(list)
    }

    fn ping(&self) -> Result<(), BackendError> {
        (**self).ping()
    }

    fn reconnect(&self) -> Result<(), BackendError> {
        (**self).reconnect()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// Logical databases of the shared store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Database {
    Search,
    List,
    Test,
}

impl Database {
    /// Database index in the store.
    pub fn index(&self) -> u8 {
        match self {
            Database::Search => 0,
            Database::List => 1,
            Database::Test => 15,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Database::Search => "search",
            Database::List => "list",
            Database::Test => "test",
        }
    }
}

impl FromStr for Database {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "search" => Ok(Database::Search),
            "list" => Ok(Database::List),
            "test" => Ok(Database::Test),
            other => Err(BackendError::Command(format!("unknown database: {other}"))),
        }
    }
}

/// Compile a store key pattern into a matcher.
///
/// Follows the store's glob dialect: `*`, `?`, `[abc]`, `[a-z]`, `[^a]`
/// and `\` escapes. Braces are literal and `*` crosses every character.
pub fn key_matcher(pattern: &str) -> Result<GlobMatcher, BackendError> {
    let glob = GlobBuilder::new(&literal_braces(pattern))
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map_err(|err| BackendError::Command(format!("invalid key pattern {pattern:?}: {err}")))?;
    Ok(glob.compile_matcher())
}

/// Escape `{` and `}` outside character classes so they are not alternations.
fn literal_braces(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut in_class = false;
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '{' | '}' if !in_class => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, key: &str) -> bool {
        key_matcher(pattern).unwrap().is_match(key)
    }

    #[test]
    fn key_patterns_match_store_keys() {
        assert!(matches("job-*", "job-content-abc"));
        assert!(matches("worker-tweet-*", "worker-tweet-1f2e"));
        assert!(!matches("worker-tweet-*", "worker-content-1f2e"));
        assert!(matches("job-*-42", "job-content-42"));
        assert!(!matches("job-*-42", "job-content-420"));
        assert!(matches("job-?", "job-x"));
        assert!(!matches("job-?", "job-"));
        assert!(matches("*", ""));
        assert!(!matches("job-*", "job_queue.content.waiting"));
        assert!(matches("job-*", "job-content-a/b"));
    }

    #[test]
    fn key_patterns_support_classes_and_escapes() {
        assert!(matches("job-tweet-[ab]", "job-tweet-a"));
        assert!(!matches("job-tweet-[ab]", "job-tweet-c"));
        assert!(matches("job-tweet-[a-c]x", "job-tweet-bx"));
        assert!(matches("job-tweet-[^ab]", "job-tweet-c"));
        assert!(!matches("job-tweet-[!ab]", "job-tweet-a"));

        assert!(matches(r"job-\*", "job-*"));
        assert!(!matches(r"job-\*", "job-x"));
        assert!(matches(r"job-\?", "job-?"));
        assert!(!matches(r"job-\?", "job-x"));
    }

    #[test]
    fn key_patterns_treat_braces_literally() {
        assert!(matches("job-{a,b}", "job-{a,b}"));
        assert!(!matches("job-{a,b}", "job-a"));
        assert!(matches("job-}*", "job-}x"));
    }

    #[test]
    fn malformed_key_patterns_are_command_errors() {
        assert!(matches!(key_matcher("job-[a"), Err(BackendError::Command(_))));
    }

    #[test]
    fn database_names_parse_case_insensitively() {
        assert_eq!("Search".parse::<Database>().unwrap().index(), 0);
        assert_eq!("LIST".parse::<Database>().unwrap().index(), 1);
        assert_eq!("test".parse::<Database>().unwrap().index(), 15);
        assert!("prod".parse::<Database>().is_err());
    }
}
