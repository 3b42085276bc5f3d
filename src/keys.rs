//! Collaborators consulted during verification: where public keys come from and
//! what time it is.

use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::digest::key_id;

/// Resolves the raw public key for a `keyid` signature parameter.
pub trait KeyDirectory {
    /// Returns `None` when the key is unknown.
    fn resolve(&self, key_id: &str) -> Option<Vec<u8>>;
}

/// An in-memory key directory.
#[derive(Clone, Debug, Default)]
pub struct StaticKeyDirectory {
    keys: HashMap<String, Vec<u8>>,
}

impl StaticKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key under an explicit identifier.
    pub fn insert(&mut self, key_id: impl Into<String>, public_key: impl Into<Vec<u8>>) {
        self.keys.insert(key_id.into(), public_key.into());
    }

    /// Register a key under the identifier a [SignatureService](crate::SignatureService)
    /// derives for it (hex SHA-256 of the raw key).
    pub fn with_key(mut self, public_key: &[u8]) -> Self {
        self.insert(key_id(public_key), public_key);
        self
    }
}

impl KeyDirectory for StaticKeyDirectory {
    fn resolve(&self, key_id: &str) -> Option<Vec<u8>> {
        self.keys.get(key_id).cloned()
    }
}

/// Source of the current time as a Unix timestamp in seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
    }
}

/// A clock stuck at one instant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, KeyDirectory, StaticKeyDirectory, SystemClock};
    use crate::digest::key_id;

    #[test]
    fn resolves_registered_keys() {
        let directory = StaticKeyDirectory::new().with_key(&[1; 32]);
        assert_eq!(directory.resolve(&key_id(&[1; 32])), Some(vec![1; 32]));
        assert_eq!(directory.resolve("unknown"), None);
    }

    #[test]
    fn explicit_identifiers() {
        let mut directory = StaticKeyDirectory::new();
        directory.insert("partner", vec![9u8; 32]);
        assert_eq!(directory.resolve("partner"), Some(vec![9; 32]));
    }

    #[test]
    fn clocks() {
        assert_eq!(FixedClock(42).now(), 42);
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
