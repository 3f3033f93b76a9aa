// Key table for the login checksum exchange.
//
// Each key id selects a pair of secret addends: one the server mixes into the
// hash it sends, one the robot mixes into its confirmation. The table is
// built once at startup (from `ServerConfig`) and shared read-only by every
// connection thread through an `Arc`, so lookups need no locking.
//
// The valid id range is whatever was provisioned; nothing here assumes five
// entries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Secret addends for one key id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub server: u32,
    pub client: u32,
}

/// The robot asked for a key id that was never provisioned.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("key id {0} is not in the key table")]
pub struct KeyOutOfRange(pub i64);

/// Immutable key id -> `KeyPair` mapping. Ids are the vector indices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyTable {
    entries: Vec<KeyPair>,
}

impl KeyTable {
    pub fn new(entries: Vec<KeyPair>) -> Self {
        Self { entries }
    }

    /// The key set every reference robot is provisioned with.
    pub fn reference() -> Self {
        let pairs = [
            (23019, 32037),
            (32037, 29295),
            (18789, 13603),
            (16443, 29533),
            (18189, 21952),
        ];
        Self::new(
            pairs
                .into_iter()
                .map(|(server, client)| KeyPair { server, client })
                .collect(),
        )
    }

    pub fn lookup(&self, key_id: i64) -> Result<KeyPair, KeyOutOfRange> {
        usize::try_from(key_id)
            .ok()
            .and_then(|index| self.entries.get(index))
            .copied()
            .ok_or(KeyOutOfRange(key_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        Self::reference()
    }
}
