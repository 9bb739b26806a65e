use crate::models::KeySet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ed25519,
    Rsa,
    Ecdsa,
    Dsa,
    Unknown,
}

impl From<&str> for KeyType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ed25519" | "ssh-ed25519" => KeyType::Ed25519,
            "rsa" | "ssh-rsa" => KeyType::Rsa,
            "ecdsa" | "ecdsa-sha2-nistp256" | "ecdsa-sha2-nistp384" | "ecdsa-sha2-nistp521" => {
                KeyType::Ecdsa
            }
            "dsa" | "ssh-dss" => KeyType::Dsa,
            _ => KeyType::Unknown,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::Ed25519 => write!(f, "ed25519"),
            KeyType::Rsa => write!(f, "rsa"),
            KeyType::Ecdsa => write!(f, "ecdsa"),
            KeyType::Dsa => write!(f, "dsa"),
            KeyType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A caller-supplied key, converted up front.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredKey {
    pub user: String,
    pub key_type: KeyType,
    /// Portable `type base64 [comment]` line as given.
    pub portable: String,
    /// Device-native hex, compared against what the device reports.
    pub device_hex: String,
    /// Decoded base64 payload, staged on the device before import.
    pub raw_blob: Vec<u8>,
}

/// All desired keys for one run, indexed by user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredKeys {
    keys: BTreeMap<String, DesiredKey>,
}

impl DesiredKeys {
    pub fn new(keys: impl IntoIterator<Item = DesiredKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.user.clone(), k)).collect(),
        }
    }

    pub fn get(&self, user: &str) -> Option<&DesiredKey> {
        self.keys.get(user)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The desired side of the diff.
    pub fn key_set(&self) -> KeySet {
        KeySet::from(
            self.keys
                .iter()
                .map(|(user, k)| (user.clone(), k.device_hex.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }
}
