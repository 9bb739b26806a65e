use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One user's authentication key as the device stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    user: String,
    key_material: String,
}

impl KeyRecord {
    pub fn new(user: impl Into<String>, key_material: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            key_material: key_material.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Device-native hex encoding of the key.
    pub fn key_material(&self) -> &str {
        &self.key_material
    }
}

/// Set of key records indexed by user. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    records: HashMap<String, KeyRecord>,
}

impl KeySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set, rejecting duplicate users. On failure the duplicate user
    /// name is returned.
    pub fn try_from_records<I>(records: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = KeyRecord>,
    {
        let mut map = HashMap::new();
        for record in records {
            if map.contains_key(record.user()) {
                return Err(record.user);
            }
            map.insert(record.user.clone(), record);
        }
        Ok(Self { records: map })
    }

    pub fn get(&self, user: &str) -> Option<&KeyRecord> {
        self.records.get(user)
    }

    pub fn contains(&self, user: &str) -> bool {
        self.records.contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.values()
    }

    /// User to key material, ordered by user.
    pub fn to_sorted_map(&self) -> BTreeMap<String, String> {
        self.records
            .values()
            .map(|r| (r.user.clone(), r.key_material.clone()))
            .collect()
    }

    /// Human-readable `user: HEX` dump, one line per user, sorted.
    pub fn to_mapping_dump(&self) -> String {
        if self.records.is_empty() {
            return "{}\n".to_string();
        }
        self.to_sorted_map()
            .iter()
            .map(|(user, hex)| format!("{}: {}\n", user, hex))
            .collect()
    }
}

impl From<BTreeMap<String, String>> for KeySet {
    /// Map keys are unique, so no duplicate check is needed.
    fn from(map: BTreeMap<String, String>) -> Self {
        Self {
            records: map
                .into_iter()
                .map(|(user, key_material)| {
                    let record = KeyRecord::new(user.clone(), key_material);
                    (user, record)
                })
                .collect(),
        }
    }
}

/// Operations needed to turn `current` into `desired`.
///
/// Membership checks go through the `KeySet` hash maps, one lookup per user.
/// The result sets are ordered so operations run and report in user order;
/// that costs O(k log k) for k changed users on top of the linear scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    to_import: BTreeSet<String>,
    to_remove: BTreeSet<String>,
}

impl Diff {
    /// Users whose desired key is missing or different on the device are
    /// imported; users only on the device are removed. Key material is
    /// compared byte for byte.
    pub fn between(current: &KeySet, desired: &KeySet) -> Self {
        let to_import = desired
            .iter()
            .filter(|wanted| match current.get(wanted.user()) {
                Some(got) => got.key_material() != wanted.key_material(),
                None => true,
            })
            .map(|r| r.user().to_string())
            .collect();

        let to_remove = current
            .iter()
            .filter(|got| !desired.contains(got.user()))
            .map(|r| r.user().to_string())
            .collect();

        Self {
            to_import,
            to_remove,
        }
    }

    pub fn to_import(&self) -> &BTreeSet<String> {
        &self.to_import
    }

    pub fn to_remove(&self) -> &BTreeSet<String> {
        &self.to_remove
    }

    pub fn is_empty(&self) -> bool {
        self.to_import.is_empty() && self.to_remove.is_empty()
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    pub changed: bool,
    pub diff: Diff,
}
