//! The Meta-Info record: a structured `{name, tags}` sidecar, serialized
//! as UTF-8 JSON.
//!
//! The source implementation this was distilled from treats this as an
//! untyped JSON blob and validates redefinitions by re-parsing and
//! comparing ad hoc. Here it is a proper struct with an explicit,
//! returned-`Result` merge operation instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tsdb_core::{Error, Result};

/// `{name, tags}`, mergeable but never destructively rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// The metric's display name, if one has been set.
    pub name: Option<String>,
    /// Tag key/value pairs observed for this metric.
    pub tags: BTreeMap<String, String>,
}

impl MetaInfo {
    /// Encode as UTF-8 JSON.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("MetaInfo always serializes")
    }

    /// Decode from UTF-8 JSON.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::DecodeError(format!("meta-info: {}", e)))
    }

    /// Merge an incoming `(name, tags)` pair into this record.
    ///
    /// - Redefining an existing name to a different one is rejected.
    /// - Setting a name where none was recorded yet is allowed.
    /// - Redefining an existing tag's value is rejected; adding a new tag
    ///   key, or repeating an existing key with the same value, is fine.
    pub fn merge(&mut self, name: Option<&str>, tags: &BTreeMap<String, String>) -> Result<()> {
        if let Some(new_name) = name {
            match &self.name {
                Some(existing) if existing != new_name => {
                    return Err(Error::validation(format!(
                        "cannot rebind name from '{}' to '{}'",
                        existing, new_name
                    )));
                }
                _ => self.name = Some(new_name.to_string()),
            }
        }
        for (key, value) in tags {
            if let Some(existing) = self.tags.get(key) {
                if existing != value {
                    return Err(Error::validation(format!(
                        "cannot redefine tag '{}' from '{}' to '{}'",
                        key, existing, value
                    )));
                }
            } else {
                self.tags.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    /// Tag pairs sorted by key, the order the Descriptor key family
    /// requires.
    pub fn sorted_tag_pairs(&self) -> Vec<(String, String)> {
        self.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_allows_filling_in_absent_name() {
        let mut mi = MetaInfo::default();
        mi.merge(Some("cpu"), &BTreeMap::new()).unwrap();
        assert_eq!(mi.name.as_deref(), Some("cpu"));
    }

    #[test]
    fn merge_rejects_name_redefinition() {
        let mut mi = MetaInfo { name: Some("cpu".into()), tags: BTreeMap::new() };
        assert!(mi.merge(Some("mem"), &BTreeMap::new()).is_err());
    }

    #[test]
    fn merge_rejects_tag_value_redefinition() {
        let mut tags = BTreeMap::new();
        tags.insert("env".to_string(), "prod".to_string());
        let mut mi = MetaInfo { name: None, tags };
        let mut conflicting = BTreeMap::new();
        conflicting.insert("env".to_string(), "qa".to_string());
        assert!(mi.merge(None, &conflicting).is_err());
    }

    #[test]
    fn merge_allows_adding_new_tags() {
        let mut mi = MetaInfo::default();
        let mut tags = BTreeMap::new();
        tags.insert("role".to_string(), "web".to_string());
        mi.merge(None, &tags).unwrap();
        tags.insert("region".to_string(), "us".to_string());
        mi.merge(None, &tags).unwrap();
        assert_eq!(mi.tags.len(), 2);
    }

    #[test]
    fn roundtrip() {
        let mut tags = BTreeMap::new();
        tags.insert("role".to_string(), "web".to_string());
        let mi = MetaInfo { name: Some("cpu".into()), tags };
        let decoded = MetaInfo::decode(&mi.encode()).unwrap();
        assert_eq!(decoded, mi);
    }
}
