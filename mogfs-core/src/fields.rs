//! Decoded tracker payloads
//!
//! The tracker has no list type on the wire. Sequences are flattened into
//! numbered keys (`host1_hostname`, `host2_hostname`, ...) next to a count
//! field (`hosts=2`). [`FieldSet::indexed`] is the one place that knows how to
//! walk such a layout back into records.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::{MogError, Result};

/// Key/value payload of a successful tracker response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: BTreeMap<String, String>,
}

impl FieldSet {
    pub fn new() -> Self {
        FieldSet::default()
    }

    /// Insert a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get a field that must be present
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| MogError::MissingField(key.to_string()))
    }

    /// Parse an optional field. Absent and empty values are both `None`.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None | Some("") => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| MogError::InvalidField {
                field: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Parse a field that must be present and non-empty
    pub fn require_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        self.parse(key)?
            .ok_or_else(|| MogError::MissingField(key.to_string()))
    }

    /// Read a count field. A missing count means zero entries.
    pub fn count(&self, key: &str) -> Result<usize> {
        Ok(self.parse(key)?.unwrap_or(0))
    }

    /// Rebuild the records of a positionally indexed sequence.
    ///
    /// `count_field` names the field holding the number of entries; entry
    /// `i` (1-based) owns every key of the form `{prefix}{i}{suffix}`.
    pub fn indexed<'a, T, F>(&'a self, count_field: &str, prefix: &'a str, mut build: F) -> Result<Vec<T>>
    where
        F: FnMut(IndexedEntry<'a>) -> Result<T>,
    {
        let count = self.count(count_field)?;
        (1..=count)
            .map(|index| build(IndexedEntry { fields: self, prefix, index }))
            .collect()
    }
}

impl FromIterator<(String, String)> for FieldSet {
    /// Collect pairs; the first occurrence of a repeated key wins
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut fields = BTreeMap::new();
        for (key, value) in iter {
            fields.entry(key).or_insert(value);
        }
        FieldSet { fields }
    }
}

/// One entry of an indexed sequence inside a [`FieldSet`]
#[derive(Debug, Clone, Copy)]
pub struct IndexedEntry<'a> {
    fields: &'a FieldSet,
    prefix: &'a str,
    index: usize,
}

impl<'a> IndexedEntry<'a> {
    /// 1-based position of this entry
    pub fn index(&self) -> usize {
        self.index
    }

    /// Full field name for `suffix`
    pub fn key(&self, suffix: &str) -> String {
        format!("{}{}{}", self.prefix, self.index, suffix)
    }

    pub fn get(&self, suffix: &str) -> Option<&'a str> {
        self.fields.get(&self.key(suffix))
    }

    /// The bare `{prefix}{i}` value, for sequences of plain strings
    pub fn value(&self) -> Result<&'a str> {
        self.require("")
    }

    pub fn require(&self, suffix: &str) -> Result<&'a str> {
        self.fields.require(&self.key(suffix))
    }

    pub fn parse<T: FromStr>(&self, suffix: &str) -> Result<Option<T>> {
        self.fields.parse(&self.key(suffix))
    }

    pub fn require_parsed<T: FromStr>(&self, suffix: &str) -> Result<T> {
        self.fields.require_parsed(&self.key(suffix))
    }

    /// The underlying field set, for nested sequences
    pub fn fields(&self) -> &'a FieldSet {
        self.fields
    }
}
