//! Hash-based index flavors
//!
//! Two flavors share the same extraction plumbing:
//!
//! - `HashedUnique`: one key maps to exactly one record
//! - `HashedNonUnique`: one key maps to an ordered bucket of records
//!
//! Both own their map privately and expose only the intended operations,
//! so callers cannot bypass invariants through raw map mutation.

use std::collections::HashMap;

use crate::errors::{IndexError, IndexResult};
use crate::key::{IndexKey, KeyExtractor};

/// Exact-match index with a one-key-one-record guarantee.
pub struct HashedUnique<R> {
    name: String,
    extractor: KeyExtractor<R>,
    map: HashMap<IndexKey, R>,
}

impl<R> HashedUnique<R>
where
    R: Clone + PartialEq,
{
    /// Creates a new empty unique index
    pub fn new(name: impl Into<String>, extractor: KeyExtractor<R>) -> Self {
        Self {
            name: name.into(),
            extractor,
            map: HashMap::new(),
        }
    }

    /// Returns the index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a record under its extracted key.
    ///
    /// A key already holding a record is overwritten silently; the
    /// displaced record is returned so callers can detect the collision.
    pub fn insert(&mut self, record: R) -> Option<R> {
        let key = (self.extractor)(&record);
        self.map.insert(key, record)
    }

    /// Lookup the record stored under a key
    pub fn get(&self, key: &IndexKey) -> Option<&R> {
        self.map.get(key)
    }

    /// Remove the record stored under the record's extracted key.
    ///
    /// Fails with `KeyNotFound` if the key is absent.
    pub fn delete(&mut self, record: &R) -> IndexResult<R> {
        let key = (self.extractor)(record);
        self.map.remove(&key).ok_or_else(|| IndexError::KeyNotFound {
            index: self.name.clone(),
            key,
        })
    }

    /// Check that a delete of this record would succeed, without mutating
    pub fn validate_delete(&self, record: &R) -> IndexResult<()> {
        let key = (self.extractor)(record);
        if self.map.contains_key(&key) {
            Ok(())
        } else {
            Err(IndexError::KeyNotFound {
                index: self.name.clone(),
                key,
            })
        }
    }

    /// Replace `old` with `new`: delete followed by insert
    pub fn update(&mut self, old: &R, new: R) -> IndexResult<()> {
        self.delete(old)?;
        self.insert(new);
        Ok(())
    }

    /// Whether the record's key is present
    pub fn contains_key_of(&self, record: &R) -> bool {
        self.map.contains_key(&(self.extractor)(record))
    }

    /// Whether this exact record value is stored under its key
    pub fn contains(&self, record: &R) -> bool {
        self.map
            .get(&(self.extractor)(record))
            .is_some_and(|stored| stored == record)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(key, record)` pairs (hash order)
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &R)> {
        self.map.iter()
    }

    /// Snapshot of all records, for backfilling another index
    pub fn records(&self) -> Vec<R> {
        self.map.values().cloned().collect()
    }
}

/// Index grouping records into ordered buckets by key.
///
/// Insertion order is preserved within each bucket. The running record
/// count is an explicit field updated alongside every structural
/// mutation, keeping `len` O(1).
pub struct HashedNonUnique<R> {
    name: String,
    extractor: KeyExtractor<R>,
    buckets: HashMap<IndexKey, Vec<R>>,
    entry_count: usize,
}

impl<R> HashedNonUnique<R>
where
    R: Clone + PartialEq,
{
    /// Creates a new empty non-unique index
    pub fn new(name: impl Into<String>, extractor: KeyExtractor<R>) -> Self {
        Self {
            name: name.into(),
            extractor,
            buckets: HashMap::new(),
            entry_count: 0,
        }
    }

    /// Returns the index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a record to the bucket for its extracted key
    pub fn insert(&mut self, record: R) {
        let key = (self.extractor)(&record);
        self.buckets.entry(key).or_default().push(record);
        self.entry_count += 1;
    }

    /// Remove exactly one bucket entry value-equal to `record`.
    ///
    /// An absent record is a no-op for this flavor. Empty buckets are
    /// dropped so unseen and emptied keys are indistinguishable.
    pub fn delete(&mut self, record: &R) -> IndexResult<()> {
        let key = (self.extractor)(record);
        if let Some(bucket) = self.buckets.get_mut(&key) {
            if let Some(pos) = bucket.iter().position(|r| r == record) {
                bucket.remove(pos);
                self.entry_count -= 1;
            }
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
        Ok(())
    }

    /// Replace `old` with `new`: delete followed by insert
    pub fn update(&mut self, old: &R, new: R) -> IndexResult<()> {
        self.delete(old)?;
        self.insert(new);
        Ok(())
    }

    /// Records sharing a key, in insertion order (empty for unseen keys)
    pub fn get(&self, key: &IndexKey) -> &[R] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bucket size for a key
    pub fn count(&self, key: &IndexKey) -> usize {
        self.buckets.get(key).map_or(0, Vec::len)
    }

    /// Whether this exact record value is present in its bucket
    pub fn contains(&self, record: &R) -> bool {
        self.buckets
            .get(&(self.extractor)(record))
            .is_some_and(|bucket| bucket.iter().any(|r| r == record))
    }

    /// Total number of records across all buckets, O(1)
    pub fn len(&self) -> usize {
        self.entry_count
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Iterate over `(key, record)` pairs grouped by key, bucket order
    /// within each key
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &R)> {
        self.buckets
            .iter()
            .flat_map(|(key, bucket)| bucket.iter().map(move |r| (key, r)))
    }

    /// Snapshot of all records, for backfilling another index
    pub fn records(&self) -> Vec<R> {
        self.buckets.values().flatten().cloned().collect()
    }
}
