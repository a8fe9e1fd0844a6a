//! Ordered non-unique index
//!
//! One globally sorted view of all records by extracted key, duplicate
//! keys permitted. The BTreeMap provides the key order; each bucket
//! preserves insertion order among equal keys, which is the tie rule:
//! equal-key records come back in the order they were inserted.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::errors::{IndexError, IndexResult};
use crate::key::{IndexKey, KeyExtractor};

/// Globally sorted index with range and positional queries.
///
/// The running record count is an explicit field updated alongside every
/// structural mutation, keeping `len` O(1).
pub struct OrderedNonUnique<R> {
    name: String,
    extractor: KeyExtractor<R>,
    tree: BTreeMap<IndexKey, Vec<R>>,
    entry_count: usize,
}

impl<R> OrderedNonUnique<R>
where
    R: Clone + PartialEq,
{
    /// Creates a new empty ordered index
    pub fn new(name: impl Into<String>, extractor: KeyExtractor<R>) -> Self {
        Self {
            name: name.into(),
            extractor,
            tree: BTreeMap::new(),
            entry_count: 0,
        }
    }

    /// Returns the index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a record at the position determined by its extracted key.
    ///
    /// Equal keys keep insertion order.
    pub fn insert(&mut self, record: R) {
        let key = (self.extractor)(&record);
        self.tree.entry(key).or_default().push(record);
        self.entry_count += 1;
    }

    /// Locate the bucket position of an exact record value
    fn position_of(&self, record: &R) -> IndexResult<(IndexKey, usize)> {
        let key = (self.extractor)(record);
        let Some(bucket) = self.tree.get(&key) else {
            return Err(IndexError::KeyNotFound {
                index: self.name.clone(),
                key,
            });
        };
        match bucket.iter().position(|r| r == record) {
            Some(pos) => Ok((key, pos)),
            None => Err(IndexError::RecordNotFound {
                index: self.name.clone(),
            }),
        }
    }

    /// Remove the first record value-equal to `record` within its
    /// equal-key run.
    ///
    /// Fails with `KeyNotFound` if no equal-key run exists, and with
    /// `RecordNotFound` if the run exists but holds no value-equal
    /// record.
    pub fn delete(&mut self, record: &R) -> IndexResult<()> {
        let (key, pos) = self.position_of(record)?;
        // position_of guarantees the bucket exists
        if let Some(bucket) = self.tree.get_mut(&key) {
            bucket.remove(pos);
            self.entry_count -= 1;
            if bucket.is_empty() {
                self.tree.remove(&key);
            }
        }
        Ok(())
    }

    /// Check that a delete of this record would succeed, without mutating
    pub fn validate_delete(&self, record: &R) -> IndexResult<()> {
        self.position_of(record).map(|_| ())
    }

    /// Replace `old` with `new`: delete followed by insert
    pub fn update(&mut self, old: &R, new: R) -> IndexResult<()> {
        self.delete(old)?;
        self.insert(new);
        Ok(())
    }

    /// Whether this exact record value is present in its equal-key run
    pub fn contains(&self, record: &R) -> bool {
        self.position_of(record).is_ok()
    }

    /// Lazy iterator over the equal-key run for `key`, insertion order
    pub fn get<'a>(&'a self, key: &IndexKey) -> impl Iterator<Item = &'a R> {
        self.tree.get(key).into_iter().flatten()
    }

    /// Lazy iterator over records whose key lies between `min` and `max`.
    ///
    /// `inclusive` selects closed/open treatment of each bound; `None`
    /// bounds are unbounded. Ascending key order, or descending when
    /// `reverse` (equal-key runs are reversed too, so the sequence is
    /// the exact mirror of the ascending one).
    pub fn irange_key<'a>(
        &'a self,
        min: Option<&IndexKey>,
        max: Option<&IndexKey>,
        inclusive: (bool, bool),
        reverse: bool,
    ) -> Box<dyn Iterator<Item = &'a R> + 'a> {
        // BTreeMap::range panics on an inverted or doubly-excluded empty
        // window; such a window is just an empty result here
        if let (Some(lo_k), Some(hi_k)) = (min, max) {
            if lo_k > hi_k || (lo_k == hi_k && !(inclusive.0 && inclusive.1)) {
                return Box::new(std::iter::empty());
            }
        }

        let lo = match (min, inclusive.0) {
            (Some(k), true) => Bound::Included(k.clone()),
            (Some(k), false) => Bound::Excluded(k.clone()),
            (None, _) => Bound::Unbounded,
        };
        let hi = match (max, inclusive.1) {
            (Some(k), true) => Bound::Included(k.clone()),
            (Some(k), false) => Bound::Excluded(k.clone()),
            (None, _) => Bound::Unbounded,
        };

        let range = self.tree.range((lo, hi));
        if reverse {
            Box::new(range.rev().flat_map(|(_, bucket)| bucket.iter().rev()))
        } else {
            Box::new(range.flat_map(|(_, bucket)| bucket.iter()))
        }
    }

    /// Lazy iterator over ordinal positions `[start, stop)` of the
    /// sorted sequence.
    ///
    /// With `reverse` the sequence is flattened in descending order
    /// first, then the positions apply: position 0 is the largest-key
    /// record.
    pub fn islice<'a>(
        &'a self,
        start: usize,
        stop: usize,
        reverse: bool,
    ) -> Box<dyn Iterator<Item = &'a R> + 'a> {
        let flat: Box<dyn Iterator<Item = &'a R> + 'a> = if reverse {
            Box::new(self.tree.values().rev().flat_map(|b| b.iter().rev()))
        } else {
            Box::new(self.tree.values().flat_map(|b| b.iter()))
        };
        Box::new(flat.skip(start).take(stop.saturating_sub(start)))
    }

    /// Exact multiplicity of a record value
    pub fn count(&self, record: &R) -> usize {
        self.tree
            .get(&(self.extractor)(record))
            .map_or(0, |bucket| bucket.iter().filter(|r| *r == record).count())
    }

    /// Number of records in the equal-key run for `key`
    pub fn count_key(&self, key: &IndexKey) -> usize {
        self.tree.get(key).map_or(0, Vec::len)
    }

    /// The record with the smallest key (earliest inserted on ties)
    pub fn first(&self) -> Option<&R> {
        self.tree.values().next().and_then(|b| b.first())
    }

    /// The record with the largest key (latest inserted on ties)
    pub fn last(&self) -> Option<&R> {
        self.tree.values().next_back().and_then(|b| b.last())
    }

    /// Total number of records, O(1)
    pub fn len(&self) -> usize {
        self.entry_count
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Iterate over all records in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.tree.values().flatten()
    }

    /// Snapshot of all records in ascending key order, for backfilling
    /// another index
    pub fn records(&self) -> Vec<R> {
        self.tree.values().flatten().cloned().collect()
    }
}
