//! MultiIndex coordinator
//!
//! Owns a named set of index instances and fans every mutation out to
//! all of them, in registration order. The contract to callers: after
//! any successful operation, every registered index holds the identical
//! multiset of records, differing only in structural view.
//!
//! # Invariants
//!
//! - Index names are unique within a container
//! - Deletes are two-phase: validated against every index before any
//!   index is mutated, so a failed delete leaves no partial fan-out
//! - A newly added index is backfilled from existing data before it
//!   becomes visible to callers

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::errors::{IndexError, IndexResult};
use crate::hashed::{HashedNonUnique, HashedUnique};
use crate::key::{IndexKey, KeyExtractor};
use crate::ordered::OrderedNonUnique;

/// Storage structure and duplicate-key policy of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFlavor {
    /// One key maps to exactly one record
    HashedUnique,
    /// One key maps to an ordered bucket of records
    HashedNonUnique,
    /// Globally sorted sequence, duplicate keys permitted
    OrderedNonUnique,
}

impl IndexFlavor {
    /// Whether this flavor enforces a one-key-one-record relationship
    pub fn is_unique(&self) -> bool {
        matches!(self, IndexFlavor::HashedUnique)
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexFlavor::HashedUnique => "hashed-unique",
            IndexFlavor::HashedNonUnique => "hashed-non-unique",
            IndexFlavor::OrderedNonUnique => "ordered-non-unique",
        }
    }
}

impl fmt::Display for IndexFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declaration of one index: name, key extractor and flavor.
pub struct IndexSpec<R> {
    name: String,
    extractor: KeyExtractor<R>,
    flavor: IndexFlavor,
}

impl<R> IndexSpec<R> {
    fn new(
        name: impl Into<String>,
        extractor: impl Fn(&R) -> IndexKey + 'static,
        flavor: IndexFlavor,
    ) -> Self {
        Self {
            name: name.into(),
            extractor: Arc::new(extractor),
            flavor,
        }
    }

    /// Declare a hashed unique index
    pub fn hashed_unique(name: impl Into<String>, extractor: impl Fn(&R) -> IndexKey + 'static) -> Self {
        Self::new(name, extractor, IndexFlavor::HashedUnique)
    }

    /// Declare a hashed non-unique index
    pub fn hashed_non_unique(
        name: impl Into<String>,
        extractor: impl Fn(&R) -> IndexKey + 'static,
    ) -> Self {
        Self::new(name, extractor, IndexFlavor::HashedNonUnique)
    }

    /// Declare an ordered non-unique index
    pub fn ordered_non_unique(
        name: impl Into<String>,
        extractor: impl Fn(&R) -> IndexKey + 'static,
    ) -> Self {
        Self::new(name, extractor, IndexFlavor::OrderedNonUnique)
    }

    /// Returns the index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the index flavor
    pub fn flavor(&self) -> IndexFlavor {
        self.flavor
    }
}

impl IndexSpec<serde_json::Value> {
    /// Extract `record[field]`, mapping missing or unindexable values to
    /// `IndexKey::Null`
    fn field_extractor(field: String) -> impl Fn(&serde_json::Value) -> IndexKey {
        move |record: &serde_json::Value| {
            record
                .get(field.as_str())
                .and_then(IndexKey::from_json)
                .unwrap_or(IndexKey::Null)
        }
    }

    /// Hashed unique index over a named JSON attribute; the index takes
    /// the field's name
    pub fn hashed_unique_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            field.clone(),
            Self::field_extractor(field),
            IndexFlavor::HashedUnique,
        )
    }

    /// Hashed non-unique index over a named JSON attribute
    pub fn hashed_non_unique_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            field.clone(),
            Self::field_extractor(field),
            IndexFlavor::HashedNonUnique,
        )
    }

    /// Ordered non-unique index over a named JSON attribute
    pub fn ordered_non_unique_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(
            field.clone(),
            Self::field_extractor(field),
            IndexFlavor::OrderedNonUnique,
        )
    }
}

/// One registered index, tagged by flavor.
///
/// The coordinator holds a homogeneous collection of this type and
/// drives it through the shared mutation surface; flavor-specific query
/// operations are reached through the checked accessors.
pub enum Index<R> {
    /// Hashed unique variant
    HashedUnique(HashedUnique<R>),
    /// Hashed non-unique variant
    HashedNonUnique(HashedNonUnique<R>),
    /// Ordered non-unique variant
    OrderedNonUnique(OrderedNonUnique<R>),
}

impl<R> fmt::Debug for Index<R>
where
    R: Clone + PartialEq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (variant, name) = match self {
            Index::HashedUnique(i) => ("HashedUnique", i.name()),
            Index::HashedNonUnique(i) => ("HashedNonUnique", i.name()),
            Index::OrderedNonUnique(i) => ("OrderedNonUnique", i.name()),
        };
        f.debug_struct("Index")
            .field("variant", &variant)
            .field("name", &name)
            .finish()
    }
}

impl<R> Index<R>
where
    R: Clone + PartialEq,
{
    fn from_spec(spec: IndexSpec<R>) -> Self {
        match spec.flavor {
            IndexFlavor::HashedUnique => {
                Index::HashedUnique(HashedUnique::new(spec.name, spec.extractor))
            }
            IndexFlavor::HashedNonUnique => {
                Index::HashedNonUnique(HashedNonUnique::new(spec.name, spec.extractor))
            }
            IndexFlavor::OrderedNonUnique => {
                Index::OrderedNonUnique(OrderedNonUnique::new(spec.name, spec.extractor))
            }
        }
    }

    /// Returns the index name
    pub fn name(&self) -> &str {
        match self {
            Index::HashedUnique(i) => i.name(),
            Index::HashedNonUnique(i) => i.name(),
            Index::OrderedNonUnique(i) => i.name(),
        }
    }

    /// Returns the index flavor
    pub fn flavor(&self) -> IndexFlavor {
        match self {
            Index::HashedUnique(_) => IndexFlavor::HashedUnique,
            Index::HashedNonUnique(_) => IndexFlavor::HashedNonUnique,
            Index::OrderedNonUnique(_) => IndexFlavor::OrderedNonUnique,
        }
    }

    /// Insert a record.
    ///
    /// The unique flavor overwrites silently on a duplicate key; the
    /// non-unique flavors always append.
    pub fn insert(&mut self, record: R) {
        match self {
            Index::HashedUnique(i) => {
                i.insert(record);
            }
            Index::HashedNonUnique(i) => i.insert(record),
            Index::OrderedNonUnique(i) => i.insert(record),
        }
    }

    /// Delete a record under this flavor's removal semantics
    pub fn delete(&mut self, record: &R) -> IndexResult<()> {
        match self {
            Index::HashedUnique(i) => i.delete(record).map(|_| ()),
            Index::HashedNonUnique(i) => i.delete(record),
            Index::OrderedNonUnique(i) => i.delete(record),
        }
    }

    /// Check that a delete of this record would succeed, without
    /// mutating
    pub(crate) fn validate_delete(&self, record: &R) -> IndexResult<()> {
        match self {
            Index::HashedUnique(i) => i.validate_delete(record),
            // Absent records are a no-op delete for this flavor
            Index::HashedNonUnique(_) => Ok(()),
            Index::OrderedNonUnique(i) => i.validate_delete(record),
        }
    }

    /// Whether this exact record value is present
    pub fn contains(&self, record: &R) -> bool {
        match self {
            Index::HashedUnique(i) => i.contains(record),
            Index::HashedNonUnique(i) => i.contains(record),
            Index::OrderedNonUnique(i) => i.contains(record),
        }
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        match self {
            Index::HashedUnique(i) => i.len(),
            Index::HashedNonUnique(i) => i.len(),
            Index::OrderedNonUnique(i) => i.len(),
        }
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records, for backfill and consistency checks
    pub fn records(&self) -> Vec<R> {
        match self {
            Index::HashedUnique(i) => i.records(),
            Index::HashedNonUnique(i) => i.records(),
            Index::OrderedNonUnique(i) => i.records(),
        }
    }

    /// The hashed unique variant, if this index is one
    pub fn as_hashed_unique(&self) -> Option<&HashedUnique<R>> {
        match self {
            Index::HashedUnique(i) => Some(i),
            _ => None,
        }
    }

    /// The hashed non-unique variant, if this index is one
    pub fn as_hashed_non_unique(&self) -> Option<&HashedNonUnique<R>> {
        match self {
            Index::HashedNonUnique(i) => Some(i),
            _ => None,
        }
    }

    /// The ordered non-unique variant, if this index is one
    pub fn as_ordered_non_unique(&self) -> Option<&OrderedNonUnique<R>> {
        match self {
            Index::OrderedNonUnique(i) => Some(i),
            _ => None,
        }
    }
}

/// Coordinator owning the named index set.
///
/// All mutations go through `insert`/`update`/`delete` here; individual
/// indexes obtained via `index(name)` are read-only query handles.
pub struct MultiIndex<R> {
    /// Registered indexes in registration order
    indexes: Vec<Index<R>>,
    /// Name to position in `indexes`
    by_name: HashMap<String, usize>,
}

impl<R> MultiIndex<R>
where
    R: Clone + PartialEq,
{
    /// Creates an empty container with no indexes
    pub fn new() -> Self {
        Self {
            indexes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Creates a container and registers each spec in order
    pub fn with_indexes(specs: impl IntoIterator<Item = IndexSpec<R>>) -> IndexResult<Self> {
        let mut container = Self::new();
        for spec in specs {
            container.add_index(spec)?;
        }
        Ok(container)
    }

    /// Register a new index, backfilling it from existing data.
    ///
    /// Fails with `DuplicateIndexName` if the name is already
    /// registered; the existing index is never replaced.
    ///
    /// Backfill source preference: an existing hashed unique index if
    /// the new index is itself unique, otherwise an existing non-unique
    /// index, otherwise any existing index. An empty container yields an
    /// empty index.
    pub fn add_index(&mut self, spec: IndexSpec<R>) -> IndexResult<()> {
        if self.by_name.contains_key(spec.name()) {
            return Err(IndexError::DuplicateIndexName(spec.name().to_string()));
        }

        let mut index = Index::from_spec(spec);
        if let Some(source) = self.backfill_source(index.flavor().is_unique()) {
            let records = source.records();
            debug!(
                index = index.name(),
                source = source.name(),
                records = records.len(),
                "backfilling new index"
            );
            for record in records {
                index.insert(record);
            }
        }

        self.by_name.insert(index.name().to_string(), self.indexes.len());
        self.indexes.push(index);
        Ok(())
    }

    fn backfill_source(&self, new_is_unique: bool) -> Option<&Index<R>> {
        if new_is_unique {
            if let Some(source) = self.indexes.iter().find(|i| i.flavor().is_unique()) {
                return Some(source);
            }
        }
        self.indexes
            .iter()
            .find(|i| !i.flavor().is_unique())
            .or_else(|| self.indexes.first())
    }

    /// Insert a record into every registered index, in registration
    /// order.
    ///
    /// Inserts cannot fail: a duplicate key on a unique index overwrites
    /// silently, which is the one way the cross-index multiset invariant
    /// can diverge (the other indexes still hold the displaced record).
    /// Callers replacing a record must use `update` instead.
    pub fn insert(&mut self, record: R) {
        trace!(indexes = self.indexes.len(), "fan-out insert");
        for index in &mut self.indexes {
            index.insert(record.clone());
        }
    }

    /// Delete a record from every registered index.
    ///
    /// Two-phase: every index first validates that the delete would
    /// succeed under its own removal semantics; only when all agree is
    /// any index mutated. On error no index has changed.
    pub fn delete(&mut self, record: &R) -> IndexResult<()> {
        for index in &self.indexes {
            index.validate_delete(record)?;
        }
        trace!(indexes = self.indexes.len(), "fan-out delete");
        for index in &mut self.indexes {
            index.delete(record)?;
        }
        Ok(())
    }

    /// Replace `old` with `new` in every registered index: delete
    /// followed by insert per index, in registration order — not an
    /// atomic swap.
    ///
    /// The delete half is validated across all indexes before any index
    /// is mutated; on error no index has changed.
    pub fn update(&mut self, old: &R, new: R) -> IndexResult<()> {
        for index in &self.indexes {
            index.validate_delete(old)?;
        }
        trace!(indexes = self.indexes.len(), "fan-out update");
        for index in &mut self.indexes {
            index.delete(old)?;
            index.insert(new.clone());
        }
        Ok(())
    }

    /// Named accessor for queries.
    ///
    /// Fails with `IndexNotFound` if no index carries this name.
    pub fn index(&self, name: &str) -> IndexResult<&Index<R>> {
        self.by_name
            .get(name)
            .map(|&pos| &self.indexes[pos])
            .ok_or_else(|| IndexError::IndexNotFound(name.to_string()))
    }

    /// Registered index names, in registration order
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.iter().map(Index::name)
    }

    /// Number of registered indexes
    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Number of records held (as reported by the first registered
    /// index; zero when no index is registered)
    pub fn len(&self) -> usize {
        self.indexes.first().map_or(0, Index::len)
    }

    /// Whether the container holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the registered indexes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Index<R>> {
        self.indexes.iter()
    }

    /// Log every index's name, flavor and size. Diagnostic only.
    pub fn dump(&self) {
        for index in &self.indexes {
            debug!(
                index = index.name(),
                flavor = %index.flavor(),
                records = index.len(),
                "index state"
            );
        }
    }
}

impl<R> Default for MultiIndex<R>
where
    R: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
