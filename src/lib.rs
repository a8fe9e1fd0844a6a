//! multidex - an in-memory multi-index record container
//!
//! One record collection kept simultaneously accessible through several
//! independently structured indexes, so the same data set can be queried
//! by different attributes without linear scans.
//!
//! # Design Principles
//!
//! - All mutations go through the [`MultiIndex`] coordinator, which fans
//!   them out to every registered index
//! - After any successful operation, every index holds the identical
//!   multiset of records, differing only in structural view
//! - Deletes are validated across all indexes before any index mutates,
//!   so a failure never leaves a partial fan-out
//! - Single-threaded, synchronous, purely in-memory

pub mod container;
pub mod errors;
pub mod hashed;
pub mod key;
pub mod ordered;

pub use container::{Index, IndexFlavor, IndexSpec, MultiIndex};
pub use errors::{IndexError, IndexResult};
pub use hashed::{HashedNonUnique, HashedUnique};
pub use key::{IndexKey, KeyExtractor};
pub use ordered::OrderedNonUnique;
