//! Key values extracted from records.
//!
//! One key type serves every index flavor: the hashed indexes need
//! `Eq + Hash`, the ordered index needs a total order. Floats are stored
//! as total-ordering bit patterns so `IndexKey` can derive all three.

use std::fmt;
use std::sync::Arc;

/// Key extractor bound to one index: a pure function from record to key.
pub type KeyExtractor<R> = Arc<dyn Fn(&R) -> IndexKey>;

/// Index key representing an extracted attribute value.
///
/// Ordering is deterministic: Null < Bool < Int < Float < String.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Missing or unindexable attribute; sorts before everything else
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value (stored as bits for total ordering)
    Float(u64),
    /// String value
    String(String),
}

impl IndexKey {
    /// Create a key from a boolean
    pub fn from_bool(v: bool) -> Self {
        IndexKey::Bool(v)
    }

    /// Create a key from an integer
    pub fn from_int(v: i64) -> Self {
        IndexKey::Int(v)
    }

    /// Create a key from a float
    ///
    /// Uses bit representation for total ordering.
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        // Negative: flip all bits. Positive: flip sign bit.
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        IndexKey::Float(ordered)
    }

    /// Create a key from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Create a key from a JSON value.
    ///
    /// JSON null maps to `IndexKey::Null`; arrays and objects are not
    /// indexable.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(IndexKey::Null),
            serde_json::Value::Bool(b) => Some(IndexKey::from_bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::from_int(i))
                } else if let Some(f) = n.as_f64() {
                    Some(IndexKey::from_float(f))
                } else {
                    None
                }
            }
            serde_json::Value::String(s) => Some(IndexKey::from_string(s)),
            _ => None,
        }
    }

    /// Recover the f64 behind an ordered bit pattern
    fn float_from_ordered(ordered: u64) -> f64 {
        let bits = if (ordered >> 63) == 1 {
            ordered ^ (1 << 63)
        } else {
            !ordered
        };
        f64::from_bits(bits)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Null => write!(f, "null"),
            IndexKey::Bool(b) => write!(f, "{}", b),
            IndexKey::Int(i) => write!(f, "{}", i),
            IndexKey::Float(bits) => write!(f, "{}", Self::float_from_ordered(*bits)),
            IndexKey::String(s) => write!(f, "{}", s),
        }
    }
}
