//! Schema-free document metadata and metadata filters.
//!
//! Metadata is used both for provenance (where a chunk came from) and as the
//! predicate surface for [`MetadataFilter`]. Values form a small tagged union
//! so that equality and subset checks are exhaustive matches rather than
//! runtime type inspection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key-value metadata attached to a [`Document`](crate::Document).
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A dynamically-typed metadata value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean flag.
    Bool(bool),
    /// Any numeric value. Integers are stored losslessly up to 2^53.
    Number(f64),
    /// A text value.
    String(String),
    /// An ordered collection of values.
    List(Vec<MetadataValue>),
    /// A nested map.
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Return the value as a string slice if it is a [`MetadataValue::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as a number if it is a [`MetadataValue::Number`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value is a collection for filter purposes.
    ///
    /// Only lists are collections; nested maps compare by equality like scalars.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Check whether this (document-side) value satisfies `expected` (filter-side).
    ///
    /// Lists match when `self` contains every element of `expected`. Any other
    /// pair matches on equality. A list never matches a non-list.
    pub fn satisfies(&self, expected: &MetadataValue) -> bool {
        match (self, expected) {
            (Self::List(actual), Self::List(wanted)) => {
                wanted.iter().all(|item| actual.contains(item))
            }
            (Self::List(_), _) | (_, Self::List(_)) => false,
            (actual, wanted) => actual == wanted,
        }
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// A conjunction of expected metadata values.
///
/// A document matches when, for every filter key, its metadata contains the
/// key and the stored value [`satisfies`](MetadataValue::satisfies) the
/// expected one. An empty filter matches everything.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::MetadataFilter;
///
/// let filter = MetadataFilter::new()
///     .require("lang", "en")
///     .require("tags", vec!["rust", "async"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter {
    conditions: Metadata,
}

impl MetadataFilter {
    /// Create an empty filter that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to match `value`.
    pub fn require(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Whether this filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Check a document's metadata against every condition.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            metadata.get(key).is_some_and(|actual| actual.satisfies(expected))
        })
    }
}

impl From<Metadata> for MetadataFilter {
    fn from(conditions: Metadata) -> Self {
        Self { conditions }
    }
}
