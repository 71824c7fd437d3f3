//! Sort specifications.
//!
//! Field sorts are ascending only and compare by the first listed field
//! whose values differ. Values of different JSON types are ranked
//! `null`/booleans/numbers < strings < arrays/objects < absent, so the
//! comparator stays a total order.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::record::Record;

/// Comparator closure accepted in place of field names.
pub type Comparator = Rc<dyn Fn(&Record, &Record) -> Ordering>;

/// Any accepted sort input.
#[derive(Clone, Default)]
pub enum Sort {
    /// Sort by the cache's permanent-identifier field.
    #[default]
    Default,
    /// Sort by the listed fields, in priority order.
    Fields(Vec<String>),
    /// Caller-supplied comparator.
    Comparator(Comparator),
}

impl Sort {
    /// Sort by a single field.
    #[must_use]
    pub fn field(field: impl Into<String>) -> Self {
        Self::Fields(vec![field.into()])
    }

    /// Sort by several fields.
    #[must_use]
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// Wrap a comparator closure.
    #[must_use]
    pub fn comparator(compare: impl Fn(&Record, &Record) -> Ordering + 'static) -> Self {
        Self::Comparator(Rc::new(compare))
    }

    /// Compare two records; `identifier_field` backs [`Sort::Default`].
    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record, identifier_field: &str) -> Ordering {
        match self {
            Self::Default => compare_field(a, b, identifier_field),
            Self::Fields(fields) => fields
                .iter()
                .map(|field| compare_field(a, b, field))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal),
            Self::Comparator(compare) => compare(a, b),
        }
    }
}

impl fmt::Debug for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Self::Comparator(_) => f.write_str("Comparator(..)"),
        }
    }
}

impl From<&str> for Sort {
    fn from(field: &str) -> Self {
        Self::field(field)
    }
}

impl From<String> for Sort {
    fn from(field: String) -> Self {
        Self::field(field)
    }
}

impl From<Vec<String>> for Sort {
    fn from(fields: Vec<String>) -> Self {
        Self::Fields(fields)
    }
}

impl From<Vec<&str>> for Sort {
    fn from(fields: Vec<&str>) -> Self {
        Self::fields(fields)
    }
}

impl<const N: usize> From<[&str; N]> for Sort {
    fn from(fields: [&str; N]) -> Self {
        Self::fields(fields)
    }
}

impl From<&Self> for Sort {
    fn from(sort: &Self) -> Self {
        sort.clone()
    }
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    compare_values(a.get(field), b.get(field))
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        Some(Value::Null | Value::Bool(_) | Value::Number(_)) => 0,
        Some(Value::String(_)) => 1,
        Some(Value::Array(_) | Value::Object(_)) => 2,
        None => 3,
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or_default(),
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => 0.0,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(left), Some(right)) if rank(a) == 0 && rank(b) == 0 => {
            numeric(left).total_cmp(&numeric(right))
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
