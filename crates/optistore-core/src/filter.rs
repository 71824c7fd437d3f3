//! Declarative record filters.
//!
//! A filter specification maps field names to comparison expressions of the
//! form `<op>.<reference>`, e.g. `"lte.3"` or `"contains.n"`. The operator
//! prefix is optional and defaults to equality. Specifications are parsed
//! once into [`FilterTerm`]s and evaluated with loose, JSON-aware coercion.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use nom::IResult;
use nom::character::complete::{alpha1, char};
use nom::sequence::terminated;
use serde_json::Value;

use crate::record::{Record, render_number};

/// Errors raised while turning loosely-typed input into a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The filter document was not a JSON object.
    #[error("filter specification must be an object, got {found}")]
    NotAnObject {
        /// JSON type that was supplied.
        found: &'static str,
    },
    /// A field expression was neither text nor a scalar.
    #[error("expression for field `{field}` must be a string, number or boolean, got {found}")]
    InvalidExpression {
        /// Field the expression belongs to.
        field: String,
        /// JSON type that was supplied.
        found: &'static str,
    },
}

/// Result alias for filter construction.
pub type FilterResult<T> = std::result::Result<T, FilterError>;

/// Comparison operators understood in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonOp {
    /// `eq`
    Eq,
    /// `neq`
    NotEq,
    /// `gt`
    GreaterThan,
    /// `lt`
    LessThan,
    /// `gte`
    GreaterThanOrEq,
    /// `lte`
    LessThanOrEq,
    /// `contains`
    Contains,
    /// `startswith`
    StartsWith,
}

impl ComparisonOp {
    /// Look up an operator keyword, ignoring ASCII case.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::NotEq),
            "gt" => Some(Self::GreaterThan),
            "lt" => Some(Self::LessThan),
            "gte" => Some(Self::GreaterThanOrEq),
            "lte" => Some(Self::LessThanOrEq),
            "contains" => Some(Self::Contains),
            "startswith" => Some(Self::StartsWith),
            _ => None,
        }
    }

    /// Canonical keyword used in expressions.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::NotEq => "neq",
            Self::GreaterThan => "gt",
            Self::LessThan => "lt",
            Self::GreaterThanOrEq => "gte",
            Self::LessThanOrEq => "lte",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One compiled `field <op> reference` test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    /// Field under test.
    pub field: String,
    /// Comparison to apply.
    pub operator: ComparisonOp,
    /// Literal reference text.
    pub reference: String,
}

impl FilterTerm {
    /// Parse an expression for `field`.
    ///
    /// Text without a recognised `<op>.` prefix is kept whole as an
    /// equality reference, so a term is never dropped.
    #[must_use]
    pub fn parse(field: impl Into<String>, expression: &str) -> Self {
        let (operator, reference) = split_expression(expression);
        Self {
            field: field.into(),
            operator,
            reference: reference.to_owned(),
        }
    }

    /// Evaluate the term against a record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.field);
        let reference = self.reference.as_str();
        match self.operator {
            ComparisonOp::Eq => loose_eq(value, reference),
            ComparisonOp::NotEq => !loose_eq(value, reference),
            ComparisonOp::GreaterThan => loose_cmp(value, reference) == Some(Ordering::Greater),
            ComparisonOp::LessThan => loose_cmp(value, reference) == Some(Ordering::Less),
            ComparisonOp::GreaterThanOrEq => {
                matches!(loose_cmp(value, reference), Some(Ordering::Greater | Ordering::Equal))
            }
            ComparisonOp::LessThanOrEq => {
                matches!(loose_cmp(value, reference), Some(Ordering::Less | Ordering::Equal))
            }
            ComparisonOp::Contains => lowered_text(value)
                .is_some_and(|text| text.contains(&reference.to_lowercase())),
            ComparisonOp::StartsWith => lowered_text(value)
                .is_some_and(|text| text.starts_with(&reference.to_lowercase())),
        }
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}.{}", self.field, self.operator, self.reference)
    }
}

/// Conjunction of field terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    terms: Vec<FilterTerm>,
}

impl FilterSpec {
    /// Empty specification; matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field expression.
    #[must_use]
    pub fn term(mut self, field: impl Into<String>, expression: &str) -> Self {
        self.terms.push(FilterTerm::parse(field, expression));
        self
    }

    /// Build a specification from a JSON object of field expressions.
    ///
    /// Numbers and booleans are read as their textual form, mirroring how a
    /// bare value `{ "id": 3 }` means `eq.3`.
    ///
    /// # Errors
    /// Returns [`FilterError`] when the document is not an object or an
    /// expression is `null`, an array or an object.
    pub fn from_json(document: &Value) -> FilterResult<Self> {
        let Value::Object(fields) = document else {
            return Err(FilterError::NotAnObject {
                found: json_type(document),
            });
        };
        let mut spec = Self::new();
        for (field, expression) in fields {
            let text = match expression {
                Value::String(text) => text.clone(),
                Value::Number(number) => render_number(number),
                Value::Bool(flag) => flag.to_string(),
                other => {
                    return Err(FilterError::InvalidExpression {
                        field: field.clone(),
                        found: json_type(other),
                    });
                }
            };
            spec = spec.term(field.clone(), &text);
        }
        Ok(spec)
    }

    /// Parsed terms, in insertion order.
    #[must_use]
    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    /// Whether every term accepts the record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.terms.iter().all(|term| term.matches(record))
    }
}

impl<F, E> FromIterator<(F, E)> for FilterSpec
where
    F: Into<String>,
    E: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (F, E)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |spec, (field, expr)| spec.term(field, expr.as_ref()))
    }
}

/// Predicate closure accepted in place of a declarative specification.
pub type Predicate = Rc<dyn Fn(&Record) -> bool>;

/// Any accepted filter input.
#[derive(Clone, Default)]
pub enum Filter {
    /// Match every record.
    #[default]
    All,
    /// Declarative field expressions.
    Spec(FilterSpec),
    /// Caller-supplied predicate.
    Predicate(Predicate),
}

impl Filter {
    /// Wrap a predicate closure.
    #[must_use]
    pub fn predicate(predicate: impl Fn(&Record) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(predicate))
    }

    /// Parse a JSON filter document; `null` matches everything.
    ///
    /// # Errors
    /// See [`FilterSpec::from_json`].
    pub fn from_json(document: &Value) -> FilterResult<Self> {
        if document.is_null() {
            return Ok(Self::All);
        }
        FilterSpec::from_json(document).map(Self::Spec)
    }

    /// Evaluate the filter.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Spec(spec) => spec.matches(record),
            Self::Predicate(predicate) => predicate(record),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<FilterSpec> for Filter {
    fn from(spec: FilterSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<&Self> for Filter {
    fn from(filter: &Self) -> Self {
        filter.clone()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Filter {
    fn from(terms: [(&str, &str); N]) -> Self {
        Self::Spec(terms.into_iter().collect())
    }
}

fn operator_prefix(input: &str) -> IResult<&str, &str> {
    terminated(alpha1, char('.'))(input)
}

fn split_expression(expression: &str) -> (ComparisonOp, &str) {
    match operator_prefix(expression) {
        Ok((reference, keyword)) => ComparisonOp::from_keyword(keyword)
            .map_or((ComparisonOp::Eq, expression), |op| (op, reference)),
        Err(_) => (ComparisonOp::Eq, expression),
    }
}

/// Numeric reading of a reference; blank text reads as zero.
fn reference_number(reference: &str) -> Option<f64> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn scalar_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(f64::from(u8::from(*flag))),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn loose_cmp(value: Option<&Value>, reference: &str) -> Option<Ordering> {
    match value? {
        Value::String(text) => Some(text.as_str().cmp(reference)),
        Value::Array(_) | Value::Object(_) => None,
        Value::Bool(flag) => match reference.trim() {
            "true" => Some(flag.cmp(&true)),
            "false" => Some(flag.cmp(&false)),
            _ => f64::from(u8::from(*flag)).partial_cmp(&reference_number(reference)?),
        },
        scalar =>scalar_number(scalar)?.partial_cmp(&reference_number(reference)?),
    }
}

fn loose_eq(value: Option<&Value>, reference: &str) -> bool {
    match value {
        None | Some(Value::Null) => false,
        other => loose_cmp(other, reference) == Some(Ordering::Equal),
    }
}

/// Lower-cased text of a truthy scalar.
fn lowered_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.to_lowercase()),
        Value::Number(number) if number.as_f64().is_some_and(|n| n != 0.0) => {
            Some(render_number(number))
        }
        Value::Bool(true) => Some("true".to_owned()),
        _ => None,
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
