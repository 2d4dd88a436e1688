use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

/// A single scalar stored in a group-key column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnValue {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Null value
    Null,
}

/// The type of a group-key column, recorded once per grouping dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Text column
    String,
    /// Integer column
    Integer,
    /// Floating point column
    Float,
    /// Boolean column
    Boolean,
    /// Column whose representative value was null
    Null,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

// -------------------------------------------------------------------------------------------------
// Conversions between `ColumnValue` and `serde_json::Value`, so application layers can
// hand group keys to JSON consumers without their own mapping code.
// -------------------------------------------------------------------------------------------------

impl From<&ColumnValue> for serde_json::Value {
    fn from(value: &ColumnValue) -> Self {
        match value {
            ColumnValue::String(s) => Self::String(s.clone()),
            ColumnValue::Integer(i) => Self::Number(serde_json::Number::from(*i)),
            ColumnValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(Self::Null, Self::Number)
            }
            ColumnValue::Boolean(b) => Self::Bool(*b),
            ColumnValue::Null => Self::Null,
        }
    }
}

impl From<ColumnValue> for serde_json::Value {
    fn from(value: ColumnValue) -> Self {
        Self::from(&value)
    }
}

impl TryFrom<&serde_json::Value> for ColumnValue {
    type Error = anyhow::Error;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(anyhow!("Unsupported number value: {}", n));
                }
            }
            serde_json::Value::Bool(b) => Self::Boolean(*b),
            serde_json::Value::Null => Self::Null,
            other => return Err(anyhow!("Group key columns must be scalar, got {}", other)),
        })
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl ColumnValue {
    const fn variant_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Integer(_) => 2,
            Self::Float(_) => 3,
            Self::String(_) => 4,
        }
    }

    /// The column type this value belongs to
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::String(_) => ColumnType::String,
            Self::Integer(_) => ColumnType::Integer,
            Self::Float(_) => ColumnType::Float,
            Self::Boolean(_) => ColumnType::Boolean,
            Self::Null => ColumnType::Null,
        }
    }

    /// Borrow the string payload, if this is a string value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value; `None` for strings and nulls
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl std::hash::Hash for ColumnValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            Self::String(s) => s.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Boolean(b) => b.hash(state),
            Self::Null => {}
        }
    }
}

// Floats compare by `total_cmp` so that equality, hashing and ordering agree and
// group keys can live in ordered and hashed collections alike.
impl PartialEq for ColumnValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ColumnValue {}

impl PartialOrd for ColumnValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColumnValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
        }
    }
}

fn write_tuple<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, ")")
}

/// Identifies one image-like entity, e.g. `(table_number, image_number)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(Vec<i64>);

impl EntityKey {
    /// Build a key from its identifier components
    #[must_use]
    pub const fn new(components: Vec<i64>) -> Self {
        Self(components)
    }

    /// The identifier components in order
    #[must_use]
    pub fn components(&self) -> &[i64] {
        &self.0
    }

    /// Number of components in the key
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no components
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i64>> for EntityKey {
    fn from(components: Vec<i64>) -> Self {
        Self(components)
    }
}

impl<const N: usize> From<[i64; N]> for EntityKey {
    fn from(components: [i64; N]) -> Self {
        Self(components.to_vec())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tuple(f, &self.0)
    }
}

/// Identifies one group within a grouping dimension, e.g. `(3, "A01")` for a well
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(Vec<ColumnValue>);

impl GroupKey {
    /// Build a group key from its column values
    #[must_use]
    pub const fn new(values: Vec<ColumnValue>) -> Self {
        Self(values)
    }

    /// The column values in order
    #[must_use]
    pub fn values(&self) -> &[ColumnValue] {
        &self.0
    }

    /// Number of columns in the key
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column types of this key, position by position
    #[must_use]
    pub fn column_types(&self) -> Vec<ColumnType> {
        self.0.iter().map(ColumnValue::column_type).collect()
    }

    /// Whether any component equals `wildcard`
    #[must_use]
    pub fn has_wildcard(&self, wildcard: &ColumnValue) -> bool {
        self.0.contains(wildcard)
    }

    /// Whether this stored key matches `pattern`, where components equal to
    /// `wildcard` match anything. Keys of different width never match.
    #[must_use]
    pub fn matches_pattern(&self, pattern: &Self, wildcard: &ColumnValue) -> bool {
        self.0.len() == pattern.0.len()
            && self.0.iter().zip(&pattern.0).all(|(value, wanted)| wanted == wildcard || value == wanted)
    }

    /// Render every component with `Display`, for tabular output
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl From<Vec<ColumnValue>> for GroupKey {
    fn from(values: Vec<ColumnValue>) -> Self {
        Self(values)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tuple(f, &self.0)
    }
}

/// Build a [`GroupKey`] from heterogeneous scalars: `group_key![3, "A01"]`
#[macro_export]
macro_rules! group_key {
    ($($value:expr),* $(,)?) => {
        $crate::GroupKey::new(vec![$($crate::ColumnValue::from($value)),*])
    };
}
