//! Join keys and the extractors that build them from entity instances.

use chrono::{DateTime, Utc};
use sea_query::Value;

use crate::entity::Record;
use crate::error::{JoinError, Result};

/// One hashable component of a join key.
///
/// Integer widths are collapsed so that an `i32` and an `i64` holding the same number
/// compare equal; floats compare by bit pattern; temporal values by canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl KeyPart {
    /// Convert a ``SeaQuery`` value into a key part. Returns `None` for value kinds that
    /// can't act as keys.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let part = match value {
            Value::Bool(v) => v.map_or(Self::Null, Self::Bool),
            Value::TinyInt(v) => v.map_or(Self::Null, |v| Self::Int(i64::from(v))),
            Value::SmallInt(v) => v.map_or(Self::Null, |v| Self::Int(i64::from(v))),
            Value::Int(v) => v.map_or(Self::Null, |v| Self::Int(i64::from(v))),
            Value::BigInt(v) => v.map_or(Self::Null, Self::Int),
            Value::TinyUnsigned(v) => v.map_or(Self::Null, |v| Self::UInt(u64::from(v))),
            Value::SmallUnsigned(v) => v.map_or(Self::Null, |v| Self::UInt(u64::from(v))),
            Value::Unsigned(v) => v.map_or(Self::Null, |v| Self::UInt(u64::from(v))),
            Value::BigUnsigned(v) => v.map_or(Self::Null, Self::UInt),
            Value::Float(v) => v.map_or(Self::Null, |v| Self::Float(f64::from(v).to_bits())),
            Value::Double(v) => v.map_or(Self::Null, |v| Self::Float(v.to_bits())),
            Value::String(v) => v.map_or(Self::Null, |v| Self::Text(*v)),
            Value::Char(v) => v.map_or(Self::Null, |v| Self::Text(v.to_string())),
            Value::Bytes(v) => v.map_or(Self::Null, |v| Self::Bytes(*v)),
            Value::ChronoDate(v) => v.map_or(Self::Null, |v| Self::Text(v.to_string())),
            Value::ChronoTime(v) => v.map_or(Self::Null, |v| Self::Text(v.to_string())),
            Value::ChronoDateTime(v) => v.map_or(Self::Null, |v| Self::Text(v.to_string())),
            Value::ChronoDateTimeUtc(v) => v.map_or(Self::Null, |v| {
                let dt: DateTime<Utc> = *v;
                Self::Text(dt.to_rfc3339())
            }),
            _ => return None,
        };
        Some(part)
    }

    /// Whether the part is `NULL` or the zero value of its type.
    #[must_use]
    pub const fn is_null_or_default(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) | Self::Int(0) | Self::UInt(0) => true,
            // 0.0 and -0.0
            Self::Float(bits) => *bits << 1 == 0,
            _ => false,
        }
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Composite join key; two keys are equal iff all parts are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    One(KeyPart),
    Two([KeyPart; 2]),
    Three([KeyPart; 3]),
    Many(Vec<KeyPart>),
}

impl JoinKey {
    /// Build a key from its ordered parts, or `None` if there are none.
    pub(crate) fn from_parts(parts: Vec<KeyPart>) -> Option<Self> {
        let key = match <[KeyPart; 3]>::try_from(parts) {
            Ok(three) => Self::Three(three),
            Err(parts) => match <[KeyPart; 2]>::try_from(parts) {
                Ok(two) => Self::Two(two),
                Err(mut parts) => match parts.len() {
                    0 => return None,
                    1 => Self::One(parts.remove(0)),
                    _ => Self::Many(parts),
                },
            },
        };
        Some(key)
    }

    /// Build a key from raw values, e.g. the owner-key column of a two-hop batch row.
    ///
    /// Returns `None` if `values` is empty or holds a value that can't act as a key.
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Option<Self> {
        let parts = values.into_iter().map(KeyPart::from_value).collect::<Option<Vec<_>>>()?;
        Self::from_parts(parts)
    }

    /// Key parts in order.
    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        match self {
            Self::One(part) => std::slice::from_ref(part),
            Self::Two(parts) => parts,
            Self::Three(parts) => parts,
            Self::Many(parts) => parts,
        }
    }
}

macro_rules! single_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for JoinKey {
                fn from(value: $ty) -> Self {
                    Self::One(value.into())
                }
            }
        )*
    };
}

single_key!(i32, i64, &str, String);

/// Builds [`JoinKey`]s (and bind values) from the join fields of an entity.
#[derive(Debug, Clone)]
pub struct KeyExtractor {
    entity: &'static str,
    fields: Vec<&'static str>,
    reject_null: bool,
}

impl KeyExtractor {
    /// Extractor over `fields` of `entity`. With `reject_null`, null or default
    /// components are rejected with [`JoinError::NullKey`].
    #[must_use]
    pub const fn new(entity: &'static str, fields: Vec<&'static str>, reject_null: bool) -> Self {
        Self {
            entity,
            fields,
            reject_null,
        }
    }

    /// Join fields, in order.
    #[must_use]
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    /// Field values in join order, ready to bind.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::EntityMismatch`] if `record` isn't the extractor's entity,
    /// [`JoinError::NullKey`] when null keys are rejected and a component is null or
    /// default, or [`JoinError::UnsupportedKeyValue`] for unusable values.
    pub fn values(&self, record: &dyn Record) -> Result<Vec<Value>> {
        if record.entity_name() != self.entity {
            return Err(JoinError::EntityMismatch {
                expected: self.entity,
                found: record.entity_name(),
            });
        }
        self.fields
            .iter()
            .map(|&field| {
                let value = record.field_value(field).ok_or(JoinError::UnsupportedKeyValue {
                    entity: self.entity,
                    field,
                })?;
                if self.reject_null {
                    let part = KeyPart::from_value(value.clone()).ok_or(
                        JoinError::UnsupportedKeyValue {
                            entity: self.entity,
                            field,
                        },
                    )?;
                    if part.is_null_or_default() {
                        return Err(JoinError::NullKey {
                            entity: self.entity,
                            field,
                        });
                    }
                }
                Ok(value)
            })
            .collect()
    }

    /// The join key of `record`.
    ///
    /// # Errors
    ///
    /// See [`KeyExtractor::values`]. Extractors without fields return
    /// [`JoinError::EmptyKey`].
    pub fn extract(&self, record: &dyn Record) -> Result<JoinKey> {
        let parts = self
            .values(record)?
            .into_iter()
            .zip(&self.fields)
            .map(|(value, &field)| {
                KeyPart::from_value(value).ok_or(JoinError::UnsupportedKeyValue {
                    entity: self.entity,
                    field,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        JoinKey::from_parts(parts).ok_or(JoinError::EmptyKey { entity: self.entity })
    }
}
