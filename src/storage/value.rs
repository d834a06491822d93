#![forbid(unsafe_code)]

use std::fmt;

use rusqlite::types::{Value as SqlValue, ValueRef};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{Result, StoreError};
use crate::ontology::DataType;
use crate::types::ResourceId;

/// A property value in its typed, stored form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// `xsd:string` (and text stored for unbound ranges).
    String(String),
    /// `xsd:integer`
    Integer(i64),
    /// `xsd:boolean`
    Boolean(bool),
    /// `xsd:date`
    Date(Date),
    /// `xsd:dateTime`, whole seconds in UTC.
    DateTime(OffsetDateTime),
    /// Reference to another resource.
    Resource(ResourceId),
}

impl Value {
    /// Normalizes a timestamp to the stored precision (UTC, whole seconds).
    pub fn datetime(dt: OffsetDateTime) -> Result<Self> {
        OffsetDateTime::from_unix_timestamp(dt.unix_timestamp())
            .map(Value::DateTime)
            .map_err(|err| StoreError::consistency(format!("timestamp out of range: {err}")))
    }

    /// Datatype this value belongs to. Text is reported as `String`.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Integer(_) => DataType::Integer,
            Value::Boolean(_) => DataType::Boolean,
            Value::Date(_) => DataType::Date,
            Value::DateTime(_) => DataType::DateTime,
            Value::Resource(_) => DataType::Resource,
        }
    }

    /// Target of a resource reference.
    pub fn as_resource(&self) -> Option<ResourceId> {
        match self {
            Value::Resource(id) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn to_sql(&self) -> SqlValue {
        match self {
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Integer(i) => SqlValue::Integer(*i),
            Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
            Value::Date(d) => SqlValue::Integer(d.midnight().assume_utc().unix_timestamp()),
            Value::DateTime(dt) => SqlValue::Integer(dt.unix_timestamp()),
            Value::Resource(id) => SqlValue::Integer(id.0),
        }
    }

    /// Decodes a stored column according to the property's datatype.
    pub(crate) fn from_sql(data_type: DataType, raw: ValueRef<'_>) -> Result<Self> {
        let corrupt = |what: &str| {
            StoreError::consistency(format!("stored {data_type} value is not {what}"))
        };
        let int = || match raw {
            ValueRef::Integer(i) => Ok(i),
            _ => Err(corrupt("an integer")),
        };
        match data_type {
            DataType::String | DataType::Unbound => match raw {
                ValueRef::Text(bytes) => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
                ValueRef::Integer(i) => Ok(Value::String(i.to_string())),
                _ => Err(corrupt("text")),
            },
            DataType::Integer => Ok(Value::Integer(int()?)),
            DataType::Boolean => Ok(Value::Boolean(int()? != 0)),
            DataType::Date => {
                let dt = OffsetDateTime::from_unix_timestamp(int()?)
                    .map_err(|_| corrupt("a valid date"))?;
                Ok(Value::Date(dt.date()))
            }
            DataType::DateTime => OffsetDateTime::from_unix_timestamp(int()?)
                .map(Value::DateTime)
                .map_err(|_| corrupt("a valid timestamp")),
            DataType::Resource => Ok(Value::Resource(ResourceId(int()?))),
        }
    }
}

impl fmt::Display for Value {
    /// Canonical lexical form. Resources print as their numeric id.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => {
                let text = d
                    .format(format_description!("[year]-[month]-[day]"))
                    .map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
            Value::DateTime(dt) => {
                let text = dt
                    .format(format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
                    ))
                    .map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
            Value::Resource(id) => write!(f, "{id}"),
        }
    }
}
