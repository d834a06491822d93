use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use super::term::Literal;
use crate::error::SchemaError;
use crate::ontology::{DataType, Property};
use crate::storage::Value;

/// Converts a literal into the stored value for `property`.
pub(crate) fn coerce(property: &Property, literal: &Literal) -> Result<Value, SchemaError> {
    let mismatch = || SchemaError::DatatypeMismatch {
        property: property.name().to_string(),
        expected: property.data_type(),
        found: literal.kind().to_string(),
    };
    match (property.data_type(), literal) {
        (DataType::String | DataType::Unbound, Literal::Lexical(s)) => Ok(Value::String(s.clone())),
        (DataType::Unbound, other) => Ok(Value::String(lexical_form(other))),
        (DataType::Integer, Literal::Integer(i)) => Ok(Value::Integer(*i)),
        (DataType::Integer, Literal::Lexical(s)) => s
            .trim()
            .parse()
            .map(Value::Integer)
            .map_err(|_| invalid(DataType::Integer, s)),
        (DataType::Boolean, Literal::Boolean(b)) => Ok(Value::Boolean(*b)),
        (DataType::Boolean, Literal::Lexical(s)) => match s.trim() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            _ => Err(invalid(DataType::Boolean, s)),
        },
        (DataType::Date, Literal::Date(d)) => Ok(Value::Date(*d)),
        (DataType::Date, Literal::Lexical(s)) => parse_date(s.trim())
            .map(Value::Date)
            .ok_or_else(|| invalid(DataType::Date, s)),
        (DataType::DateTime, Literal::DateTime(dt)) => {
            to_stored_datetime(*dt).ok_or_else(|| invalid(DataType::DateTime, &lexical_form(literal)))
        }
        (DataType::DateTime, Literal::Lexical(s)) => parse_datetime(s.trim())
            .and_then(to_stored_datetime)
            .ok_or_else(|| invalid(DataType::DateTime, s)),
        _ => Err(mismatch()),
    }
}

fn invalid(datatype: DataType, lexical: &str) -> SchemaError {
    SchemaError::InvalidLiteral {
        datatype,
        lexical: lexical.to_string(),
    }
}

fn lexical_form(literal: &Literal) -> String {
    match literal {
        Literal::Lexical(s) => s.clone(),
        Literal::Integer(i) => i.to_string(),
        Literal::Boolean(b) => b.to_string(),
        Literal::Date(d) => Value::Date(*d).to_string(),
        Literal::DateTime(dt) => dt.format(&Rfc3339).unwrap_or_else(|_| format!("{dt:?}")),
    }
}

fn parse_date(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).ok()
}

/// RFC 3339 timestamps; a missing offset is read as UTC.
fn parse_datetime(s: &str) -> Option<OffsetDateTime> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt);
    }
    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

fn to_stored_datetime(dt: OffsetDateTime) -> Option<Value> {
    OffsetDateTime::from_unix_timestamp(dt.unix_timestamp())
        .ok()
        .map(Value::DateTime)
}
