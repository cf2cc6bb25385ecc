//! PostgreSQL row scanning
//!
//! Results arrive in the binary wire format, so every cell is decoded through
//! a typed sqlx decoder chosen by the column's reported type. Types without a
//! decoder here are passed on as raw bytes, never as text.

use crate::database::traits::GatewayError;
use crate::value::Value;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgRange, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind};
use sqlx::types::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo, ValueRef};
use std::fmt::Display;
use tracing::debug;

pub(crate) fn column_names(row: &PgRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

/// Scan one row into a vector holding a value per column
pub(crate) fn scan_row(row: &PgRow) -> Result<Vec<Value>, GatewayError> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

/// Convert a single cell, directed by the column's reported type
pub(crate) fn decode_value(row: &PgRow, index: usize) -> Result<Value, GatewayError> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let type_info = row.column(index).type_info();
    let value = match type_info.name() {
        "BOOL" => Value::Boolean(row.try_get(index)?),
        "INT2" => Value::Integer(row.try_get::<i16, _>(index)?.into()),
        "INT4" => Value::Integer(row.try_get::<i32, _>(index)?.into()),
        "INT8" => Value::Integer(row.try_get(index)?),
        "OID" => Value::Integer(row.try_get::<Oid, _>(index)?.0.into()),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(index)?.into()),
        "FLOAT8" => Value::Float(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get(index)?),
        "BYTEA" => Value::Binary(row.try_get(index)?),
        // String rendering preserves precision
        "NUMERIC" => Value::Other(row.try_get::<Decimal, _>(index)?.to_string()),
        "TIMESTAMP" => Value::Other(row.try_get::<NaiveDateTime, _>(index)?.to_string()),
        "TIMESTAMPTZ" => Value::Other(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "DATE" => Value::Other(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::Other(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "UUID" => Value::Other(row.try_get::<Uuid, _>(index)?.to_string()),
        "JSON" | "JSONB" => Value::Other(row.try_get::<serde_json::Value, _>(index)?.to_string()),
        _ => decode_extended(row, index, type_info)?,
    };

    Ok(value)
}

/// Less common types, rendered the way PostgreSQL prints them
///
/// A cell whose decoder rejects it (e.g., a multi-dimensional array) falls
/// back to its raw bytes.
fn decode_extended(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value, GatewayError> {
    let decoded = match type_info.name() {
        "INTERVAL" => row
            .try_get::<PgInterval, _>(index)
            .map(|interval| Value::Other(format_interval(&interval))),
        // Assumes the common two-digit lc_monetary scale
        "MONEY" => row
            .try_get::<PgMoney, _>(index)
            .map(|money| Value::Other(money.to_decimal(2).to_string())),
        "TIMETZ" => row
            .try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(index)
            .map(|time| Value::Other(format!("{}{}", time.time, time.offset))),
        "INET" => row
            .try_get::<IpNetwork, _>(index)
            .map(|network| Value::Other(format_inet(&network))),
        "CIDR" => row
            .try_get::<IpNetwork, _>(index)
            .map(|network| Value::Other(network.to_string())),
        "INT4RANGE" => range::<i32>(row, index),
        "INT8RANGE" => range::<i64>(row, index),
        "NUMRANGE" => range::<Decimal>(row, index),
        "DATERANGE" => range::<NaiveDate>(row, index),
        "TSRANGE" => range::<NaiveDateTime>(row, index),
        "TSTZRANGE" => range::<DateTime<Utc>>(row, index),
        "BOOL[]" => array(row, index, |value: bool| String::from(if value { "t" } else { "f" })),
        "INT2[]" => array(row, index, |value: i16| value.to_string()),
        "INT4[]" => array(row, index, |value: i32| value.to_string()),
        "INT8[]" => array(row, index, |value: i64| value.to_string()),
        "FLOAT4[]" => array(row, index, |value: f32| value.to_string()),
        "FLOAT8[]" => array(row, index, |value: f64| value.to_string()),
        "NUMERIC[]" => array(row, index, |value: Decimal| value.to_string()),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => array(row, index, |value: String| value),
        "UUID[]" => array(row, index, |value: Uuid| value.to_string()),
        "DATE[]" => array(row, index, |value: NaiveDate| value.to_string()),
        "TIMESTAMP[]" => array(row, index, |value: NaiveDateTime| value.to_string()),
        "TIMESTAMPTZ[]" => array(row, index, |value: DateTime<Utc>| value.to_rfc3339()),
        "JSON[]" | "JSONB[]" => array(row, index, |value: serde_json::Value| value.to_string()),
        _ if is_textual(type_info) => text_payload(row, index),
        _ => return raw_bytes(row, index),
    };

    match decoded {
        Ok(value) => Ok(value),
        Err(error) => {
            debug!(%error, column_type = type_info.name(), "passing cell through as raw bytes");
            raw_bytes(row, index)
        }
    }
}

/// Types whose binary wire form is their text form
fn is_textual(type_info: &PgTypeInfo) -> bool {
    matches!(type_info.kind(), PgTypeKind::Enum(_))
        || ["citext", "xml"]
            .iter()
            .any(|name| type_info.name().eq_ignore_ascii_case(name))
}

fn text_payload(row: &PgRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    raw.as_str()
        .map(|text| Value::Other(text.to_string()))
        .map_err(sqlx::Error::Decode)
}

fn raw_bytes(row: &PgRow, index: usize) -> Result<Value, GatewayError> {
    let raw = row.try_get_raw(index)?;
    raw.as_bytes()
        .map(|bytes| Value::Binary(bytes.to_vec()))
        .map_err(|error| GatewayError::Engine(error.to_string()))
}

fn range<T>(row: &PgRow, index: usize) -> Result<Value, sqlx::Error>
where
    T: Display,
    PgRange<T>: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<PgRange<T>, _>(index)
        .map(|range| Value::Other(range.to_string()))
}

fn array<E, F>(row: &PgRow, index: usize, render: F) -> Result<Value, sqlx::Error>
where
    Vec<Option<E>>: for<'r> Decode<'r, Postgres> + Type<Postgres>,
    F: Fn(E) -> String,
{
    let elements: Vec<Option<E>> = row.try_get(index)?;
    let rendered = elements
        .into_iter()
        .map(|element| element.map(&render))
        .collect();
    Ok(Value::Other(array_literal(rendered)))
}

/// Render elements as a PostgreSQL array literal, e.g. `{1,NULL,"a b"}`
fn array_literal(elements: Vec<Option<String>>) -> String {
    let rendered: Vec<String> = elements
        .iter()
        .map(|element| match element {
            Some(text) => quote_array_element(text),
            None => "NULL".to_string(),
        })
        .collect();
    format!("{{{}}}", rendered.join(","))
}

fn quote_array_element(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());

    if !needs_quotes {
        return text.to_string();
    }

    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Host addresses print without a prefix length, as PostgreSQL prints inet
fn format_inet(network: &IpNetwork) -> String {
    let host_prefix = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };

    if network.prefix() == host_prefix {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}

/// PostgreSQL's default interval style, e.g. `1 year 2 mons 3 days 04:05:06.5`
fn format_interval(interval: &PgInterval) -> String {
    fn unit(parts: &mut Vec<String>, amount: i32, singular: &str, plural: &str) {
        if amount != 0 {
            let name = if amount.abs() == 1 { singular } else { plural };
            parts.push(format!("{} {}", amount, name));
        }
    }

    let mut parts = Vec::new();
    unit(&mut parts, interval.months / 12, "year", "years");
    unit(&mut parts, interval.months % 12, "mon", "mons");
    unit(&mut parts, interval.days, "day", "days");

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let hours = total / 3_600_000_000;
        let minutes = (total / 60_000_000) % 60;
        let seconds = (total / 1_000_000) % 60;
        let fraction = total % 1_000_000;

        let mut clock = format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds);
        if fraction != 0 {
            clock.push_str(format!(".{:06}", fraction).trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}
