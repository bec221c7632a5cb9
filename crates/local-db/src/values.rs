//! Convert sea-query values to rusqlite bind params.

use anyhow::{Context, Result, bail};
use rusqlite::types::Value;
use sea_query::Value as QueryValue;

/// Query text plus bind values, as produced by the builders in this crate.
pub type Built = (String, sea_query::Values);

/// Convert `sea_query::Values` into owned rusqlite values, in bind order.
///
/// A value type SQLite has no binding for is an error; it is never bound as
/// `NULL`.
pub fn values_to_sql(values: &sea_query::Values) -> Result<Vec<Value>> {
    values.0.iter().map(value_to_sql).collect()
}

fn value_to_sql(value: &QueryValue) -> Result<Value> {
    let converted = match value {
        QueryValue::Bool(Some(b)) => Value::Integer(i64::from(*b)),
        QueryValue::TinyInt(Some(i)) => Value::Integer(i64::from(*i)),
        QueryValue::SmallInt(Some(i)) => Value::Integer(i64::from(*i)),
        QueryValue::Int(Some(i)) => Value::Integer(i64::from(*i)),
        QueryValue::BigInt(Some(i)) => Value::Integer(*i),
        QueryValue::TinyUnsigned(Some(u)) => Value::Integer(i64::from(*u)),
        QueryValue::SmallUnsigned(Some(u)) => Value::Integer(i64::from(*u)),
        QueryValue::Unsigned(Some(u)) => Value::Integer(i64::from(*u)),
        QueryValue::BigUnsigned(Some(u)) => Value::Integer(
            i64::try_from(*u).with_context(|| format!("bind value {u} does not fit in i64"))?,
        ),
        QueryValue::Float(Some(f)) => Value::Real(f64::from(*f)),
        QueryValue::Double(Some(f)) => Value::Real(*f),
        QueryValue::String(Some(s)) => Value::Text(s.as_str().to_owned()),
        QueryValue::Char(Some(c)) => Value::Text(c.to_string()),
        QueryValue::Bytes(Some(b)) => Value::Blob(b.to_vec()),
        QueryValue::Bool(None)
        | QueryValue::TinyInt(None)
        | QueryValue::SmallInt(None)
        | QueryValue::Int(None)
        | QueryValue::BigInt(None)
        | QueryValue::TinyUnsigned(None)
        | QueryValue::SmallUnsigned(None)
        | QueryValue::Unsigned(None)
        | QueryValue::BigUnsigned(None)
        | QueryValue::Float(None)
        | QueryValue::Double(None)
        | QueryValue::String(None)
        | QueryValue::Char(None)
        | QueryValue::Bytes(None) => Value::Null,
        #[allow(unreachable_patterns)]
        other => bail!("unsupported bind value: {other:?}"),
    };
    Ok(converted)
}
