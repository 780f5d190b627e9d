//! Column encoding shared by the SQLite repositories
//!
//! Ids are stored as hyphenated UUID text, enums by their stable code and
//! timestamps as fixed-width RFC 3339 UTC so that text ordering matches time
//! ordering.

use std::num::TryFromIntError;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use servicedesk_domain::ServiceDeskError;
use uuid::Uuid;

pub(crate) fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn opt_ts(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

pub(crate) fn opt_id(value: Option<Uuid>) -> Option<String> {
    value.map(|id| id.to_string())
}

pub(crate) fn opt_code<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Versions and positions are INTEGER columns, so they must fit an i64.
pub(crate) fn int<T>(value: T) -> rusqlite::Result<i64>
where
    i64: TryFrom<T, Error = TryFromIntError>,
{
    i64::try_from(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn unsigned(value: i64, idx: usize) -> rusqlite::Result<u64> {
    u64::try_from(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| Uuid::parse_str(&value).map_err(|e| conversion_failure(idx, e))).transpose()
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| parse_ts(&value).map_err(|e| conversion_failure(idx, e))).transpose()
}

pub(crate) fn code_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ServiceDeskError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn opt_code_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = ServiceDeskError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| value.parse().map_err(|e| conversion_failure(idx, e))).transpose()
}

/// JSON-encoded column.
pub(crate) fn json_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_failure(idx, e))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|value| value.with_timezone(&Utc))
}
