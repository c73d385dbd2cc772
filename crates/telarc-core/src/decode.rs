//! Row-decoding helpers for entity row mappers.
//!
//! These sit outside the engine core: the cursor and flattener never call
//! them, but every mapper needs the same null-protection and the same
//! strict wide-unsigned handling, so they live here once.

use crate::{
    error::{ErrorOrigin, FetchError},
    exec::RowStream,
    value::SqlValue,
};

/// Decode a logically-unsigned 64-bit value transported as decimal text.
/// Rejects anything that is not an exact integer in the u64 domain:
/// silent truncation of a checksum or packet id is worse than a failed
/// fetch.
pub fn decode_unsigned_wide(value: &SqlValue) -> Result<u64, FetchError> {
    let text = match value {
        SqlValue::Decimal(text) => text.as_str(),
        SqlValue::Ulong(v) => return Ok(*v),
        SqlValue::Long(v) if *v >= 0 => return Ok(*v as u64),
        other => {
            return Err(decode_error(format!(
                "wide-unsigned value has unsupported transport: {other}"
            )));
        }
    };

    let trimmed = text.trim();
    let (integral, fraction) = match trimmed.split_once('.') {
        Some((integral, fraction)) => (integral, Some(fraction)),
        None => (trimmed, None),
    };

    // "123.000" is exact; "123.5" is not.
    if let Some(fraction) = fraction
        && fraction.chars().any(|c| c != '0')
    {
        return Err(decode_error(format!(
            "wide-unsigned value is not an exact integer: '{trimmed}'"
        )));
    }

    let magnitude: u128 = integral
        .parse()
        .map_err(|_| decode_error(format!("wide-unsigned value is not numeric: '{trimmed}'")))?;

    u64::try_from(magnitude).map_err(|_| {
        decode_error(format!(
            "wide-unsigned value exceeds the 64-bit domain: '{trimmed}'"
        ))
    })
}

/// Non-null integer column.
pub fn require_long(row: &dyn RowStream, column: &str) -> Result<i64, FetchError> {
    let value = get(row, column)?;

    value
        .as_long()
        .ok_or_else(|| decode_error(format!("column '{column}' is not an integer: {value}")))
}

/// Non-null unsigned integer column.
pub fn require_ulong(row: &dyn RowStream, column: &str) -> Result<u64, FetchError> {
    let value = get(row, column)?;

    value
        .as_ulong()
        .ok_or_else(|| decode_error(format!("column '{column}' is not unsigned: {value}")))
}

/// Non-null text column.
pub fn require_text(row: &dyn RowStream, column: &str) -> Result<String, FetchError> {
    let value = get(row, column)?;

    value
        .as_text()
        .map(ToString::to_string)
        .ok_or_else(|| decode_error(format!("column '{column}' is not text: {value}")))
}

/// Nullable text column.
pub fn opt_text(row: &dyn RowStream, column: &str) -> Result<Option<String>, FetchError> {
    let value = get(row, column)?;

    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Text(text) => Ok(Some(text.clone())),
        other => Err(decode_error(format!(
            "column '{column}' is not text: {other}"
        ))),
    }
}

/// Nullable integer column; negative values also read as absent, matching
/// the archive's use of negative sentinels for not-applicable ids.
pub fn opt_nonnegative_long(row: &dyn RowStream, column: &str) -> Result<Option<i64>, FetchError> {
    let value = get(row, column)?;

    match value {
        SqlValue::Null => Ok(None),
        other => match other.as_long() {
            Some(v) if v >= 0 => Ok(Some(v)),
            Some(_) => Ok(None),
            None => Err(decode_error(format!(
                "column '{column}' is not an integer: {other}"
            ))),
        },
    }
}

fn get<'a>(row: &'a dyn RowStream, column: &str) -> Result<&'a SqlValue, FetchError> {
    row.get(column)
        .map_err(|err| decode_error(format!("failed to read column '{column}': {err}")))
}

fn decode_error(message: String) -> FetchError {
    FetchError::row_decoding(ErrorOrigin::Cursor, message)
}
