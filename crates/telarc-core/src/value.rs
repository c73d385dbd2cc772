use derive_more::From;
use std::fmt;

///
/// SqlValue
///
/// Scalar value crossing the executor seam in both directions: bind
/// parameters on the way in, column values on the way out. `Null` subsumes
/// the separate was-null accessor a driver-level row would expose.
///
/// Logically-unsigned 64-bit columns (checksums, packet ids) travel as
/// `Decimal` text so no driver can silently truncate them; see
/// [`crate::decode::decode_unsigned_wide`].
///

#[derive(Clone, Debug, From, PartialEq)]
pub enum SqlValue {
    #[from(ignore)]
    Null,
    Long(i64),
    Ulong(u64),
    Double(f64),
    Text(String),
    #[from(ignore)]
    Decimal(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Signed integer view, `None` for null or non-integer values.
    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned integer view; widens a non-negative `Long`.
    #[must_use]
    pub const fn as_ulong(&self) -> Option<u64> {
        match self {
            Self::Ulong(v) => Some(*v),
            Self::Long(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Ulong(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) | Self::Decimal(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
