//! Field descriptors for the raw-to-columnar projection
//!
//! Every output column is described by its canonical name, the position of
//! its source value in the raw semicolon-delimited row, and the coercion that
//! turns the raw text into a typed value.

use arrow_schema::{DataType, Field};
use std::fmt;

/// How a raw text value is turned into a typed column value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Free text, empty becomes null
    Text,
    /// Numeric identifier left-padded with zeros to a fixed width
    ZeroPad {
        /// Target width
        width: usize,
    },
    /// Postal code: separators and decimal suffix removed, `"0"` when absent, then padded
    PostalCode {
        /// Target width
        width: usize,
    },
    /// `YYYYMMDD` text parsed into a calendar date, null when invalid
    CompactDate,
    /// Locale formatted decimal (`1.234,56`) parsed into a float
    Capital,
    /// True iff the trimmed raw value equals the sentinel
    Flag {
        /// Value that marks `true`
        sentinel: &'static str,
    },
}

impl Coercion {
    /// Arrow type produced by this coercion
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Text | Self::ZeroPad { .. } | Self::PostalCode { .. } => DataType::Utf8,
            Self::CompactDate => DataType::Date32,
            Self::Capital => DataType::Float64,
            Self::Flag { .. } => DataType::Boolean,
        }
    }

    /// Whether values produced by this coercion can be null
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        !matches!(self, Self::PostalCode { .. } | Self::Flag { .. })
    }
}

impl fmt::Display for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::ZeroPad { width } => write!(f, "zero-padded({width})"),
            Self::PostalCode { width } => write!(f, "postal-code({width})"),
            Self::CompactDate => write!(f, "date(YYYYMMDD)"),
            Self::Capital => write!(f, "capital"),
            Self::Flag { sentinel } => write!(f, "flag(=={sentinel})"),
        }
    }
}

/// One projected column of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Canonical column name
    pub name: &'static str,
    /// 0-based position in the raw row
    pub source_index: usize,
    /// Raw-to-typed conversion
    pub coercion: Coercion,
}

impl FieldSpec {
    /// Create a new field descriptor
    #[must_use]
    pub const fn new(name: &'static str, source_index: usize, coercion: Coercion) -> Self {
        Self {
            name,
            source_index,
            coercion,
        }
    }

    /// Convert to an Arrow Field
    #[must_use]
    pub fn to_arrow_field(&self) -> Field {
        Field::new(
            self.name,
            self.coercion.data_type(),
            self.coercion.is_nullable(),
        )
    }
}
