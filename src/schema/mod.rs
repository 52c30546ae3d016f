//! Entity schemas for the three registry datasets.
//!
//! Each dataset is described by an explicit [`EntitySchema`]: an ordered list of
//! [`FieldSpec`]s naming the output column, the raw column it is read from and
//! the coercion applied to it.

pub mod coerce;
pub mod field;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow_schema::{Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use field::{Coercion, FieldSpec};

use crate::error::{PipelineError, Result};

/// Name of the root identifier column shared by all entities
pub const ROOT_ID: &str = "root_id";

/// Width of the zero-padded root identifier
pub const ROOT_ID_WIDTH: usize = 8;

/// The three entity types of the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Company level record, one per root identifier
    Company,
    /// Establishment under a company
    Branch,
    /// Partnership relation to a company
    Partner,
}

impl EntityKind {
    /// All entities in the order they must be transformed and loaded
    pub const TRANSFORM_ORDER: [Self; 3] = [Self::Partner, Self::Company, Self::Branch];

    /// Load order respecting foreign keys towards `companies`
    pub const LOAD_ORDER: [Self; 3] = [Self::Company, Self::Partner, Self::Branch];

    /// Table name in the transactional and analytic stores
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Company => "companies",
            Self::Branch => "business",
            Self::Partner => "partners",
        }
    }

    /// Archive name prefix on the remote server
    #[must_use]
    pub const fn source_prefix(&self) -> &'static str {
        match self {
            Self::Company => "Empresas",
            Self::Branch => "Estabelecimentos",
            Self::Partner => "Socios",
        }
    }

    /// Columns forming the natural key of a row
    #[must_use]
    pub const fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Company => &[ROOT_ID],
            Self::Branch => &[ROOT_ID, "branch_order", "check_digit"],
            Self::Partner => &[ROOT_ID, "partner_name", "partnership_start"],
        }
    }

    /// Text column covered by the inverted name index
    #[must_use]
    pub const fn name_column(&self) -> &'static str {
        match self {
            Self::Company => "display_name",
            Self::Branch => "branch_name",
            Self::Partner => "partner_name",
        }
    }

    /// Whether rows of this entity are filtered against the partner key set
    #[must_use]
    pub const fn is_partner_filtered(&self) -> bool {
        !matches!(self, Self::Partner)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "companies" | "company" | "empresas" => Ok(Self::Company),
            "business" | "branch" | "branches" | "estabelecimentos" => Ok(Self::Branch),
            "partners" | "partner" | "socios" => Ok(Self::Partner),
            other => Err(PipelineError::Config(format!("unknown entity '{other}'"))),
        }
    }
}

/// Column projection and coercion plan for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Entity described
    pub kind: EntityKind,
    /// Output columns in order
    pub fields: Vec<FieldSpec>,
    /// Exact raw column count; rows with another count are skipped
    pub expected_columns: Option<usize>,
}

impl EntitySchema {
    /// Registry layout for `kind`
    #[must_use]
    pub fn for_entity(kind: EntityKind) -> Self {
        let id = Coercion::ZeroPad {
            width: ROOT_ID_WIDTH,
        };
        let (fields, expected_columns) = match kind {
            EntityKind::Company => (
                vec![
                    FieldSpec::new(ROOT_ID, 0, id),
                    FieldSpec::new("display_name", 1, Coercion::Text),
                    FieldSpec::new("capital_value", 4, Coercion::Capital),
                ],
                7,
            ),
            EntityKind::Branch => (
                vec![
                    FieldSpec::new(ROOT_ID, 0, id),
                    FieldSpec::new("branch_order", 1, Coercion::ZeroPad { width: 4 }),
                    FieldSpec::new("check_digit", 2, Coercion::ZeroPad { width: 2 }),
                    FieldSpec::new("is_headquarters", 3, Coercion::Flag { sentinel: "1" }),
                    FieldSpec::new("branch_name", 4, Coercion::Text),
                    FieldSpec::new("closing_date", 6, Coercion::CompactDate),
                    FieldSpec::new("opening_date", 10, Coercion::CompactDate),
                    FieldSpec::new("postal_code", 18, Coercion::PostalCode { width: 8 }),
                ],
                30,
            ),
            EntityKind::Partner => (
                vec![
                    FieldSpec::new(ROOT_ID, 0, id),
                    FieldSpec::new("partner_name", 2, Coercion::Text),
                    FieldSpec::new("partnership_start", 5, Coercion::CompactDate),
                ],
                11,
            ),
        };

        Self {
            kind,
            fields,
            expected_columns: Some(expected_columns),
        }
    }

    /// Replace source positions by name, e.g. after a layout change upstream
    pub fn with_indices(mut self, indices: &BTreeMap<String, usize>) -> Result<Self> {
        for (name, index) in indices {
            let field = self
                .fields
                .iter_mut()
                .find(|f| f.name == name.as_str())
                .ok_or_else(|| {
                    PipelineError::Config(format!("{} has no column named '{name}'", self.kind))
                })?;
            field.source_index = *index;
        }
        Ok(self)
    }

    /// Override the raw column count check (`None` disables it)
    #[must_use]
    pub fn with_expected_columns(mut self, expected: Option<usize>) -> Self {
        self.expected_columns = expected;
        self
    }

    /// Source positions in output order
    #[must_use]
    pub fn source_indices(&self) -> SmallVec<[usize; 8]> {
        self.fields.iter().map(|f| f.source_index).collect()
    }

    /// Smallest raw row width that holds every projected column
    #[must_use]
    pub fn min_columns(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.source_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Whether a raw row of `width` columns can be projected
    #[must_use]
    pub fn accepts_width(&self, width: usize) -> bool {
        self.expected_columns
            .map_or_else(|| width >= self.min_columns(), |expected| width == expected)
    }

    /// Arrow schema of the normalized output
    #[must_use]
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.fields
                .iter()
                .map(FieldSpec::to_arrow_field)
                .collect::<Vec<_>>(),
        ))
    }

    /// Field descriptor by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
