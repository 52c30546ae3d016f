//! Table definitions of the transactional store
//!
//! DDL is derived from the entity schemas so column names and types cannot
//! drift from the columnar files being loaded.

use itertools::Itertools;
use rusqlite::Connection;

use crate::error::Result;
use crate::schema::{Coercion, EntityKind, EntitySchema, ROOT_ID};

/// SQLite column type for a coercion
#[must_use]
pub const fn sql_type(coercion: Coercion) -> &'static str {
    match coercion {
        Coercion::Capital => "REAL",
        Coercion::Flag { .. } => "INTEGER",
        Coercion::Text
        | Coercion::ZeroPad { .. }
        | Coercion::PostalCode { .. }
        | Coercion::CompactDate => "TEXT",
    }
}

/// Name of the inverted index table of an entity
#[must_use]
pub fn fts_table(kind: EntityKind) -> String {
    format!("{}_fts", kind.table_name())
}

/// `CREATE TABLE` statement for an entity
#[must_use]
pub fn create_table_sql(schema: &EntitySchema) -> String {
    let kind = schema.kind;
    let keys = kind.key_columns();
    // a partnership may lack its start date
    let required: &[&str] = match kind {
        EntityKind::Partner => &[ROOT_ID, "partner_name"],
        EntityKind::Company | EntityKind::Branch => keys,
    };
    let mut lines: Vec<String> = schema
        .fields
        .iter()
        .map(|field| {
            let not_null = !field.coercion.is_nullable() || required.contains(&field.name);
            format!(
                "    {} {}{}",
                field.name,
                sql_type(field.coercion),
                if not_null { " NOT NULL" } else { "" }
            )
        })
        .collect();

    match kind {
        EntityKind::Company | EntityKind::Branch => {
            lines.push(format!("    PRIMARY KEY ({})", keys.iter().join(", ")));
        }
        // partners have no declared key; duplicates are coalesced while loading
        EntityKind::Partner => {}
    }
    if kind != EntityKind::Company {
        lines.push(format!(
            "    FOREIGN KEY ({ROOT_ID}) REFERENCES {}({ROOT_ID})",
            EntityKind::Company.table_name()
        ));
    }

    format!(
        "CREATE TABLE {} (\n{}\n)",
        kind.table_name(),
        lines.join(",\n")
    )
}

/// Drop every table and inverted index, children before parents
pub fn drop_all(conn: &Connection) -> Result<()> {
    for kind in EntityKind::LOAD_ORDER.iter().rev() {
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {};\nDROP TABLE IF EXISTS {};",
            fts_table(*kind),
            kind.table_name()
        ))?;
    }
    Ok(())
}

/// Drop and recreate the three tables
pub fn create_schema(conn: &Connection, schemas: &[EntitySchema]) -> Result<()> {
    drop_all(conn)?;
    for kind in EntityKind::LOAD_ORDER {
        if let Some(schema) = schemas.iter().find(|s| s.kind == kind) {
            conn.execute_batch(&create_table_sql(schema))?;
        }
    }
    Ok(())
}
