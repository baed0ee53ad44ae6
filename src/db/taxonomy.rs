//! Taxonomy node (index element) queries
//!
//! The `index_elements` table is the authoritative copy of the taxonomy.
//! The search index carries the same nodes as parent documents, but only
//! for ranking; integrity checks on submitted codes resolve against SQL.

use sqlx::{Row, SqliteConnection};

use crate::error::Result;
use crate::models::IndexElement;
use crate::wizard::WizardCode;

/// A taxonomy node together with its row id
#[derive(Debug, Clone)]
pub struct TaxonomyRow {
    pub id: i64,
    pub element: IndexElement,
}

fn row_to_element(row: &sqlx::sqlite::SqliteRow) -> Result<TaxonomyRow> {
    let wizard: String = row.get("wizard");
    Ok(TaxonomyRow {
        id: row.get("id"),
        element: IndexElement {
            wizard: WizardCode::parse(&wizard)?,
            level1_id: row.get("level1_id"),
            level1: row.get("level1"),
            level2: row.get("level2"),
            level3: row.get("level3"),
            level4: row.get("level4"),
            level5: row.get("level5"),
        },
    })
}

/// Look up a node by wizard code.
pub async fn get_by_wizard(
    conn: &mut SqliteConnection,
    wizard: &WizardCode,
) -> Result<Option<TaxonomyRow>> {
    let row = sqlx::query(
        r#"
        SELECT id, wizard, level1_id, level1, level2, level3, level4, level5
        FROM index_elements
        WHERE wizard = ?
        "#,
    )
    .bind(wizard.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_element).transpose()
}

/// Insert a taxonomy node. Used by taxonomy loaders and test fixtures.
pub async fn insert(conn: &mut SqliteConnection, element: &IndexElement) -> Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO index_elements (wizard, level1_id, level1, level2, level3, level4, level5)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(element.wizard.as_str())
    .bind(&element.level1_id)
    .bind(&element.level1)
    .bind(&element.level2)
    .bind(&element.level3)
    .bind(&element.level4)
    .bind(&element.level5)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("id"))
}
