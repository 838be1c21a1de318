//! Get-or-create lookups for the rows an article refers to.
//!
//! Names are unique in storage. A missing row is inserted with
//! `ON CONFLICT(name) DO NOTHING` and then read back, so a concurrent writer
//! that won the insert simply hands us its row.

use sqlx::SqliteConnection;
use tracing::info;

use crate::db::{self, Category, NewSource, Source};
use crate::error::Result;

pub async fn resolve_source(conn: &mut SqliteConnection, name: &str) -> Result<Source> {
    if let Some(source) = db::find_source_by_name(&mut *conn, name).await? {
        return Ok(source);
    }

    let minimal = NewSource {
        name: name.to_string(),
        ..Default::default()
    };
    if db::insert_source_if_absent(&mut *conn, &minimal).await? {
        info!("Created source '{}'", name);
    }

    let source = sqlx::query_as::<_, Source>("SELECT * FROM source WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(source)
}

pub async fn resolve_category(conn: &mut SqliteConnection, name: &str) -> Result<Category> {
    if let Some(category) = db::find_category_by_name(&mut *conn, name).await? {
        return Ok(category);
    }

    if db::insert_category_if_absent(&mut *conn, name).await? {
        info!("Created category '{}'", name);
    }

    let category = sqlx::query_as::<_, Category>("SELECT * FROM category WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(category)
}
