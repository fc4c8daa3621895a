#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::AtomRow;
use crate::parser::AtomRecord;

pub struct AtomQueries;

impl AtomQueries {
    /// Insert one record. The table is keyed loosely by
    /// manufacturer/atom id, so repeated ingestion creates duplicates by
    /// design; the CLI confirms with the operator first.
    #[inline]
    pub async fn insert(pool: &SqlitePool, record: &AtomRecord) -> Result<()> {
        let row = AtomRow::from_record(record, Utc::now().naive_utc())?;

        sqlx::query(
            r#"
            INSERT INTO knowledge_atoms (
                id, atom_id, atom_type, title, summary, content,
                manufacturer, product_family, product_version, difficulty,
                prerequisites, related_atoms, source_document, source_pages,
                keywords, quality_score, embedding, created_date
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.atom_id)
        .bind(&row.atom_type)
        .bind(&row.title)
        .bind(&row.summary)
        .bind(&row.content)
        .bind(&row.manufacturer)
        .bind(&row.product_family)
        .bind(&row.product_version)
        .bind(&row.difficulty)
        .bind(&row.prerequisites)
        .bind(&row.related_atoms)
        .bind(&row.source_document)
        .bind(&row.source_pages)
        .bind(&row.keywords)
        .bind(row.quality_score)
        .bind(&row.embedding)
        .bind(row.created_date)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to insert atom {}", record.atom_id))?;

        debug!("Inserted atom {}", record.atom_id);
        Ok(())
    }

    /// Most recently ingested record for the given atom id, if any.
    #[inline]
    pub async fn get_by_atom_id(
        pool: &SqlitePool,
        manufacturer: &str,
        atom_id: &str,
    ) -> Result<Option<AtomRecord>> {
        let row = sqlx::query_as::<_, AtomRow>(
            r#"
            SELECT id, atom_id, atom_type, title, summary, content,
                   manufacturer, product_family, product_version, difficulty,
                   prerequisites, related_atoms, source_document, source_pages,
                   keywords, quality_score, embedding, created_date
            FROM knowledge_atoms
            WHERE manufacturer = ? AND atom_id = ?
            ORDER BY created_date DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(manufacturer)
        .bind(atom_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get atom by id")?;

        row.map(AtomRow::into_record).transpose()
    }

    /// Atom ids ingested for a manufacturer, in insertion order.
    #[inline]
    pub async fn list_atom_ids(pool: &SqlitePool, manufacturer: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT atom_id FROM knowledge_atoms WHERE manufacturer = ? ORDER BY created_date, rowid",
        )
        .bind(manufacturer)
        .fetch_all(pool)
        .await
        .context("Failed to list atom ids")?;

        Ok(ids)
    }

    /// Number of rows stored for a manufacturer. Used by the ingestion
    /// driver to verify a run and to detect pre-existing atoms.
    #[inline]
    pub async fn count_for_manufacturer(pool: &SqlitePool, manufacturer: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM knowledge_atoms WHERE manufacturer = ?",
        )
        .bind(manufacturer)
        .fetch_one(pool)
        .await
        .context("Failed to count atoms")?;

        Ok(count)
    }

    /// Remove every row for a manufacturer, returning the deleted count.
    #[inline]
    pub async fn delete_for_manufacturer(pool: &SqlitePool, manufacturer: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM knowledge_atoms WHERE manufacturer = ?")
            .bind(manufacturer)
            .execute(pool)
            .await
            .context("Failed to delete atoms")?;

        Ok(result.rows_affected())
    }
}
