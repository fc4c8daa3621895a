use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::queries::AtomQueries;
use crate::parser::AtomRecord;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.create_schema().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the atoms table and its lookup index if they do not exist.
    #[inline]
    pub async fn create_schema(&self) -> Result<()> {
        info!("Ensuring database schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_atoms (
                id TEXT PRIMARY KEY,
                atom_id TEXT NOT NULL,
                atom_type TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                content TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                product_family TEXT NOT NULL,
                product_version TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                prerequisites TEXT NOT NULL DEFAULT '[]',
                related_atoms TEXT NOT NULL DEFAULT '[]',
                source_document TEXT NOT NULL,
                source_pages TEXT NOT NULL DEFAULT '[]',
                keywords TEXT NOT NULL DEFAULT '[]',
                quality_score REAL NOT NULL,
                embedding BLOB NOT NULL,
                created_date DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create knowledge_atoms table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_atoms_manufacturer \
             ON knowledge_atoms(manufacturer, atom_id)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create manufacturer index")?;

        debug!("Database schema is up to date");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("knowledge.db")).await
    }

    // Atom operations
    #[inline]
    pub async fn insert_atom(&self, record: &AtomRecord) -> Result<()> {
        AtomQueries::insert(&self.pool, record).await
    }

    #[inline]
    pub async fn get_atom(&self, manufacturer: &str, atom_id: &str) -> Result<Option<AtomRecord>> {
        AtomQueries::get_by_atom_id(&self.pool, manufacturer, atom_id).await
    }

    #[inline]
    pub async fn list_atom_ids(&self, manufacturer: &str) -> Result<Vec<String>> {
        AtomQueries::list_atom_ids(&self.pool, manufacturer).await
    }

    #[inline]
    pub async fn count_for_manufacturer(&self, manufacturer: &str) -> Result<i64> {
        AtomQueries::count_for_manufacturer(&self.pool, manufacturer).await
    }
}
