
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::FromRow;
use uuid::Uuid;

use crate::parser::AtomRecord;

/// Row shape of the `knowledge_atoms` table.
///
/// List-valued fields are stored as JSON text; the embedding is a
/// little-endian `f32` BLOB.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AtomRow {
    pub id: String,
    pub atom_id: String,
    pub atom_type: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub manufacturer: String,
    pub product_family: String,
    pub product_version: String,
    pub difficulty: String,
    pub prerequisites: String,
    pub related_atoms: String,
    pub source_document: String,
    pub source_pages: String,
    pub keywords: String,
    pub quality_score: f64,
    pub embedding: Vec<u8>,
    pub created_date: NaiveDateTime,
}

impl AtomRow {
    #[inline]
    pub fn from_record(record: &AtomRecord, created_date: NaiveDateTime) -> Result<Self> {
        Ok(Self {
            id: record.id.to_string(),
            atom_id: record.atom_id.clone(),
            atom_type: record.atom_type.clone(),
            title: record.title.clone(),
            summary: record.summary.clone(),
            content: record.content.clone(),
            manufacturer: record.manufacturer.clone(),
            product_family: record.product_family.clone(),
            product_version: record.product_version.clone(),
            difficulty: record.difficulty.clone(),
            prerequisites: serde_json::to_string(&record.prerequisites)
                .context("Failed to serialize prerequisites")?,
            related_atoms: serde_json::to_string(&record.related_atoms)
                .context("Failed to serialize related atoms")?,
            source_document: record.source_document.clone(),
            source_pages: serde_json::to_string(&record.source_pages)
                .context("Failed to serialize source pages")?,
            keywords: serde_json::to_string(&record.keywords)
                .context("Failed to serialize keywords")?,
            quality_score: record.quality_score,
            embedding: vec_to_blob(&record.embedding),
            created_date,
        })
    }

    #[inline]
    pub fn into_record(self) -> Result<AtomRecord> {
        Ok(AtomRecord {
            id: Uuid::parse_str(&self.id)
                .with_context(|| format!("Invalid record id: {}", self.id))?,
            atom_id: self.atom_id,
            atom_type: self.atom_type,
            title: self.title,
            summary: self.summary,
            content: self.content,
            manufacturer: self.manufacturer,
            product_family: self.product_family,
            product_version: self.product_version,
            difficulty: self.difficulty,
            prerequisites: serde_json::from_str(&self.prerequisites)
                .context("Failed to parse prerequisites")?,
            related_atoms: serde_json::from_str(&self.related_atoms)
                .context("Failed to parse related atoms")?,
            source_document: self.source_document,
            source_pages: serde_json::from_str(&self.source_pages)
                .context("Failed to parse source pages")?,
            keywords: serde_json::from_str(&self.keywords).context("Failed to parse keywords")?,
            quality_score: self.quality_score,
            embedding: blob_to_vec(&self.embedding)?,
        })
    }
}

/// Encode an embedding as little-endian bytes for BLOB storage.
#[inline]
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a BLOB column back into an embedding vector.
#[inline]
pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(anyhow::anyhow!(
            "Embedding blob length {} is not a multiple of 4",
            blob.len()
        ));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
