//! Atom document parser.
//!
//! Splits a knowledge document into sections at horizontal-rule lines,
//! extracts the labeled subsections of each atom through a small fixed
//! grammar, and assembles one embedded record per qualifying section.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::IngestProfile;
use crate::embeddings::{Embedder, zero_vector};

const ATOM_MARKER: &str = "## Atom:";

/// A blank line immediately followed by a bold marker ends a block field.
const BLOCK_TERMINATOR: &str = "\n\n**";

const SUMMARY_MARKER: &str = "**Summary:**";
const KEY_CONCEPTS_MARKER: &str = "**Key concepts:**";
const RELATED_MARKER: &str = "**Related atoms:**";
const SOURCE_MARKER: &str = "**Source:**";

static ATOM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"## Atom:\s+(\w+)").expect("atom id pattern is valid"));

/// One knowledge atom, ready for insertion into the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub id: Uuid,
    pub atom_id: String,
    pub atom_type: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub manufacturer: String,
    pub product_family: String,
    pub product_version: String,
    pub difficulty: String,
    pub prerequisites: Vec<String>,
    pub related_atoms: Vec<String>,
    pub source_document: String,
    pub source_pages: Vec<i64>,
    pub keywords: Vec<String>,
    pub quality_score: f64,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAtomMarker,
    MissingAtomId,
}

impl std::fmt::Display for SkipReason {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SkipReason::MissingAtomMarker => write!(f, "no atom marker"),
            SkipReason::MissingAtomId => write!(f, "no atom identifier"),
        }
    }
}

/// A section that produced no record, with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSection {
    pub section_index: usize,
    pub reason: SkipReason,
}

/// Outcome of one parse pass: records in document order, plus the
/// skipped sections and failed embeddings for callers that want to
/// report or assert on them.
#[derive(Debug, Default)]
pub struct ParseReport {
    pub records: Vec<AtomRecord>,
    pub skipped: Vec<SkippedSection>,
    pub embedding_failures: Vec<String>,
}

/// Parses an atom document into [`AtomRecord`]s.
///
/// The embedding collaborator is injected so callers control credentials
/// and tests can substitute a stub.
pub struct AtomParser<'a> {
    embedder: &'a dyn Embedder,
    profile: IngestProfile,
}

impl<'a> AtomParser<'a> {
    #[inline]
    pub fn new(embedder: &'a dyn Embedder, profile: IngestProfile) -> Self {
        Self { embedder, profile }
    }

    /// Read and parse a document from disk.
    ///
    /// An unreadable file is fatal; malformed sections inside a readable
    /// document are not.
    #[inline]
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParseReport> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read atoms document: {}", path.display()))?;
        Ok(self.parse_document(&text))
    }

    /// Parse the full text of an atom document.
    #[inline]
    pub fn parse_document(&self, document: &str) -> ParseReport {
        let mut report = ParseReport::default();

        for (index, section) in split_sections(document).iter().enumerate() {
            if section.trim().is_empty() {
                continue;
            }

            if !section.contains(ATOM_MARKER) {
                debug!("Section {} has no atom marker, skipping", index);
                report.skipped.push(SkippedSection {
                    section_index: index,
                    reason: SkipReason::MissingAtomMarker,
                });
                continue;
            }

            let Some(atom_id) = extract_atom_id(section) else {
                warn!("Skipping section {} without an atom identifier", index);
                report.skipped.push(SkippedSection {
                    section_index: index,
                    reason: SkipReason::MissingAtomId,
                });
                continue;
            };

            info!("Processing: {}", atom_id);
            let record = self.build_record(&atom_id, section, &mut report);
            report.records.push(record);
        }

        info!("Parsed {} atoms successfully", report.records.len());
        report
    }

    fn build_record(&self, atom_id: &str, section: &str, report: &mut ParseReport) -> AtomRecord {
        let fields = extract_fields(section);

        if let Some(source) = &fields.source {
            debug!("Atom {} cites source: {}", atom_id, source);
        }

        let summary = fields.summary.clone().unwrap_or_default();
        let keywords = fields
            .key_concepts
            .as_deref()
            .map(derive_keywords)
            .unwrap_or_default();
        let related_atoms = fields
            .related_atoms
            .as_deref()
            .map(extract_backticked)
            .unwrap_or_default();
        let embedding = self.embed_identity(atom_id, &summary, report);

        AtomRecord {
            id: Uuid::new_v4(),
            atom_id: atom_id.to_string(),
            atom_type: self.profile.atom_type.clone(),
            title: title_case(atom_id),
            summary,
            content: assemble_content(&fields),
            manufacturer: self.profile.manufacturer.clone(),
            product_family: self.profile.product_family.clone(),
            product_version: self.profile.product_version.clone(),
            difficulty: self.profile.difficulty.clone(),
            prerequisites: Vec::new(),
            related_atoms,
            source_document: self.profile.source_document.clone(),
            source_pages: vec![1],
            keywords,
            quality_score: self.profile.quality_score,
            embedding,
        }
    }

    /// Embed `"{atom_id}: {summary}"`, substituting a zero vector on any
    /// failure so one bad request never aborts the run.
    fn embed_identity(&self, atom_id: &str, summary: &str, report: &mut ParseReport) -> Vec<f32> {
        let input = format!("{}: {}", atom_id, summary);
        debug!("Generating embedding for {}", atom_id);

        match self.embedder.embed(&input) {
            Ok(vector) if vector.len() == self.embedder.dimension() => vector,
            Ok(vector) => {
                warn!(
                    "Embedding for {} has {} dimensions, expected {}",
                    atom_id,
                    vector.len(),
                    self.embedder.dimension()
                );
                report.embedding_failures.push(atom_id.to_string());
                zero_vector(self.embedder.dimension())
            }
            Err(error) => {
                warn!("Failed to generate embedding for {}: {}", atom_id, error);
                report.embedding_failures.push(atom_id.to_string());
                zero_vector(self.embedder.dimension())
            }
        }
    }
}

/// Raw subsection texts extracted from one section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct SectionFields {
    summary: Option<String>,
    when_to_use: Option<String>,
    key_concepts: Option<String>,
    code_pattern: Option<String>,
    implementation_notes: Option<String>,
    api_endpoints: Option<String>,
    best_practices: Option<String>,
    related_atoms: Option<String>,
    source: Option<String>,
}

/// Split the document at horizontal rules: lines consisting solely of
/// three or more hyphens.
fn split_sections(document: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in document.lines() {
        if is_rule_line(line) {
            sections.push(std::mem::take(&mut current));
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    sections.push(current);
    sections
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b'-')
}

fn extract_atom_id(section: &str) -> Option<String> {
    ATOM_ID_PATTERN
        .captures(section)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_fields(section: &str) -> SectionFields {
    SectionFields {
        summary: block_after(section, SUMMARY_MARKER),
        when_to_use: block_after(section, "**When to use:**"),
        key_concepts: block_after(section, KEY_CONCEPTS_MARKER),
        code_pattern: block_after(section, "**Code pattern:**"),
        implementation_notes: block_after(section, "**Implementation notes:**"),
        api_endpoints: block_after(section, "**API endpoints required:**"),
        best_practices: block_after(section, "**Best practices:**"),
        related_atoms: line_after(section, RELATED_MARKER),
        source: line_after(section, SOURCE_MARKER),
    }
}

/// Text following `marker`, terminated by the next blank line that is
/// immediately followed by a bold marker, or by the end of the section.
fn block_after(section: &str, marker: &str) -> Option<String> {
    let body = skip_marker_whitespace(section, marker)?;
    let end = body.find(BLOCK_TERMINATOR).unwrap_or(body.len());
    let text = body.get(..end)?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Remainder of the marker's own line only.
fn line_after(section: &str, marker: &str) -> Option<String> {
    let body = skip_marker_whitespace(section, marker)?;
    let end = body.find('\n').unwrap_or(body.len());
    let text = body.get(..end)?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Position a cursor after `marker` and the whitespace that must follow
/// it. None when the marker is absent or not followed by whitespace.
fn skip_marker_whitespace<'s>(section: &'s str, marker: &str) -> Option<&'s str> {
    let start = section.find(marker)? + marker.len();
    let rest = section.get(start..)?;
    let trimmed = rest.trim_start();
    (trimmed.len() < rest.len()).then_some(trimmed)
}

/// Concatenate the present subsections in fixed order, each labeled and
/// separated from the previous one by a blank line.
fn assemble_content(fields: &SectionFields) -> String {
    let mut parts = Vec::new();

    if let Some(summary) = &fields.summary {
        parts.push(format!("Summary: {}", summary));
    }

    let blocks = [
        (&fields.when_to_use, "When to use"),
        (&fields.key_concepts, "Key concepts"),
        (&fields.code_pattern, "Code pattern"),
        (&fields.implementation_notes, "Implementation notes"),
        (&fields.api_endpoints, "API endpoints"),
        (&fields.best_practices, "Best practices"),
    ];

    for (text, label) in blocks {
        if let Some(text) = text {
            parts.push(format!("{}:\n{}", label, text));
        }
    }

    parts.join("\n\n")
}

/// One keyword per bulleted line of the key-concepts subsection: the text
/// before the first colon, or the whole bullet when there is no colon.
fn derive_keywords(key_concepts: &str) -> Vec<String> {
    key_concepts
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix(['-', '•'])?;
            let text = rest.trim();
            if text.is_empty() {
                return None;
            }
            let keyword = text.split(':').next().unwrap_or(text).trim();
            Some(keyword.to_string())
        })
        .collect()
}

/// Every backtick-enclosed token, in order of appearance, duplicates kept.
fn extract_backticked(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find('`') {
        let Some(after) = rest.get(open + 1..) else {
            break;
        };
        let Some(close) = after.find('`') else {
            break;
        };
        if close > 0 {
            if let Some(token) = after.get(..close) {
                tokens.push(token.to_string());
            }
        }
        rest = after.get(close + 1..).unwrap_or("");
    }

    tokens
}

/// Underscores become spaces, then each cased character that follows an
/// uncased one is capitalized and the rest are lowercased.
fn title_case(atom_id: &str) -> String {
    let mut title = String::with_capacity(atom_id.len());
    let mut prev_cased = false;

    for ch in atom_id.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if prev_cased {
                title.extend(ch.to_lowercase());
            } else {
                title.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            title.push(ch);
            prev_cased = false;
        }
    }

    title
}
