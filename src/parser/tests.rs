use super::*;
use crate::embeddings::DEFAULT_EMBEDDING_DIMENSION;
use anyhow::anyhow;
use std::collections::HashSet;

/// Stub embedder returning a constant non-zero vector.
struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.25; DEFAULT_EMBEDDING_DIMENSION])
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }
}

/// Embedder that fails for inputs starting with any of the given prefixes.
struct SelectiveEmbedder {
    failing_prefixes: Vec<&'static str>,
}

impl Embedder for SelectiveEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self
            .failing_prefixes
            .iter()
            .any(|prefix| text.starts_with(prefix))
        {
            return Err(anyhow!("embedding service rejected the request"));
        }
        Ok(vec![0.5; DEFAULT_EMBEDDING_DIMENSION])
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }
}

/// Embedder returning a vector of the wrong width.
struct TruncatedEmbedder;

impl Embedder for TruncatedEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3])
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }
}

fn parse(document: &str) -> ParseReport {
    let embedder = StubEmbedder;
    AtomParser::new(&embedder, IngestProfile::default()).parse_document(document)
}

const TWO_SECTION_DOC: &str = "\
## Atom: foo_bar

**Summary:** Does X.

**Key concepts:**
- alpha: desc
- beta
---
This section is malformed and has no marker.
";

#[test]
fn two_section_scenario() {
    let report = parse(TWO_SECTION_DOC);

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.atom_id, "foo_bar");
    assert_eq!(record.title, "Foo Bar");
    assert_eq!(record.summary, "Does X.");
    assert_eq!(record.keywords, vec!["alpha", "beta"]);

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::MissingAtomMarker);
}

#[test]
fn qualifying_sections_each_produce_a_record_with_distinct_ids() {
    let document = "\
## Atom: first

**Summary:** One.
---
## Atom: second

**Summary:** Two.
---
## Atom: third

**Summary:** Three.
";
    let report = parse(document);

    assert_eq!(report.records.len(), 3);
    let ids: HashSet<Uuid> = report.records.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 3);

    let atom_ids: Vec<&str> = report.records.iter().map(|r| r.atom_id.as_str()).collect();
    assert_eq!(atom_ids, vec!["first", "second", "third"]);
}

#[test]
fn record_ids_are_fresh_on_each_parse() {
    let first = parse(TWO_SECTION_DOC);
    let second = parse(TWO_SECTION_DOC);

    assert_ne!(first.records[0].id, second.records[0].id);
}

#[test]
fn section_without_identifier_token_is_skipped() {
    let document = "\
## Atom: ???
---
## Atom: valid_atom

**Summary:** Still parsed.
";
    let report = parse(document);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].atom_id, "valid_atom");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::MissingAtomId);
    assert_eq!(report.skipped[0].section_index, 0);
}

#[test]
fn empty_document_produces_nothing() {
    let report = parse("");
    assert!(report.records.is_empty());
    assert!(report.skipped.is_empty());
}

#[test]
fn blank_segments_between_rules_are_ignored_silently() {
    let document = "---\n\n---\n## Atom: only_one\n\n**Summary:** Here.\n";
    let report = parse(document);

    assert_eq!(report.records.len(), 1);
    assert!(report.skipped.is_empty());
}

#[test]
fn horizontal_rule_variants() {
    assert!(is_rule_line("---"));
    assert!(is_rule_line("----"));
    assert!(is_rule_line("----------"));
    assert!(is_rule_line("---   "));
    assert!(!is_rule_line("--"));
    assert!(!is_rule_line("   ---"));
    assert!(!is_rule_line("---x"));
    assert!(!is_rule_line("- - -"));
}

#[test]
fn embedding_is_requested_from_identity_and_summary() {
    struct CapturingEmbedder(std::sync::Mutex<Vec<String>>);

    impl Embedder for CapturingEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.0.lock().expect("lock").push(text.to_string());
            Ok(vec![1.0; DEFAULT_EMBEDDING_DIMENSION])
        }

        fn dimension(&self) -> usize {
            DEFAULT_EMBEDDING_DIMENSION
        }
    }

    let embedder = CapturingEmbedder(std::sync::Mutex::new(Vec::new()));
    let parser = AtomParser::new(&embedder, IngestProfile::default());
    parser.parse_document(TWO_SECTION_DOC);

    let inputs = embedder.0.lock().expect("lock");
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0], "foo_bar: Does X.");
}

#[test]
fn embedding_failure_substitutes_zeros_and_continues() {
    let embedder = SelectiveEmbedder {
        failing_prefixes: vec!["first:"],
    };
    let document = "\
## Atom: first

**Summary:** Fails to embed.
---
## Atom: second

**Summary:** Embeds fine.
";
    let parser = AtomParser::new(&embedder, IngestProfile::default());
    let report = parser.parse_document(document);

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.embedding_failures, vec!["first"]);

    let failed = &report.records[0];
    assert_eq!(failed.embedding.len(), DEFAULT_EMBEDDING_DIMENSION);
    assert!(failed.embedding.iter().all(|&v| v == 0.0));

    let succeeded = &report.records[1];
    assert_eq!(succeeded.embedding.len(), DEFAULT_EMBEDDING_DIMENSION);
    assert!(succeeded.embedding.iter().any(|&v| v != 0.0));
}

#[test]
fn wrong_width_embedding_is_replaced_by_zeros() {
    let embedder = TruncatedEmbedder;
    let parser = AtomParser::new(&embedder, IngestProfile::default());
    let report = parser.parse_document(TWO_SECTION_DOC);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].embedding.len(), DEFAULT_EMBEDDING_DIMENSION);
    assert!(report.records[0].embedding.iter().all(|&v| v == 0.0));
    assert_eq!(report.embedding_failures, vec!["foo_bar"]);
}

#[test]
fn keyword_extraction_is_idempotent() {
    let first = parse(TWO_SECTION_DOC);
    let second = parse(TWO_SECTION_DOC);

    assert_eq!(first.records[0].keywords, second.records[0].keywords);
    assert_eq!(first.records[0].summary, second.records[0].summary);
    assert_eq!(first.records[0].content, second.records[0].content);
}

#[test]
fn related_atoms_scenario() {
    let document = "## Atom: kb_integration\n\n**Related atoms:** see `x_y` and `z_w`\n";
    let report = parse(document);

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].related_atoms, vec!["x_y", "z_w"]);
}

#[test]
fn related_atoms_keep_duplicates_in_order() {
    assert_eq!(extract_backticked("`a` and `b` then `a`"), ["a", "b", "a"]);
    assert_eq!(extract_backticked("none here"), [] as [&str; 0]);
    assert_eq!(extract_backticked("`unterminated"), [] as [&str; 0]);
}

#[test]
fn related_atoms_are_line_scoped() {
    let document = "\
## Atom: scoped

**Related atoms:** `on_line`
`next_line` is not part of the field
";
    let report = parse(document);

    assert_eq!(report.records[0].related_atoms, vec!["on_line"]);
}

#[test]
fn missing_summary_yields_empty_string_and_no_content_label() {
    let document = "\
## Atom: no_summary

**When to use:**
Whenever you need it.
";
    let report = parse(document);

    let record = &report.records[0];
    assert_eq!(record.summary, "");
    assert!(!record.content.contains("Summary:"));
    assert!(record.content.starts_with("When to use:\nWhenever you need it."));
}

#[test]
fn content_assembles_present_subsections_in_fixed_order() {
    let document = "\
## Atom: full_atom

**Summary:** Short summary.

**When to use:**
Use early.

**Key concepts:**
- alpha: first
- beta

**Code pattern:**
let x = 1;

**Implementation notes:**
Keep it simple.

**API endpoints required:**
GET /api/kb/atom

**Best practices:**
Test everything.

**Related atoms:** `other_atom`
**Source:** handbook page 3
";
    let report = parse(document);
    let record = &report.records[0];

    let expected = "Summary: Short summary.\n\n\
        When to use:\nUse early.\n\n\
        Key concepts:\n- alpha: first\n- beta\n\n\
        Code pattern:\nlet x = 1;\n\n\
        Implementation notes:\nKeep it simple.\n\n\
        API endpoints:\nGET /api/kb/atom\n\n\
        Best practices:\nTest everything.";
    assert_eq!(record.content, expected);
    assert_eq!(record.keywords, vec!["alpha", "beta"]);
    assert_eq!(record.related_atoms, vec!["other_atom"]);
}

#[test]
fn fixed_metadata_is_stamped_from_the_profile() {
    let report = parse(TWO_SECTION_DOC);
    let record = &report.records[0];

    assert_eq!(record.atom_type, "pattern");
    assert_eq!(record.manufacturer, "devcto");
    assert_eq!(record.product_family, "agent");
    assert_eq!(record.product_version, "v1.0");
    assert_eq!(record.difficulty, "intermediate");
    assert_eq!(record.quality_score, 1.0);
    assert_eq!(record.source_document, "DEVCTO_CLAUDE_ATOMS.md");
    assert_eq!(record.source_pages, vec![1]);
    assert!(record.prerequisites.is_empty());
}

#[test]
fn keywords_without_colon_use_full_bullet_text() {
    let keywords = derive_keywords("- plain bullet\n- labeled: detail\n-\n- : leading colon");
    assert_eq!(keywords, vec!["plain bullet", "labeled", ""]);
}

#[test]
fn keywords_accept_bullet_glyphs() {
    let keywords = derive_keywords("• glyph: detail\n- dash: detail");
    assert_eq!(keywords, vec!["glyph", "dash"]);
}

#[test]
fn indented_bullets_are_not_keywords() {
    let keywords = derive_keywords("  - indented: ignored\n- counted: yes");
    assert_eq!(keywords, vec!["counted"]);
}

#[test]
fn title_casing() {
    assert_eq!(title_case("foo_bar"), "Foo Bar");
    assert_eq!(title_case("kb_integration"), "Kb Integration");
    assert_eq!(title_case("api_v2_design"), "Api V2 Design");
    assert_eq!(title_case("ALREADY_UPPER"), "Already Upper");
}

#[test]
fn block_extraction_requires_whitespace_after_marker() {
    assert!(block_after("**Summary:**glued", SUMMARY_MARKER).is_none());
    assert_eq!(
        block_after("**Summary:** spaced", SUMMARY_MARKER).as_deref(),
        Some("spaced")
    );
    assert_eq!(
        block_after("**Summary:**\nnext line", SUMMARY_MARKER).as_deref(),
        Some("next line")
    );
}

#[test]
fn block_extraction_stops_at_blank_line_before_bold_marker() {
    let section = "**Summary:** First part.\nStill summary.\n\n**When to use:**\nLater.";
    assert_eq!(
        block_after(section, SUMMARY_MARKER).as_deref(),
        Some("First part.\nStill summary.")
    );
}

#[test]
fn unreadable_file_is_fatal() {
    let embedder = StubEmbedder;
    let parser = AtomParser::new(&embedder, IngestProfile::default());

    let result = parser.parse_file("/nonexistent/path/to/atoms.md");
    assert!(result.is_err());
}

#[test]
fn parse_file_reads_document_from_disk() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("atoms.md");
    std::fs::write(&path, TWO_SECTION_DOC).expect("should write fixture");

    let embedder = StubEmbedder;
    let parser = AtomParser::new(&embedder, IngestProfile::default());
    let report = parser.parse_file(&path).expect("parse should succeed");

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].atom_id, "foo_bar");
}
