#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end ingestion pipeline: document on disk -> parsed records ->
// SQLite rows, with a stub embedder standing in for the network.

use tempfile::TempDir;

use atom_kb::config::IngestProfile;
use atom_kb::database::sqlite::Database;
use atom_kb::embeddings::{DEFAULT_EMBEDDING_DIMENSION, Embedder};
use atom_kb::parser::AtomParser;

struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.125; DEFAULT_EMBEDDING_DIMENSION])
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }
}

const ATOMS_DOC: &str = "\
# DevCTO Knowledge Atoms

---
## Atom: devcto_core_loop

**Summary:** Drives the analyze-execute-learn cycle.

**Key concepts:**
- analyzer: inspects the repo
- executor: applies changes

**Related atoms:** `devcto_analyzer_pattern` and `devcto_executor_pattern`
---
## Atom: devcto_kb_integration

**Summary:** How agents consult the knowledge base.

**When to use:**
Before starting any repo work.
---
This trailing note has no atom marker.
";

#[tokio::test]
async fn document_round_trips_through_storage() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let doc_path = temp_dir.path().join("atoms.md");
    std::fs::write(&doc_path, ATOMS_DOC).expect("should write fixture document");

    let embedder = StubEmbedder;
    let parser = AtomParser::new(&embedder, IngestProfile::default());
    let report = parser.parse_file(&doc_path).expect("parse should succeed");

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.skipped.len(), 2); // the doc preamble and the trailer
    assert!(report.embedding_failures.is_empty());

    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("database should initialize");

    for record in &report.records {
        database
            .insert_atom(record)
            .await
            .expect("insert should succeed");
    }

    let count = database
        .count_for_manufacturer("devcto")
        .await
        .expect("count should succeed");
    assert_eq!(count, 2);

    let ids = database
        .list_atom_ids("devcto")
        .await
        .expect("list should succeed");
    assert_eq!(ids, vec!["devcto_core_loop", "devcto_kb_integration"]);

    let stored = database
        .get_atom("devcto", "devcto_core_loop")
        .await
        .expect("get should succeed")
        .expect("atom should exist");

    assert_eq!(stored.title, "Devcto Core Loop");
    assert_eq!(stored.summary, "Drives the analyze-execute-learn cycle.");
    assert_eq!(stored.keywords, vec!["analyzer", "executor"]);
    assert_eq!(
        stored.related_atoms,
        vec!["devcto_analyzer_pattern", "devcto_executor_pattern"]
    );
    assert_eq!(stored.embedding.len(), DEFAULT_EMBEDDING_DIMENSION);
    assert_eq!(stored.content.lines().next(), Some("Summary: Drives the analyze-execute-learn cycle."));
}
