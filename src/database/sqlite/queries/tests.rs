use super::*;
use crate::database::sqlite::Database;
use tempfile::TempDir;
use uuid::Uuid;

async fn create_test_database() -> (TempDir, Database) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let database = Database::new(&db_path)
        .await
        .expect("Failed to create test database");

    (temp_dir, database)
}

fn sample_record(atom_id: &str) -> AtomRecord {
    AtomRecord {
        id: Uuid::new_v4(),
        atom_id: atom_id.to_string(),
        atom_type: "pattern".to_string(),
        title: "Sample Atom".to_string(),
        summary: "A sample atom.".to_string(),
        content: "Summary: A sample atom.".to_string(),
        manufacturer: "devcto".to_string(),
        product_family: "agent".to_string(),
        product_version: "v1.0".to_string(),
        difficulty: "intermediate".to_string(),
        prerequisites: Vec::new(),
        related_atoms: vec!["other".to_string()],
        source_document: "DEVCTO_CLAUDE_ATOMS.md".to_string(),
        source_pages: vec![1],
        keywords: vec!["sample".to_string()],
        quality_score: 1.0,
        embedding: vec![0.25; 8],
    }
}

#[tokio::test]
async fn insert_and_fetch_round_trip() {
    let (_temp_dir, database) = create_test_database().await;
    let pool = database.pool();

    let record = sample_record("core_loop");
    AtomQueries::insert(pool, &record)
        .await
        .expect("Failed to insert atom");

    let fetched = AtomQueries::get_by_atom_id(pool, "devcto", "core_loop")
        .await
        .expect("Query should succeed")
        .expect("Atom should exist");

    assert_eq!(fetched, record);
}

#[tokio::test]
async fn missing_atom_returns_none() {
    let (_temp_dir, database) = create_test_database().await;

    let fetched = AtomQueries::get_by_atom_id(database.pool(), "devcto", "absent")
        .await
        .expect("Query should succeed");

    assert!(fetched.is_none());
}

#[tokio::test]
async fn duplicate_atom_ids_are_allowed_and_latest_wins() {
    let (_temp_dir, database) = create_test_database().await;
    let pool = database.pool();

    let first = sample_record("core_loop");
    let second = sample_record("core_loop");

    AtomQueries::insert(pool, &first)
        .await
        .expect("First insert should succeed");
    AtomQueries::insert(pool, &second)
        .await
        .expect("Second insert should succeed");

    let count = AtomQueries::count_for_manufacturer(pool, "devcto")
        .await
        .expect("Count should succeed");
    assert_eq!(count, 2);

    let fetched = AtomQueries::get_by_atom_id(pool, "devcto", "core_loop")
        .await
        .expect("Query should succeed")
        .expect("Atom should exist");
    assert_eq!(fetched.id, second.id);
}

#[tokio::test]
async fn atom_ids_list_in_insertion_order() {
    let (_temp_dir, database) = create_test_database().await;
    let pool = database.pool();

    for atom_id in ["first", "second", "third"] {
        AtomQueries::insert(pool, &sample_record(atom_id))
            .await
            .expect("Insert should succeed");
    }

    let ids = AtomQueries::list_atom_ids(pool, "devcto")
        .await
        .expect("List should succeed");
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn counts_are_scoped_by_manufacturer() {
    let (_temp_dir, database) = create_test_database().await;
    let pool = database.pool();

    AtomQueries::insert(pool, &sample_record("core_loop"))
        .await
        .expect("Insert should succeed");

    let mut foreign = sample_record("unrelated");
    foreign.manufacturer = "langfuse".to_string();
    AtomQueries::insert(pool, &foreign)
        .await
        .expect("Insert should succeed");

    let devcto = AtomQueries::count_for_manufacturer(pool, "devcto")
        .await
        .expect("Count should succeed");
    let langfuse = AtomQueries::count_for_manufacturer(pool, "langfuse")
        .await
        .expect("Count should succeed");

    assert_eq!(devcto, 1);
    assert_eq!(langfuse, 1);
}

#[tokio::test]
async fn delete_for_manufacturer_removes_only_matching_rows() {
    let (_temp_dir, database) = create_test_database().await;
    let pool = database.pool();

    AtomQueries::insert(pool, &sample_record("one"))
        .await
        .expect("Insert should succeed");
    AtomQueries::insert(pool, &sample_record("two"))
        .await
        .expect("Insert should succeed");

    let mut foreign = sample_record("keep");
    foreign.manufacturer = "langfuse".to_string();
    AtomQueries::insert(pool, &foreign)
        .await
        .expect("Insert should succeed");

    let deleted = AtomQueries::delete_for_manufacturer(pool, "devcto")
        .await
        .expect("Delete should succeed");
    assert_eq!(deleted, 2);

    let remaining = AtomQueries::count_for_manufacturer(pool, "langfuse")
        .await
        .expect("Count should succeed");
    assert_eq!(remaining, 1);
}
