// Database module
// SQLite-backed storage for ingested knowledge atoms

pub mod sqlite;
