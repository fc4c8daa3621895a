use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::Config;
use crate::database::sqlite::Database;
use crate::embeddings::OpenAiClient;
use crate::kb_client::KbClient;
use crate::parser::AtomParser;

/// Result of an ingestion run, used by the CLI to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub parsed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Parse the atoms document and insert every record into the knowledge
/// base, then verify the stored count.
#[inline]
pub async fn ingest_atoms(file: Option<PathBuf>, assume_yes: bool) -> Result<IngestSummary> {
    let config = Config::load_default()?;
    let atoms_file = file.unwrap_or_else(|| config.ingest.atoms_file.clone());
    let manufacturer = config.ingest.manufacturer.clone();

    println!("{}", "=".repeat(70));
    println!("Atom Ingestion");
    println!("{}", "=".repeat(70));

    // Step 1: parse. A missing credential or unreadable file aborts here.
    println!("\n[1/4] Parsing {}...", atoms_file.display());
    let embedder =
        OpenAiClient::new(&config.openai).context("Failed to create embedding client")?;
    let parser = AtomParser::new(&embedder, config.ingest.clone());
    let report = parser.parse_file(&atoms_file)?;

    for skipped in &report.skipped {
        println!(
            "  {} Section {} skipped: {}",
            style("!").yellow(),
            skipped.section_index,
            skipped.reason
        );
    }
    for atom_id in &report.embedding_failures {
        println!(
            "  {} Embedding failed for {}, stored a zero vector",
            style("!").yellow(),
            atom_id
        );
    }
    println!(
        "{} Parsed {} atoms\n",
        style("✓").green(),
        report.records.len()
    );

    // Step 2: connect to storage
    println!("[2/4] Connecting to storage...");
    let config_dir = crate::config::get_config_dir()?;
    let database = Database::initialize_from_config_dir(&config_dir)
        .await
        .context("Failed to connect to the knowledge database")?;
    println!("{} Connected to {}\n", style("✓").green(), config.database_path().display());

    let existing = database.count_for_manufacturer(&manufacturer).await?;
    if existing > 0 {
        println!(
            "Found {} existing {} atoms in the database.",
            existing, manufacturer
        );
        if !assume_yes {
            let proceed = Confirm::new()
                .with_prompt("Proceed anyway? This may create duplicates")
                .default(false)
                .interact()
                .context("Failed to read confirmation")?;

            if !proceed {
                println!("Ingestion cancelled.");
                return Ok(IngestSummary {
                    parsed: report.records.len(),
                    succeeded: 0,
                    failed: 0,
                    cancelled: true,
                });
            }
        }
    }

    // Step 3: insert atoms one at a time, counting failures instead of
    // aborting the run
    println!("[3/4] Inserting atoms into knowledge_atoms table...");
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(report.records.len() as u64).with_style(
            ProgressStyle::with_template("{bar:30} [{pos}/{len}] {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for record in &report.records {
        bar.set_message(record.atom_id.clone());
        match database.insert_atom(record).await {
            Ok(()) => {
                info!("Inserted atom {}", record.atom_id);
                succeeded += 1;
            }
            Err(e) => {
                error!("Failed to insert {}: {}", record.atom_id, e);
                println!("  {} {}: {}", style("✗").red(), record.atom_id, e);
                failed += 1;
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "Ingestion complete: {}/{} successful\n",
        succeeded,
        report.records.len()
    );

    // Step 4: verify
    println!("[4/4] Verifying ingestion...");
    let stored_ids = database.list_atom_ids(&manufacturer).await?;
    let total = database.count_for_manufacturer(&manufacturer).await?;
    println!(
        "{} Verified: {} {} atoms in database",
        style("✓").green(),
        total,
        manufacturer
    );

    if !stored_ids.is_empty() {
        println!("\nIngested atoms:");
        for atom_id in &stored_ids {
            println!("  - {}", atom_id);
        }
    }

    println!("\n{}", "=".repeat(70));
    println!("SUMMARY: {} succeeded, {} failed", succeeded, failed);
    println!("{}", "=".repeat(70));

    Ok(IngestSummary {
        parsed: report.records.len(),
        succeeded,
        failed,
        cancelled: false,
    })
}

/// Parse the atoms document and print a per-atom summary without
/// touching storage.
#[inline]
pub fn parse_atoms(file: Option<PathBuf>) -> Result<()> {
    let config = Config::load_default()?;
    let atoms_file = file.unwrap_or_else(|| config.ingest.atoms_file.clone());

    println!("Parsing atoms from: {}\n", atoms_file.display());

    let embedder =
        OpenAiClient::new(&config.openai).context("Failed to create embedding client")?;
    let parser = AtomParser::new(&embedder, config.ingest.clone());
    let report = parser.parse_file(&atoms_file)?;

    println!("{}", "=".repeat(60));
    println!("PARSED ATOMS SUMMARY");
    println!("{}", "=".repeat(60));

    for atom in &report.records {
        let summary_preview: String = atom.summary.chars().take(80).collect();
        println!("\n{}:", atom.atom_id);
        println!("  Title: {}", atom.title);
        println!("  Summary: {}...", summary_preview);
        println!(
            "  Keywords: {}...",
            atom.keywords
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  Related: {}...",
            atom.related_atoms
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  Embedding dims: {}", atom.embedding.len());
    }

    println!("\n{}", "=".repeat(60));
    println!("Total atoms parsed: {}", report.records.len());
    if !report.skipped.is_empty() {
        println!("Sections skipped: {}", report.skipped.len());
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

/// Search the knowledge base and print matching atoms.
#[inline]
pub fn search_kb(query: &str, limit: usize) -> Result<()> {
    let config = Config::load_default()?;
    let client = KbClient::new(&config.kb_api)?;

    let atoms = client.search(query, limit)?;

    if atoms.is_empty() {
        println!("No atoms matched '{}'.", query);
        return Ok(());
    }

    println!("Results for '{}' ({} atoms):", query, atoms.len());
    for atom in &atoms {
        println!(
            "- {}: {}",
            atom.id,
            atom.summary.as_deref().unwrap_or("N/A")
        );
    }

    Ok(())
}

/// Fetch and print one atom by id.
#[inline]
pub fn show_atom(atom_id: &str) -> Result<()> {
    let config = Config::load_default()?;
    let client = KbClient::new(&config.kb_api)?;

    match client.get_atom(atom_id)? {
        Some(atom) => {
            println!("ID: {}", atom.id);
            if let Some(title) = &atom.title {
                println!("Title: {}", title);
            }
            println!("Summary: {}", atom.summary.as_deref().unwrap_or("N/A"));
            if let Some(when_to_use) = &atom.when_to_use {
                println!("When to use: {}", when_to_use);
            }
            if !atom.keywords.is_empty() {
                println!("Keywords: {}", atom.keywords.join(", "));
            }
            if !atom.related_atoms.is_empty() {
                println!("Related: {}", atom.related_atoms.join(", "));
            }
        }
        None => {
            println!("Atom not found: {}", atom_id);
        }
    }

    Ok(())
}

/// Fetch and print the bootstrap atoms.
#[inline]
pub fn show_bootstrap() -> Result<()> {
    let config = Config::load_default()?;
    let client = KbClient::new(&config.kb_api)?;

    let atoms = client.bootstrap_atoms();

    println!("Bootstrap atoms ({} loaded):", atoms.len());
    for atom in &atoms {
        println!("\n{}:", atom.id);
        println!("  Summary: {}", atom.summary.as_deref().unwrap_or("N/A"));
    }

    Ok(())
}

/// Ask the knowledge base to ingest an external source.
#[inline]
pub fn trigger_source_ingest(url: &str, source_type: &str) -> Result<()> {
    let config = Config::load_default()?;
    let client = KbClient::new(&config.kb_api)?;

    let job_id = client.trigger_ingest(url, source_type)?;
    println!("Triggered ingestion of {} (job: {})", url, job_id);

    Ok(())
}

/// Print knowledge-base statistics.
#[inline]
pub fn show_stats() -> Result<()> {
    let config = Config::load_default()?;
    let client = KbClient::new(&config.kb_api)?;

    let stats = client.stats()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to format stats")?
    );

    Ok(())
}
