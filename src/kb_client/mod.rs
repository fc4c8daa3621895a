//! Read client for the Agent Factory knowledge-base API.
//!
//! Wraps the HTTP surface downstream consumers use: semantic search,
//! fetch-by-id, namespace queries, and the ingestion trigger. Responses
//! are cached in a bounded, time-limited cache with an explicit
//! invalidation operation.


use anyhow::{Context, Result};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::KbApiConfig;

/// Core atoms any DevCTO development work should consult first.
pub const BOOTSTRAP_ATOM_IDS: [&str; 8] = [
    "devcto_core_loop",
    "devcto_repo_structure",
    "devcto_guardrails_philosophy",
    "devcto_kb_integration",
    "devcto_headless_exec",
    "devcto_analyzer_pattern",
    "devcto_executor_pattern",
    "devcto_learning_loop",
];

const DEFAULT_SEARCH_LIMIT: usize = 5;
const NAMESPACE_SEARCH_LIMIT: usize = 20;

/// One atom as returned by the knowledge-base API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbAtom {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub when_to_use: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub related_atoms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    atoms: Vec<KbAtom>,
}

#[derive(Debug, Deserialize)]
struct AtomResponse {
    atom: KbAtom,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    job_id: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Serialize)]
struct IngestRequest<'a> {
    url: &'a str,
    source_type: &'a str,
}

/// Blocking client for the knowledge-base read API.
pub struct KbClient {
    base_url: Url,
    agent: ureq::Agent,
    search_cache: Cache<(String, usize), Arc<Vec<KbAtom>>>,
    atom_cache: Cache<String, Arc<KbAtom>>,
}

impl KbClient {
    /// Build a client from configuration and probe the API's health
    /// endpoint. An unreachable API is logged, not fatal: every read
    /// method reports its own errors.
    #[inline]
    pub fn new(config: &KbApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid KB API base URL: {}", config.base_url))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        let search_cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();
        let atom_cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        let client = Self {
            base_url,
            agent,
            search_cache,
            atom_cache,
        };

        if let Err(error) = client.health_check() {
            warn!("KB health check failed: {}", error);
        }

        Ok(client)
    }

    /// Verify the knowledge-base API is accessible.
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/health")
            .context("Failed to build health URL")?;

        debug!("Checking KB API health at {}", url);

        self.agent
            .get(url.as_str())
            .call()
            .with_context(|| format!("Cannot connect to knowledge base at {}", self.base_url))?;

        Ok(())
    }

    /// Search the knowledge base for atoms relevant to a query.
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<KbAtom>> {
        let cache_key = (query.to_string(), top_k);
        if let Some(cached) = self.search_cache.get(&cache_key) {
            debug!("Cache hit for query: {}", query);
            return Ok(cached.as_ref().clone());
        }

        let url = self
            .base_url
            .join("/api/kb/search")
            .context("Failed to build search URL")?;
        let request = SearchRequest { query, top_k };
        let body =
            serde_json::to_string(&request).context("Failed to serialize search request")?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .with_context(|| format!("KB search failed for '{}'", query))?;

        let response: SearchResponse =
            serde_json::from_str(&response_text).context("Failed to parse search response")?;

        self.search_cache
            .insert(cache_key, Arc::new(response.atoms.clone()));

        info!(
            "KB search for '{}' returned {} atoms",
            query,
            response.atoms.len()
        );
        Ok(response.atoms)
    }

    /// Search with the client's default result limit.
    #[inline]
    pub fn search_default(&self, query: &str) -> Result<Vec<KbAtom>> {
        self.search(query, DEFAULT_SEARCH_LIMIT)
    }

    /// Fetch a specific atom by its id. A missing atom is `None`, not an
    /// error.
    #[inline]
    pub fn get_atom(&self, atom_id: &str) -> Result<Option<KbAtom>> {
        if let Some(cached) = self.atom_cache.get(atom_id) {
            debug!("Cache hit for atom: {}", atom_id);
            return Ok(Some(cached.as_ref().clone()));
        }

        let mut url = self
            .base_url
            .join("/api/kb/atom")
            .context("Failed to build atom URL")?;
        url.query_pairs_mut().append_pair("atom_id", atom_id);

        let result = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string());

        let response_text = match result {
            Ok(text) => text,
            Err(ureq::Error::StatusCode(404)) => {
                debug!("Atom not found: {}", atom_id);
                return Ok(None);
            }
            Err(error) => {
                return Err(error).with_context(|| format!("Failed to fetch atom '{}'", atom_id));
            }
        };

        let response: AtomResponse =
            serde_json::from_str(&response_text).context("Failed to parse atom response")?;

        self.atom_cache
            .insert(atom_id.to_string(), Arc::new(response.atom.clone()));

        info!("Fetched atom: {}", atom_id);
        Ok(Some(response.atom))
    }

    /// Fetch the core atoms needed for bootstrapping, skipping any that
    /// are missing or unreachable.
    #[inline]
    pub fn bootstrap_atoms(&self) -> Vec<KbAtom> {
        let mut atoms = Vec::with_capacity(BOOTSTRAP_ATOM_IDS.len());

        for atom_id in BOOTSTRAP_ATOM_IDS {
            match self.get_atom(atom_id) {
                Ok(Some(atom)) => atoms.push(atom),
                Ok(None) => warn!("Core atom not found: {}", atom_id),
                Err(error) => warn!("Failed to fetch core atom {}: {}", atom_id, error),
            }
        }

        info!(
            "Loaded {}/{} bootstrap atoms",
            atoms.len(),
            BOOTSTRAP_ATOM_IDS.len()
        );
        atoms
    }

    /// All atoms whose ids share a namespace prefix.
    #[inline]
    pub fn search_by_namespace(&self, namespace: &str, top_k: usize) -> Result<Vec<KbAtom>> {
        self.search(&format!("{}_", namespace), top_k)
    }

    /// Namespace search with the default namespace result limit.
    #[inline]
    pub fn search_namespace_default(&self, namespace: &str) -> Result<Vec<KbAtom>> {
        self.search_by_namespace(namespace, NAMESPACE_SEARCH_LIMIT)
    }

    /// Ask the knowledge base to ingest a new source, returning the job
    /// id for tracking.
    #[inline]
    pub fn trigger_ingest(&self, source_url: &str, source_type: &str) -> Result<String> {
        let url = self
            .base_url
            .join("/api/ingest")
            .context("Failed to build ingest URL")?;
        let request = IngestRequest {
            url: source_url,
            source_type,
        };
        let body =
            serde_json::to_string(&request).context("Failed to serialize ingest request")?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .with_context(|| format!("Failed to trigger ingestion for {}", source_url))?;

        let response: IngestResponse =
            serde_json::from_str(&response_text).context("Failed to parse ingest response")?;

        info!(
            "Triggered ingestion of {} (job: {})",
            source_url, response.job_id
        );
        Ok(response.job_id)
    }

    /// Knowledge-base statistics and metadata, passed through unshaped.
    #[inline]
    pub fn stats(&self) -> Result<serde_json::Value> {
        let url = self
            .base_url
            .join("/api/kb/stats")
            .context("Failed to build stats URL")?;

        let response_text = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .context("Failed to fetch KB stats")?;

        serde_json::from_str(&response_text).context("Failed to parse stats response")
    }

    /// Drop every cached response.
    #[inline]
    pub fn invalidate_cache(&self) {
        self.search_cache.invalidate_all();
        self.atom_cache.invalidate_all();
        info!("KB client cache cleared");
    }
}
