// Hub configuration: environment plus the routing table file.
//
// The routing table is loaded once at startup (YAML or JSON via the
// `config` crate) and is immutable afterwards; restart to reconfigure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 80;
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub url: String,
    #[serde(default)]
    pub default_model: Option<String>,
    /// Per-call worker timeout in seconds.
    #[serde(default = "default_worker_timeout")]
    pub default_timeout: u64,
    #[serde(default)]
    pub topics: Vec<String>,
}

fn default_worker_timeout() -> u64 {
    DEFAULT_WORKER_TIMEOUT_SECS
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicOverride {
    pub agent_id: String,
    #[serde(default)]
    pub confidence_threshold: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingTable {
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    #[serde(default)]
    pub topics: HashMap<String, TopicOverride>,
    #[serde(default = "default_threshold")]
    pub default_threshold: u8,
}

fn default_threshold() -> u8 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            agents: HashMap::new(),
            topics: HashMap::new(),
            default_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Outbound forge (issue tracker) coordinates for escalation notices.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub issue_number: u64,
    pub max_post_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub port: u16,
    pub database_url: String,
    /// `None` disables auditing entirely (startup warns).
    pub audit_log_path: Option<PathBuf>,
    pub session_ttl: Duration,
    pub escalation_ttl: Duration,
    pub routing: RoutingTable,
    pub forge: Option<ForgeConfig>,
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a number")?,
            Err(_) => 8001,
        };
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://agent-hub.db".to_string());

        let audit_log_path = match std::env::var("AUDIT_LOG_PATH") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(PathBuf::from(raw)),
            Err(_) => Some(PathBuf::from("./logs")),
        };

        let session_hours: u64 = match std::env::var("SESSION_EXPIRY_HOURS") {
            Ok(raw) => raw.parse().context("SESSION_EXPIRY_HOURS must be a number")?,
            Err(_) => 1,
        };
        let escalation_days: u64 = match std::env::var("ESCALATION_TTL_DAYS") {
            Ok(raw) => raw.parse().context("ESCALATION_TTL_DAYS must be a number")?,
            Err(_) => 7,
        };

        let routing_path =
            std::env::var("ROUTING_CONFIG").unwrap_or_else(|_| "routing.yaml".to_string());
        let mut routing = load_routing_table(&routing_path)?;

        if let Ok(raw) = std::env::var("ESCALATION_THRESHOLD") {
            routing.default_threshold =
                raw.parse().context("ESCALATION_THRESHOLD must be 0..=100")?;
        }
        apply_agent_url_overrides(&mut routing);

        let forge = forge_from_env()?;

        Ok(Self {
            port,
            database_url,
            audit_log_path,
            session_ttl: Duration::from_secs(session_hours * 3600),
            escalation_ttl: Duration::from_secs(escalation_days * 86400),
            routing,
            forge,
        })
    }

}

fn load_routing_table(path: &str) -> Result<RoutingTable> {
    if !std::path::Path::new(path).exists() {
        warn!("routing config '{}' not found, starting with an empty table", path);
        return Ok(RoutingTable::default());
    }

    let table: RoutingTable = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()
        .with_context(|| format!("failed to read routing config '{path}'"))?
        .try_deserialize()
        .with_context(|| format!("failed to parse routing config '{path}'"))?;

    for (topic, override_) in &table.topics {
        if !table.agents.contains_key(&override_.agent_id) {
            warn!(
                "topic '{}' routes to unknown agent '{}'",
                topic, override_.agent_id
            );
        }
    }

    Ok(table)
}

/// `<AGENT>_URL` environment variables override the file, e.g. `BARON_URL`.
fn apply_agent_url_overrides(routing: &mut RoutingTable) {
    for (agent_id, agent) in routing.agents.iter_mut() {
        let var = format!("{}_URL", agent_id.to_uppercase().replace('-', "_"));
        if let Ok(url) = std::env::var(&var) {
            agent.url = url;
        }
    }
}

fn forge_from_env() -> Result<Option<ForgeConfig>> {
    let (Ok(token), Ok(repo)) = (std::env::var("FORGE_TOKEN"), std::env::var("FORGE_REPO"))
    else {
        return Ok(None);
    };

    let Some((owner, name)) = repo.split_once('/') else {
        anyhow::bail!("FORGE_REPO must be owner/name");
    };

    let issue_number: u64 = std::env::var("FORGE_ISSUE")
        .context("FORGE_ISSUE is required when FORGE_REPO is set")?
        .parse()
        .context("FORGE_ISSUE must be a number")?;

    let max_post_attempts: u32 = match std::env::var("FORGE_POST_ATTEMPTS") {
        Ok(raw) => raw.parse().context("FORGE_POST_ATTEMPTS must be a number")?,
        Err(_) => 3,
    };

    Ok(Some(ForgeConfig {
        token,
        owner: owner.to_string(),
        repo: name.to_string(),
        issue_number,
        max_post_attempts,
    }))
}
