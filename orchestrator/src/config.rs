use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::models::WorkflowType;

const DEFAULT_AGENT: &str = "baron";

/// Process-wide configuration, immutable after startup.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub port: u16,
    pub database_url: String,
    pub agent_hub_url: String,
    /// Upper bound on a single hub invocation (worker timeout rides inside).
    pub invoke_timeout: Duration,
    pub agent_map: HashMap<WorkflowType, String>,
    pub phase_plans: HashMap<WorkflowType, Vec<String>>,
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a number")?,
            Err(_) => 8000,
        };
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://orchestrator.db".to_string());
        let agent_hub_url = std::env::var("AGENT_HUB_URL")
            .unwrap_or_else(|_| "http://localhost:8001".to_string());
        let invoke_timeout = match std::env::var("INVOKE_TIMEOUT_SECONDS") {
            Ok(raw) => Duration::from_secs(
                raw.parse().context("INVOKE_TIMEOUT_SECONDS must be a number")?,
            ),
            Err(_) => Duration::from_secs(120),
        };

        let agent_map = match std::env::var("WORKFLOW_AGENT_MAP") {
            Ok(raw) => parse_agent_map(&raw)?,
            Err(_) => HashMap::new(),
        };
        let phase_plans = match std::env::var("PHASE_PLANS") {
            Ok(raw) => parse_phase_plans(&raw)?,
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            port,
            database_url,
            agent_hub_url,
            invoke_timeout,
            agent_map,
            phase_plans,
        })
    }

    /// Minimal configuration pointing at explicit endpoints; used by tests
    /// and embedders that bypass the environment.
    pub fn with_endpoints(database_url: String, agent_hub_url: String) -> Self {
        Self {
            port: 0,
            database_url,
            agent_hub_url,
            invoke_timeout: Duration::from_secs(5),
            agent_map: HashMap::new(),
            phase_plans: HashMap::new(),
        }
    }

    /// Which agent executes phases for this workflow type.
    pub fn agent_for(&self, workflow_type: WorkflowType) -> &str {
        self.agent_map
            .get(&workflow_type)
            .map(String::as_str)
            .unwrap_or(DEFAULT_AGENT)
    }

    /// Ordered phase plan for a workflow type. The default plan is the
    /// single phase named after the type itself.
    pub fn phases_for(&self, workflow_type: WorkflowType) -> Vec<String> {
        self.phase_plans
            .get(&workflow_type)
            .cloned()
            .unwrap_or_else(|| vec![workflow_type.as_str().to_string()])
    }
}

/// `specify=baron,implement=earl`
fn parse_agent_map(raw: &str) -> Result<HashMap<WorkflowType, String>> {
    let mut map = HashMap::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let Some((key, agent)) = entry.split_once('=') else {
            bail!("WORKFLOW_AGENT_MAP entry '{entry}' is not type=agent");
        };
        let workflow_type =
            WorkflowType::from_str(key.trim()).map_err(|e| anyhow::anyhow!(e))?;
        map.insert(workflow_type, agent.trim().to_string());
    }
    Ok(map)
}

/// `implement=specify+plan+tasks+implement,tasks=tasks`
fn parse_phase_plans(raw: &str) -> Result<HashMap<WorkflowType, Vec<String>>> {
    let mut map = HashMap::new();
    for entry in raw.split(',').filter(|e| !e.trim().is_empty()) {
        let Some((key, plan)) = entry.split_once('=') else {
            bail!("PHASE_PLANS entry '{entry}' is not type=phase+phase");
        };
        let workflow_type =
            WorkflowType::from_str(key.trim()).map_err(|e| anyhow::anyhow!(e))?;
        let phases: Vec<String> = plan
            .split('+')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if phases.is_empty() {
            bail!("PHASE_PLANS entry '{entry}' names no phases");
        }
        map.insert(workflow_type, phases);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_map_parses_and_defaults() {
        let map = parse_agent_map("specify=baron,implement=earl").unwrap();
        assert_eq!(map[&WorkflowType::Implement], "earl");
        assert!(parse_agent_map("bogus=x").is_err());
    }

    #[test]
    fn phase_plans_parse_multi_phase_entries() {
        let plans = parse_phase_plans("implement=plan+tasks+implement").unwrap();
        assert_eq!(
            plans[&WorkflowType::Implement],
            vec!["plan", "tasks", "implement"]
        );
    }

    #[test]
    fn default_plan_is_the_type_itself() {
        let config =
            OrchestratorConfig::with_endpoints("sqlite::memory:".into(), String::new());
        assert_eq!(config.phases_for(WorkflowType::Specify), vec!["specify"]);
        assert_eq!(config.agent_for(WorkflowType::Plan), "baron");
    }
}
