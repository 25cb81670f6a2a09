//! Topic → agent resolution with per-topic confidence thresholds.

use crate::config::RoutingTable;
use crate::error::HubError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub agent_id: String,
    pub threshold: u8,
}

/// Resolution order: explicit topic override first, then any agent whose
/// `topics` list contains the topic, else `unknown_topic` listing every
/// topic the table knows.
pub fn resolve_topic(table: &RoutingTable, topic: &str) -> Result<Resolution, HubError> {
    if let Some(override_) = table.topics.get(topic) {
        if table.agents.contains_key(&override_.agent_id) {
            return Ok(Resolution {
                agent_id: override_.agent_id.clone(),
                threshold: override_
                    .confidence_threshold
                    .unwrap_or(table.default_threshold),
            });
        }
    }

    for (agent_id, agent) in &table.agents {
        if agent.topics.iter().any(|t| t == topic) {
            return Ok(Resolution {
                agent_id: agent_id.clone(),
                threshold: table.default_threshold,
            });
        }
    }

    Err(HubError::UnknownTopic {
        topic: topic.to_string(),
        known: known_topics(table),
    })
}

pub fn known_topics(table: &RoutingTable) -> Vec<String> {
    let mut topics: Vec<String> = table
        .topics
        .keys()
        .cloned()
        .chain(
            table
                .agents
                .values()
                .flat_map(|agent| agent.topics.iter().cloned()),
        )
        .collect();
    topics.sort();
    topics.dedup();
    topics
}

pub fn known_agents(table: &RoutingTable) -> Vec<String> {
    let mut agents: Vec<String> = table.agents.keys().cloned().collect();
    agents.sort();
    agents
}

/// The confidence gate: meeting the threshold resolves, strictly below
/// escalates. Boundary equality accepts.
pub fn meets_threshold(confidence: u8, threshold: u8) -> bool {
    confidence >= threshold
}
