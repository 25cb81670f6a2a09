//! Outbound forge notices for escalations.
//!
//! Posting is strictly best-effort: a failed notice never fails the
//! escalation. Failures land in an in-memory queue the drain task retries
//! up to the configured attempt cap; the queue is lost on restart.

use octocrab::Octocrab;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::ForgeConfig;

#[derive(Debug, Clone)]
pub struct EscalationNotice {
    pub escalation_id: String,
    pub topic: String,
    pub question: String,
    pub tentative_answer: String,
    pub confidence: u8,
    pub uncertainty_reasons: Vec<String>,
}

#[derive(Debug, Clone)]
struct PendingNotice {
    notice: EscalationNotice,
    attempts: u32,
}

pub struct ForgeNotifier {
    client: Option<Octocrab>,
    config: Option<ForgeConfig>,
    queue: Mutex<Vec<PendingNotice>>,
}

impl ForgeNotifier {
    pub fn new(config: Option<ForgeConfig>) -> anyhow::Result<Self> {
        let client = match &config {
            Some(forge) => Some(
                Octocrab::builder()
                    .personal_token(forge.token.clone())
                    .build()?,
            ),
            None => None,
        };

        Ok(Self {
            client,
            config,
            queue: Mutex::new(Vec::new()),
        })
    }

    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Post an escalation notice. Returns the external comment id when the
    /// forge accepted it; a failure queues the notice for retry and returns
    /// `None` without surfacing an error to the caller.
    pub async fn post(&self, notice: EscalationNotice) -> Option<String> {
        if !self.enabled() {
            return None;
        }

        match self.post_once(&notice).await {
            Ok(comment_id) => Some(comment_id),
            Err(e) => {
                warn!(
                    escalation_id = %notice.escalation_id,
                    "forge post failed, queued for retry: {}",
                    e
                );
                self.queue.lock().push(PendingNotice { notice, attempts: 1 });
                None
            }
        }
    }

    async fn post_once(&self, notice: &EscalationNotice) -> anyhow::Result<String> {
        let (client, config) = match (&self.client, &self.config) {
            (Some(client), Some(config)) => (client, config),
            _ => anyhow::bail!("forge integration is not configured"),
        };

        let comment = client
            .issues(&config.owner, &config.repo)
            .create_comment(config.issue_number, notice_body(notice))
            .await?;

        Ok(comment.id.0.to_string())
    }

    /// Retry queued notices once each; returns `(escalation_id, comment_id)`
    /// for every notice that finally landed.
    pub async fn drain(&self) -> Vec<(String, String)> {
        let pending: Vec<PendingNotice> = std::mem::take(&mut *self.queue.lock());
        if pending.is_empty() {
            return Vec::new();
        }

        let max_attempts = self
            .config
            .as_ref()
            .map(|c| c.max_post_attempts)
            .unwrap_or(3);

        let mut posted = Vec::new();
        for mut entry in pending {
            match self.post_once(&entry.notice).await {
                Ok(comment_id) => {
                    info!(
                        escalation_id = %entry.notice.escalation_id,
                        "forge notice delivered on retry"
                    );
                    posted.push((entry.notice.escalation_id.clone(), comment_id));
                }
                Err(e) => {
                    entry.attempts += 1;
                    if entry.attempts < max_attempts {
                        self.queue.lock().push(entry);
                    } else {
                        warn!(
                            escalation_id = %entry.notice.escalation_id,
                            "dropping forge notice after {} attempts: {}",
                            entry.attempts,
                            e
                        );
                    }
                }
            }
        }
        posted
    }
}

fn notice_body(notice: &EscalationNotice) -> String {
    let reasons = if notice.uncertainty_reasons.is_empty() {
        "- none given".to_string()
    } else {
        notice
            .uncertainty_reasons
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "## Expert escalation: {topic}\n\n\
         **Question**\n{question}\n\n\
         **Tentative answer** (confidence {confidence}/100)\n{answer}\n\n\
         **Uncertainty**\n{reasons}\n\n\
         Reply with `/confirm`, `/correct <answer>` or `/context <info>`.",
        topic = notice.topic,
        question = notice.question,
        confidence = notice.confidence,
        answer = notice.tentative_answer,
        reasons = reasons,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_body_carries_the_response_hints() {
        let body = notice_body(&EscalationNotice {
            escalation_id: "e1".into(),
            topic: "security".into(),
            question: "Which password hash?".into(),
            tentative_answer: "bcrypt".into(),
            confidence: 61,
            uncertainty_reasons: vec!["conflicting guidance".into()],
        });

        assert!(body.contains("/confirm"));
        assert!(body.contains("/correct <answer>"));
        assert!(body.contains("/context <info>"));
        assert!(body.contains("confidence 61/100"));
        assert!(body.contains("- conflicting guidance"));
    }

    #[test]
    fn disabled_notifier_reports_disabled() {
        let notifier = ForgeNotifier::new(None).unwrap();
        assert!(!notifier.enabled());
    }
}
