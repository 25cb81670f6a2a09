//! Workflow state machine: explicit statuses and legal transition guards.
//!
//! The transition table encodes the valid edges:
//! ```text
//! pending          → in_progress       (start)
//! in_progress      → waiting_approval  (agent_complete)
//! waiting_approval → in_progress       (human_approved, more phases)
//! waiting_approval → completed         (human_approved, last phase)
//! waiting_approval → in_progress       (human_rejected, rework)
//! any non-terminal → failed            (error)
//! completed, failed: terminal
//! ```
//!
//! Every advance resolves its target status through [`target_status`]; an
//! illegal pair leaves the workflow row untouched and writes no history.

use crate::models::{Trigger, WorkflowStatus};

/// Resolve the status a trigger moves a workflow into, or `None` when the
/// edge is illegal. `has_more_phases` disambiguates `human_approved` from
/// `waiting_approval`: rework loops back into `in_progress`, the final
/// approval completes the workflow.
pub fn target_status(
    from: WorkflowStatus,
    trigger: Trigger,
    has_more_phases: bool,
) -> Option<WorkflowStatus> {
    use WorkflowStatus::*;

    // Any non-terminal state may fail.
    if trigger == Trigger::Error {
        return (!from.is_terminal()).then_some(Failed);
    }

    match (from, trigger) {
        (Pending, Trigger::Start) => Some(InProgress),
        (InProgress, Trigger::AgentComplete) => Some(WaitingApproval),
        (WaitingApproval, Trigger::HumanApproved) => {
            Some(if has_more_phases { InProgress } else { Completed })
        }
        (WaitingApproval, Trigger::HumanRejected) => Some(InProgress),
        _ => None,
    }
}

/// Whether a `from → to` edge is one the table allows, independent of
/// trigger. History rows are validated against this.
pub fn is_legal_edge(from: WorkflowStatus, to: WorkflowStatus) -> bool {
    use WorkflowStatus::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Pending, InProgress)
            | (InProgress, WaitingApproval)
            | (WaitingApproval, InProgress)
            | (WaitingApproval, Completed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Trigger::*, WorkflowStatus::*};

    #[test]
    fn happy_path_edges_resolve() {
        assert_eq!(target_status(Pending, Start, true), Some(InProgress));
        assert_eq!(
            target_status(InProgress, AgentComplete, true),
            Some(WaitingApproval)
        );
        assert_eq!(
            target_status(WaitingApproval, HumanApproved, true),
            Some(InProgress)
        );
        assert_eq!(
            target_status(WaitingApproval, HumanApproved, false),
            Some(Completed)
        );
        assert_eq!(
            target_status(WaitingApproval, HumanRejected, false),
            Some(InProgress)
        );
    }

    #[test]
    fn every_non_terminal_state_can_fail() {
        for from in [Pending, InProgress, WaitingApproval] {
            assert_eq!(target_status(from, Error, false), Some(Failed));
        }
        assert_eq!(target_status(Completed, Error, false), None);
        assert_eq!(target_status(Failed, Error, false), None);
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [Completed, Failed] {
            for trigger in [Start, AgentComplete, HumanApproved, HumanRejected, Error] {
                assert_eq!(target_status(from, trigger, true), None);
            }
        }
    }

    #[test]
    fn illegal_pairs_are_rejected() {
        assert_eq!(target_status(Pending, HumanApproved, false), None);
        assert_eq!(target_status(InProgress, HumanApproved, false), None);
        assert_eq!(target_status(InProgress, HumanRejected, false), None);
        assert_eq!(target_status(WaitingApproval, AgentComplete, false), None);
        assert_eq!(target_status(Pending, AgentComplete, false), None);
    }

    #[test]
    fn edge_table_matches_trigger_table() {
        assert!(is_legal_edge(Pending, InProgress));
        assert!(is_legal_edge(InProgress, WaitingApproval));
        assert!(is_legal_edge(WaitingApproval, InProgress));
        assert!(is_legal_edge(WaitingApproval, Completed));
        assert!(is_legal_edge(InProgress, Failed));
        assert!(!is_legal_edge(Completed, InProgress));
        assert!(!is_legal_edge(Failed, InProgress));
        assert!(!is_legal_edge(Pending, Completed));
    }
}
