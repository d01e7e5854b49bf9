//! Single-round escalation state machine.
//!
//! `Initial` moves to `Escalated` at most once per query. `Escalated` is
//! terminal: no further round is attempted whatever the new quality.

use crate::backend::Availability;
use crate::types::{BackendKind, QualityMetrics, SearchMode};

use super::executor::Strategy;

/// Escalation only fires while fewer than this many backends were used.
pub const MAX_BACKENDS_BEFORE_ESCALATION: usize = 3;

/// Escalation rounds run sequentially from this many additional backends.
pub const ESCALATION_SEQUENTIAL_THRESHOLD: usize = 2;

/// Where a query is in the escalation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscalationState {
    #[default]
    Initial,
    Escalated,
}

/// Decides whether, and with which backends, to widen a search.
#[derive(Debug, Clone)]
pub struct EscalationController {
    state: EscalationState,
    enabled: bool,
}

impl EscalationController {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: EscalationState::Initial,
            enabled,
        }
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    pub fn escalated(&self) -> bool {
        self.state == EscalationState::Escalated
    }

    /// Whether the transition guard holds for this result set.
    pub fn should_escalate(
        &self,
        quality: &QualityMetrics,
        mode: SearchMode,
        current_backends: usize,
    ) -> bool {
        self.enabled
            && self.state == EscalationState::Initial
            && quality.needs_escalation
            && mode != SearchMode::Comprehensive
            && current_backends < MAX_BACKENDS_BEFORE_ESCALATION
    }

    /// Available backends not yet used, in canonical order.
    pub fn additional_backends(
        availability: &Availability,
        current: &[BackendKind],
    ) -> Vec<BackendKind> {
        availability
            .kinds()
            .iter()
            .copied()
            .filter(|kind| !current.contains(kind))
            .collect()
    }

    /// Execution strategy for an escalation round.
    pub fn strategy(additional: &[BackendKind]) -> Strategy {
        Strategy::for_count(additional.len(), ESCALATION_SEQUENTIAL_THRESHOLD)
    }

    /// Enter the terminal state.
    pub fn mark_escalated(&mut self) {
        self.state = EscalationState::Escalated;
    }

    /// `"<mode>"` or `"<mode> (escalated)"`.
    pub fn mode_label(&self, mode: SearchMode) -> String {
        match self.state {
            EscalationState::Initial => mode.name().to_string(),
            EscalationState::Escalated => format!("{} (escalated)", mode.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::quality::assess;
    use crate::types::SearchResult;

    fn weak_quality() -> QualityMetrics {
        let results: Vec<SearchResult> = (0..3)
            .map(|i| SearchResult::new(format!("k{i}"), Some(0.4)))
            .collect();
        assess(&results)
    }

    fn strong_quality() -> QualityMetrics {
        let results: Vec<SearchResult> = (0..10)
            .map(|i| SearchResult::new(format!("k{i}"), Some(0.9)))
            .collect();
        assess(&results)
    }

    #[test]
    fn weak_single_backend_result_escalates() {
        let controller = EscalationController::new(true);
        assert!(controller.should_escalate(&weak_quality(), SearchMode::Auto, 1));
    }

    #[test]
    fn guard_conditions() {
        let controller = EscalationController::new(true);
        assert!(!controller.should_escalate(&strong_quality(), SearchMode::Auto, 1));
        assert!(!controller.should_escalate(&weak_quality(), SearchMode::Comprehensive, 1));
        assert!(!controller.should_escalate(&weak_quality(), SearchMode::Auto, 3));
        assert!(controller.should_escalate(&weak_quality(), SearchMode::Fast, 2));
    }

    #[test]
    fn disabled_controller_never_escalates() {
        let controller = EscalationController::new(false);
        assert!(!controller.should_escalate(&weak_quality(), SearchMode::Auto, 1));
    }

    #[test]
    fn escalated_is_terminal() {
        let mut controller = EscalationController::new(true);
        controller.mark_escalated();
        assert_eq!(controller.state(), EscalationState::Escalated);
        assert!(!controller.should_escalate(&weak_quality(), SearchMode::Auto, 1));
    }

    #[test]
    fn additional_backends_in_canonical_order() {
        let availability = Availability::new([
            BackendKind::Metadata,
            BackendKind::Semantic,
            BackendKind::Graph,
        ]);
        let extra = EscalationController::additional_backends(
            &availability,
            &[BackendKind::Semantic],
        );
        assert_eq!(extra, vec![BackendKind::Graph, BackendKind::Metadata]);
        assert_eq!(EscalationController::strategy(&extra), Strategy::Sequential);
        assert_eq!(
            EscalationController::strategy(&extra[..1]),
            Strategy::Parallel
        );
    }

    #[test]
    fn mode_label_annotation() {
        let mut controller = EscalationController::new(true);
        assert_eq!(controller.mode_label(SearchMode::Auto), "auto");
        controller.mark_escalated();
        assert_eq!(controller.mode_label(SearchMode::Auto), "auto (escalated)");
    }
}
