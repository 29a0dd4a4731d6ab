use std::fmt;

/// Lifecycle of one processed item.
///
/// `Opening → Processing → Finalizing → Done`, or `Failed` from any
/// non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Opening,
    Processing,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Opening, Processing) | (Processing, Finalizing) | (Finalizing, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next`, logging the change. Invalid transitions are a bug.
    pub(crate) fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid pipeline transition {self} -> {next}"
        );
        log::debug!("Pipeline {self} -> {next}");
        *self = next;
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Opening => "opening",
            PipelineState::Processing => "processing",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}
