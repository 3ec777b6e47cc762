//! Pipeline run state and state machine.
//!
//! ```text
//! Init → ResolvingIdentity → Rendering → Transpiling → Validating → Composing → Done
//!              │                 │            │             │            │
//!              └─────────────────┴────────────┴─────────────┴────────────┴──→ Failed(stage)
//! ```
//!
//! `Done` and `Failed` are absorbing. There is no re-entry into an earlier
//! state and no automatic retry.

use isoforge_shared::{ForgeError, ForgeResult, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    ResolvingIdentity,
    Rendering,
    Transpiling,
    Validating,
    Composing,
    Done,
    /// A stage failed; nothing was emitted.
    Failed(Stage),
}

impl PipelineState {
    /// State entered when `stage` starts.
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::ResolveIdentity => PipelineState::ResolvingIdentity,
            Stage::Render => PipelineState::Rendering,
            Stage::Transpile => PipelineState::Transpiling,
            Stage::Validate => PipelineState::Validating,
            Stage::Compose => PipelineState::Composing,
        }
    }

    /// Stage currently executing, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::ResolvingIdentity => Some(Stage::ResolveIdentity),
            PipelineState::Rendering => Some(Stage::Render),
            PipelineState::Transpiling => Some(Stage::Transpile),
            PipelineState::Validating => Some(Stage::Validate),
            PipelineState::Composing => Some(Stage::Compose),
            PipelineState::Init | PipelineState::Done | PipelineState::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// Check if `stage` may start from this state.
    pub fn can_enter(&self, stage: Stage) -> bool {
        match self {
            PipelineState::Init => stage == Stage::ResolveIdentity,
            _ => self
                .stage()
                .and_then(|current| current.next())
                .is_some_and(|next| next == stage),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Init => f.write_str("init"),
            PipelineState::ResolvingIdentity => f.write_str("resolving_identity"),
            PipelineState::Rendering => f.write_str("rendering"),
            PipelineState::Transpiling => f.write_str("transpiling"),
            PipelineState::Validating => f.write_str("validating"),
            PipelineState::Composing => f.write_str("composing"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

/// Enforces the state machine for one run and keeps the visited states.
#[derive(Debug, Clone)]
pub struct StateTracker {
    history: Vec<PipelineState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: vec![PipelineState::Init],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Init)
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Start `stage`. Rejects skipping, repeating or going back.
    pub fn enter(&mut self, stage: Stage) -> ForgeResult<()> {
        let current = self.state();
        if !current.can_enter(stage) {
            return Err(ForgeError::Internal(format!(
                "cannot start stage {} from state {}",
                stage, current
            )));
        }
        self.transition(PipelineState::running(stage));
        Ok(())
    }

    /// Mark the running stage as failed.
    pub fn fail(&mut self) -> ForgeResult<()> {
        let current = self.state();
        let stage = current.stage().ok_or_else(|| {
            ForgeError::Internal(format!("no stage is running in state {}", current))
        })?;
        self.transition(PipelineState::Failed(stage));
        Ok(())
    }

    /// Finish after composition.
    pub fn finish(&mut self) -> ForgeResult<()> {
        let current = self.state();
        if current != PipelineState::Composing {
            return Err(ForgeError::Internal(format!(
                "cannot finish from state {}",
                current
            )));
        }
        self.transition(PipelineState::Done);
        Ok(())
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = %self.state(), to = %next, "Pipeline state transition");
        self.history.push(next);
    }
}
