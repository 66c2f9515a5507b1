//! Generation State Machine: explicit states and legal transition guards.
//!
//! A generation run is a straight line through five working states. Each
//! call to `advance()` validates the edge and records it, so a failed run
//! reports exactly where it stopped and how long each stage took.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The set of generation states.
///
/// Every run starts at `SelectingEvent` and terminates at either `Done` or
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    /// Asking the text model for today's event.
    SelectingEvent,
    /// Validating the model's answer as a historical event.
    ParsingEvent,
    /// Asking the image model to render the event.
    GeneratingImage,
    /// Building the grayscale renditions.
    PostProcessing,
    /// Writing renditions, then the metadata record.
    Persisting,
    /// Everything stored; terminal.
    Done,
    /// A stage failed; terminal.
    Failed,
}

impl GenerationState {
    /// `Done` and `Failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectingEvent => write!(f, "SelectingEvent"),
            Self::ParsingEvent => write!(f, "ParsingEvent"),
            Self::GeneratingImage => write!(f, "GeneratingImage"),
            Self::PostProcessing => write!(f, "PostProcessing"),
            Self::Persisting => write!(f, "Persisting"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Legal transitions between generation states.
///
/// ```text
/// SelectingEvent → ParsingEvent | Failed
/// ParsingEvent → GeneratingImage | Failed
/// GeneratingImage → PostProcessing | Failed
/// PostProcessing → Persisting | Failed
/// Persisting → Done | Failed
/// ```
fn is_legal_transition(from: GenerationState, to: GenerationState) -> bool {
    use GenerationState::*;

    // Failed is reachable from every working state.
    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (SelectingEvent, ParsingEvent)
            | (ParsingEvent, GeneratingImage)
            | (GeneratingImage, PostProcessing)
            | (PostProcessing, Persisting)
            | (Persisting, Done)
    )
}

/// One edge taken by a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: GenerationState,
    pub to: GenerationState,
    /// Milliseconds since the run started.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A move the transition table does not allow.
#[derive(Debug, Clone, Error)]
#[error("generation cannot move from {from} to {to}")]
pub struct IllegalTransition {
    pub from: GenerationState,
    pub to: GenerationState,
}

/// Tracks the current state of one run and the log of how it got there.
pub struct StateMachine {
    current: GenerationState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: GenerationState::SelectingEvent,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> GenerationState {
        self.current
    }

    /// Move to `to`, or reject the edge and leave the state unchanged.
    pub fn advance(
        &mut self,
        to: GenerationState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            elapsed_ms = record.elapsed_ms,
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Transition to `Failed` from any non-terminal state.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(GenerationState::Failed, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line history for log fields, e.g.
    /// `SelectingEvent → Done (812ms, 5 transitions) [ParsingEvent → ...]`.
    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({}ms, {} transitions)",
            GenerationState::SelectingEvent,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GenerationState::*;

    const HAPPY_PATH: [GenerationState; 5] =
        [ParsingEvent, GeneratingImage, PostProcessing, Persisting, Done];

    #[test]
    fn test_happy_path() {
        let mut sm = StateMachine::new();
        for state in HAPPY_PATH {
            sm.advance(state, None).unwrap();
        }
        assert_eq!(sm.current(), Done);
        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 5);
        assert_eq!(sm.transitions()[0].from, SelectingEvent);
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut sm = StateMachine::new();
        let err = sm.advance(GeneratingImage, None).unwrap_err();
        assert_eq!(err.from, SelectingEvent);
        assert_eq!(err.to, GeneratingImage);
        assert_eq!(sm.current(), SelectingEvent);
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_backward_move_is_rejected() {
        let mut sm = StateMachine::new();
        sm.advance(ParsingEvent, None).unwrap();
        sm.advance(GeneratingImage, None).unwrap();
        assert!(sm.advance(ParsingEvent, None).is_err());
        assert!(sm.advance(SelectingEvent, None).is_err());
    }

    #[test]
    fn test_fail_from_every_working_state() {
        for steps in 0..HAPPY_PATH.len() - 1 {
            let mut sm = StateMachine::new();
            for state in &HAPPY_PATH[..steps] {
                sm.advance(*state, None).unwrap();
            }
            sm.fail("boom").unwrap();
            assert_eq!(sm.current(), Failed);
            assert_eq!(sm.transitions().last().unwrap().reason.as_deref(), Some("boom"));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut done = StateMachine::new();
        for state in HAPPY_PATH {
            done.advance(state, None).unwrap();
        }
        assert!(done.fail("late").is_err());

        let mut failed = StateMachine::new();
        failed.fail("early").unwrap();
        assert!(failed.fail("again").is_err());
        assert!(failed.advance(ParsingEvent, None).is_err());
    }

    #[test]
    fn test_summary_lists_states() {
        let mut sm = StateMachine::new();
        sm.advance(ParsingEvent, None).unwrap();
        sm.fail("bad json").unwrap();
        let summary = sm.summary();
        assert!(summary.starts_with("SelectingEvent → Failed"));
        assert!(summary.contains("[ParsingEvent → Failed]"));
    }

    #[test]
    fn test_transition_record_serializes_snake_case() {
        let mut sm = StateMachine::new();
        sm.advance(ParsingEvent, Some("model answered")).unwrap();
        let json = serde_json::to_value(&sm.transitions()[0]).unwrap();
        assert_eq!(json["from"], "selecting_event");
        assert_eq!(json["to"], "parsing_event");
        assert_eq!(json["reason"], "model answered");
    }
}
