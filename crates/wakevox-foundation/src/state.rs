use crate::error::StateError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Engine lifecycle state. Exactly one value at any time.
///
/// Only the hotword state machine mutates this; every other component
/// reads it or requests transitions through events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No capture session, nothing scheduled.
    Idle,
    /// A capture session is live and candidates are being matched.
    Listening,
    /// The wake phrase fired; a foreground session owns the microphone.
    CommandHandoff,
    /// An external collaborator claimed the microphone via `pause`.
    PausedExternal,
    /// A capture fault occurred and a retry is pending.
    RecoveringError,
}

pub struct StateManager {
    state: Arc<RwLock<EngineState>>,
    state_tx: Sender<EngineState>,
    state_rx: Receiver<EngineState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(EngineState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: EngineState) -> Result<(), StateError> {
        use EngineState::*;

        let mut current = self.state.write();

        let valid = matches!(
            (*current, new_state),
            (Idle, Listening)
                | (Idle, PausedExternal)
                | (Listening, CommandHandoff)
                | (Listening, RecoveringError)
                | (Listening, PausedExternal)
                | (RecoveringError, Listening)
                | (RecoveringError, Idle)
                | (RecoveringError, PausedExternal)
                | (CommandHandoff, Listening)
                | (PausedExternal, Listening)
        );

        if !valid {
            return Err(StateError::InvalidTransition(format!(
                "{:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("engine state: {:?} -> {:?}", *current, new_state);
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> EngineState {
        *self.state.read()
    }

    /// Observe transitions as they happen. Each subscriber shares one
    /// queue; intended for tests and status surfaces.
    pub fn subscribe(&self) -> Receiver<EngineState> {
        self.state_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let mgr = StateManager::new();
        assert_eq!(mgr.current(), EngineState::Idle);
    }

    #[test]
    fn full_listen_handoff_cycle() {
        let mgr = StateManager::new();
        mgr.transition(EngineState::Listening).unwrap();
        mgr.transition(EngineState::CommandHandoff).unwrap();
        mgr.transition(EngineState::Listening).unwrap();
        assert_eq!(mgr.current(), EngineState::Listening);
    }

    #[test]
    fn recovery_paths() {
        let mgr = StateManager::new();
        mgr.transition(EngineState::Listening).unwrap();
        mgr.transition(EngineState::RecoveringError).unwrap();
        mgr.transition(EngineState::Listening).unwrap();
        mgr.transition(EngineState::RecoveringError).unwrap();
        mgr.transition(EngineState::Idle).unwrap();
        assert_eq!(mgr.current(), EngineState::Idle);
    }

    #[test]
    fn pause_allowed_from_non_handoff_states() {
        for setup in [
            vec![],
            vec![EngineState::Listening],
            vec![EngineState::Listening, EngineState::RecoveringError],
        ] {
            let mgr = StateManager::new();
            for s in setup {
                mgr.transition(s).unwrap();
            }
            mgr.transition(EngineState::PausedExternal).unwrap();
            mgr.transition(EngineState::Listening).unwrap();
        }
    }

    #[test]
    fn handoff_cannot_be_paused() {
        let mgr = StateManager::new();
        mgr.transition(EngineState::Listening).unwrap();
        mgr.transition(EngineState::CommandHandoff).unwrap();
        assert!(mgr.transition(EngineState::PausedExternal).is_err());
    }

    #[test]
    fn rejected_transition_leaves_state_unchanged() {
        let mgr = StateManager::new();
        assert!(mgr.transition(EngineState::CommandHandoff).is_err());
        assert_eq!(mgr.current(), EngineState::Idle);
    }

    #[test]
    fn subscribers_see_transitions_in_order() {
        let mgr = StateManager::new();
        let rx = mgr.subscribe();
        mgr.transition(EngineState::Listening).unwrap();
        mgr.transition(EngineState::CommandHandoff).unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineState::Listening);
        assert_eq!(rx.try_recv().unwrap(), EngineState::CommandHandoff);
        assert!(rx.try_recv().is_err());
    }
}
