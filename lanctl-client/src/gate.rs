//! Single-permit dispatch gate.
//!
//! Commands whose side effect completes asynchronously (the service answers
//! with a handshake frame once the side task has run) must not overlap. The
//! gate is an explicit two-state machine; the read loop or a session failure
//! provides the escape transition back to idle.

use parking_lot::Mutex;

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No side effect pending; a command may be dispatched.
    Idle,
    /// A dispatched command's side effect has not completed yet.
    AwaitingSideEffect,
}

/// The "command in flight" guard on the dispatch path.
///
/// At most one command's side task runs at a time, so a single permit is
/// sufficient and there is no lock ordering to get wrong.
#[derive(Debug)]
pub struct DispatchGate {
    state: Mutex<GateState>,
}

impl DispatchGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    /// Attempts the Idle -> AwaitingSideEffect transition.
    ///
    /// Returns false if a side effect is already pending.
    pub fn try_begin(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            GateState::Idle => {
                *state = GateState::AwaitingSideEffect;
                true
            }
            GateState::AwaitingSideEffect => false,
        }
    }

    /// Returns to Idle. Idempotent; called on handshake arrival, dispatch
    /// failure, and session teardown.
    pub fn complete(&self) {
        *self.state.lock() = GateState::Idle;
    }

    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == GateState::Idle
    }
}

impl Default for DispatchGate {
    fn default() -> Self {
        Self::new()
    }
}
