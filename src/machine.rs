//! Dispatch State Machine
//!
//! Tracks the one operation outstanding on an execution context.
//!
//! ```text
//!            dispatch(op)                 finish(signal)
//!   Idle ─────────────────▶ Running(op) ─────────────────▶ Completed(signal)
//!    ▲ ▲                     │     ▲                              │
//!    │ │     secure interrupt│     │resume(id)                    │
//!    │ │  (yielding, no result)    │                              │
//!    │ │                     ▼     │                              │
//!    │ └──── abort ──── Preempted(id, ctx)                        │
//!    └──────────────────────── acknowledge ───────────────────────┘
//! ```
//!
//! # Invariants
//! - At most one in-flight record per context: it lives inside `Preempted`
//! - Fast calls and lifecycle transitions never reach `Preempted`
//! - Every illegal transition is reported and leaves the state untouched

use crate::completion::{Completion, Signal};
use crate::context::SavedContext;
use crate::error::ProtocolViolation;
use crate::security::SecureWrapper;
use crate::smc::fid::FunctionId;

/// Lifecycle transitions driven by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Cold boot of the primary core.
    Boot,
    CpuOn,
    CpuOff,
    CpuSuspend,
    CpuResume,
    SystemOff,
    SystemReset,
}

impl Lifecycle {
    /// The signal that closes this transition.
    pub const fn completion(self) -> Completion {
        match self {
            Lifecycle::Boot => Completion::EntryDone,
            Lifecycle::CpuOn => Completion::OnDone,
            Lifecycle::CpuOff => Completion::OffDone,
            Lifecycle::CpuSuspend => Completion::SuspendDone,
            Lifecycle::CpuResume => Completion::ResumeDone,
            Lifecycle::SystemOff => Completion::SystemOffDone,
            Lifecycle::SystemReset => Completion::SystemResetDone,
        }
    }
}

/// Work the dispatcher hands to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A service call.
    Call(FunctionId),
    Lifecycle(Lifecycle),
}

impl Operation {
    /// Only yielding service calls may be preempted.
    pub const fn is_preemptible(self) -> bool {
        match self {
            Operation::Call(fid) => fid.is_yielding(),
            Operation::Lifecycle(_) => false,
        }
    }

    pub const fn expected_signal(self) -> Signal {
        match self {
            Operation::Call(fid) => Signal::ServiceDone(fid),
            Operation::Lifecycle(l) => Signal::Completion(l.completion()),
        }
    }

    /// Identifier used when reporting this operation.
    pub const fn fid(self) -> FunctionId {
        match self {
            Operation::Call(fid) => fid,
            Operation::Lifecycle(l) => l.completion().fid(),
        }
    }
}

/// Current state of an execution context.
#[derive(Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Running(Operation),
    /// The in-flight yielding-call record.
    Preempted {
        fid: FunctionId,
        saved: SecureWrapper<SavedContext>,
    },
    /// Signal raised, not yet read by the dispatcher.
    Completed(Signal),
}

impl State {
    pub const fn kind(&self) -> StateKind {
        match self {
            State::Idle => StateKind::Idle,
            State::Running(_) => StateKind::Running,
            State::Preempted { .. } => StateKind::Preempted,
            State::Completed(_) => StateKind::Completed,
        }
    }
}

/// `State` without its payload, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Running,
    Preempted,
    Completed,
}

/// What a secure interrupt does to the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The yielding call was suspended and its context saved.
    Preempted,
    /// The call already produced its result; it completes first.
    CompletionWins,
    /// Interrupts are masked (fast call, lifecycle, unread signal).
    Deferred,
    /// Nothing is running; handle it right away.
    HandleNow,
}

/// Per-context state machine.
#[derive(Debug)]
pub struct DispatchMachine {
    state: State,
}

impl DispatchMachine {
    pub const fn new() -> Self {
        Self { state: State::Idle }
    }

    #[inline]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[inline]
    pub fn kind(&self) -> StateKind {
        self.state.kind()
    }

    /// Id of the preempted yielding call, if any.
    pub fn preempted_call(&self) -> Option<FunctionId> {
        match &self.state {
            State::Preempted { fid, .. } => Some(*fid),
            _ => None,
        }
    }

    /// `Idle -> Running(op)`.
    pub fn dispatch(&mut self, op: Operation) -> Result<(), ProtocolViolation> {
        if self.state != State::Idle {
            return Err(ProtocolViolation::NotIdle(self.kind()));
        }
        self.state = State::Running(op);
        Ok(())
    }

    /// Tie-break between a secure interrupt and natural completion: the
    /// interrupt preempts only a yielding call whose result does not exist
    /// yet.
    pub fn preempts(&self, result_ready: bool) -> bool {
        match &self.state {
            State::Running(op) => op.is_preemptible() && !result_ready,
            _ => false,
        }
    }

    /// Deliver a secure interrupt. `save` captures the interrupted context
    /// and is only called when the call is actually preempted.
    pub fn secure_interrupt<F>(
        &mut self,
        result_ready: bool,
        save: F,
    ) -> Result<Interrupt, ProtocolViolation>
    where
        F: FnOnce() -> SavedContext,
    {
        let fid = match &self.state {
            State::Idle => return Ok(Interrupt::HandleNow),
            State::Completed(_) => return Ok(Interrupt::Deferred),
            State::Preempted { fid, .. } => {
                return Err(ProtocolViolation::DoublePreemption(*fid))
            }
            State::Running(op) if !op.is_preemptible() => return Ok(Interrupt::Deferred),
            State::Running(op) => op.fid(),
        };

        if result_ready {
            return Ok(Interrupt::CompletionWins);
        }

        self.state = State::Preempted {
            fid,
            saved: SecureWrapper::new(save()),
        };
        Ok(Interrupt::Preempted)
    }

    /// `Preempted(id) -> Running(id)`, handing back the saved context.
    pub fn resume(
        &mut self,
        requested: FunctionId,
    ) -> Result<SecureWrapper<SavedContext>, ProtocolViolation> {
        let running = State::Running(Operation::Call(requested));
        match core::mem::replace(&mut self.state, running) {
            State::Preempted { fid, saved } if fid == requested => Ok(saved),
            State::Preempted { fid, saved } => {
                self.state = State::Preempted { fid, saved };
                Err(ProtocolViolation::ResumeMismatch {
                    preempted: fid,
                    requested,
                })
            }
            other => {
                let kind = other.kind();
                self.state = other;
                Err(ProtocolViolation::NothingToResume(kind))
            }
        }
    }

    /// `Preempted -> Idle`. The saved context is zeroed on the way out.
    pub fn abort(&mut self) -> Result<FunctionId, ProtocolViolation> {
        match core::mem::replace(&mut self.state, State::Idle) {
            State::Preempted { fid, saved } => {
                drop(saved);
                Ok(fid)
            }
            other => {
                let kind = other.kind();
                self.state = other;
                Err(ProtocolViolation::NothingToAbort(kind))
            }
        }
    }

    /// `Running(op) -> Completed(signal)`.
    pub fn finish(&mut self, signal: Signal) -> Result<(), ProtocolViolation> {
        let op = match &self.state {
            State::Running(op) => *op,
            other => return Err(ProtocolViolation::NotRunning(other.kind())),
        };

        let expected = op.expected_signal();
        if signal != expected {
            return Err(ProtocolViolation::UnexpectedSignal {
                expected,
                actual: signal,
            });
        }

        self.state = State::Completed(signal);
        Ok(())
    }

    /// `Completed(signal) -> Idle`, returning the signal.
    pub fn acknowledge(&mut self) -> Result<Signal, ProtocolViolation> {
        let signal = match &self.state {
            State::Completed(signal) => *signal,
            other => return Err(ProtocolViolation::NotCompleted(other.kind())),
        };
        self.state = State::Idle;
        Ok(signal)
    }
}

impl Default for DispatchMachine {
    fn default() -> Self {
        Self::new()
    }
}
