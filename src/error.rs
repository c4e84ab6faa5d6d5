//! Fault Taxonomy
//!
//! - `ProtocolViolation`: the dispatcher and payload disagree about the
//!   contract. Fatal to the collaborator that receives it; the context state
//!   is left untouched.
//! - `SetupError`: the vector table is incomplete. Fatal at boot, never
//!   deferred to dispatch time.
//!
//! Service failures (division by zero) are not faults: they come back as
//! result words.

use core::fmt;

use crate::completion::Signal;
use crate::context::PowerState;
use crate::machine::StateKind;
use crate::smc::fid::FunctionId;
use crate::vectors::Slot;

/// Broken dispatcher/payload contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Identifier outside the whitelist.
    UnknownFunction(FunctionId),
    /// The reserved Trusted OS call.
    ReservedFunction(FunctionId),
    /// A new operation was started while another one is outstanding.
    NotIdle(StateKind),
    /// Resume without a preempted call.
    NothingToResume(StateKind),
    /// Resume naming a different call than the one preempted.
    ResumeMismatch {
        preempted: FunctionId,
        requested: FunctionId,
    },
    /// Abort without a preempted call.
    NothingToAbort(StateKind),
    /// Secure interrupt while a call is already preempted.
    DoublePreemption(FunctionId),
    /// A fast call or lifecycle transition reported preemption.
    NotPreemptible(FunctionId),
    /// The payload closed an operation with the wrong signal.
    UnexpectedSignal { expected: Signal, actual: Signal },
    /// A signal arrived with no operation running (second signal).
    NotRunning(StateKind),
    /// Acknowledge with no signal pending.
    NotCompleted(StateKind),
    /// The core is in the wrong power state for the request.
    PowerState {
        core: usize,
        expected: PowerState,
        actual: PowerState,
    },
    /// No such core.
    InvalidCore(usize),
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFunction(fid) => write!(f, "unknown function {}", fid),
            Self::ReservedFunction(fid) => write!(f, "reserved function {}", fid),
            Self::NotIdle(state) => write!(f, "operation outstanding ({:?})", state),
            Self::NothingToResume(state) => write!(f, "no preempted call to resume ({:?})", state),
            Self::ResumeMismatch {
                preempted,
                requested,
            } => write!(f, "resume of {} but {} is preempted", requested, preempted),
            Self::NothingToAbort(state) => write!(f, "no preempted call to abort ({:?})", state),
            Self::DoublePreemption(fid) => {
                write!(f, "secure interrupt while {} already preempted", fid)
            }
            Self::NotPreemptible(fid) => write!(f, "{} is not preemptible", fid),
            Self::UnexpectedSignal { expected, actual } => {
                write!(f, "expected {} but payload signalled {}", expected, actual)
            }
            Self::NotRunning(state) => write!(f, "signal with nothing running ({:?})", state),
            Self::NotCompleted(state) => write!(f, "no signal to acknowledge ({:?})", state),
            Self::PowerState {
                core,
                expected,
                actual,
            } => write!(f, "core {} is {:?}, expected {:?}", core, actual, expected),
            Self::InvalidCore(core) => write!(f, "invalid core {}", core),
        }
    }
}

/// Incomplete or inconsistent payload initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// A vector slot was never installed.
    MissingSlot(Slot),
    /// A vector slot was installed twice.
    SlotAlreadySet(Slot),
    /// The configured primary core does not exist.
    InvalidPrimaryCore(usize),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSlot(slot) => write!(f, "vector slot {} not installed", slot.name()),
            Self::SlotAlreadySet(slot) => write!(f, "vector slot {} installed twice", slot.name()),
            Self::InvalidPrimaryCore(core) => write!(f, "invalid primary core {}", core),
        }
    }
}

/// Any fatal condition seen while bringing the payload up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Setup(SetupError),
    Protocol(ProtocolViolation),
}

impl From<SetupError> for Fault {
    fn from(e: SetupError) -> Self {
        Fault::Setup(e)
    }
}

impl From<ProtocolViolation> for Fault {
    fn from(e: ProtocolViolation) -> Self {
        Fault::Protocol(e)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Setup(e) => write!(f, "setup: {}", e),
            Fault::Protocol(e) => write!(f, "protocol: {}", e),
        }
    }
}
