//! Completion Protocol
//!
//! The fixed vocabulary the payload uses to tell the dispatcher which
//! operation just finished. Exactly one signal closes every operation the
//! dispatcher starts; signals never combine.
//!
//! Lifecycle transitions close with a `Completion` (`0xF200000x`). A service
//! call closes by handing its own function id back with the result words.

use core::fmt;

use crate::smc::args::SMC_RESULT_COUNT;
use crate::smc::fid::FunctionId;

/// Signals the payload raises towards the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Completion {
    /// Cold boot finished, vector table published.
    EntryDone = 0xF200_0000,
    OnDone = 0xF200_0001,
    OffDone = 0xF200_0002,
    SuspendDone = 0xF200_0003,
    ResumeDone = 0xF200_0004,
    /// A yielding call stopped at a preemption point.
    Preempted = 0xF200_0005,
    /// A secure interrupt was handled; control returns to the dispatcher.
    HandledSecureInterrupt = 0xF200_0006,
    AbortDone = 0xF200_0007,
    SystemOffDone = 0xF200_0008,
    SystemResetDone = 0xF200_0009,
}

impl Completion {
    pub const ALL: [Completion; 10] = [
        Completion::EntryDone,
        Completion::OnDone,
        Completion::OffDone,
        Completion::SuspendDone,
        Completion::ResumeDone,
        Completion::Preempted,
        Completion::HandledSecureInterrupt,
        Completion::AbortDone,
        Completion::SystemOffDone,
        Completion::SystemResetDone,
    ];

    /// Wire identifier.
    #[inline]
    pub const fn fid(self) -> FunctionId {
        FunctionId::from_raw(self as u32)
    }
}

/// The single event closing a dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Completion(Completion),
    /// A service finished; carries the id of the call it answers.
    ServiceDone(FunctionId),
}

impl Signal {
    /// Identifier the payload issues to raise this signal.
    pub const fn fid(self) -> FunctionId {
        match self {
            Signal::Completion(c) => c.fid(),
            Signal::ServiceDone(fid) => fid,
        }
    }
}

impl From<Completion> for Signal {
    fn from(c: Completion) -> Self {
        Signal::Completion(c)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Completion(c) => write!(f, "{:?}", c),
            Signal::ServiceDone(fid) => write!(f, "ServiceDone({})", fid),
        }
    }
}

/// What every entry point hands back: one signal and up to four result words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryReturn {
    pub signal: Signal,
    pub results: [u64; SMC_RESULT_COUNT],
}

impl EntryReturn {
    /// A bare completion without results.
    pub const fn signal(completion: Completion) -> Self {
        Self {
            signal: Signal::Completion(completion),
            results: [0; SMC_RESULT_COUNT],
        }
    }

    /// A service result.
    pub const fn service(fid: FunctionId, results: [u64; SMC_RESULT_COUNT]) -> Self {
        Self {
            signal: Signal::ServiceDone(fid),
            results,
        }
    }
}
