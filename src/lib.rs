//! PantherOS TSP - Test Secure Payload for the ARM64 secure world
//!
//! The call contract between a normal-world client, the secure monitor's
//! dispatcher and a trusted payload running at S-EL1.
//!
//! # Components
//! - Call-ID registry: SMCCC function ids for services, resume/abort and
//!   the Trusted OS meta-calls
//! - Entry vector table: ten payload entry points, validated once at setup
//! - Dispatch state machine: one per core, governs yielding vs fast calls
//! - Completion protocol: exactly one signal closes every operation
//!
//! # Security Features
//! - Whitelisted function ids; the reserved meta-call is always rejected
//! - Preempted context is zeroed once resumed or aborted
//! - Protocol violations are surfaced as fatal errors, never retried
//!
//! # Architecture
//! - Target: AArch64 (ARM64), QEMU virt platform
//! - Per-core contexts, no locking between cores

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod completion;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod machine;
pub mod security;
pub mod smc;
pub mod tsp;
pub mod vectors;

pub use completion::{Completion, EntryReturn, Signal};
pub use config::TspConfig;
pub use context::{CpuContext, PowerState};
pub use dispatcher::{Dispatcher, SmcOutcome};
pub use error::{Fault, ProtocolViolation, SetupError};
pub use machine::{DispatchMachine, Lifecycle, Operation, State, StateKind};
pub use smc::{FunctionId, SmcArgs, SmcReturn};
pub use vectors::{EntryFn, EntryVectors, Slot};
