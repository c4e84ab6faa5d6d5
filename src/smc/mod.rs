//! Secure Monitor Call Interface
//!
//! The identifier namespace and the register sets exchanged between the
//! normal world, the dispatcher and the payload.
//!
//! # Call Classes
//! - Fast: atomic, secure interrupts masked
//! - Yielding: preemptible, resumed with `TSP_FID_RESUME` or cancelled with
//!   `TSP_FID_ABORT`
//! - Meta: count/UID/version queries, never reach the payload

pub mod args;
pub mod call;
pub mod fid;

pub use args::{SmcArgs, SmcReturn, SMC_INVALID_PARAM, SMC_OK, SMC_PREEMPTED, SMC_UNK};
pub use call::{Call, MetaCall, Service};
pub use fid::{bare, fast_fid, yield_fid, CallType, FidFlags, FunctionId};
