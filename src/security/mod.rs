//! Security Primitives Module
//!
//! Saved secure-world register state is zeroed when no longer needed.
//!
//! # Security Properties
//! - Saved contexts are always zeroed when resumed or discarded
//! - Memory is cleared using volatile writes to prevent optimization

pub mod zeroize;

pub use zeroize::{SecureWrapper, Zeroize};
