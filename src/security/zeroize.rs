//! Secure Register Zeroization
//!
//! A preempted yielding call leaves secure register state behind in its
//! saved context. That state must not survive once the call is resumed or
//! aborted.
//!
//! # Design
//! - `Zeroize` trait for types that can be securely cleared
//! - `SecureWrapper<T>` RAII type that zeros on drop
//! - Volatile writes prevent compiler optimization of zeroing

use core::ptr;
use core::sync::atomic::{compiler_fence, Ordering};

/// Trait for types that can be securely zeroed.
///
/// Implementations must ensure that all secret data is overwritten
/// with zeros in a way that cannot be optimized away.
pub trait Zeroize {
    /// Overwrite this value with zeros.
    fn zeroize(&mut self);
}

/// Zeroize implementation for register files.
impl<const N: usize> Zeroize for [u64; N] {
    fn zeroize(&mut self) {
        for reg in self.iter_mut() {
            // SAFETY: each element is a valid, aligned, exclusive reference
            unsafe {
                ptr::write_volatile(reg, 0);
            }
        }
        compiler_fence(Ordering::SeqCst);
    }
}

/// A wrapper that securely zeroizes its contents on drop.
///
/// # Security Properties
/// - Contents are zeroed using volatile writes
/// - Zeroing cannot be optimized away
/// - Drop runs on every path that discards the value (resume, abort,
///   completion winning a race)
#[derive(Debug)]
pub struct SecureWrapper<T: Zeroize> {
    inner: T,
}

impl<T: Zeroize> SecureWrapper<T> {
    /// Create a new secure wrapper around sensitive data.
    #[inline]
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Get an immutable reference to the inner value.
    #[inline]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Zeroize> Drop for SecureWrapper<T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl<T: Zeroize + PartialEq> PartialEq for SecureWrapper<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: Zeroize + Eq> Eq for SecureWrapper<T> {}
