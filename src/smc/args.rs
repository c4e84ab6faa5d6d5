//! SMC argument and return sets
//!
//! The monitor passes `x0..x7` through to the payload unchanged and hands
//! `x0..x3` back to the caller.

use super::fid::FunctionId;

/// Call succeeded.
pub const SMC_OK: u64 = 0;
/// Unknown function identifier.
pub const SMC_UNK: u64 = -1i64 as u64;
/// The yielding call was preempted and must be resumed or aborted.
pub const SMC_PREEMPTED: u64 = -2i64 as u64;
/// A service rejected its operands.
pub const SMC_INVALID_PARAM: u64 = -3i64 as u64;

/// Number of argument registers passed through to the payload.
pub const SMC_ARG_COUNT: usize = 8;

/// Number of result words a call returns.
pub const SMC_RESULT_COUNT: usize = 4;

/// Argument registers `x0..x7` of an SMC.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmcArgs {
    /// General purpose registers; `x[0]` holds the function id
    pub x: [u64; SMC_ARG_COUNT],
}

impl SmcArgs {
    /// Arguments for a call taking up to two operands.
    pub const fn new(fid: FunctionId, x1: u64, x2: u64) -> Self {
        let mut x = [0; SMC_ARG_COUNT];
        x[0] = fid.raw() as u64;
        x[1] = x1;
        x[2] = x2;
        Self { x }
    }

    /// Function id in `x0`. The upper half of the register is ignored.
    #[inline]
    pub const fn fid(&self) -> FunctionId {
        FunctionId::from_raw(self.x[0] as u32)
    }

    /// Argument register `n`, or 0 past the end.
    #[inline]
    pub fn arg(&self, n: usize) -> u64 {
        self.x.get(n).copied().unwrap_or(0)
    }
}

/// Result registers `x0..x3` handed back to the caller.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmcReturn {
    pub x: [u64; SMC_RESULT_COUNT],
}

impl SmcReturn {
    pub const fn new(x: [u64; SMC_RESULT_COUNT]) -> Self {
        Self { x }
    }

    /// Status only.
    pub const fn status(code: u64) -> Self {
        Self::new([code, 0, 0, 0])
    }

    /// Status word in `x0`.
    #[inline]
    pub const fn code(&self) -> u64 {
        self.x[0]
    }

    /// First value word in `x1`.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.x[1]
    }
}

impl From<[u64; SMC_RESULT_COUNT]> for SmcReturn {
    fn from(x: [u64; SMC_RESULT_COUNT]) -> Self {
        Self::new(x)
    }
}
