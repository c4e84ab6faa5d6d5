//! SMC Function Identifiers
//!
//! The 32-bit identifier namespace shared by the normal world, the secure
//! monitor and the payload.
//!
//! # Layout
//! ```text
//! 31   30   29        24 23        16 15                 0
//! ┌────┬────┬────────────┬────────────┬────────────────────┐
//! │FAST│ 64 │    OEN     │  reserved  │    bare number     │
//! └────┴────┴────────────┴────────────┴────────────────────┘
//! ```
//! - FAST: set for fast (atomic) calls, clear for yielding calls
//! - 64: SMC64 calling convention
//! - OEN: owning entity number (50 = payload range, 63 = Trusted OS standard)

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Call-type bits at the top of a function identifier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FidFlags: u32 {
        /// Fast call. Clear for yielding calls.
        const FAST = 1 << 31;
        /// SMC64 calling convention.
        const SMC64 = 1 << 30;
    }
}

/// Mask of the bare service number.
pub const BARE_MASK: u32 = 0xFFFF;

/// Shift of the owning entity number.
pub const OEN_SHIFT: u32 = 24;

/// Width mask of the owning entity number.
pub const OEN_MASK: u32 = 0x3F;

/// Prefix of every payload service identifier (SMC64, OEN 50).
pub const TSP_CALL_PREFIX: u32 = 0x7200_0000;

/// Whether a call may be preempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    /// Atomic, runs with secure interrupts masked.
    Fast,
    /// Preemptible, may be resumed or aborted later.
    Yield,
}

/// A 32-bit SMC function identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FunctionId(u32);

impl FunctionId {
    /// Wrap a raw identifier.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Identifier as passed in `x0`.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Bare 16-bit service number.
    #[inline]
    pub const fn bare(self) -> u16 {
        (self.0 & BARE_MASK) as u16
    }

    /// Call-type bits.
    #[inline]
    pub const fn flags(self) -> FidFlags {
        FidFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub const fn is_fast(self) -> bool {
        self.0 & FidFlags::FAST.bits() != 0
    }

    #[inline]
    pub const fn is_yielding(self) -> bool {
        !self.is_fast()
    }

    #[inline]
    pub const fn is_smc64(self) -> bool {
        self.0 & FidFlags::SMC64.bits() != 0
    }

    /// Owning entity number.
    #[inline]
    pub const fn oen(self) -> u8 {
        ((self.0 >> OEN_SHIFT) & OEN_MASK) as u8
    }

    #[inline]
    pub const fn call_type(self) -> CallType {
        if self.is_fast() {
            CallType::Fast
        } else {
            CallType::Yield
        }
    }

    /// True if the identifier lies in the payload service range, whatever
    /// its call type.
    #[inline]
    pub const fn in_tsp_range(self) -> bool {
        self.0 & !(FidFlags::FAST.bits() | BARE_MASK) == TSP_CALL_PREFIX
    }
}

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({:#010x})", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<FunctionId> for u32 {
    fn from(fid: FunctionId) -> u32 {
        fid.0
    }
}

/// Yielding-call identifier for a bare service number.
#[inline]
pub const fn yield_fid(bare: u16) -> FunctionId {
    FunctionId(bare as u32 | TSP_CALL_PREFIX)
}

/// Fast-call identifier for a bare service number.
#[inline]
pub const fn fast_fid(bare: u16) -> FunctionId {
    FunctionId(bare as u32 | TSP_CALL_PREFIX | FidFlags::FAST.bits())
}

/// Recover the bare service number of any identifier.
#[inline]
pub const fn bare(fid: FunctionId) -> u16 {
    fid.bare()
}

// Payload services
pub const TSP_ADD: u16 = 0x2000;
pub const TSP_SUB: u16 = 0x2001;
pub const TSP_MUL: u16 = 0x2002;
pub const TSP_DIV: u16 = 0x2003;
pub const TSP_HANDLE_SEL1_INTR_AND_RETURN: u16 = 0x2004;

/// Resume a previously preempted yielding call. `x1` carries the preempted id.
pub const TSP_FID_RESUME: FunctionId = yield_fid(0x3000);

/// Abort a previously preempted yielding call. Fast, so the payload abort
/// handler need not be reentrant.
pub const TSP_FID_ABORT: FunctionId = fast_fid(0x3001);

/// Issued by the payload to fetch the arguments stashed by the monitor.
pub const TSP_GET_ARGS: FunctionId = FunctionId(0xF200_1000);

/// Number of function ids offered to normal-world clients.
pub const TSP_NUM_FID: u32 = 0x5;

pub const TSP_VERSION_MAJOR: u32 = 0x0;
pub const TSP_VERSION_MINOR: u32 = 0x1;

// Trusted OS standard calls
pub const TOS_CALL_COUNT: FunctionId = FunctionId(0xBF00_FF00);
pub const TOS_UID: FunctionId = FunctionId(0xBF00_FF01);
/// Reserved by the calling convention. Never accepted.
pub const TOS_RESERVED: FunctionId = FunctionId(0xBF00_FF02);
pub const TOS_CALL_VERSION: FunctionId = FunctionId(0xBF00_FF03);

/// Payload UID `a056305b-9132-7b42-9811-7168ca50f3fa` as returned in
/// `x0..x3` (little-endian words).
pub const TSP_UID: [u32; 4] = [0xa056_305b, 0x7b42_9132, 0x6871_1198, 0xfaf3_50ca];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_bare_numbers() {
        for n in 0..=0xFFFFu16 {
            assert_eq!(bare(fast_fid(n)), n);
            assert_eq!(bare(yield_fid(n)), n);
            assert_ne!(fast_fid(n), yield_fid(n));
        }
    }

    #[test]
    fn test_wire_layout() {
        assert_eq!(yield_fid(TSP_ADD).raw(), 0x7200_2000);
        assert_eq!(fast_fid(TSP_ADD).raw(), 0xF200_2000);
        assert_eq!(TSP_FID_RESUME.raw(), 0x7200_3000);
        assert_eq!(TSP_FID_ABORT.raw(), 0xF200_3001);
    }

    #[test]
    fn test_call_type_bits() {
        let fid = fast_fid(TSP_MUL);
        assert!(fid.is_fast());
        assert!(fid.is_smc64());
        assert_eq!(fid.flags(), FidFlags::FAST | FidFlags::SMC64);
        assert_eq!(fid.call_type(), CallType::Fast);
        assert_eq!(yield_fid(TSP_MUL).call_type(), CallType::Yield);
        assert_eq!(fid.oen(), 50);
        assert_eq!(TOS_CALL_COUNT.oen(), 63);
        assert!(!TOS_CALL_COUNT.is_smc64());
    }

    #[test]
    fn test_meta_numbers_disjoint_from_services() {
        let services = [
            TSP_ADD,
            TSP_SUB,
            TSP_MUL,
            TSP_DIV,
            TSP_HANDLE_SEL1_INTR_AND_RETURN,
            TSP_FID_RESUME.bare(),
            TSP_FID_ABORT.bare(),
        ];
        for meta in [TOS_CALL_COUNT, TOS_UID, TOS_RESERVED, TOS_CALL_VERSION] {
            assert!(!services.contains(&meta.bare()));
            assert!(!meta.in_tsp_range());
        }
    }

    #[test]
    fn test_uid_words_match_uuid_bytes() {
        let bytes: [u8; 16] = [
            0x5b, 0x30, 0x56, 0xa0, 0x32, 0x91, 0x42, 0x7b, 0x98, 0x11, 0x71, 0x68, 0xca, 0x50,
            0xf3, 0xfa,
        ];
        for (i, word) in TSP_UID.iter().enumerate() {
            let le = u32::from_le_bytes([
                bytes[i * 4],
                bytes[i * 4 + 1],
                bytes[i * 4 + 2],
                bytes[i * 4 + 3],
            ]);
            assert_eq!(*word, le);
        }
    }
}
