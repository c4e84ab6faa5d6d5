//! Platform Configuration
//!
//! Compile-time constants for the QEMU virt platform, plus the few knobs a
//! dispatcher is built with.

use log::LevelFilter;

/// Cores on the platform. Each gets its own execution context.
pub const PLATFORM_CORE_COUNT: usize = 4;

/// Core that performs the cold boot.
pub const PRIMARY_CORE: usize = 0;

/// Secure physical timer interrupt (PPI 29) owned by the payload.
pub const TSP_IRQ_SEC_PHY_TIMER: u32 = 29;

/// Dispatcher/payload configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TspConfig {
    /// Core brought up by `Dispatcher::boot`
    pub primary_core: usize,
    /// Interrupt id of the payload's secure timer
    pub timer_intid: u32,
    /// Maximum level passed to the logger
    pub log_level: LevelFilter,
}

impl TspConfig {
    pub const DEFAULT: Self = Self {
        primary_core: PRIMARY_CORE,
        timer_intid: TSP_IRQ_SEC_PHY_TIMER,
        log_level: LevelFilter::Info,
    };
}

impl Default for TspConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
