//! Test Secure Payload
//!
//! The trusted payload running in the secure world. It offers arithmetic
//! services to normal-world clients and answers every lifecycle event the
//! dispatcher forwards.
//!
//! # Boot Sequence
//! 1. `setup()` installs all ten entry points and publishes the table
//! 2. The dispatcher runs `cold_boot` on the primary core (`EntryDone`)
//! 3. Secondary cores come up through `cpu_on_entry` (`OnDone`)

mod entry;
mod interrupt;
mod service;

use log::info;
use spin::Once;

use crate::error::SetupError;
use crate::vectors::{EntryVectors, Slot, VectorTableBuilder};

pub use entry::cold_boot;

/// The vector table, published once.
static TSP_VECTORS: Once<EntryVectors> = Once::new();

/// Install the payload's entry points.
///
/// Idempotent: later calls return the table built by the first one.
///
/// # Errors
/// `SetupError` if a slot is missing or installed twice. Fatal.
pub fn setup() -> Result<&'static EntryVectors, SetupError> {
    TSP_VECTORS.try_call_once(|| {
        let mut table = VectorTableBuilder::new();
        table
            .install(Slot::YieldSmc, entry::yield_smc_entry)?
            .install(Slot::FastSmc, entry::fast_smc_entry)?
            .install(Slot::CpuOn, entry::cpu_on_entry)?
            .install(Slot::CpuOff, entry::cpu_off_entry)?
            .install(Slot::CpuResume, entry::cpu_resume_entry)?
            .install(Slot::CpuSuspend, entry::cpu_suspend_entry)?
            .install(Slot::Sel1Intr, interrupt::sel1_intr_entry)?
            .install(Slot::SystemOff, entry::system_off_entry)?
            .install(Slot::SystemReset, entry::system_reset_entry)?
            .install(Slot::AbortYieldSmc, entry::abort_yield_smc_entry)?;
        let vectors = table.build()?;
        info!("[TSP] Vector table installed ({} entries)", Slot::COUNT);
        Ok(vectors)
    })
}

/// State of the payload's secure physical timer on one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
    /// Context saved across a suspend
    Saved,
}

/// Per-core payload statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TspStats {
    pub smc_count: u32,
    pub eret_count: u32,
    pub sel1_intr_count: u32,
    pub preempt_count: u32,
    pub abort_count: u32,
    pub cpu_on_count: u32,
    pub cpu_off_count: u32,
    pub cpu_suspend_count: u32,
    pub cpu_resume_count: u32,
}

impl TspStats {
    fn report(&self, core: usize) {
        info!(
            "[TSP] cpu {}: {} smcs, {} erets, {} secure interrupts, {} preempted, {} aborted",
            core,
            self.smc_count,
            self.eret_count,
            self.sel1_intr_count,
            self.preempt_count,
            self.abort_count
        );
        info!(
            "[TSP] cpu {}: {} on, {} off, {} suspend, {} resume requests",
            core,
            self.cpu_on_count,
            self.cpu_off_count,
            self.cpu_suspend_count,
            self.cpu_resume_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Completion, EntryReturn};
    use crate::config::TspConfig;
    use crate::context::CpuContext;
    use crate::smc::args::SmcArgs;

    #[test]
    fn test_setup_populates_every_slot() {
        let vectors = setup().unwrap();
        let again = setup().unwrap();
        assert!(core::ptr::eq(vectors, again));

        let mut ctx = CpuContext::new(0, &TspConfig::DEFAULT);
        let ret = (vectors.entry(Slot::CpuOn))(&mut ctx, &SmcArgs::default()).unwrap();
        assert_eq!(ret, EntryReturn::signal(Completion::OnDone));
    }
}
