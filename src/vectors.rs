//! Entry Vector Table
//!
//! The ten entry points the dispatcher may jump to, one per lifecycle event
//! plus fast/yielding dispatch, secure interrupt and abort.
//!
//! # Construction
//! - `VectorTableBuilder` accepts each slot exactly once
//! - `build()` fails if any slot is missing
//! - `EntryVectors` holds plain function pointers, so an unset slot cannot
//!   be reached once the table exists

use crate::completion::EntryReturn;
use crate::context::CpuContext;
use crate::error::{ProtocolViolation, SetupError};
use crate::smc::args::SmcArgs;

/// Calling convention shared by every slot: the dispatcher's argument set
/// in, one completion signal plus up to four result words out.
pub type EntryFn = fn(&mut CpuContext, &SmcArgs) -> Result<EntryReturn, ProtocolViolation>;

/// Names of the vector slots, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Slot {
    YieldSmc = 0,
    FastSmc = 1,
    CpuOn = 2,
    CpuOff = 3,
    CpuResume = 4,
    CpuSuspend = 5,
    Sel1Intr = 6,
    SystemOff = 7,
    SystemReset = 8,
    AbortYieldSmc = 9,
}

impl Slot {
    pub const COUNT: usize = 10;

    pub const ALL: [Slot; Slot::COUNT] = [
        Slot::YieldSmc,
        Slot::FastSmc,
        Slot::CpuOn,
        Slot::CpuOff,
        Slot::CpuResume,
        Slot::CpuSuspend,
        Slot::Sel1Intr,
        Slot::SystemOff,
        Slot::SystemReset,
        Slot::AbortYieldSmc,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Slot::YieldSmc => "yield_smc_entry",
            Slot::FastSmc => "fast_smc_entry",
            Slot::CpuOn => "cpu_on_entry",
            Slot::CpuOff => "cpu_off_entry",
            Slot::CpuResume => "cpu_resume_entry",
            Slot::CpuSuspend => "cpu_suspend_entry",
            Slot::Sel1Intr => "sel1_intr_entry",
            Slot::SystemOff => "system_off_entry",
            Slot::SystemReset => "system_reset_entry",
            Slot::AbortYieldSmc => "abort_yield_smc_entry",
        }
    }
}

/// The complete, immutable vector table.
#[derive(Debug, Clone, Copy)]
pub struct EntryVectors {
    pub yield_smc_entry: EntryFn,
    pub fast_smc_entry: EntryFn,
    pub cpu_on_entry: EntryFn,
    pub cpu_off_entry: EntryFn,
    pub cpu_resume_entry: EntryFn,
    pub cpu_suspend_entry: EntryFn,
    pub sel1_intr_entry: EntryFn,
    pub system_off_entry: EntryFn,
    pub system_reset_entry: EntryFn,
    pub abort_yield_smc_entry: EntryFn,
}

impl EntryVectors {
    /// Entry point for a slot.
    pub fn entry(&self, slot: Slot) -> EntryFn {
        match slot {
            Slot::YieldSmc => self.yield_smc_entry,
            Slot::FastSmc => self.fast_smc_entry,
            Slot::CpuOn => self.cpu_on_entry,
            Slot::CpuOff => self.cpu_off_entry,
            Slot::CpuResume => self.cpu_resume_entry,
            Slot::CpuSuspend => self.cpu_suspend_entry,
            Slot::Sel1Intr => self.sel1_intr_entry,
            Slot::SystemOff => self.system_off_entry,
            Slot::SystemReset => self.system_reset_entry,
            Slot::AbortYieldSmc => self.abort_yield_smc_entry,
        }
    }
}

/// Collects slots during payload initialization.
#[derive(Debug, Default)]
pub struct VectorTableBuilder {
    slots: [Option<EntryFn>; Slot::COUNT],
}

impl VectorTableBuilder {
    pub const fn new() -> Self {
        Self {
            slots: [None; Slot::COUNT],
        }
    }

    /// Install a slot. Each slot may be installed once.
    pub fn install(&mut self, slot: Slot, entry: EntryFn) -> Result<&mut Self, SetupError> {
        let cell = &mut self.slots[slot.index()];
        if cell.is_some() {
            return Err(SetupError::SlotAlreadySet(slot));
        }
        *cell = Some(entry);
        Ok(self)
    }

    /// First slot still unset, in table order.
    pub fn missing(&self) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|slot| self.slots[slot.index()].is_none())
    }

    /// Freeze the table.
    ///
    /// # Errors
    /// `MissingSlot` naming the first unset slot.
    pub fn build(&self) -> Result<EntryVectors, SetupError> {
        let get = |slot: Slot| self.slots[slot.index()].ok_or(SetupError::MissingSlot(slot));
        Ok(EntryVectors {
            yield_smc_entry: get(Slot::YieldSmc)?,
            fast_smc_entry: get(Slot::FastSmc)?,
            cpu_on_entry: get(Slot::CpuOn)?,
            cpu_off_entry: get(Slot::CpuOff)?,
            cpu_resume_entry: get(Slot::CpuResume)?,
            cpu_suspend_entry: get(Slot::CpuSuspend)?,
            sel1_intr_entry: get(Slot::Sel1Intr)?,
            system_off_entry: get(Slot::SystemOff)?,
            system_reset_entry: get(Slot::SystemReset)?,
            abort_yield_smc_entry: get(Slot::AbortYieldSmc)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Completion;

    fn done(_: &mut CpuContext, _: &SmcArgs) -> Result<EntryReturn, ProtocolViolation> {
        Ok(EntryReturn::signal(Completion::OnDone))
    }

    fn full() -> VectorTableBuilder {
        let mut builder = VectorTableBuilder::new();
        for slot in Slot::ALL {
            builder.install(slot, done).unwrap();
        }
        builder
    }

    #[test]
    fn test_complete_table_builds() {
        let builder = full();
        assert_eq!(builder.missing(), None);
        let vectors = builder.build().unwrap();
        let mut ctx = CpuContext::new(0, &crate::config::TspConfig::DEFAULT);
        for slot in Slot::ALL {
            let ret = (vectors.entry(slot))(&mut ctx, &SmcArgs::default()).unwrap();
            assert_eq!(ret, EntryReturn::signal(Completion::OnDone));
        }
    }

    #[test]
    fn test_any_missing_slot_rejected() {
        for skipped in Slot::ALL {
            let mut builder = VectorTableBuilder::new();
            for slot in Slot::ALL.into_iter().filter(|s| *s != skipped) {
                builder.install(slot, done).unwrap();
            }
            assert_eq!(builder.missing(), Some(skipped));
            assert_eq!(
                builder.build().err(),
                Some(SetupError::MissingSlot(skipped))
            );
        }
    }

    #[test]
    fn test_slot_installed_once() {
        let mut builder = full();
        assert_eq!(
            builder.install(Slot::Sel1Intr, done).err(),
            Some(SetupError::SlotAlreadySet(Slot::Sel1Intr))
        );
    }

    #[test]
    fn test_slot_order_matches_table() {
        for (i, slot) in Slot::ALL.into_iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
        assert_eq!(Slot::AbortYieldSmc.name(), "abort_yield_smc_entry");
    }
}
