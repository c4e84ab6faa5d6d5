//! Secure Payload Dispatcher
//!
//! The monitor-side collaborator: it owns one execution context per core,
//! routes normal-world SMCs to the payload's vector table, answers the
//! Trusted OS meta-calls itself and drives every lifecycle transition.
//!
//! # Fault Policy
//! Every `ProtocolViolation` returned here is fatal to the caller. No
//! operation is retried.
//!
//! # Power States
//! ```text
//!        boot / cpu_on             cpu_suspend
//!   Off ───────────────▶ On ───────────────────▶ Suspended
//!    ▲                   │  ◀───────────────────
//!    │                   │       cpu_resume
//!    └───────────────────┘
//!   cpu_off / system_off / system_reset
//! ```

mod handler;

use log::{error, info};

use crate::completion::{Completion, EntryReturn, Signal};
use crate::config::{TspConfig, PLATFORM_CORE_COUNT};
use crate::context::{CpuContext, PowerState};
use crate::error::{Fault, ProtocolViolation, SetupError};
use crate::machine::{Lifecycle, Operation, StateKind};
use crate::smc::args::{SmcArgs, SmcReturn};
use crate::tsp;
use crate::vectors::{EntryFn, EntryVectors};

/// What the normal-world caller gets back from one SMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmcOutcome {
    /// Signal that closed the operation; `None` for meta-calls, which never
    /// reach the payload
    pub signal: Option<Signal>,
    /// Registers x0-x3 for the caller
    pub ret: SmcReturn,
}

/// The dispatcher for a platform with `CORES` cores.
#[derive(Debug)]
pub struct Dispatcher<const CORES: usize = PLATFORM_CORE_COUNT> {
    vectors: &'static EntryVectors,
    cores: [CpuContext; CORES],
    config: TspConfig,
}

impl<const CORES: usize> Dispatcher<CORES> {
    /// Run payload setup, then cold-boot the primary core.
    ///
    /// # Errors
    /// Any `Fault` here is fatal; the payload never becomes ready.
    pub fn boot(config: TspConfig) -> Result<Self, Fault> {
        log::set_max_level(config.log_level);
        let vectors = tsp::setup()?;
        Self::with_vectors(vectors, config)
    }

    /// Cold-boot the primary core against an already built vector table.
    pub fn with_vectors(vectors: &'static EntryVectors, config: TspConfig) -> Result<Self, Fault> {
        if config.primary_core >= CORES {
            return Err(SetupError::InvalidPrimaryCore(config.primary_core).into());
        }

        let mut dispatcher = Self {
            vectors,
            cores: core::array::from_fn(|id| CpuContext::new(id, &config)),
            config,
        };

        let ctx = &mut dispatcher.cores[config.primary_core];
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::Boot,
            &SmcArgs::default(),
            PowerState::Off,
            PowerState::On,
        )?;

        info!(
            "[TSPD] Payload ready on cpu {} ({} cores)",
            config.primary_core, CORES
        );
        Ok(dispatcher)
    }

    #[inline]
    pub fn config(&self) -> &TspConfig {
        &self.config
    }

    #[inline]
    pub fn vectors(&self) -> &'static EntryVectors {
        self.vectors
    }

    /// Execution context of a core.
    pub fn context(&self, core: usize) -> Option<&CpuContext> {
        self.cores.get(core)
    }

    fn context_mut(&mut self, core: usize) -> Result<&mut CpuContext, ProtocolViolation> {
        self.cores
            .get_mut(core)
            .ok_or(ProtocolViolation::InvalidCore(core))
    }

    /// Bring a secondary core up.
    pub fn cpu_on(&mut self, core: usize) -> Result<Completion, ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::CpuOn,
            &SmcArgs::default(),
            PowerState::Off,
            PowerState::On,
        )
    }

    pub fn cpu_off(&mut self, core: usize) -> Result<Completion, ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::CpuOff,
            &SmcArgs::default(),
            PowerState::On,
            PowerState::Off,
        )
    }

    pub fn cpu_suspend(
        &mut self,
        core: usize,
        max_off_pwrlvl: u64,
    ) -> Result<Completion, ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::CpuSuspend,
            &power_level_args(max_off_pwrlvl),
            PowerState::On,
            PowerState::Suspended,
        )
    }

    pub fn cpu_resume(
        &mut self,
        core: usize,
        max_off_pwrlvl: u64,
    ) -> Result<Completion, ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::CpuResume,
            &power_level_args(max_off_pwrlvl),
            PowerState::Suspended,
            PowerState::On,
        )
    }

    pub fn system_off(&mut self, core: usize) -> Result<Completion, ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::SystemOff,
            &SmcArgs::default(),
            PowerState::On,
            PowerState::Off,
        )
    }

    pub fn system_reset(&mut self, core: usize) -> Result<Completion, ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        run_lifecycle(
            vectors,
            ctx,
            Lifecycle::SystemReset,
            &SmcArgs::default(),
            PowerState::On,
            PowerState::Off,
        )
    }
}

fn power_level_args(max_off_pwrlvl: u64) -> SmcArgs {
    let mut args = SmcArgs::default();
    args.x[1] = max_off_pwrlvl;
    args
}

/// Drive one lifecycle transition through the state machine.
///
/// A secure interrupt still pending on a running core is taken before the
/// core leaves `On`, and again once it is back `On`, so none survives a
/// power transition.
fn run_lifecycle(
    vectors: &EntryVectors,
    ctx: &mut CpuContext,
    lifecycle: Lifecycle,
    args: &SmcArgs,
    from: PowerState,
    to: PowerState,
) -> Result<Completion, ProtocolViolation> {
    ctx.require_power(from)?;
    if from == PowerState::On {
        drain(vectors, ctx)?;
    }
    ctx.machine.dispatch(Operation::Lifecycle(lifecycle))?;

    let entry = match lifecycle {
        Lifecycle::Boot => tsp::cold_boot as EntryFn,
        Lifecycle::CpuOn => vectors.cpu_on_entry,
        Lifecycle::CpuOff => vectors.cpu_off_entry,
        Lifecycle::CpuSuspend => vectors.cpu_suspend_entry,
        Lifecycle::CpuResume => vectors.cpu_resume_entry,
        Lifecycle::SystemOff => vectors.system_off_entry,
        Lifecycle::SystemReset => vectors.system_reset_entry,
    };
    let ret = entry(ctx, args)?;
    if let Err(e) = ctx.machine.finish(ret.signal) {
        error!("[TSPD] cpu {}: {:?} failed: {}", ctx.core(), lifecycle, e);
        return Err(e);
    }
    ctx.machine.acknowledge()?;

    ctx.set_power(to);
    if to == PowerState::On {
        drain(vectors, ctx)?;
    }
    Ok(lifecycle.completion())
}

/// Deliver an interrupt that stayed masked while the context was busy.
/// A preempted call keeps it pending until it is resumed or aborted.
fn drain(vectors: &EntryVectors, ctx: &mut CpuContext) -> Result<(), ProtocolViolation> {
    if ctx.interrupt_pending() && ctx.state() == StateKind::Idle {
        let ret = (vectors.sel1_intr_entry)(ctx, &SmcArgs::default())?;
        expect_signal(&ret, Completion::HandledSecureInterrupt)?;
    }
    Ok(())
}

/// Check the payload closed an operation with `expected`.
fn expect_signal(ret: &EntryReturn, expected: Completion) -> Result<(), ProtocolViolation> {
    let expected = Signal::Completion(expected);
    if ret.signal != expected {
        return Err(ProtocolViolation::UnexpectedSignal {
            expected,
            actual: ret.signal,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smc::args::SMC_OK;
    use crate::smc::fid::{yield_fid, TSP_ADD};
    use crate::tsp::TimerState;
    use crate::vectors::{Slot, VectorTableBuilder};

    type TestDispatcher = Dispatcher<2>;

    #[test]
    fn test_boot_brings_primary_core_on() {
        let d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        let primary = d.context(0).unwrap();
        assert_eq!(primary.power(), PowerState::On);
        assert_eq!(primary.state(), StateKind::Idle);
        assert_eq!(primary.timer(), TimerState::Running);
        assert_eq!(d.context(1).unwrap().power(), PowerState::Off);
        assert!(d.context(2).is_none());
    }

    #[test]
    fn test_boot_rejects_missing_primary_core() {
        let config = TspConfig {
            primary_core: 5,
            ..TspConfig::DEFAULT
        };
        assert_eq!(
            TestDispatcher::boot(config).err(),
            Some(Fault::Setup(SetupError::InvalidPrimaryCore(5)))
        );
    }

    #[test]
    fn test_incomplete_table_never_reaches_dispatch() {
        let mut builder = VectorTableBuilder::new();
        let vectors = tsp::setup().unwrap();
        for slot in Slot::ALL.into_iter().filter(|s| *s != Slot::AbortYieldSmc) {
            builder.install(slot, vectors.entry(slot)).unwrap();
        }
        assert_eq!(
            builder.build().err(),
            Some(SetupError::MissingSlot(Slot::AbortYieldSmc))
        );
    }

    #[test]
    fn test_secondary_lifecycle() {
        let mut d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        assert_eq!(d.cpu_on(1), Ok(Completion::OnDone));
        assert_eq!(d.context(1).unwrap().power(), PowerState::On);

        assert_eq!(d.cpu_suspend(1, 1), Ok(Completion::SuspendDone));
        assert_eq!(d.context(1).unwrap().power(), PowerState::Suspended);
        assert_eq!(d.context(1).unwrap().timer(), TimerState::Saved);

        assert_eq!(d.cpu_resume(1, 1), Ok(Completion::ResumeDone));
        assert_eq!(d.context(1).unwrap().timer(), TimerState::Running);

        assert_eq!(d.cpu_off(1), Ok(Completion::OffDone));
        let ctx = d.context(1).unwrap();
        assert_eq!(ctx.power(), PowerState::Off);
        assert_eq!(ctx.stats().cpu_on_count, 1);
        assert_eq!(ctx.stats().cpu_off_count, 1);
        assert_eq!(ctx.stats().cpu_suspend_count, 1);
        assert_eq!(ctx.stats().cpu_resume_count, 1);
    }

    #[test]
    fn test_lifecycle_power_state_enforced() {
        let mut d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        assert_eq!(
            d.cpu_on(0),
            Err(ProtocolViolation::PowerState {
                core: 0,
                expected: PowerState::Off,
                actual: PowerState::On,
            })
        );
        assert_eq!(
            d.cpu_resume(0, 0),
            Err(ProtocolViolation::PowerState {
                core: 0,
                expected: PowerState::Suspended,
                actual: PowerState::On,
            })
        );
        assert_eq!(d.cpu_off(7), Err(ProtocolViolation::InvalidCore(7)));
    }

    #[test]
    fn test_system_off_and_reset() {
        let mut d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        d.cpu_on(1).unwrap();
        assert_eq!(d.system_off(0), Ok(Completion::SystemOffDone));
        assert_eq!(d.system_reset(1), Ok(Completion::SystemResetDone));
        assert_eq!(d.context(0).unwrap().power(), PowerState::Off);
        assert_eq!(d.context(1).unwrap().timer(), TimerState::Stopped);
    }

    #[test]
    fn test_boot_applies_log_level() {
        TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        assert_eq!(log::max_level(), TspConfig::DEFAULT.log_level);
    }

    #[test]
    fn test_pending_interrupt_does_not_survive_cpu_off() {
        let mut d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        d.cpu_on(1).unwrap();
        d.pend_secure_interrupt(1, 29).unwrap();
        d.cpu_off(1).unwrap();

        let ctx = d.context(1).unwrap();
        assert!(!ctx.interrupt_pending());
        assert_eq!(ctx.stats().sel1_intr_count, 1);
        assert_eq!(ctx.timer(), TimerState::Stopped);

        d.cpu_on(1).unwrap();
        let fid = yield_fid(TSP_ADD);
        let out = d.smc(1, &SmcArgs::new(fid, 2, 3)).unwrap();
        assert_eq!(out.signal, Some(Signal::ServiceDone(fid)));
        assert_eq!(out.ret, SmcReturn::new([SMC_OK, 5, 0, 0]));
        assert_eq!(d.context(1).unwrap().state(), StateKind::Idle);
    }

    #[test]
    fn test_pending_interrupt_taken_before_suspend() {
        let mut d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        d.pend_secure_interrupt(0, 29).unwrap();
        d.cpu_suspend(0, 0).unwrap();

        let ctx = d.context(0).unwrap();
        assert!(!ctx.interrupt_pending());
        assert_eq!(ctx.stats().sel1_intr_count, 1);
        assert_eq!(ctx.timer(), TimerState::Saved);

        d.cpu_resume(0, 0).unwrap();
        let ctx = d.context(0).unwrap();
        assert!(!ctx.interrupt_pending());
        assert_eq!(ctx.stats().sel1_intr_count, 1);
        assert_eq!(ctx.timer(), TimerState::Running);
    }

    #[test]
    fn test_preempted_call_keeps_interrupt_and_blocks_cpu_off() {
        let mut d = TestDispatcher::boot(TspConfig::DEFAULT).unwrap();
        d.pend_secure_interrupt(0, 29).unwrap();
        d.smc(0, &SmcArgs::new(yield_fid(TSP_ADD), 2, 3)).unwrap();
        d.pend_secure_interrupt(0, 29).unwrap();

        assert_eq!(
            d.cpu_off(0),
            Err(ProtocolViolation::NotIdle(StateKind::Preempted))
        );
        assert!(d.context(0).unwrap().interrupt_pending());
        assert_eq!(d.context(0).unwrap().power(), PowerState::On);
    }
}
