//! Per-Core Execution Context
//!
//! Each physical core owns one `CpuContext`: its own state machine, power
//! state, secure interrupt line and payload bookkeeping. Contexts share
//! nothing, so no locking is needed between cores.

use crate::config::TspConfig;
use crate::error::ProtocolViolation;
use crate::machine::{DispatchMachine, StateKind};
use crate::security::Zeroize;
use crate::smc::args::{SmcArgs, SMC_ARG_COUNT};
use crate::tsp::{TimerState, TspStats};

/// Power state of a core as tracked by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    On,
    Suspended,
}

/// Register context saved when a yielding call is preempted.
///
/// Opaque to the state machine. Zeroed when resumed or discarded.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub struct SavedContext {
    /// Argument registers x0-x7 of the interrupted call
    gpr: [u64; SMC_ARG_COUNT],
}

impl SavedContext {
    /// Capture the registers of the interrupted call.
    pub fn capture(args: &SmcArgs) -> Self {
        Self { gpr: args.x }
    }

    /// Registers to re-enter the call with.
    pub fn restore(&self) -> SmcArgs {
        SmcArgs { x: self.gpr }
    }
}

impl Zeroize for SavedContext {
    fn zeroize(&mut self) {
        self.gpr.zeroize();
    }
}

/// The secure interrupt line of one core.
///
/// Level triggered: raising it again while pending has no effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SecureInterruptLine {
    pending: Option<u32>,
}

impl SecureInterruptLine {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    pub fn raise(&mut self, intid: u32) {
        if self.pending.is_none() {
            self.pending = Some(intid);
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending interrupt id, clearing the line.
    pub fn acknowledge(&mut self) -> Option<u32> {
        self.pending.take()
    }
}

/// Everything one core needs to run the payload.
#[derive(Debug)]
pub struct CpuContext {
    core: usize,
    pub(crate) machine: DispatchMachine,
    power: PowerState,
    pub(crate) line: SecureInterruptLine,
    /// Arguments stashed by the dispatcher, fetched with `TSP_GET_ARGS`
    ns_args: SmcArgs,
    pub(crate) stats: TspStats,
    pub(crate) timer: TimerState,
    timer_intid: u32,
}

impl CpuContext {
    /// A powered-off core.
    pub fn new(core: usize, config: &TspConfig) -> Self {
        Self {
            core,
            machine: DispatchMachine::new(),
            power: PowerState::Off,
            line: SecureInterruptLine::new(),
            ns_args: SmcArgs::default(),
            stats: TspStats::default(),
            timer: TimerState::Stopped,
            timer_intid: config.timer_intid,
        }
    }

    #[inline]
    pub fn core(&self) -> usize {
        self.core
    }

    #[inline]
    pub fn machine(&self) -> &DispatchMachine {
        &self.machine
    }

    #[inline]
    pub fn state(&self) -> StateKind {
        self.machine.kind()
    }

    #[inline]
    pub fn power(&self) -> PowerState {
        self.power
    }

    #[inline]
    pub fn stats(&self) -> &TspStats {
        &self.stats
    }

    #[inline]
    pub fn timer(&self) -> TimerState {
        self.timer
    }

    /// Interrupt id of the payload's secure timer.
    #[inline]
    pub fn timer_intid(&self) -> u32 {
        self.timer_intid
    }

    #[inline]
    pub fn interrupt_pending(&self) -> bool {
        self.line.is_pending()
    }

    pub(crate) fn set_power(&mut self, power: PowerState) {
        self.power = power;
    }

    pub(crate) fn require_power(&self, expected: PowerState) -> Result<(), ProtocolViolation> {
        if self.power != expected {
            return Err(ProtocolViolation::PowerState {
                core: self.core,
                expected,
                actual: self.power,
            });
        }
        Ok(())
    }

    pub(crate) fn stash_args(&mut self, args: &SmcArgs) {
        self.ns_args = *args;
    }

    /// `TSP_GET_ARGS`: the operands of the call being served.
    pub fn get_args(&self) -> SmcArgs {
        self.ns_args
    }

    /// A point where the payload runs with secure interrupts unmasked.
    /// True if a pending interrupt must preempt the current call.
    ///
    /// The payload only unmasks before it computes a result, so once a
    /// result exists the call always completes first.
    pub fn preemption_point(&self) -> bool {
        self.line.is_pending() && self.machine.preempts(false)
    }
}
