//! Secure Interrupt Handling
//!
//! The payload owns the secure physical timer. Any other secure interrupt
//! is spurious: it is acknowledged and logged, and control still returns to
//! the dispatcher with `HandledSecureInterrupt`.

use log::{debug, warn};

use crate::completion::{Completion, EntryReturn};
use crate::context::{CpuContext, SavedContext};
use crate::error::ProtocolViolation;
use crate::machine::Interrupt;
use crate::smc::args::SmcArgs;

use super::TimerState;

/// Service whatever is pending on the line. Returns the interrupt id.
pub(super) fn handle_pending(ctx: &mut CpuContext) -> Option<u32> {
    let intid = ctx.line.acknowledge()?;
    ctx.stats.sel1_intr_count += 1;

    if intid == ctx.timer_intid() {
        // Re-arm for the next period
        ctx.timer = TimerState::Running;
        debug!("[TSP] cpu {}: secure timer interrupt", ctx.core());
    } else {
        warn!("[TSP] cpu {}: spurious secure interrupt {}", ctx.core(), intid);
    }
    Some(intid)
}

/// Secure interrupt entry.
///
/// `args` is the register set of the interrupted call. If a yielding call
/// is running it is saved so the call can be resumed later. The dispatcher
/// only enters here from a preemption point, so no result exists yet.
pub(super) fn sel1_intr_entry(
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    match ctx.machine.secure_interrupt(false, || SavedContext::capture(args))? {
        Interrupt::Preempted => {
            ctx.stats.preempt_count += 1;
            debug!("[TSP] cpu {}: {} preempted", ctx.core(), args.fid());
        }
        Interrupt::HandleNow => {}
        // Masked: the dispatcher must not deliver now
        Interrupt::Deferred | Interrupt::CompletionWins => {
            return Err(ProtocolViolation::NotPreemptible(args.fid()));
        }
    }

    if handle_pending(ctx).is_none() {
        warn!("[TSP] cpu {}: secure interrupt entry with no interrupt pending", ctx.core());
    }

    Ok(EntryReturn::signal(Completion::HandledSecureInterrupt))
}
