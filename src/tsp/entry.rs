//! Payload Entry Points
//!
//! Every function here is installed in the vector table (or, for
//! `cold_boot`, run once by the dispatcher). Each closes its operation with
//! exactly one signal.
//!
//! # Security Considerations
//! - Function ids are re-validated even though the dispatcher classified
//!   them already
//! - A yielding call only yields at its preemption point, before a result
//!   exists; once the result is computed a racing interrupt waits

use log::{debug, info};

use crate::completion::{Completion, EntryReturn};
use crate::context::CpuContext;
use crate::error::ProtocolViolation;
use crate::smc::args::SmcArgs;
use crate::smc::call::{Call, Service};
use crate::smc::fid::CallType;

use super::{service, TimerState};

/// Cold boot of the primary core.
pub fn cold_boot(ctx: &mut CpuContext, _args: &SmcArgs) -> Result<EntryReturn, ProtocolViolation> {
    ctx.timer = TimerState::Running;
    info!("[TSP] cpu {}: cold boot complete", ctx.core());
    Ok(EntryReturn::signal(Completion::EntryDone))
}

pub(super) fn yield_smc_entry(
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    smc_handler(ctx, args, CallType::Yield)
}

pub(super) fn fast_smc_entry(
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    smc_handler(ctx, args, CallType::Fast)
}

/// Serve one service call.
///
/// # Returns
/// - `ServiceDone(fid)` with the result words
/// - `Preempted` if a secure interrupt is pending at the preemption point
fn smc_handler(
    ctx: &mut CpuContext,
    args: &SmcArgs,
    expected: CallType,
) -> Result<EntryReturn, ProtocolViolation> {
    let fid = args.fid();
    let service = match Call::classify(fid)? {
        Call::Service { service, call_type } if call_type == expected => service,
        _ => return Err(ProtocolViolation::UnknownFunction(fid)),
    };

    ctx.stats.smc_count += 1;

    // TSP_GET_ARGS
    let operands = ctx.get_args();

    // Interrupts unmasked, before any result exists. The in-line handler
    // service consumes the interrupt itself instead of yielding to it.
    if service != Service::HandleSel1IntrAndReturn && ctx.preemption_point() {
        debug!("[TSP] cpu {}: {} yielding to secure interrupt", ctx.core(), fid);
        return Ok(EntryReturn::signal(Completion::Preempted));
    }

    let results = service::execute(ctx, service, &operands);

    ctx.stats.eret_count += 1;
    Ok(EntryReturn::service(fid, results))
}

pub(super) fn cpu_on_entry(
    ctx: &mut CpuContext,
    _args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    ctx.stats.cpu_on_count += 1;
    ctx.timer = TimerState::Running;
    info!("[TSP] cpu {}: turned on", ctx.core());
    Ok(EntryReturn::signal(Completion::OnDone))
}

pub(super) fn cpu_off_entry(
    ctx: &mut CpuContext,
    _args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    ctx.stats.cpu_off_count += 1;
    ctx.timer = TimerState::Stopped;
    info!("[TSP] cpu {}: off requested", ctx.core());
    ctx.stats.report(ctx.core());
    Ok(EntryReturn::signal(Completion::OffDone))
}

/// `x1` carries the deepest power level being turned off.
pub(super) fn cpu_suspend_entry(
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    ctx.stats.cpu_suspend_count += 1;
    if ctx.timer == TimerState::Running {
        ctx.timer = TimerState::Saved;
    }
    info!(
        "[TSP] cpu {}: suspend requested (max off power level {})",
        ctx.core(),
        args.arg(1)
    );
    Ok(EntryReturn::signal(Completion::SuspendDone))
}

/// `x1` carries the deepest power level that was turned off.
pub(super) fn cpu_resume_entry(
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    ctx.stats.cpu_resume_count += 1;
    if ctx.timer == TimerState::Saved {
        ctx.timer = TimerState::Running;
    }
    info!(
        "[TSP] cpu {}: resumed (max off power level {})",
        ctx.core(),
        args.arg(1)
    );
    Ok(EntryReturn::signal(Completion::ResumeDone))
}

pub(super) fn system_off_entry(
    ctx: &mut CpuContext,
    _args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    ctx.timer = TimerState::Stopped;
    info!("[TSP] cpu {}: system off requested", ctx.core());
    ctx.stats.report(ctx.core());
    Ok(EntryReturn::signal(Completion::SystemOffDone))
}

pub(super) fn system_reset_entry(
    ctx: &mut CpuContext,
    _args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    ctx.timer = TimerState::Stopped;
    info!("[TSP] cpu {}: system reset requested", ctx.core());
    ctx.stats.report(ctx.core());
    Ok(EntryReturn::signal(Completion::SystemResetDone))
}

/// Discard the preempted yielding call. Runs as a fast call, never
/// preempted itself.
pub(super) fn abort_yield_smc_entry(
    ctx: &mut CpuContext,
    _args: &SmcArgs,
) -> Result<EntryReturn, ProtocolViolation> {
    let fid = ctx.machine.abort()?;
    ctx.stats.abort_count += 1;
    info!("[TSP] cpu {}: aborted preempted call {}", ctx.core(), fid);
    Ok(EntryReturn::signal(Completion::AbortDone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TspConfig;
    use crate::machine::{Lifecycle, Operation, StateKind};
    use crate::smc::args::SMC_OK;
    use crate::smc::fid::{fast_fid, yield_fid, TSP_ADD, TSP_HANDLE_SEL1_INTR_AND_RETURN, TSP_SUB};

    fn running(args: &SmcArgs) -> CpuContext {
        let mut ctx = CpuContext::new(0, &TspConfig::DEFAULT);
        ctx.machine.dispatch(Operation::Call(args.fid())).unwrap();
        ctx.stash_args(args);
        ctx
    }

    #[test]
    fn test_yield_service_completes() {
        let args = SmcArgs::new(yield_fid(TSP_ADD), 2, 3);
        let mut ctx = running(&args);
        let ret = yield_smc_entry(&mut ctx, &args).unwrap();
        assert_eq!(ret, EntryReturn::service(args.fid(), [SMC_OK, 5, 0, 0]));
        assert_eq!(ctx.stats().smc_count, 1);
        assert_eq!(ctx.stats().eret_count, 1);
    }

    #[test]
    fn test_operands_come_from_get_args() {
        let args = SmcArgs::new(fast_fid(TSP_SUB), 10, 4);
        let mut ctx = running(&args);
        let ret = fast_smc_entry(&mut ctx, &SmcArgs::new(args.fid(), 0, 0)).unwrap();
        assert_eq!(ret.results[1], 6);
    }

    #[test]
    fn test_wrong_slot_rejected() {
        let args = SmcArgs::new(fast_fid(TSP_ADD), 2, 3);
        let mut ctx = running(&args);
        assert_eq!(
            yield_smc_entry(&mut ctx, &args),
            Err(ProtocolViolation::UnknownFunction(args.fid()))
        );
    }

    #[test]
    fn test_yield_service_yields_to_pending_interrupt() {
        let args = SmcArgs::new(yield_fid(TSP_ADD), 2, 3);
        let mut ctx = running(&args);
        ctx.line.raise(ctx.timer_intid());
        let ret = yield_smc_entry(&mut ctx, &args).unwrap();
        assert_eq!(ret, EntryReturn::signal(Completion::Preempted));
        assert_eq!(ctx.stats().eret_count, 0);
        assert!(ctx.interrupt_pending());
    }

    #[test]
    fn test_fast_service_ignores_pending_interrupt() {
        let args = SmcArgs::new(fast_fid(TSP_ADD), 2, 3);
        let mut ctx = running(&args);
        ctx.line.raise(ctx.timer_intid());
        let ret = fast_smc_entry(&mut ctx, &args).unwrap();
        assert_eq!(ret.results, [SMC_OK, 5, 0, 0]);
        assert!(ctx.interrupt_pending());
    }

    #[test]
    fn test_inline_interrupt_service_does_not_yield() {
        let args = SmcArgs::new(yield_fid(TSP_HANDLE_SEL1_INTR_AND_RETURN), 0, 0);
        let mut ctx = running(&args);
        ctx.line.raise(ctx.timer_intid());
        let ret = yield_smc_entry(&mut ctx, &args).unwrap();
        assert_eq!(ret.results, [SMC_OK, 29, 0, 0]);
        assert!(!ctx.interrupt_pending());
    }

    #[test]
    fn test_abort_entry_requires_preempted_call() {
        let mut ctx = CpuContext::new(0, &TspConfig::DEFAULT);
        assert_eq!(
            abort_yield_smc_entry(&mut ctx, &SmcArgs::default()),
            Err(ProtocolViolation::NothingToAbort(StateKind::Idle))
        );
    }

    #[test]
    fn test_timer_across_suspend() {
        let mut ctx = CpuContext::new(0, &TspConfig::DEFAULT);
        ctx.machine
            .dispatch(Operation::Lifecycle(Lifecycle::CpuOn))
            .unwrap();
        cpu_on_entry(&mut ctx, &SmcArgs::default()).unwrap();
        assert_eq!(ctx.timer(), TimerState::Running);
        cpu_suspend_entry(&mut ctx, &SmcArgs::default()).unwrap();
        assert_eq!(ctx.timer(), TimerState::Saved);
        cpu_resume_entry(&mut ctx, &SmcArgs::default()).unwrap();
        assert_eq!(ctx.timer(), TimerState::Running);
        cpu_off_entry(&mut ctx, &SmcArgs::default()).unwrap();
        assert_eq!(ctx.timer(), TimerState::Stopped);
        assert_eq!(ctx.stats().cpu_suspend_count, 1);
        assert_eq!(ctx.stats().cpu_off_count, 1);
    }
}
