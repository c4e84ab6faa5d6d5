//! SMC Handler
//!
//! Routes one normal-world SMC on one core.
//!
//! # Security Considerations
//! - Every identifier is classified against the whitelist before anything
//!   else; the reserved meta-call is rejected in every state
//! - Meta-calls are answered here and never reach the payload
//! - A preempted call can only be resumed by naming it
//! - Secure interrupts still pending after a call are drained before the
//!   normal world runs again

use log::{debug, info, warn};

use crate::completion::{Completion, EntryReturn, Signal};
use crate::context::{CpuContext, PowerState};
use crate::error::ProtocolViolation;
use crate::machine::Operation;
use crate::smc::args::{SmcArgs, SmcReturn, SMC_OK, SMC_PREEMPTED};
use crate::smc::call::{Call, MetaCall};
use crate::smc::fid::{
    CallType, FunctionId, TSP_NUM_FID, TSP_UID, TSP_VERSION_MAJOR, TSP_VERSION_MINOR,
};
use crate::vectors::EntryVectors;

use super::{drain, expect_signal, Dispatcher, SmcOutcome};

impl<const CORES: usize> Dispatcher<CORES> {
    /// Handle an SMC issued by the normal world on `core`.
    ///
    /// # Returns
    /// The closing signal and the words for `x0..x3`. A preempted yielding
    /// call returns `SMC_PREEMPTED` and must be resumed or aborted.
    ///
    /// # Errors
    /// Any `ProtocolViolation` is fatal.
    pub fn smc(&mut self, core: usize, args: &SmcArgs) -> Result<SmcOutcome, ProtocolViolation> {
        let fid = args.fid();
        let call = Call::classify(fid).map_err(|e| {
            warn!("[TSPD] cpu {}: rejected {}: {}", core, fid, e);
            e
        })?;

        match call {
            Call::Meta(meta) => Ok(SmcOutcome {
                signal: None,
                ret: meta_call(meta),
            }),
            Call::Service { call_type, .. } => {
                let (vectors, ctx) = self.online(core)?;
                service_call(vectors, ctx, args, call_type)
            }
            Call::Resume => {
                let (vectors, ctx) = self.online(core)?;
                resume(vectors, ctx, args)
            }
            Call::Abort => {
                let (vectors, ctx) = self.online(core)?;
                abort(vectors, ctx, args)
            }
        }
    }

    /// Raise a secure interrupt on `core` without delivering it. The payload
    /// takes it at its next preemption point, or it is drained once the
    /// current call completes.
    pub fn pend_secure_interrupt(
        &mut self,
        core: usize,
        intid: u32,
    ) -> Result<(), ProtocolViolation> {
        let (_, ctx) = self.online(core)?;
        ctx.line.raise(intid);
        Ok(())
    }

    /// Raise a secure interrupt on `core` and deliver it right away through
    /// the sel1-interrupt entry.
    ///
    /// # Errors
    /// `DoublePreemption` if a yielding call is already preempted. The
    /// interrupt is not raised in that case.
    pub fn secure_interrupt(&mut self, core: usize, intid: u32) -> Result<Signal, ProtocolViolation> {
        let (vectors, ctx) = self.online(core)?;
        if let Some(fid) = ctx.machine.preempted_call() {
            return Err(ProtocolViolation::DoublePreemption(fid));
        }
        ctx.line.raise(intid);
        let ret = (vectors.sel1_intr_entry)(ctx, &SmcArgs::default())?;
        expect_signal(&ret, Completion::HandledSecureInterrupt)?;
        Ok(ret.signal)
    }

    fn online(
        &mut self,
        core: usize,
    ) -> Result<(&'static EntryVectors, &mut CpuContext), ProtocolViolation> {
        let vectors = self.vectors;
        let ctx = self.context_mut(core)?;
        ctx.require_power(PowerState::On)?;
        Ok((vectors, ctx))
    }
}

fn meta_call(meta: MetaCall) -> SmcReturn {
    match meta {
        MetaCall::CallCount => SmcReturn::new([u64::from(TSP_NUM_FID), 0, 0, 0]),
        MetaCall::Uid => SmcReturn::new(TSP_UID.map(u64::from)),
        MetaCall::CallVersion => SmcReturn::new([
            u64::from(TSP_VERSION_MAJOR),
            u64::from(TSP_VERSION_MINOR),
            0,
            0,
        ]),
    }
}

fn service_call(
    vectors: &EntryVectors,
    ctx: &mut CpuContext,
    args: &SmcArgs,
    call_type: CallType,
) -> Result<SmcOutcome, ProtocolViolation> {
    ctx.machine.dispatch(Operation::Call(args.fid()))?;
    ctx.stash_args(args);

    let entry = match call_type {
        CallType::Yield => vectors.yield_smc_entry,
        CallType::Fast => vectors.fast_smc_entry,
    };
    let ret = entry(ctx, args)?;
    complete(vectors, ctx, args, ret)
}

/// `x1` names the preempted call. A value wider than 32 bits names no call.
fn resume(
    vectors: &EntryVectors,
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<SmcOutcome, ProtocolViolation> {
    let requested = match u32::try_from(args.arg(1)) {
        Ok(raw) => FunctionId::from_raw(raw),
        Err(_) => {
            let preempted = ctx
                .machine
                .preempted_call()
                .ok_or(ProtocolViolation::NothingToResume(ctx.state()))?;
            warn!("[TSPD] cpu {}: resume id {:#x} out of range", ctx.core(), args.arg(1));
            return Err(ProtocolViolation::ResumeMismatch {
                preempted,
                requested: FunctionId::from_raw(args.arg(1) as u32),
            });
        }
    };
    let saved = ctx.machine.resume(requested)?;
    let restored = saved.inner().restore();
    drop(saved);

    info!("[TSPD] cpu {}: resuming {}", ctx.core(), requested);
    ctx.stash_args(&restored);
    let ret = (vectors.yield_smc_entry)(ctx, &restored)?;
    complete(vectors, ctx, &restored, ret)
}

fn abort(
    vectors: &EntryVectors,
    ctx: &mut CpuContext,
    args: &SmcArgs,
) -> Result<SmcOutcome, ProtocolViolation> {
    let ret = (vectors.abort_yield_smc_entry)(ctx, args)?;
    expect_signal(&ret, Completion::AbortDone)?;
    drain(vectors, ctx)?;
    Ok(SmcOutcome {
        signal: Some(ret.signal),
        ret: SmcReturn::status(SMC_OK),
    })
}

/// Close a service call the payload just returned from.
fn complete(
    vectors: &EntryVectors,
    ctx: &mut CpuContext,
    args: &SmcArgs,
    ret: EntryReturn,
) -> Result<SmcOutcome, ProtocolViolation> {
    if ret.signal == Signal::Completion(Completion::Preempted) {
        if !ctx.machine.preempts(false) {
            return Err(ProtocolViolation::NotPreemptible(args.fid()));
        }
        let handled = (vectors.sel1_intr_entry)(ctx, args)?;
        expect_signal(&handled, Completion::HandledSecureInterrupt)?;
        debug!("[TSPD] cpu {}: {} preempted", ctx.core(), args.fid());
        return Ok(SmcOutcome {
            signal: Some(handled.signal),
            ret: SmcReturn::status(SMC_PREEMPTED),
        });
    }

    ctx.machine.finish(ret.signal)?;
    let signal = ctx.machine.acknowledge()?;
    debug!("[TSPD] cpu {}: payload returned {}", ctx.core(), signal.fid());
    drain(vectors, ctx)?;
    Ok(SmcOutcome {
        signal: Some(signal),
        ret: SmcReturn::new(ret.results),
    })
}
