//! Payload Services
//!
//! Result words: `x0` status, `x1` value. Arithmetic wraps on 64-bit
//! words. Division by zero is a service failure reported in `x0`, not a
//! protocol fault.

use log::debug;

use crate::context::CpuContext;
use crate::smc::args::{SmcArgs, SMC_INVALID_PARAM, SMC_OK, SMC_RESULT_COUNT};
use crate::smc::call::Service;

use super::interrupt;

/// Run a service on the operands in `x1` and `x2`.
pub(super) fn execute(
    ctx: &mut CpuContext,
    service: Service,
    operands: &SmcArgs,
) -> [u64; SMC_RESULT_COUNT] {
    let (lhs, rhs) = (operands.arg(1), operands.arg(2));

    let value = match service {
        Service::Add => lhs.wrapping_add(rhs),
        Service::Sub => lhs.wrapping_sub(rhs),
        Service::Mul => lhs.wrapping_mul(rhs),
        Service::Div => match lhs.checked_div(rhs) {
            Some(quotient) => quotient,
            None => {
                debug!("[TSP] cpu {}: division by zero", ctx.core());
                return [SMC_INVALID_PARAM, 0, 0, 0];
            }
        },
        Service::HandleSel1IntrAndReturn => {
            interrupt::handle_pending(ctx).map_or(0, u64::from)
        }
    };

    [SMC_OK, value, 0, 0]
}
