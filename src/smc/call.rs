//! Function Identifier Classification
//!
//! Maps a raw identifier received from the normal world onto the call it
//! names.
//!
//! # Rules
//! - Whitelist: only the services, resume, abort and the three meta-calls
//!   are accepted
//! - The reserved meta-call `0xBF00FF02` is rejected explicitly
//! - Resume is only valid as a yielding call, abort only as a fast call
//! - Payload completion ids (`0xF200xxxx`) are never valid from the normal
//!   world

use crate::error::ProtocolViolation;

use super::fid::{
    CallType, FunctionId, TOS_CALL_COUNT, TOS_CALL_VERSION, TOS_RESERVED, TOS_UID, TSP_ADD,
    TSP_DIV, TSP_FID_ABORT, TSP_FID_RESUME, TSP_HANDLE_SEL1_INTR_AND_RETURN, TSP_MUL, TSP_SUB,
};

/// Services offered by the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Service {
    Add = TSP_ADD,
    Sub = TSP_SUB,
    Mul = TSP_MUL,
    Div = TSP_DIV,
    /// Service a pending secure interrupt in-line, then return.
    HandleSel1IntrAndReturn = TSP_HANDLE_SEL1_INTR_AND_RETURN,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::Add,
        Service::Sub,
        Service::Mul,
        Service::Div,
        Service::HandleSel1IntrAndReturn,
    ];

    #[inline]
    pub const fn bare(self) -> u16 {
        self as u16
    }

    pub const fn from_bare(bare: u16) -> Option<Self> {
        match bare {
            TSP_ADD => Some(Service::Add),
            TSP_SUB => Some(Service::Sub),
            TSP_MUL => Some(Service::Mul),
            TSP_DIV => Some(Service::Div),
            TSP_HANDLE_SEL1_INTR_AND_RETURN => Some(Service::HandleSel1IntrAndReturn),
            _ => None,
        }
    }
}

/// Trusted OS standard queries, answered by the dispatcher alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCall {
    CallCount,
    Uid,
    CallVersion,
}

/// A classified normal-world call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Service { service: Service, call_type: CallType },
    Resume,
    Abort,
    Meta(MetaCall),
}

impl Call {
    /// Classify a function id.
    ///
    /// # Errors
    /// - `ReservedFunction` for `0xBF00FF02`
    /// - `UnknownFunction` for anything else outside the whitelist
    pub fn classify(fid: FunctionId) -> Result<Call, ProtocolViolation> {
        match fid {
            TOS_CALL_COUNT => Ok(Call::Meta(MetaCall::CallCount)),
            TOS_UID => Ok(Call::Meta(MetaCall::Uid)),
            TOS_CALL_VERSION => Ok(Call::Meta(MetaCall::CallVersion)),
            TOS_RESERVED => Err(ProtocolViolation::ReservedFunction(fid)),
            TSP_FID_RESUME => Ok(Call::Resume),
            TSP_FID_ABORT => Ok(Call::Abort),
            _ if fid.in_tsp_range() => Service::from_bare(fid.bare())
                .map(|service| Call::Service {
                    service,
                    call_type: fid.call_type(),
                })
                .ok_or(ProtocolViolation::UnknownFunction(fid)),
            _ => Err(ProtocolViolation::UnknownFunction(fid)),
        }
    }

    /// Resume is yielding, abort and the meta-calls are fast.
    pub const fn call_type(&self) -> CallType {
        match self {
            Call::Service { call_type, .. } => *call_type,
            Call::Resume => CallType::Yield,
            Call::Abort | Call::Meta(_) => CallType::Fast,
        }
    }
}
