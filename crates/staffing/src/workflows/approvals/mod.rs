//! Multi-stage approval of staffing, leave, overtime, and skill-verification requests.
//!
//! The state machine in [`machine`] is pure; [`service::ApprovalService`] serialises
//! decisions per request, applies [`effects`] before persisting the new status with a
//! compare-and-swap write, and only then emits the requester notification.

pub mod domain;
pub mod effects;
pub mod errors;
pub mod ledger;
pub(crate) mod locks;
pub mod machine;
pub mod router;
pub mod service;
pub mod stages;

#[cfg(test)]
mod tests;

pub use domain::{
    working_days, ApprovalRecord, ApprovalRequest, ApprovalStatus, CompensationType,
    DecisionAction, LeaveRequestDetails, LeaveType, OvertimeRequestDetails, RecordStatus,
    RequestDetails, RequestId, RequestKind, RequestStatusView, ResourceRequestDetails, SkillId,
    SkillVerificationDetails, Stage,
};
pub use effects::{EffectDispatcher, EffectOutcome, LeavePolicy, SideEffect};
pub use errors::{ApprovalError, DispatchError, TransitionError, ValidationError};
pub use ledger::{
    Allocation, AllocationId, AllocationPatch, AllocationStatus, LeaveBalance, LeaveBalanceView,
    ProofId, ProofStatus, ProofVerification,
};
pub use machine::{ApprovalMachine, Decision, Transition};
pub use router::approval_router;
pub use service::{
    ApprovalService, DecisionInput, DecisionOutcome, LeaveRequestInput, OvertimeRequestInput,
    ResourceRequestInput, SkillVerificationInput,
};
pub use stages::{StageApprover, StageDefinition, StageTable, StageTableError};
