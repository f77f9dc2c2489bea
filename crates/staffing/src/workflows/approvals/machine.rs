use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::domain::Actor;
use crate::access::ownership::AccessTarget;

use super::domain::{
    ApprovalRecord, ApprovalRequest, ApprovalStatus, DecisionAction, RecordStatus, RequestKind,
    Stage,
};
use super::effects::{self, LeavePolicy, SideEffect};
use super::errors::{TransitionError, ValidationError};
use super::stages::StageTable;

/// A reviewer's approve/reject call against one request.
#[derive(Debug, Clone)]
pub struct Decision {
    pub actor: Actor,
    pub action: DecisionAction,
    pub reason: Option<String>,
    /// Stage the caller believes the request is at; checked against the persisted one.
    pub expected_stage: Option<Stage>,
}

/// New request state plus the effects owed for it, computed without touching storage.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub from: ApprovalStatus,
    pub status: ApprovalStatus,
    pub approvals: Vec<ApprovalRecord>,
    /// Stages decided by this transition, in order.
    pub decided: Vec<Stage>,
    pub bypassed_stage: bool,
    pub effects: Vec<SideEffect>,
    pub decided_at: DateTime<Utc>,
}

impl Transition {
    pub fn apply_to(&self, request: &ApprovalRequest) -> ApprovalRequest {
        ApprovalRequest {
            status: self.status,
            approvals: self.approvals.clone(),
            updated_at: self.decided_at,
            ..request.clone()
        }
    }
}

/// Pure stage state machine over the configured stage table.
#[derive(Debug, Clone)]
pub struct ApprovalMachine {
    stages: Arc<StageTable>,
    policy: LeavePolicy,
}

impl ApprovalMachine {
    pub fn new(stages: Arc<StageTable>, policy: LeavePolicy) -> Self {
        Self { stages, policy }
    }

    pub fn stages(&self) -> &StageTable {
        &self.stages
    }

    /// Status and pending record for a freshly submitted request.
    pub fn initial(&self, kind: RequestKind) -> (ApprovalStatus, Vec<ApprovalRecord>) {
        let first = self.stages.sequence(kind).first().stage;
        (first.pending_status(), vec![ApprovalRecord::pending(first)])
    }

    pub fn transition(
        &self,
        request: &ApprovalRequest,
        decision: &Decision,
        target: &AccessTarget,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let from = request.status;
        let Some(stage) = from.pending_stage() else {
            return Err(TransitionError::terminal(from));
        };

        if decision
            .expected_stage
            .is_some_and(|expected| expected != stage)
        {
            return Err(TransitionError::StageMismatch {
                status: from,
                detail: "the persisted stage differs from the expected stage",
            });
        }

        let actor = &decision.actor;
        if actor.is(&request.subject) {
            return Err(TransitionError::OwnRequest);
        }

        let sequence = self.stages.sequence(request.kind());
        let index = sequence
            .position(stage)
            .ok_or(TransitionError::StageMismatch {
                status: from,
                detail: "stage is not part of this request's sequence",
            })?;
        let current = &sequence.stages()[index];

        let via_bypass = if current.designates(actor, target) {
            false
        } else if index == 0 && sequence.can_bypass(actor.role) {
            true
        } else {
            let designated_earlier = sequence.stages()[..index]
                .iter()
                .any(|earlier| earlier.designates(actor, target));
            let recorded_earlier = request.approvals.iter().any(|record| {
                record.status != RecordStatus::Pending
                    && record.approver.as_ref() == Some(&actor.user_id)
            });
            if designated_earlier || recorded_earlier {
                return Err(TransitionError::StageMismatch {
                    status: from,
                    detail: "the stage this actor decides has already been recorded",
                });
            }
            return Err(TransitionError::Unauthorized {
                stage,
                role: actor.role,
            });
        };

        let reason = decision
            .reason
            .as_ref()
            .filter(|reason| !reason.trim().is_empty())
            .cloned();
        if decision.action == DecisionAction::Reject && reason.is_none() {
            return Err(ValidationError::MissingRejectionReason.into());
        }

        let decided_record = |stage: Stage, status: RecordStatus, via_bypass: bool| ApprovalRecord {
            stage,
            status,
            approver: Some(actor.user_id.clone()),
            approver_role: Some(actor.role),
            reason: reason.clone(),
            decided_at: Some(now),
            via_bypass,
        };

        let mut approvals: Vec<ApprovalRecord> = request
            .approvals
            .iter()
            .filter(|record| record.status != RecordStatus::Pending)
            .cloned()
            .collect();
        let mut decided = vec![stage];

        let status = match decision.action {
            DecisionAction::Reject => {
                approvals.push(decided_record(stage, RecordStatus::Rejected, via_bypass));
                ApprovalStatus::Rejected
            }
            DecisionAction::Approve => {
                approvals.push(decided_record(stage, RecordStatus::Approved, via_bypass));
                let mut next = index + 1;
                loop {
                    match sequence.get(next) {
                        None => break ApprovalStatus::Approved,
                        Some(definition) if via_bypass && definition.designates(actor, target) => {
                            approvals.push(decided_record(
                                definition.stage,
                                RecordStatus::Approved,
                                false,
                            ));
                            decided.push(definition.stage);
                            next += 1;
                        }
                        Some(definition) => {
                            approvals.push(ApprovalRecord::pending(definition.stage));
                            break definition.stage.pending_status();
                        }
                    }
                }
            }
        };

        let effects = effects::plan(
            request,
            status,
            &actor.user_id,
            reason.as_deref(),
            &self.policy,
        );

        Ok(Transition {
            from,
            status,
            approvals,
            decided,
            bypassed_stage: via_bypass,
            effects,
            decided_at: now,
        })
    }

    /// Move a pending request to `cancelled`; the caller has already been authorized.
    pub fn cancel(
        &self,
        request: &ApprovalRequest,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        if request.status.is_terminal() {
            return Err(TransitionError::terminal(request.status));
        }

        let approvals = request
            .approvals
            .iter()
            .filter(|record| record.status != RecordStatus::Pending)
            .cloned()
            .collect();

        Ok(Transition {
            from: request.status,
            status: ApprovalStatus::Cancelled,
            approvals,
            decided: Vec::new(),
            bypassed_stage: false,
            effects: Vec::new(),
            decided_at: now,
        })
    }
}
