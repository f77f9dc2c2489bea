use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::domain::{Actor, ProjectId, ProjectRecord, UserId, UserRecord};
use crate::access::guard::AuthorizationGuard;
use crate::access::ownership::AccessTarget;
use crate::access::permissions::{Action, ResourceCategory};
use crate::config::PolicyConfig;
use crate::repository::{Directory, LedgerStore, NotificationStore, RequestRepository};
use crate::workflows::notifications::{
    NotificationDraft, NotificationEmitter, NotificationId, NotificationType, RelatedResource,
};

use super::domain::{
    working_days, ApprovalRequest, ApprovalStatus, CompensationType, DecisionAction,
    LeaveRequestDetails, LeaveType, OvertimeRequestDetails, RequestDetails, RequestId,
    ResourceRequestDetails, SkillId, SkillVerificationDetails, Stage,
};
use super::effects::{EffectDispatcher, EffectOutcome, LeavePolicy};
use super::errors::{ApprovalError, ValidationError};
use super::ledger::{Allocation, AllocationId, AllocationPatch, LeaveBalance, ProofId};
use super::locks::KeyedLocks;
use super::machine::{ApprovalMachine, Decision};
use super::stages::StageTable;

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRequestInput {
    pub subject: UserId,
    pub project: ProjectId,
    pub percentage: u8,
    pub role: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaveRequestInput {
    /// Defaults to the submitting actor.
    pub subject: Option<UserId>,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
    pub covering_user: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OvertimeRequestInput {
    /// Defaults to the submitting actor.
    pub subject: Option<UserId>,
    pub project: ProjectId,
    pub date: NaiveDate,
    pub hours: f64,
    pub compensation: CompensationType,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillVerificationInput {
    pub skill: SkillId,
    pub proof: ProofId,
    pub claimed_level: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionInput {
    pub action: DecisionAction,
    pub reason: Option<String>,
    pub expected_stage: Option<Stage>,
}

/// Result of a successful `decide` call.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub request_id: RequestId,
    pub status: ApprovalStatus,
    pub bypassed_stage: bool,
    pub decided: Vec<Stage>,
    pub effects: Vec<EffectOutcome>,
    pub notification: Option<NotificationId>,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

fn report<T>(operation: &'static str, subject: &str, result: &Result<T, ApprovalError>) {
    if let Err(error) = result {
        if error.is_user_error() {
            tracing::debug!(operation, subject, kind = error.kind(), %error, "approval request refused");
        } else {
            tracing::error!(operation, subject, %error, "approval request failed");
        }
    }
}

/// Service composing the guard, stage machine, effect dispatcher, and notifications.
pub struct ApprovalService<R, D, L, N> {
    requests: Arc<R>,
    directory: Arc<D>,
    ledger: Arc<L>,
    machine: ApprovalMachine,
    dispatcher: EffectDispatcher<L>,
    notifications: NotificationEmitter<N>,
    guard: AuthorizationGuard,
    request_locks: KeyedLocks<RequestId>,
    subject_locks: KeyedLocks<UserId>,
}

impl<R, D, L, N> ApprovalService<R, D, L, N>
where
    R: RequestRepository + 'static,
    D: Directory + 'static,
    L: LedgerStore + 'static,
    N: NotificationStore + 'static,
{
    pub fn new(
        requests: Arc<R>,
        directory: Arc<D>,
        ledger: Arc<L>,
        notifications: Arc<N>,
        policy: PolicyConfig,
    ) -> Self {
        Self::with_stages(
            requests,
            directory,
            ledger,
            notifications,
            policy,
            StageTable::standard(),
        )
    }

    pub fn with_stages(
        requests: Arc<R>,
        directory: Arc<D>,
        ledger: Arc<L>,
        notifications: Arc<N>,
        policy: PolicyConfig,
        stages: StageTable,
    ) -> Self {
        let leave_policy = LeavePolicy::from(&policy);
        Self {
            requests,
            directory,
            machine: ApprovalMachine::new(Arc::new(stages), leave_policy),
            dispatcher: EffectDispatcher::new(Arc::clone(&ledger), leave_policy),
            ledger,
            notifications: NotificationEmitter::new(notifications, policy.notification_ttl_days),
            guard: AuthorizationGuard::new(),
            request_locks: KeyedLocks::new(),
            subject_locks: KeyedLocks::new(),
        }
    }

    /// A PM (or HR/admin) asks for `subject` to be staffed on a project.
    pub fn submit_resource_request(
        &self,
        actor: &Actor,
        input: ResourceRequestInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let result = self.submit_resource_inner(actor, input);
        report("submit_resource_request", actor.user_id.as_str(), &result);
        result
    }

    fn submit_resource_inner(
        &self,
        actor: &Actor,
        input: ResourceRequestInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if !(1..=100).contains(&input.percentage) {
            return Err(ValidationError::PercentageOutOfRange(input.percentage).into());
        }
        if input.role.trim().is_empty() {
            return Err(ValidationError::MissingField("role").into());
        }
        if input.end_date.is_some_and(|end| end < input.start_date) {
            return Err(ValidationError::EndBeforeStart.into());
        }

        let subject = self.user(&input.subject)?;
        let project = self.project(&input.project)?;
        if !project.active {
            return Err(ValidationError::InactiveProject(project.id.to_string()).into());
        }

        let target = AccessTarget::subject(subject.id.clone())
            .with_line_manager(subject.line_manager.clone())
            .with_project(project.id.clone(), project.manager.clone());
        self.guard.ensure(
            actor,
            ResourceCategory::ResourceRequests,
            Action::Create,
            Some(&target),
        )?;

        let details = RequestDetails::Resource(ResourceRequestDetails {
            project: project.id,
            percentage: input.percentage,
            role: input.role.trim().to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
        });
        self.submit(actor, &subject, details)
    }

    pub fn submit_leave_request(
        &self,
        actor: &Actor,
        input: LeaveRequestInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let result = self.submit_leave_inner(actor, input);
        report("submit_leave_request", actor.user_id.as_str(), &result);
        result
    }

    fn submit_leave_inner(
        &self,
        actor: &Actor,
        input: LeaveRequestInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if input.end_date < input.start_date {
            return Err(ValidationError::EndBeforeStart.into());
        }
        let days_requested = working_days(input.start_date, input.end_date);
        if days_requested == 0 {
            return Err(ValidationError::EmptyLeaveWindow.into());
        }

        let subject_id = input.subject.unwrap_or_else(|| actor.user_id.clone());
        let subject = self.user(&subject_id)?;
        self.ensure_work_request(actor, &subject, Action::Create)?;

        if let Some(covering) = &input.covering_user {
            if covering == &subject.id {
                return Err(ValidationError::CoveringSelf.into());
            }
            self.user(covering)?;
        }

        // Soft check; the dispatcher repeats it at final approval.
        let balance = self
            .dispatcher
            .balance(&subject.id, input.start_date.year())?;
        let available = match input.leave_type {
            LeaveType::Annual => Some(balance.remaining()),
            LeaveType::Compensatory => Some(balance.compensatory_available()),
            LeaveType::Sick | LeaveType::Unpaid => None,
        };
        if let Some(available) = available {
            if i64::from(days_requested) > available {
                return Err(ApprovalError::InsufficientBalance {
                    requested: days_requested,
                    available,
                });
            }
        }

        let details = RequestDetails::Leave(LeaveRequestDetails {
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date: input.end_date,
            days_requested,
            reason: input.reason,
            covering_user: input.covering_user,
        });
        self.submit(actor, &subject, details)
    }

    pub fn submit_overtime_request(
        &self,
        actor: &Actor,
        input: OvertimeRequestInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let result = self.submit_overtime_inner(actor, input);
        report("submit_overtime_request", actor.user_id.as_str(), &result);
        result
    }

    fn submit_overtime_inner(
        &self,
        actor: &Actor,
        input: OvertimeRequestInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if !(input.hours > 0.0 && input.hours <= 24.0) {
            return Err(ValidationError::HoursOutOfRange(input.hours).into());
        }
        if input.reason.trim().is_empty() {
            return Err(ValidationError::MissingField("reason").into());
        }

        let subject_id = input.subject.unwrap_or_else(|| actor.user_id.clone());
        let subject = self.user(&subject_id)?;
        let project = self.project(&input.project)?;
        self.ensure_work_request(actor, &subject, Action::Create)?;

        let details = RequestDetails::Overtime(OvertimeRequestDetails {
            project: project.id,
            date: input.date,
            hours: input.hours,
            compensation: input.compensation,
            reason: input.reason,
        });
        self.submit(actor, &subject, details)
    }

    /// An employee asks their line manager to verify a claimed skill level.
    pub fn submit_skill_verification(
        &self,
        actor: &Actor,
        input: SkillVerificationInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let result = self.submit_skill_inner(actor, input);
        report("submit_skill_verification", actor.user_id.as_str(), &result);
        result
    }

    fn submit_skill_inner(
        &self,
        actor: &Actor,
        input: SkillVerificationInput,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if !(1..=5).contains(&input.claimed_level) {
            return Err(ValidationError::LevelOutOfRange(input.claimed_level).into());
        }
        if input.skill.0.trim().is_empty() {
            return Err(ValidationError::MissingField("skill").into());
        }

        let subject = self.user(&actor.user_id)?;
        let target = AccessTarget::subject(subject.id.clone());
        self.guard.ensure(
            actor,
            ResourceCategory::Skills,
            Action::Create,
            Some(&target),
        )?;

        let proof = self
            .ledger
            .proof(&input.proof)?
            .ok_or_else(|| ApprovalError::NotFound(format!("skill proof `{}`", input.proof)))?;
        if proof.owner != subject.id {
            return Err(ValidationError::ForeignProof(proof.id.to_string()).into());
        }

        let details = RequestDetails::SkillVerification(SkillVerificationDetails {
            skill: input.skill,
            proof: proof.id,
            claimed_level: input.claimed_level,
        });
        self.submit(actor, &subject, details)
    }

    /// Duplicate guard, insert, and line-manager notification, serialised per subject.
    fn submit(
        &self,
        actor: &Actor,
        subject: &UserRecord,
        details: RequestDetails,
    ) -> Result<ApprovalRequest, ApprovalError> {
        self.subject_locks.with_lock(&subject.id, || -> Result<ApprovalRequest, ApprovalError> {
            let existing = self.requests.for_subject(&subject.id)?;
            if let Some(blocking) = existing
                .iter()
                .find(|request| request.blocks(&subject.id, &details))
            {
                return Err(ApprovalError::DuplicateRequest {
                    existing: blocking.id.clone(),
                });
            }

            let kind = details.kind();
            let (status, approvals) = self.machine.initial(kind);
            let now = Utc::now();
            let request = ApprovalRequest {
                id: next_request_id(),
                subject: subject.id.clone(),
                requester: actor.user_id.clone(),
                details,
                status,
                approvals,
                cancellation_reason: None,
                created_at: now,
                updated_at: now,
            };
            let stored = self.requests.insert(request)?;

            tracing::info!(
                request_id = %stored.id,
                kind = kind.label(),
                subject = %stored.subject,
                requester = %stored.requester,
                status = stored.status.label(),
                "approval request submitted"
            );

            match &subject.line_manager {
                Some(manager) => {
                    self.notifications.emit_quietly(
                        NotificationDraft::new(
                            NotificationType::submitted(kind),
                            manager.clone(),
                            format!(
                                "{} {} for {} is awaiting your review",
                                kind.label(),
                                stored.id,
                                subject.name
                            ),
                        )
                        .related(RelatedResource::new(kind.label(), &stored.id)),
                        now,
                    );
                }
                None => {
                    tracing::debug!(request_id = %stored.id, subject = %stored.subject, "subject has no line manager to notify");
                }
            }

            Ok(stored)
        })
    }

    /// Approve or reject the request at its current persisted stage.
    pub fn decide(
        &self,
        request_id: &RequestId,
        actor: &Actor,
        input: DecisionInput,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let result = self
            .request_locks
            .with_lock(request_id, || self.decide_locked(request_id, actor, input));
        report("decide", request_id.0.as_str(), &result);
        result
    }

    fn decide_locked(
        &self,
        request_id: &RequestId,
        actor: &Actor,
        input: DecisionInput,
    ) -> Result<DecisionOutcome, ApprovalError> {
        let request = self.request(request_id)?;
        let target = self.target_for(&request)?;
        self.guard.ensure(
            actor,
            request.category(),
            Action::Approve,
            Some(&target),
        )?;

        let decision = Decision {
            actor: actor.clone(),
            action: input.action,
            reason: input.reason,
            expected_stage: input.expected_stage,
        };
        let now = Utc::now();
        let transition = self.machine.transition(&request, &decision, &target, now)?;

        // Effects first: a refused effect leaves the request exactly as it was.
        let effects = self.dispatcher.apply_all(&transition.effects, now)?;
        let updated = transition.apply_to(&request);
        self.requests
            .compare_and_swap(request.status, updated.clone())?;

        tracing::info!(
            request_id = %updated.id,
            from = transition.from.label(),
            to = transition.status.label(),
            actor = %actor.user_id,
            bypassed = transition.bypassed_stage,
            "approval request transitioned"
        );

        let notification = self.notify_requester(&updated, actor, now);

        Ok(DecisionOutcome {
            request_id: updated.id,
            status: transition.status,
            bypassed_stage: transition.bypassed_stage,
            decided: transition.decided,
            effects,
            notification,
        })
    }

    /// Withdraw a pending request; requester or admin only.
    pub fn cancel(
        &self,
        request_id: &RequestId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let result = self.request_locks.with_lock(request_id, || -> Result<ApprovalRequest, ApprovalError> {
            let request = self.request(request_id)?;
            let target = self.target_for(&request)?;
            self.guard.ensure(
                actor,
                request.category(),
                Action::Cancel,
                Some(&target),
            )?;

            let now = Utc::now();
            let transition = self.machine.cancel(&request, now)?;
            let mut updated = transition.apply_to(&request);
            updated.cancellation_reason = reason;
            self.requests
                .compare_and_swap(request.status, updated.clone())?;

            tracing::info!(
                request_id = %updated.id,
                from = transition.from.label(),
                actor = %actor.user_id,
                "approval request cancelled"
            );
            self.notify_requester(&updated, actor, now);
            Ok(updated)
        });
        report("cancel", request_id.0.as_str(), &result);
        result
    }

    pub fn get(
        &self,
        request_id: &RequestId,
        actor: &Actor,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = self.request(request_id)?;
        let target = self.target_for(&request)?;
        self.guard
            .ensure(actor, request.category(), Action::Read, Some(&target))?;
        Ok(request)
    }

    pub fn leave_balance(
        &self,
        actor: &Actor,
        user: &UserId,
        year: i32,
    ) -> Result<LeaveBalance, ApprovalError> {
        let subject = self.user(user)?;
        self.ensure_work_request(actor, &subject, Action::Read)?;
        Ok(self.dispatcher.balance(&subject.id, year)?)
    }

    /// Privileged edit of a (user, year) entitlement.
    pub fn set_leave_entitlement(
        &self,
        actor: &Actor,
        user: &UserId,
        year: i32,
        entitlement: u32,
    ) -> Result<LeaveBalance, ApprovalError> {
        let subject = self.user(user)?;
        self.ensure_work_request(actor, &subject, Action::Update)?;

        self.dispatcher.with_ledger_lock(&subject.id, || -> Result<LeaveBalance, ApprovalError> {
            let mut balance = self.dispatcher.balance(&subject.id, year)?;
            let previous = balance.entitlement;
            balance.entitlement = entitlement;
            self.ledger.patch_leave_balance(balance.clone())?;

            tracing::info!(
                user = %subject.id,
                year,
                previous,
                entitlement,
                actor = %actor.user_id,
                "leave entitlement updated"
            );
            Ok(balance)
        })
    }

    pub fn allocations_for(
        &self,
        actor: &Actor,
        user: &UserId,
    ) -> Result<Vec<Allocation>, ApprovalError> {
        let subject = self.user(user)?;
        let target =
            AccessTarget::subject(subject.id.clone()).with_line_manager(subject.line_manager);
        self.guard.ensure(
            actor,
            ResourceCategory::Allocations,
            Action::Read,
            Some(&target),
        )?;
        Ok(self.ledger.allocations_for(&subject.id)?)
    }

    /// Privileged edit of an allocation created by an approval or otherwise.
    pub fn update_allocation(
        &self,
        actor: &Actor,
        allocation_id: &AllocationId,
        patch: AllocationPatch,
    ) -> Result<Allocation, ApprovalError> {
        let mut allocation = self
            .ledger
            .allocation(allocation_id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("allocation `{allocation_id}`")))?;
        let project = self.project(&allocation.project)?;
        let target = AccessTarget::subject(allocation.user.clone())
            .with_project(project.id, project.manager);
        self.guard.ensure(
            actor,
            ResourceCategory::Allocations,
            Action::Update,
            Some(&target),
        )?;

        if let Some(percentage) = patch.percentage {
            if !(1..=100).contains(&percentage) {
                return Err(ValidationError::PercentageOutOfRange(percentage).into());
            }
            allocation.percentage = percentage;
        }
        if let Some(end_date) = patch.end_date {
            if end_date < allocation.start_date {
                return Err(ValidationError::EndBeforeStart.into());
            }
            allocation.end_date = Some(end_date);
        }
        if let Some(status) = patch.status {
            allocation.status = status;
        }

        self.ledger.update_allocation(allocation.clone())?;
        tracing::info!(
            allocation = %allocation.id,
            user = %allocation.user,
            percentage = allocation.percentage,
            actor = %actor.user_id,
            "allocation updated"
        );
        self.dispatcher.log_over_allocation(&allocation.user)?;
        Ok(allocation)
    }

    fn ensure_work_request(
        &self,
        actor: &Actor,
        subject: &UserRecord,
        action: Action,
    ) -> Result<(), ApprovalError> {
        let target = AccessTarget::subject(subject.id.clone())
            .with_line_manager(subject.line_manager.clone());
        self.guard.ensure(
            actor,
            ResourceCategory::WorkRequests,
            action,
            Some(&target),
        )?;
        Ok(())
    }

    fn notify_requester(
        &self,
        request: &ApprovalRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Option<NotificationId> {
        let kind = request.kind();
        let message = format!(
            "{} {} is now {} (by {})",
            kind.label(),
            request.id,
            request.status.label(),
            actor.email
        );
        self.notifications
            .emit_quietly(
                NotificationDraft::new(
                    NotificationType::for_status(kind, request.status),
                    request.requester.clone(),
                    message,
                )
                .related(RelatedResource::new(kind.label(), &request.id)),
                now,
            )
            .map(|notification| notification.id)
    }

    /// Relationship facts the guard and stage table evaluate for `request`.
    fn target_for(&self, request: &ApprovalRequest) -> Result<AccessTarget, ApprovalError> {
        let line_manager = self
            .directory
            .user_by_id(&request.subject)?
            .and_then(|subject| subject.line_manager);
        let mut target = AccessTarget::subject(request.subject.clone())
            .with_line_manager(line_manager)
            .with_requester(request.requester.clone());

        if let Some(project_id) = request.details.project() {
            if let Some(project) = self.directory.project_by_id(project_id)? {
                target = target.with_project(project.id, project.manager);
            }
        }
        Ok(target)
    }

    fn request(&self, id: &RequestId) -> Result<ApprovalRequest, ApprovalError> {
        self.requests
            .fetch(id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("request `{id}`")))
    }

    fn user(&self, id: &UserId) -> Result<UserRecord, ApprovalError> {
        self.directory
            .user_by_id(id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("user `{id}`")))
    }

    fn project(&self, id: &ProjectId) -> Result<ProjectRecord, ApprovalError> {
        self.directory
            .project_by_id(id)?
            .ok_or_else(|| ApprovalError::NotFound(format!("project `{id}`")))
    }
}
