//! Final-approval side effects and the dispatcher that applies them to the ledger.
//!
//! Effects are planned from the request's immutable details only, so the effect of a
//! transition is fully determined by the request as it stood when it was decided.
//! Application is idempotent per request: balances remember the requests already
//! applied and allocations are skipped when the (user, project) pair is covered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::access::domain::{ProjectId, UserId};
use crate::config::PolicyConfig;
use crate::repository::{LedgerStore, RepositoryError};

use super::domain::{ApprovalRequest, ApprovalStatus, LeaveType, RequestDetails, RequestId};
use super::errors::DispatchError;
use super::locks::KeyedLocks;
use super::ledger::{
    Allocation, AllocationId, AllocationStatus, LeaveBalance, ProofId, ProofStatus,
};

/// Leave accounting knobs taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeavePolicy {
    pub annual_entitlement: u32,
    pub overtime_hours_per_day: u32,
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for LeavePolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            annual_entitlement: config.annual_leave_days,
            overtime_hours_per_day: config.overtime_hours_per_day.max(1),
        }
    }
}

impl LeavePolicy {
    /// Overtime hours converted into whole compensatory days, rounded up.
    pub fn compensatory_days(&self, hours: f64) -> u32 {
        if hours <= 0.0 {
            return 0;
        }
        (hours / f64::from(self.overtime_hours_per_day)).ceil() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    CreateAllocation {
        request: RequestId,
        user: UserId,
        project: ProjectId,
        percentage: u8,
        role: String,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    },
    DebitLeave {
        request: RequestId,
        user: UserId,
        year: i32,
        leave_type: LeaveType,
        days: u32,
    },
    CreditCompensatory {
        request: RequestId,
        user: UserId,
        year: i32,
        days: u32,
    },
    MarkProof {
        request: RequestId,
        proof: ProofId,
        status: ProofStatus,
        reviewer: UserId,
        note: Option<String>,
    },
}

impl SideEffect {
    /// Person whose ledger entries the effect touches.
    pub fn ledger_owner(&self) -> Option<&UserId> {
        match self {
            Self::CreateAllocation { user, .. }
            | Self::DebitLeave { user, .. }
            | Self::CreditCompensatory { user, .. } => Some(user),
            Self::MarkProof { .. } => None,
        }
    }
}

/// Effects owed when `request` lands in `outcome`, decided by `reviewer`.
pub fn plan(
    request: &ApprovalRequest,
    outcome: ApprovalStatus,
    reviewer: &UserId,
    note: Option<&str>,
    policy: &LeavePolicy,
) -> Vec<SideEffect> {
    let id = request.id.clone();
    match (outcome, &request.details) {
        (ApprovalStatus::Approved, RequestDetails::Resource(details)) => {
            vec![SideEffect::CreateAllocation {
                request: id,
                user: request.subject.clone(),
                project: details.project.clone(),
                percentage: details.percentage,
                role: details.role.clone(),
                start_date: details.start_date,
                end_date: details.end_date,
            }]
        }
        (ApprovalStatus::Approved, RequestDetails::Leave(details)) => match details.leave_type {
            LeaveType::Annual | LeaveType::Compensatory => vec![SideEffect::DebitLeave {
                request: id,
                user: request.subject.clone(),
                year: details.start_date.year(),
                leave_type: details.leave_type,
                days: details.days_requested,
            }],
            LeaveType::Sick | LeaveType::Unpaid => Vec::new(),
        },
        (ApprovalStatus::Approved, RequestDetails::Overtime(details))
            if details.compensation.includes_time_off() =>
        {
            vec![SideEffect::CreditCompensatory {
                request: id,
                user: request.subject.clone(),
                year: details.date.year(),
                days: policy.compensatory_days(details.hours),
            }]
        }
        (
            ApprovalStatus::Approved | ApprovalStatus::Rejected,
            RequestDetails::SkillVerification(details),
        ) => {
            let status = if outcome == ApprovalStatus::Approved {
                ProofStatus::Verified
            } else {
                ProofStatus::Rejected
            };
            vec![SideEffect::MarkProof {
                request: id,
                proof: details.proof.clone(),
                status,
                reviewer: reviewer.clone(),
                note: note.map(str::to_string),
            }]
        }
        _ => Vec::new(),
    }
}

/// What applying one effect actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EffectOutcome {
    AllocationCreated { allocation: AllocationId },
    AllocationSkipped { existing: AllocationId },
    LeaveDebited { days: u32, remaining: i64 },
    CompensatoryCredited { days: u32 },
    ProofMarked { status: ProofStatus },
    AlreadyApplied,
}

static ALLOCATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_allocation_id() -> AllocationId {
    let id = ALLOCATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AllocationId(format!("alloc-{id:06}"))
}

/// Applies planned effects against the ledger collaborator.
///
/// Read-check-write sequences on one person's balance and allocations run under a
/// per-user lock, so decisions on different requests for the same person cannot
/// interleave.
pub struct EffectDispatcher<L> {
    ledger: Arc<L>,
    policy: LeavePolicy,
    ledger_locks: KeyedLocks<UserId>,
}

impl<L> EffectDispatcher<L>
where
    L: LedgerStore + 'static,
{
    pub fn new(ledger: Arc<L>, policy: LeavePolicy) -> Self {
        Self {
            ledger,
            policy,
            ledger_locks: KeyedLocks::new(),
        }
    }

    /// Run `work` while holding the ledger lock of `user`.
    pub fn with_ledger_lock<T>(&self, user: &UserId, work: impl FnOnce() -> T) -> T {
        self.ledger_locks.with_lock(user, work)
    }

    pub fn policy(&self) -> &LeavePolicy {
        &self.policy
    }

    /// Stored balance for the pair, or a fresh opening balance that is not yet persisted.
    pub fn balance(&self, user: &UserId, year: i32) -> Result<LeaveBalance, RepositoryError> {
        Ok(self.ledger.leave_balance(user, year)?.unwrap_or_else(|| {
            LeaveBalance::opening(user.clone(), year, self.policy.annual_entitlement)
        }))
    }

    pub fn apply_all(
        &self,
        effects: &[SideEffect],
        now: DateTime<Utc>,
    ) -> Result<Vec<EffectOutcome>, DispatchError> {
        effects.iter().map(|effect| self.apply(effect, now)).collect()
    }

    pub fn apply(
        &self,
        effect: &SideEffect,
        now: DateTime<Utc>,
    ) -> Result<EffectOutcome, DispatchError> {
        match effect.ledger_owner() {
            Some(user) => self.with_ledger_lock(user, || self.apply_locked(effect, now)),
            None => self.apply_locked(effect, now),
        }
    }

    fn apply_locked(
        &self,
        effect: &SideEffect,
        now: DateTime<Utc>,
    ) -> Result<EffectOutcome, DispatchError> {
        match effect {
            SideEffect::CreateAllocation {
                request,
                user,
                project,
                percentage,
                role,
                start_date,
                end_date,
            } => {
                if let Some(existing) = self.ledger.active_allocation(user, project)? {
                    tracing::info!(
                        request_id = %request,
                        %user,
                        %project,
                        allocation = %existing.id,
                        "active allocation already exists, skipping"
                    );
                    return Ok(EffectOutcome::AllocationSkipped {
                        existing: existing.id,
                    });
                }

                let allocation = Allocation {
                    id: next_allocation_id(),
                    user: user.clone(),
                    project: project.clone(),
                    percentage: *percentage,
                    role: role.clone(),
                    start_date: *start_date,
                    end_date: *end_date,
                    status: AllocationStatus::Active,
                    source_request: Some(request.clone()),
                    created_at: now,
                };
                let stored = self
                    .ledger
                    .insert_allocation(allocation)
                    .map_err(|error| match error {
                        RepositoryError::Conflict => DispatchError::Conflict(format!(
                            "allocation for {user} on {project} was created concurrently"
                        )),
                        other => DispatchError::Repository(other),
                    })?;

                tracing::info!(
                    request_id = %request,
                    allocation = %stored.id,
                    %user,
                    %project,
                    percentage = stored.percentage,
                    "allocation created"
                );
                self.log_over_allocation(user)?;

                Ok(EffectOutcome::AllocationCreated {
                    allocation: stored.id,
                })
            }
            SideEffect::DebitLeave {
                request,
                user,
                year,
                leave_type,
                days,
            } => {
                let mut balance = self.balance(user, *year)?;
                if balance.has_applied(request) {
                    return Ok(EffectOutcome::AlreadyApplied);
                }

                let available = match leave_type {
                    LeaveType::Compensatory => balance.compensatory_available(),
                    _ => balance.remaining(),
                };
                if i64::from(*days) > available {
                    return Err(DispatchError::InsufficientBalance {
                        requested: *days,
                        available,
                    });
                }

                match leave_type {
                    LeaveType::Compensatory => balance.compensatory_used += days,
                    _ => balance.used += days,
                }
                balance.applied_requests.insert(request.clone());
                let remaining = balance.remaining();
                self.ledger.patch_leave_balance(balance)?;

                tracing::info!(
                    request_id = %request,
                    %user,
                    year,
                    days,
                    leave_type = leave_type.label(),
                    remaining,
                    "leave balance debited"
                );
                Ok(EffectOutcome::LeaveDebited {
                    days: *days,
                    remaining,
                })
            }
            SideEffect::CreditCompensatory {
                request,
                user,
                year,
                days,
            } => {
                let mut balance = self.balance(user, *year)?;
                if balance.has_applied(request) {
                    return Ok(EffectOutcome::AlreadyApplied);
                }

                balance.compensatory_balance += days;
                balance.applied_requests.insert(request.clone());
                self.ledger.patch_leave_balance(balance)?;

                tracing::info!(request_id = %request, %user, year, days, "compensatory days credited");
                Ok(EffectOutcome::CompensatoryCredited { days: *days })
            }
            SideEffect::MarkProof {
                request,
                proof,
                status,
                reviewer,
                note,
            } => {
                let mut verification = self
                    .ledger
                    .proof(proof)?
                    .ok_or(RepositoryError::NotFound)?;
                if verification.status == *status {
                    return Ok(EffectOutcome::AlreadyApplied);
                }

                verification.status = *status;
                verification.reviewed_by = Some(reviewer.clone());
                verification.reviewed_at = Some(now);
                verification.note = note.clone();
                self.ledger.mark_proof(verification)?;

                tracing::info!(request_id = %request, %proof, status = ?status, "skill proof marked");
                Ok(EffectOutcome::ProofMarked { status: *status })
            }
        }
    }

    pub(crate) fn log_over_allocation(&self, user: &UserId) -> Result<(), RepositoryError> {
        let total: u32 = self
            .ledger
            .allocations_for(user)?
            .iter()
            .filter(|allocation| allocation.is_active())
            .map(|allocation| u32::from(allocation.percentage))
            .sum();
        if total > 100 {
            tracing::info!(%user, total_percentage = total, "user allocated above full capacity");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensatory_days_round_up() {
        let policy = LeavePolicy {
            annual_entitlement: 21,
            overtime_hours_per_day: 8,
        };
        assert_eq!(policy.compensatory_days(1.0), 1);
        assert_eq!(policy.compensatory_days(8.0), 1);
        assert_eq!(policy.compensatory_days(8.5), 2);
        assert_eq!(policy.compensatory_days(20.0), 3);
        assert_eq!(policy.compensatory_days(0.0), 0);
    }

    #[test]
    fn policy_follows_configuration() {
        let config = PolicyConfig {
            annual_leave_days: 25,
            overtime_hours_per_day: 6,
            notification_ttl_days: 30,
        };
        let policy = LeavePolicy::from(&config);
        assert_eq!(policy.annual_entitlement, 25);
        assert_eq!(policy.compensatory_days(7.0), 2);
    }
}
