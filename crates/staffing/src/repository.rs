//! Narrow persistence contracts the approval core consumes.
//!
//! Each method is a single CRUD call; business rules live in the services that call them.

use chrono::{DateTime, Utc};

use crate::access::domain::{ProjectId, ProjectRecord, UserId, UserRecord};
use crate::access::roles::RoleChange;
use crate::workflows::approvals::domain::{ApprovalRequest, ApprovalStatus, RequestId};
use crate::workflows::approvals::ledger::{
    Allocation, AllocationId, LeaveBalance, ProofId, ProofVerification,
};
use crate::workflows::notifications::domain::{Notification, NotificationId};

/// Error enumeration for persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored status is {actual}, expected {expected}")]
    StaleStatus {
        expected: ApprovalStatus,
        actual: ApprovalStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// User and project lookups plus the audited role-change write.
pub trait Directory: Send + Sync {
    fn user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError>;
    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError>;
    fn project_by_id(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError>;
    /// Persist the new role together with its audit entry.
    fn apply_role_change(&self, change: &RoleChange) -> Result<UserRecord, RepositoryError>;
}

/// Approval request storage with a conditional write on the status field.
pub trait RequestRepository: Send + Sync {
    fn insert(&self, request: ApprovalRequest) -> Result<ApprovalRequest, RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, RepositoryError>;
    /// Replace the stored request only while its status still equals `expected`.
    fn compare_and_swap(
        &self,
        expected: ApprovalStatus,
        request: ApprovalRequest,
    ) -> Result<(), RepositoryError>;
    fn for_subject(&self, subject: &UserId) -> Result<Vec<ApprovalRequest>, RepositoryError>;
}

/// Derived records mutated by side effects: allocations, leave balances, skill proofs.
pub trait LedgerStore: Send + Sync {
    fn active_allocation(
        &self,
        user: &UserId,
        project: &ProjectId,
    ) -> Result<Option<Allocation>, RepositoryError>;
    /// Fails with `Conflict` when an active allocation already covers the pair.
    fn insert_allocation(&self, allocation: Allocation) -> Result<Allocation, RepositoryError>;
    fn allocation(&self, id: &AllocationId) -> Result<Option<Allocation>, RepositoryError>;
    fn update_allocation(&self, allocation: Allocation) -> Result<(), RepositoryError>;
    fn allocations_for(&self, user: &UserId) -> Result<Vec<Allocation>, RepositoryError>;
    fn leave_balance(
        &self,
        user: &UserId,
        year: i32,
    ) -> Result<Option<LeaveBalance>, RepositoryError>;
    fn patch_leave_balance(&self, balance: LeaveBalance) -> Result<(), RepositoryError>;
    fn proof(&self, id: &ProofId) -> Result<Option<ProofVerification>, RepositoryError>;
    fn mark_proof(&self, verification: ProofVerification) -> Result<(), RepositoryError>;
}

/// Notification persistence; recipients mutate only the read flag.
pub trait NotificationStore: Send + Sync {
    fn insert_notification(&self, notification: Notification)
        -> Result<Notification, RepositoryError>;
    fn notification(&self, id: &NotificationId) -> Result<Option<Notification>, RepositoryError>;
    fn update_notification(&self, notification: Notification) -> Result<(), RepositoryError>;
    fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>, RepositoryError>;
    /// Delete notifications whose expiry is at or before `now`, returning the count.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

/// Every collaborator contract behind one type, as wired by the HTTP layer.
pub trait StaffingStore: Directory + RequestRepository + LedgerStore + NotificationStore {}

impl<T> StaffingStore for T where T: Directory + RequestRepository + LedgerStore + NotificationStore {}
