//! Thread-safe in-memory implementation of every collaborator contract.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::access::domain::{ProjectId, ProjectRecord, UserId, UserRecord};
use crate::access::roles::RoleChange;
use crate::repository::{
    Directory, LedgerStore, NotificationStore, RepositoryError, RequestRepository,
};
use crate::workflows::approvals::domain::{ApprovalRequest, ApprovalStatus, RequestId};
use crate::workflows::approvals::ledger::{
    Allocation, AllocationId, LeaveBalance, ProofId, ProofVerification,
};
use crate::workflows::notifications::domain::{Notification, NotificationId};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryStore {
    users: Arc<Mutex<HashMap<UserId, UserRecord>>>,
    projects: Arc<Mutex<HashMap<ProjectId, ProjectRecord>>>,
    role_changes: Arc<Mutex<Vec<RoleChange>>>,
    requests: Arc<Mutex<BTreeMap<RequestId, ApprovalRequest>>>,
    allocations: Arc<Mutex<BTreeMap<AllocationId, Allocation>>>,
    balances: Arc<Mutex<HashMap<(UserId, i32), LeaveBalance>>>,
    proofs: Arc<Mutex<HashMap<ProofId, ProofVerification>>>,
    notifications: Arc<Mutex<BTreeMap<NotificationId, Notification>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_user(&self, user: UserRecord) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id.clone(), user);
    }

    pub fn upsert_project(&self, project: ProjectRecord) {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project.id.clone(), project);
    }

    pub fn register_proof(&self, proof: ProofVerification) {
        self.proofs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(proof.id.clone(), proof);
    }

    pub fn role_changes(&self) -> Vec<RoleChange> {
        self.role_changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every stored notification regardless of recipient.
    pub fn all_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl Directory for InMemoryStore {
    fn user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(lock(&self.users)?.get(id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(lock(&self.users)?
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn project_by_id(&self, id: &ProjectId) -> Result<Option<ProjectRecord>, RepositoryError> {
        Ok(lock(&self.projects)?.get(id).cloned())
    }

    fn apply_role_change(&self, change: &RoleChange) -> Result<UserRecord, RepositoryError> {
        let mut users = lock(&self.users)?;
        let user = users.get_mut(&change.user).ok_or(RepositoryError::NotFound)?;
        user.role = change.to;
        let updated = user.clone();
        lock(&self.role_changes)?.push(change.clone());
        Ok(updated)
    }
}

impl RequestRepository for InMemoryStore {
    fn insert(&self, request: ApprovalRequest) -> Result<ApprovalRequest, RepositoryError> {
        let mut requests = lock(&self.requests)?;
        if requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, RepositoryError> {
        Ok(lock(&self.requests)?.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        expected: ApprovalStatus,
        request: ApprovalRequest,
    ) -> Result<(), RepositoryError> {
        let mut requests = lock(&self.requests)?;
        let stored = requests
            .get_mut(&request.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::StaleStatus {
                expected,
                actual: stored.status,
            });
        }
        *stored = request;
        Ok(())
    }

    fn for_subject(&self, subject: &UserId) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        Ok(lock(&self.requests)?
            .values()
            .filter(|request| &request.subject == subject)
            .cloned()
            .collect())
    }
}

impl LedgerStore for InMemoryStore {
    fn active_allocation(
        &self,
        user: &UserId,
        project: &ProjectId,
    ) -> Result<Option<Allocation>, RepositoryError> {
        Ok(lock(&self.allocations)?
            .values()
            .find(|allocation| {
                allocation.is_active() && &allocation.user == user && &allocation.project == project
            })
            .cloned())
    }

    fn insert_allocation(&self, allocation: Allocation) -> Result<Allocation, RepositoryError> {
        let mut allocations = lock(&self.allocations)?;
        let covered = allocations.values().any(|existing| {
            existing.is_active()
                && existing.user == allocation.user
                && existing.project == allocation.project
        });
        if covered || allocations.contains_key(&allocation.id) {
            return Err(RepositoryError::Conflict);
        }
        allocations.insert(allocation.id.clone(), allocation.clone());
        Ok(allocation)
    }

    fn allocation(&self, id: &AllocationId) -> Result<Option<Allocation>, RepositoryError> {
        Ok(lock(&self.allocations)?.get(id).cloned())
    }

    fn update_allocation(&self, allocation: Allocation) -> Result<(), RepositoryError> {
        let mut allocations = lock(&self.allocations)?;
        match allocations.get_mut(&allocation.id) {
            Some(stored) => {
                *stored = allocation;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn allocations_for(&self, user: &UserId) -> Result<Vec<Allocation>, RepositoryError> {
        Ok(lock(&self.allocations)?
            .values()
            .filter(|allocation| &allocation.user == user)
            .cloned()
            .collect())
    }

    fn leave_balance(
        &self,
        user: &UserId,
        year: i32,
    ) -> Result<Option<LeaveBalance>, RepositoryError> {
        Ok(lock(&self.balances)?.get(&(user.clone(), year)).cloned())
    }

    fn patch_leave_balance(&self, balance: LeaveBalance) -> Result<(), RepositoryError> {
        lock(&self.balances)?.insert((balance.user.clone(), balance.year), balance);
        Ok(())
    }

    fn proof(&self, id: &ProofId) -> Result<Option<ProofVerification>, RepositoryError> {
        Ok(lock(&self.proofs)?.get(id).cloned())
    }

    fn mark_proof(&self, verification: ProofVerification) -> Result<(), RepositoryError> {
        let mut proofs = lock(&self.proofs)?;
        match proofs.get_mut(&verification.id) {
            Some(stored) => {
                *stored = verification;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl NotificationStore for InMemoryStore {
    fn insert_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, RepositoryError> {
        let mut notifications = lock(&self.notifications)?;
        if notifications.contains_key(&notification.id) {
            return Err(RepositoryError::Conflict);
        }
        notifications.insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    fn notification(&self, id: &NotificationId) -> Result<Option<Notification>, RepositoryError> {
        Ok(lock(&self.notifications)?.get(id).cloned())
    }

    fn update_notification(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = lock(&self.notifications)?;
        match notifications.get_mut(&notification.id) {
            Some(stored) => {
                *stored = notification;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>, RepositoryError> {
        Ok(lock(&self.notifications)?
            .values()
            .filter(|notification| &notification.recipient == recipient)
            .cloned()
            .collect())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut notifications = lock(&self.notifications)?;
        let before = notifications.len();
        notifications.retain(|_, notification| !notification.is_expired(now));
        Ok(before - notifications.len())
    }
}
