use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::access::domain::{ProjectId, UserId};

use super::domain::RequestId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationId(pub String);

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Active,
    Completed,
    Cancelled,
}

/// A user's assignment to a project at a share of capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub user: UserId,
    pub project: ProjectId,
    pub percentage: u8,
    pub role: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: AllocationStatus,
    /// Request whose approval created the allocation, if any.
    pub source_request: Option<RequestId>,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }
}

/// Fields a privileged role may edit on an existing allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AllocationPatch {
    pub percentage: Option<u8>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<AllocationStatus>,
}

/// Per-user, per-year leave accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub user: UserId,
    pub year: i32,
    pub entitlement: u32,
    pub used: u32,
    pub compensatory_balance: u32,
    pub compensatory_used: u32,
    /// Requests whose effect has already been applied to this balance.
    #[serde(default)]
    pub applied_requests: BTreeSet<RequestId>,
}

impl LeaveBalance {
    pub fn opening(user: UserId, year: i32, entitlement: u32) -> Self {
        Self {
            user,
            year,
            entitlement,
            used: 0,
            compensatory_balance: 0,
            compensatory_used: 0,
            applied_requests: BTreeSet::new(),
        }
    }

    pub fn remaining(&self) -> i64 {
        i64::from(self.entitlement) - i64::from(self.used)
    }

    pub fn compensatory_available(&self) -> i64 {
        i64::from(self.compensatory_balance) - i64::from(self.compensatory_used)
    }

    pub fn total_available(&self) -> i64 {
        self.remaining() + self.compensatory_available()
    }

    pub fn has_applied(&self, request: &RequestId) -> bool {
        self.applied_requests.contains(request)
    }

    pub fn view(&self) -> LeaveBalanceView {
        LeaveBalanceView {
            user: self.user.clone(),
            year: self.year,
            entitlement: self.entitlement,
            used: self.used,
            remaining: self.remaining(),
            compensatory_balance: self.compensatory_balance,
            compensatory_used: self.compensatory_used,
            total_available: self.total_available(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveBalanceView {
    pub user: UserId,
    pub year: i32,
    pub entitlement: u32,
    pub used: u32,
    pub remaining: i64,
    pub compensatory_balance: u32,
    pub compensatory_used: u32,
    pub total_available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofId(pub String);

impl fmt::Display for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Pending,
    Verified,
    Rejected,
}

/// Verification state of an uploaded skill proof document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofVerification {
    pub id: ProofId,
    pub owner: UserId,
    pub status: ProofStatus,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl ProofVerification {
    pub fn pending(id: ProofId, owner: UserId) -> Self {
        Self {
            id,
            owner,
            status: ProofStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            note: None,
        }
    }
}
