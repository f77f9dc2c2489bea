use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::access::domain::{ProjectId, Role, UserId};
use crate::access::permissions::ResourceCategory;

use super::ledger::ProofId;

/// Identifier wrapper for approval requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Resource,
    Leave,
    Overtime,
    SkillVerification,
}

impl RequestKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Resource => "resource_request",
            Self::Leave => "leave_request",
            Self::Overtime => "overtime_request",
            Self::SkillVerification => "skill_verification",
        }
    }

    /// Permission-table category governing requests of this kind.
    pub const fn category(self) -> ResourceCategory {
        match self {
            Self::Resource => ResourceCategory::ResourceRequests,
            Self::Leave | Self::Overtime => ResourceCategory::WorkRequests,
            Self::SkillVerification => ResourceCategory::Skills,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One reviewer step in a request's fixed sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LineManager,
    ProjectManager,
    Hr,
}

impl Stage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::LineManager => "line_manager",
            Self::ProjectManager => "project_manager",
            Self::Hr => "hr",
        }
    }

    pub const fn pending_status(self) -> ApprovalStatus {
        match self {
            Self::LineManager => ApprovalStatus::PendingLm,
            Self::ProjectManager => ApprovalStatus::PendingPm,
            Self::Hr => ApprovalStatus::PendingHr,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    PendingLm,
    PendingPm,
    PendingHr,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingLm => "pending_lm",
            Self::PendingPm => "pending_pm",
            Self::PendingHr => "pending_hr",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn pending_stage(self) -> Option<Stage> {
        match self {
            Self::PendingLm => Some(Stage::LineManager),
            Self::PendingPm => Some(Stage::ProjectManager),
            Self::PendingHr => Some(Stage::Hr),
            Self::Approved | Self::Rejected | Self::Cancelled => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        self.pending_stage().is_none()
    }

    /// Pending or approved requests block a second request for the same target.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Rejected | Self::Cancelled)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

/// Per-stage audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub stage: Stage,
    pub status: RecordStatus,
    pub approver: Option<UserId>,
    pub approver_role: Option<Role>,
    pub reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Set when a higher-authority role satisfied a stage it is not designated for.
    #[serde(default)]
    pub via_bypass: bool,
}

impl ApprovalRecord {
    pub fn pending(stage: Stage) -> Self {
        Self {
            stage,
            status: RecordStatus::Pending,
            approver: None,
            approver_role: None,
            reason: None,
            decided_at: None,
            via_bypass: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequestDetails {
    pub project: ProjectId,
    pub percentage: u8,
    pub role: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Compensatory,
    Unpaid,
}

impl LeaveType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Sick => "sick",
            Self::Compensatory => "compensatory",
            Self::Unpaid => "unpaid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequestDetails {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Working days in the window, fixed at submission.
    pub days_requested: u32,
    pub reason: String,
    pub covering_user: Option<UserId>,
}

impl LeaveRequestDetails {
    pub fn overlaps(&self, other: &LeaveRequestDetails) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationType {
    Paid,
    TimeOff,
    Mixed,
}

impl CompensationType {
    pub const fn includes_time_off(self) -> bool {
        matches!(self, Self::TimeOff | Self::Mixed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvertimeRequestDetails {
    pub project: ProjectId,
    pub date: NaiveDate,
    pub hours: f64,
    pub compensation: CompensationType,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillVerificationDetails {
    pub skill: SkillId,
    pub proof: ProofId,
    pub claimed_level: u8,
}

/// Immutable "requested" fields of each request variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetails {
    Resource(ResourceRequestDetails),
    Leave(LeaveRequestDetails),
    Overtime(OvertimeRequestDetails),
    SkillVerification(SkillVerificationDetails),
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestDetails::Resource(_) => RequestKind::Resource,
            RequestDetails::Leave(_) => RequestKind::Leave,
            RequestDetails::Overtime(_) => RequestKind::Overtime,
            RequestDetails::SkillVerification(_) => RequestKind::SkillVerification,
        }
    }

    pub fn project(&self) -> Option<&ProjectId> {
        match self {
            RequestDetails::Resource(details) => Some(&details.project),
            RequestDetails::Overtime(details) => Some(&details.project),
            RequestDetails::Leave(_) | RequestDetails::SkillVerification(_) => None,
        }
    }

    /// Whether two requests cover the same target resource for one subject.
    pub fn same_target(&self, other: &RequestDetails) -> bool {
        match (self, other) {
            (RequestDetails::Resource(a), RequestDetails::Resource(b)) => a.project == b.project,
            (RequestDetails::Leave(a), RequestDetails::Leave(b)) => a.overlaps(b),
            (RequestDetails::Overtime(a), RequestDetails::Overtime(b)) => {
                a.project == b.project && a.date == b.date
            }
            (RequestDetails::SkillVerification(a), RequestDetails::SkillVerification(b)) => {
                a.skill == b.skill
            }
            _ => false,
        }
    }
}

/// A request moving through its approval stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub subject: UserId,
    pub requester: UserId,
    pub details: RequestDetails,
    pub status: ApprovalStatus,
    pub approvals: Vec<ApprovalRecord>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }

    pub fn category(&self) -> ResourceCategory {
        self.kind().category()
    }

    /// Duplicate-active-request guard predicate.
    pub fn blocks(&self, subject: &UserId, details: &RequestDetails) -> bool {
        self.status.is_active() && &self.subject == subject && self.details.same_target(details)
    }

    pub fn record_for(&self, stage: Stage) -> Option<&ApprovalRecord> {
        self.approvals.iter().find(|record| record.stage == stage)
    }

    pub fn status_view(&self) -> RequestStatusView {
        RequestStatusView {
            request_id: self.id.clone(),
            kind: self.kind().label(),
            status: self.status.label(),
            subject: self.subject.clone(),
            requester: self.requester.clone(),
            approvals: self.approvals.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized representation of a request's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub kind: &'static str,
    pub status: &'static str,
    pub subject: UserId,
    pub requester: UserId,
    pub approvals: Vec<ApprovalRecord>,
    pub updated_at: DateTime<Utc>,
}

/// Monday-to-Friday days between `start` and `end`, inclusive.
pub fn working_days(start: NaiveDate, end: NaiveDate) -> u32 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as u32
}
