use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::domain::UserId;
use crate::workflows::approvals::domain::{ApprovalStatus, RequestKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every notification the core emits, plus a carrier for foreign types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ResourceRequestSubmitted,
    ResourceRequestAdvanced,
    ResourceRequestApproved,
    ResourceRequestRejected,
    LeaveRequestSubmitted,
    LeaveRequestAdvanced,
    LeaveRequestApproved,
    LeaveRequestRejected,
    OvertimeRequestSubmitted,
    OvertimeRequestAdvanced,
    OvertimeRequestApproved,
    OvertimeRequestRejected,
    SkillVerificationSubmitted,
    SkillVerified,
    SkillVerificationRejected,
    RequestCancelled,
    RoleChanged,
    /// Type produced outside the core; classified as a medium-priority system message.
    Other(String),
}

impl NotificationType {
    pub fn submitted(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Resource => Self::ResourceRequestSubmitted,
            RequestKind::Leave => Self::LeaveRequestSubmitted,
            RequestKind::Overtime => Self::OvertimeRequestSubmitted,
            RequestKind::SkillVerification => Self::SkillVerificationSubmitted,
        }
    }

    /// Type reporting that a request of `kind` moved to `status`.
    pub fn for_status(kind: RequestKind, status: ApprovalStatus) -> Self {
        use ApprovalStatus::*;
        match (kind, status) {
            (_, Cancelled) => Self::RequestCancelled,
            (RequestKind::Resource, Approved) => Self::ResourceRequestApproved,
            (RequestKind::Resource, Rejected) => Self::ResourceRequestRejected,
            (RequestKind::Resource, PendingLm | PendingPm | PendingHr) => {
                Self::ResourceRequestAdvanced
            }
            (RequestKind::Leave, Approved) => Self::LeaveRequestApproved,
            (RequestKind::Leave, Rejected) => Self::LeaveRequestRejected,
            (RequestKind::Leave, PendingLm | PendingPm | PendingHr) => Self::LeaveRequestAdvanced,
            (RequestKind::Overtime, Approved) => Self::OvertimeRequestApproved,
            (RequestKind::Overtime, Rejected) => Self::OvertimeRequestRejected,
            (RequestKind::Overtime, PendingLm | PendingPm | PendingHr) => {
                Self::OvertimeRequestAdvanced
            }
            (RequestKind::SkillVerification, Approved) => Self::SkillVerified,
            (RequestKind::SkillVerification, Rejected) => Self::SkillVerificationRejected,
            (RequestKind::SkillVerification, PendingLm | PendingPm | PendingHr) => {
                Self::SkillVerificationSubmitted
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::ResourceRequestSubmitted => "resource_request_submitted",
            Self::ResourceRequestAdvanced => "resource_request_advanced",
            Self::ResourceRequestApproved => "resource_request_approved",
            Self::ResourceRequestRejected => "resource_request_rejected",
            Self::LeaveRequestSubmitted => "leave_request_submitted",
            Self::LeaveRequestAdvanced => "leave_request_advanced",
            Self::LeaveRequestApproved => "leave_request_approved",
            Self::LeaveRequestRejected => "leave_request_rejected",
            Self::OvertimeRequestSubmitted => "overtime_request_submitted",
            Self::OvertimeRequestAdvanced => "overtime_request_advanced",
            Self::OvertimeRequestApproved => "overtime_request_approved",
            Self::OvertimeRequestRejected => "overtime_request_rejected",
            Self::SkillVerificationSubmitted => "skill_verification_submitted",
            Self::SkillVerified => "skill_verified",
            Self::SkillVerificationRejected => "skill_verification_rejected",
            Self::RequestCancelled => "request_cancelled",
            Self::RoleChanged => "role_changed",
            Self::Other(raw) => raw,
        }
    }

    /// Notifications asking the recipient to make a decision.
    pub fn requires_action(&self) -> bool {
        matches!(
            self,
            Self::ResourceRequestSubmitted
                | Self::LeaveRequestSubmitted
                | Self::OvertimeRequestSubmitted
                | Self::SkillVerificationSubmitted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Staffing,
    Leave,
    Overtime,
    Skills,
    Account,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Category and priority for a notification type.
pub fn classify(notification_type: &NotificationType) -> (NotificationCategory, NotificationPriority) {
    use NotificationCategory as C;
    use NotificationPriority as P;
    use NotificationType::*;

    match notification_type {
        ResourceRequestSubmitted => (C::Staffing, P::High),
        ResourceRequestAdvanced => (C::Staffing, P::Low),
        ResourceRequestApproved => (C::Staffing, P::Medium),
        ResourceRequestRejected => (C::Staffing, P::High),
        LeaveRequestSubmitted => (C::Leave, P::High),
        LeaveRequestAdvanced => (C::Leave, P::Low),
        LeaveRequestApproved => (C::Leave, P::Medium),
        LeaveRequestRejected => (C::Leave, P::High),
        OvertimeRequestSubmitted => (C::Overtime, P::High),
        OvertimeRequestAdvanced => (C::Overtime, P::Low),
        OvertimeRequestApproved => (C::Overtime, P::Medium),
        OvertimeRequestRejected => (C::Overtime, P::High),
        SkillVerificationSubmitted => (C::Skills, P::Medium),
        SkillVerified => (C::Skills, P::Medium),
        SkillVerificationRejected => (C::Skills, P::High),
        RequestCancelled => (C::System, P::Low),
        RoleChanged => (C::Account, P::Urgent),
        Other(_) => (C::System, P::Medium),
    }
}

/// Pointer to the entity a notification talks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedResource {
    pub kind: String,
    pub id: String,
}

impl RelatedResource {
    pub fn new(kind: impl Into<String>, id: impl fmt::Display) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub notification_type: NotificationType,
    pub category: NotificationCategory,
    pub priority: NotificationPriority,
    pub message: String,
    pub read: bool,
    pub requires_action: bool,
    pub related: Option<RelatedResource>,
    /// Opaque payload carried for the UI; never interpreted here.
    pub context: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Everything a caller supplies to emit a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub notification_type: NotificationType,
    pub recipient: UserId,
    pub message: String,
    pub related: Option<RelatedResource>,
    pub priority_override: Option<NotificationPriority>,
    pub context: Option<serde_json::Value>,
}

impl NotificationDraft {
    pub fn new(
        notification_type: NotificationType,
        recipient: UserId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            recipient,
            message: message.into(),
            related: None,
            priority_override: None,
            context: None,
        }
    }

    pub fn related(mut self, related: RelatedResource) -> Self {
        self.related = Some(related);
        self
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority_override = Some(priority);
        self
    }

    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}
