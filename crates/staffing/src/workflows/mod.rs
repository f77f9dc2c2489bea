pub mod approvals;
pub mod notifications;
