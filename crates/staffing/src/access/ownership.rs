use serde::{Deserialize, Serialize};

use super::domain::{Actor, ProjectId, UserId};

/// Relationship predicates between an actor and a target, independent of role grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipRule {
    /// Actor is the subject, owner, or recipient of the target.
    SelfTarget,
    /// Actor is the line manager of the target's subject.
    LineManagerOfSubject,
    /// Actor raised the request.
    Requester,
    /// Actor manages the project the target belongs to.
    ProjectManager,
}

impl OwnershipRule {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SelfTarget => "self",
            Self::LineManagerOfSubject => "line_manager_of_subject",
            Self::Requester => "requester",
            Self::ProjectManager => "project_manager",
        }
    }

    /// Evaluate the predicate; a field the rule needs but the target lacks is a deny.
    pub fn holds(self, actor: &Actor, target: &AccessTarget) -> bool {
        let matches = |candidate: &Option<UserId>| candidate.as_ref().is_some_and(|id| actor.is(id));
        match self {
            Self::SelfTarget => matches(&target.subject),
            Self::LineManagerOfSubject => matches(&target.subject_line_manager),
            Self::Requester => matches(&target.requester),
            Self::ProjectManager => matches(&target.project_manager),
        }
    }
}

/// Facts about the object being acted on, resolved by the caller before authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessTarget {
    pub subject: Option<UserId>,
    pub subject_line_manager: Option<UserId>,
    pub requester: Option<UserId>,
    pub project: Option<ProjectId>,
    pub project_manager: Option<UserId>,
}

impl AccessTarget {
    pub fn subject(subject: UserId) -> Self {
        Self {
            subject: Some(subject),
            ..Self::default()
        }
    }

    pub fn with_line_manager(mut self, manager: Option<UserId>) -> Self {
        self.subject_line_manager = manager;
        self
    }

    pub fn with_requester(mut self, requester: UserId) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn with_project(mut self, project: ProjectId, manager: UserId) -> Self {
        self.project = Some(project);
        self.project_manager = Some(manager);
        self
    }
}
