use std::collections::HashMap;

use crate::access::domain::{Actor, Role};
use crate::access::ownership::{AccessTarget, OwnershipRule};

use super::domain::{RequestKind, Stage};

/// One way an actor can be the designated approver of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageApprover {
    pub role: Role,
    /// Relationship the actor must also hold to the request, if any.
    pub relation: Option<OwnershipRule>,
}

impl StageApprover {
    pub const fn role(role: Role) -> Self {
        Self {
            role,
            relation: None,
        }
    }

    pub const fn related(role: Role, relation: OwnershipRule) -> Self {
        Self {
            role,
            relation: Some(relation),
        }
    }

    pub fn admits(&self, actor: &Actor, target: &AccessTarget) -> bool {
        actor.role == self.role
            && self
                .relation
                .map_or(true, |relation| relation.holds(actor, target))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    pub stage: Stage,
    pub approvers: Vec<StageApprover>,
}

impl StageDefinition {
    pub fn designates(&self, actor: &Actor, target: &AccessTarget) -> bool {
        self.approvers
            .iter()
            .any(|approver| approver.admits(actor, target))
    }
}

/// Fixed stage order for one request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSequence {
    stages: Vec<StageDefinition>,
    /// Roles that may satisfy the first stage without being designated for it.
    bypass: Vec<Role>,
}

impl StageSequence {
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn first(&self) -> &StageDefinition {
        // Non-empty by construction in `StageTableBuilder::build`.
        &self.stages[0]
    }

    pub fn position(&self, stage: Stage) -> Option<usize> {
        self.stages.iter().position(|entry| entry.stage == stage)
    }

    pub fn get(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    pub fn can_bypass(&self, role: Role) -> bool {
        self.bypass.contains(&role)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StageTableError {
    #[error("no stages configured for {0}")]
    EmptySequence(RequestKind),
    #[error("stage {stage} of {kind} has no approvers")]
    NoApprovers { kind: RequestKind, stage: Stage },
    #[error("stage {stage} appears twice for {kind}")]
    RepeatedStage { kind: RequestKind, stage: Stage },
    #[error("no sequence configured for {0}")]
    MissingKind(RequestKind),
}

/// Stage sequences per request kind, immutable once built.
#[derive(Debug, Clone)]
pub struct StageTable {
    sequences: HashMap<RequestKind, StageSequence>,
}

impl StageTable {
    pub fn builder() -> StageTableBuilder {
        StageTableBuilder::default()
    }

    /// Default sequences used by the service.
    pub fn standard() -> Self {
        use OwnershipRule::{LineManagerOfSubject, ProjectManager};
        use Role::{Admin, Hr, LineManager, Pm};

        let line_manager = || StageDefinition {
            stage: Stage::LineManager,
            approvers: vec![StageApprover::related(LineManager, LineManagerOfSubject)],
        };
        let hr = || StageDefinition {
            stage: Stage::Hr,
            approvers: vec![StageApprover::role(Hr), StageApprover::role(Admin)],
        };
        let project_manager = StageDefinition {
            stage: Stage::ProjectManager,
            approvers: vec![
                StageApprover::related(Pm, ProjectManager),
                StageApprover::role(Admin),
            ],
        };

        let bypass = vec![Hr, Admin];
        let sequences = [
            (RequestKind::Resource, vec![line_manager(), hr()]),
            (RequestKind::Leave, vec![line_manager(), hr()]),
            (
                RequestKind::Overtime,
                vec![line_manager(), project_manager, hr()],
            ),
            (RequestKind::SkillVerification, vec![line_manager()]),
        ]
        .into_iter()
        .map(|(kind, stages)| {
            let sequence = StageSequence {
                stages,
                bypass: bypass.clone(),
            };
            (kind, sequence)
        })
        .collect();

        Self { sequences }
    }

    pub fn sequence(&self, kind: RequestKind) -> &StageSequence {
        // Every kind is present; `build` refuses a table with a missing kind.
        &self.sequences[&kind]
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Default)]
pub struct StageTableBuilder {
    sequences: Vec<(RequestKind, Vec<StageDefinition>, Vec<Role>)>,
}

impl StageTableBuilder {
    pub fn sequence(
        mut self,
        kind: RequestKind,
        stages: Vec<StageDefinition>,
        bypass: &[Role],
    ) -> Self {
        self.sequences.push((kind, stages, bypass.to_vec()));
        self
    }

    pub fn build(self) -> Result<StageTable, StageTableError> {
        let mut sequences = HashMap::new();
        for (kind, stages, bypass) in self.sequences {
            if stages.is_empty() {
                return Err(StageTableError::EmptySequence(kind));
            }
            for (index, definition) in stages.iter().enumerate() {
                if definition.approvers.is_empty() {
                    return Err(StageTableError::NoApprovers {
                        kind,
                        stage: definition.stage,
                    });
                }
                if stages[..index]
                    .iter()
                    .any(|earlier| earlier.stage == definition.stage)
                {
                    return Err(StageTableError::RepeatedStage {
                        kind,
                        stage: definition.stage,
                    });
                }
            }
            sequences.insert(kind, StageSequence { stages, bypass });
        }

        for kind in [
            RequestKind::Resource,
            RequestKind::Leave,
            RequestKind::Overtime,
            RequestKind::SkillVerification,
        ] {
            if !sequences.contains_key(&kind) {
                return Err(StageTableError::MissingKind(kind));
            }
        }

        Ok(StageTable { sequences })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_order(table: &StageTable, kind: RequestKind) -> Vec<Stage> {
        table
            .sequence(kind)
            .stages()
            .iter()
            .map(|definition| definition.stage)
            .collect()
    }

    #[test]
    fn standard_orders_match_request_kinds() {
        let table = StageTable::standard();
        assert_eq!(
            stage_order(&table, RequestKind::Resource),
            vec![Stage::LineManager, Stage::Hr]
        );
        assert_eq!(
            stage_order(&table, RequestKind::Overtime),
            vec![Stage::LineManager, Stage::ProjectManager, Stage::Hr]
        );
        assert_eq!(
            stage_order(&table, RequestKind::SkillVerification),
            vec![Stage::LineManager]
        );
        assert!(table.sequence(RequestKind::Leave).can_bypass(Role::Hr));
        assert!(!table.sequence(RequestKind::Leave).can_bypass(Role::Pm));
    }

    #[test]
    fn builder_rejects_empty_and_missing_sequences() {
        let empty = StageTable::builder()
            .sequence(RequestKind::Resource, Vec::new(), &[])
            .build();
        assert_eq!(
            empty.unwrap_err(),
            StageTableError::EmptySequence(RequestKind::Resource)
        );

        let hr_only = StageDefinition {
            stage: Stage::Hr,
            approvers: vec![StageApprover::role(Role::Hr)],
        };
        let partial = StageTable::builder()
            .sequence(RequestKind::Resource, vec![hr_only], &[])
            .build();
        assert_eq!(
            partial.unwrap_err(),
            StageTableError::MissingKind(RequestKind::Leave)
        );
    }

    #[test]
    fn relation_is_required_alongside_role() {
        let approver = StageApprover::related(Role::LineManager, OwnershipRule::LineManagerOfSubject);
        let manager = Actor {
            user_id: crate::access::domain::UserId::new("u-lm"),
            email: "lm@example.com".to_string(),
            role: Role::LineManager,
        };
        let target = AccessTarget::subject(crate::access::domain::UserId::new("u-1"))
            .with_line_manager(Some(crate::access::domain::UserId::new("u-other")));

        assert!(!approver.admits(&manager, &target));
        let target = target.with_line_manager(Some(manager.user_id.clone()));
        assert!(approver.admits(&manager, &target));
    }
}
