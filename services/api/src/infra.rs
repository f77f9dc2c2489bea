use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use staffing::access::{ProjectId, ProjectRecord, Role, UserId, UserRecord};
use staffing::error::AppError;
use staffing::memory::InMemoryStore;
use staffing::workflows::approvals::{ProofId, ProofVerification};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Directory contents loaded into the in-memory store at start-up.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SeedDirectory {
    #[serde(default)]
    pub(crate) users: Vec<UserRecord>,
    #[serde(default)]
    pub(crate) projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub(crate) proofs: Vec<ProofVerification>,
}

impl SeedDirectory {
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let seed = serde_json::from_str(&raw).map_err(std::io::Error::from)?;
        Ok(seed)
    }

    /// A small organisation covering every role, used by the demo and by default.
    pub(crate) fn sample() -> Self {
        let user = |id: &str, name: &str, role: Role, line_manager: Option<&str>| UserRecord {
            id: UserId::new(id),
            email: format!("{id}@staffing.local"),
            name: name.to_string(),
            role,
            line_manager: line_manager.map(UserId::new),
            active: true,
        };
        let project = |id: &str, name: &str, manager: &str| ProjectRecord {
            id: ProjectId::new(id),
            name: name.to_string(),
            manager: UserId::new(manager),
            active: true,
        };

        Self {
            users: vec![
                user("ada", "Ada Admin", Role::Admin, None),
                user("hugo", "Hugo HR", Role::Hr, None),
                user("petra", "Petra PM", Role::Pm, Some("lars")),
                user("lars", "Lars Line", Role::LineManager, None),
                user("emma", "Emma Engineer", Role::Employee, Some("lars")),
                user("noah", "Noah Analyst", Role::Employee, Some("lars")),
            ],
            projects: vec![
                project("atlas", "Atlas migration", "petra"),
                project("beacon", "Beacon analytics", "petra"),
            ],
            proofs: vec![ProofVerification::pending(
                ProofId("cert-emma-k8s".to_string()),
                UserId::new("emma"),
            )],
        }
    }

    pub(crate) fn load_into(self, store: &InMemoryStore) {
        let (users, projects, proofs) = (self.users.len(), self.projects.len(), self.proofs.len());
        for user in self.users {
            store.upsert_user(user);
        }
        for project in self.projects {
            store.upsert_project(project);
        }
        for proof in self.proofs {
            store.register_proof(proof);
        }
        tracing::info!(users, projects, proofs, "directory seeded");
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use staffing::repository::Directory;

    #[test]
    fn sample_directory_gives_every_employee_a_line_manager() {
        let store = InMemoryStore::new();
        SeedDirectory::sample().load_into(&store);

        for id in ["emma", "noah"] {
            let user = store
                .user_by_id(&UserId::new(id))
                .expect("lookup")
                .expect("seeded");
            assert_eq!(user.line_manager, Some(UserId::new("lars")));
        }
    }

    #[test]
    fn seed_json_uses_domain_field_names() {
        let raw = r#"{
            "users": [{
                "id": "u-1", "email": "u1@corp.test", "name": "One",
                "role": "hr", "line_manager": null, "active": true
            }],
            "projects": [{ "id": "p-1", "name": "P", "manager": "u-1", "active": true }]
        }"#;
        let seed: SeedDirectory = serde_json::from_str(raw).expect("valid seed");
        assert_eq!(seed.users[0].role, Role::Hr);
        assert!(seed.proofs.is_empty());
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert!(parse_date("2031-02-03").is_ok());
        assert!(parse_date("03/02/2031").is_err());
    }
}
