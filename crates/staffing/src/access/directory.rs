use std::sync::Arc;

use super::domain::{Actor, UserId, UserRecord};
use super::guard::AccessError;
use crate::repository::Directory;

/// Resolves caller identities to actors through the directory collaborator.
pub struct ActorResolver<D> {
    directory: Arc<D>,
}

impl<D> Clone for ActorResolver<D> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
        }
    }
}

impl<D> ActorResolver<D>
where
    D: Directory + 'static,
{
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Look up by e-mail, ignoring case and surrounding whitespace.
    pub fn resolve_email(&self, email: &str) -> Result<Actor, AccessError> {
        let normalized = email.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(AccessError::UnknownActor(email.to_string()));
        }
        let record = self
            .directory
            .user_by_email(&normalized)?
            .ok_or_else(|| AccessError::UnknownActor(email.to_string()))?;
        Self::active(record)
    }

    pub fn resolve_id(&self, id: &UserId) -> Result<Actor, AccessError> {
        let record = self
            .directory
            .user_by_id(id)?
            .ok_or_else(|| AccessError::UnknownActor(id.to_string()))?;
        Self::active(record)
    }

    fn active(record: UserRecord) -> Result<Actor, AccessError> {
        if !record.active {
            return Err(AccessError::InactiveActor(record.email));
        }
        Ok(Actor::from_record(&record))
    }
}
