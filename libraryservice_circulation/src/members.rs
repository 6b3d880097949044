use std::sync::Arc;

use crate::api::Member;
use crate::error::{required, LibraryError};
use crate::library_repository::{LibraryRepository, RepositoryError};

#[derive(Clone)]
pub struct MemberRegistry {
    repository: Arc<dyn LibraryRepository>,
}

impl MemberRegistry {
    pub fn new(repository: Arc<dyn LibraryRepository>) -> Self {
        Self { repository }
    }

    /// Registers a member. There is no lookup before the insert,
    /// a taken id is only rejected by the store itself.
    pub async fn add_member(&self, member: Member) -> Result<Member, LibraryError> {
        let member = Member {
            id: required("id", &member.id)?,
            name: required("name", &member.name)?,
        };

        match self.repository.insert_member(member.clone()).await {
            Ok(()) => {
                tracing::info!("Member {} with id {} added", member.name, member.id);
                Ok(member)
            }
            Err(RepositoryError::DuplicateMember(member_id)) => {
                Err(LibraryError::MemberAlreadyExists(member_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_member(&self, member_id: &str) -> Result<Member, LibraryError> {
        self.repository
            .get_member(member_id)
            .await?
            .ok_or_else(|| LibraryError::MemberNotFound(member_id.to_string()))
    }

    pub async fn list_members(&self) -> Result<Vec<Member>, LibraryError> {
        Ok(self.repository.list_members().await?)
    }
}
