//! Organization repository.
//!
//! Organizations are the tenant boundary. Their own row sits under the same
//! RLS policy as everything else, so creation runs scoped to the new id.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use tracing::info;

use frith_shared::types::OrganizationId;

use crate::entities::organizations;
use crate::rls::begin_scoped;

/// Organization repository.
#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    db: DatabaseConnection,
}

impl OrganizationRepository {
    /// Creates a new organization repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an organization and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, name: &str) -> Result<OrganizationId, DbErr> {
        let id = OrganizationId::new();
        let txn = begin_scoped(&self.db, id).await?;
        organizations::ActiveModel {
            id: Set(id.into_inner()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        info!(organization_id = %id, "Organization created");
        Ok(id)
    }

    /// Finds an organization by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(
        &self,
        id: OrganizationId,
    ) -> Result<Option<organizations::Model>, DbErr> {
        let txn = begin_scoped(&self.db, id).await?;
        let model = organizations::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await?;
        txn.commit().await?;
        Ok(model)
    }
}
