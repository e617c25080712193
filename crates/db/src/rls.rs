//! Row-Level Security (RLS) context management.
//!
//! Every repository operation runs inside one explicit transaction that starts
//! with `SET LOCAL app.current_organization_id`, so the tenant policies from
//! the initial migration scope every statement to the caller's organization.
//! The setting dies with the transaction.

use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

use frith_shared::types::OrganizationId;

/// Begins a transaction scoped to `organization_id`.
///
/// Dropping the returned transaction without committing rolls it back.
///
/// # Errors
///
/// Returns an error if the transaction cannot be started or the RLS
/// context cannot be set.
pub async fn begin_scoped(
    db: &DatabaseConnection,
    organization_id: OrganizationId,
) -> Result<DatabaseTransaction, DbErr> {
    let txn = db.begin().await?;
    set_rls_context(&txn, organization_id).await?;
    Ok(txn)
}

/// Sets the RLS context on an existing transaction.
///
/// # Errors
///
/// Returns an error if the RLS context cannot be set.
pub async fn set_rls_context(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
) -> Result<(), DbErr> {
    txn.execute_unprepared(&rls_sql(organization_id)).await?;
    Ok(())
}

// The id is a typed UUID, never caller-supplied text.
fn rls_sql(organization_id: OrganizationId) -> String {
    format!("SET LOCAL app.current_organization_id = '{organization_id}'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_rls_sql_format() {
        let org_id = OrganizationId::from_uuid(
            Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
        );
        assert_eq!(
            rls_sql(org_id),
            "SET LOCAL app.current_organization_id = '550e8400-e29b-41d4-a716-446655440000'"
        );
    }
}
