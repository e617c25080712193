//! Enables FORCE ROW LEVEL SECURITY on every tenant table.
//!
//! Policies then apply to the table owner as well, so a connection that
//! forgets `SET LOCAL app.current_organization_id` sees no rows at all.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&alter_all("FORCE"))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&alter_all("NO FORCE"))
            .await?;
        Ok(())
    }
}

const TENANT_TABLES: &[&str] = &[
    "organizations",
    "trust_accounts",
    "client_ledgers",
    "trust_transactions",
    "bank_statement_imports",
    "bank_statement_lines",
    "reconciliations",
    "invoice_sequences",
    "invoices",
    "invoice_line_items",
    "payments",
];

fn alter_all(mode: &str) -> String {
    TENANT_TABLES
        .iter()
        .map(|table| format!("ALTER TABLE {table} {mode} ROW LEVEL SECURITY;\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alter_all_covers_every_table() {
        let sql = alter_all("FORCE");
        assert_eq!(sql.lines().count(), TENANT_TABLES.len());
        assert!(sql.contains("ALTER TABLE invoices FORCE ROW LEVEL SECURITY;"));
        assert!(alter_all("NO FORCE").contains("payments NO FORCE ROW LEVEL SECURITY"));
    }
}
