//! `SeaORM` Entity for bank_statement_imports table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_statement_imports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub trust_account_id: Uuid,
    pub period_start: Date,
    pub period_end: Date,
    pub currency: String,
    pub opening_balance: i64,
    pub closing_balance: i64,
    pub format: String,
    pub imported_by: Uuid,
    pub imported_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trust_accounts::Entity",
        from = "Column::TrustAccountId",
        to = "super::trust_accounts::Column::Id"
    )]
    TrustAccounts,
    #[sea_orm(has_many = "super::bank_statement_lines::Entity")]
    BankStatementLines,
}

impl Related<super::trust_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrustAccounts.def()
    }
}

impl Related<super::bank_statement_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankStatementLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
