//! `SeaORM` Entity for trust_transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "trust_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub trust_account_id: Uuid,
    pub client_ledger_id: Uuid,
    pub transaction_type: String,
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    pub transaction_date: Date,
    pub reference: Option<String>,
    pub reversal_of: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub cleared_statement_id: Option<Uuid>,
    pub cleared_period_end: Option<Date>,
    pub cleared_by: Option<Uuid>,
    pub cleared_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client_ledgers::Entity",
        from = "Column::ClientLedgerId",
        to = "super::client_ledgers::Column::Id"
    )]
    ClientLedgers,
    #[sea_orm(
        belongs_to = "super::bank_statement_imports::Entity",
        from = "Column::ClearedStatementId",
        to = "super::bank_statement_imports::Column::Id"
    )]
    BankStatementImports,
}

impl Related<super::client_ledgers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientLedgers.def()
    }
}

impl Related<super::bank_statement_imports::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankStatementImports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
