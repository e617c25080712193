//! `SeaORM` Entity for client_ledgers table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "client_ledgers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub trust_account_id: Uuid,
    pub client_id: Uuid,
    pub matter_id: Option<Uuid>,
    pub name: String,
    pub balance: i64,
    pub status: String,
    pub version: i64,
    pub last_activity_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trust_accounts::Entity",
        from = "Column::TrustAccountId",
        to = "super::trust_accounts::Column::Id"
    )]
    TrustAccounts,
    #[sea_orm(has_many = "super::trust_transactions::Entity")]
    TrustTransactions,
}

impl Related<super::trust_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrustAccounts.def()
    }
}

impl Related<super::trust_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrustTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
