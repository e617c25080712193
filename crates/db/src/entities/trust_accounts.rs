//! `SeaORM` Entity for trust_accounts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "trust_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub bank_name: String,
    pub account_number_last4: Option<String>,
    pub account_type: String,
    pub currency: String,
    pub status: String,
    pub book_balance: i64,
    pub last_reconciled_date: Option<Date>,
    pub last_reconciled_balance: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organizations::Entity",
        from = "Column::OrganizationId",
        to = "super::organizations::Column::Id"
    )]
    Organizations,
    #[sea_orm(has_many = "super::client_ledgers::Entity")]
    ClientLedgers,
}

impl Related<super::organizations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizations.def()
    }
}

impl Related<super::client_ledgers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientLedgers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
