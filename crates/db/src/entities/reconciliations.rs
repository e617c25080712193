//! `SeaORM` Entity for reconciliations table.
//!
//! The computed report is kept whole in `report` (JSONB); the columns beside
//! it exist for filtering and the approval check constraint.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "reconciliations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub trust_account_id: Uuid,
    pub statement_import_id: Option<Uuid>,
    pub period_start: Date,
    pub period_end: Date,
    pub status: String,
    pub is_balanced: bool,
    #[sea_orm(column_type = "JsonBinary")]
    pub report: Json,
    pub prepared_by: Uuid,
    pub prepared_at: DateTimeWithTimeZone,
    pub submitted_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTimeWithTimeZone>,
    pub override_justification: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trust_accounts::Entity",
        from = "Column::TrustAccountId",
        to = "super::trust_accounts::Column::Id"
    )]
    TrustAccounts,
}

impl Related<super::trust_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrustAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
