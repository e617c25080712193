//! `SeaORM` Entity for bank_statement_lines table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "bank_statement_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub statement_import_id: Uuid,
    pub position: i32,
    pub line_date: Date,
    pub amount: i64,
    pub description: String,
    pub reference: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bank_statement_imports::Entity",
        from = "Column::StatementImportId",
        to = "super::bank_statement_imports::Column::Id"
    )]
    BankStatementImports,
}

impl Related<super::bank_statement_imports::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BankStatementImports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
