use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One permitted (source base, target base) pair under an agreement.
/// Rows are written once, at agreement creation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_agreement_detail")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub transfer_agreement_id: i32,
    pub source_base_id: i32,
    pub target_base_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transfer_agreement::Entity",
        from = "Column::TransferAgreementId",
        to = "super::transfer_agreement::Column::Id",
        on_delete = "Cascade"
    )]
    TransferAgreement,
    #[sea_orm(
        belongs_to = "super::base::Entity",
        from = "Column::SourceBaseId",
        to = "super::base::Column::Id"
    )]
    SourceBase,
    #[sea_orm(
        belongs_to = "super::base::Entity",
        from = "Column::TargetBaseId",
        to = "super::base::Column::Id"
    )]
    TargetBase,
}

impl Related<super::transfer_agreement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransferAgreement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
