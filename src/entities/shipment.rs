use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shipment state machine: `Preparing -> Sent -> Completed`, or `Preparing -> Canceled`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ShipmentState {
    #[sea_orm(string_value = "Preparing")]
    Preparing,
    #[sea_orm(string_value = "Sent")]
    Sent,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Canceled")]
    Canceled,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub source_base_id: i32,
    pub target_base_id: i32,
    #[sea_orm(indexed)]
    pub transfer_agreement_id: i32,
    pub state: ShipmentState,
    pub started_by: i32,
    pub started_on: DateTime<Utc>,
    pub sent_by: Option<i32>,
    pub sent_on: Option<DateTime<Utc>>,
    pub canceled_by: Option<i32>,
    pub canceled_on: Option<DateTime<Utc>>,
    pub completed_by: Option<i32>,
    pub completed_on: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transfer_agreement::Entity",
        from = "Column::TransferAgreementId",
        to = "super::transfer_agreement::Column::Id"
    )]
    TransferAgreement,
    #[sea_orm(has_many = "super::shipment_detail::Entity")]
    Detail,
}

impl Related<super::transfer_agreement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransferAgreement.def()
    }
}

impl Related<super::shipment_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Detail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
