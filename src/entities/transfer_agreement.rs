use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of box transfers covered by an agreement
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
pub enum TransferAgreementType {
    #[sea_orm(string_value = "SendingTo")]
    SendingTo,
    #[sea_orm(string_value = "ReceivingFrom")]
    ReceivingFrom,
    #[sea_orm(string_value = "Bidirectional")]
    Bidirectional,
}

/// Review state of an agreement.
///
/// Permitted transitions: `UnderReview -> {Accepted, Rejected, Canceled}` and
/// `Accepted -> Canceled`.
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
pub enum TransferAgreementState {
    #[sea_orm(string_value = "UnderReview")]
    UnderReview,
    #[sea_orm(string_value = "Accepted")]
    Accepted,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
    #[sea_orm(string_value = "Canceled")]
    Canceled,
    #[sea_orm(string_value = "Expired")]
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_agreement")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub source_organisation_id: i32,
    #[sea_orm(indexed)]
    pub target_organisation_id: i32,
    pub r#type: TransferAgreementType,
    pub state: TransferAgreementState,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub requested_by: i32,
    pub requested_on: DateTime<Utc>,
    pub accepted_by: Option<i32>,
    pub accepted_on: Option<DateTime<Utc>>,
    pub terminated_by: Option<i32>,
    pub terminated_on: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl Model {
    /// Whether `now` lies inside the agreement's validity window
    pub fn is_in_effect_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && self.valid_until.map_or(true, |until| now <= until)
    }

    /// Whether the organisation is one of the two parties
    pub fn involves(&self, organisation_id: i32) -> bool {
        self.source_organisation_id == organisation_id
            || self.target_organisation_id == organisation_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transfer_agreement_detail::Entity")]
    Detail,
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipment,
}

impl Related<super::transfer_agreement_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Detail.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
