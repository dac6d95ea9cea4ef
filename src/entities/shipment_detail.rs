use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One box's inclusion in a shipment.
///
/// `removed_on`, `lost_on` and `received_on` are terminal markers: at most one is
/// ever set, and a row carrying one accepts no further updates.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipment_detail")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub shipment_id: i32,
    #[sea_orm(indexed)]
    pub box_id: i32,
    pub source_location_id: i32,
    pub target_location_id: Option<i32>,
    pub created_by: i32,
    pub created_on: DateTime<Utc>,
    pub removed_by: Option<i32>,
    pub removed_on: Option<DateTime<Utc>>,
    pub lost_by: Option<i32>,
    pub lost_on: Option<DateTime<Utc>>,
    pub received_by: Option<i32>,
    pub received_on: Option<DateTime<Utc>>,
    pub deleted_on: Option<DateTime<Utc>>,
}

impl Model {
    /// True while no terminal marker has been set
    pub fn is_active(&self) -> bool {
        self.removed_on.is_none() && self.lost_on.is_none() && self.received_on.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::shipment::Column::Id",
        on_delete = "Cascade"
    )]
    Shipment,
    #[sea_orm(
        belongs_to = "super::boxes::Entity",
        from = "Column::BoxId",
        to = "super::boxes::Column::Id"
    )]
    Box,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl Related<super::boxes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Box.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
