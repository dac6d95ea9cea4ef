use crate::{
    commands::shipments::{
        update_shipment_command::UpdateShipmentResult, CancelShipmentCommand,
        CreateShipmentCommand, SendShipmentCommand, UpdateShipmentCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{base, shipment, shipment_detail, transfer_agreement},
    errors::ServiceError,
    events::EventSender,
};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;

/// Service for managing shipments
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ShipmentService {
    /// Creates a new shipment service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new shipment
    #[instrument(skip(self))]
    pub async fn create_shipment(
        &self,
        command: CreateShipmentCommand,
    ) -> Result<shipment::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Updates a shipment's box list
    #[instrument(skip(self))]
    pub async fn update_shipment(
        &self,
        command: UpdateShipmentCommand,
    ) -> Result<UpdateShipmentResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn send_shipment(
        &self,
        shipment_id: i32,
        user_id: i32,
    ) -> Result<shipment::Model, ServiceError> {
        SendShipmentCommand {
            shipment_id,
            user_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Cancels a shipment
    #[instrument(skip(self))]
    pub async fn cancel_shipment(
        &self,
        shipment_id: i32,
        user_id: i32,
    ) -> Result<shipment::Model, ServiceError> {
        CancelShipmentCommand {
            shipment_id,
            user_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Gets a shipment by ID
    #[instrument(skip(self))]
    pub async fn get_shipment(&self, shipment_id: i32) -> Result<shipment::Model, ServiceError> {
        shipment::Entity::find_by_id(shipment_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))
    }

    /// Shipments under agreements the organisation takes part in
    #[instrument(skip(self))]
    pub async fn list_for_organisation(
        &self,
        organisation_id: i32,
    ) -> Result<Vec<shipment::Model>, ServiceError> {
        shipment::Entity::find()
            .inner_join(transfer_agreement::Entity)
            .filter(
                Condition::any()
                    .add(transfer_agreement::Column::SourceOrganisationId.eq(organisation_id))
                    .add(transfer_agreement::Column::TargetOrganisationId.eq(organisation_id)),
            )
            .order_by_asc(shipment::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Detail rows that have not been deleted, including received and lost ones
    #[instrument(skip(self))]
    pub async fn active_details(
        &self,
        shipment_id: i32,
    ) -> Result<Vec<shipment_detail::Model>, ServiceError> {
        shipment_detail::Entity::find()
            .filter(shipment_detail::Column::ShipmentId.eq(shipment_id))
            .filter(shipment_detail::Column::DeletedOn.is_null())
            .order_by_asc(shipment_detail::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Organisation owning the base
    #[instrument(skip(self))]
    pub async fn organisation_of_base(&self, base_id: i32) -> Result<i32, ServiceError> {
        base::Entity::find_by_id(base_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .map(|base| base.organisation_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Base {} not found", base_id)))
    }

    /// The agreement a shipment runs under
    #[instrument(skip(self))]
    pub async fn agreement_of(
        &self,
        shipment: &shipment::Model,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        transfer_agreement::Entity::find_by_id(shipment.transfer_agreement_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Transfer agreement {} not found",
                    shipment.transfer_agreement_id
                ))
            })
    }
}
