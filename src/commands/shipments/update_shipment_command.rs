use super::{
    active_detail_condition, ensure_shipment_state, find_shipment, transition_shipment,
};
use crate::{
    commands::{from_transaction_error, publish, Command},
    db::DbPool,
    entities::{
        boxes::{self, BoxState},
        location,
        shipment::{self, ShipmentState},
        shipment_detail,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use validator::Validate;

/// Receipt of one shipped box into a location at the target base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedShipmentDetail {
    pub shipment_detail_id: i32,
    pub target_location_id: i32,
}

/// Edits the box list of a shipment.
///
/// Preparing and removing boxes is allowed while the shipment is `Preparing`;
/// receiving and losing boxes once it is `Sent`. All changes apply in one
/// transaction. When a sent shipment has no active detail left it is completed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateShipmentCommand {
    pub shipment_id: i32,
    pub user_id: i32,
    #[serde(default)]
    #[validate(length(max = 500, message = "At most 500 boxes can be prepared at once"))]
    pub prepared_box_label_identifiers: Vec<String>,
    #[serde(default)]
    pub removed_box_label_identifiers: Vec<String>,
    #[serde(default)]
    pub received_shipment_details: Vec<ReceivedShipmentDetail>,
    #[serde(default)]
    pub lost_box_label_identifiers: Vec<String>,
}

/// Outcome of an update: the shipment after the change and whether it completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateShipmentResult {
    pub shipment: shipment::Model,
    pub completed: bool,
}

#[async_trait]
impl Command for UpdateShipmentCommand {
    type Result = UpdateShipmentResult;

    #[instrument(skip(self, db_pool, event_sender), fields(shipment_id = self.shipment_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            error!("Validation failed: {:?}", e);
            ServiceError::ValidationError(e.to_string())
        })?;

        let command = self.clone();
        let result = db_pool
            .transaction::<_, UpdateShipmentResult, ServiceError>(move |txn| {
                Box::pin(async move { command.update_shipment(txn).await })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Transaction failed for updating shipment: {}", err);
                err
            })?;

        info!(
            prepared = self.prepared_box_label_identifiers.len(),
            removed = self.removed_box_label_identifiers.len(),
            received = self.received_shipment_details.len(),
            lost = self.lost_box_label_identifiers.len(),
            "Shipment updated"
        );

        publish(&event_sender, Event::ShipmentUpdated(self.shipment_id)).await;
        if result.completed {
            info!("Shipment completed");
            publish(&event_sender, Event::ShipmentCompleted(self.shipment_id)).await;
        }

        Ok(result)
    }
}

impl UpdateShipmentCommand {
    fn edits_box_list(&self) -> bool {
        !self.prepared_box_label_identifiers.is_empty()
            || !self.removed_box_label_identifiers.is_empty()
    }

    fn records_outcomes(&self) -> bool {
        !self.received_shipment_details.is_empty() || !self.lost_box_label_identifiers.is_empty()
    }

    async fn update_shipment(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<UpdateShipmentResult, ServiceError> {
        let shipment = find_shipment(txn, self.shipment_id).await?;

        if self.edits_box_list() {
            ensure_shipment_state(&shipment, ShipmentState::Preparing)?;
        }
        if self.records_outcomes() {
            ensure_shipment_state(&shipment, ShipmentState::Sent)?;
        }

        let now = Utc::now();

        for label in &self.prepared_box_label_identifiers {
            self.prepare_box(txn, &shipment, label, now).await?;
        }
        for label in &self.removed_box_label_identifiers {
            self.remove_box(txn, label, now).await?;
        }
        for received in &self.received_shipment_details {
            self.receive_box(txn, &shipment, received, now).await?;
        }
        for label in &self.lost_box_label_identifiers {
            self.mark_box_lost(txn, label, now).await?;
        }

        let mut completed = false;
        if self.records_outcomes() {
            let remaining = shipment_detail::Entity::find()
                .filter(shipment_detail::Column::ShipmentId.eq(shipment.id))
                .filter(active_detail_condition())
                .count(txn)
                .await
                .map_err(ServiceError::db_error)?;

            if remaining == 0 {
                let changes = shipment::ActiveModel {
                    state: Set(ShipmentState::Completed),
                    completed_by: Set(Some(self.user_id)),
                    completed_on: Set(Some(now)),
                    ..Default::default()
                };
                transition_shipment(txn, shipment.id, &[ShipmentState::Sent], changes).await?;
                completed = true;
            }
        }

        let shipment = find_shipment(txn, self.shipment_id).await?;
        Ok(UpdateShipmentResult {
            shipment,
            completed,
        })
    }

    async fn prepare_box(
        &self,
        txn: &DatabaseTransaction,
        shipment: &shipment::Model,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let stock_box = find_box(txn, label).await?;
        if stock_box.state != BoxState::InStock {
            return Err(ServiceError::InvalidBoxState {
                label_identifier: stock_box.label_identifier,
                state: stock_box.state.to_string(),
            });
        }

        let box_base_id = location::Entity::find_by_id(stock_box.location_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|location| location.base_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Location {} not found", stock_box.location_id))
            })?;
        if box_base_id != shipment.source_base_id {
            return Err(ServiceError::InvalidBase {
                base_id: box_base_id,
                expected_base_ids: vec![shipment.source_base_id],
            });
        }

        shipment_detail::ActiveModel {
            shipment_id: Set(shipment.id),
            box_id: Set(stock_box.id),
            source_location_id: Set(stock_box.location_id),
            created_by: Set(self.user_id),
            created_on: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!("Failed to insert shipment detail: {}", e);
            ServiceError::db_error(e)
        })?;

        move_box(txn, &stock_box, &[BoxState::InStock], BoxState::MarkedForShipment, None).await?;
        debug!(label_identifier = label, "Box prepared for shipment");
        Ok(())
    }

    async fn remove_box(
        &self,
        txn: &DatabaseTransaction,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let stock_box = find_box(txn, label).await?;
        let detail = self.active_detail_for_box(txn, &stock_box).await?;

        close_detail(
            txn,
            detail.id,
            shipment_detail::ActiveModel {
                removed_by: Set(Some(self.user_id)),
                removed_on: Set(Some(now)),
                deleted_on: Set(Some(now)),
                ..Default::default()
            },
        )
        .await?;

        move_box(txn, &stock_box, &[BoxState::MarkedForShipment], BoxState::InStock, None).await?;
        debug!(label_identifier = label, "Box removed from shipment");
        Ok(())
    }

    async fn receive_box(
        &self,
        txn: &DatabaseTransaction,
        shipment: &shipment::Model,
        received: &ReceivedShipmentDetail,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let detail_id = received.shipment_detail_id;
        let detail = shipment_detail::Entity::find_by_id(detail_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .filter(|detail| detail.shipment_id == shipment.id && detail.is_active())
            .ok_or(ServiceError::InvalidShipmentDetail { detail_id })?;

        let target_location = location::Entity::find_by_id(received.target_location_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Location {} not found",
                    received.target_location_id
                ))
            })?;
        if target_location.base_id != shipment.target_base_id {
            return Err(ServiceError::InvalidBase {
                base_id: target_location.base_id,
                expected_base_ids: vec![shipment.target_base_id],
            });
        }

        close_detail(
            txn,
            detail.id,
            shipment_detail::ActiveModel {
                received_by: Set(Some(self.user_id)),
                received_on: Set(Some(now)),
                target_location_id: Set(Some(target_location.id)),
                ..Default::default()
            },
        )
        .await?;

        let stock_box = boxes::Entity::find_by_id(detail.box_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Box {} not found", detail.box_id)))?;
        move_box(
            txn,
            &stock_box,
            &[BoxState::InTransit],
            BoxState::Received,
            Some(target_location.id),
        )
        .await?;
        debug!(shipment_detail_id = detail_id, "Box received");
        Ok(())
    }

    async fn mark_box_lost(
        &self,
        txn: &DatabaseTransaction,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let stock_box = find_box(txn, label).await?;
        let detail = self.active_detail_for_box(txn, &stock_box).await?;

        close_detail(
            txn,
            detail.id,
            shipment_detail::ActiveModel {
                lost_by: Set(Some(self.user_id)),
                lost_on: Set(Some(now)),
                ..Default::default()
            },
        )
        .await?;

        move_box(txn, &stock_box, &[BoxState::InTransit], BoxState::Lost, None).await?;
        debug!(label_identifier = label, "Box marked lost");
        Ok(())
    }

    async fn active_detail_for_box(
        &self,
        txn: &DatabaseTransaction,
        stock_box: &boxes::Model,
    ) -> Result<shipment_detail::Model, ServiceError> {
        shipment_detail::Entity::find()
            .filter(shipment_detail::Column::ShipmentId.eq(self.shipment_id))
            .filter(shipment_detail::Column::BoxId.eq(stock_box.id))
            .filter(active_detail_condition())
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::InvalidBoxState {
                label_identifier: stock_box.label_identifier.clone(),
                state: stock_box.state.to_string(),
            })
    }
}

async fn find_box(txn: &DatabaseTransaction, label: &str) -> Result<boxes::Model, ServiceError> {
    boxes::Entity::find()
        .filter(boxes::Column::LabelIdentifier.eq(label))
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Box {} not found", label)))
}

/// Sets one terminal marker on a detail that still has none.
async fn close_detail(
    txn: &DatabaseTransaction,
    detail_id: i32,
    changes: shipment_detail::ActiveModel,
) -> Result<(), ServiceError> {
    let result = shipment_detail::Entity::update_many()
        .set(changes)
        .filter(shipment_detail::Column::Id.eq(detail_id))
        .filter(active_detail_condition())
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InvalidShipmentDetail { detail_id });
    }
    Ok(())
}

/// Compare-and-set box state change, optionally relocating the box.
async fn move_box(
    txn: &DatabaseTransaction,
    stock_box: &boxes::Model,
    from: &[BoxState],
    to: BoxState,
    location_id: Option<i32>,
) -> Result<(), ServiceError> {
    let mut update = boxes::Entity::update_many()
        .col_expr(boxes::Column::State, Expr::value(to))
        .col_expr(boxes::Column::LastModifiedOn, Expr::value(Utc::now()));
    if let Some(location_id) = location_id {
        update = update.col_expr(boxes::Column::LocationId, Expr::value(location_id));
    }

    let result = update
        .filter(boxes::Column::Id.eq(stock_box.id))
        .filter(boxes::Column::State.is_in(from.iter().copied()))
        .exec(txn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        let current = boxes::Entity::find_by_id(stock_box.id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .map(|b| b.state.to_string())
            .unwrap_or_else(|| stock_box.state.to_string());
        return Err(ServiceError::InvalidBoxState {
            label_identifier: stock_box.label_identifier.clone(),
            state: current,
        });
    }
    Ok(())
}
