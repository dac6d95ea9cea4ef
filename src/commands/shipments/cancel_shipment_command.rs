use super::{active_box_ids, active_detail_condition, set_boxes_state, transition_shipment};
use crate::{
    commands::{from_transaction_error, publish, Command},
    db::DbPool,
    entities::{
        boxes::BoxState,
        shipment::{self, ShipmentState},
        shipment_detail,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Abandons a shipment that has not been sent. Its boxes return to stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelShipmentCommand {
    pub shipment_id: i32,
    pub user_id: i32,
}

#[async_trait]
impl Command for CancelShipmentCommand {
    type Result = shipment::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(shipment_id = self.shipment_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let shipment = db_pool
            .transaction::<_, shipment::Model, ServiceError>(move |txn| {
                Box::pin(async move { command.cancel_shipment(txn).await })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Failed to cancel shipment: {}", err);
                err
            })?;

        info!(canceled_by = self.user_id, "Shipment canceled");
        publish(&event_sender, Event::ShipmentCanceled(shipment.id)).await;

        Ok(shipment)
    }
}

impl CancelShipmentCommand {
    async fn cancel_shipment(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<shipment::Model, ServiceError> {
        let now = Utc::now();
        let changes = shipment::ActiveModel {
            state: Set(ShipmentState::Canceled),
            canceled_by: Set(Some(self.user_id)),
            canceled_on: Set(Some(now)),
            ..Default::default()
        };
        let shipment =
            transition_shipment(txn, self.shipment_id, &[ShipmentState::Preparing], changes)
                .await?;

        let box_ids = active_box_ids(txn, shipment.id).await?;

        shipment_detail::Entity::update_many()
            .col_expr(shipment_detail::Column::RemovedBy, Expr::value(self.user_id))
            .col_expr(shipment_detail::Column::RemovedOn, Expr::value(now))
            .col_expr(shipment_detail::Column::DeletedOn, Expr::value(now))
            .filter(shipment_detail::Column::ShipmentId.eq(shipment.id))
            .filter(active_detail_condition())
            .exec(txn)
            .await
            .map_err(|e| {
                error!("Failed to remove shipment details: {}", e);
                ServiceError::db_error(e)
            })?;

        set_boxes_state(txn, &box_ids, BoxState::InStock).await?;
        Ok(shipment)
    }
}
