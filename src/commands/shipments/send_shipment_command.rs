use super::{active_box_ids, set_boxes_state, transition_shipment};
use crate::{
    commands::{from_transaction_error, publish, Command},
    db::DbPool,
    entities::{
        boxes::BoxState,
        shipment::{self, ShipmentState},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Dispatches a prepared shipment; its boxes go in transit and the box list is frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendShipmentCommand {
    pub shipment_id: i32,
    pub user_id: i32,
}

#[async_trait]
impl Command for SendShipmentCommand {
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
                Box::pin(async move {
                    let changes = shipment::ActiveModel {
                        state: Set(ShipmentState::Sent),
                        sent_by: Set(Some(command.user_id)),
                        sent_on: Set(Some(Utc::now())),
                        ..Default::default()
                    };
                    let shipment = transition_shipment(
                        txn,
                        command.shipment_id,
                        &[ShipmentState::Preparing],
                        changes,
                    )
                    .await?;

                    let box_ids = active_box_ids(txn, shipment.id).await?;
                    if box_ids.is_empty() {
                        return Err(ServiceError::ValidationError(format!(
                            "shipment {} has no boxes to send",
                            shipment.id
                        )));
                    }
                    set_boxes_state(txn, &box_ids, BoxState::InTransit).await?;
                    Ok(shipment)
                })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Failed to send shipment: {}", err);
                err
            })?;

        info!(sent_by = self.user_id, "Shipment sent");
        publish(&event_sender, Event::ShipmentSent(shipment.id)).await;

        Ok(shipment)
    }
}
