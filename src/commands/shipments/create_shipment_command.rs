use crate::{
    commands::{from_transaction_error, publish, Command},
    db::DbPool,
    entities::{
        shipment::{self, ShipmentState},
        transfer_agreement::{self, TransferAgreementState, TransferAgreementType},
        transfer_agreement_detail,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Starts a shipment between two bases covered by an accepted agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipmentCommand {
    pub source_base_id: i32,
    pub target_base_id: i32,
    pub transfer_agreement_id: i32,
    pub started_by: i32,
}

#[async_trait]
impl Command for CreateShipmentCommand {
    type Result = shipment::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(
        transfer_agreement_id = self.transfer_agreement_id,
        source_base_id = self.source_base_id,
        target_base_id = self.target_base_id,
    ))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let shipment = db_pool
            .transaction::<_, shipment::Model, ServiceError>(move |txn| {
                Box::pin(async move { command.create_shipment(txn).await })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Transaction failed for creating shipment: {}", err);
                err
            })?;

        counter!("boxtransfer.shipment.transition", 1, "to" => "Preparing");
        info!(shipment_id = shipment.id, "Shipment created");

        publish(
            &event_sender,
            Event::ShipmentCreated {
                shipment_id: shipment.id,
                transfer_agreement_id: shipment.transfer_agreement_id,
            },
        )
        .await;

        Ok(shipment)
    }
}

impl CreateShipmentCommand {
    async fn create_shipment(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<shipment::Model, ServiceError> {
        let agreement = transfer_agreement::Entity::find_by_id(self.transfer_agreement_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Transfer agreement {} not found",
                    self.transfer_agreement_id
                ))
            })?;

        if agreement.state != TransferAgreementState::Accepted {
            return Err(ServiceError::invalid_state(
                &[TransferAgreementState::Accepted],
                agreement.state,
            ));
        }

        let now = Utc::now();
        if !agreement.is_in_effect_at(now) {
            return Err(ServiceError::AgreementNotInEffect {
                agreement_id: agreement.id,
            });
        }

        let pairs: Vec<(i32, i32)> = transfer_agreement_detail::Entity::find()
            .filter(transfer_agreement_detail::Column::TransferAgreementId.eq(agreement.id))
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|detail| (detail.source_base_id, detail.target_base_id))
            .collect();

        self.ensure_pair_is_covered(&agreement, &pairs)?;

        shipment::ActiveModel {
            source_base_id: Set(self.source_base_id),
            target_base_id: Set(self.target_base_id),
            transfer_agreement_id: Set(agreement.id),
            state: Set(ShipmentState::Preparing),
            started_by: Set(self.started_by),
            started_on: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!("Failed to insert shipment: {}", e);
            ServiceError::db_error(e)
        })
    }

    /// The base pair must be a detail row; bidirectional agreements also cover
    /// the reversed pair.
    fn ensure_pair_is_covered(
        &self,
        agreement: &transfer_agreement::Model,
        pairs: &[(i32, i32)],
    ) -> Result<(), ServiceError> {
        let bidirectional = agreement.r#type == TransferAgreementType::Bidirectional;
        let allowed: BTreeSet<(i32, i32)> = pairs
            .iter()
            .flat_map(|&(source, target)| {
                let reversed = bidirectional.then_some((target, source));
                std::iter::once((source, target)).chain(reversed)
            })
            .collect();

        if allowed.contains(&(self.source_base_id, self.target_base_id)) {
            return Ok(());
        }

        let source_candidates: Vec<i32> = allowed
            .iter()
            .map(|&(source, _)| source)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !source_candidates.contains(&self.source_base_id) {
            return Err(ServiceError::InvalidBase {
                base_id: self.source_base_id,
                expected_base_ids: source_candidates,
            });
        }

        let target_candidates: Vec<i32> = allowed
            .iter()
            .filter(|&&(source, _)| source == self.source_base_id)
            .map(|&(_, target)| target)
            .collect();
        Err(ServiceError::InvalidBase {
            base_id: self.target_base_id,
            expected_base_ids: target_candidates,
        })
    }
}
