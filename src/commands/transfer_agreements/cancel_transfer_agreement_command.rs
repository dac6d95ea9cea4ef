use super::transition_agreement;
use crate::{
    commands::{from_transaction_error, publish, Command},
    db::DbPool,
    entities::transfer_agreement::{self, TransferAgreementState},
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Terminates an agreement that is under review or already accepted.
/// Either participating organisation may cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTransferAgreementCommand {
    pub agreement_id: i32,
    pub user_id: i32,
}

const CANCELABLE_STATES: [TransferAgreementState; 2] = [
    TransferAgreementState::UnderReview,
    TransferAgreementState::Accepted,
];

#[async_trait]
impl Command for CancelTransferAgreementCommand {
    type Result = transfer_agreement::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(agreement_id = self.agreement_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let command = self.clone();
        let agreement = db_pool
            .transaction::<_, transfer_agreement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let changes = transfer_agreement::ActiveModel {
                        state: Set(TransferAgreementState::Canceled),
                        terminated_by: Set(Some(command.user_id)),
                        terminated_on: Set(Some(Utc::now())),
                        ..Default::default()
                    };
                    transition_agreement(txn, command.agreement_id, &CANCELABLE_STATES, changes)
                        .await
                })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Failed to cancel transfer agreement: {}", err);
                err
            })?;

        info!(canceled_by = self.user_id, "Transfer agreement canceled");
        publish(&event_sender, Event::TransferAgreementCanceled(agreement.id)).await;

        Ok(agreement)
    }
}
