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

/// Accepts an agreement that is under review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptTransferAgreementCommand {
    pub agreement_id: i32,
    pub user_id: i32,
}

#[async_trait]
impl Command for AcceptTransferAgreementCommand {
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
                        state: Set(TransferAgreementState::Accepted),
                        accepted_by: Set(Some(command.user_id)),
                        accepted_on: Set(Some(Utc::now())),
                        ..Default::default()
                    };
                    transition_agreement(
                        txn,
                        command.agreement_id,
                        &[TransferAgreementState::UnderReview],
                        changes,
                    )
                    .await
                })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Failed to accept transfer agreement: {}", err);
                err
            })?;

        info!(accepted_by = self.user_id, "Transfer agreement accepted");
        publish(&event_sender, Event::TransferAgreementAccepted(agreement.id)).await;

        Ok(agreement)
    }
}
