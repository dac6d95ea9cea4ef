pub mod accept_transfer_agreement_command;
pub mod cancel_transfer_agreement_command;
pub mod create_transfer_agreement_command;
pub mod reject_transfer_agreement_command;

pub use accept_transfer_agreement_command::AcceptTransferAgreementCommand;
pub use cancel_transfer_agreement_command::CancelTransferAgreementCommand;
pub use create_transfer_agreement_command::{
    localize_validity_window, CreateTransferAgreementCommand,
};
pub use reject_transfer_agreement_command::RejectTransferAgreementCommand;

use crate::{
    entities::transfer_agreement::{self, Entity as TransferAgreement, TransferAgreementState},
    errors::ServiceError,
};
use metrics::counter;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{error, warn};

/// Compare-and-set state transition.
///
/// Applies `changes` only while the agreement is in one of `allowed`. When no row
/// matches, the agreement is re-read to report `NotFound` or the state it is
/// actually in.
pub(crate) async fn transition_agreement<C: ConnectionTrait>(
    db: &C,
    agreement_id: i32,
    allowed: &[TransferAgreementState],
    changes: transfer_agreement::ActiveModel,
) -> Result<transfer_agreement::Model, ServiceError> {
    let target_state = match &changes.state {
        sea_orm::ActiveValue::Set(state) => state.to_string(),
        _ => "unchanged".to_string(),
    };

    let result = TransferAgreement::update_many()
        .set(changes)
        .filter(transfer_agreement::Column::Id.eq(agreement_id))
        .filter(transfer_agreement::Column::State.is_in(allowed.iter().copied()))
        .exec(db)
        .await
        .map_err(|e| {
            error!(agreement_id, "Failed to update transfer agreement: {}", e);
            ServiceError::db_error(e)
        })?;

    let agreement = TransferAgreement::find_by_id(agreement_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Transfer agreement {} not found", agreement_id))
        })?;

    if result.rows_affected == 0 {
        warn!(
            agreement_id,
            actual = %agreement.state,
            target = %target_state,
            "Rejected transfer agreement transition"
        );
        return Err(ServiceError::invalid_state(allowed, agreement.state));
    }

    counter!("boxtransfer.agreement.transition", 1, "to" => target_state);
    Ok(agreement)
}
