pub mod cancel_shipment_command;
pub mod create_shipment_command;
pub mod send_shipment_command;
pub mod update_shipment_command;

pub use cancel_shipment_command::CancelShipmentCommand;
pub use create_shipment_command::CreateShipmentCommand;
pub use send_shipment_command::SendShipmentCommand;
pub use update_shipment_command::{ReceivedShipmentDetail, UpdateShipmentCommand};

use crate::{
    entities::{
        boxes::{self, BoxState},
        shipment::{self, ShipmentState},
        shipment_detail,
    },
    errors::ServiceError,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveValue, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QuerySelect,
};
use tracing::{error, warn};

/// Details with no terminal marker set
pub fn active_detail_condition() -> Condition {
    Condition::all()
        .add(shipment_detail::Column::RemovedOn.is_null())
        .add(shipment_detail::Column::LostOn.is_null())
        .add(shipment_detail::Column::ReceivedOn.is_null())
}

/// Compare-and-set shipment transition; see `transition_agreement` for the contract.
pub(crate) async fn transition_shipment<C: ConnectionTrait>(
    db: &C,
    shipment_id: i32,
    allowed: &[ShipmentState],
    changes: shipment::ActiveModel,
) -> Result<shipment::Model, ServiceError> {
    let target_state = match &changes.state {
        ActiveValue::Set(state) => state.to_string(),
        _ => "unchanged".to_string(),
    };

    let result = shipment::Entity::update_many()
        .set(changes)
        .filter(shipment::Column::Id.eq(shipment_id))
        .filter(shipment::Column::State.is_in(allowed.iter().copied()))
        .exec(db)
        .await
        .map_err(|e| {
            error!(shipment_id, "Failed to update shipment: {}", e);
            ServiceError::db_error(e)
        })?;

    let shipment = find_shipment(db, shipment_id).await?;
    if result.rows_affected == 0 {
        warn!(
            shipment_id,
            actual = %shipment.state,
            target = %target_state,
            "Rejected shipment transition"
        );
        return Err(ServiceError::invalid_state(allowed, shipment.state));
    }

    counter!("boxtransfer.shipment.transition", 1, "to" => target_state);
    Ok(shipment)
}

pub(crate) async fn find_shipment<C: ConnectionTrait>(
    db: &C,
    shipment_id: i32,
) -> Result<shipment::Model, ServiceError> {
    shipment::Entity::find_by_id(shipment_id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))
}

/// Fails with `InvalidState` unless the shipment is in `expected`.
pub(crate) fn ensure_shipment_state(
    shipment: &shipment::Model,
    expected: ShipmentState,
) -> Result<(), ServiceError> {
    if shipment.state == expected {
        Ok(())
    } else {
        Err(ServiceError::invalid_state(&[expected], shipment.state))
    }
}

/// Box ids of the shipment's active details
pub(crate) async fn active_box_ids<C: ConnectionTrait>(
    db: &C,
    shipment_id: i32,
) -> Result<Vec<i32>, ServiceError> {
    shipment_detail::Entity::find()
        .select_only()
        .column(shipment_detail::Column::BoxId)
        .filter(shipment_detail::Column::ShipmentId.eq(shipment_id))
        .filter(active_detail_condition())
        .into_tuple::<i32>()
        .all(db)
        .await
        .map_err(ServiceError::db_error)
}

/// Moves every listed box into `state`, stamping `last_modified_on`.
pub(crate) async fn set_boxes_state<C: ConnectionTrait>(
    db: &C,
    box_ids: &[i32],
    state: BoxState,
) -> Result<(), ServiceError> {
    if box_ids.is_empty() {
        return Ok(());
    }

    boxes::Entity::update_many()
        .col_expr(boxes::Column::State, Expr::value(state))
        .col_expr(boxes::Column::LastModifiedOn, Expr::value(Utc::now()))
        .filter(boxes::Column::Id.is_in(box_ids.iter().copied()))
        .exec(db)
        .await
        .map_err(|e| {
            error!("Failed to update box states: {}", e);
            ServiceError::db_error(e)
        })?;
    Ok(())
}
