use crate::{
    auth::{authorize, consts as perm, AuthUser, Authorization},
    commands::shipments::{
        update_shipment_command::ReceivedShipmentDetail, CreateShipmentCommand,
        UpdateShipmentCommand,
    },
    entities::{
        shipment, shipment_detail,
        transfer_agreement::{self, TransferAgreementType},
    },
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub source_base_id: i32,
    pub target_base_id: i32,
    pub transfer_agreement_id: i32,
}

/// Box-list edits and per-box outcomes; omitted lists are empty
#[derive(Debug, Default, Deserialize)]
pub struct UpdateShipmentRequest {
    #[serde(default)]
    pub prepared_box_label_identifiers: Vec<String>,
    #[serde(default)]
    pub removed_box_label_identifiers: Vec<String>,
    #[serde(default)]
    pub received_shipment_details: Vec<ReceivedShipmentDetail>,
    #[serde(default)]
    pub lost_box_label_identifiers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ShipmentView {
    #[serde(flatten)]
    pub shipment: shipment::Model,
    pub details: Vec<shipment_detail::Model>,
}

async fn shipment_view(
    state: &AppState,
    shipment: shipment::Model,
) -> Result<ShipmentView, ServiceError> {
    let details = state.shipments.active_details(shipment.id).await?;
    Ok(ShipmentView { shipment, details })
}

/// Loads the shipment and its agreement, then checks the caller belongs to either party
async fn authorize_participant(
    state: &AppState,
    auth_user: &AuthUser,
    shipment_id: i32,
    permission: &'static str,
) -> Result<(shipment::Model, transfer_agreement::Model), ServiceError> {
    let shipment = state.shipments.get_shipment(shipment_id).await?;
    let agreement = state.shipments.agreement_of(&shipment).await?;
    authorize(
        auth_user,
        &Authorization::permission(permission).in_any_organisation([
            agreement.source_organisation_id,
            agreement.target_organisation_id,
        ]),
    )?;
    Ok((shipment, agreement))
}

pub async fn list_shipments(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> ApiResult<Vec<shipment::Model>> {
    authorize(&auth_user, &Authorization::permission(perm::SHIPMENT_READ))?;

    let shipments = state
        .shipments
        .list_for_organisation(auth_user.organisation_id)
        .await?;
    Ok(Json(ApiResponse::success(shipments)))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<ShipmentView> {
    let (shipment, _) = authorize_participant(&state, &auth_user, id, perm::SHIPMENT_READ).await?;
    Ok(Json(ApiResponse::success(
        shipment_view(&state, shipment).await?,
    )))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ShipmentView>>), ServiceError> {
    let agreement = state
        .transfer_agreements
        .get_agreement(payload.transfer_agreement_id)
        .await?;

    let mut organisation_ids = vec![agreement.source_organisation_id];
    if agreement.r#type == TransferAgreementType::Bidirectional {
        organisation_ids.push(agreement.target_organisation_id);
    }
    authorize(
        &auth_user,
        &Authorization::permission(perm::SHIPMENT_WRITE)
            .for_base(payload.source_base_id)
            .in_any_organisation(organisation_ids),
    )?;

    let shipment = state
        .shipments
        .create_shipment(CreateShipmentCommand {
            source_base_id: payload.source_base_id,
            target_base_id: payload.target_base_id,
            transfer_agreement_id: payload.transfer_agreement_id,
            started_by: auth_user.user_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(shipment_view(&state, shipment).await?)),
    ))
}

pub async fn update_shipment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateShipmentRequest>,
) -> ApiResult<ShipmentView> {
    authorize_participant(&state, &auth_user, id, perm::SHIPMENT_WRITE).await?;

    let result = state
        .shipments
        .update_shipment(UpdateShipmentCommand {
            shipment_id: id,
            user_id: auth_user.user_id,
            prepared_box_label_identifiers: payload.prepared_box_label_identifiers,
            removed_box_label_identifiers: payload.removed_box_label_identifiers,
            received_shipment_details: payload.received_shipment_details,
            lost_box_label_identifiers: payload.lost_box_label_identifiers,
        })
        .await?;

    let message = result.completed.then(|| "Shipment completed".to_string());
    let mut response = ApiResponse::success(shipment_view(&state, result.shipment).await?);
    response.message = message;
    Ok(Json(response))
}

pub async fn send_shipment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<ShipmentView> {
    let shipment = state.shipments.get_shipment(id).await?;
    let source_organisation_id = state
        .shipments
        .organisation_of_base(shipment.source_base_id)
        .await?;
    authorize(
        &auth_user,
        &Authorization::permission(perm::SHIPMENT_WRITE)
            .for_base(shipment.source_base_id)
            .in_organisation(source_organisation_id),
    )?;

    let sent = state.shipments.send_shipment(id, auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(shipment_view(&state, sent).await?)))
}

pub async fn cancel_shipment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<ShipmentView> {
    authorize_participant(&state, &auth_user, id, perm::SHIPMENT_WRITE).await?;

    let canceled = state
        .shipments
        .cancel_shipment(id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(
        shipment_view(&state, canceled).await?,
    )))
}
