use crate::{
    auth::{authorize, consts as perm, AuthUser, Authorization},
    commands::transfer_agreements::CreateTransferAgreementCommand,
    entities::{
        base,
        transfer_agreement::{self, TransferAgreementState, TransferAgreementType},
        transfer_agreement_detail,
    },
    errors::ServiceError,
    handlers::validate_input,
    services::BaseKind,
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Default)]
pub struct TransferAgreementListQuery {
    /// Comma separated state names, e.g. `UnderReview,Accepted`
    pub states: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransferAgreementRequest {
    pub partner_organisation_id: i32,
    pub r#type: TransferAgreementType,
    #[validate(length(min = 1))]
    pub initiating_organisation_base_ids: Vec<i32>,
    pub partner_organisation_base_ids: Option<Vec<i32>>,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub timezone: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Agreement together with its base pairs
#[derive(Debug, Serialize)]
pub struct TransferAgreementView {
    #[serde(flatten)]
    pub agreement: transfer_agreement::Model,
    pub details: Vec<transfer_agreement_detail::Model>,
    pub source_bases: Vec<base::Model>,
    pub target_bases: Vec<base::Model>,
}

async fn agreement_view(
    state: &AppState,
    agreement: transfer_agreement::Model,
) -> Result<TransferAgreementView, ServiceError> {
    let service = &state.transfer_agreements;
    let details = service.details(agreement.id).await?;
    let source_bases = service.list_bases(agreement.id, BaseKind::Source).await?;
    let target_bases = service.list_bases(agreement.id, BaseKind::Target).await?;

    Ok(TransferAgreementView {
        agreement,
        details,
        source_bases,
        target_bases,
    })
}

fn parse_states(raw: &str) -> Result<Vec<TransferAgreementState>, ServiceError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<TransferAgreementState>().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown transfer agreement state '{}'", s))
            })
        })
        .collect()
}

pub async fn list_transfer_agreements(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<TransferAgreementListQuery>,
) -> ApiResult<Vec<transfer_agreement::Model>> {
    authorize(
        &auth_user,
        &Authorization::permission(perm::TRANSFER_AGREEMENT_READ),
    )?;

    let states = query.states.as_deref().map(parse_states).transpose()?;
    let agreements = state
        .transfer_agreements
        .list_for_organisation(auth_user.organisation_id, states)
        .await?;

    Ok(Json(ApiResponse::success(agreements)))
}

pub async fn get_transfer_agreement(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<TransferAgreementView> {
    let agreement = state.transfer_agreements.get_agreement(id).await?;
    authorize(
        &auth_user,
        &Authorization::permission(perm::TRANSFER_AGREEMENT_READ).in_any_organisation([
            agreement.source_organisation_id,
            agreement.target_organisation_id,
        ]),
    )?;

    Ok(Json(ApiResponse::success(
        agreement_view(&state, agreement).await?,
    )))
}

pub async fn create_transfer_agreement(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateTransferAgreementRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransferAgreementView>>), ServiceError> {
    validate_input(&payload)?;
    authorize(
        &auth_user,
        &Authorization::permission(perm::TRANSFER_AGREEMENT_WRITE)
            .in_organisation(auth_user.organisation_id),
    )?;

    let command = CreateTransferAgreementCommand {
        initiating_organisation_id: auth_user.organisation_id,
        partner_organisation_id: payload.partner_organisation_id,
        r#type: payload.r#type,
        initiating_organisation_base_ids: payload.initiating_organisation_base_ids,
        partner_organisation_base_ids: payload.partner_organisation_base_ids,
        valid_from: payload.valid_from,
        valid_until: payload.valid_until,
        timezone: payload.timezone,
        comment: payload.comment,
        requested_by: auth_user.user_id,
    };

    let agreement = state.transfer_agreements.create_agreement(command).await?;
    info!(
        agreement_id = agreement.id,
        user_id = auth_user.user_id,
        "Transfer agreement requested"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(agreement_view(&state, agreement).await?)),
    ))
}

pub async fn accept_transfer_agreement(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<transfer_agreement::Model> {
    let agreement = state.transfer_agreements.get_agreement(id).await?;
    authorize(
        &auth_user,
        &Authorization::permission(perm::TRANSFER_AGREEMENT_WRITE)
            .in_organisation(agreement.target_organisation_id),
    )?;

    let accepted = state
        .transfer_agreements
        .accept_agreement(id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(accepted)))
}

pub async fn reject_transfer_agreement(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<transfer_agreement::Model> {
    let agreement = state.transfer_agreements.get_agreement(id).await?;
    authorize(
        &auth_user,
        &Authorization::permission(perm::TRANSFER_AGREEMENT_WRITE)
            .in_organisation(agreement.target_organisation_id),
    )?;

    let rejected = state
        .transfer_agreements
        .reject_agreement(id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(rejected)))
}

pub async fn cancel_transfer_agreement(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<transfer_agreement::Model> {
    let agreement = state.transfer_agreements.get_agreement(id).await?;
    authorize(
        &auth_user,
        &Authorization::permission(perm::TRANSFER_AGREEMENT_WRITE).in_any_organisation([
            agreement.source_organisation_id,
            agreement.target_organisation_id,
        ]),
    )?;

    let canceled = state
        .transfer_agreements
        .cancel_agreement(id, auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(canceled)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_states() {
        let states = parse_states("UnderReview, Accepted,").unwrap();
        assert_eq!(
            states,
            vec![
                TransferAgreementState::UnderReview,
                TransferAgreementState::Accepted
            ]
        );
    }

    #[test]
    fn rejects_unknown_state() {
        assert!(matches!(
            parse_states("Accepted,Pending"),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
