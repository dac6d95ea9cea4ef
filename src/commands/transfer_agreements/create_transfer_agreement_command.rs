use crate::{
    commands::{from_transaction_error, publish, Command},
    db::DbPool,
    entities::{
        base,
        transfer_agreement::{self, TransferAgreementState, TransferAgreementType},
        transfer_agreement_detail,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument};
use validator::Validate;

/// Requests a new agreement between the caller's organisation and a partner.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTransferAgreementCommand {
    pub initiating_organisation_id: i32,
    pub partner_organisation_id: i32,
    pub r#type: TransferAgreementType,
    #[validate(length(min = 1, message = "At least one initiating base is required"))]
    pub initiating_organisation_base_ids: Vec<i32>,
    /// All bases of the partner organisation when omitted
    pub partner_organisation_base_ids: Option<Vec<i32>>,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    /// IANA timezone name the validity dates are expressed in; UTC when omitted
    pub timezone: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    pub requested_by: i32,
}

#[async_trait]
impl Command for CreateTransferAgreementCommand {
    type Result = transfer_agreement::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(
        initiating_organisation_id = self.initiating_organisation_id,
        partner_organisation_id = self.partner_organisation_id,
    ))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            error!("Validation failed: {:?}", e);
            ServiceError::ValidationError(e.to_string())
        })?;

        if self.initiating_organisation_id == self.partner_organisation_id {
            return Err(ServiceError::InvalidOrganisation {
                organisation_id: self.partner_organisation_id,
            });
        }

        let (valid_from, valid_until) = if self.valid_from.is_some() || self.valid_until.is_some() {
            let timezone = self.timezone.as_deref().unwrap_or("UTC");
            let tz: Tz = timezone
                .parse()
                .map_err(|_| ServiceError::InvalidTimezone(timezone.to_string()))?;
            localize_validity_window(self.valid_from, self.valid_until, tz, Utc::now())?
        } else {
            (Utc::now(), None)
        };

        let command = self.clone();
        let agreement = db_pool
            .transaction::<_, transfer_agreement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    command
                        .create_in_transaction(txn, valid_from, valid_until)
                        .await
                })
            })
            .await
            .map_err(|e| {
                let err = from_transaction_error(e);
                error!("Transaction failed for creating transfer agreement: {}", err);
                err
            })?;

        counter!("boxtransfer.agreement.transition", 1, "to" => "UnderReview");
        info!(
            agreement_id = agreement.id,
            source_organisation_id = agreement.source_organisation_id,
            target_organisation_id = agreement.target_organisation_id,
            "Transfer agreement created"
        );

        publish(
            &event_sender,
            Event::TransferAgreementCreated {
                agreement_id: agreement.id,
                source_organisation_id: agreement.source_organisation_id,
                target_organisation_id: agreement.target_organisation_id,
            },
        )
        .await;

        Ok(agreement)
    }
}

impl CreateTransferAgreementCommand {
    async fn create_in_transaction(
        &self,
        txn: &DatabaseTransaction,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        let initiating_base_ids: BTreeSet<i32> =
            self.initiating_organisation_base_ids.iter().copied().collect();
        let partner_base_ids: BTreeSet<i32> = match &self.partner_organisation_base_ids {
            Some(ids) => ids.iter().copied().collect(),
            None => organisation_base_ids(txn, self.partner_organisation_id)
                .await?
                .into_iter()
                .collect(),
        };

        let (source_organisation_id, source_base_ids, target_organisation_id, target_base_ids) =
            match self.r#type {
                TransferAgreementType::ReceivingFrom => (
                    self.partner_organisation_id,
                    partner_base_ids,
                    self.initiating_organisation_id,
                    initiating_base_ids,
                ),
                TransferAgreementType::SendingTo | TransferAgreementType::Bidirectional => (
                    self.initiating_organisation_id,
                    initiating_base_ids,
                    self.partner_organisation_id,
                    partner_base_ids,
                ),
            };

        let agreement = transfer_agreement::ActiveModel {
            source_organisation_id: Set(source_organisation_id),
            target_organisation_id: Set(target_organisation_id),
            r#type: Set(self.r#type),
            state: Set(TransferAgreementState::UnderReview),
            valid_from: Set(valid_from),
            valid_until: Set(valid_until),
            requested_by: Set(self.requested_by),
            requested_on: Set(Utc::now()),
            comment: Set(self.comment.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!("Failed to insert transfer agreement: {}", e);
            ServiceError::db_error(e)
        })?;

        ensure_bases_belong_to(txn, source_organisation_id, &source_base_ids).await?;
        ensure_bases_belong_to(txn, target_organisation_id, &target_base_ids).await?;

        let details: Vec<transfer_agreement_detail::ActiveModel> = source_base_ids
            .iter()
            .flat_map(|&source_base_id| {
                target_base_ids
                    .iter()
                    .map(move |&target_base_id| transfer_agreement_detail::ActiveModel {
                        transfer_agreement_id: Set(agreement.id),
                        source_base_id: Set(source_base_id),
                        target_base_id: Set(target_base_id),
                        ..Default::default()
                    })
            })
            .collect();

        if !details.is_empty() {
            transfer_agreement_detail::Entity::insert_many(details)
                .exec(txn)
                .await
                .map_err(|e| {
                    error!("Failed to insert transfer agreement details: {}", e);
                    ServiceError::db_error(e)
                })?;
        }

        Ok(agreement)
    }
}

async fn organisation_base_ids(
    txn: &DatabaseTransaction,
    organisation_id: i32,
) -> Result<Vec<i32>, ServiceError> {
    base::Entity::find()
        .select_only()
        .column(base::Column::Id)
        .filter(base::Column::OrganisationId.eq(organisation_id))
        .order_by_asc(base::Column::Id)
        .into_tuple::<i32>()
        .all(txn)
        .await
        .map_err(ServiceError::db_error)
}

/// Fails with the first base id that the organisation does not own.
async fn ensure_bases_belong_to(
    txn: &DatabaseTransaction,
    organisation_id: i32,
    base_ids: &BTreeSet<i32>,
) -> Result<(), ServiceError> {
    let owned = organisation_base_ids(txn, organisation_id).await?;
    match base_ids.iter().find(|id| !owned.contains(id)) {
        Some(&base_id) => Err(ServiceError::InvalidBase {
            base_id,
            expected_base_ids: owned,
        }),
        None => Ok(()),
    }
}

/// Resolves a local wall-clock time, preferring the earlier instant on a fold and
/// the first valid instant after a gap.
fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        LocalResult::None => (1..=180)
            .find_map(|minutes| {
                tz.from_local_datetime(&(naive + Duration::minutes(minutes)))
                    .earliest()
            })
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// Turns calendar dates into the stored validity window.
///
/// `valid_from` becomes local midnight and `valid_until` local 23:59:59 in `tz`,
/// both in UTC. A missing `valid_from` defaults to `now`. When an end date is
/// present the UTC date of the start must lie strictly before the UTC date of the
/// end.
pub fn localize_validity_window(
    valid_from: Option<NaiveDate>,
    valid_until: Option<NaiveDate>,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), ServiceError> {
    let from = valid_from
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| localize(tz, naive))
        .unwrap_or(now);
    let until = valid_until
        .and_then(|date| date.and_hms_opt(23, 59, 59))
        .map(|naive| localize(tz, naive));

    if let Some(until) = until {
        if from.date_naive() >= until.date_naive() {
            return Err(ServiceError::InvalidDates {
                valid_from: from,
                valid_until: until,
            });
        }
    }

    Ok((from, until))
}
