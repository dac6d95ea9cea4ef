use crate::{
    commands::transfer_agreements::{
        AcceptTransferAgreementCommand, CancelTransferAgreementCommand,
        CreateTransferAgreementCommand, RejectTransferAgreementCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{
        base,
        transfer_agreement::{self, TransferAgreementState},
        transfer_agreement_detail,
    },
    errors::ServiceError,
    events::EventSender,
};
use chrono_tz::Tz;
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Which side of an agreement's base pairs to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseKind {
    Source,
    Target,
}

/// Service for managing transfer agreements
#[derive(Clone)]
pub struct TransferAgreementService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    default_timezone: Tz,
}

impl TransferAgreementService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, default_timezone: Tz) -> Self {
        Self {
            db_pool,
            event_sender,
            default_timezone,
        }
    }

    /// Creates an agreement; validity dates without a timezone use the configured default
    #[instrument(skip(self))]
    pub async fn create_agreement(
        &self,
        mut command: CreateTransferAgreementCommand,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        command
            .timezone
            .get_or_insert_with(|| self.default_timezone.name().to_string());
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn accept_agreement(
        &self,
        agreement_id: i32,
        user_id: i32,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        AcceptTransferAgreementCommand {
            agreement_id,
            user_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn reject_agreement(
        &self,
        agreement_id: i32,
        user_id: i32,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        RejectTransferAgreementCommand {
            agreement_id,
            user_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_agreement(
        &self,
        agreement_id: i32,
        user_id: i32,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        CancelTransferAgreementCommand {
            agreement_id,
            user_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Gets an agreement by ID
    #[instrument(skip(self))]
    pub async fn get_agreement(
        &self,
        agreement_id: i32,
    ) -> Result<transfer_agreement::Model, ServiceError> {
        transfer_agreement::Entity::find_by_id(agreement_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transfer agreement {} not found", agreement_id))
            })
    }

    /// Agreements the organisation takes part in, optionally restricted to `states`
    #[instrument(skip(self))]
    pub async fn list_for_organisation(
        &self,
        organisation_id: i32,
        states: Option<Vec<TransferAgreementState>>,
    ) -> Result<Vec<transfer_agreement::Model>, ServiceError> {
        let mut query = transfer_agreement::Entity::find().filter(
            Condition::any()
                .add(transfer_agreement::Column::SourceOrganisationId.eq(organisation_id))
                .add(transfer_agreement::Column::TargetOrganisationId.eq(organisation_id)),
        );
        if let Some(states) = states {
            query = query.filter(transfer_agreement::Column::State.is_in(states));
        }

        query
            .order_by_asc(transfer_agreement::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Distinct bases on one side of the agreement's detail rows
    #[instrument(skip(self))]
    pub async fn list_bases(
        &self,
        agreement_id: i32,
        kind: BaseKind,
    ) -> Result<Vec<base::Model>, ServiceError> {
        let relation = match kind {
            BaseKind::Source => transfer_agreement_detail::Relation::SourceBase,
            BaseKind::Target => transfer_agreement_detail::Relation::TargetBase,
        };

        base::Entity::find()
            .join(JoinType::InnerJoin, relation.def().rev())
            .filter(transfer_agreement_detail::Column::TransferAgreementId.eq(agreement_id))
            .distinct()
            .order_by_asc(base::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Permitted (source, target) base pairs of the agreement
    #[instrument(skip(self))]
    pub async fn details(
        &self,
        agreement_id: i32,
    ) -> Result<Vec<transfer_agreement_detail::Model>, ServiceError> {
        transfer_agreement_detail::Entity::find()
            .filter(transfer_agreement_detail::Column::TransferAgreementId.eq(agreement_id))
            .order_by_asc(transfer_agreement_detail::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
