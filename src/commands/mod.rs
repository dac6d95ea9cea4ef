use crate::{
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
};
use async_trait::async_trait;
use metrics::counter;
use sea_orm::TransactionError;
use std::sync::Arc;
use tracing::error;

pub mod shipments;
pub mod transfer_agreements;

/// Command trait for implementing the Command Pattern
///
/// A command encapsulates one state-changing operation: it validates its input,
/// runs all of its writes inside a single transaction and publishes a domain event
/// once the transaction has committed.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `db_pool` - Database connection pool for persistence operations
    /// * `event_sender` - Channel to publish domain events
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

/// Flattens a sea-orm transaction error into a `ServiceError`.
pub(crate) fn from_transaction_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Publishes an event for a change that has already been committed.
/// A closed channel is logged and counted; the committed change stands.
pub(crate) async fn publish(event_sender: &EventSender, event: Event) {
    let name = event.name();
    if let Err(e) = event_sender.send(event).await {
        counter!("boxtransfer.events.dropped", 1, "event" => name);
        error!(event = name, "Failed to publish event: {}", e);
    }
}
