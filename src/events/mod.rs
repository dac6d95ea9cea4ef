use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Domain events published after a state change has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TransferAgreementCreated {
        agreement_id: i32,
        source_organisation_id: i32,
        target_organisation_id: i32,
    },
    TransferAgreementAccepted(i32),
    TransferAgreementRejected(i32),
    TransferAgreementCanceled(i32),

    ShipmentCreated {
        shipment_id: i32,
        transfer_agreement_id: i32,
    },
    ShipmentUpdated(i32),
    ShipmentSent(i32),
    ShipmentCanceled(i32),
    ShipmentCompleted(i32),
}

impl Event {
    /// Short event name used in logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            Event::TransferAgreementCreated { .. } => "transfer_agreement_created",
            Event::TransferAgreementAccepted(_) => "transfer_agreement_accepted",
            Event::TransferAgreementRejected(_) => "transfer_agreement_rejected",
            Event::TransferAgreementCanceled(_) => "transfer_agreement_canceled",
            Event::ShipmentCreated { .. } => "shipment_created",
            Event::ShipmentUpdated(_) => "shipment_updated",
            Event::ShipmentSent(_) => "shipment_sent",
            Event::ShipmentCanceled(_) => "shipment_canceled",
            Event::ShipmentCompleted(_) => "shipment_completed",
        }
    }
}

// Handlers registered with `process_events` see every event in publish order.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Drains the event channel, logging each event and fanning it out to `handlers`.
/// Returns once every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::TransferAgreementCreated {
                agreement_id,
                source_organisation_id,
                target_organisation_id,
            } => {
                info!(
                    agreement_id,
                    source_organisation_id, target_organisation_id, "Transfer agreement created"
                );
            }
            Event::TransferAgreementAccepted(id)
            | Event::TransferAgreementRejected(id)
            | Event::TransferAgreementCanceled(id) => {
                info!(agreement_id = id, event = event.name(), "Transfer agreement changed");
            }
            Event::ShipmentCreated {
                shipment_id,
                transfer_agreement_id,
            } => {
                info!(shipment_id, transfer_agreement_id, "Shipment created");
            }
            Event::ShipmentUpdated(id)
            | Event::ShipmentSent(id)
            | Event::ShipmentCanceled(id)
            | Event::ShipmentCompleted(id) => {
                info!(shipment_id = id, event = event.name(), "Shipment changed");
            }
        }

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.name(), "Event handler failed: {}", e);
            }
        }
    }

    warn!("Event processing loop has ended");
}
