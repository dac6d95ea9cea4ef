// Transfer lifecycle services
pub mod shipments;
pub mod transfer_agreements;

pub use shipments::ShipmentService;
pub use transfer_agreements::{BaseKind, TransferAgreementService};
