pub mod base;
pub mod boxes;
pub mod location;
pub mod organisation;
pub mod shipment;
pub mod shipment_detail;
pub mod transfer_agreement;
pub mod transfer_agreement_detail;
