//! Business logic services for the stock ledger

pub mod bom;
pub mod catalog;
pub mod documents;
pub mod invoice;
pub mod issuance;
pub mod ledger;
pub mod manufacturing;
pub mod reporting;
pub mod sequence;
pub mod transfer;

pub use bom::BomService;
pub use catalog::CatalogService;
pub use documents::DocumentService;
pub use invoice::InvoiceService;
pub use issuance::IssuanceService;
pub use manufacturing::ManufacturingService;
pub use reporting::ReportingService;
pub use sequence::SequenceService;
pub use transfer::TransferService;

use crate::error::{AppError, AppResult};

/// Turn a shared validator verdict into a field-tagged error
pub(crate) fn check_field(field: &str, verdict: Result<(), &'static str>) -> AppResult<()> {
    verdict.map_err(|message| AppError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    })
}
