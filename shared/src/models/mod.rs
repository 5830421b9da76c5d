//! Domain models for the stock ledger

mod invoice;
mod stock;
mod transfer;

pub use invoice::*;
pub use stock::*;
pub use transfer::*;
