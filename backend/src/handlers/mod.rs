//! HTTP request handlers

mod catalog;
mod documents;
mod health;
mod invoice;
mod issuance;
mod reporting;
mod sequence;
mod transfer;

pub use catalog::*;
pub use documents::*;
pub use health::*;
pub use invoice::*;
pub use issuance::*;
pub use reporting::*;
pub use sequence::*;
pub use transfer::*;
