//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod ledger;
pub mod operation;
pub mod price;
pub mod price_oracle;
pub mod report;
pub mod returns;
pub mod session;
pub mod transaction;
pub mod valuator;
