//! Token wallet ledger and settlement core for a mobile-money backed
//! marketplace: balances, an append-only ledger, top-up and withdrawal
//! request state machines, and the admin settlement workflow that ties
//! them together.

pub mod config;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod store;

pub use config::WalletConfig;
pub use engine::SettlementEngine;
