//! Infrastructure layer: Postgres persistence, tiered cache, service wiring.

pub mod cache;
pub mod config;
pub mod ledger;
pub mod repository;

#[cfg(test)]
mod integration_tests;
