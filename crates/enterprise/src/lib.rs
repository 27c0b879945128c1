//! Enterprise data-sharing consent and integrated-channel transmission.
//!
//! The [`consent`] module answers whether a learner must consent before their
//! data is shared with an enterprise customer, and exposes that over HTTP.
//! The [`channels`] module exports catalogs and learner completions to
//! integrated learning platforms and audits every attempt.

pub mod catalog;
pub mod channels;
pub mod config;
pub mod consent;
pub mod enterprise;
pub mod error;
pub mod store;
pub mod telemetry;

pub use error::AppError;
