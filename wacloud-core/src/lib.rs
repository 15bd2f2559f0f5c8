//! Shared wire types for the WhatsApp Cloud API.
//!
//! This crate holds the pieces used by both the request pipeline
//! (`wacloud-client`) and the Flow endpoint (`wacloud-flows`).
//!
//! ## Modules
//!
//! - [`error`]: Structured Graph API error payloads
//! - [`proof`]: `appsecret_proof` signing and webhook signature verification

mod error;
mod proof;

pub use error::*;
pub use proof::*;
