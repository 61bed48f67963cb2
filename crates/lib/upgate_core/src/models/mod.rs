//! Domain models shared by the auth and upload services.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `upgate_api::models`.

pub mod auth;
pub mod uploads;
