//! Domain models shared by the store, token and notification layers.

pub mod auth;
pub mod notify;
