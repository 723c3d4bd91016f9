//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod faker_user_client;

pub use faker_user_client::FakerUserClient;
