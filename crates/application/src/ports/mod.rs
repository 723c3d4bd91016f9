//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod user_lookup_port;
mod user_source_port;

#[cfg(test)]
pub use user_lookup_port::MockUserLookupPort;
pub use user_lookup_port::UserLookupPort;
#[cfg(test)]
pub use user_source_port::MockUserSourcePort;
pub use user_source_port::UserSourcePort;
