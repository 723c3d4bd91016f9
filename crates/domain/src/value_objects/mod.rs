//! Value objects

mod fetch_outcome;
mod request_state;

pub use fetch_outcome::{FetchOutcome, STATUS_NOT_FOUND, STATUS_OK};
pub use request_state::RequestState;
