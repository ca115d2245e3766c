//! State module for tracking fetch progress
//!
//! # Components
//!
//! - `FetchState`: bounded-attempt state machine for one page fetch

mod fetch_state;

// Re-export main types
pub use fetch_state::FetchState;
