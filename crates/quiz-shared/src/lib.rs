//! # Quiz Shared
//!
//! Wire types of the quiz platform API. Free of server dependencies so that
//! clients can reuse them.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
