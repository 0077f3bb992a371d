//! # Quiz Core
//!
//! The domain layer of the quiz platform.
//! Business types, the ports infrastructure must implement, and the request
//! admission pipeline that guards expensive operations. No concrete I/O lives here.

pub mod admission;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::{AdmissionError, DomainError};
