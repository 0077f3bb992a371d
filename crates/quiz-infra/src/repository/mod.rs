//! Repository implementations.

mod memory;

pub use memory::{InMemoryQuizRepository, InMemoryUserRepository};
