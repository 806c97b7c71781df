//! Common types shared by the GitHub pool crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, mask};
