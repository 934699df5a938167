//! Common utilities and types shared across connectivity monitor components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
