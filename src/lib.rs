pub mod config;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod models;

pub use error::{Result, VaimmError};
