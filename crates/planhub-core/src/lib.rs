pub mod auth;
pub mod error;
pub mod plan;
pub mod store;
pub mod token;

pub use error::{ErrorKind, PlanError};
