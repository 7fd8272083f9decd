//! Query functions, one module per table.

pub mod orgs;
pub mod plans;
pub mod projects;
pub mod users;
