//! Converge a Postgres user to a declared state: create, alter or drop the
//! user and grant or revoke its database and table privileges, doing only
//! what is needed and reporting whether anything changed.

pub mod apply;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod gen;
pub mod privilege;
pub mod role;
pub mod session;
pub mod validate;

#[cfg(test)]
mod testing;

pub use apply::{reconcile, Outcome, Request};
pub use error::{Error, Result};
