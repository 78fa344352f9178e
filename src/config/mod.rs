pub mod config_base;
pub mod connection;
pub mod user;

pub use config_base::Config;
pub use connection::Connection;
pub use user::{State, User};
