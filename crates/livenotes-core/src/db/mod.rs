//! SQLite storage for the local backend

mod connection;
mod migrations;

pub use connection::Database;
