pub mod api;
pub mod clipboard;
pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod page;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod settings;
pub mod state;
pub mod tabs;
pub mod transport;
pub mod updater;

pub use error::{Error, ErrorKind, Result};
