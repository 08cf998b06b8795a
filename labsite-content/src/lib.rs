pub mod auth;
pub mod config;
pub mod error;
pub mod firestore;
pub mod panel;
pub mod protocol;
pub mod remote;
pub mod schema;
pub mod server;
pub mod store;
pub mod tabs;
pub mod transport;
pub mod types;
pub mod year;
