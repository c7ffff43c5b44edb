// Public API for integration tests and the server binary

pub mod abuse;
pub mod api;
pub mod auth;
pub mod cookie;
pub mod error;
pub mod identity;
pub mod state;
pub mod store;
pub mod tasks;
pub mod types;
