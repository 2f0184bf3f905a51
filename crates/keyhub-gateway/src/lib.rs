//! # KeyHub Gateway
//! HTTP/JSON API over the license services.

pub mod guard;
pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
