//! API server and routes
//!
//! `middleware::capture_requests` is what a host application layers onto its
//! own router; `routes` is the collector's health surface.

pub mod middleware;
pub mod openapi;
pub mod routes;
mod server;

pub use middleware::capture_requests;
pub use server::ApiServer;
