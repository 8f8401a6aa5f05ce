// Upstream module - backend HTTP client

pub mod client;

pub use client::{BackendClient, BackendError};
