//! devproxy - development reverse proxy
//!
//! Resolves logical destinations through service discovery and simulates
//! the platform's injected identity headers.

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod identity;
pub mod proxy;
