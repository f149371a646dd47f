//! ONVIF device server.
//!
//! Accepts SOAP-over-HTTP requests, authenticates them with WS-UsernameToken
//! (plaintext or SHA-1 password digest), rejects replayed nonces and stale
//! timestamps, and routes each request by operation name to a service
//! handler.
//!
//! # Features
//!
//! - Tolerant envelope scanning (any `Envelope`/`Header`/`Body` prefix)
//! - WS-UsernameToken validation with a bounded nonce replay cache
//! - SOAP 1.2 responses and Faults with bounded output size
//! - Device and media service handlers backed by a shared [`DeviceStore`]
//! - axum transport with request size limits and a health endpoint
//!
//! # Example
//!
//! ```ignore
//! use onvif_device_server::{DeviceStore, RequestDispatcher, ServerConfig};
//! use std::sync::Arc;
//!
//! let config = ServerConfig::default();
//! let dispatcher = RequestDispatcher::new(&config, Arc::new(DeviceStore::new(&config)));
//! let response = dispatcher.handle(request_bytes);
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod nonce;
pub mod parser;
pub mod response;
pub mod security;
pub mod server;
pub mod services;
pub mod store;

pub use config::ServerConfig;
pub use dispatcher::{DispatcherStats, RequestDispatcher, SoapResponse};
pub use error::{AuthError, FaultKind, HandlerError, ParseError, ServerError};
pub use nonce::NonceCache;
pub use security::{Clock, FixedClock, SecurityValidator, SystemClock};
pub use services::{HandlerRegistry, ServiceHandler};
pub use store::DeviceStore;
