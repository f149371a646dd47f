//! Request pipeline: parse, authenticate, dispatch, respond.
//!
//! Every outcome is a SOAP envelope. Parse, authentication, routing and
//! handler errors become Faults; a response that does not fit the configured
//! size becomes the pre-rendered fallback fault.

use crate::config::ServerConfig;
use crate::error::{AuthError, DispatchError, FaultKind, ParseError};
use crate::nonce::{NonceCache, SharedNonceCache};
use crate::parser::{extract_header, parse_envelope, validate_envelope};
use crate::response::{fault_for, wrap_body, FALLBACK_FAULT};
use crate::security::{extract_token, Clock, SecurityValidator, SystemClock};
use crate::services::{HandlerContext, HandlerRegistry};
use crate::store::DeviceStore;
use glob::Pattern;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pipeline states. `Responded` is implicit: every call to
/// [`RequestDispatcher::handle`] ends there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Parsed,
    Authenticated,
    AuthFailed,
    Dispatched,
}

/// Rendered response plus routing metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    /// HTTP status for the transport
    pub status: u16,
    /// Complete SOAP envelope
    pub body: String,
    /// Fault category, if the response is a fault
    pub fault: Option<FaultKind>,
    /// Operation name, empty if the request could not be parsed
    pub operation: String,
    /// Last state reached before responding
    pub state: RequestState,
}

impl SoapResponse {
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub requests_processed: u64,
    pub faults_returned: u64,
    pub auth_failures: u64,
}

enum AuthFailure {
    Token(ParseError),
    Rejected(AuthError),
}

/// Routes raw SOAP requests to service handlers.
pub struct RequestDispatcher {
    require_auth: bool,
    unauthenticated_operations: Vec<Pattern>,
    max_response_size: usize,
    validator: SecurityValidator,
    store: Arc<DeviceStore>,
    nonces: SharedNonceCache,
    registry: HandlerRegistry,
    clock: Arc<dyn Clock>,
    requests_processed: AtomicU64,
    faults_returned: AtomicU64,
    auth_failures: AtomicU64,
}

impl RequestDispatcher {
    /// Create a dispatcher with the default handlers, a fresh nonce cache
    /// and the system clock.
    pub fn new(config: &ServerConfig, store: Arc<DeviceStore>) -> Self {
        let unauthenticated_operations = config
            .auth
            .unauthenticated_operations
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(
                        pattern = %pattern,
                        error = %e,
                        "Ignoring invalid auth.unauthenticated_operations pattern"
                    );
                    None
                }
            })
            .collect();

        Self {
            require_auth: config.auth.require_auth,
            unauthenticated_operations,
            max_response_size: config.settings.max_response_size,
            validator: SecurityValidator::new(config.auth.timestamp_tolerance_secs),
            store,
            nonces: NonceCache::shared(config.auth.nonce_cache_capacity),
            registry: HandlerRegistry::with_defaults(),
            clock: Arc::new(SystemClock),
            requests_processed: AtomicU64::new(0),
            faults_returned: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
        }
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a nonce cache with other dispatchers.
    pub fn with_nonce_cache(mut self, nonces: SharedNonceCache) -> Self {
        self.nonces = nonces;
        self
    }

    pub fn nonce_cache(&self) -> &SharedNonceCache {
        &self.nonces
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            faults_returned: self.faults_returned.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
        }
    }

    /// Whether `operation` needs a valid UsernameToken.
    pub fn requires_auth(&self, operation: &str) -> bool {
        self.require_auth
            && !self
                .unauthenticated_operations
                .iter()
                .any(|p| p.matches(operation))
    }

    /// Process one request body.
    pub fn handle(&self, raw: &[u8]) -> SoapResponse {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);

        // Received -> Parsed
        let parsed = validate_envelope(raw).and_then(|xml| Ok((xml, parse_envelope(raw)?)));
        let (xml, envelope) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, size = raw.len(), "Rejecting malformed SOAP request");
                return self.fault(FaultKind::from(&e), "", RequestState::Received);
            }
        };

        let operation = envelope.operation.as_str();
        debug!(operation = %operation, "Parsed SOAP request");

        // Parsed -> Authenticated | AuthFailed
        let mut state = RequestState::Parsed;
        if self.requires_auth(operation) {
            if let Err(failure) = self.authenticate(xml) {
                self.auth_failures.fetch_add(1, Ordering::Relaxed);
                match failure {
                    AuthFailure::Token(e) => {
                        warn!(operation = %operation, error = %e, "Missing or unreadable UsernameToken")
                    }
                    AuthFailure::Rejected(e) => {
                        warn!(operation = %operation, error = ?e, "Authentication failed")
                    }
                }
                return self.fault(FaultKind::NotAuthorized, operation, RequestState::AuthFailed);
            }
            state = RequestState::Authenticated;
        }

        // -> Dispatched
        let Some(handler) = self.registry.get(operation) else {
            let err = DispatchError::UnsupportedOperation(operation.to_string());
            warn!(error = %err, "No handler registered");
            return self.fault(FaultKind::from(&err), operation, state);
        };

        let ctx = HandlerContext {
            store: &self.store,
            now: self.clock.now(),
        };

        let body = match handler.handle(operation, &envelope.body, &ctx) {
            Ok(body) => body,
            Err(e) => {
                warn!(operation = %operation, error = %e, "Handler failed");
                return self.fault(FaultKind::from(&e), operation, RequestState::Dispatched);
            }
        };

        match wrap_body(&body, self.max_response_size) {
            Ok(envelope) => {
                debug!(operation = %operation, size = envelope.len(), "Responding");
                SoapResponse {
                    status: 200,
                    body: envelope,
                    fault: None,
                    operation: operation.to_string(),
                    state: RequestState::Dispatched,
                }
            }
            Err(e) => {
                warn!(
                    operation = %operation,
                    error = %e,
                    "Response exceeds settings.max_response_size, sending fallback fault"
                );
                self.faults_returned.fetch_add(1, Ordering::Relaxed);
                SoapResponse {
                    status: FaultKind::Internal.http_status(),
                    body: FALLBACK_FAULT.to_string(),
                    fault: Some(FaultKind::Internal),
                    operation: operation.to_string(),
                    state: RequestState::Dispatched,
                }
            }
        }
    }

    fn authenticate(&self, xml: &str) -> Result<(), AuthFailure> {
        let header = extract_header(xml).map_err(AuthFailure::Token)?;
        let token = extract_token(header).map_err(AuthFailure::Token)?;

        self.validator
            .validate(&token, self.store.as_ref(), &self.nonces, self.clock.as_ref())
            .map_err(|e| {
                debug!(username = %token.username, "UsernameToken rejected");
                AuthFailure::Rejected(e)
            })
    }

    fn fault(&self, kind: FaultKind, operation: &str, state: RequestState) -> SoapResponse {
        self.faults_returned.fetch_add(1, Ordering::Relaxed);
        SoapResponse {
            status: kind.http_status(),
            body: fault_for(kind, self.max_response_size),
            fault: Some(kind),
            operation: operation.to_string(),
            state,
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("require_auth", &self.require_auth)
            .field("max_response_size", &self.max_response_size)
            .field("registry", &self.registry)
            .field("stats", &self.stats())
            .finish()
    }
}
