//! Service handlers and the operation registry.
//!
//! A handler turns a validated request (operation name and body fragment)
//! into a response body fragment. Handlers are registered by exact
//! operation name.

pub mod device;
pub mod media;

use crate::error::HandlerError;
use crate::store::DeviceStore;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::sync::Arc;

pub use device::DeviceService;
pub use media::MediaService;

/// Read-only state passed to handlers.
pub struct HandlerContext<'a> {
    pub store: &'a DeviceStore,
    /// Request time, from the dispatcher's clock
    pub now: DateTime<Utc>,
}

/// Produces response body fragments for one or more operations.
pub trait ServiceHandler: Send + Sync {
    fn handle(
        &self,
        operation: &str,
        body: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<String, HandlerError>;
}

impl<F> ServiceHandler for F
where
    F: Fn(&str, &str, &HandlerContext<'_>) -> Result<String, HandlerError> + Send + Sync,
{
    fn handle(
        &self,
        operation: &str,
        body: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<String, HandlerError> {
        self(operation, body, ctx)
    }
}

/// Operation name to handler map.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ServiceHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in device and media operations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        let device: Arc<dyn ServiceHandler> = Arc::new(DeviceService);
        for op in DeviceService::OPERATIONS {
            registry.register_arc(op, device.clone());
        }

        let media: Arc<dyn ServiceHandler> = Arc::new(MediaService);
        for op in MediaService::OPERATIONS {
            registry.register_arc(op, media.clone());
        }

        registry
    }

    /// Register a handler, replacing any previous one for the operation.
    pub fn register<H>(&mut self, operation: &str, handler: H)
    where
        H: ServiceHandler + 'static,
    {
        self.register_arc(operation, Arc::new(handler));
    }

    pub fn register_arc(&mut self, operation: &str, handler: Arc<dyn ServiceHandler>) {
        self.handlers.insert(operation.to_string(), handler);
    }

    pub fn get(&self, operation: &str) -> Option<&Arc<dyn ServiceHandler>> {
        self.handlers.get(operation)
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered operation names, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("operations", &self.operations())
            .finish()
    }
}

/// Text of the first element named `local_name` (any prefix) in a body
/// fragment, unescaped. `Ok(None)` if the element is absent.
pub fn read_argument(body: &str, local_name: &str) -> Result<Option<String>, HandlerError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let wanted = local_name.as_bytes();
    let mut capturing = false;
    let mut value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if !capturing && e.local_name().as_ref() == wanted => {
                capturing = true;
            }
            Ok(Event::Empty(ref e)) if !capturing && e.local_name().as_ref() == wanted => {
                return Ok(Some(String::new()));
            }
            Ok(Event::Text(ref t)) if capturing => {
                let text = t.unescape().map_err(|e| {
                    HandlerError::InvalidArgument(format!("bad text in {}: {}", local_name, e))
                })?;
                value.push_str(&text);
            }
            Ok(Event::End(_)) if capturing => return Ok(Some(value)),
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(HandlerError::InvalidArgument(format!(
                    "malformed request body: {}",
                    e
                )))
            }
            _ => {}
        }
    }
}

/// Like [`read_argument`] but the element must be present and non-empty.
pub fn required_argument(body: &str, local_name: &str) -> Result<String, HandlerError> {
    match read_argument(body, local_name)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(HandlerError::InvalidArgument(format!(
            "missing {}",
            local_name
        ))),
    }
}
