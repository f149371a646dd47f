//! SOAP response and fault envelopes.
//!
//! Body fragments are placed verbatim: producing well-formed XML is the
//! handler's job. Both builders refuse to emit anything longer than the
//! caller's limit instead of truncating.

use crate::error::{BuildError, FaultKind};
use crate::parser::SOAP_12_NS;
use crate::store::{DEVICE_NS, MEDIA_NS, SCHEMA_NS};

/// Content type of every response.
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Pre-rendered fault used when a response does not fit the configured limit.
pub const FALLBACK_FAULT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">"#,
    "<s:Body><s:Fault>",
    "<s:Code><s:Value>s:Receiver</s:Value></s:Code>",
    r#"<s:Reason><s:Text xml:lang="en">Internal server error</s:Text></s:Reason>"#,
    "</s:Fault></s:Body></s:Envelope>"
);

/// Wrap a body fragment in a SOAP 1.2 envelope.
pub fn wrap_body(body_xml: &str, max_len: usize) -> Result<String, BuildError> {
    let envelope = format!(
        r#"{decl}<s:Envelope xmlns:s="{soap}" xmlns:tds="{tds}" xmlns:trt="{trt}" xmlns:tt="{tt}"><s:Body>{body}</s:Body></s:Envelope>"#,
        decl = XML_DECLARATION,
        soap = SOAP_12_NS,
        tds = DEVICE_NS,
        trt = MEDIA_NS,
        tt = SCHEMA_NS,
        body = body_xml,
    );
    bounded(envelope, max_len)
}

/// Build a SOAP 1.2 Fault envelope.
pub fn build_fault(code: &str, reason: &str, max_len: usize) -> Result<String, BuildError> {
    let envelope = format!(
        r#"{decl}<s:Envelope xmlns:s="{soap}"><s:Body><s:Fault><s:Code><s:Value>{code}</s:Value></s:Code><s:Reason><s:Text xml:lang="en">{reason}</s:Text></s:Reason></s:Fault></s:Body></s:Envelope>"#,
        decl = XML_DECLARATION,
        soap = SOAP_12_NS,
        code = xml_escape(code),
        reason = xml_escape(reason),
    );
    bounded(envelope, max_len)
}

/// Build the fault for a [`FaultKind`], falling back to [`FALLBACK_FAULT`].
pub fn fault_for(kind: FaultKind, max_len: usize) -> String {
    build_fault(kind.code(), kind.reason(), max_len).unwrap_or_else(|_| FALLBACK_FAULT.to_string())
}

fn bounded(rendered: String, max_len: usize) -> Result<String, BuildError> {
    if rendered.len() > max_len {
        return Err(BuildError::BufferTooSmall {
            needed: rendered.len(),
            limit: max_len,
        });
    }
    Ok(rendered)
}

/// Escape text for element content and attribute values.
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
