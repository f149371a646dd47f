//! SOAP envelope scanning.
//!
//! A lightweight tag scanner, not a full XML parser: it locates elements by
//! local name (any namespace prefix), slices out their content, and never
//! expands entities. Everything above this module only sees [`Envelope`] and
//! the fragment helpers, so the scanner can be replaced without touching the
//! security or response code.

use crate::error::ParseError;
use std::ops::Range;

/// SOAP namespace URIs.
pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// A request split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Header content, if a non-empty Header element is present
    pub header: Option<String>,
    /// Body content, verbatim
    pub body: String,
    /// Local name of the first element in the body; empty when unknown
    pub operation: String,
}

/// Location of an element found by [`find_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementSpan<'a> {
    /// Qualified name as written (e.g. `s:Body`)
    pub name: &'a str,
    /// Raw opening tag including `<` and `>`
    pub open_tag: &'a str,
    /// Byte range of the content between the tags
    pub content: Range<usize>,
}

/// Check that the document contains an Envelope and a Body element.
pub fn validate_envelope(data: &[u8]) -> Result<&str, ParseError> {
    let xml = std::str::from_utf8(data).map_err(|_| ParseError::MalformedEnvelope)?;

    if find_open_tag(xml, 0, "Envelope").is_none() || find_open_tag(xml, 0, "Body").is_none() {
        return Err(ParseError::MalformedEnvelope);
    }

    Ok(xml)
}

/// Parse raw bytes as a SOAP envelope.
pub fn parse_envelope(data: &[u8]) -> Result<Envelope, ParseError> {
    let xml = std::str::from_utf8(data).map_err(|_| ParseError::MalformedEnvelope)?;

    let body = find_element(xml, "Body").ok_or(ParseError::MalformedEnvelope)?;
    let body = &xml[body.content];

    let header = extract_header(xml)
        .ok()
        .filter(|h| !h.trim().is_empty())
        .map(String::from);

    Ok(Envelope {
        header,
        body: body.to_string(),
        operation: operation_name(body).to_string(),
    })
}

/// Extract the Header content. Absent header yields an empty string.
pub fn extract_header(xml: &str) -> Result<&str, ParseError> {
    if find_open_tag(xml, 0, "Header").is_none() {
        return Ok("");
    }

    find_element(xml, "Header")
        .map(|span| &xml[span.content])
        .ok_or(ParseError::MalformedEnvelope)
}

/// Local name of the first element of a body fragment.
///
/// Leading whitespace, comments and processing instructions are skipped.
/// Anything else before the first element yields an empty name.
pub fn operation_name(body: &str) -> &str {
    let mut rest = body.trim_start();
    loop {
        let skipped = if let Some(after) = rest.strip_prefix("<!--") {
            after.find("-->").map(|end| &after[end + 3..])
        } else if let Some(after) = rest.strip_prefix("<?") {
            after.find("?>").map(|end| &after[end + 2..])
        } else {
            break;
        };

        match skipped {
            Some(after) => rest = after.trim_start(),
            None => return "",
        }
    }

    let Some(rest) = rest.strip_prefix('<') else {
        return "";
    };
    if rest.starts_with('/') || rest.starts_with('!') {
        return "";
    }

    let end = rest
        .find(|c: char| c == '>' || c == '/' || c.is_whitespace())
        .unwrap_or(rest.len());

    strip_prefix(&rest[..end])
}

/// Text content of the first element with the given local name.
pub fn element_text<'a>(xml: &'a str, local_name: &str) -> Option<&'a str> {
    find_element(xml, local_name).map(|span| &xml[span.content])
}

/// Find the first complete element with the given local name.
pub(crate) fn find_element<'a>(xml: &'a str, local_name: &str) -> Option<ElementSpan<'a>> {
    let (start, name, open_end, self_closing) = find_open_tag(xml, 0, local_name)?;
    let open_tag = &xml[start..open_end];

    if self_closing {
        return Some(ElementSpan {
            name,
            open_tag,
            content: open_end..open_end,
        });
    }

    let close = find_close_tag(xml, open_end, name)?;
    Some(ElementSpan {
        name,
        open_tag,
        content: open_end..close,
    })
}

fn strip_prefix(qualified: &str) -> &str {
    match qualified.split_once(':') {
        Some((_, local)) => local,
        None => qualified,
    }
}

/// Scan for an opening tag whose local name matches.
///
/// Returns (tag start, qualified name, index after `>`, self-closing).
fn find_open_tag<'a>(
    xml: &'a str,
    from: usize,
    local_name: &str,
) -> Option<(usize, &'a str, usize, bool)> {
    let bytes = xml.as_bytes();
    let mut pos = from;

    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        let rest = &xml[start + 1..];

        if rest.starts_with("!--") {
            pos = start + 4 + rest[3..].find("-->")? + 3;
            continue;
        }
        if rest.starts_with("![CDATA[") {
            pos = start + 9 + rest[8..].find("]]>")? + 3;
            continue;
        }
        if rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('!') {
            pos = start + 1;
            continue;
        }

        let name_len = rest
            .find(|c: char| c == '>' || c == '/' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_len];

        if strip_prefix(name) == local_name {
            let close = start + 1 + rest.find('>')?;
            let self_closing = close > start && bytes[close - 1] == b'/';
            return Some((start, name, close + 1, self_closing));
        }

        pos = start + 1;
    }

    None
}

/// Find `</name>` (optionally with trailing whitespace) starting at `from`.
fn find_close_tag(xml: &str, from: usize, qualified_name: &str) -> Option<usize> {
    let needle = format!("</{}", qualified_name);
    let mut pos = from;

    while let Some(offset) = xml[pos..].find(&needle) {
        let start = pos + offset;
        let after = &xml[start + needle.len()..];
        if after.trim_start().starts_with('>') {
            return Some(start);
        }
        pos = start + needle.len();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOAP_12_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Header>
    <wsse:Security><wsse:UsernameToken><wsse:Username>admin</wsse:Username></wsse:UsernameToken></wsse:Security>
  </s:Header>
  <s:Body>
    <tds:GetDeviceInformation xmlns:tds="http://www.onvif.org/ver10/device/wsdl"/>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn test_parse_soap_12() {
        let envelope = parse_envelope(SOAP_12_SAMPLE.as_bytes()).unwrap();
        assert_eq!(envelope.operation, "GetDeviceInformation");
        assert!(envelope.header.unwrap().contains("<wsse:Username>admin</wsse:Username>"));
        assert!(envelope.body.contains("tds:GetDeviceInformation"));
    }

    #[test]
    fn test_operation_name_for_each_prefix() {
        for prefix in ["s:", "soap:", "SOAP-ENV:", ""] {
            let xml = format!(
                r#"<{p}Envelope xmlns:s="x"><{p}Body><Op xmlns="urn:test"><A>1</A></Op></{p}Body></{p}Envelope>"#,
                p = prefix
            );
            let envelope = parse_envelope(xml.as_bytes()).unwrap();
            assert_eq!(envelope.operation, "Op", "prefix {:?}", prefix);
            assert!(envelope.header.is_none());
        }
    }

    #[test]
    fn test_operation_name_skips_leading_comments() {
        assert_eq!(operation_name("<!-- x --><GetProfiles/>"), "GetProfiles");
        assert_eq!(
            operation_name("\n  <!-- a -->\n  <!--b--> <trt:GetStreamUri>"),
            "GetStreamUri"
        );
        assert_eq!(operation_name("<?pi data?><tds:GetServices/>"), "GetServices");
        assert_eq!(operation_name("<!-- unterminated <Op/>"), "");
        assert_eq!(operation_name("<![CDATA[<Op/>]]>"), "");
        assert_eq!(operation_name("text<Op/>"), "");

        let xml = "<Envelope><Body><!-- x --><GetProfiles/></Body></Envelope>";
        assert_eq!(parse_envelope(xml.as_bytes()).unwrap().operation, "GetProfiles");
    }

    #[test]
    fn test_body_is_exact_substring() {
        let xml = "<Envelope><Body>  <m:Ping/>  </Body></Envelope>";
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.body, "  <m:Ping/>  ");
        assert_eq!(envelope.operation, "Ping");
    }

    #[test]
    fn test_body_with_attributes() {
        let xml = r#"<s:Envelope><s:Body xmlns:xsi="urn:xsi"><GetProfiles/></s:Body></s:Envelope>"#;
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.body, "<GetProfiles/>");
        assert_eq!(envelope.operation, "GetProfiles");
    }

    #[test]
    fn test_missing_body() {
        let xml = "<s:Envelope><s:Header/></s:Envelope>";
        assert_eq!(
            parse_envelope(xml.as_bytes()),
            Err(ParseError::MalformedEnvelope)
        );
    }

    #[test]
    fn test_unclosed_body() {
        let xml = "<s:Envelope><s:Body><GetProfiles/></s:Envelope>";
        assert_eq!(
            parse_envelope(xml.as_bytes()),
            Err(ParseError::MalformedEnvelope)
        );
    }

    #[test]
    fn test_similar_names_do_not_match() {
        let xml = "<s:Envelope><s:BodyPart>x</s:BodyPart></s:Envelope>";
        assert!(parse_envelope(xml.as_bytes()).is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let data = b"<Envelope><Body>\xff\xfe</Body></Envelope>";
        assert_eq!(parse_envelope(data), Err(ParseError::MalformedEnvelope));
    }

    #[test]
    fn test_text_body_has_no_operation() {
        let xml = "<Envelope><Body>hello</Body></Envelope>";
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.operation, "");
    }

    #[test]
    fn test_self_closing_body() {
        let xml = "<s:Envelope><s:Body/></s:Envelope>";
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.body, "");
        assert_eq!(envelope.operation, "");
    }

    #[test]
    fn test_commented_body_is_ignored() {
        let xml = "<Envelope><!-- <Body>fake</Body> --><Body><Real/></Body></Envelope>";
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.operation, "Real");
    }

    #[test]
    fn test_extract_header_absent() {
        let xml = "<s:Envelope><s:Body><A/></s:Body></s:Envelope>";
        assert_eq!(extract_header(xml), Ok(""));
    }

    #[test]
    fn test_extract_header_unclosed() {
        let xml = "<s:Envelope><s:Header><X/><s:Body><A/></s:Body></s:Envelope>";
        assert_eq!(extract_header(xml), Err(ParseError::MalformedEnvelope));
    }

    #[test]
    fn test_validate_envelope() {
        assert!(validate_envelope(SOAP_12_SAMPLE.as_bytes()).is_ok());
        assert!(validate_envelope(b"<Body><A/></Body>").is_err());
        assert!(validate_envelope(b"<Envelope></Envelope>").is_err());
    }

    #[test]
    fn test_element_text() {
        let xml = r#"<wsse:Password Type="urn:x#PasswordDigest">abc=</wsse:Password>"#;
        assert_eq!(element_text(xml, "Password"), Some("abc="));
        assert_eq!(element_text(xml, "Nonce"), None);
    }

    #[test]
    fn test_close_tag_with_whitespace() {
        let xml = "<Envelope><Body><Op/></Body ></Envelope>";
        let envelope = parse_envelope(xml.as_bytes()).unwrap();
        assert_eq!(envelope.body, "<Op/>");
    }
}
