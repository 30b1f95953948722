//! Response parsing and the read-only result view
//!
//! Responses are parsed with `roxmltree` and copied into an owned
//! [`XmlElement`] tree, so a result can outlive the raw buffer it came from.
//! A typical document looks like:
//!
//! ```xml
//! <eveapi version="2">
//!   <currentTime>2024-05-01 12:00:00</currentTime>
//!   <result>
//!     <rowset name="characters" key="characterID" columns="name,characterID">
//!       <row name="Alice" characterID="42"/>
//!     </rowset>
//!   </result>
//!   <cachedUntil>2024-05-01 13:00:00</cachedUntil>
//! </eveapi>
//! ```
//!
//! API-level failures replace `<result>` with `<error code="106">...</error>`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::ParseError;

/// Timestamp format used by the remote API (always UTC)
pub const API_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Owned XML element
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|attr| (attr.name().to_string(), attr.value().to_string()))
            .collect();

        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Self::from_node(child));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }

        Self {
            name: node.tag_name().name().to_string(),
            attributes,
            text,
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Text content with surrounding whitespace removed
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Descend through child names, e.g. `["result", "serverOpen"]`
    pub fn path(&self, names: &[&str]) -> Option<&XmlElement> {
        names
            .iter()
            .try_fold(self, |element, name| element.child(name))
    }

    /// Rows of the `<rowset name="...">` child
    pub fn rowset(&self, name: &str) -> Option<Vec<&XmlElement>> {
        self.children
            .iter()
            .find(|child| child.name == "rowset" && child.attribute("name") == Some(name))
            .map(|rowset| {
                rowset
                    .children
                    .iter()
                    .filter(|row| row.name == "row")
                    .collect()
            })
    }
}

/// Parsed response document
#[derive(Debug, Clone)]
pub struct ParsedPayload {
    root: XmlElement,
}

impl ParsedPayload {
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    fn error_element(&self) -> Option<&XmlElement> {
        self.root.child("error")
    }

    /// Whether the document carries an `<error>` marker
    pub fn has_error(&self) -> bool {
        self.error_element().is_some()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_element()
            .map(|error| error.attribute("code").unwrap_or_default())
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error_element().map(XmlElement::text)
    }
}

/// Parse raw response bytes into a [`ParsedPayload`]
pub fn parse(raw: &[u8]) -> Result<ParsedPayload, ParseError> {
    let text = std::str::from_utf8(raw)?;
    let document = roxmltree::Document::parse(text)?;
    Ok(ParsedPayload {
        root: XmlElement::from_node(document.root_element()),
    })
}

/// An `<error>` marker reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorInfo {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ApiErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Read-only view of one API response
#[derive(Debug)]
pub struct ApiResult {
    payload: ParsedPayload,
    raw: Vec<u8>,
    from_cache: bool,
}

impl ApiResult {
    pub(crate) fn new(payload: ParsedPayload, raw: Vec<u8>, from_cache: bool) -> Self {
        Self {
            payload,
            raw,
            from_cache,
        }
    }

    pub fn has_error(&self) -> bool {
        self.payload.has_error()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.payload.error_code()
    }

    pub fn error_text(&self) -> Option<&str> {
        self.payload.error_text()
    }

    pub fn error(&self) -> Option<ApiErrorInfo> {
        Some(ApiErrorInfo {
            code: self.error_code()?.to_string(),
            message: self.error_text()?.to_string(),
        })
    }

    /// Document root, usually `<eveapi>`
    pub fn root(&self) -> &XmlElement {
        self.payload.root()
    }

    /// Direct child of the root
    pub fn get(&self, name: &str) -> Option<&XmlElement> {
        self.root().child(name)
    }

    /// The `<result>` element, absent on API-level errors
    pub fn result(&self) -> Option<&XmlElement> {
        self.get("result")
    }

    /// Rows of a rowset below `<result>`
    pub fn rowset(&self, name: &str) -> Option<Vec<&XmlElement>> {
        self.result()?.rowset(name)
    }

    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp("currentTime")
    }

    pub fn cached_until(&self) -> Option<DateTime<Utc>> {
        self.timestamp("cachedUntil")
    }

    fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let text = self.get(name)?.text();
        NaiveDateTime::parse_from_str(text, API_TIME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// The exact bytes this result was parsed from
    pub fn raw_xml(&self) -> &[u8] {
        &self.raw
    }

    /// Whether the bytes came from the cache rather than the network
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }
}
