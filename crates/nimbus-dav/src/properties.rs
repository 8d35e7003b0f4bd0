//! WebDAV property names, request body parsing and multistatus
//! serialization (RFC 4918).
//!
//! Property names are kept as `(namespace, local name)` pairs and printed in
//! Clark notation (`{DAV:}getetag`). Responses are written with fixed
//! prefixes for the namespaces the server emits itself.

use std::fmt;

use chrono::{DateTime, Utc};
use http::StatusCode;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{DavError, DavResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// ownCloud namespace, used by the desktop and mobile clients.
pub const OC_NS: &str = "http://owncloud.org/ns";
/// Nextcloud namespace.
pub const NC_NS: &str = "http://nextcloud.org/ns";
/// Namespace of error bodies.
pub const SABRE_NS: &str = "http://sabredav.org/ns";

const PREFIXES: [(&str, &str); 4] = [(DAV_NS, "d"), (OC_NS, "oc"), (NC_NS, "nc"), (SABRE_NS, "s")];

/// Characters escaped inside one href path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// A namespaced property or element name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropName {
    pub ns: String,
    pub local: String,
}

impl PropName {
    pub fn new(ns: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            local: local.into(),
        }
    }

    pub fn dav(local: &str) -> Self {
        Self::new(DAV_NS, local)
    }

    pub fn oc(local: &str) -> Self {
        Self::new(OC_NS, local)
    }

    pub fn nc(local: &str) -> Self {
        Self::new(NC_NS, local)
    }

    /// Parse `{ns}local`; a bare name has no namespace.
    pub fn parse_clark(value: &str) -> Option<Self> {
        match value.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest.split_once('}')?;
                (!local.is_empty()).then(|| Self::new(ns, local))
            }
            None => (!value.is_empty()).then(|| Self::new("", value)),
        }
    }

    pub fn clark(&self) -> String {
        self.to_string()
    }

    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.ns == ns && self.local == local
    }
}

impl fmt::Display for PropName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.ns, self.local)
        }
    }
}

/// Value of a property in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Escaped text content.
    Text(String),
    /// Pre-rendered inner markup using the fixed prefixes.
    Xml(String),
    /// An empty element.
    Empty,
}

impl PropValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// `<d:href>` list.
    pub fn hrefs<I, S>(hrefs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut xml = String::new();
        for href in hrefs {
            xml.push_str(&format!("<d:href>{}</d:href>", xml_escape(href.as_ref())));
        }
        Self::Xml(xml)
    }
}

/// Depth header values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Only the resource itself
    Zero,
    /// Resource and its immediate children
    One,
    /// Resource and all descendants
    Infinity,
}

impl Depth {
    /// Parse from a header value string
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("0") => Self::Zero,
            Some("1") => Self::One,
            _ => Self::Infinity,
        }
    }
}

/// A parsed XML element with resolved namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: Option<PropName>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: PropName) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.name.as_ref().is_some_and(|n| n.is(ns, local))
    }

    pub fn prop_name(&self) -> PropName {
        self.name.clone().unwrap_or_else(|| PropName::new("", ""))
    }

    pub fn child(&self, ns: &str, local: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is(ns, local))
    }

    pub fn children_named<'a>(
        &'a self,
        ns: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is(ns, local))
    }

    /// Text when the element has no children, its serialized children
    /// otherwise.
    pub fn value(&self) -> String {
        if self.children.is_empty() {
            self.text.clone()
        } else {
            let mut out = String::new();
            for child in &self.children {
                child.write_xml(&mut out);
            }
            out
        }
    }

    fn write_xml(&self, out: &mut String) {
        let name = self.prop_name();
        let value = if self.children.is_empty() && self.text.is_empty() {
            PropValue::Empty
        } else if self.children.is_empty() {
            PropValue::Text(self.text.clone())
        } else {
            PropValue::Xml(self.value())
        };
        write_prop(out, &name, &value);
    }
}

/// Parse a request body into an element tree. An empty body yields `None`.
pub fn parse_xml(body: &[u8]) -> DavResult<Option<XmlElement>> {
    let text = std::str::from_utf8(body)
        .map_err(|_| DavError::bad_request("Request body is not valid UTF-8"))?;
    if text.trim().is_empty() {
        return Ok(None);
    }

    let mut reader = NsReader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;
    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| DavError::bad_request(format!("Malformed XML body: {e}")))?;
        match event {
            Event::Start(e) => {
                stack.push(XmlElement::new(resolved_name(&ns, e.local_name().as_ref())));
            }
            Event::Empty(e) => {
                let element = XmlElement::new(resolved_name(&ns, e.local_name().as_ref()));
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| DavError::bad_request(format!("Malformed XML body: {e}")))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DavError::bad_request("Unexpected end of XML body"));
    }
    root.map(Some)
        .ok_or_else(|| DavError::bad_request("XML body has no root element"))
}

fn resolved_name(ns: &ResolveResult, local: &[u8]) -> PropName {
    let namespace = match ns {
        ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
        _ => String::new(),
    };
    PropName::new(namespace, String::from_utf8_lossy(local).into_owned())
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// What a PROPFIND asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropfindRequest {
    AllProp,
    PropName,
    Prop(Vec<PropName>),
}

impl PropfindRequest {
    /// An empty body means `allprop`.
    pub fn parse(body: &[u8]) -> DavResult<Self> {
        let Some(root) = parse_xml(body)? else {
            return Ok(Self::AllProp);
        };
        if !root.is(DAV_NS, "propfind") {
            return Err(DavError::bad_request(
                "The root element of a PROPFIND body must be {DAV:}propfind",
            ));
        }
        Ok(Self::from_element(&root))
    }

    /// Reads `allprop`, `propname` or `prop` from a propfind-like element.
    pub fn from_element(element: &XmlElement) -> Self {
        if element.child(DAV_NS, "propname").is_some() {
            return Self::PropName;
        }
        match element.child(DAV_NS, "prop") {
            Some(prop) => Self::Prop(prop.children.iter().map(XmlElement::prop_name).collect()),
            None => Self::AllProp,
        }
    }
}

/// One `set` or `remove` instruction of a PROPPATCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropPatchOp {
    pub name: PropName,
    /// `None` removes the property.
    pub value: Option<XmlElement>,
}

/// Parse a PROPPATCH body into its operations, in document order.
pub fn parse_proppatch(body: &[u8]) -> DavResult<Vec<PropPatchOp>> {
    let root = parse_xml(body)?
        .ok_or_else(|| DavError::bad_request("PROPPATCH requires a request body"))?;
    if !root.is(DAV_NS, "propertyupdate") {
        return Err(DavError::bad_request(
            "The root element of a PROPPATCH body must be {DAV:}propertyupdate",
        ));
    }

    let mut ops = Vec::new();
    for instruction in &root.children {
        let remove = if instruction.is(DAV_NS, "set") {
            false
        } else if instruction.is(DAV_NS, "remove") {
            true
        } else {
            continue;
        };
        for prop in instruction.children_named(DAV_NS, "prop") {
            for element in &prop.children {
                ops.push(PropPatchOp {
                    name: element.prop_name(),
                    value: (!remove).then(|| element.clone()),
                });
            }
        }
    }
    Ok(ops)
}

/// One propstat block of a multistatus response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropStat {
    pub status: StatusCode,
    pub props: Vec<(PropName, PropValue)>,
}

/// One `<d:response>` of a multistatus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiStatusResponse {
    pub href: String,
    pub propstats: Vec<PropStat>,
}

/// Generate a multistatus XML response
pub fn build_multistatus_xml(responses: &[MultiStatusResponse]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str(&format!("<d:multistatus{}>\n", namespace_declarations()));

    for response in responses {
        xml.push_str("  <d:response>\n");
        xml.push_str(&format!("    <d:href>{}</d:href>\n", xml_escape(&response.href)));
        for propstat in &response.propstats {
            xml.push_str("    <d:propstat>\n");
            xml.push_str("      <d:prop>\n");
            for (name, value) in &propstat.props {
                xml.push_str("        ");
                write_prop(&mut xml, name, value);
                xml.push('\n');
            }
            xml.push_str("      </d:prop>\n");
            xml.push_str(&format!(
                "      <d:status>{}</d:status>\n",
                status_line(propstat.status)
            ));
            xml.push_str("    </d:propstat>\n");
        }
        xml.push_str("  </d:response>\n");
    }

    xml.push_str("</d:multistatus>\n");
    xml
}

/// Error body reported for a failed request.
pub fn build_error_xml(exception: &str, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <d:error xmlns:d=\"DAV:\" xmlns:s=\"{SABRE_NS}\">\n  \
         <s:exception>{}</s:exception>\n  \
         <s:message>{}</s:message>\n\
         </d:error>\n",
        xml_escape(exception),
        xml_escape(message)
    )
}

fn namespace_declarations() -> String {
    PREFIXES
        .iter()
        .map(|(ns, prefix)| format!(" xmlns:{prefix}=\"{ns}\""))
        .collect()
}

fn write_prop(out: &mut String, name: &PropName, value: &PropValue) {
    let known = PREFIXES.iter().find(|(ns, _)| *ns == name.ns).map(|(_, p)| *p);
    let (open, close) = match known {
        Some(prefix) => (
            format!("{prefix}:{}", name.local),
            format!("{prefix}:{}", name.local),
        ),
        None if name.ns.is_empty() => (name.local.clone(), name.local.clone()),
        None => (
            format!("x:{} xmlns:x=\"{}\"", name.local, xml_escape(&name.ns)),
            format!("x:{}", name.local),
        ),
    };
    match value {
        PropValue::Empty => out.push_str(&format!("<{open}/>")),
        PropValue::Text(text) => {
            out.push_str(&format!("<{open}>{}</{close}>", xml_escape(text)));
        }
        PropValue::Xml(inner) => out.push_str(&format!("<{open}>{inner}</{close}>")),
    }
}

/// `HTTP/1.1 200 OK`
pub fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

/// Escape special XML characters
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Href of `path` (relative to the server root) below `base_uri`.
pub fn href_for(base_uri: &str, path: &str, is_collection: bool) -> String {
    let mut href = base_uri.trim_end_matches('/').to_string();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        href.push('/');
        href.push_str(&utf8_percent_encode(segment, SEGMENT).to_string());
    }
    if is_collection || href.is_empty() {
        href.push('/');
    }
    href
}

/// Format a DateTime as HTTP date (RFC 7231)
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format a DateTime as ISO 8601 for WebDAV creationdate
pub fn format_creation_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clark_notation() {
        let name = PropName::parse_clark("{http://owncloud.org/ns}fileid").unwrap();
        assert_eq!(name, PropName::oc("fileid"));
        assert_eq!(name.clark(), "{http://owncloud.org/ns}fileid");
        assert_eq!(PropName::parse_clark("plain").unwrap().ns, "");
        assert!(PropName::parse_clark("{DAV:}").is_none());
    }

    #[test]
    fn test_depth_from_header() {
        assert_eq!(Depth::from_header(Some("0")), Depth::Zero);
        assert_eq!(Depth::from_header(Some(" 1 ")), Depth::One);
        assert_eq!(Depth::from_header(Some("infinity")), Depth::Infinity);
        assert_eq!(Depth::from_header(None), Depth::Infinity);
    }

    #[test]
    fn test_parse_propfind_prop() {
        let body = br#"<?xml version="1.0"?>
            <d:propfind xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
              <d:prop><d:getetag/><oc:fileid/><x:custom xmlns:x="urn:x"/></d:prop>
            </d:propfind>"#;
        let request = PropfindRequest::parse(body).unwrap();
        assert_eq!(
            request,
            PropfindRequest::Prop(vec![
                PropName::dav("getetag"),
                PropName::oc("fileid"),
                PropName::new("urn:x", "custom"),
            ])
        );
    }

    #[test]
    fn test_parse_propfind_variants() {
        assert_eq!(PropfindRequest::parse(b"").unwrap(), PropfindRequest::AllProp);
        assert_eq!(
            PropfindRequest::parse(br#"<propfind xmlns="DAV:"><propname/></propfind>"#).unwrap(),
            PropfindRequest::PropName
        );
        assert!(PropfindRequest::parse(br#"<a xmlns="DAV:"/>"#).is_err());
        assert!(PropfindRequest::parse(b"<d:propfind xmlns:d=\"DAV:\">").is_err());
    }

    #[test]
    fn test_parse_proppatch() {
        let body = br#"<d:propertyupdate xmlns:d="DAV:" xmlns:oc="http://owncloud.org/ns">
              <d:set><d:prop><oc:favorite>1</oc:favorite>
                <oc:tags><oc:tag>a</oc:tag><oc:tag>b &amp; c</oc:tag></oc:tags></d:prop></d:set>
              <d:remove><d:prop><x:old xmlns:x="urn:x"/></d:prop></d:remove>
            </d:propertyupdate>"#;
        let ops = parse_proppatch(body).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].name, PropName::oc("favorite"));
        assert_eq!(ops[0].value.as_ref().unwrap().value(), "1");
        let tags: Vec<_> = ops[1]
            .value
            .as_ref()
            .unwrap()
            .children
            .iter()
            .map(|c| c.text.clone())
            .collect();
        assert_eq!(tags, vec!["a", "b & c"]);
        assert_eq!(ops[2].name, PropName::new("urn:x", "old"));
        assert!(ops[2].value.is_none());
    }

    #[test]
    fn test_multistatus_output() {
        let xml = build_multistatus_xml(&[MultiStatusResponse {
            href: "/remote.php/dav/files/alice/a&b.txt".into(),
            propstats: vec![
                PropStat {
                    status: StatusCode::OK,
                    props: vec![
                        (PropName::dav("getetag"), PropValue::text("\"abc\"")),
                        (PropName::new("urn:x", "color"), PropValue::text("red")),
                    ],
                },
                PropStat {
                    status: StatusCode::NOT_FOUND,
                    props: vec![(PropName::oc("missing"), PropValue::Empty)],
                },
            ],
        }]);
        assert!(xml.contains("<d:href>/remote.php/dav/files/alice/a&amp;b.txt</d:href>"));
        assert!(xml.contains("<d:getetag>&quot;abc&quot;</d:getetag>"));
        assert!(xml.contains("<x:color xmlns:x=\"urn:x\">red</x:color>"));
        assert!(xml.contains("<oc:missing/>"));
        assert!(xml.contains("HTTP/1.1 404 Not Found"));
    }

    #[test]
    fn test_href_for() {
        assert_eq!(
            href_for("/remote.php/dav/files/alice", "My Docs/a b.txt", false),
            "/remote.php/dav/files/alice/My%20Docs/a%20b.txt"
        );
        assert_eq!(
            href_for("/remote.php/dav/files/alice/", "", true),
            "/remote.php/dav/files/alice/"
        );
    }

    #[test]
    fn test_error_xml() {
        let xml = build_error_xml("NotFound", "File <x> not found");
        assert!(xml.contains("<s:exception>NotFound</s:exception>"));
        assert!(xml.contains("File &lt;x&gt; not found"));
    }
}
