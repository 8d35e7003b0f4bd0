//! DAV principals for accounts, groups, circles and pseudo accounts.
//!
//! [`PrincipalBackend`] maps principal URIs such as `principals/users/alice`
//! onto the account and group directories and applies the account
//! enumeration policy to property searches.

mod backend;
pub mod circle;
mod search;
pub mod uri;

use std::collections::BTreeMap;

use serde::Serialize;

pub use backend::PrincipalBackend;
pub use circle::{Circle, CircleBackend, MemoryCircles, NoCircles};
pub use search::SearchTest;

/// `{DAV:}displayname`
pub const PROP_DISPLAYNAME: &str = "{DAV:}displayname";
/// `{DAV:}alternate-URI-set`
pub const PROP_ALTERNATE_URI_SET: &str = "{DAV:}alternate-URI-set";
/// `{http://sabredav.org/ns}email-address`
pub const PROP_EMAIL_ADDRESS: &str = "{http://sabredav.org/ns}email-address";
/// `{urn:ietf:params:xml:ns:caldav}calendar-user-type`
pub const PROP_CALENDAR_USER_TYPE: &str = "{urn:ietf:params:xml:ns:caldav}calendar-user-type";
/// `{urn:ietf:params:xml:ns:caldav}calendar-user-address-set`
pub const PROP_CALENDAR_USER_ADDRESS_SET: &str =
    "{urn:ietf:params:xml:ns:caldav}calendar-user-address-set";
/// `{http://calendarserver.org/ns/}email-address-set`
pub const PROP_EMAIL_ADDRESS_SET: &str = "{http://calendarserver.org/ns/}email-address-set";
/// `{http://nextcloud.com/ns}language`
pub const PROP_LANGUAGE: &str = "{http://nextcloud.com/ns}language";

/// Value of one principal property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PrincipalValue {
    Text(String),
    Uris(Vec<String>),
}

impl PrincipalValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Uris(_) => None,
        }
    }

    pub fn as_uris(&self) -> &[String] {
        match self {
            Self::Text(_) => &[],
            Self::Uris(uris) => uris,
        }
    }
}

/// A principal: its URI plus properties keyed in Clark notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub uri: String,
    pub properties: BTreeMap<String, PrincipalValue>,
}

impl Principal {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties
            .insert(name.to_string(), PrincipalValue::Text(value.into()));
        self
    }

    pub fn with_uris(mut self, name: &str, uris: Vec<String>) -> Self {
        self.properties
            .insert(name.to_string(), PrincipalValue::Uris(uris));
        self
    }

    pub fn property(&self, name: &str) -> Option<&PrincipalValue> {
        self.properties.get(name)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.property(PROP_DISPLAYNAME).and_then(PrincipalValue::as_text)
    }

    pub fn email(&self) -> Option<&str> {
        self.property(PROP_EMAIL_ADDRESS).and_then(PrincipalValue::as_text)
    }
}
