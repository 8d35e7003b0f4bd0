//! Mail envelope and body.

use serde::Serialize;

use super::template::EmailTemplate;

/// An address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    pub address: String,
    pub name: Option<String>,
}

impl Mailbox {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{name}\" <{}>", self.address),
            None => write!(f, "<{}>", self.address),
        }
    }
}

/// A composed message ready for a [`super::Mailer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: Option<Mailbox>,
    pub reply_to: Option<Mailbox>,
    pub to: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    /// Identifier of the template the body was rendered from.
    pub template_id: Option<String>,
}

impl MailMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take subject and bodies from a rendered template.
    pub fn use_template(&mut self, template: &EmailTemplate) -> &mut Self {
        self.subject = template.subject().to_string();
        self.text_body = template.render_text();
        self.html_body = template.render_html();
        self.template_id = Some(template.id().to_string());
        self
    }

    /// Every recipient address, visible or blind.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.bcc.iter())
            .map(|m| m.address.as_str())
    }
}
