//! Block-based notification mail template with text and HTML renderings.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Header,
    Heading { html: String, plain: String },
    BodyText { html: String, plain: String },
    Button { label: String, url: String },
    Footer(Option<String>),
}

/// A notification mail assembled from header, heading, body, button and
/// footer blocks in call order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailTemplate {
    id: String,
    data: Map<String, Value>,
    subject: String,
    instance_name: String,
    blocks: Vec<Block>,
}

impl EmailTemplate {
    /// `id` names the template for mailers that restyle known templates;
    /// `data` carries the values it was built from.
    pub fn new(id: impl Into<String>, instance_name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
            subject: String::new(),
            instance_name: instance_name.into(),
            blocks: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = subject.into();
        self
    }

    pub fn add_header(&mut self) -> &mut Self {
        self.blocks.push(Block::Header);
        self
    }

    /// Heading. `plain` defaults to `html` when `None`.
    pub fn add_heading(&mut self, html: impl Into<String>, plain: Option<String>) -> &mut Self {
        let html = html.into();
        let plain = plain.unwrap_or_else(|| html.clone());
        self.blocks.push(Block::Heading { html, plain });
        self
    }

    /// Paragraph. `html` must already be escaped.
    pub fn add_body_text(&mut self, html: impl Into<String>, plain: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::BodyText {
            html: html.into(),
            plain: plain.into(),
        });
        self
    }

    pub fn add_body_button(&mut self, label: impl Into<String>, url: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Button {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    /// Footer line. `None` renders the default "do not reply" footer.
    pub fn add_footer(&mut self, text: Option<String>) -> &mut Self {
        self.blocks.push(Block::Footer(text));
        self
    }

    fn default_footer(&self) -> String {
        format!(
            "{} - This is an automatically sent email, please do not reply.",
            self.instance_name
        )
    }

    pub fn render_text(&self) -> String {
        let mut parts = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Header => {}
                Block::Heading { plain, .. } | Block::BodyText { plain, .. } => {
                    parts.push(plain.clone())
                }
                Block::Button { label, url } => parts.push(format!("{label}: {url}")),
                Block::Footer(text) => {
                    parts.push(format!("--\n{}", text.clone().unwrap_or_else(|| self.default_footer())))
                }
            }
        }
        parts.join("\n\n")
    }

    pub fn render_html(&self) -> String {
        let mut html = String::from("<!DOCTYPE html><html><body>");
        for block in &self.blocks {
            match block {
                Block::Header => {
                    html.push_str(&format!("<header>{}</header>", escape_html(&self.instance_name)))
                }
                Block::Heading { html: text, .. } => {
                    html.push_str(&format!("<h1>{}</h1>", escape_html(text)))
                }
                Block::BodyText { html: text, .. } => html.push_str(&format!("<p>{text}</p>")),
                Block::Button { label, url } => html.push_str(&format!(
                    "<p><a class=\"button\" href=\"{}\">{}</a></p>",
                    escape_html(url),
                    escape_html(label)
                )),
                Block::Footer(text) => {
                    let footer = text.clone().unwrap_or_else(|| self.default_footer());
                    html.push_str(&format!("<footer>{}</footer>", escape_html(&footer)))
                }
            }
        }
        html.push_str("</body></html>");
        html
    }
}

/// Escape `& < > " '` for HTML text and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}
