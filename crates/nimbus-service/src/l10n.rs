//! Localization of notification texts.
//!
//! Catalogs are registered per `(app, language)`. Lookups that miss fall
//! back to the source text, so the default factory passes English through
//! with only placeholder substitution applied.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nimbus_entity::user::User;

/// Language used when an account has none configured.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Translates source strings for one language.
pub trait Translator: Send + Sync + fmt::Debug {
    /// Language code of this translator.
    fn language(&self) -> &str;

    /// Translate `text` and substitute `%s` / `%1$s` placeholders.
    fn t(&self, text: &str, params: &[&str]) -> String;
}

/// Translation table for one app and language.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    language: String,
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            entries: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, source: impl Into<String>, translated: impl Into<String>) -> Self {
        self.entries.insert(source.into(), translated.into());
        self
    }
}

impl Translator for Catalog {
    fn language(&self) -> &str {
        &self.language
    }

    fn t(&self, text: &str, params: &[&str]) -> String {
        let template = self.entries.get(text).map(String::as_str).unwrap_or(text);
        substitute(template, params)
    }
}

/// Hands out translators and resolves account languages.
#[derive(Debug, Clone, Default)]
pub struct L10nFactory {
    catalogs: HashMap<(String, String), Arc<Catalog>>,
}

impl L10nFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a catalog for an app.
    pub fn with_catalog(mut self, app: impl Into<String>, catalog: Catalog) -> Self {
        self.catalogs
            .insert((app.into(), catalog.language.clone()), Arc::new(catalog));
        self
    }

    /// Preferred language of an account.
    pub fn user_language(&self, user: &User) -> String {
        user.language
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }

    /// Translator for an app in a language. Unknown pairs pass through.
    pub fn get(&self, app: &str, language: &str) -> Arc<dyn Translator> {
        if let Some(catalog) = self.catalogs.get(&(app.to_string(), language.to_string())) {
            return catalog.clone();
        }
        Arc::new(Catalog::new(language))
    }
}

/// Substitute printf-style `%s` and positional `%N$s` placeholders.
///
/// `%%` yields a literal percent sign. Missing parameters expand to nothing.
pub fn substitute(template: &str, params: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next = 0;
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        if let Some(after) = tail.strip_prefix('s') {
            out.push_str(params.get(next).copied().unwrap_or_default());
            next += 1;
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix('%') {
            out.push('%');
            rest = after;
            continue;
        }

        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            if let Some(after) = tail[digits..].strip_prefix("$s") {
                let value = tail[..digits]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| params.get(i))
                    .copied()
                    .unwrap_or_default();
                out.push_str(value);
                rest = after;
                continue;
            }
        }

        out.push('%');
        rest = tail;
    }
    out.push_str(rest);
    out
}
