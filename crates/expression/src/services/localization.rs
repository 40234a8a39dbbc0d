//! Localizations and mail templates

use serde::Deserialize;

/// Source of localized strings and mail template texts
pub trait Localizer: Send + Sync {
    /// Localized names for `key` in `locale`; `domain: None` matches entries
    /// without a domain. More than one result means the data is ambiguous.
    fn localize(&self, locale: &str, key: &str, domain: Option<&str>) -> Vec<String>;

    /// Text of the mail template with the given name and locale
    fn mail_template(&self, name: &str, locale: &str) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Localization {
    pub locale: String,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    pub localized_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailTemplate {
    pub name: String,
    pub locale: String,
    pub text: String,
}

/// Localizations and templates held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalizer {
    localizations: Vec<Localization>,
    templates: Vec<MailTemplate>,
}

impl MemoryLocalizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_localization(
        mut self,
        locale: &str,
        name: &str,
        domain: Option<&str>,
        localized_name: &str,
    ) -> Self {
        self.localizations.push(Localization {
            locale: locale.to_string(),
            name: name.to_string(),
            domain: domain.map(str::to_string),
            localized_name: localized_name.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_template(mut self, name: &str, locale: &str, text: &str) -> Self {
        self.templates.push(MailTemplate {
            name: name.to_string(),
            locale: locale.to_string(),
            text: text.to_string(),
        });
        self
    }

    pub fn extend(&mut self, localizations: Vec<Localization>, templates: Vec<MailTemplate>) {
        self.localizations.extend(localizations);
        self.templates.extend(templates);
    }
}

impl Localizer for MemoryLocalizer {
    fn localize(&self, locale: &str, key: &str, domain: Option<&str>) -> Vec<String> {
        self.localizations
            .iter()
            .filter(|l| l.locale == locale && l.name == key)
            .filter(|l| {
                let entry_domain = l.domain.as_deref().filter(|d| !d.trim().is_empty());
                entry_domain == domain
            })
            .map(|l| l.localized_name.clone())
            .collect()
    }

    fn mail_template(&self, name: &str, locale: &str) -> Option<String> {
        self.templates
            .iter()
            .find(|t| t.name == name && t.locale == locale)
            .map(|t| t.text.clone())
    }
}
