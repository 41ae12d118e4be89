//! Business content of an event and its builder.
//!
//! Builders start from the defaults the collector expects (hostname,
//! language, screen, root URL) so callers only set what they care about.

use std::collections::BTreeMap;
use std::env;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Screen descriptor reported when the caller does not supply one.
pub const DEFAULT_SCREEN: &str = "1920x1080";
/// Language tag reported when the locale cannot be determined.
pub const DEFAULT_LANGUAGE: &str = "en-US";
const FALLBACK_HOSTNAME: &str = "localhost";

// Host and locale do not change while the process runs.
static SYSTEM_HOSTNAME: Lazy<String> = Lazy::new(system_hostname);
static SYSTEM_LANGUAGE: Lazy<String> = Lazy::new(system_language);

/// Reasons a payload cannot be constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("website identifier must not be empty")]
    MissingWebsite,
    #[error("payload id must not be empty")]
    MissingId,
    #[error("custom events require a non-empty name")]
    MissingName,
}

/// Serializable content of one event.
///
/// Optional fields that are `None` are omitted from the wire encoding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Payload {
    website: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screen: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, Value>,
}

impl Payload {
    /// Start a custom event payload named `name` for `website`.
    pub fn builder(website: impl Into<String>, name: impl Into<String>) -> PayloadBuilder {
        PayloadBuilder::new(website.into(), Some(name.into()))
    }

    /// Start a pageview payload (no event name) for `website`.
    pub fn pageview(website: impl Into<String>) -> PayloadBuilder {
        PayloadBuilder::new(website.into(), None)
    }

    pub fn website(&self) -> &str {
        &self.website
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn screen(&self) -> Option<&str> {
        self.screen.as_deref()
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Whether this payload counts as a pageview rather than a custom event.
    pub fn is_pageview(&self) -> bool {
        self.name.is_none()
    }
}

/// Builder for [`Payload`] values.
///
/// Validation happens in [`PayloadBuilder::build`]; setters never fail.
#[derive(Clone, Debug)]
pub struct PayloadBuilder {
    website: String,
    name: Option<String>,
    id: String,
    url: Option<String>,
    title: Option<String>,
    referrer: Option<String>,
    tag: Option<String>,
    hostname: Option<String>,
    language: Option<String>,
    screen: Option<String>,
    data: BTreeMap<String, Value>,
}

macro_rules! optional_field {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: impl Into<String>) -> Self {
            self.$field = Some(value.into());
            self
        }
    };
}

impl PayloadBuilder {
    fn new(website: String, name: Option<String>) -> Self {
        let title = name.clone().unwrap_or_default();
        Self {
            website,
            name,
            id: Uuid::new_v4().to_string(),
            url: Some("/".into()),
            title: Some(title),
            referrer: Some(String::new()),
            tag: None,
            hostname: Some(SYSTEM_HOSTNAME.clone()),
            language: Some(SYSTEM_LANGUAGE.clone()),
            screen: Some(DEFAULT_SCREEN.into()),
            data: BTreeMap::new(),
        }
    }

    /// Set the subject identifier (session or user id).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    optional_field!(
        #[doc = "Set the page URL."]
        url,
        url
    );
    optional_field!(
        #[doc = "Set the page title."]
        title,
        title
    );
    optional_field!(
        #[doc = "Set the referrer URL."]
        referrer,
        referrer
    );
    optional_field!(
        #[doc = "Attach a free-form tag."]
        tag,
        tag
    );
    optional_field!(
        #[doc = "Override the reported hostname."]
        hostname,
        hostname
    );
    optional_field!(
        #[doc = "Override the reported language tag."]
        language,
        language
    );
    optional_field!(
        #[doc = "Override the reported screen descriptor."]
        screen,
        screen
    );

    /// Replace the free-form data map.
    pub fn data(mut self, data: BTreeMap<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Insert a single free-form data entry.
    pub fn add_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Validate and produce the payload.
    pub fn build(self) -> Result<Payload, PayloadError> {
        if self.website.trim().is_empty() {
            return Err(PayloadError::MissingWebsite);
        }
        if self.id.trim().is_empty() {
            return Err(PayloadError::MissingId);
        }
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(PayloadError::MissingName);
        }
        Ok(Payload {
            website: self.website,
            id: self.id,
            name: self.name,
            url: self.url,
            title: self.title,
            referrer: self.referrer,
            tag: self.tag,
            hostname: self.hostname,
            language: self.language,
            screen: self.screen,
            data: self.data,
        })
    }
}

fn system_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.into())
}

fn system_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find_map(|value| language_tag(&value))
        .unwrap_or_else(|| DEFAULT_LANGUAGE.into())
}

/// Convert a POSIX locale such as `en_GB.UTF-8` into a tag like `en-GB`.
pub(crate) fn language_tag(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next()?.trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}
