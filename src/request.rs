use crate::error::RequestError;
use crate::filter::normalize_url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Routing tag that selects the handler for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Unlabeled request, processed by the default handler
    #[default]
    Default,
    /// Category listing page
    Listing,
    /// Product detail page
    Detail,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Default, Label::Listing, Label::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Default => "default",
            Label::Listing => "listing",
            Label::Detail => "detail",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(Label::Default),
            "listing" => Ok(Label::Listing),
            "detail" => Ok(Label::Detail),
            other => Err(RequestError::UnknownLabel(other.to_string())),
        }
    }
}

/// One unit of crawl work: a normalized URL plus its routing label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
    unique_key: String,
    label: Label,
    loaded_url: Option<Url>,
}

impl Request {
    /// Build a request from an absolute URL string
    pub fn from_url(url: &str, label: Label) -> Result<Self, RequestError> {
        let parsed = Url::parse(url).map_err(|source| RequestError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Self::new(parsed, label)
    }

    /// Build a request from a possibly relative href found on `base`
    pub fn from_href(base: &Url, href: &str, label: Label) -> Result<Self, RequestError> {
        let resolved = base.join(href).map_err(|source| RequestError::InvalidUrl {
            url: href.to_string(),
            source,
        })?;
        Self::new(resolved, label)
    }

    pub fn new(url: Url, label: Label) -> Result<Self, RequestError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequestError::UnsupportedScheme(url.scheme().to_string()));
        }
        let url = normalize_url(&url);
        Ok(Self {
            unique_key: url.to_string(),
            url,
            label,
            loaded_url: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Dedup key of this request
    pub fn unique_key(&self) -> &str {
        &self.unique_key
    }

    pub fn label(&self) -> Label {
        self.label
    }

    /// URL reached after redirects, once navigation has finished
    pub fn loaded_url(&self) -> Option<&Url> {
        self.loaded_url.as_ref()
    }

    /// Record where navigation ended up. Only the first call has an effect.
    pub fn set_loaded_url(&mut self, url: Url) -> bool {
        if self.loaded_url.is_some() {
            ::log::warn!("Loaded URL for {} was already set, ignoring {}", self.url, url);
            return false;
        }
        self.loaded_url = Some(url);
        true
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.url, self.label)
    }
}
