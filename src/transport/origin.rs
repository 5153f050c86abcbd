//! Origin strings used for postMessage filtering.

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// A serialized tuple origin such as `https://wallet.example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin(String);

impl Origin {
    /// Derives the origin of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for URLs with an opaque origin (`data:`,
    /// `file:` and the like), which can never match a sender.
    pub fn from_url(url: &Url) -> Result<Self> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(Error::config(format!("URL has an opaque origin: {url}")));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    /// Parses a URL and derives its origin.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `input` is not a URL
    /// - [`Error::Config`] if the origin is opaque
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_url(&Url::parse(input)?)
    }

    /// Returns `true` if a frame from `origin` may be accepted.
    #[inline]
    #[must_use]
    pub fn matches(&self, origin: &str) -> bool {
        self.0 == origin
    }

    /// Returns the serialized origin.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
