// crates/lti-toolbox/src/url.rs
// ============================================================================
// Module: URL Resolution
// Description: Resolves configured paths to absolute URLs.
// Purpose: Turn handler, launch, and icon paths into URLs the LMS can reach.
// Dependencies: url, lti-toolbox-core
// ============================================================================

//! ## Overview
//! Paths in the configuration description are relative to the directory the
//! description lives in. [`UrlResolver`] joins them onto the public base URL
//! of that directory (`[web] base-url`), or onto a `file://` URL of the
//! directory when no public base is configured. Values that already carry a
//! scheme pass through untouched.

use std::path::Path;
use std::path::PathBuf;

use lti_toolbox_core::ConfigurationError;
use url::Url;

/// Resolves description-relative paths into absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    /// Base URL standing for the configuration directory.
    base: Url,
    /// Configuration directory on disk.
    directory: PathBuf,
}

impl UrlResolver {
    /// Builds a resolver for `directory`, served at `web_base` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ParseFailure`] when the base URL is
    /// malformed or the directory cannot be expressed as a URL.
    pub fn new(directory: &Path, web_base: Option<&str>) -> Result<Self, ConfigurationError> {
        let base = match web_base.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => {
                let value =
                    if value.ends_with('/') { value.to_string() } else { format!("{value}/") };
                Url::parse(&value).map_err(|err| {
                    ConfigurationError::ParseFailure(format!("web base-url: {err}"))
                })?
            }
            None => Url::from_directory_path(directory).map_err(|()| {
                ConfigurationError::ParseFailure(format!(
                    "config directory is not a url base: {}",
                    directory.display()
                ))
            })?,
        };
        Ok(Self {
            base,
            directory: directory.to_path_buf(),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    /// Resolves `value` against the base; absolute `http`/`https` URLs pass
    /// through. Any other value is a path, even when it looks like
    /// `host:port/path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ParseFailure`] when the join fails.
    pub fn resolve(&self, value: &str) -> Result<String, ConfigurationError> {
        let value = value.trim();
        if Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https")) {
            return Ok(value.to_string());
        }
        let relative =
            if value.starts_with('/') { value.to_string() } else { format!("./{value}") };
        self.base
            .join(&relative)
            .map(String::from)
            .map_err(|err| ConfigurationError::ParseFailure(format!("{value}: {err}")))
    }

    /// Resolves an icon reference.
    ///
    /// Only references naming an existing file under the configuration
    /// directory are resolved; anything else is taken as an external URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ParseFailure`] when the join fails.
    pub fn resolve_icon(&self, value: &str) -> Result<String, ConfigurationError> {
        if self.directory.join(value.trim()).is_file() {
            self.resolve(value)
        } else {
            Ok(value.to_string())
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
