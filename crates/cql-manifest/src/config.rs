//! Configuration for the dependency extractor.

/// Configuration for [`DependencyExtractor`](crate::DependencyExtractor).
///
/// # Example
///
/// ```rust
/// use cql_manifest::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .with_library_base_url("https://example.org/fhir/Library")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfig {
    /// Base URL composed into include-declaration artifact URIs
    /// (`<base>/<name>|<version>`). When unset, URIs use the relative form
    /// `Library/<name>|<version>`.
    pub library_base_url: Option<String>,
}

impl ExtractorConfig {
    /// Creates a new builder for ExtractorConfig.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::default()
    }

    /// The effective base for include artifact URIs, trailing slash trimmed.
    pub(crate) fn library_base(&self) -> &str {
        self.library_base_url
            .as_deref()
            .map(|base| base.trim_end_matches('/'))
            .unwrap_or("Library")
    }
}

/// Builder for ExtractorConfig.
#[derive(Debug, Clone, Default)]
pub struct ExtractorConfigBuilder {
    library_base_url: Option<String>,
}

impl ExtractorConfigBuilder {
    /// Sets the base URL for include artifact URIs.
    pub fn with_library_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.library_base_url = Some(base_url.into());
        self
    }

    /// Builds the ExtractorConfig.
    pub fn build(self) -> ExtractorConfig {
        ExtractorConfig {
            library_base_url: self.library_base_url,
        }
    }
}
