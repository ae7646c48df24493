/// Public Airtable REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// Runtime configuration describing how to reach the Airtable base.
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    /// Airtable REST root.
    pub api_url: String,
    /// Personal access token.
    pub token: Option<String>,
    /// Base holding the roster tables.
    pub base_id: Option<String>,
}

impl AirtableConfig {
    /// Configuration pointing at `api_url` without credentials.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: None,
            base_id: None,
        }
    }

    /// Attach the personal access token and base identifier.
    pub fn with_credentials(mut self, token: impl Into<String>, base_id: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.base_id = Some(base_id.into());
        self
    }

    /// Build a configuration from `AIRTABLE_TOKEN`, `AIRTABLE_BASE_ID` and the optional
    /// `AIRTABLE_API_URL`. Missing credentials yield an unconfigured store rather than an error.
    pub fn from_env() -> Self {
        let api_url = std::env::var("AIRTABLE_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Self {
            api_url,
            token: std::env::var("AIRTABLE_TOKEN").ok(),
            base_id: std::env::var("AIRTABLE_BASE_ID").ok(),
        }
    }

    /// Both the token and the base identifier are present and non-blank.
    pub fn is_configured(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.token) && present(&self.base_id)
    }
}

impl Default for AirtableConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
