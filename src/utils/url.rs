//! Endpoint URL helpers
//!
//! The OpenRouter base URL is user-configurable, so endpoint construction
//! has to tolerate stray slashes on either side of the join.

/// Base URL used when the configuration does not override it.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Catalog endpoint, relative to the base URL.
pub const MODELS_ENDPOINT: &str = "models";

/// Chat completion endpoint, relative to the base URL. Image generation
/// goes through the same endpoint.
pub const CHAT_COMPLETIONS_ENDPOINT: &str = "chat/completions";

/// Resolve the configured base URL, falling back to [`DEFAULT_BASE_URL`]
/// when the value is absent or blank. Trailing slashes are removed.
///
/// ```
/// use opencreator::utils::url::resolve_base_url;
///
/// assert_eq!(resolve_base_url(None), "https://openrouter.ai/api/v1");
/// assert_eq!(resolve_base_url(Some("  ")), "https://openrouter.ai/api/v1");
/// assert_eq!(resolve_base_url(Some("http://localhost:8080/v1/")), "http://localhost:8080/v1");
/// ```
pub fn resolve_base_url(configured: Option<&str>) -> String {
    match configured.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => DEFAULT_BASE_URL.to_string(),
    }
}

/// Join an endpoint path onto a base URL without doubling slashes.
///
/// ```
/// use opencreator::utils::url::endpoint_url;
///
/// assert_eq!(
///     endpoint_url("https://openrouter.ai/api/v1/", "/chat/completions"),
///     "https://openrouter.ai/api/v1/chat/completions"
/// );
/// ```
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
