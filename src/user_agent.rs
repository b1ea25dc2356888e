//! Default User-Agent for download requests.
//!
//! Downloads reuse browser cookies, so requests present themselves as the
//! browser those cookies came from rather than as a bespoke tool.

/// Browser User-Agent sent with every request unless overridden.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:130.0) Gecko/20100101 Firefox/130.0";

/// Picks the User-Agent for a client: the override when non-blank, else the default.
#[must_use]
pub(crate) fn effective_user_agent(override_ua: Option<&str>) -> &str {
    override_ua
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .unwrap_or(DEFAULT_USER_AGENT)
}
