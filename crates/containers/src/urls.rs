//! URL classification
//!
//! The decision rules only care about a handful of URL shapes: the home and
//! new-tab pages, the blank page a new tab passes through, extension pages,
//! and everything else ("real" pages).

use crate::types::{ChangeInfo, TabStatus};

pub const ABOUT_HOME: &str = "about:home";
pub const ABOUT_NEWTAB: &str = "about:newtab";
pub const ABOUT_BLANK: &str = "about:blank";
pub const ABOUT_SESSIONRESTORE: &str = "about:sessionrestore";

/// Scheme prefix of extension-internal pages
pub const EXTENSION_SCHEME: &str = "moz-extension://";

pub fn is_extension_page(url: &str) -> bool {
    url.starts_with(EXTENSION_SCHEME)
}

pub fn is_home_or_new_tab(url: &str) -> bool {
    matches!(url, ABOUT_HOME | ABOUT_NEWTAB)
}

/// A new tab on its way through `about:blank` to wherever it is headed
pub fn is_blank_navigation(change_info: &ChangeInfo) -> bool {
    change_info.status == Some(TabStatus::Loading) && change_info.url.as_deref() == Some(ABOUT_BLANK)
}

/// Any page that is neither an `about:` page nor an extension page
pub fn is_real_page(url: &str) -> bool {
    !url.starts_with("about:") && !url.starts_with("moz-extension:")
}

/// Hostname of `url`, or `None` for unparsable or host-less URLs
pub fn hostname(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(str::to_string)
}

/// Exact hostname membership in `domains`
pub fn matches_domain(url: &str, domains: &[String]) -> bool {
    match hostname(url) {
        Some(host) => domains.iter().any(|domain| *domain == host),
        None => false,
    }
}
