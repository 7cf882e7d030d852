//! Hostname normalization used to compare where a navigation landed with
//! where it was expected to land.

/// Hostname Chrome reports while it shows its internal network-error page.
pub const ERROR_PLACEHOLDER_HOST: &str = "chromewebdata";

/// Returns a comparable hostname for `url`: lower-cased, without a leading
/// `www.`.
///
/// Input that does not parse as an absolute URL with a host is returned
/// lower-cased as-is, so a bare hostname normalizes to itself. This is a
/// comparison key, not a validator, and never fails.
#[must_use]
pub fn normalize_host(url: &str) -> String {
    let Some(host) = url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
    else {
        return url.to_lowercase();
    };

    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_owned(),
        None => host,
    }
}

/// Normalizes a configured domain, given either as a bare hostname or as a
/// full URL, to the form [`normalize_host`] produces for visited pages.
#[must_use]
pub fn normalize_domain(value: &str) -> String {
    let value = value.trim();
    if value.contains("://") {
        normalize_host(value)
    } else {
        normalize_host(&format!("https://{value}"))
    }
}

/// Whether `current_url` is on the expected merchant site.
///
/// Matches on equal hostnames, or when the raw URL contains the expected
/// hostname anywhere (subdomains, path fragments, redirect parameters).
#[must_use]
pub fn is_same_site(current_url: &str, current_host: &str, expected_host: &str) -> bool {
    if expected_host.is_empty() {
        return false;
    }
    current_host == expected_host || current_url.to_lowercase().contains(expected_host)
}

/// Whether `host` is the browser's placeholder for a blocked or unresolved
/// navigation.
#[must_use]
pub fn is_error_placeholder(host: &str) -> bool {
    host == ERROR_PLACEHOLDER_HOST || host.contains("chrome-error")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
