use crate::TOKEN_USERNAME;

/// Build the URL handed to the clone, embedding `token` as basic-auth
/// credentials when the locator is an `http(s)` URL.
///
/// SCP-style GitHub/GitLab locators are rewritten to HTTPS first so the token
/// can be used. Local paths, `file://` and `ssh://` locators, and locators that
/// already carry credentials are returned unchanged.
pub fn authenticated_url(locator: &str, token: Option<&str>) -> String {
    let locator = locator.trim();
    let token = match token.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return locator.to_string(),
    };

    let normalized = locator
        .replace("git@github.com:", "https://github.com/")
        .replace("git@gitlab.com:", "https://gitlab.com/");

    let (scheme, rest) = if let Some(rest) = normalized.strip_prefix("https://") {
        ("https://", rest)
    } else if let Some(rest) = normalized.strip_prefix("http://") {
        ("http://", rest)
    } else {
        return locator.to_string();
    };

    let host_end = rest.find('/').unwrap_or(rest.len());
    if rest[..host_end].contains('@') {
        return locator.to_string();
    }

    format!("{scheme}{TOKEN_USERNAME}:{token}@{rest}")
}

/// Strip any userinfo from a URL so it can be logged.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let host_end = rest.find('/').unwrap_or(rest.len());
    match rest[..host_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => url.to_string(),
    }
}
