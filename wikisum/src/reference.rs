//! Canonical Wikipedia article references.
//!
//! Every URL that enters the service goes through [`normalize`] before anything is fetched
//! or looked up. Only the `wikipedia.org` apex and `<lang>.wikipedia.org` /
//! `<lang>.m.wikipedia.org` hosts are accepted, so an arbitrary caller-supplied URL can
//! never become a fetch target.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use url::{Host, Url};

pub const WIKIPEDIA_DOMAIN: &str = "wikipedia.org";

const ARTICLE_PREFIX: &str = "/wiki/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("URL is not valid")]
    Malformed,
    #[error("URL must start with http:// or https://")]
    UnsupportedScheme,
    #[error("URL must not contain credentials")]
    Credentials,
    #[error("URL must belong to wikipedia.org")]
    DisallowedHost,
    #[error("URL must point to a Wikipedia article")]
    NotAnArticle,
}

/// A validated, canonical article URL: `https://<host>[:port]/wiki/<Title>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedReference(String);

impl NormalizedReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded article title, e.g. `Rust_(programming_language)`.
    pub fn title(&self) -> &str {
        self.0
            .find(ARTICLE_PREFIX)
            .map(|idx| &self.0[idx + ARTICLE_PREFIX.len()..])
            .unwrap_or_default()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate and canonicalize a free-form article URL.
///
/// - scheme is forced to `https`
/// - host is lowercased, must be in the Wikipedia family, and loses its mobile `m.` label
/// - `/w/index.php?title=X` and `/?title=X` are rewritten to `/wiki/X`
/// - query strings, fragments, duplicate and trailing slashes are dropped
/// - spaces become underscores and the first letter of the title is uppercased
pub fn normalize(input: &str) -> Result<NormalizedReference, ReferenceError> {
    let parsed = Url::parse(input.trim()).map_err(|_| ReferenceError::Malformed)?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ReferenceError::UnsupportedScheme);
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(ReferenceError::Credentials);
    }

    let host = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_ascii_lowercase(),
        _ => return Err(ReferenceError::DisallowedHost),
    };
    if !is_allowed_host(&host) {
        return Err(ReferenceError::DisallowedHost);
    }
    // mobile and desktop hosts serve the same article
    let host = match host.strip_suffix(".m.wikipedia.org") {
        Some(lang) => format!("{lang}.wikipedia.org"),
        None => host,
    };

    let port = parsed
        .port()
        .filter(|p| *p != 80 && *p != 443)
        .map(|p| format!(":{p}"))
        .unwrap_or_default();

    let mut path = collapse_slashes(parsed.path());
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    if path == "/" || path == "/w/index.php" {
        let title = parsed
            .query_pairs()
            .find(|(key, _)| key == "title")
            .map(|(_, value)| value.trim().replace(' ', "_"))
            .filter(|t| !t.is_empty())
            .ok_or(ReferenceError::NotAnArticle)?;
        path = encode_article_path(&title)?;
    }

    let title = path
        .strip_prefix(ARTICLE_PREFIX)
        .filter(|t| !t.is_empty())
        .ok_or(ReferenceError::NotAnArticle)?;

    Ok(NormalizedReference(format!(
        "https://{host}{port}{ARTICLE_PREFIX}{}",
        canonical_title(title)
    )))
}

fn is_allowed_host(host: &str) -> bool {
    if host == WIKIPEDIA_DOMAIN {
        return true;
    }
    let Some(prefix) = host.strip_suffix(".wikipedia.org") else {
        return false;
    };
    let labels: Vec<&str> = prefix.split('.').collect();
    match labels.as_slice() {
        [lang] => is_language_label(lang),
        [lang, "m"] => is_language_label(lang),
        _ => false,
    }
}

fn is_language_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Percent-encode a decoded title the same way `Url::parse` encodes a literal path.
fn encode_article_path(title: &str) -> Result<String, ReferenceError> {
    let mut scratch = Url::parse("https://wikipedia.org/").map_err(|_| ReferenceError::Malformed)?;
    scratch.set_path(&format!("{ARTICLE_PREFIX}{title}"));
    Ok(scratch.path().to_string())
}

fn canonical_title(encoded: &str) -> String {
    let spaced = encoded.replace("%20", "_");

    // uppercase hex digits in percent escapes so %c3%a9 and %C3%A9 compare equal
    let mut out = String::with_capacity(spaced.len());
    let mut escape_left = 0;
    for c in spaced.chars() {
        if escape_left > 0 {
            out.push(c.to_ascii_uppercase());
            escape_left -= 1;
        } else {
            if c == '%' {
                escape_left = 2;
            }
            out.push(c);
        }
    }

    let mut chars = out.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            format!("{}{}", first.to_ascii_uppercase(), chars.as_str())
        }
        _ => out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        normalize(s).expect("should normalize").into_string()
    }

    #[test]
    fn removes_fragment_and_trailing_slash() {
        assert_eq!(
            norm("https://EN.WIKIPEDIA.ORG/wiki/Artificial_intelligence/#History"),
            "https://en.wikipedia.org/wiki/Artificial_intelligence"
        );
    }

    #[test]
    fn forces_https_and_drops_query() {
        assert_eq!(
            norm("http://en.wikipedia.org/wiki/Artificial_intelligence?action=history&oldid=1"),
            "https://en.wikipedia.org/wiki/Artificial_intelligence"
        );
    }

    #[test]
    fn accepts_root_and_mobile_domains() {
        assert_eq!(
            norm("https://wikipedia.org/wiki/Artificial_intelligence"),
            "https://wikipedia.org/wiki/Artificial_intelligence"
        );
        assert_eq!(
            norm("https://pt.m.wikipedia.org/wiki/Brasil"),
            "https://pt.wikipedia.org/wiki/Brasil"
        );
        assert_eq!(
            normalize("https://en.m.wikipedia.org/wiki/Test").unwrap(),
            normalize("https://en.wikipedia.org/wiki/Test").unwrap()
        );
    }

    #[test]
    fn converts_index_php_title() {
        assert_eq!(
            norm("https://en.wikipedia.org/w/index.php?title=Artificial intelligence&oldid=12"),
            "https://en.wikipedia.org/wiki/Artificial_intelligence"
        );
        assert_eq!(
            norm("https://en.wikipedia.org/?title=Rust_(programming_language)"),
            "https://en.wikipedia.org/wiki/Rust_(programming_language)"
        );
    }

    #[test]
    fn canonical_casing_and_spacing() {
        assert_eq!(norm("https://en.wikipedia.org/wiki/test"), "https://en.wikipedia.org/wiki/Test");
        assert_eq!(
            norm("https://en.wikipedia.org//wiki//New%20York%20City"),
            "https://en.wikipedia.org/wiki/New_York_City"
        );
        assert_eq!(
            norm("https://fr.wikipedia.org/wiki/%c3%89cole"),
            "https://fr.wikipedia.org/wiki/%C3%89cole"
        );
        assert_eq!(
            norm("https://fr.wikipedia.org/wiki/École"),
            "https://fr.wikipedia.org/wiki/%C3%89cole"
        );
    }

    #[test]
    fn keeps_non_default_port_only() {
        assert_eq!(
            norm("http://en.wikipedia.org:80/wiki/Test"),
            "https://en.wikipedia.org/wiki/Test"
        );
        assert_eq!(
            norm("https://en.wikipedia.org:8443/wiki/Test"),
            "https://en.wikipedia.org:8443/wiki/Test"
        );
    }

    #[test]
    fn normalizing_twice_is_idempotent() {
        let inputs = [
            "https://EN.WIKIPEDIA.ORG/wiki/Artificial_intelligence/#History",
            "http://en.wikipedia.org/w/index.php?title=New York City",
            "https://en.wikipedia.org/wiki/rust_(programming_language)?x=1",
            "https://fr.wikipedia.org/wiki/%c3%a9cole/",
            "https://de.m.wikipedia.org//wiki/Berlin",
            "http://EN.M.wikipedia.org/wiki/test#Top",
            "https://en.wikipedia.org:8443/wiki/Test",
            "https://wikipedia.org/wiki/AC/DC",
        ];
        for input in inputs {
            let once = normalize(input).expect(input);
            let twice = normalize(once.as_str()).expect(once.as_str());
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn rejects_disallowed_hosts() {
        let inputs = [
            "https://example.com/wiki/AI",
            "https://wikipedia.org.evil.com/wiki/AI",
            "https://en.wikipedia.org.evil.com/wiki/AI",
            "https://evilwikipedia.org/wiki/AI",
            "https://a.b.c.wikipedia.org/wiki/AI",
            "https://127.0.0.1/wiki/AI",
            "https://[::1]/wiki/AI",
        ];
        for input in inputs {
            assert_eq!(normalize(input), Err(ReferenceError::DisallowedHost), "{input}");
        }
    }

    #[test]
    fn rejects_other_malformed_inputs() {
        assert_eq!(normalize("not a url"), Err(ReferenceError::Malformed));
        assert_eq!(normalize("en.wikipedia.org/wiki/AI"), Err(ReferenceError::Malformed));
        assert_eq!(
            normalize("ftp://en.wikipedia.org/wiki/AI"),
            Err(ReferenceError::UnsupportedScheme)
        );
        assert_eq!(
            normalize("https://user:pw@en.wikipedia.org/wiki/AI"),
            Err(ReferenceError::Credentials)
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/"),
            Err(ReferenceError::NotAnArticle)
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/wiki/"),
            Err(ReferenceError::NotAnArticle)
        );
        assert_eq!(
            normalize("https://en.wikipedia.org/w/api.php?title=AI"),
            Err(ReferenceError::NotAnArticle)
        );
    }

    #[test]
    fn exposes_title() {
        let r = normalize("https://en.wikipedia.org/wiki/Rust_(programming_language)").unwrap();
        assert_eq!(r.title(), "Rust_(programming_language)");
    }
}
