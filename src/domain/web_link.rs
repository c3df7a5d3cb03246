use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use url::Url;

use super::lead::is_unknown;

pub const DEFAULT_EXCLUDED_DOMAINS: [&str; 10] = [
    "duckduckgo.com",
    "bing.com",
    "microsoft.com",
    "google.com",
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "tiktok.com",
    "dailymotion.com",
    "wikipedia.org",
];

// Unwraps the redirects engines put around outbound links: google `/url?q=`,
// duckduckgo `/l/?uddg=` and bing `/ck/a?u=a1<base64url>`.
pub fn resolve_result_href(href: &str) -> Option<Url> {
    let href = href.trim();
    let absolute = match href {
        h if h.starts_with("//") => format!("https:{}", h),
        h if h.starts_with("/url?") => format!("https://www.google.com{}", h),
        h => h.to_string(),
    };

    let parsed = Url::parse(&absolute).ok()?;
    let redirect_target = match parsed.host_str() {
        Some(host) if host.ends_with("duckduckgo.com") && parsed.path().starts_with("/l/") => {
            query_value(&parsed, "uddg")
        }
        Some(host) if host.contains("google.") && parsed.path() == "/url" => {
            query_value(&parsed, "q").or_else(|| query_value(&parsed, "url"))
        }
        Some(host) if host.ends_with("bing.com") && parsed.path().starts_with("/ck/a") => {
            query_value(&parsed, "u").and_then(|u| decode_bing_target(&u))
        }
        _ => None,
    };

    let url = match redirect_target {
        Some(target) => Url::parse(&target).ok()?,
        None => parsed,
    };

    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn decode_bing_target(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("a1")?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

pub fn host_without_www(url: &Url) -> Option<String> {
    url.host_str().map(|host| {
        let host = host.to_lowercase();
        match host.strip_prefix("www.") {
            Some(h) => h.to_string(),
            None => host,
        }
    })
}

pub fn is_excluded_host(host: &str, excluded_domains: &[String]) -> bool {
    let host = host.to_lowercase();
    host.contains("google.")
        || excluded_domains.iter().any(|domain| {
            let domain = domain.to_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        })
}

pub fn first_external_link<'a, I>(hrefs: I, excluded_domains: &[String]) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    hrefs.into_iter().find_map(|href| {
        let url = resolve_result_href(href)?;
        let host = host_without_www(&url)?;
        match is_excluded_host(&host, excluded_domains) {
            true => None,
            false => Some(url.to_string()),
        }
    })
}

// Empty values, the unknown sentinel and google-hosted urls do not count.
pub fn usable_known_website(website: &str) -> Option<String> {
    if is_unknown(website) {
        return None;
    }

    let website = website.trim();
    let candidate = match website.starts_with("http://") || website.starts_with("https://") {
        true => website.to_string(),
        false => format!("https://{}", website),
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.to_lowercase();
    match host.contains('.') && !host.contains("google.") {
        true => Some(url.to_string()),
        false => None,
    }
}
