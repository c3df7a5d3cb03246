use std::{borrow::Cow, sync::LazyLock};

use itertools::Itertools;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use url::Url;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

// `\u003e` and `\x3e` escapes from markup embedded in JSON or script strings.
static ESCAPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(?:u([0-9a-fA-F]{4})|x([0-9a-fA-F]{2}))").unwrap());

// Matches ending in these are file names like `logo@2x.png`, not mailboxes.
const ASSET_EXTENSIONS: [&str; 20] = [
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp", ".avif", ".css", ".js",
    ".mjs", ".map", ".woff", ".woff2", ".ttf", ".eot", ".otf", ".mp4", ".webm",
];

pub const ROLE_MAILBOX_PRIORITY: [&str; 6] = ["info", "contact", "sales", "hello", "admin", "support"];

const CONTACT_KEYWORDS: [&str; 9] = [
    "contact",
    "kontakt",
    "contacto",
    "contatti",
    "اتصل",
    "تواصل",
    "اتصال",
    "للتواصل",
    "راسلنا",
];

fn is_token_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' | '=')
}

fn is_asset_reference(candidate: &str) -> bool {
    let path = candidate
        .split(['?', '#'])
        .next()
        .unwrap_or(candidate)
        .to_lowercase();

    ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn unescape_source(page: &str) -> Cow<'_, str> {
    ESCAPE_REGEX.replace_all(page, |caps: &Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| " ".to_string())
    })
}

/// Every email-shaped substring of `page`, lowercased and deduplicated in order of
/// appearance. A match is dropped when it, or the path it is glued to
/// (`noreply@cdn.site.com/logo.png`), ends in an asset extension.
pub fn extract_emails(page: &str) -> Vec<String> {
    let page = unescape_source(page);
    let page = page.as_ref();

    EMAIL_REGEX
        .find_iter(page)
        .filter(|m| {
            let token_end = page[m.end()..]
                .find(is_token_boundary)
                .map(|offset| m.end() + offset)
                .unwrap_or(page.len());

            !is_asset_reference(m.as_str()) && !is_asset_reference(&page[m.start()..token_end])
        })
        .map(|m| m.as_str().to_lowercase())
        .unique()
        .collect()
}

pub fn pick_preferred_email(emails: &[String]) -> Option<String> {
    ROLE_MAILBOX_PRIORITY
        .iter()
        .find_map(|role| {
            emails.iter().find(|email| {
                email
                    .split_once('@')
                    .is_some_and(|(mailbox, _)| mailbox.contains(role))
            })
        })
        .or_else(|| emails.first())
        .cloned()
}

pub fn best_email_in_page(page: &str) -> Option<String> {
    pick_preferred_email(&extract_emails(page))
}

pub fn find_contact_link(html: &str, page_url: &str) -> Option<String> {
    let a_tag_selector = Selector::parse("a[href]").unwrap();
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    document.select(&a_tag_selector).find_map(|tag| {
        let href = tag.value().attr("href")?.trim();
        let lowered_href = href.to_lowercase();
        if lowered_href.starts_with("mailto:")
            || lowered_href.starts_with("tel:")
            || lowered_href.starts_with("javascript:")
        {
            return None;
        }

        let text = tag.text().collect::<String>().to_lowercase();
        let looks_like_contact = CONTACT_KEYWORDS
            .iter()
            .any(|kw| lowered_href.contains(kw) || text.contains(kw));
        if !looks_like_contact {
            return None;
        }

        let mut resolved = match &base {
            Some(base) => base.join(href).ok()?,
            None => Url::parse(href).ok()?,
        };
        resolved.set_fragment(None);

        let same_page = base.as_ref().is_some_and(|base| {
            let mut base = base.clone();
            base.set_fragment(None);
            base == resolved
        });

        match same_page {
            true => None,
            false => Some(resolved.to_string()),
        }
    })
}
