//! Content category detection for clipboard entries
//!
//! An ordered cascade: the first rule that matches decides the category.
//! Several rules only exist to keep sensitive-looking numbers (IP addresses,
//! IBANs, card numbers) out of the phone bucket.

use crate::interface::Category;
use once_cell::sync::Lazy;
use regex::Regex;

/// Markers that each add one point to the code score
const CODE_MARKERS: &[&str] = &[
    "func ", "class ", "struct ", "import ", "let ", "var ", "public ", "private ", "=>", ";",
];

const CODE_SCORE_THRESHOLD: usize = 2;

/// Below this many characters, plain text is filed as `Short`
const SHORT_TEXT_LIMIT: usize = 20;

/// Top-level domains the bare-host link detector recognizes
const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "io", "dev", "app", "co", "ai", "me", "info", "biz", "uk",
    "de", "fr", "ru", "jp", "cn", "us", "ca", "au", "nl", "se", "ch", "it", "es", "tv", "xyz",
];

/// Domain part must end in a dotted, alphabetic TLD
static EMAIL_DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap()
});

static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap()
});

static IBAN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2}\d{2}[A-Za-z0-9]{11,30}$").unwrap()
});

/// Check if a string is a JSON object or array
fn is_json_document(text: &str) -> bool {
    if !(text.starts_with('{') || text.starts_with('[')) {
        return false;
    }
    matches!(
        serde_json::from_str::<serde_json::Value>(text),
        Ok(serde_json::Value::Object(_)) | Ok(serde_json::Value::Array(_))
    )
}

/// Number of distinct code markers present in the text
fn code_score(text: &str) -> usize {
    CODE_MARKERS.iter().filter(|m| text.contains(*m)).count()
}

fn looks_like_code(text: &str) -> bool {
    code_score(text) >= CODE_SCORE_THRESHOLD || (text.contains('{') && text.contains('}'))
}

/// Check if a string is an email address.
/// validator alone also accepts dotless hosts such as `user@localhost`.
fn is_email(text: &str) -> bool {
    validator::validate_email(text) && EMAIL_DOMAIN_REGEX.is_match(text)
}

/// A whitespace-free `host[/path]` whose host ends in a known TLD
fn is_bare_host_link(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) || text.contains('@') {
        return false;
    }
    let Ok(parsed) = url::Url::parse(&format!("http://{}", text)) else {
        return false;
    };
    let Some(url::Host::Domain(host)) = parsed.host() else {
        return false;
    };
    match host.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && KNOWN_TLDS.contains(&tld.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Check if the whole text is a link.
/// Bare `scheme:rest` strings are not links: "Note: call back" would parse as one.
fn is_link(text: &str) -> bool {
    if text.contains("://") || text.to_ascii_lowercase().starts_with("www.") {
        return true;
    }
    is_bare_host_link(text)
}

fn is_ipv4(text: &str) -> bool {
    let Some(caps) = IPV4_REGEX.captures(text) else {
        return false;
    };
    (1..=4).all(|i| caps[i].parse::<u16>().map(|octet| octet <= 255).unwrap_or(false))
}

fn is_iban(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| *c != ' ').collect();
    IBAN_REGEX.is_match(&compact)
}

fn digits(text: &str) -> Vec<u32> {
    text.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Luhn checksum over a digit sequence (most significant digit first)
pub fn luhn_valid(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn is_card_number(text: &str) -> bool {
    let digits = digits(text);
    (13..=19).contains(&digits.len()) && luhn_valid(&digits)
}

fn is_phone(text: &str) -> bool {
    (9..=16).contains(&digits(text).len())
}

/// Classify text into exactly one category
pub fn classify(text: &str) -> Category {
    let trimmed = text.trim();

    if is_json_document(trimmed) || looks_like_code(trimmed) {
        return Category::Code;
    }

    if is_email(trimmed) {
        return Category::Email;
    }

    if is_link(trimmed) {
        return Category::Link;
    }

    // Structured numbers stay plain text so they never surface as dialable
    if is_ipv4(trimmed) || is_iban(trimmed) || is_card_number(trimmed) {
        return Category::Text;
    }

    if is_phone(trimmed) {
        return Category::Phone;
    }

    if trimmed.chars().count() < SHORT_TEXT_LIMIT {
        return Category::Short;
    }

    Category::Text
}
