use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

static ISO_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?$").unwrap()
});

// Tiered search: the first pattern that matches wins, returning group 1
pub fn first_capture(patterns: &[Regex], haystack: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(haystack))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        _ => return None,
    };
    Some(c)
}

fn numeric_entity(body: &str) -> Option<char> {
    let code = match body.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => body.parse::<u32>().ok()?,
    };
    char::from_u32(code).filter(|c| *c != '\0')
}

/// Decodes numeric and common named HTML character references.
///
/// References that cannot be resolved are left untouched.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = match body.strip_prefix('#') {
                Some(num) => numeric_entity(num),
                None => named_entity(body),
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// `true` when no character reference or replacement character survived decoding.
pub fn is_fully_decoded(text: &str) -> bool {
    !ENTITY_RE.is_match(text) && !text.contains('\u{FFFD}')
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Title from the last URL path segment:
// https://example.test/kitty-lixo-bg-fucked-on-the-couch/ -> "kitty lixo bg fucked on the couch"
pub fn title_from_slug(url: &str) -> String {
    let slug = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let slug = urlencoding::decode(slug)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| slug.to_string());

    collapse_whitespace(&slug.replace('-', " "))
}

/// Normalizes an ISO-8601 duration (`PT12M5S`) into `mm:ss` or `h:mm:ss`.
///
/// Anything else is returned trimmed and otherwise unchanged.
pub fn normalize_duration(raw: &str) -> String {
    let raw = raw.trim();
    let Some(caps) = ISO_DURATION_RE.captures(raw) else {
        return raw.to_string();
    };

    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return raw.to_string();
    }

    let part = |i: usize| match caps.get(i) {
        Some(m) => m.as_str().parse::<u64>().ok(),
        None => Some(0),
    };
    let total = part(1)
        .and_then(|h| h.checked_mul(3600))
        .zip(part(2).and_then(|m| m.checked_mul(60)))
        .and_then(|(h, m)| h.checked_add(m))
        .zip(part(3))
        .and_then(|(hm, s)| hm.checked_add(s));

    match total {
        Some(total) => format_clock(total),
        None => raw.to_string(),
    }
}

// Formats seconds as a clock
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
