//! Free-form engagement text sanitization.
//!
//! Engagement bodies arrive as HTML fragments or plain text salted with
//! signatures, quoted replies, and forwarded-mail headers. [`clean`] runs a
//! fixed-order pipeline of pure `&str -> String` passes that strips that
//! noise down to prose. Order matters: later passes operate on already
//! detagged, entity-decoded text.
//!
//! The line-removal passes (signature emails, phone numbers, quoted replies,
//! header lines) are best-effort heuristics, not a mail parser. A line that
//! merely *looks* like a signature is removed; an unusually formatted quote
//! survives. Both are accepted limitations.

pub mod urls;

use std::sync::LazyLock;

use regex::Regex;

/// Sanitize raw engagement content into plain text.
///
/// When `preserve_urls` is true, angle-bracket-wrapped URLs are unwrapped to
/// bare form so later URL extraction can find them; otherwise wrapped and
/// bare URLs are removed entirely.
pub fn clean(raw: &str, preserve_urls: bool) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut text = strip_tags(raw);
    text = decode_entities(&text);
    text = if preserve_urls {
        unwrap_bracketed_urls(&text)
    } else {
        remove_urls(&text)
    };
    text = remove_bare_address_lines(&text);
    text = remove_bare_phone_lines(&text);
    text = remove_quoted_replies(&text);
    text = remove_header_lines(&text);
    collapse_whitespace(&text)
}

// ---------------------------------------------------------------------------
// Pass 1: Strip markup tags
// ---------------------------------------------------------------------------

/// Replace markup tags with a single space, preserving inner text.
///
/// The pattern requires a tag-name shape after `<`, so angle-bracket-wrapped
/// URLs (`<https://…>`) survive for the URL pass. Unbalanced fragments
/// without a closing `>` are left alone rather than eaten to end of text.
fn strip_tags(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(\s[^>]*)?/?>").expect("valid regex")
    });

    TAG_RE.replace_all(text, " ").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Decode HTML entities
// ---------------------------------------------------------------------------

/// Decode HTML entities (`&amp;`, `&lt;`, `&#64;`, …) to literal characters.
fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: URL handling
// ---------------------------------------------------------------------------

static BRACKETED_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^>]+)>").expect("valid regex"));

/// Unwrap `<https://…>` to bare form so URLs survive into plain text.
fn unwrap_bracketed_urls(text: &str) -> String {
    BRACKETED_URL_RE.replace_all(text, "$1").to_string()
}

/// Remove angle-bracket-wrapped URLs, then bare URLs, entirely.
fn remove_urls(text: &str) -> String {
    static BARE_URL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

    let without_bracketed = BRACKETED_URL_RE.replace_all(text, "");
    BARE_URL_RE.replace_all(&without_bracketed, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Signature email lines
// ---------------------------------------------------------------------------

/// Remove lines that are exactly an email address (signature block heuristic).
fn remove_bare_address_lines(text: &str) -> String {
    static ADDRESS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*[\w.+-]+@[\w.-]+\.\w+[ \t]*$").expect("valid regex")
    });

    ADDRESS_LINE_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Signature phone lines
// ---------------------------------------------------------------------------

/// Remove lines that are exactly a phone number.
fn remove_bare_phone_lines(text: &str) -> String {
    static PHONE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}[ \t]*$").expect("valid regex")
    });

    PHONE_LINE_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 6: Quoted replies
// ---------------------------------------------------------------------------

/// Remove quoted-reply blocks: the "On <date> … wrote:" header and everything
/// after it, plus any line beginning with a quote marker.
fn remove_quoted_replies(text: &str) -> String {
    static REPLY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)On\s+\w{3},\s+\w{3}\s+\d{1,2},\s+\d{4}\s+at\s+[\d:]+\s*[AP]M.*?wrote:.*")
            .expect("valid regex")
    });
    static QUOTE_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[ \t]*>.*$").expect("valid regex"));

    let without_block = REPLY_HEADER_RE.replace_all(text, "");
    QUOTE_LINE_RE.replace_all(&without_block, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Mail header lines
// ---------------------------------------------------------------------------

/// Remove email-header-style lines (`From:`, `Sent:`, …), optionally bolded.
fn remove_header_lines(text: &str) -> String {
    static HEADER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*\*?(From|Sent|To|Cc|Subject|Date):\*?[ \t]*.*$")
            .expect("valid regex")
    });

    HEADER_LINE_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 8: Whitespace collapse
// ---------------------------------------------------------------------------

/// Collapse 3+ newlines to exactly 2, runs of horizontal whitespace to one
/// space, and trim the result.
fn collapse_whitespace(text: &str) -> String {
    static MULTI_NEWLINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
    static HORIZONTAL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

    let collapsed = MULTI_NEWLINE_RE.replace_all(text, "\n\n");
    let collapsed = HORIZONTAL_RE.replace_all(&collapsed, " ");
    BLANK_RUN_RE.replace_all(&collapsed, "\n\n").trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
