//! URL extraction, deduplication, and classification across engagements.
//!
//! Every URL found in any engagement body is recorded with a human-readable
//! provenance label. The cleaned URL string (trailing sentence punctuation
//! stripped) is the dedup identity; classification is presentation-only and
//! never changes it.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use dealscope_shared::{EngagementDetail, EngagementRecord, time};

/// Trailing characters stripped from matched URLs: likely sentence
/// terminators rather than part of the URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':'];

/// Host fragments that mark a URL as a shared document or file store.
const DOCUMENT_HOSTS: &[&str] = &[
    "docs.google",
    "drive.google",
    "notion.so",
    "dropbox",
    "sharepoint",
    "onedrive",
];

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("valid regex"));

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract URLs from free text, deduped by the cleaned string in
/// first-encounter order.
pub fn extract_urls(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    for found in URL_RE.find_iter(content) {
        let cleaned = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.to_string()) {
            urls.push(cleaned.to_string());
        }
    }

    urls
}

// ---------------------------------------------------------------------------
// Collection across engagements
// ---------------------------------------------------------------------------

/// One URL plus every provenance context it was seen in, in encounter order.
#[derive(Debug, Clone)]
pub struct UrlEntry {
    pub url: String,
    pub contexts: Vec<String>,
}

/// URL → contexts index preserving first-encounter order.
#[derive(Debug, Clone, Default)]
pub struct UrlIndex {
    entries: Vec<UrlEntry>,
    by_url: HashMap<String, usize>,
}

impl UrlIndex {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of unique URLs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[UrlEntry] {
        &self.entries
    }

    fn record(&mut self, url: String, context: String) {
        match self.by_url.get(&url) {
            Some(&i) => self.entries[i].contexts.push(context),
            None => {
                self.by_url.insert(url.clone(), self.entries.len());
                self.entries.push(UrlEntry {
                    url,
                    contexts: vec![context],
                });
            }
        }
    }
}

/// Collect every URL across `engagements` with human-readable provenance.
///
/// Context order follows aggregation order (category catalog order, then
/// fetch-return order), not the document's chronological order. Downstream
/// prompt consumers rely on that ordering, so it is intentional.
pub fn collect_urls(engagements: &[EngagementRecord]) -> UrlIndex {
    let mut index = UrlIndex::default();

    for record in engagements {
        let Some(content) = record.content() else {
            continue;
        };
        let text = crate::clean(content, true);
        let urls = extract_urls(&text);
        if urls.is_empty() {
            continue;
        }

        let context = context_label(record);
        for url in urls {
            index.record(url, context.clone());
        }
    }

    debug!(unique = index.len(), "url collection complete");
    index
}

/// Human-readable provenance label for one engagement.
fn context_label(record: &EngagementRecord) -> String {
    let ts = time::format_timestamp(record.timestamp.as_deref());
    match &record.detail {
        EngagementDetail::Email { subject, .. } => {
            format!("Email: {} ({ts})", subject.as_deref().unwrap_or("(No subject)"))
        }
        EngagementDetail::Note { .. } => format!("Note ({ts})"),
        EngagementDetail::Call { title, .. } => {
            format!("Call: {} ({ts})", title.as_deref().unwrap_or("Call"))
        }
        EngagementDetail::Meeting { title, .. } => {
            format!("Meeting: {} ({ts})", title.as_deref().unwrap_or("Meeting"))
        }
        EngagementDetail::Task { subject, .. } => {
            format!("Task: {} ({ts})", subject.as_deref().unwrap_or("Task"))
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Collected URLs partitioned into presentation buckets.
#[derive(Debug, Default)]
pub struct ClassifiedUrls<'a> {
    /// Shared documents and file stores.
    pub documents: Vec<&'a UrlEntry>,
    /// Links into the CRM itself.
    pub internal: Vec<&'a UrlEntry>,
    /// Everything else.
    pub other: Vec<&'a UrlEntry>,
}

/// Partition collected URLs by substring match. `crm_host` is the hostname
/// fragment identifying links into the source CRM.
pub fn classify<'a>(index: &'a UrlIndex, crm_host: &str) -> ClassifiedUrls<'a> {
    let crm_host = crm_host.to_lowercase();
    let mut buckets = ClassifiedUrls::default();

    for entry in index.entries() {
        let lower = entry.url.to_lowercase();
        if DOCUMENT_HOSTS.iter().any(|host| lower.contains(host)) {
            buckets.documents.push(entry);
        } else if !crm_host.is_empty() && lower.contains(&crm_host) {
            buckets.internal.push(entry);
        } else {
            buckets.other.push(entry);
        }
    }

    buckets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
