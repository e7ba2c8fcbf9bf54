//! Deal document assembly.
//!
//! Merges the deal snapshot, associated people and companies, the engagement
//! timeline, and the URL index into one deterministic Markdown document.
//! The output is a single string, not a structured object: the consumer is a
//! text-based model prompt.

use dealscope_shared::{Company, Contact, Deal, EngagementDetail, EngagementRecord, time};
use dealscope_text::urls::{self, UrlEntry, UrlIndex};

/// Scalar fallback for absent deal fields.
const NA: &str = "N/A";

/// Maximum provenance contexts listed per document URL.
const MAX_CONTEXTS: usize = 3;

/// Cap on the "other links" bucket, to bound document size.
const MAX_OTHER_LINKS: usize = 20;

/// Assemble the final deal document.
///
/// Section order is fixed: header, contacts, companies, chronological
/// activity, URL index. Empty sections are omitted entirely — no bare
/// headers. The activity timeline is stably sorted by timestamp ascending;
/// records with missing timestamps sort first (epoch 0), and records with
/// equal timestamps keep their aggregation order.
pub fn assemble_document(
    deal: &Deal,
    contacts: &[Contact],
    companies: &[Company],
    engagements: &[EngagementRecord],
    url_index: &UrlIndex,
    crm_host: &str,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    header_section(&mut lines, deal);
    contacts_section(&mut lines, contacts);
    companies_section(&mut lines, companies);
    activity_section(&mut lines, engagements);
    url_section(&mut lines, url_index, crm_host);

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn header_section(lines: &mut Vec<String>, deal: &Deal) {
    lines.push(format!("# Deal: {}", deal.display_name()));
    lines.push(format!(
        "\n**Amount:** {}",
        deal.amount.as_deref().unwrap_or(NA)
    ));
    lines.push(format!("**Stage:** {}", deal.stage.as_deref().unwrap_or(NA)));
    lines.push(format!(
        "**Created:** {}",
        deal.create_date.as_deref().unwrap_or(NA)
    ));
    lines.push(format!(
        "**Close Date:** {}",
        deal.close_date.as_deref().unwrap_or(NA)
    ));
    if let Some(description) = &deal.description {
        lines.push(format!("**Description:** {description}"));
    }
    lines.push(String::new());
}

// ---------------------------------------------------------------------------
// Contacts / Companies
// ---------------------------------------------------------------------------

fn contacts_section(lines: &mut Vec<String>, contacts: &[Contact]) {
    if contacts.is_empty() {
        return;
    }

    lines.push("## Associated Contacts".into());
    for contact in contacts {
        let name = contact.full_name().unwrap_or_else(|| "Unknown".into());
        let email = contact.email.as_deref().unwrap_or(NA);
        let company = contact
            .company
            .as_deref()
            .map(|c| format!(" - {c}"))
            .unwrap_or_default();
        lines.push(format!("- {name} ({email}){company}"));
    }
    lines.push(String::new());
}

fn companies_section(lines: &mut Vec<String>, companies: &[Company]) {
    if companies.is_empty() {
        return;
    }

    lines.push("## Associated Companies".into());
    for company in companies {
        let name = company.name.as_deref().unwrap_or("Unknown");
        let domain = company
            .domain
            .as_deref()
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        let industry = company
            .industry
            .as_deref()
            .map(|i| format!(" - {i}"))
            .unwrap_or_default();
        lines.push(format!("- **{name}**{domain}{industry}"));
    }
    lines.push(String::new());
}

// ---------------------------------------------------------------------------
// Activity timeline
// ---------------------------------------------------------------------------

fn activity_section(lines: &mut Vec<String>, engagements: &[EngagementRecord]) {
    let mut sorted: Vec<&EngagementRecord> = engagements.iter().collect();
    // Stable: equal timestamps keep aggregation order.
    sorted.sort_by_key(|e| e.timestamp_ms());

    lines.push("## Activity Timeline (Chronological)".into());
    lines.push(format!("*{} total activities*\n", sorted.len()));

    for record in sorted {
        format_engagement(lines, record);
    }
}

/// Render one engagement with its category-specific template. The match is
/// exhaustive over the closed variant set, so a new engagement type cannot
/// ship without a formatter.
fn format_engagement(lines: &mut Vec<String>, record: &EngagementRecord) {
    let ts = time::format_timestamp(record.timestamp.as_deref());

    match &record.detail {
        EngagementDetail::Email {
            subject,
            direction,
            from_email,
            to_email,
            body_text,
            body_html,
        } => {
            // The source API reports messages sent from the CRM with
            // direction value "EMAIL"; everything else is inbound.
            let dir_label = match direction.as_deref() {
                Some("EMAIL") => "OUTBOUND",
                _ => "INBOUND",
            };
            let body = body_text
                .as_deref()
                .map(|t| dealscope_text::clean(t, true))
                .filter(|s| !s.is_empty())
                .or_else(|| body_html.as_deref().map(|t| dealscope_text::clean(t, true)))
                .unwrap_or_default();

            lines.push(format!("### [{ts}] EMAIL ({dir_label})"));
            lines.push(format!(
                "**Subject:** {}",
                subject.as_deref().unwrap_or("(No subject)")
            ));
            lines.push(format!(
                "**From:** {} -> **To:** {}",
                from_email.as_deref().unwrap_or(""),
                to_email.as_deref().unwrap_or("")
            ));
            lines.push(format!("\n{body}\n"));
        }
        EngagementDetail::Note { body, preview } => {
            let body = body
                .as_deref()
                .map(|t| dealscope_text::clean(t, true))
                .filter(|s| !s.is_empty())
                .or_else(|| preview.clone())
                .unwrap_or_default();

            lines.push(format!("### [{ts}] NOTE"));
            lines.push(format!("\n{body}\n"));
        }
        EngagementDetail::Call {
            title,
            duration,
            body,
        } => {
            let duration_label = duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .map(|secs| format!(" ({}m {}s)", (secs / 60.0) as i64, (secs % 60.0) as i64))
                .unwrap_or_default();

            lines.push(format!(
                "### [{ts}] CALL: {}{duration_label}",
                title.as_deref().unwrap_or("Call")
            ));
            if let Some(body) = body {
                lines.push(format!("\n{}\n", dealscope_text::clean(body, true)));
            }
        }
        EngagementDetail::Meeting {
            title,
            body,
            outcome,
        } => {
            lines.push(format!(
                "### [{ts}] MEETING: {}",
                title.as_deref().unwrap_or("Meeting")
            ));
            if let Some(outcome) = outcome {
                lines.push(format!("**Outcome:** {outcome}"));
            }
            if let Some(body) = body {
                lines.push(format!("\n{}\n", dealscope_text::clean(body, true)));
            }
        }
        EngagementDetail::Task {
            subject,
            status,
            body,
        } => {
            lines.push(format!(
                "### [{ts}] TASK: {} [{}]",
                subject.as_deref().unwrap_or("Task"),
                status.as_deref().unwrap_or("")
            ));
            if let Some(body) = body {
                lines.push(format!("\n{}\n", dealscope_text::clean(body, true)));
            }
        }
    }

    lines.push("---".into());
}

// ---------------------------------------------------------------------------
// URL index
// ---------------------------------------------------------------------------

fn url_section(lines: &mut Vec<String>, url_index: &UrlIndex, crm_host: &str) {
    if url_index.is_empty() {
        return;
    }

    lines.push("\n## Linked Documents & URLs".into());
    lines.push(format!(
        "*{} unique URLs found in deal activities*\n",
        url_index.len()
    ));

    let buckets = urls::classify(url_index, crm_host);

    if !buckets.documents.is_empty() {
        lines.push("### Meeting Notes & Documents".into());
        for entry in &buckets.documents {
            lines.push(format!("- {}", entry.url));
            lines.push(format!("  *Found in: {}*", context_summary(entry)));
        }
    }

    if !buckets.internal.is_empty() {
        lines.push("\n### CRM Links".into());
        for entry in &buckets.internal {
            lines.push(format!("- {}", entry.url));
        }
    }

    if !buckets.other.is_empty() {
        lines.push("\n### Other Links".into());
        for entry in buckets.other.iter().take(MAX_OTHER_LINKS) {
            lines.push(format!("- {}", entry.url));
        }
        if buckets.other.len() > MAX_OTHER_LINKS {
            lines.push(format!(
                "*... and {} more*",
                buckets.other.len() - MAX_OTHER_LINKS
            ));
        }
    }

    lines.push(String::new());
}

/// Up to [`MAX_CONTEXTS`] provenance contexts, with an ellipsis when more exist.
fn context_summary(entry: &UrlEntry) -> String {
    let mut summary = entry
        .contexts
        .iter()
        .take(MAX_CONTEXTS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if entry.contexts.len() > MAX_CONTEXTS {
        summary.push_str("...");
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
