//! Engagement category catalog.
//!
//! Maps each category to the attribute list requested from the batch-read
//! endpoint and converts raw records into typed engagement variants. Adding
//! a category means adding a row to each match here; the aggregation loop in
//! [`crate::aggregator`] is untouched.

use dealscope_shared::{EngagementCategory, EngagementDetail, EngagementRecord};

use crate::client::ObjectRecord;

/// Attribute names fetched for one engagement category.
pub fn attributes(category: EngagementCategory) -> &'static [&'static str] {
    match category {
        EngagementCategory::Emails => &[
            "hs_email_subject",
            "hs_email_text",
            "hs_email_html",
            "hs_timestamp",
            "hs_email_direction",
            "hs_email_from_email",
            "hs_email_to_email",
        ],
        EngagementCategory::Notes => &["hs_note_body", "hs_timestamp", "hs_body_preview"],
        EngagementCategory::Calls => &[
            "hs_call_title",
            "hs_call_body",
            "hs_call_duration",
            "hs_timestamp",
        ],
        EngagementCategory::Meetings => &[
            "hs_meeting_title",
            "hs_meeting_body",
            "hs_meeting_outcome",
            "hs_timestamp",
        ],
        EngagementCategory::Tasks => &[
            "hs_task_subject",
            "hs_task_body",
            "hs_task_status",
            "hs_timestamp",
        ],
    }
}

/// Convert a raw batch-read record into a typed engagement, stamped with
/// `category` for the life of the run. Ids are category-scoped at the source,
/// so a record can never legitimately match two categories.
pub fn record_to_engagement(
    category: EngagementCategory,
    record: &ObjectRecord,
) -> EngagementRecord {
    let detail = match category {
        EngagementCategory::Emails => EngagementDetail::Email {
            subject: record.prop_owned("hs_email_subject"),
            direction: record.prop_owned("hs_email_direction"),
            from_email: record.prop_owned("hs_email_from_email"),
            to_email: record.prop_owned("hs_email_to_email"),
            body_text: record.prop_owned("hs_email_text"),
            body_html: record.prop_owned("hs_email_html"),
        },
        EngagementCategory::Notes => EngagementDetail::Note {
            body: record.prop_owned("hs_note_body"),
            preview: record.prop_owned("hs_body_preview"),
        },
        EngagementCategory::Calls => EngagementDetail::Call {
            title: record.prop_owned("hs_call_title"),
            duration: record.prop_owned("hs_call_duration"),
            body: record.prop_owned("hs_call_body"),
        },
        EngagementCategory::Meetings => EngagementDetail::Meeting {
            title: record.prop_owned("hs_meeting_title"),
            body: record.prop_owned("hs_meeting_body"),
            outcome: record.prop_owned("hs_meeting_outcome"),
        },
        EngagementCategory::Tasks => EngagementDetail::Task {
            subject: record.prop_owned("hs_task_subject"),
            status: record.prop_owned("hs_task_status"),
            body: record.prop_owned("hs_task_body"),
        },
    };

    EngagementRecord {
        id: record.id.clone(),
        timestamp: record.prop_owned("hs_timestamp"),
        detail,
    }
}
