//! Core domain types for deal-context aggregation.
//!
//! Absent attributes are modeled as `Option` everywhere; presentation-layer
//! fallbacks ("N/A", "Unknown") are applied only when rendering, never stored.

use serde::{Deserialize, Serialize};

use crate::time;

// ---------------------------------------------------------------------------
// Deal
// ---------------------------------------------------------------------------

/// The central CRM opportunity record, fetched once per analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deal {
    /// CRM object identifier.
    pub id: String,
    /// Deal name.
    pub name: Option<String>,
    /// Monetary amount, as the CRM reports it (a decimal string).
    pub amount: Option<String>,
    /// Pipeline stage.
    pub stage: Option<String>,
    /// Owning pipeline.
    pub pipeline: Option<String>,
    /// Creation date.
    pub create_date: Option<String>,
    /// Expected or actual close date.
    pub close_date: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Owner identifier.
    pub owner_id: Option<String>,
}

impl Deal {
    /// Deal name with the presentation-layer fallback applied.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Deal")
    }
}

// ---------------------------------------------------------------------------
// Contact / Company
// ---------------------------------------------------------------------------

/// A person associated with the deal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Name of the contact's affiliated company, as recorded on the contact.
    pub company: Option<String>,
}

impl Contact {
    /// Full name assembled from the name parts, or `None` when both are blank.
    pub fn full_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();
        if name.is_empty() { None } else { Some(name) }
    }
}

/// An organization associated with the deal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
}

// ---------------------------------------------------------------------------
// AssociationEdge
// ---------------------------------------------------------------------------

/// A link from the deal to a related object, as exposed by the associations
/// endpoint. Transient: exists only to drive batch fetching of the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationEdge {
    /// Identifier of the related object.
    pub to_object_id: String,
}

// ---------------------------------------------------------------------------
// Engagements
// ---------------------------------------------------------------------------

/// Engagement categories, in fixed catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementCategory {
    Emails,
    Notes,
    Calls,
    Meetings,
    Tasks,
}

impl EngagementCategory {
    /// Catalog iteration order for aggregation. This order determines which
    /// category a record is stamped with, not the document's presentation
    /// order (the timeline is re-sorted chronologically downstream).
    pub const ALL: [EngagementCategory; 5] = [
        EngagementCategory::Emails,
        EngagementCategory::Notes,
        EngagementCategory::Calls,
        EngagementCategory::Meetings,
        EngagementCategory::Tasks,
    ];

    /// The category's object-type name on the CRM API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emails => "emails",
            Self::Notes => "notes",
            Self::Calls => "calls",
            Self::Meetings => "meetings",
            Self::Tasks => "tasks",
        }
    }
}

impl std::fmt::Display for EngagementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant payloads for the five engagement types. Closed union: formatters
/// match exhaustively, so adding a variant is a compile-time checklist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngagementDetail {
    Email {
        subject: Option<String>,
        direction: Option<String>,
        from_email: Option<String>,
        to_email: Option<String>,
        body_text: Option<String>,
        body_html: Option<String>,
    },
    Note {
        body: Option<String>,
        preview: Option<String>,
    },
    Call {
        title: Option<String>,
        /// Duration in seconds, kept raw as the CRM reports it.
        duration: Option<String>,
        body: Option<String>,
    },
    Meeting {
        title: Option<String>,
        body: Option<String>,
        outcome: Option<String>,
    },
    Task {
        subject: Option<String>,
        status: Option<String>,
        body: Option<String>,
    },
}

/// One interaction record, stamped with exactly one category at fetch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub id: String,
    /// Raw engagement timestamp as returned by the API: epoch-millis digits
    /// or an ISO-8601 instant.
    pub timestamp: Option<String>,
    pub detail: EngagementDetail,
}

impl EngagementRecord {
    /// The category this record was stamped with at fetch time.
    pub fn category(&self) -> EngagementCategory {
        match self.detail {
            EngagementDetail::Email { .. } => EngagementCategory::Emails,
            EngagementDetail::Note { .. } => EngagementCategory::Notes,
            EngagementDetail::Call { .. } => EngagementCategory::Calls,
            EngagementDetail::Meeting { .. } => EngagementCategory::Meetings,
            EngagementDetail::Task { .. } => EngagementCategory::Tasks,
        }
    }

    /// Sort key for the chronological timeline. Absent or unparseable
    /// timestamps sort first at epoch 0 — a known bias: such records land at
    /// the top of the timeline regardless of when they actually happened.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp
            .as_deref()
            .and_then(time::parse_timestamp_ms)
            .unwrap_or(0)
    }

    /// The free-form content searched for URLs. For emails the plain-text
    /// body wins over the HTML body.
    pub fn content(&self) -> Option<&str> {
        match &self.detail {
            EngagementDetail::Email {
                body_text,
                body_html,
                ..
            } => body_text.as_deref().or(body_html.as_deref()),
            EngagementDetail::Note { body, .. } => body.as_deref(),
            EngagementDetail::Call { body, .. } => body.as_deref(),
            EngagementDetail::Meeting { body, .. } => body.as_deref(),
            EngagementDetail::Task { body, .. } => body.as_deref(),
        }
    }
}
