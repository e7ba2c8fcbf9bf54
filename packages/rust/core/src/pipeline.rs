//! End-to-end pipeline: deal context → document → model analysis → storage.
//!
//! Every invocation is fully independent: no cache, no shared mutable state.
//! Any upstream fetch failure aborts the whole run — a partially assembled
//! document would silently mislead the downstream model.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};
use uuid::Uuid;

use dealscope_crm::{CrmClient, aggregator};
use dealscope_shared::{Company, Contact, Deal, EngagementRecord, Result};
use dealscope_storage::{AnalysisRecord, Store};
use dealscope_text::urls::{self, UrlIndex};

use crate::analysis::{AnalysisClient, AnalysisPrompt, Section, parse_sections};
use crate::document;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for long-running pipeline phases.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
}

// ---------------------------------------------------------------------------
// Deal context
// ---------------------------------------------------------------------------

/// Everything collected for one deal, plus the assembled document.
#[derive(Debug)]
pub struct DealContext {
    pub deal: Deal,
    pub contacts: Vec<Contact>,
    pub companies: Vec<Company>,
    pub engagements: Vec<EngagementRecord>,
    pub url_index: UrlIndex,
    /// The final single-string artifact handed to the model.
    pub document: String,
}

/// Fetch everything related to `deal_id` and assemble the deal document.
///
/// The deal fetch runs first; contacts, companies, and engagements are
/// independent of each other and fetched concurrently. Completion order is
/// immaterial: each feeds its own section, and the timeline is re-sorted
/// chronologically during assembly.
#[instrument(skip(client, progress))]
pub async fn build_deal_context(
    client: &CrmClient,
    deal_id: &str,
    crm_host: &str,
    progress: &dyn ProgressReporter,
) -> Result<DealContext> {
    progress.phase("Fetching deal");
    let deal = client.deal(deal_id).await?;

    progress.phase("Fetching contacts, companies, and engagements");
    let (contacts, companies, engagements) = tokio::try_join!(
        aggregator::collect_contacts(client, deal_id),
        aggregator::collect_companies(client, deal_id),
        aggregator::collect_engagements(client, deal_id),
    )?;

    progress.phase("Collecting URLs");
    let url_index = urls::collect_urls(&engagements);

    progress.phase("Assembling document");
    let document = document::assemble_document(
        &deal,
        &contacts,
        &companies,
        &engagements,
        &url_index,
        crm_host,
    );

    info!(
        deal = %deal.display_name(),
        contacts = contacts.len(),
        companies = companies.len(),
        engagements = engagements.len(),
        urls = url_index.len(),
        document_chars = document.len(),
        "deal context assembled"
    );

    Ok(DealContext {
        deal,
        contacts,
        companies,
        engagements,
        url_index,
        document,
    })
}

// ---------------------------------------------------------------------------
// Full analysis run
// ---------------------------------------------------------------------------

/// Outcome of a persisted analysis run.
#[derive(Debug)]
pub struct AnalysisRun {
    pub analysis_id: String,
    pub deal_name: String,
    pub response: String,
    pub model: String,
    pub sections: Vec<Section>,
}

/// Build the deal context, run the model analysis, and persist the result
/// with the raw document kept as an audit trail.
#[instrument(skip_all, fields(deal_id = %deal_id, prompt = %prompt.type_id))]
pub async fn run_analysis(
    crm: &CrmClient,
    analysis: &AnalysisClient,
    store: &Store,
    deal_id: &str,
    crm_host: &str,
    prompt: &AnalysisPrompt,
    progress: &dyn ProgressReporter,
) -> Result<AnalysisRun> {
    let context = build_deal_context(crm, deal_id, crm_host, progress).await?;

    progress.phase("Running analysis");
    let outcome = analysis.analyze(&context.document, prompt).await?;

    progress.phase("Saving analysis");
    let analysis_id = Uuid::now_v7().to_string();
    let record = AnalysisRecord {
        analysis_id: analysis_id.clone(),
        deal_id: deal_id.to_string(),
        deal_name: context.deal.display_name().to_string(),
        analysis_type: prompt.type_id.clone(),
        deal_document: context.document.clone(),
        document_sha256: sha256_hex(&context.document),
        system_prompt: prompt.system_prompt.clone(),
        response: outcome.text.clone(),
        prompt_version: prompt.version,
        created_at: Utc::now().to_rfc3339(),
    };
    store.insert_analysis(&record).await?;

    info!(%analysis_id, "analysis run persisted");

    Ok(AnalysisRun {
        analysis_id,
        deal_name: record.deal_name,
        sections: parse_sections(&outcome.text),
        response: outcome.text,
        model: outcome.model,
    })
}

/// SHA-256 hex digest of the assembled document, stored alongside it so the
/// audit trail is tamper-evident.
fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn sha256_hex_is_stable() {
        let hash = sha256_hex("hello world");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    /// Mount a full mock CRM for deal 901: one contact, no companies, one
    /// email and one call engagement, everything else empty.
    async fn mount_crm(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals/901"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "901",
                "properties": { "dealname": "Acme Renewal", "amount": "50000" }
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 5 } ]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/contacts/batch/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ {
                    "id": "5",
                    "properties": { "firstname": "Ada", "lastname": "Lovelace", "email": "ada@globex.com" }
                } ]
            })))
            .mount(server)
            .await;

        for empty in ["companies", "notes", "meetings", "tasks"] {
            Mock::given(method("GET"))
                .and(path(format!("/crm/v4/objects/deals/901/associations/{empty}")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "results": [] })),
                )
                .mount(server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 11 } ]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/emails/batch/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ {
                    "id": "11",
                    "properties": {
                        "hs_email_subject": "Demo recap",
                        "hs_email_direction": "EMAIL",
                        "hs_email_text": "<p>Loved the demo! See <http://docs.google.com/abc></p>",
                        "hs_timestamp": "1700000000000"
                    }
                } ]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/calls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 21 } ]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/calls/batch/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ {
                    "id": "21",
                    "properties": {
                        "hs_call_title": "Intro call",
                        "hs_timestamp": "1699999999999"
                    }
                } ]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn build_deal_context_end_to_end() {
        let server = MockServer::start().await;
        mount_crm(&server).await;

        let client = CrmClient::new(&server.uri(), "t").unwrap();
        let context = build_deal_context(&client, "901", "hubspot", &SilentProgress)
            .await
            .unwrap();

        assert_eq!(context.deal.display_name(), "Acme Renewal");
        assert_eq!(context.contacts.len(), 1);
        assert!(context.companies.is_empty());
        assert_eq!(context.engagements.len(), 2);
        assert_eq!(context.url_index.len(), 1);

        let doc = &context.document;
        assert!(doc.contains("# Deal: Acme Renewal"));
        assert!(doc.contains("**Amount:** 50000"));
        assert!(doc.contains("- Ada Lovelace (ada@globex.com)"));
        assert!(!doc.contains("Associated Companies"));
        // The call (earlier timestamp) precedes the email in the timeline.
        assert!(doc.find("CALL: Intro call").unwrap() < doc.find("EMAIL (OUTBOUND)").unwrap());
        // The document link carries provenance from the email.
        assert!(doc.contains("- http://docs.google.com/abc"));
        assert!(doc.contains("*Found in: Email: Demo recap"));
    }

    #[tokio::test]
    async fn upstream_failure_yields_no_partial_context() {
        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals/901"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&broken)
            .await;

        let client = CrmClient::new(&broken.uri(), "t").unwrap();
        let err = build_deal_context(&client, "901", "hubspot", &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("get deal"));
    }

    #[tokio::test]
    async fn run_analysis_persists_document_and_response() {
        let server = MockServer::start().await;
        mount_crm(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "claude-sonnet-4-20250514",
                "content": [ { "type": "text", "text": "## Summary\nStrong deal." } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let crm = CrmClient::new(&server.uri(), "t").unwrap();
        let analysis = AnalysisClient::new(&server.uri(), "k", "claude-sonnet-4-20250514", 1024)
            .unwrap();

        let dir = std::env::temp_dir().join(format!("ds-pipeline-test-{}", Uuid::now_v7()));
        let store = Store::open(&dir.join("test.db")).await.unwrap();
        store
            .upsert_analysis_type(&dealscope_storage::AnalysisType {
                type_id: "risk_review".into(),
                name: "Risk Review".into(),
                description: None,
                system_prompt: "You review deal risk.".into(),
                is_active: true,
                version: 1,
            })
            .await
            .unwrap();

        let prompt = AnalysisPrompt {
            type_id: "risk_review".into(),
            system_prompt: "You review deal risk.".into(),
            version: 1,
        };

        let run = run_analysis(
            &crm,
            &analysis,
            &store,
            "901",
            "hubspot",
            &prompt,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(run.deal_name, "Acme Renewal");
        assert_eq!(run.sections.len(), 1);
        assert_eq!(run.sections[0].section_title, "Summary");

        // The raw document and its checksum were persisted as audit trail.
        let saved = store.get_analysis(&run.analysis_id).await.unwrap().unwrap();
        assert!(saved.deal_document.contains("# Deal: Acme Renewal"));
        assert_eq!(saved.document_sha256, sha256_hex(&saved.deal_document));
        assert_eq!(saved.response, "## Summary\nStrong deal.");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
