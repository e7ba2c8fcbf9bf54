//! Authenticated HTTP client for the CRM REST API.
//!
//! Three endpoint families are wrapped here: single-object reads with a fixed
//! attribute projection, paginated association listings, and batched
//! multi-object reads. Any non-success response aborts the calling run with
//! an error naming the failing operation; there is no retry and no caching.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use dealscope_shared::{AssociationEdge, Deal, DealScopeError, Result};

/// User-Agent string for CRM requests.
const USER_AGENT: &str = concat!("DealScope/", env!("CARGO_PKG_VERSION"));

/// Request timeout for CRM calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Attribute projection requested for the deal record.
const DEAL_PROPERTIES: &str =
    "dealname,amount,dealstage,pipeline,closedate,createdate,hubspot_owner_id,description";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A generic CRM object: an id plus a string-valued property bag.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
}

impl ObjectRecord {
    /// Look up a property, treating empty strings as absent. The API reports
    /// cleared attributes as `""` or `null` interchangeably; collapsing both
    /// to `None` keeps the absent-vs-empty distinction out of callers.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|v| v.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Owned copy of a property, with the same empty-is-absent rule.
    pub fn prop_owned(&self, name: &str) -> Option<String> {
        self.prop(name).map(str::to_string)
    }
}

/// One page of an association listing.
#[derive(Debug, Deserialize)]
struct AssociationPage {
    #[serde(default)]
    results: Vec<AssociationResult>,
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct AssociationResult {
    #[serde(
        rename = "toObjectId",
        default,
        deserialize_with = "opt_id_from_string_or_number"
    )]
    to_object_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<PageCursor>,
}

#[derive(Debug, Deserialize)]
struct PageCursor {
    link: Option<String>,
}

/// Envelope shared by batch reads and association pages.
#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    results: Vec<ObjectRecord>,
}

/// The API emits object ids as JSON numbers on older portals and strings on
/// newer ones; accept both.
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn opt_id_from_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// CrmClient
// ---------------------------------------------------------------------------

/// Authenticated CRM API client. Cheap to clone is not needed: one client is
/// built per run and every invocation is independent.
#[derive(Debug)]
pub struct CrmClient {
    http: Client,
    base_url: String,
    token: String,
}

impl CrmClient {
    /// Create a new client against `base_url` with a bearer `token`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        // Validate early so a typo fails at startup, not mid-aggregation.
        Url::parse(base_url)
            .map_err(|e| DealScopeError::config(format!("invalid CRM base URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                DealScopeError::upstream("build HTTP client", e.to_string())
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Fetch the deal snapshot with the fixed attribute projection.
    #[instrument(skip(self))]
    pub async fn deal(&self, deal_id: &str) -> Result<Deal> {
        let url = format!(
            "{}/crm/v3/objects/deals/{deal_id}?properties={DEAL_PROPERTIES}",
            self.base_url
        );
        let record: ObjectRecord = self.get_json("get deal", &url).await?;
        Ok(deal_from_record(&record))
    }

    /// Resolve every association edge from the deal to `to_object`, following
    /// the paging cursor until the listing is exhausted. Edges accumulate in
    /// page order; no page-size bound is assumed. Zero edges is a valid
    /// result, not an error.
    #[instrument(skip(self))]
    pub async fn associations(
        &self,
        deal_id: &str,
        to_object: &str,
    ) -> Result<Vec<AssociationEdge>> {
        let operation = format!("list {to_object} associations");
        let mut next_url = format!(
            "{}/crm/v4/objects/deals/{deal_id}/associations/{to_object}",
            self.base_url
        );
        let mut edges = Vec::new();

        loop {
            let page: AssociationPage = self.get_json(&operation, &next_url).await?;
            edges.extend(
                page.results
                    .into_iter()
                    .filter_map(|r| r.to_object_id)
                    .map(|to_object_id| AssociationEdge { to_object_id }),
            );

            match page.paging.and_then(|p| p.next).and_then(|n| n.link) {
                Some(link) => next_url = link,
                None => break,
            }
        }

        debug!(to_object, count = edges.len(), "associations resolved");
        Ok(edges)
    }

    /// Batch-read full records for `ids` with the given attribute list.
    /// An empty id list short-circuits to an empty result without a network
    /// call. Record order is whatever the endpoint returns — callers must
    /// not assume input order.
    #[instrument(skip(self, ids, properties), fields(count = ids.len()))]
    pub async fn object_batch(
        &self,
        object_type: &str,
        ids: &[String],
        properties: &[&str],
    ) -> Result<Vec<ObjectRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/crm/v3/objects/{object_type}/batch/read", self.base_url);
        let body = json!({
            "inputs": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
            "properties": properties,
        });

        let list: RecordList = self
            .post_json(&format!("batch read {object_type}"), &url, &body)
            .await?;
        debug!(object_type, count = list.results.len(), "batch read complete");
        Ok(list.results)
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| DealScopeError::upstream(operation, e.to_string()))?;
        self.decode(operation, response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| DealScopeError::upstream(operation, e.to_string()))?;
        self.decode(operation, response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DealScopeError::upstream(
                operation,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DealScopeError::parse(format!("{operation}: {e}")))
    }
}

/// Convert the raw deal record into the domain snapshot.
fn deal_from_record(record: &ObjectRecord) -> Deal {
    Deal {
        id: record.id.clone(),
        name: record.prop_owned("dealname"),
        amount: record.prop_owned("amount"),
        stage: record.prop_owned("dealstage"),
        pipeline: record.prop_owned("pipeline"),
        create_date: record.prop_owned("createdate"),
        close_date: record.prop_owned("closedate"),
        description: record.prop_owned("description"),
        owner_id: record.prop_owned("hubspot_owner_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CrmClient {
        CrmClient::new(&server.uri(), "test-token").unwrap()
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = CrmClient::new("not a url", "t").unwrap_err();
        assert!(err.to_string().contains("invalid CRM base URL"));
    }

    #[test]
    fn object_record_empty_props_are_absent() {
        let record: ObjectRecord = serde_json::from_value(json!({
            "id": 123,
            "properties": { "dealname": "Acme", "amount": "", "dealstage": null }
        }))
        .unwrap();

        assert_eq!(record.id, "123");
        assert_eq!(record.prop("dealname"), Some("Acme"));
        assert_eq!(record.prop("amount"), None);
        assert_eq!(record.prop("dealstage"), None);
        assert_eq!(record.prop("missing"), None);
    }

    #[tokio::test]
    async fn deal_fetch_maps_properties() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v3/objects/deals/901"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "901",
                "properties": {
                    "dealname": "Acme Renewal",
                    "amount": "50000",
                    "dealstage": "negotiation",
                    "closedate": "2026-03-01",
                    "description": ""
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let deal = client_for(&server).deal("901").await.unwrap();
        assert_eq!(deal.id, "901");
        assert_eq!(deal.name.as_deref(), Some("Acme Renewal"));
        assert_eq!(deal.amount.as_deref(), Some("50000"));
        assert_eq!(deal.description, None);
    }

    #[tokio::test]
    async fn associations_follow_cursor_to_exhaustion() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "toObjectId": 1 },
                    { "toObjectId": "2" }
                ],
                "paging": { "next": { "link": format!("{}/page-two", server.uri()) } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/page-two"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 3 } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let edges = client_for(&server)
            .associations("901", "contacts")
            .await
            .unwrap();

        let ids: Vec<&str> = edges.iter().map(|e| e.to_object_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn associations_empty_listing_is_ok() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let edges = client_for(&server).associations("901", "notes").await.unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn associations_http_failure_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/calls"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .associations("901", "calls")
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("list calls associations"), "got: {msg}");
        assert!(msg.contains("502"), "got: {msg}");
    }

    #[tokio::test]
    async fn batch_read_posts_ids_and_properties() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/contacts/batch/read"))
            .and(body_partial_json(json!({
                "inputs": [ { "id": "1" }, { "id": "2" } ],
                "properties": ["firstname", "lastname", "email", "phone", "company"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": "2", "properties": { "firstname": "Bea" } },
                    { "id": "1", "properties": { "firstname": "Ada" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .object_batch(
                "contacts",
                &["1".into(), "2".into()],
                &["firstname", "lastname", "email", "phone", "company"],
            )
            .await
            .unwrap();

        // Remote return order is preserved as-is, not re-ordered to match input.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "2");
        assert_eq!(records[1].id, "1");
    }

    #[tokio::test]
    async fn empty_batch_makes_no_network_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .object_batch("contacts", &[], &["firstname"])
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
