//! Association-driven collection of contacts, companies, and engagements.
//!
//! Every collector follows the same two-step shape: resolve association
//! edges for the deal, then batch-fetch the targets' attributes. A category
//! or type with zero associations contributes nothing — that is a valid
//! empty result, not an error. Any HTTP failure aborts the whole run.

use tracing::{debug, info, instrument};

use dealscope_shared::{Company, Contact, EngagementCategory, EngagementRecord, Result};

use crate::catalog;
use crate::client::{CrmClient, ObjectRecord};

/// Attribute projection for associated contacts.
const CONTACT_PROPERTIES: &[&str] = &["firstname", "lastname", "email", "phone", "company"];

/// Attribute projection for associated companies.
const COMPANY_PROPERTIES: &[&str] = &["name", "domain", "industry"];

/// Collect every engagement associated with `deal_id`, in catalog order.
///
/// Each record is stamped with its category at fetch time. Accumulation
/// order is catalog order then fetch-return order; the chronological sort
/// happens downstream in document assembly.
#[instrument(skip(client))]
pub async fn collect_engagements(
    client: &CrmClient,
    deal_id: &str,
) -> Result<Vec<EngagementRecord>> {
    let mut all = Vec::new();

    for category in EngagementCategory::ALL {
        let edges = client.associations(deal_id, category.as_str()).await?;
        let ids: Vec<String> = edges.into_iter().map(|e| e.to_object_id).collect();

        if ids.is_empty() {
            debug!(%category, "no associated records");
            continue;
        }

        let records = client
            .object_batch(category.as_str(), &ids, catalog::attributes(category))
            .await?;
        all.extend(
            records
                .iter()
                .map(|r| catalog::record_to_engagement(category, r)),
        );
    }

    info!(total = all.len(), "engagement collection complete");
    Ok(all)
}

/// Collect contacts associated with the deal.
#[instrument(skip(client))]
pub async fn collect_contacts(client: &CrmClient, deal_id: &str) -> Result<Vec<Contact>> {
    let edges = client.associations(deal_id, "contacts").await?;
    let ids: Vec<String> = edges.into_iter().map(|e| e.to_object_id).collect();
    let records = client
        .object_batch("contacts", &ids, CONTACT_PROPERTIES)
        .await?;
    Ok(records.iter().map(contact_from_record).collect())
}

/// Collect companies associated with the deal.
#[instrument(skip(client))]
pub async fn collect_companies(client: &CrmClient, deal_id: &str) -> Result<Vec<Company>> {
    let edges = client.associations(deal_id, "companies").await?;
    let ids: Vec<String> = edges.into_iter().map(|e| e.to_object_id).collect();
    let records = client
        .object_batch("companies", &ids, COMPANY_PROPERTIES)
        .await?;
    Ok(records.iter().map(company_from_record).collect())
}

fn contact_from_record(record: &ObjectRecord) -> Contact {
    Contact {
        id: record.id.clone(),
        first_name: record.prop_owned("firstname"),
        last_name: record.prop_owned("lastname"),
        email: record.prop_owned("email"),
        phone: record.prop_owned("phone"),
        company: record.prop_owned("company"),
    }
}

fn company_from_record(record: &ObjectRecord) -> Company {
    Company {
        id: record.id.clone(),
        name: record.prop_owned("name"),
        domain: record.prop_owned("domain"),
        industry: record.prop_owned("industry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Mount an empty association listing for a related type.
    async fn mount_empty(server: &MockServer, deal_id: &str, to_object: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/crm/v4/objects/deals/{deal_id}/associations/{to_object}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn engagements_accumulate_in_catalog_order() {
        let server = MockServer::start().await;
        let deal_id = "901";

        // Calls and notes have records; the other categories are empty.
        for category in ["emails", "meetings", "tasks"] {
            mount_empty(&server, deal_id, category).await;
        }

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 21 } ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/901/associations/calls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 31 }, { "toObjectId": 32 } ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/notes/batch/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "id": "21", "properties": { "hs_note_body": "left a voicemail" } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/calls/batch/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": "31", "properties": { "hs_call_title": "Intro call" } },
                    { "id": "32", "properties": { "hs_call_title": "Pricing call" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CrmClient::new(&server.uri(), "t").unwrap();
        let engagements = collect_engagements(&client, deal_id).await.unwrap();

        // Notes precede calls (catalog order), each batch in return order.
        let tags: Vec<(String, EngagementCategory)> = engagements
            .iter()
            .map(|e| (e.id.clone(), e.category()))
            .collect();
        assert_eq!(
            tags,
            vec![
                ("21".to_string(), EngagementCategory::Notes),
                ("31".to_string(), EngagementCategory::Calls),
                ("32".to_string(), EngagementCategory::Calls),
            ]
        );
    }

    #[tokio::test]
    async fn empty_categories_skip_batch_reads() {
        let server = MockServer::start().await;
        let deal_id = "902";

        for category in EngagementCategory::ALL {
            mount_empty(&server, deal_id, category.as_str()).await;
        }

        // No batch read should ever be issued.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CrmClient::new(&server.uri(), "t").unwrap();
        let engagements = collect_engagements(&client, deal_id).await.unwrap();
        assert!(engagements.is_empty());
    }

    #[tokio::test]
    async fn failed_category_aborts_the_run() {
        let server = MockServer::start().await;
        let deal_id = "903";

        mount_empty(&server, deal_id, "emails").await;
        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/903/associations/notes"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = CrmClient::new(&server.uri(), "t").unwrap();
        let err = collect_engagements(&client, deal_id).await.unwrap_err();
        assert!(err.to_string().contains("list notes associations"));
    }

    #[tokio::test]
    async fn contacts_map_to_domain_records() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/crm/v4/objects/deals/904/associations/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ { "toObjectId": 5 } ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/crm/v3/objects/contacts/batch/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [ {
                    "id": "5",
                    "properties": {
                        "firstname": "Ada",
                        "lastname": "Lovelace",
                        "email": "ada@example.com",
                        "company": ""
                    }
                } ]
            })))
            .mount(&server)
            .await;

        let client = CrmClient::new(&server.uri(), "t").unwrap();
        let contacts = collect_contacts(&client, "904").await.unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].full_name().as_deref(), Some("Ada Lovelace"));
        assert_eq!(contacts[0].company, None);
    }
}
