//! Embedded libSQL storage for analysis runs.
//!
//! The [`Store`] struct wraps a local libSQL database holding the prompt
//! catalog (analysis types), completed analyses (with the raw deal document
//! kept as an audit trail), and per-section feedback.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use dealscope_shared::{DealScopeError, Result};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One prompt-catalog entry.
#[derive(Debug, Clone)]
pub struct AnalysisType {
    pub type_id: String,
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub is_active: bool,
    pub version: i64,
}

/// A completed analysis run as persisted.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub deal_id: String,
    pub deal_name: String,
    pub analysis_type: String,
    /// The assembled deal document, stored verbatim for auditability.
    pub deal_document: String,
    pub document_sha256: String,
    pub system_prompt: String,
    pub response: String,
    pub prompt_version: i64,
    pub created_at: String,
}

/// A lightweight row for search/history listings.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub analysis_id: String,
    pub deal_id: String,
    pub deal_name: String,
    pub analysis_type: String,
    pub created_at: String,
}

/// One feedback submission against an analysis section.
#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub analysis_id: String,
    pub section_id: String,
    pub section_title: String,
    /// `"up"` or `"down"`.
    pub rating: String,
    pub reason: Option<String>,
    pub correction: Option<String>,
    pub prompt_version: i64,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DealScopeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DealScopeError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Analysis type catalog
    // -----------------------------------------------------------------------

    /// Insert or update a catalog entry. Updating an existing type bumps its
    /// `version` so saved analyses can record which prompt produced them.
    pub async fn upsert_analysis_type(&self, entry: &AnalysisType) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO analysis_types
                   (type_id, name, description, system_prompt, is_active, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                 ON CONFLICT(type_id) DO UPDATE SET
                   name = excluded.name,
                   description = excluded.description,
                   system_prompt = excluded.system_prompt,
                   is_active = excluded.is_active,
                   version = analysis_types.version + 1,
                   updated_at = excluded.updated_at",
                params![
                    entry.type_id.as_str(),
                    entry.name.as_str(),
                    entry.description.as_deref(),
                    entry.system_prompt.as_str(),
                    entry.is_active as i64,
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List active analysis types, ordered by type id.
    pub async fn list_analysis_types(&self) -> Result<Vec<AnalysisType>> {
        let mut rows = self
            .conn
            .query(
                "SELECT type_id, name, description, system_prompt, is_active, version
                 FROM analysis_types WHERE is_active = 1 ORDER BY type_id",
                params![],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_analysis_type(&row)?);
        }
        Ok(results)
    }

    /// Get an active analysis type by id.
    pub async fn get_analysis_type(&self, type_id: &str) -> Result<Option<AnalysisType>> {
        let mut rows = self
            .conn
            .query(
                "SELECT type_id, name, description, system_prompt, is_active, version
                 FROM analysis_types WHERE type_id = ?1 AND is_active = 1",
                params![type_id],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_analysis_type(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DealScopeError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Analyses
    // -----------------------------------------------------------------------

    /// Persist a completed analysis.
    pub async fn insert_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO analyses
                   (analysis_id, deal_id, deal_name, analysis_type, deal_document,
                    document_sha256, system_prompt, response, prompt_version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.analysis_id.as_str(),
                    record.deal_id.as_str(),
                    record.deal_name.as_str(),
                    record.analysis_type.as_str(),
                    record.deal_document.as_str(),
                    record.document_sha256.as_str(),
                    record.system_prompt.as_str(),
                    record.response.as_str(),
                    record.prompt_version,
                    record.created_at.as_str(),
                ],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;
        debug!(analysis_id = %record.analysis_id, "analysis saved");
        Ok(())
    }

    /// Get a full analysis record by id.
    pub async fn get_analysis(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT analysis_id, deal_id, deal_name, analysis_type, deal_document,
                        document_sha256, system_prompt, response, prompt_version, created_at
                 FROM analyses WHERE analysis_id = ?1",
                params![analysis_id],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(AnalysisRecord {
                analysis_id: get_str(&row, 0)?,
                deal_id: get_str(&row, 1)?,
                deal_name: get_str(&row, 2)?,
                analysis_type: get_str(&row, 3)?,
                deal_document: get_str(&row, 4)?,
                document_sha256: get_str(&row, 5)?,
                system_prompt: get_str(&row, 6)?,
                response: get_str(&row, 7)?,
                prompt_version: row
                    .get::<i64>(8)
                    .map_err(|e| DealScopeError::Storage(e.to_string()))?,
                created_at: get_str(&row, 9)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(DealScopeError::Storage(e.to_string())),
        }
    }

    /// Search analyses by deal name or deal id (case-insensitive substring),
    /// optionally filtered by analysis type, newest first.
    pub async fn search_analyses(
        &self,
        query: &str,
        type_filter: Option<&str>,
        limit: u32,
    ) -> Result<Vec<AnalysisSummary>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let type_pattern = type_filter.unwrap_or("%").to_string();

        let mut rows = self
            .conn
            .query(
                "SELECT analysis_id, deal_id, deal_name, analysis_type, created_at
                 FROM analyses
                 WHERE (LOWER(deal_name) LIKE ?1 OR deal_id LIKE ?1)
                   AND analysis_type LIKE ?2
                 ORDER BY created_at DESC
                 LIMIT ?3",
                params![pattern.as_str(), type_pattern.as_str(), limit as i64],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(AnalysisSummary {
                analysis_id: get_str(&row, 0)?,
                deal_id: get_str(&row, 1)?,
                deal_name: get_str(&row, 2)?,
                analysis_type: get_str(&row, 3)?,
                created_at: get_str(&row, 4)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------------

    /// Record feedback on one analysis section. Returns `false` when feedback
    /// for this `(analysis_id, section_id)` pair already exists — duplicate
    /// submissions are ignored, not stacked.
    pub async fn insert_feedback(&self, record: &FeedbackRecord) -> Result<bool> {
        if record.rating != "up" && record.rating != "down" {
            return Err(DealScopeError::validation(format!(
                "rating must be 'up' or 'down', got '{}'",
                record.rating
            )));
        }

        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM feedback WHERE analysis_id = ?1 AND section_id = ?2",
                params![record.analysis_id.as_str(), record.section_id.as_str()],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        if let Ok(Some(row)) = rows.next().await {
            if row.get::<i64>(0).unwrap_or(0) > 0 {
                debug!(
                    analysis_id = %record.analysis_id,
                    section_id = %record.section_id,
                    "feedback already recorded, ignoring duplicate"
                );
                return Ok(false);
            }
        }

        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO feedback
                   (analysis_id, section_id, section_title, rating, reason, correction,
                    prompt_version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.analysis_id.as_str(),
                    record.section_id.as_str(),
                    record.section_title.as_str(),
                    record.rating.as_str(),
                    record.reason.as_deref(),
                    record.correction.as_deref(),
                    record.prompt_version,
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn get_str(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| DealScopeError::Storage(e.to_string()))
}

fn row_to_analysis_type(row: &libsql::Row) -> Result<AnalysisType> {
    Ok(AnalysisType {
        type_id: get_str(row, 0)?,
        name: get_str(row, 1)?,
        description: row.get::<String>(2).ok().filter(|s| !s.is_empty()),
        system_prompt: get_str(row, 3)?,
        is_active: row
            .get::<i64>(4)
            .map_err(|e| DealScopeError::Storage(e.to_string()))?
            != 0,
        version: row
            .get::<i64>(5)
            .map_err(|e| DealScopeError::Storage(e.to_string()))?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn temp_store() -> (Store, PathBuf) {
        let dir = std::env::temp_dir().join(format!("ds-store-test-{}", uuid::Uuid::now_v7()));
        let store = Store::open(&dir.join("test.db")).await.unwrap();
        (store, dir)
    }

    fn risk_type() -> AnalysisType {
        AnalysisType {
            type_id: "risk_review".into(),
            name: "Risk Review".into(),
            description: Some("Surface deal risks".into()),
            system_prompt: "You review deal risk.".into(),
            is_active: true,
            version: 1,
        }
    }

    fn analysis(id: &str, deal_id: &str, deal_name: &str) -> AnalysisRecord {
        AnalysisRecord {
            analysis_id: id.into(),
            deal_id: deal_id.into(),
            deal_name: deal_name.into(),
            analysis_type: "risk_review".into(),
            deal_document: "# Deal: Test".into(),
            document_sha256: "0".repeat(64),
            system_prompt: "You review deal risk.".into(),
            response: "## Summary\nLooks fine.".into(),
            prompt_version: 1,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn catalog_roundtrip_and_version_bump() {
        let (store, dir) = temp_store().await;

        store.upsert_analysis_type(&risk_type()).await.unwrap();
        let fetched = store.get_analysis_type("risk_review").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Risk Review");
        assert_eq!(fetched.version, 1);

        // Re-upserting bumps the version.
        store.upsert_analysis_type(&risk_type()).await.unwrap();
        let fetched = store.get_analysis_type("risk_review").await.unwrap().unwrap();
        assert_eq!(fetched.version, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn inactive_types_are_hidden() {
        let (store, dir) = temp_store().await;

        let mut inactive = risk_type();
        inactive.type_id = "retired".into();
        inactive.is_active = false;
        store.upsert_analysis_type(&risk_type()).await.unwrap();
        store.upsert_analysis_type(&inactive).await.unwrap();

        let listed = store.list_analysis_types().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].type_id, "risk_review");
        assert!(store.get_analysis_type("retired").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn analysis_roundtrip_keeps_document() {
        let (store, dir) = temp_store().await;
        store.upsert_analysis_type(&risk_type()).await.unwrap();

        store
            .insert_analysis(&analysis("a1", "901", "Acme Renewal"))
            .await
            .unwrap();

        let fetched = store.get_analysis("a1").await.unwrap().unwrap();
        assert_eq!(fetched.deal_name, "Acme Renewal");
        assert_eq!(fetched.deal_document, "# Deal: Test");
        assert!(store.get_analysis("nope").await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn search_matches_name_or_id_case_insensitively() {
        let (store, dir) = temp_store().await;
        store.upsert_analysis_type(&risk_type()).await.unwrap();

        store
            .insert_analysis(&analysis("a1", "901", "Acme Renewal"))
            .await
            .unwrap();
        store
            .insert_analysis(&analysis("a2", "902", "Globex Expansion"))
            .await
            .unwrap();

        let by_name = store.search_analyses("acme", None, 10).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].analysis_id, "a1");

        let by_id = store.search_analyses("902", None, 10).await.unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].deal_name, "Globex Expansion");

        let all = store.search_analyses("", None, 10).await.unwrap();
        assert_eq!(all.len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn duplicate_feedback_is_ignored() {
        let (store, dir) = temp_store().await;
        store.upsert_analysis_type(&risk_type()).await.unwrap();
        store
            .insert_analysis(&analysis("a1", "901", "Acme Renewal"))
            .await
            .unwrap();

        let fb = FeedbackRecord {
            analysis_id: "a1".into(),
            section_id: "section_1".into(),
            section_title: "Summary".into(),
            rating: "up".into(),
            reason: None,
            correction: None,
            prompt_version: 1,
        };

        assert!(store.insert_feedback(&fb).await.unwrap());
        assert!(!store.insert_feedback(&fb).await.unwrap());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn feedback_rating_is_validated() {
        let (store, dir) = temp_store().await;

        let fb = FeedbackRecord {
            analysis_id: "a1".into(),
            section_id: "section_1".into(),
            section_title: "Summary".into(),
            rating: "sideways".into(),
            reason: None,
            correction: None,
            prompt_version: 1,
        };

        let err = store.insert_feedback(&fb).await.unwrap_err();
        assert!(err.to_string().contains("'up' or 'down'"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
