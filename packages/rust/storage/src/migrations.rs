//! SQL migration definitions for the DealScope database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: analysis_types, analyses, feedback",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Prompt catalog: one row per analysis type
CREATE TABLE IF NOT EXISTS analysis_types (
    type_id       TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    description   TEXT,
    system_prompt TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    version       INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- Completed analyses; the raw deal document is kept as an audit trail
CREATE TABLE IF NOT EXISTS analyses (
    analysis_id     TEXT PRIMARY KEY,
    deal_id         TEXT NOT NULL,
    deal_name       TEXT NOT NULL,
    analysis_type   TEXT NOT NULL REFERENCES analysis_types(type_id),
    deal_document   TEXT NOT NULL,
    document_sha256 TEXT NOT NULL,
    system_prompt   TEXT NOT NULL,
    response        TEXT NOT NULL,
    prompt_version  INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_analyses_deal_id ON analyses(deal_id);
CREATE INDEX IF NOT EXISTS idx_analyses_created_at ON analyses(created_at);

-- Per-section feedback on analyses
CREATE TABLE IF NOT EXISTS feedback (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    analysis_id    TEXT NOT NULL REFERENCES analyses(analysis_id) ON DELETE CASCADE,
    section_id     TEXT NOT NULL,
    section_title  TEXT NOT NULL,
    rating         TEXT NOT NULL CHECK (rating IN ('up', 'down')),
    reason         TEXT,
    correction     TEXT,
    prompt_version INTEGER NOT NULL DEFAULT 1,
    created_at     TEXT NOT NULL,
    UNIQUE(analysis_id, section_id)
);

CREATE INDEX IF NOT EXISTS idx_feedback_analysis ON feedback(analysis_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
