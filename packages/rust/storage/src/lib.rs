//! libSQL storage layer for analysis history (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! completed analysis.
//!
//! **Access rules:**
//! - CLI `analyze`: read-write via [`Storage::open`]
//! - CLI `history`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use lexrisk_shared::{AnalysisRecord, DocumentType, Identity, LexRiskError, Result};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create the history database at `path` and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LexRiskError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing history database for reading only. No migrations run.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LexRiskError::Storage(format!(
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

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LexRiskError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Analysis history
    // -----------------------------------------------------------------------

    /// Persist a completed analysis.
    pub async fn save_analysis(&self, record: &AnalysisRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO analyses (id, user_id, filename, document_type, analysis, content_hash, content_len, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.as_str(),
                    record.identity.as_str(),
                    record.filename.as_str(),
                    record.document_type.label(),
                    record.analysis.as_str(),
                    record.content_hash.as_str(),
                    record.content_len as i64,
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;

        tracing::debug!(id = %record.id, user = %record.identity, "analysis saved");
        Ok(())
    }

    /// All analyses for `identity`, newest first.
    pub async fn user_history(&self, identity: &Identity) -> Result<Vec<AnalysisRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, filename, document_type, analysis, content_hash, content_len, created_at
                 FROM analyses WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                params![identity.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    /// Fetch a single analysis by id.
    pub async fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, user_id, filename, document_type, analysis, content_hash, content_len, created_at
                 FROM analyses WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Delete every analysis owned by `identity`. Returns the number removed.
    pub async fn delete_user_history(&self, identity: &Identity) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM analyses WHERE user_id = ?1",
                params![identity.as_str()],
            )
            .await
            .map_err(storage_err)
    }
}

fn storage_err(e: libsql::Error) -> LexRiskError {
    LexRiskError::Storage(e.to_string())
}

/// Convert a database row to an [`AnalysisRecord`].
fn row_to_record(row: &libsql::Row) -> Result<AnalysisRecord> {
    Ok(AnalysisRecord {
        id: row.get::<String>(0).map_err(storage_err)?,
        identity: Identity::new(row.get::<String>(1).map_err(storage_err)?),
        filename: row.get::<String>(2).map_err(storage_err)?,
        document_type: DocumentType::from_label(&row.get::<String>(3).map_err(storage_err)?),
        analysis: row.get::<String>(4).map_err(storage_err)?,
        content_hash: row.get::<String>(5).map_err(storage_err)?,
        content_len: row.get::<i64>(6).map_err(storage_err)? as usize,
        created_at: {
            let s: String = row.get(7).map_err(storage_err)?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| LexRiskError::Storage(format!("invalid date: {e}")))?
        },
    })
}
