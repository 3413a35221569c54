use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::records::{NewSummary, SummaryRecord};
use crate::reference::NormalizedReference;

/// `(url, requested_word_count)`. Several records may share one key; the highest id wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub reference: NormalizedReference,
    pub requested_word_count: i64,
}

/// Append-only store of summary records on top of the `summaries` table.
///
/// Each call is one self-contained statement; nothing here holds a transaction open
/// across network calls made by the caller.
#[derive(Clone)]
pub struct SummaryStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    url: String,
    requested_word_count: i64,
    actual_word_count: i64,
    summary: String,
    summary_origin: String,
    summary_translated: Option<String>,
    translation_origin: String,
    created_at: String,
}

impl TryFrom<SummaryRow> for SummaryRecord {
    type Error = anyhow::Error;

    fn try_from(row: SummaryRow) -> Result<Self> {
        Ok(SummaryRecord {
            id: row.id,
            url: row.url,
            requested_word_count: row.requested_word_count,
            actual_word_count: row.actual_word_count,
            summary: row.summary,
            summary_origin: row.summary_origin.parse()?,
            summary_translated: row.summary_translated,
            translation_origin: row.translation_origin.parse()?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .context("Failed to parse created_at")?
                .with_timezone(&Utc),
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, url, requested_word_count, actual_word_count, summary, \
     summary_origin, summary_translated, translation_origin, created_at FROM summaries";

impl SummaryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a new immutable record and return it with its assigned id.
    pub async fn put(&self, new: &NewSummary) -> Result<SummaryRecord> {
        // stored with microsecond precision; keep the returned value identical
        let created_at = Utc::now().trunc_subsecs(6);
        let actual_word_count = new.actual_word_count();

        let result = sqlx::query(
            r#"
            INSERT INTO summaries
            (url, requested_word_count, actual_word_count, summary, summary_origin,
             summary_translated, translation_origin, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.url)
        .bind(new.requested_word_count)
        .bind(actual_word_count)
        .bind(&new.summary)
        .bind(new.summary_origin.as_str())
        .bind(&new.summary_translated)
        .bind(new.translation_origin.as_str())
        .bind(created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await
        .context("failed to insert summary")?;

        let id = result.last_insert_rowid();
        info!(id, url = %new.url, requested = new.requested_word_count, "stored summary");

        Ok(SummaryRecord {
            id,
            url: new.url.clone(),
            requested_word_count: new.requested_word_count,
            actual_word_count,
            summary: new.summary.clone(),
            summary_origin: new.summary_origin,
            summary_translated: new.summary_translated.clone(),
            translation_origin: new.translation_origin,
            created_at,
        })
    }

    /// Highest-id record for `reference`. With `word_count`, only records requested at
    /// exactly that length match; without it, any length does.
    ///
    /// Insertion order, not `created_at`, defines "latest".
    pub async fn find_latest(
        &self,
        reference: &NormalizedReference,
        word_count: Option<i64>,
    ) -> Result<Option<SummaryRecord>> {
        let row = match word_count {
            Some(count) => {
                sqlx::query_as::<_, SummaryRow>(&format!(
                    "{SELECT_COLUMNS} WHERE url = ? AND requested_word_count = ? ORDER BY id DESC LIMIT 1"
                ))
                .bind(reference.as_str())
                .bind(count)
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, SummaryRow>(&format!(
                    "{SELECT_COLUMNS} WHERE url = ? ORDER BY id DESC LIMIT 1"
                ))
                .bind(reference.as_str())
                .fetch_optional(&self.pool)
                .await
            }
        }
        .context("failed to query summaries")?;

        debug!(url = %reference, ?word_count, hit = row.is_some(), "cache lookup");
        row.map(SummaryRecord::try_from).transpose()
    }

    pub async fn find_exact(&self, key: &CacheKey) -> Result<Option<SummaryRecord>> {
        self.find_latest(&key.reference, Some(key.requested_word_count)).await
    }

    /// Readiness probe.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}
