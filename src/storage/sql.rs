// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL node store (SQLite or MySQL via the sqlx `Any` driver).
//!
//! One table holds both kinds; `item_id` is the primary key, which is what
//! makes `upsert` atomic on the unique id:
//!
//! ```sql
//! CREATE TABLE nodes (
//!   item_id     BIGINT PRIMARY KEY,
//!   kind        VARCHAR(16) NOT NULL,   -- 'story' | 'comment'
//!   author      VARCHAR(64),
//!   content     LONGTEXT,
//!   title       VARCHAR(512),           -- stories
//!   url         TEXT,                   -- stories
//!   score       BIGINT,                 -- stories
//!   descendants BIGINT,                 -- stories
//!   parent_kind VARCHAR(16),            -- comments
//!   parent_id   BIGINT,                 -- comments
//!   updated_at  BIGINT NOT NULL
//! )
//! ```
//!
//! ## sqlx Any Driver Quirks
//!
//! - `u64` cannot be bound, ids are stored as `BIGINT` and cast.
//! - MySQL TEXT columns may come back as bytes; [`text_column`] tries both.

use std::collections::HashMap;
use std::sync::Once;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::{debug, info};

use super::traits::{NodeStore, StorageError};
use crate::node::{Kind, Node, NodeBody, ParentRef};
use crate::resilience::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

/// Ids per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

const SELECT_COLUMNS: &str =
    "item_id, kind, author, content, title, url, score, descendants, parent_kind, parent_id";

pub struct SqlNodeStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlNodeStore {
    /// Connect, then create the table if it does not exist.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(if is_sqlite { 5 } else { 20 })
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, is_sqlite };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        info!(sqlite = is_sqlite, "SQL node store ready");
        Ok(store)
    }

    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let statements: &[&str] = if self.is_sqlite {
            &[
                r#"
                CREATE TABLE IF NOT EXISTS nodes (
                    item_id INTEGER PRIMARY KEY,
                    kind TEXT NOT NULL,
                    author TEXT,
                    content TEXT,
                    title TEXT,
                    url TEXT,
                    score INTEGER,
                    descendants INTEGER,
                    parent_kind TEXT,
                    parent_id INTEGER,
                    updated_at INTEGER NOT NULL
                )
                "#,
                "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes (parent_kind, parent_id)",
            ]
        } else {
            &[r#"
                CREATE TABLE IF NOT EXISTS nodes (
                    item_id BIGINT PRIMARY KEY,
                    kind VARCHAR(16) NOT NULL,
                    author VARCHAR(64),
                    content LONGTEXT,
                    title VARCHAR(512),
                    url TEXT,
                    score BIGINT,
                    descendants BIGINT,
                    parent_kind VARCHAR(16),
                    parent_id BIGINT,
                    updated_at BIGINT NOT NULL,
                    INDEX idx_nodes_parent (parent_kind, parent_id)
                )
                "#]
        };

        for sql in statements {
            retry("sql_init_schema", &RetryConfig::startup(), || async {
                sqlx::query(sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))
            })
            .await?;
        }

        Ok(())
    }

    fn upsert_sql(&self) -> &'static str {
        if self.is_sqlite {
            "INSERT INTO nodes (item_id, kind, author, content, title, url, score, descendants, parent_kind, parent_id, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(item_id) DO UPDATE SET
                kind = excluded.kind,
                author = excluded.author,
                content = excluded.content,
                title = excluded.title,
                url = excluded.url,
                score = excluded.score,
                descendants = excluded.descendants,
                parent_kind = excluded.parent_kind,
                parent_id = excluded.parent_id,
                updated_at = excluded.updated_at"
        } else {
            "INSERT INTO nodes (item_id, kind, author, content, title, url, score, descendants, parent_kind, parent_id, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON DUPLICATE KEY UPDATE
                kind = VALUES(kind),
                author = VALUES(author),
                content = VALUES(content),
                title = VALUES(title),
                url = VALUES(url),
                score = VALUES(score),
                descendants = VALUES(descendants),
                parent_kind = VALUES(parent_kind),
                parent_id = VALUES(parent_id),
                updated_at = VALUES(updated_at)"
        }
    }

    async fn lookup_chunk(&self, kind: Kind, chunk: &[u64]) -> Result<Vec<Node>, StorageError> {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM nodes WHERE kind = ? AND item_id IN ({})",
            SELECT_COLUMNS, placeholders
        );

        let rows = retry("sql_bulk_get", &RetryConfig::query(), || async {
            let mut query = sqlx::query(&sql).bind(kind.as_str());
            for id in chunk {
                query = query.bind(to_db_id(*id)?);
            }
            query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        rows.iter().map(node_from_row).collect()
    }
}

#[async_trait]
impl NodeStore for SqlNodeStore {
    async fn bulk_get(&self, kind: Kind, ids: &[u64]) -> Result<HashMap<u64, Node>, StorageError> {
        let mut found = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(LOOKUP_CHUNK) {
            for node in self.lookup_chunk(kind, chunk).await? {
                found.insert(node.item_id, node);
            }
        }

        debug!(kind = %kind, requested = ids.len(), found = found.len(), "SQL bulk lookup");
        Ok(found)
    }

    async fn upsert(&self, node: &Node) -> Result<(), StorageError> {
        let item_id = to_db_id(node.item_id)?;
        let (title, url, score, descendants, parent_kind, parent_id) = match &node.body {
            NodeBody::Story { title, url, score, descendants } => {
                (Some(title.clone()), url.clone(), Some(*score), Some(*descendants), None, None)
            }
            NodeBody::Comment { parent } => (
                None,
                None,
                None,
                None,
                Some(parent.kind.as_str().to_string()),
                Some(to_db_id(parent.id)?),
            ),
        };
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        let sql = self.upsert_sql();

        retry("sql_upsert", &RetryConfig::query(), || async {
            sqlx::query(sql)
                .bind(item_id)
                .bind(node.kind().as_str())
                .bind(&node.by)
                .bind(&node.text)
                .bind(&title)
                .bind(&url)
                .bind(score)
                .bind(descendants)
                .bind(&parent_kind)
                .bind(parent_id)
                .bind(updated_at)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn count(&self, kind: Kind) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM nodes WHERE kind = ?")
            .bind(kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(count as u64)
    }
}

fn to_db_id(id: u64) -> Result<i64, StorageError> {
    i64::try_from(id).map_err(|_| StorageError::Serialization(format!("id {} exceeds BIGINT", id)))
}

/// Read a nullable text column as String, falling back to bytes (MySQL).
fn text_column(row: &AnyRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .or_else(|| {
            row.try_get::<Option<Vec<u8>>, _>(column)
                .ok()
                .flatten()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        })
}

fn int_column(row: &AnyRow, column: &str) -> Option<i64> {
    row.try_get::<Option<i64>, _>(column).ok().flatten()
}

fn node_from_row(row: &AnyRow) -> Result<Node, StorageError> {
    let item_id = int_column(row, "item_id")
        .ok_or_else(|| StorageError::Serialization("row without item_id".to_string()))?
        as u64;

    let kind: Kind = text_column(row, "kind")
        .ok_or_else(|| StorageError::Serialization(format!("node {} has no kind", item_id)))?
        .parse()
        .map_err(StorageError::Serialization)?;

    let body = match kind {
        Kind::Story => NodeBody::Story {
            title: text_column(row, "title").unwrap_or_default(),
            url: text_column(row, "url"),
            score: int_column(row, "score").unwrap_or(0),
            descendants: int_column(row, "descendants").unwrap_or(0),
        },
        Kind::Comment => {
            let parent_kind: Kind = text_column(row, "parent_kind")
                .ok_or_else(|| StorageError::Serialization(format!("comment {} has no parent kind", item_id)))?
                .parse()
                .map_err(StorageError::Serialization)?;
            let parent_id = int_column(row, "parent_id")
                .ok_or_else(|| StorageError::Serialization(format!("comment {} has no parent id", item_id)))?;
            NodeBody::Comment {
                parent: ParentRef::new(parent_kind, parent_id as u64),
            }
        }
    };

    Ok(Node {
        item_id,
        by: text_column(row, "author"),
        text: text_column(row, "content"),
        body,
    })
}
