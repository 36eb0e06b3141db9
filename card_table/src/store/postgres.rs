//! PostgreSQL store backend.
//!
//! Each kind of value gets its own table, keyed by the store key. A batch
//! runs inside one database transaction that first takes a transaction-scoped
//! advisory lock on every key it touches (in sorted order, so two batches
//! never wait on each other in a cycle). Guard failures return early and the
//! dropped transaction rolls back.
#![allow(clippy::needless_raw_string_hashes)]

use super::{Command, Reply, Score, Store, StoreError, StoreResult};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::{BTreeMap, HashMap};

/// Schema statements, applied by [`crate::db::Database::migrate`]
pub const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS kv_counters (
        key TEXT PRIMARY KEY,
        value BIGINT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS kv_hashes (
        key TEXT NOT NULL,
        field TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (key, field)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS kv_sets (
        key TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (key, member)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS kv_sorted (
        key TEXT NOT NULL,
        member TEXT NOT NULL,
        score BIGINT NOT NULL,
        PRIMARY KEY (key, member)
    )"#,
    r#"CREATE INDEX IF NOT EXISTS kv_sorted_order ON kv_sorted (key, score, member)"#,
    r#"CREATE TABLE IF NOT EXISTS kv_sorted_high (
        key TEXT PRIMARY KEY,
        high BIGINT NOT NULL
    )"#,
];

const DATA_TABLES: &[&str] = &["kv_counters", "kv_hashes", "kv_sets", "kv_sorted"];

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn transaction(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>> {
        let mut tx = self.pool.begin().await?;

        let mut keys: Vec<&str> = commands.iter().flat_map(Command::keys).collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            replies.push(apply(&mut tx, command).await?);
        }

        tx.commit().await?;
        Ok(replies)
    }
}

async fn apply(tx: &mut Transaction<'_, Postgres>, command: Command) -> StoreResult<Reply> {
    match command {
        Command::Incr { key } => {
            let row = sqlx::query(
                "INSERT INTO kv_counters (key, value) VALUES ($1, 1)
                 ON CONFLICT (key) DO UPDATE SET value = kv_counters.value + 1
                 RETURNING value",
            )
            .bind(&key)
            .fetch_one(&mut **tx)
            .await?;
            Ok(Reply::Int(row.get("value")))
        }

        Command::HashSet { key, fields } => {
            for (field, value) in fields {
                sqlx::query(
                    "INSERT INTO kv_hashes (key, field, value) VALUES ($1, $2, $3)
                     ON CONFLICT (key, field) DO UPDATE SET value = EXCLUDED.value",
                )
                .bind(&key)
                .bind(field)
                .bind(value)
                .execute(&mut **tx)
                .await?;
            }
            Ok(Reply::Unit)
        }

        Command::HashGetAll { key } => {
            let rows = sqlx::query("SELECT field, value FROM kv_hashes WHERE key = $1")
                .bind(&key)
                .fetch_all(&mut **tx)
                .await?;
            let fields: BTreeMap<String, String> = rows
                .into_iter()
                .map(|row| (row.get("field"), row.get("value")))
                .collect();
            Ok(Reply::Hash(fields))
        }

        Command::SetAdd { key, members } => {
            let result = sqlx::query(
                "INSERT INTO kv_sets (key, member) SELECT $1, UNNEST($2::TEXT[])
                 ON CONFLICT (key, member) DO NOTHING",
            )
            .bind(&key)
            .bind(&members)
            .execute(&mut **tx)
            .await?;
            Ok(Reply::Int(result.rows_affected() as i64))
        }

        Command::SetMembers { key } => {
            let rows = sqlx::query("SELECT member FROM kv_sets WHERE key = $1 ORDER BY member")
                .bind(&key)
                .fetch_all(&mut **tx)
                .await?;
            Ok(Reply::Members(
                rows.into_iter().map(|row| row.get("member")).collect(),
            ))
        }

        Command::Exists { key } => {
            let row = sqlx::query(
                "SELECT EXISTS (SELECT 1 FROM kv_counters WHERE key = $1)
                     OR EXISTS (SELECT 1 FROM kv_hashes WHERE key = $1)
                     OR EXISTS (SELECT 1 FROM kv_sets WHERE key = $1)
                     OR EXISTS (SELECT 1 FROM kv_sorted WHERE key = $1) AS present",
            )
            .bind(&key)
            .fetch_one(&mut **tx)
            .await?;
            Ok(Reply::Bool(row.get("present")))
        }

        Command::Delete { key } => Ok(Reply::Bool(delete_key(tx, &key).await?)),

        Command::SortedAdd { key, entries } => {
            let mut added = 0;
            let mut high: Option<Score> = None;
            for (score, member) in entries {
                let row = sqlx::query(
                    "INSERT INTO kv_sorted (key, member, score) VALUES ($1, $2, $3)
                     ON CONFLICT (key, member) DO UPDATE SET score = EXCLUDED.score
                     RETURNING (xmax = 0) AS inserted",
                )
                .bind(&key)
                .bind(member)
                .bind(score)
                .fetch_one(&mut **tx)
                .await?;
                if row.get::<bool, _>("inserted") {
                    added += 1;
                }
                high = Some(high.map_or(score, |high| high.max(score)));
            }
            if let Some(high) = high {
                raise_high_water(tx, &key, high).await?;
            }
            Ok(Reply::Int(added))
        }

        Command::SortedAppend { key, members } => {
            let scored = append_members(tx, &key, members).await?;
            let high = match scored.last() {
                Some((_, score)) => *score,
                None => high_water(tx, &key).await?,
            };
            Ok(Reply::Int(high))
        }

        Command::SortedRange { key, limit } => {
            Ok(Reply::Scored(sorted_range(tx, &key, limit).await?))
        }

        Command::SortedRemove { key, members } => {
            let result = sqlx::query("DELETE FROM kv_sorted WHERE key = $1 AND member = ANY($2)")
                .bind(&key)
                .bind(&members)
                .execute(&mut **tx)
                .await?;
            Ok(Reply::Int(result.rows_affected() as i64))
        }

        Command::SortedScores { key, members } => {
            let scores = sorted_scores(tx, &key, &members).await?;
            Ok(Reply::Scores(
                members
                    .iter()
                    .map(|member| scores.get(member).copied())
                    .collect(),
            ))
        }

        Command::SortedCount { key } => {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM kv_sorted WHERE key = $1")
                .bind(&key)
                .fetch_one(&mut **tx)
                .await?;
            Ok(Reply::Int(row.get("n")))
        }

        Command::SortedHighWater { key } => Ok(Reply::Int(high_water(tx, &key).await?)),

        Command::SortedPopMinInto {
            source,
            destination,
        } => {
            let popped = sqlx::query(
                "DELETE FROM kv_sorted
                 WHERE key = $1 AND member = (
                     SELECT member FROM kv_sorted WHERE key = $1
                     ORDER BY score, member LIMIT 1
                 )
                 RETURNING member",
            )
            .bind(&source)
            .fetch_optional(&mut **tx)
            .await?;

            match popped {
                Some(row) => {
                    let member: String = row.get("member");
                    let members = vec![member];
                    require_absent(tx, &destination, &members).await?;
                    Ok(Reply::Scored(
                        append_members(tx, &destination, members).await?,
                    ))
                }
                None => Ok(Reply::Scored(Vec::new())),
            }
        }

        Command::SortedMoveAll {
            source,
            destination,
        } => {
            let members: Vec<String> = sorted_range(tx, &source, None)
                .await?
                .into_iter()
                .map(|(member, _)| member)
                .collect();
            require_absent(tx, &destination, &members).await?;
            delete_key(tx, &source).await?;
            Ok(Reply::Scored(
                append_members(tx, &destination, members).await?,
            ))
        }

        Command::RequirePresent { key, members } => {
            let scores = sorted_scores(tx, &key, &members).await?;
            let missing: Vec<String> = members
                .into_iter()
                .filter(|member| !scores.contains_key(member))
                .collect();
            if missing.is_empty() {
                Ok(Reply::Unit)
            } else {
                Err(StoreError::MembersMissing {
                    key,
                    members: missing,
                })
            }
        }

        Command::RequireAbsent { key, members } => {
            require_absent(tx, &key, &members).await?;
            Ok(Reply::Unit)
        }
    }
}

/// Delete every row stored under `key`. Returns whether any data existed.
async fn delete_key(tx: &mut Transaction<'_, Postgres>, key: &str) -> StoreResult<bool> {
    let mut existed = false;
    for table in DATA_TABLES {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE key = $1"))
            .bind(key)
            .execute(&mut **tx)
            .await?;
        existed |= result.rows_affected() > 0;
    }
    sqlx::query("DELETE FROM kv_sorted_high WHERE key = $1")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(existed)
}

async fn sorted_range(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    limit: Option<usize>,
) -> StoreResult<Vec<(String, Score)>> {
    // LIMIT NULL means no limit
    let rows = sqlx::query(
        "SELECT member, score FROM kv_sorted WHERE key = $1
         ORDER BY score, member LIMIT $2",
    )
    .bind(key)
    .bind(limit.map(|limit| limit as i64))
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("member"), row.get("score")))
        .collect())
}

async fn sorted_scores(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    members: &[String],
) -> StoreResult<HashMap<String, Score>> {
    let rows =
        sqlx::query("SELECT member, score FROM kv_sorted WHERE key = $1 AND member = ANY($2)")
            .bind(key)
            .bind(members)
            .fetch_all(&mut **tx)
            .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("member"), row.get("score")))
        .collect())
}

/// Fail with `MembersPresent` if any of `members` is already under `key`
async fn require_absent(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    members: &[String],
) -> StoreResult<()> {
    let scores = sorted_scores(tx, key, members).await?;
    let present: Vec<String> = members
        .iter()
        .filter(|member| scores.contains_key(*member))
        .cloned()
        .collect();
    if present.is_empty() {
        Ok(())
    } else {
        Err(StoreError::MembersPresent {
            key: key.to_string(),
            members: present,
        })
    }
}

/// Highest score ever assigned under `key`, including scores of members
/// written before the high-water row existed
async fn high_water(tx: &mut Transaction<'_, Postgres>, key: &str) -> StoreResult<Score> {
    let row = sqlx::query(
        "SELECT GREATEST(
             COALESCE((SELECT high FROM kv_sorted_high WHERE key = $1), 0),
             COALESCE((SELECT MAX(score) FROM kv_sorted WHERE key = $1), 0)
         ) AS high",
    )
    .bind(key)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.get("high"))
}

async fn raise_high_water(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    high: Score,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO kv_sorted_high (key, high) VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET high = GREATEST(kv_sorted_high.high, EXCLUDED.high)",
    )
    .bind(key)
    .bind(high)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn append_members(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    members: Vec<String>,
) -> StoreResult<Vec<(String, Score)>> {
    if members.is_empty() {
        return Ok(Vec::new());
    }

    let mut next = high_water(tx, key).await?;
    let mut scored = Vec::with_capacity(members.len());
    for member in members {
        next = next
            .checked_add(1)
            .ok_or_else(|| StoreError::Overflow(key.to_string()))?;
        sqlx::query(
            "INSERT INTO kv_sorted (key, member, score) VALUES ($1, $2, $3)
             ON CONFLICT (key, member) DO UPDATE SET score = EXCLUDED.score",
        )
        .bind(key)
        .bind(&member)
        .bind(next)
        .execute(&mut **tx)
        .await?;
        scored.push((member, next));
    }

    raise_high_water(tx, key, next).await?;
    Ok(scored)
}
