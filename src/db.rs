//! # Database Module
//!
//! Postgres storage for bot users, surfaced matches, favorites, the blacklist
//! and per-conversation dialogue sessions. Every operation is a free function
//! over a `PgPool`; multi-statement writes run inside a transaction and roll
//! back when an error drops it.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::FromRow;

use crate::filter::ExcludedIds;
use crate::searcher::Candidate;
use crate::vk::VkUser;

/// A person talking to the bot
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i32,
    pub vk_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// VK gender code: 0 = unknown, 1 = female, 2 = male
    pub sex: i16,
    pub city_id: Option<i64>,
    pub city_title: Option<String>,
    pub age: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields written on every contact
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub vk_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub sex: i16,
    pub city_id: Option<i64>,
    pub city_title: Option<String>,
    pub age: Option<i32>,
}

impl NewUser {
    pub fn from_profile(profile: &VkUser, today: NaiveDate) -> Self {
        Self {
            vk_id: profile.id,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            sex: profile.sex,
            city_id: profile.city.as_ref().map(|city| city.id),
            city_title: profile.city.as_ref().map(|city| city.title.clone()),
            age: profile.age_on(today),
        }
    }
}

/// A candidate surfaced to a user
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MatchRecord {
    pub id: i32,
    pub user_id: i32,
    pub vk_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub profile_link: String,
    pub photo_1: Option<String>,
    pub photo_2: Option<String>,
    pub photo_3: Option<String>,
}

impl MatchRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Stored photo references, in like order
    pub fn attachments(&self) -> Vec<String> {
        [&self.photo_1, &self.photo_2, &self.photo_3]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// A favorites or blacklist row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ListEntry {
    pub id: i32,
    pub user_id: i32,
    pub vk_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub profile_link: String,
    pub created_at: DateTime<Utc>,
}

/// The two per-user exclusion lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Favorites,
    Blacklist,
}

impl ListKind {
    pub fn table(self) -> &'static str {
        match self {
            ListKind::Favorites => "favorites",
            ListKind::Blacklist => "blacklist",
        }
    }

    /// The list an identity leaves when it enters this one
    pub fn opposite(self) -> ListKind {
        match self {
            ListKind::Favorites => ListKind::Blacklist,
            ListKind::Blacklist => ListKind::Favorites,
        }
    }
}

const MATCH_COLUMNS: &str =
    "id, user_id, vk_id, first_name, last_name, profile_link, photo_1, photo_2, photo_3";

const USER_COLUMNS: &str =
    "id, vk_id, first_name, last_name, sex, city_id, city_title, age, created_at, updated_at";

/// Create all tables if absent
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            vk_id BIGINT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            sex SMALLINT NOT NULL DEFAULT 0,
            city_id BIGINT,
            city_title TEXT,
            age INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS matches (
            id SERIAL PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            vk_id BIGINT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            profile_link TEXT NOT NULL,
            photo_1 TEXT,
            photo_2 TEXT,
            photo_3 TEXT,
            UNIQUE (user_id, vk_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create matches table")?;

    for kind in [ListKind::Favorites, ListKind::Blacklist] {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                vk_id BIGINT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                profile_link TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            kind.table()
        );
        sqlx::query(&sql)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create {} table", kind.table()))?;
    }

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS dialogue_sessions (
            vk_id BIGINT PRIMARY KEY,
            state TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create dialogue_sessions table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Drop every table owned by the bot
pub async fn drop_all_tables(pool: &PgPool) -> Result<()> {
    info!("Dropping all tables...");
    for table in [
        "dialogue_sessions",
        "blacklist",
        "favorites",
        "matches",
        "users",
    ] {
        let sql = format!("DROP TABLE IF EXISTS {table} CASCADE");
        sqlx::query(&sql)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to drop {table} table"))?;
    }
    Ok(())
}

/// Drop and recreate the whole schema
pub async fn reset_database(pool: &PgPool) -> Result<()> {
    drop_all_tables(pool).await?;
    init_database_schema(pool).await
}

/// Insert a user or refresh the profile of an existing one
pub async fn upsert_user(pool: &PgPool, user: &NewUser) -> Result<User> {
    debug!("Upserting user with vk_id: {}", user.vk_id);

    let sql = format!(
        "INSERT INTO users (vk_id, first_name, last_name, sex, city_id, city_title, age)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (vk_id) DO UPDATE SET
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            sex = EXCLUDED.sex,
            city_id = EXCLUDED.city_id,
            city_title = EXCLUDED.city_title,
            age = EXCLUDED.age,
            updated_at = NOW()
         RETURNING {USER_COLUMNS}"
    );
    let stored = sqlx::query_as::<_, User>(&sql)
        .bind(user.vk_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.sex)
        .bind(user.city_id)
        .bind(&user.city_title)
        .bind(user.age)
        .fetch_one(pool)
        .await
        .context("Failed to upsert user")?;

    Ok(stored)
}

pub async fn get_user_by_vk_id(pool: &PgPool, vk_id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE vk_id = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(vk_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read user by vk_id")?;
    Ok(user)
}

/// External identities in the user's favorites and blacklist
pub async fn excluded_ids(pool: &PgPool, user_id: i32) -> Result<ExcludedIds> {
    let mut excluded = ExcludedIds::default();

    for kind in [ListKind::Favorites, ListKind::Blacklist] {
        let sql = format!("SELECT vk_id FROM {} WHERE user_id = $1", kind.table());
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .with_context(|| format!("Failed to read {} ids", kind.table()))?;
        match kind {
            ListKind::Favorites => excluded.favorites.extend(ids),
            ListKind::Blacklist => excluded.blocked.extend(ids),
        }
    }

    Ok(excluded)
}

async fn upsert_match(conn: &mut PgConnection, user_id: i32, candidate: &Candidate) -> Result<()> {
    let photos = candidate.attachments();
    sqlx::query(
        "INSERT INTO matches
            (user_id, vk_id, first_name, last_name, profile_link, photo_1, photo_2, photo_3)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (user_id, vk_id) DO UPDATE SET
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            profile_link = EXCLUDED.profile_link,
            photo_1 = EXCLUDED.photo_1,
            photo_2 = EXCLUDED.photo_2,
            photo_3 = EXCLUDED.photo_3",
    )
    .bind(user_id)
    .bind(candidate.vk_id)
    .bind(&candidate.first_name)
    .bind(&candidate.last_name)
    .bind(&candidate.profile_url)
    .bind(photos.first())
    .bind(photos.get(1))
    .bind(photos.get(2))
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert match {}", candidate.vk_id))?;
    Ok(())
}

/// Store a page of candidates, updating rows the user already has
pub async fn upsert_matches(pool: &PgPool, user_id: i32, candidates: &[Candidate]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    for candidate in candidates {
        upsert_match(&mut tx, user_id, candidate).await?;
    }
    tx.commit().await.context("Failed to commit matches")?;

    debug!("Stored {} matches for user {}", candidates.len(), user_id);
    Ok(())
}

/// Replace all of a user's matches with a fresh search result
pub async fn replace_matches(pool: &PgPool, user_id: i32, candidates: &[Candidate]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    sqlx::query("DELETE FROM matches WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear matches")?;
    for candidate in candidates {
        upsert_match(&mut tx, user_id, candidate).await?;
    }
    tx.commit().await.context("Failed to commit matches")?;

    info!("Replaced matches for user {} with {} candidates", user_id, candidates.len());
    Ok(())
}

/// First stored match after `after_id` that is in neither list
pub async fn next_match(pool: &PgPool, user_id: i32, after_id: i32) -> Result<Option<MatchRecord>> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM matches m
         WHERE m.user_id = $1
           AND m.id > $2
           AND NOT EXISTS (SELECT 1 FROM favorites f WHERE f.user_id = m.user_id AND f.vk_id = m.vk_id)
           AND NOT EXISTS (SELECT 1 FROM blacklist b WHERE b.user_id = m.user_id AND b.vk_id = m.vk_id)
         ORDER BY m.id
         LIMIT 1"
    );
    let record = sqlx::query_as::<_, MatchRecord>(&sql)
        .bind(user_id)
        .bind(after_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read next match")?;
    Ok(record)
}

pub async fn get_match(pool: &PgPool, user_id: i32, vk_id: i64) -> Result<Option<MatchRecord>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE user_id = $1 AND vk_id = $2");
    let record = sqlx::query_as::<_, MatchRecord>(&sql)
        .bind(user_id)
        .bind(vk_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read match")?;
    Ok(record)
}

/// Add a match to a list; `false` if it was already there
///
/// The identity is removed from the opposite list in the same transaction.
pub async fn add_to_list(
    pool: &PgPool,
    kind: ListKind,
    user_id: i32,
    record: &MatchRecord,
) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to open transaction")?;

    let find_sql = format!(
        "SELECT id FROM {} WHERE user_id = $1 AND vk_id = $2 LIMIT 1",
        kind.table()
    );
    let existing: Option<i32> = sqlx::query_scalar(&find_sql)
        .bind(user_id)
        .bind(record.vk_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to look up list entry")?;
    if existing.is_some() {
        debug!("{} already holds {} for user {}", kind.table(), record.vk_id, user_id);
        return Ok(false);
    }

    let clear_sql = format!(
        "DELETE FROM {} WHERE user_id = $1 AND vk_id = $2",
        kind.opposite().table()
    );
    sqlx::query(&clear_sql)
        .bind(user_id)
        .bind(record.vk_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear opposite list")?;

    let insert_sql = format!(
        "INSERT INTO {} (user_id, vk_id, first_name, last_name, profile_link)
         VALUES ($1, $2, $3, $4, $5)",
        kind.table()
    );
    sqlx::query(&insert_sql)
        .bind(user_id)
        .bind(record.vk_id)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.profile_link)
        .execute(&mut *tx)
        .await
        .context("Failed to insert list entry")?;

    tx.commit().await.context("Failed to commit list entry")?;
    info!("Added {} to {} of user {}", record.vk_id, kind.table(), user_id);
    Ok(true)
}

/// Remove an identity from a list; `false` if it was not there
pub async fn remove_from_list(pool: &PgPool, kind: ListKind, user_id: i32, vk_id: i64) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE user_id = $1 AND vk_id = $2", kind.table());
    let rows_affected = sqlx::query(&sql)
        .bind(user_id)
        .bind(vk_id)
        .execute(pool)
        .await
        .context("Failed to delete list entry")?
        .rows_affected();

    if rows_affected > 0 {
        info!("Removed {} from {} of user {}", vk_id, kind.table(), user_id);
        Ok(true)
    } else {
        info!("No {} entry {} for user {}", kind.table(), vk_id, user_id);
        Ok(false)
    }
}

/// Entries of a list, oldest first
pub async fn list_entries(pool: &PgPool, kind: ListKind, user_id: i32) -> Result<Vec<ListEntry>> {
    let sql = format!(
        "SELECT id, user_id, vk_id, first_name, last_name, profile_link, created_at
         FROM {} WHERE user_id = $1 ORDER BY id",
        kind.table()
    );
    let entries = sqlx::query_as::<_, ListEntry>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {}", kind.table()))?;
    Ok(entries)
}

/// Serialized dialogue session of a conversation, if any
pub async fn load_session(pool: &PgPool, vk_id: i64) -> Result<Option<String>> {
    let state: Option<String> =
        sqlx::query_scalar("SELECT state FROM dialogue_sessions WHERE vk_id = $1")
            .bind(vk_id)
            .fetch_optional(pool)
            .await
            .context("Failed to load dialogue session")?;
    Ok(state)
}

pub async fn save_session(pool: &PgPool, vk_id: i64, state: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO dialogue_sessions (vk_id, state) VALUES ($1, $2)
         ON CONFLICT (vk_id) DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()",
    )
    .bind(vk_id)
    .bind(state)
    .execute(pool)
    .await
    .context("Failed to save dialogue session")?;
    Ok(())
}
