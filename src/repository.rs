//! Data-access seam between the bot and Postgres.
//!
//! The dispatcher and the searcher only see [`Repository`]; `PgRepository`
//! forwards to the free functions in [`crate::db`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{self, MatchRecord, NewUser, User};
use crate::filter::ExcludedIds;
use crate::searcher::Candidate;

pub use crate::db::{ListEntry, ListKind};

#[async_trait]
pub trait Repository: Send + Sync {
    async fn upsert_user(&self, user: &NewUser) -> Result<User>;

    async fn get_user_by_vk_id(&self, vk_id: i64) -> Result<Option<User>>;

    /// Favorites and blacklist identities of a registered user
    async fn excluded_ids(&self, user_id: i32) -> Result<ExcludedIds>;

    async fn replace_matches(&self, user_id: i32, candidates: &[Candidate]) -> Result<()>;

    async fn upsert_matches(&self, user_id: i32, candidates: &[Candidate]) -> Result<()>;

    /// First match after row `after_id` that is in neither list
    async fn next_match(&self, user_id: i32, after_id: i32) -> Result<Option<MatchRecord>>;

    async fn get_match(&self, user_id: i32, vk_id: i64) -> Result<Option<MatchRecord>>;

    /// `false` when the identity was already in the list
    async fn add_to_list(&self, kind: ListKind, user_id: i32, record: &MatchRecord) -> Result<bool>;

    /// `false` when the identity was not in the list
    async fn remove_from_list(&self, kind: ListKind, user_id: i32, vk_id: i64) -> Result<bool>;

    async fn list_entries(&self, kind: ListKind, user_id: i32) -> Result<Vec<ListEntry>>;
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn upsert_user(&self, user: &NewUser) -> Result<User> {
        db::upsert_user(&self.pool, user).await
    }

    async fn get_user_by_vk_id(&self, vk_id: i64) -> Result<Option<User>> {
        db::get_user_by_vk_id(&self.pool, vk_id).await
    }

    async fn excluded_ids(&self, user_id: i32) -> Result<ExcludedIds> {
        db::excluded_ids(&self.pool, user_id).await
    }

    async fn replace_matches(&self, user_id: i32, candidates: &[Candidate]) -> Result<()> {
        db::replace_matches(&self.pool, user_id, candidates).await
    }

    async fn upsert_matches(&self, user_id: i32, candidates: &[Candidate]) -> Result<()> {
        db::upsert_matches(&self.pool, user_id, candidates).await
    }

    async fn next_match(&self, user_id: i32, after_id: i32) -> Result<Option<MatchRecord>> {
        db::next_match(&self.pool, user_id, after_id).await
    }

    async fn get_match(&self, user_id: i32, vk_id: i64) -> Result<Option<MatchRecord>> {
        db::get_match(&self.pool, user_id, vk_id).await
    }

    async fn add_to_list(&self, kind: ListKind, user_id: i32, record: &MatchRecord) -> Result<bool> {
        db::add_to_list(&self.pool, kind, user_id, record).await
    }

    async fn remove_from_list(&self, kind: ListKind, user_id: i32, vk_id: i64) -> Result<bool> {
        db::remove_from_list(&self.pool, kind, user_id, vk_id).await
    }

    async fn list_entries(&self, kind: ListKind, user_id: i32) -> Result<Vec<ListEntry>> {
        db::list_entries(&self.pool, kind, user_id).await
    }
}
