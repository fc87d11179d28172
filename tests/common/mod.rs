//! Common test utilities and in-memory fakes of the bot's collaborators.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use vkinder::config::SearchConfig;
use vkinder::db::{ListEntry, ListKind, MatchRecord, NewUser, User};
use vkinder::dialogue::InMemSessionStore;
use vkinder::errors::VkError;
use vkinder::filter::ExcludedIds;
use vkinder::repository::Repository;
use vkinder::searcher::{Candidate, Searcher};
use vkinder::vk::types::{City, LastSeen};
use vkinder::bot::Dispatcher;
use vkinder::vk::{IncomingMessage, Messenger, OutgoingMessage, PhotoRef, SearchQuery, SocialApi, VkUser};

/// Reference "now" for activity checks
pub const NOW: i64 = 1_700_000_000;

pub fn vk_user(id: i64, sex: i16, city_id: Option<i64>) -> VkUser {
    VkUser {
        id,
        first_name: format!("First{id}"),
        last_name: format!("Last{id}"),
        sex,
        bdate: None,
        city: city_id.map(|id| City {
            id,
            title: format!("City{id}"),
        }),
        last_seen: Some(LastSeen {
            time: Utc::now().timestamp(),
            platform: None,
        }),
    }
}

/// A candidate last seen `time`
pub fn seen_at(id: i64, time: Option<i64>) -> VkUser {
    VkUser {
        last_seen: time.map(|time| LastSeen {
            time,
            platform: None,
        }),
        ..vk_user(id, 1, Some(1))
    }
}

pub fn photo(owner_id: i64, photo_id: i64, likes: i64) -> PhotoRef {
    PhotoRef {
        owner_id,
        photo_id,
        url: format!("https://example.com/{owner_id}_{photo_id}.jpg"),
        likes,
    }
}

pub fn text_message(from_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        from_id,
        peer_id: from_id,
        text: text.to_string(),
        lang_id: Some(3),
    }
}

// FAKE SOCIAL API

#[derive(Default)]
pub struct FakeSocialApiState {
    pub profiles: HashMap<i64, VkUser>,
    /// Search results keyed by offset
    pub pages: HashMap<u32, Vec<VkUser>>,
    pub photos: HashMap<i64, Vec<PhotoRef>>,
    pub fail_search: bool,
    pub fail_profile: bool,
    pub queries: Vec<SearchQuery>,
}

#[derive(Default, Clone)]
pub struct FakeSocialApi {
    pub state: Arc<Mutex<FakeSocialApiState>>,
}

impl FakeSocialApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&self, user: VkUser) {
        self.state.lock().unwrap().profiles.insert(user.id, user);
    }

    pub fn set_page(&self, offset: u32, users: Vec<VkUser>) {
        self.state.lock().unwrap().pages.insert(offset, users);
    }

    pub fn set_photos(&self, owner_id: i64, photos: Vec<PhotoRef>) {
        self.state.lock().unwrap().photos.insert(owner_id, photos);
    }

    pub fn fail_search(&self, fail: bool) {
        self.state.lock().unwrap().fail_search = fail;
    }

    pub fn fail_profile(&self, fail: bool) {
        self.state.lock().unwrap().fail_profile = fail;
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn offsets(&self) -> Vec<u32> {
        self.queries().iter().map(|q| q.offset).collect()
    }
}

#[async_trait]
impl SocialApi for FakeSocialApi {
    async fn get_profile(&self, user_id: i64) -> Result<Option<VkUser>, VkError> {
        let state = self.state.lock().unwrap();
        if state.fail_profile {
            return Err(VkError::UnexpectedResponse("profile unavailable".to_string()));
        }
        Ok(state.profiles.get(&user_id).cloned())
    }

    async fn best_photos(&self, owner_id: i64, limit: usize) -> Result<Vec<PhotoRef>, VkError> {
        let state = self.state.lock().unwrap();
        let photos = state.photos.get(&owner_id).cloned().unwrap_or_default();
        Ok(photos.into_iter().take(limit).collect())
    }

    async fn search_users(&self, query: &SearchQuery) -> Result<Vec<VkUser>, VkError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());
        if state.fail_search {
            return Err(VkError::Api {
                code: 6,
                message: "Too many requests per second".to_string(),
            });
        }
        Ok(state.pages.get(&query.offset).cloned().unwrap_or_default())
    }
}

// MEMORY REPOSITORY

#[derive(Default)]
pub struct MemoryRepositoryState {
    pub users: Vec<User>,
    pub matches: Vec<MatchRecord>,
    pub favorites: Vec<ListEntry>,
    pub blacklist: Vec<ListEntry>,
    pub fail_exclusions: bool,
    next_id: i32,
}

impl MemoryRepositoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn list(&self, kind: ListKind) -> &Vec<ListEntry> {
        match kind {
            ListKind::Favorites => &self.favorites,
            ListKind::Blacklist => &self.blacklist,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<ListEntry> {
        match kind {
            ListKind::Favorites => &mut self.favorites,
            ListKind::Blacklist => &mut self.blacklist,
        }
    }

    fn upsert_match(&mut self, user_id: i32, candidate: &Candidate) {
        let photos = candidate.attachments();
        let existing = self
            .matches
            .iter()
            .position(|m| m.user_id == user_id && m.vk_id == candidate.vk_id);
        let id = match existing {
            Some(index) => self.matches.remove(index).id,
            None => self.next_id(),
        };
        self.matches.push(MatchRecord {
            id,
            user_id,
            vk_id: candidate.vk_id,
            first_name: candidate.first_name.clone(),
            last_name: candidate.last_name.clone(),
            profile_link: candidate.profile_url.clone(),
            photo_1: photos.first().cloned(),
            photo_2: photos.get(1).cloned(),
            photo_3: photos.get(2).cloned(),
        });
        self.matches.sort_by_key(|m| m.id);
    }
}

/// Repository with the same observable behavior as the Postgres one
#[derive(Default, Clone)]
pub struct MemoryRepository {
    pub state: Arc<Mutex<MemoryRepositoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_exclusions(&self, fail: bool) {
        self.state.lock().unwrap().fail_exclusions = fail;
    }

    pub fn list_ids(&self, kind: ListKind) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .list(kind)
            .iter()
            .map(|e| e.vk_id)
            .collect()
    }

    pub fn match_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .matches
            .iter()
            .map(|m| m.vk_id)
            .collect()
    }

    pub fn user(&self, vk_id: i64) -> Option<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.vk_id == vk_id)
            .cloned()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_user(&self, user: &NewUser) -> Result<User> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        if let Some(stored) = state.users.iter_mut().find(|u| u.vk_id == user.vk_id) {
            stored.first_name = user.first_name.clone();
            stored.last_name = user.last_name.clone();
            stored.sex = user.sex;
            stored.city_id = user.city_id;
            stored.city_title = user.city_title.clone();
            stored.age = user.age;
            stored.updated_at = now;
            return Ok(stored.clone());
        }
        let id = state.next_id();
        let stored = User {
            id,
            vk_id: user.vk_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            sex: user.sex,
            city_id: user.city_id,
            city_title: user.city_title.clone(),
            age: user.age,
            created_at: now,
            updated_at: now,
        };
        state.users.push(stored.clone());
        Ok(stored)
    }

    async fn get_user_by_vk_id(&self, vk_id: i64) -> Result<Option<User>> {
        Ok(self.user(vk_id))
    }

    async fn excluded_ids(&self, user_id: i32) -> Result<ExcludedIds> {
        let state = self.state.lock().unwrap();
        if state.fail_exclusions {
            return Err(anyhow!("connection reset"));
        }
        let ids = |kind: ListKind| -> HashSet<i64> {
            state
                .list(kind)
                .iter()
                .filter(|e| e.user_id == user_id)
                .map(|e| e.vk_id)
                .collect()
        };
        Ok(ExcludedIds {
            favorites: ids(ListKind::Favorites),
            blocked: ids(ListKind::Blacklist),
        })
    }

    async fn replace_matches(&self, user_id: i32, candidates: &[Candidate]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.matches.retain(|m| m.user_id != user_id);
        for candidate in candidates {
            state.upsert_match(user_id, candidate);
        }
        Ok(())
    }

    async fn upsert_matches(&self, user_id: i32, candidates: &[Candidate]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for candidate in candidates {
            state.upsert_match(user_id, candidate);
        }
        Ok(())
    }

    async fn next_match(&self, user_id: i32, after_id: i32) -> Result<Option<MatchRecord>> {
        let state = self.state.lock().unwrap();
        let listed = |kind: ListKind, vk_id: i64| {
            state
                .list(kind)
                .iter()
                .any(|e| e.user_id == user_id && e.vk_id == vk_id)
        };
        Ok(state
            .matches
            .iter()
            .filter(|m| m.user_id == user_id && m.id > after_id)
            .find(|m| !listed(ListKind::Favorites, m.vk_id) && !listed(ListKind::Blacklist, m.vk_id))
            .cloned())
    }

    async fn get_match(&self, user_id: i32, vk_id: i64) -> Result<Option<MatchRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .matches
            .iter()
            .find(|m| m.user_id == user_id && m.vk_id == vk_id)
            .cloned())
    }

    async fn add_to_list(&self, kind: ListKind, user_id: i32, record: &MatchRecord) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state
            .list(kind)
            .iter()
            .any(|e| e.user_id == user_id && e.vk_id == record.vk_id)
        {
            return Ok(false);
        }
        state
            .list_mut(kind.opposite())
            .retain(|e| !(e.user_id == user_id && e.vk_id == record.vk_id));
        let id = state.next_id();
        state.list_mut(kind).push(ListEntry {
            id,
            user_id,
            vk_id: record.vk_id,
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            profile_link: record.profile_link.clone(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove_from_list(&self, kind: ListKind, user_id: i32, vk_id: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let list = state.list_mut(kind);
        let before = list.len();
        list.retain(|e| !(e.user_id == user_id && e.vk_id == vk_id));
        Ok(list.len() < before)
    }

    async fn list_entries(&self, kind: ListKind, user_id: i32) -> Result<Vec<ListEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .list(kind)
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

// RECORDING MESSENGER

#[derive(Default, Clone)]
pub struct RecordingMessenger {
    pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }

    pub fn last(&self) -> OutgoingMessage {
        self.messages().pop().expect("no message was sent")
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), VkError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

// WIRING

pub fn searcher(api: &FakeSocialApi, repository: &MemoryRepository) -> Searcher {
    Searcher::new(
        Arc::new(api.clone()),
        Arc::new(repository.clone()),
        SearchConfig::default(),
    )
}

pub struct TestBot {
    pub api: FakeSocialApi,
    pub repository: MemoryRepository,
    pub messenger: RecordingMessenger,
    pub dispatcher: Dispatcher,
}

impl TestBot {
    pub fn new() -> Self {
        let api = FakeSocialApi::new();
        let repository = MemoryRepository::new();
        let messenger = RecordingMessenger::new();
        let dispatcher = Dispatcher::new(
            Arc::new(api.clone()),
            Arc::new(repository.clone()),
            Arc::new(messenger.clone()),
            Arc::new(InMemSessionStore::new()),
            SearchConfig::default(),
            "en",
        );
        Self {
            api,
            repository,
            messenger,
            dispatcher,
        }
    }

    /// Send a message and return the replies it produced
    pub async fn send(&mut self, from_id: i64, text: &str) -> Vec<OutgoingMessage> {
        self.messenger.clear();
        self.dispatcher
            .handle(text_message(from_id, text))
            .await
            .expect("message handling failed");
        self.messenger.messages()
    }
}
