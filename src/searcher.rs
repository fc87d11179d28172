//! # Candidate Search
//!
//! [`Searcher`] runs one page of `users.search` for a viewer and turns it into
//! review-ready [`Candidate`]s:
//!
//! 1. city and gender come from the viewer's stored profile
//!    (city 1 and gender 1 when unknown), the searched gender is the opposite
//! 2. the activity filter drops stale profiles
//! 3. the exclusion filter drops favorites and blacklisted identities
//! 4. each survivor gets its best photos and a profile link
//!
//! [`Paginator`] keeps the offset of a viewer's current search.
//!
//! A [`SearchPage`] also reports how many profiles VK returned before
//! filtering, so callers can tell a filtered-out page from the end of the
//! results.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{SearchConfig, DEFAULT_CITY_ID, DEFAULT_SEX};
use crate::filter::{exclude_known, retain_active, ExcludedIds};
use crate::repository::Repository;
use crate::vk::{profile_url, PhotoRef, SearchQuery, SocialApi, VkUser};

/// An enriched search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub vk_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub profile_url: String,
    pub photos: Vec<PhotoRef>,
}

impl Candidate {
    pub fn new(user: &VkUser, photos: Vec<PhotoRef>) -> Self {
        Self {
            vk_id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profile_url: profile_url(user.id),
            photos,
        }
    }

    /// `photo<owner>_<id>` references for `messages.send`
    pub fn attachments(&self) -> Vec<String> {
        self.photos.iter().map(PhotoRef::attachment).collect()
    }
}

/// Candidates of one search page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub candidates: Vec<Candidate>,
    /// Profiles returned by `users.search` before filtering, 0 when the search failed
    pub fetched: usize,
}

impl SearchPage {
    /// No further pages can yield candidates
    pub fn is_exhausted(&self) -> bool {
        self.fetched == 0
    }
}

/// Gender to search for, given the viewer's own
pub fn opposite_sex(viewer_sex: i16) -> i16 {
    if viewer_sex == 1 {
        2
    } else {
        1
    }
}

pub struct Searcher {
    api: Arc<dyn SocialApi>,
    repository: Arc<dyn Repository>,
    config: SearchConfig,
}

impl Searcher {
    pub fn new(
        api: Arc<dyn SocialApi>,
        repository: Arc<dyn Repository>,
        config: SearchConfig,
    ) -> Self {
        Self {
            api,
            repository,
            config,
        }
    }

    /// One page of candidates for a viewer, evaluated against the current time
    pub async fn search(&self, viewer_vk_id: i64, offset: u32) -> SearchPage {
        self.search_at(viewer_vk_id, offset, Utc::now().timestamp())
            .await
    }

    /// One page of candidates for a viewer, with `now` as the activity reference
    ///
    /// Never fails: search errors and exclusion-list errors yield an empty,
    /// exhausted page.
    pub async fn search_at(&self, viewer_vk_id: i64, offset: u32, now: i64) -> SearchPage {
        let viewer = match self.repository.get_user_by_vk_id(viewer_vk_id).await {
            Ok(viewer) => viewer,
            Err(e) => {
                warn!(viewer = viewer_vk_id, error = %e, "Failed to load viewer profile");
                return SearchPage::default();
            }
        };

        let (city_id, sex) = viewer
            .as_ref()
            .map(|user| (user.city_id.unwrap_or(DEFAULT_CITY_ID), user.sex))
            .unwrap_or((DEFAULT_CITY_ID, DEFAULT_SEX));

        let query = SearchQuery {
            city_id,
            sex: opposite_sex(sex),
            age_from: self.config.age_from,
            age_to: self.config.age_to,
            status: self.config.status,
            has_photo: self.config.has_photo,
            count: self.config.page_size,
            offset,
        };

        let found = match self.api.search_users(&query).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    viewer = viewer_vk_id,
                    offset,
                    transport = e.is_transport(),
                    error = %e,
                    "Candidate search failed"
                );
                return SearchPage::default();
            }
        };
        let fetched = found.len();

        let active = retain_active(found, now, self.config.freshness_days);

        // Unregistered viewers have no lists to exclude
        let excluded = match &viewer {
            None => ExcludedIds::default(),
            Some(user) => match self.repository.excluded_ids(user.id).await {
                Ok(excluded) => excluded,
                Err(e) => {
                    warn!(viewer = viewer_vk_id, error = %e, "Failed to load exclusion lists");
                    return SearchPage::default();
                }
            },
        };
        let survivors = exclude_known(active, &excluded);

        debug!(
            viewer = viewer_vk_id,
            offset,
            fetched,
            kept = survivors.len(),
            "Search page filtered"
        );

        let mut candidates = Vec::with_capacity(survivors.len());
        for user in &survivors {
            let photos = match self.api.best_photos(user.id, self.config.max_photos).await {
                Ok(photos) => photos,
                Err(e) => {
                    debug!(candidate = user.id, error = %e, "Photos unavailable");
                    Vec::new()
                }
            };
            candidates.push(Candidate::new(user, photos));
        }
        SearchPage {
            candidates,
            fetched,
        }
    }
}

/// Offset cursor over a viewer's search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    step: u32,
    offset: u32,
}

impl Paginator {
    pub fn new(step: u32) -> Self {
        Self { step, offset: 0 }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Advance by one step and fetch the page at the new offset
    pub async fn next(&mut self, searcher: &Searcher, viewer_vk_id: i64) -> SearchPage {
        self.offset = self.offset.saturating_add(self.step);
        searcher.search(viewer_vk_id, self.offset).await
    }
}
