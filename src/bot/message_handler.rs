//! Message Handler module for the review commands

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SEX;
use crate::db::{ListKind, NewUser, User};
use crate::dialogue::{DialogueState, Session};
use crate::localization::t_lang;
use crate::searcher::Paginator;
use crate::vk::OutgoingMessage;

use super::commands::Command;
use super::dispatcher::{Conversation, Dispatcher};
use super::ui_builder::{card_keyboard, continue_keyboard, format_card, format_list, list_keyboard, start_keyboard};

impl Dispatcher {
    /// Run a command that is not part of a deletion flow
    pub(crate) async fn handle_command(
        &mut self,
        chat: &Conversation,
        session: &mut Session,
        command: Command,
    ) -> Result<()> {
        let language = chat.language.as_str();
        match command {
            Command::Start => self.handle_start(chat, session).await,
            Command::Help => {
                let text = ["help-search", "help-card", "help-buttons", "help-lists"]
                    .iter()
                    .map(|key| t_lang(key, language))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                self.reply(chat, text, Some(start_keyboard(language))).await
            }
            Command::Hello => {
                self.reply(chat, t_lang("hello", language), Some(start_keyboard(language)))
                    .await
            }
            Command::Goodbye => self.reply(chat, t_lang("goodbye", language), None).await,
            Command::Next => self.show_next_match(chat, session).await,
            Command::AddToFavorites => {
                self.add_current_to_list(chat, session, ListKind::Favorites)
                    .await
            }
            Command::AddToBlacklist => {
                self.add_current_to_list(chat, session, ListKind::Blacklist)
                    .await
            }
            Command::ShowFavorites => self.show_list(chat, ListKind::Favorites).await,
            Command::ShowBlacklist => self.show_list(chat, ListKind::Blacklist).await,
            Command::RemoveFromFavorites => {
                session.state = DialogueState::AwaitingFavoritesDeletion;
                self.reply(chat, t_lang("del-favorites-instruction", language), None)
                    .await
            }
            Command::RemoveFromBlacklist => {
                session.state = DialogueState::AwaitingBlacklistDeletion;
                self.reply(chat, t_lang("del-blacklist-instruction", language), None)
                    .await
            }
            Command::ProfileLink(_) | Command::Unknown => {
                self.reply(chat, t_lang("unknown-command", language), None)
                    .await
            }
        }
    }

    async fn handle_start(&mut self, chat: &Conversation, session: &mut Session) -> Result<()> {
        let language = chat.language.as_str();
        self.reply(chat, t_lang("start", language), Some(start_keyboard(language)))
            .await?;
        self.begin_search(chat, session).await?;
        Ok(())
    }

    /// Register the viewer, run the first search page and store its results
    async fn begin_search(&mut self, chat: &Conversation, session: &mut Session) -> Result<User> {
        let user = self.register_viewer(chat).await?;

        let step = self.page_step;
        self.paginators
            .entry(chat.vk_id)
            .or_insert_with(|| Paginator::new(step))
            .reset();
        let page = self.searcher.search(chat.vk_id, 0).await;

        self.repository.replace_matches(user.id, &page.candidates).await?;
        session.restart_review();

        info!(
            user_id = chat.vk_id,
            fetched = page.fetched,
            candidates = page.candidates.len(),
            "Search started"
        );
        Ok(user)
    }

    /// Store the viewer's current profile
    ///
    /// When the profile cannot be fetched the stored one is kept; a viewer
    /// never seen before is stored with default search settings.
    async fn register_viewer(&self, chat: &Conversation) -> Result<User> {
        let profile = match self.api.get_profile(chat.vk_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = chat.vk_id, error = %e, "Failed to fetch viewer profile");
                None
            }
        };

        if let Some(profile) = profile {
            debug!(user_id = chat.vk_id, name = %profile.full_name(), "Viewer profile fetched");
            let user = NewUser::from_profile(&profile, Utc::now().date_naive());
            return self.repository.upsert_user(&user).await;
        }

        if let Some(stored) = self.repository.get_user_by_vk_id(chat.vk_id).await? {
            return Ok(stored);
        }

        self.reply(chat, t_lang("profile-unavailable", &chat.language), None)
            .await?;
        let placeholder = NewUser {
            vk_id: chat.vk_id,
            first_name: String::new(),
            last_name: String::new(),
            sex: DEFAULT_SEX,
            city_id: None,
            city_title: None,
            age: None,
        };
        self.repository.upsert_user(&placeholder).await
    }

    async fn show_next_match(&mut self, chat: &Conversation, session: &mut Session) -> Result<()> {
        let language = chat.language.as_str();

        let stored = self.repository.get_user_by_vk_id(chat.vk_id).await?;
        let user = match stored {
            Some(user) => user,
            None => self.begin_search(chat, session).await?,
        };

        let mut record = self.repository.next_match(user.id, session.cursor).await?;

        // Pages may be filtered down to nothing; keep paging until VK runs dry
        let step = self.page_step;
        while record.is_none() {
            let paginator = self
                .paginators
                .entry(chat.vk_id)
                .or_insert_with(|| Paginator::new(step));
            let page = paginator.next(&self.searcher, chat.vk_id).await;
            debug!(
                user_id = chat.vk_id,
                offset = paginator.offset(),
                fetched = page.fetched,
                kept = page.candidates.len(),
                "Fetched next search page"
            );
            if page.is_exhausted() {
                break;
            }
            if !page.candidates.is_empty() {
                self.repository.upsert_matches(user.id, &page.candidates).await?;
                record = self.repository.next_match(user.id, session.cursor).await?;
            }
        }

        let Some(record) = record else {
            session.current_match = None;
            return self
                .reply(chat, t_lang("no-more-matches", language), Some(start_keyboard(language)))
                .await;
        };

        session.cursor = record.id;
        session.current_match = Some(record.vk_id);

        let message = OutgoingMessage::text(chat.peer_id, format_card(&record))
            .with_keyboard(card_keyboard(language))
            .with_attachments(record.attachments());
        self.messenger.send_message(message).await?;
        Ok(())
    }

    async fn add_current_to_list(
        &self,
        chat: &Conversation,
        session: &Session,
        kind: ListKind,
    ) -> Result<()> {
        let language = chat.language.as_str();

        let record = match (session.current_match, self.repository.get_user_by_vk_id(chat.vk_id).await?) {
            (Some(vk_id), Some(user)) => self.repository.get_match(user.id, vk_id).await?,
            _ => None,
        };
        let Some(record) = record else {
            return self
                .reply(chat, t_lang("nothing-selected", language), Some(continue_keyboard(language)))
                .await;
        };

        let added = self
            .repository
            .add_to_list(kind, record.user_id, &record)
            .await?;
        let key = match (kind, added) {
            (ListKind::Favorites, true) => "added-to-favorites",
            (ListKind::Favorites, false) => "already-in-favorites",
            (ListKind::Blacklist, true) => "added-to-blacklist",
            (ListKind::Blacklist, false) => "already-in-blacklist",
        };
        info!(user_id = chat.vk_id, candidate = record.vk_id, list = kind.table(), added, "List updated");
        self.reply(chat, t_lang(key, language), Some(continue_keyboard(language)))
            .await
    }

    async fn show_list(&self, chat: &Conversation, kind: ListKind) -> Result<()> {
        let language = chat.language.as_str();
        let entries = match self.repository.get_user_by_vk_id(chat.vk_id).await? {
            Some(user) => self.repository.list_entries(kind, user.id).await?,
            None => Vec::new(),
        };
        let keyboard = if entries.is_empty() {
            continue_keyboard(language)
        } else {
            list_keyboard(kind, language)
        };
        self.reply(chat, format_list(kind, &entries, language), Some(keyboard))
            .await
    }
}
