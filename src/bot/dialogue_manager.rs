//! Dialogue Manager module for state transitions and the deletion flow

use anyhow::Result;
use tracing::{debug, info};

use crate::db::ListKind;
use crate::dialogue::{DialogueState, Session};
use crate::localization::{t_args_lang, t_lang};

use super::commands::Command;
use super::dispatcher::{Conversation, Dispatcher};
use super::ui_builder::continue_keyboard;

/// List targeted by a pending deletion, if any
pub fn pending_deletion(state: DialogueState) -> Option<ListKind> {
    match state {
        DialogueState::Idle => None,
        DialogueState::AwaitingFavoritesDeletion => Some(ListKind::Favorites),
        DialogueState::AwaitingBlacklistDeletion => Some(ListKind::Blacklist),
    }
}

impl Dispatcher {
    /// Route a command according to the dialogue state
    pub(crate) async fn apply_command(
        &mut self,
        chat: &Conversation,
        session: &mut Session,
        command: Command,
    ) -> Result<()> {
        match (pending_deletion(session.state), command) {
            (Some(kind), Command::ProfileLink(vk_id)) => {
                self.remove_from_list(chat, kind, vk_id).await?;
                session.state = DialogueState::Idle;
                Ok(())
            }
            (_, Command::Unknown) | (None, Command::ProfileLink(_)) => {
                debug!(user_id = chat.vk_id, state = ?session.state, "Unrecognised message");
                self.reply(chat, t_lang("unknown-command", &chat.language), None)
                    .await
            }
            (_, command) => {
                if command.leaves_deletion_flow() {
                    session.state = DialogueState::Idle;
                }
                self.handle_command(chat, session, command).await
            }
        }
    }

    async fn remove_from_list(&self, chat: &Conversation, kind: ListKind, vk_id: i64) -> Result<()> {
        let removed = match self.repository.get_user_by_vk_id(chat.vk_id).await? {
            Some(user) => self.repository.remove_from_list(kind, user.id, vk_id).await?,
            None => false,
        };

        let key = match (kind, removed) {
            (ListKind::Favorites, true) => "removed-from-favorites",
            (ListKind::Favorites, false) => "not-in-favorites",
            (ListKind::Blacklist, true) => "removed-from-blacklist",
            (ListKind::Blacklist, false) => "not-in-blacklist",
        };
        info!(user_id = chat.vk_id, target = vk_id, list = kind.table(), removed, "Deletion requested");

        let id = vk_id.to_string();
        self.reply(
            chat,
            t_args_lang(key, &[("id", id.as_str())], &chat.language),
            Some(continue_keyboard(&chat.language)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_deletion() {
        assert_eq!(pending_deletion(DialogueState::Idle), None);
        assert_eq!(
            pending_deletion(DialogueState::AwaitingFavoritesDeletion),
            Some(ListKind::Favorites)
        );
        assert_eq!(
            pending_deletion(DialogueState::AwaitingBlacklistDeletion),
            Some(ListKind::Blacklist)
        );
    }
}
