//! Event loop and shared state of the bot.
//!
//! Messages are handled strictly one at a time: the long-poll batch is drained
//! before the next poll, and each message is fully processed before the next.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::SearchConfig;
use crate::dialogue::SessionStore;
use crate::localization::{detect_language, t_lang};
use crate::repository::Repository;
use crate::searcher::{Paginator, Searcher};
use crate::vk::{IncomingMessage, Keyboard, LongPollClient, Messenger, OutgoingMessage, SocialApi};

use super::commands::parse_command;

/// Pause before polling again after a transport failure
pub const RETRY_PAUSE: Duration = Duration::from_secs(3);

/// Who a message came from and how to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub vk_id: i64,
    pub peer_id: i64,
    pub language: String,
}

impl Conversation {
    pub fn from_message(message: &IncomingMessage, default_language: &str) -> Self {
        let language = match message.lang_id {
            Some(_) => detect_language(message.lang_id).to_string(),
            None => default_language.to_string(),
        };
        Self {
            vk_id: message.from_id,
            peer_id: message.peer_id,
            language,
        }
    }
}

pub struct Dispatcher {
    pub(crate) api: Arc<dyn SocialApi>,
    pub(crate) repository: Arc<dyn Repository>,
    pub(crate) messenger: Arc<dyn Messenger>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) searcher: Searcher,
    /// Search offsets per viewer, kept only for the life of the process
    pub(crate) paginators: HashMap<i64, Paginator>,
    pub(crate) page_step: u32,
    pub(crate) default_language: String,
}

impl Dispatcher {
    pub fn new(
        api: Arc<dyn SocialApi>,
        repository: Arc<dyn Repository>,
        messenger: Arc<dyn Messenger>,
        sessions: Arc<dyn SessionStore>,
        search: SearchConfig,
        default_language: impl Into<String>,
    ) -> Self {
        let page_step = search.page_step;
        Self {
            searcher: Searcher::new(Arc::clone(&api), Arc::clone(&repository), search),
            api,
            repository,
            messenger,
            sessions,
            paginators: HashMap::new(),
            page_step,
            default_language: default_language.into(),
        }
    }

    /// Current search offset of a viewer, if a search was started
    pub fn search_offset(&self, vk_id: i64) -> Option<u32> {
        self.paginators.get(&vk_id).map(Paginator::offset)
    }

    pub(crate) async fn reply(
        &self,
        chat: &Conversation,
        text: String,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        let mut message = OutgoingMessage::text(chat.peer_id, text);
        if let Some(keyboard) = keyboard {
            message = message.with_keyboard(keyboard);
        }
        self.messenger.send_message(message).await?;
        Ok(())
    }

    /// Handle one incoming message, persisting the dialogue session around it
    pub async fn handle(&mut self, message: IncomingMessage) -> Result<()> {
        let chat = Conversation::from_message(&message, &self.default_language);
        let command = parse_command(&message.text);
        info!(user_id = chat.vk_id, command = ?command, "Handling message");

        let mut session = self.sessions.load(chat.vk_id).await?;
        self.apply_command(&chat, &mut session, command).await?;
        self.sessions.save(chat.vk_id, &session).await?;
        Ok(())
    }

    /// Handle a message, answering with an apology when handling fails
    pub async fn process(&mut self, message: IncomingMessage) {
        let chat = Conversation::from_message(&message, &self.default_language);
        if let Err(e) = self.handle(message).await {
            error!(user_id = chat.vk_id, error = %e, "Failed to handle message");
            let apology = t_lang("internal-error", &chat.language);
            if let Err(e) = self.reply(&chat, apology, None).await {
                warn!(user_id = chat.vk_id, error = %e, "Failed to send error reply");
            }
        }
    }

    /// Handle messages until Ctrl+C
    pub async fn run(self, poller: LongPollClient) -> Result<()> {
        self.run_until(poller, tokio::signal::ctrl_c()).await
    }

    /// Handle messages until `shutdown` resolves
    ///
    /// `shutdown` lives for the whole loop, so a request made while a batch
    /// is being handled stops the loop before the next poll.
    pub async fn run_until<F: Future>(
        mut self,
        mut poller: LongPollClient,
        shutdown: F,
    ) -> Result<()> {
        info!("Dispatcher started, waiting for messages");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping dispatcher");
                    break;
                }
                batch = poller.poll() => match batch {
                    Ok(messages) => {
                        debug!(count = messages.len(), "Processing long poll batch");
                        for message in messages {
                            self.process(message).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Long poll failed, retrying");
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                },
            }
        }
        Ok(())
    }
}
