//! Text command recognition.
//!
//! Commands are matched case-insensitively after trimming. Every keyboard
//! label in every loaded language is also a command alias.

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Hello,
    Goodbye,
    Next,
    AddToFavorites,
    AddToBlacklist,
    ShowFavorites,
    ShowBlacklist,
    RemoveFromFavorites,
    RemoveFromBlacklist,
    /// `https://vk.com/id<digits>`
    ProfileLink(i64),
    Unknown,
}

impl Command {
    /// Commands that belong to no deletion flow and therefore end one
    pub fn leaves_deletion_flow(self) -> bool {
        !matches!(
            self,
            Command::ProfileLink(_)
                | Command::Unknown
                | Command::RemoveFromFavorites
                | Command::RemoveFromBlacklist
        )
    }
}

lazy_static! {
    static ref PROFILE_LINK: Regex = Regex::new(r"^https?://(?:m\.|www\.)?vk\.com/id(\d+)/?$")
        .expect("Profile link pattern should be valid");
}

const ALIASES: &[(&str, Command)] = &[
    ("начать", Command::Start),
    ("старт", Command::Start),
    ("запуск", Command::Start),
    ("start", Command::Start),
    ("/start", Command::Start),
    ("помощь", Command::Help),
    ("help", Command::Help),
    ("/help", Command::Help),
    ("привет", Command::Hello),
    ("hello", Command::Hello),
    ("hi", Command::Hello),
    ("пока", Command::Goodbye),
    ("goodbye", Command::Goodbye),
    ("bye", Command::Goodbye),
    ("next", Command::Next),
    ("skip", Command::Next),
    ("show", Command::Next),
    ("показать", Command::Next),
    ("следующий", Command::Next),
    ("следующие", Command::Next),
    ("дальше", Command::Next),
    ("👎", Command::Next),
    ("начать поиск", Command::Next),
    ("продолжить поиск", Command::Next),
    ("start search", Command::Next),
    ("continue search", Command::Next),
    ("👍", Command::AddToFavorites),
    ("like", Command::AddToFavorites),
    ("в избранное", Command::AddToFavorites),
    ("❌", Command::AddToBlacklist),
    ("block", Command::AddToBlacklist),
    ("в черный список", Command::AddToBlacklist),
    ("список избранных", Command::ShowFavorites),
    ("избранное", Command::ShowFavorites),
    ("favorites", Command::ShowFavorites),
    ("favorites list", Command::ShowFavorites),
    ("черный список", Command::ShowBlacklist),
    ("blacklist", Command::ShowBlacklist),
    ("убрать из избранного", Command::RemoveFromFavorites),
    ("remove from favorites", Command::RemoveFromFavorites),
    ("убрать из черного списка", Command::RemoveFromBlacklist),
    ("remove from blacklist", Command::RemoveFromBlacklist),
];

/// Recognise an incoming message
pub fn parse_command(text: &str) -> Command {
    let normalized = text.trim().to_lowercase();

    if let Some(captures) = PROFILE_LINK.captures(&normalized) {
        return captures[1]
            .parse()
            .map(Command::ProfileLink)
            .unwrap_or(Command::Unknown);
    }

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, command)| *command)
        .unwrap_or(Command::Unknown)
}
