//! UI Builder module for creating keyboards and formatting messages

use crate::db::{ListEntry, ListKind, MatchRecord};
use crate::localization::t_lang;
use crate::vk::{ButtonColor, Keyboard};

/// Keyboard sent with the greeting
pub fn start_keyboard(language: &str) -> Keyboard {
    Keyboard::new(false, false)
        .add_button(t_lang("btn-start-search", language), ButtonColor::Positive)
        .add_button(t_lang("btn-help", language), ButtonColor::Secondary)
}

/// Keyboard sent under a candidate card
pub fn card_keyboard(language: &str) -> Keyboard {
    Keyboard::new(false, false)
        .add_button(t_lang("btn-like", language), ButtonColor::Positive)
        .add_button(t_lang("btn-skip", language), ButtonColor::Secondary)
        .add_button(t_lang("btn-block", language), ButtonColor::Negative)
        .add_line()
        .add_button(t_lang("btn-favorites", language), ButtonColor::Primary)
        .add_button(t_lang("btn-blacklist", language), ButtonColor::Primary)
}

/// Keyboard sent after a card was sorted into a list
pub fn continue_keyboard(language: &str) -> Keyboard {
    Keyboard::new(false, false)
        .add_button(t_lang("btn-continue", language), ButtonColor::Positive)
        .add_line()
        .add_button(t_lang("btn-favorites", language), ButtonColor::Primary)
        .add_button(t_lang("btn-blacklist", language), ButtonColor::Primary)
}

/// Keyboard sent with a favorites or blacklist listing
pub fn list_keyboard(kind: ListKind, language: &str) -> Keyboard {
    let remove_key = match kind {
        ListKind::Favorites => "btn-remove-favorites",
        ListKind::Blacklist => "btn-remove-blacklist",
    };
    Keyboard::new(false, false)
        .add_button(t_lang(remove_key, language), ButtonColor::Negative)
        .add_line()
        .add_button(t_lang("btn-continue", language), ButtonColor::Positive)
}

/// Every keyboard the bot sends
pub fn all_keyboards(language: &str) -> Vec<Keyboard> {
    vec![
        start_keyboard(language),
        card_keyboard(language),
        continue_keyboard(language),
        list_keyboard(ListKind::Favorites, language),
        list_keyboard(ListKind::Blacklist, language),
    ]
}

/// Candidate card text: name on the first line, profile link on the second
pub fn format_card(record: &MatchRecord) -> String {
    format!("{}\n{}", record.full_name(), record.profile_link)
}

/// Numbered listing under a localized title
pub fn format_list(kind: ListKind, entries: &[ListEntry], language: &str) -> String {
    let (title_key, empty_key) = match kind {
        ListKind::Favorites => ("favorites-title", "favorites-empty"),
        ListKind::Blacklist => ("blacklist-title", "blacklist-empty"),
    };
    if entries.is_empty() {
        return t_lang(empty_key, language);
    }

    let mut result = t_lang(title_key, language);
    for (i, entry) in entries.iter().enumerate() {
        result.push_str(&format!(
            "\n{}. {} {} — {}",
            i + 1,
            entry.first_name,
            entry.last_name,
            entry.profile_link
        ));
    }
    result
}
