//! Plain-text views of a [`BoardState`]. Front ends lay these out; tests
//! assert on them directly.

use crate::view::{BoardState, Tab};

pub const APP_TITLE: &str = "1RXM";
pub const MONTH_PLACEHOLDER: &str = "No joke of the month yet";
pub const COMMUNITY_PLACEHOLDER: &str = "No jokes yet";
pub const DRAFT_PLACEHOLDER: &str = "Write your joke here...";
pub const SIGNED_OUT_HINT: &str = "Not signed in";

/// Greeting for the signed-in user, or a hint to sign in.
pub fn header(state: &BoardState) -> String {
    match &state.user {
        Some(user) => format!("Hello, {}", user.email.as_deref().unwrap_or(&user.id)),
        None => SIGNED_OUT_HINT.to_string(),
    }
}

pub fn month_view(state: &BoardState) -> String {
    state
        .joke_of_the_month()
        .map(|joke| joke.content.clone())
        .unwrap_or_else(|| MONTH_PLACEHOLDER.to_string())
}

/// One `"<content> — <username>"` line per community joke.
pub fn community_lines(state: &BoardState) -> Vec<String> {
    let jokes = state.community_jokes();
    if jokes.is_empty() {
        return vec![COMMUNITY_PLACEHOLDER.to_string()];
    }
    jokes.iter().map(|joke| joke.to_string()).collect()
}

/// The draft editor, only when someone is signed in.
pub fn publish_view(state: &BoardState) -> Option<String> {
    if !state.is_signed_in() {
        return None;
    }
    if state.draft.is_empty() {
        Some(DRAFT_PLACEHOLDER.to_string())
    } else {
        Some(state.draft.clone())
    }
}

/// Numbered titles of the selectable tabs, matching the number keys.
pub fn tab_bar(state: &BoardState) -> Vec<String> {
    state
        .available_tabs()
        .into_iter()
        .enumerate()
        .map(|(i, tab)| format!("{} {}", i + 1, tab.title()))
        .collect()
}

/// The body of the current tab as lines.
pub fn body(state: &BoardState) -> Vec<String> {
    match state.tab {
        Tab::Month => vec![month_view(state)],
        Tab::Community => community_lines(state),
        Tab::Publish => publish_view(state).into_iter().collect(),
        Tab::Login => vec![
            format!("Email: {}", state.login_form.email),
            format!("Password: {}", mask(&state.login_form.password)),
        ],
        Tab::Register => vec![
            format!("Email: {}", state.register_form.email),
            format!("Password: {}", mask(&state.register_form.password)),
            format!("Username: {}", state.register_form.username),
        ],
    }
}

pub fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::{Joke, User};

    fn joke(id: &str, content: &str, month: bool, username: &str) -> Joke {
        Joke {
            id: id.into(),
            content: content.into(),
            created_at: String::new(),
            user_id: None,
            is_joke_of_the_month: month,
            username: username.into(),
        }
    }

    #[test]
    fn empty_board_shows_placeholders() {
        let state = BoardState::new();
        assert_eq!(month_view(&state), MONTH_PLACEHOLDER);
        assert_eq!(community_lines(&state), vec![COMMUNITY_PLACEHOLDER]);
        assert_eq!(header(&state), SIGNED_OUT_HINT);
        assert!(publish_view(&state).is_none());
    }

    #[test]
    fn month_and_community_are_split() {
        let mut state = BoardState::new();
        let generation = state.begin_feed_load();
        state.feed_loaded(generation, vec![
            joke("1", "A", true, "Anon"),
            joke("2", "B", false, "Bob"),
        ]);

        assert_eq!(month_view(&state), "A");
        assert_eq!(community_lines(&state), vec!["B — Bob"]);
    }

    #[test]
    fn header_greets_by_email() {
        let mut state = BoardState::new();
        state.session_changed(Some(User {
            id: "u1".into(),
            email: Some("a@b.c".into()),
        }));
        assert_eq!(header(&state), "Hello, a@b.c");
        assert_eq!(publish_view(&state).as_deref(), Some(DRAFT_PLACEHOLDER));
    }

    #[test]
    fn tab_bar_numbers_available_tabs() {
        let mut state = BoardState::new();
        let bar = tab_bar(&state);
        assert_eq!(bar[0], "1 Joke of the Month");
        assert_eq!(bar[3], "4 Register");
        assert_eq!(bar.len(), 4);

        state.session_changed(Some(User {
            id: "u1".into(),
            email: None,
        }));
        assert_eq!(tab_bar(&state), vec![
            "1 Joke of the Month".to_string(),
            "2 Community".to_string(),
            "3 Submit a Joke".to_string(),
        ]);
    }

    #[test]
    fn passwords_are_masked() {
        let mut state = BoardState::new();
        state.select_tab(Tab::Login);
        state.login_form.password = "hunter2".into();
        assert_eq!(body(&state)[1], "Password: *******");
    }
}
