//! View state container.
//!
//! All local state lives in [`BoardState`] and changes only through its
//! transition methods; the month / community split is derived on every read.

use shared::types::{Joke, LoginForm, OtpForm, RegisterForm, User};

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Month,
    Community,
    Publish,
    Login,
    Register,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Month,
        Tab::Community,
        Tab::Publish,
        Tab::Login,
        Tab::Register,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Month => "Joke of the Month",
            Self::Community => "Community",
            Self::Publish => "Submit a Joke",
            Self::Login => "Sign In",
            Self::Register => "Register",
        }
    }

    pub fn requires_user(&self) -> bool {
        matches!(self, Self::Publish)
    }

    /// Auth forms make no sense once signed in.
    pub fn requires_guest(&self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// A user-visible message from the last action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// ---------------------------------------------------------------------------
// BoardState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub user: Option<User>,
    /// Resolved feed, newest first.
    pub jokes: Vec<Joke>,
    pub draft: String,
    pub tab: Tab,
    pub notice: Option<Notice>,
    pub login_form: LoginForm,
    pub register_form: RegisterForm,
    pub otp_form: OtpForm,
    /// Id of the most recently started feed load.
    feed_generation: u64,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Replace the current user. Returns `true` when the identity changed,
    /// which is what triggers a feed reload.
    pub fn session_changed(&mut self, user: Option<User>) -> bool {
        let changed = self.user.as_ref().map(|u| &u.id) != user.as_ref().map(|u| &u.id);
        self.user = user;

        if self.user.is_none() && self.tab.requires_user() {
            self.tab = Tab::Month;
        }
        if self.user.is_some() && self.tab.requires_guest() {
            self.tab = Tab::Month;
        }

        changed
    }

    /// Start a feed load and get its generation.
    pub fn begin_feed_load(&mut self) -> u64 {
        self.feed_generation += 1;
        self.feed_generation
    }

    /// Apply a finished load. Results from a load that has since been
    /// superseded are discarded; returns whether the feed was replaced.
    pub fn feed_loaded(&mut self, generation: u64, jokes: Vec<Joke>) -> bool {
        if generation != self.feed_generation {
            return false;
        }
        self.jokes = jokes;
        true
    }

    pub fn draft_edited(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Clear the draft, unless it was edited again while the insert was in
    /// flight.
    pub fn publish_succeeded(&mut self, published: &str) {
        if self.draft == published {
            self.draft.clear();
        }
        self.notice = Some(Notice::Info("Joke published".to_string()));
    }

    /// Jump to `tab`. `Publish` needs a user and the auth forms need a
    /// guest; a rejected jump leaves the tab unchanged.
    pub fn select_tab(&mut self, tab: Tab) -> bool {
        if tab.requires_user() && !self.is_signed_in() {
            return false;
        }
        if tab.requires_guest() && self.is_signed_in() {
            return false;
        }
        self.tab = tab;
        true
    }

    /// Tabs that can currently be selected, in display order.
    pub fn available_tabs(&self) -> Vec<Tab> {
        Tab::ALL
            .into_iter()
            .filter(|tab| {
                (!tab.requires_user() || self.is_signed_in())
                    && (!tab.requires_guest() || !self.is_signed_in())
            })
            .collect()
    }

    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn joke_of_the_month(&self) -> Option<&Joke> {
        joke_of_the_month(&self.jokes)
    }

    pub fn community_jokes(&self) -> Vec<&Joke> {
        community_jokes(&self.jokes)
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// First flagged joke in feed order. The feed is newest first, so with
/// several flagged jokes the most recent one wins.
pub fn joke_of_the_month(jokes: &[Joke]) -> Option<&Joke> {
    jokes.iter().find(|j| j.is_joke_of_the_month)
}

/// Every joke except the one shown as joke of the month. Extra flagged
/// jokes stay in this list.
pub fn community_jokes(jokes: &[Joke]) -> Vec<&Joke> {
    let featured = jokes.iter().position(|j| j.is_joke_of_the_month);
    jokes
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != featured)
        .map(|(_, j)| j)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joke(id: &str, month: bool) -> Joke {
        Joke {
            id: id.into(),
            content: format!("joke {}", id),
            created_at: String::new(),
            user_id: None,
            is_joke_of_the_month: month,
            username: "Anon".into(),
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            email: Some(format!("{}@example.com", id)),
        }
    }

    #[test]
    fn initial_tab_is_month() {
        assert_eq!(BoardState::new().tab, Tab::Month);
    }

    #[test]
    fn publish_requires_user() {
        let mut state = BoardState::new();
        assert!(!state.select_tab(Tab::Publish));
        assert_eq!(state.tab, Tab::Month);

        state.session_changed(Some(user("u1")));
        assert!(state.select_tab(Tab::Publish));
        assert_eq!(state.tab, Tab::Publish);
    }

    #[test]
    fn sign_out_leaves_publish_tab() {
        let mut state = BoardState::new();
        state.session_changed(Some(user("u1")));
        state.select_tab(Tab::Publish);

        assert!(state.session_changed(None));
        assert_eq!(state.tab, Tab::Month);
    }

    #[test]
    fn sign_in_leaves_auth_forms() {
        let mut state = BoardState::new();
        state.select_tab(Tab::Login);
        state.session_changed(Some(user("u1")));
        assert_eq!(state.tab, Tab::Month);
        assert!(!state.select_tab(Tab::Register));
    }

    #[test]
    fn same_identity_is_not_a_change() {
        let mut state = BoardState::new();
        assert!(state.session_changed(Some(user("u1"))));
        assert!(!state.session_changed(Some(user("u1"))));
        assert!(state.session_changed(Some(user("u2"))));
    }

    #[test]
    fn stale_feed_load_is_discarded() {
        let mut state = BoardState::new();
        let first = state.begin_feed_load();
        let second = state.begin_feed_load();

        assert!(state.feed_loaded(second, vec![joke("new", false)]));
        assert!(!state.feed_loaded(first, vec![joke("old", false)]));
        assert_eq!(state.jokes[0].id, "new");
    }

    #[test]
    fn publish_success_clears_matching_draft() {
        let mut state = BoardState::new();
        state.draft_edited("knock knock");
        state.publish_succeeded("knock knock");
        assert!(state.draft.is_empty());
        assert_eq!(state.notice, Some(Notice::Info("Joke published".into())));
    }

    #[test]
    fn publish_success_keeps_newer_draft() {
        let mut state = BoardState::new();
        state.draft_edited("second joke");
        state.publish_succeeded("first joke");
        assert_eq!(state.draft, "second joke");
    }

    #[test]
    fn several_flagged_jokes_keep_extras_in_community() {
        let jokes = vec![joke("1", false), joke("2", true), joke("3", true)];
        assert_eq!(joke_of_the_month(&jokes).unwrap().id, "2");
        let community: Vec<_> = community_jokes(&jokes).iter().map(|j| j.id.as_str()).collect();
        assert_eq!(community, vec!["1", "3"]);
    }

    #[test]
    fn available_tabs_follow_session() {
        let mut state = BoardState::new();
        assert_eq!(state.available_tabs(), vec![
            Tab::Month,
            Tab::Community,
            Tab::Login,
            Tab::Register
        ]);
        state.session_changed(Some(user("u1")));
        assert_eq!(state.available_tabs(), vec![
            Tab::Month,
            Tab::Community,
            Tab::Publish
        ]);
    }
}
