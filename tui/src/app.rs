//! Front-end input state.
//!
//! Maps key presses to board actions and edits the focused form field. The
//! board owns all data; this only tracks which field has the cursor.

use client::{BoardState, Tab};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a key press asks the board to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    SelectTab(Tab),
    Input(char),
    Backspace,
    /// Publish the draft or submit the current auth form.
    Submit,
    /// Email a one-time sign-in link to the login email.
    RequestLink,
    SignOut,
    Refresh,
}

#[derive(Debug, Default)]
pub struct App {
    /// Index of the focused field on form tabs.
    pub focus: usize,
    pub should_quit: bool,
}

pub fn field_count(tab: Tab) -> usize {
    match tab {
        Tab::Month | Tab::Community => 0,
        Tab::Publish => 1,
        Tab::Login => 2,
        Tab::Register => 3,
    }
}

fn is_form(tab: Tab) -> bool {
    field_count(tab) > 0
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focused field, clamped to the fields of `tab`.
    pub fn focus_in(&self, tab: Tab) -> usize {
        match field_count(tab) {
            0 => 0,
            n => self.focus.min(n - 1),
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, state: &BoardState) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        match key.code {
            KeyCode::Tab => return self.cycle_tab(state, 1),
            KeyCode::BackTab => return self.cycle_tab(state, -1),
            _ => {}
        }

        if is_form(state.tab) {
            self.on_form_key(key, state.tab, ctrl)
        } else {
            self.on_view_key(key, state)
        }
    }

    fn on_form_key(&mut self, key: KeyEvent, tab: Tab, ctrl: bool) -> Option<Action> {
        let fields = field_count(tab);
        match key.code {
            KeyCode::Char('o') if ctrl && tab == Tab::Login => Some(Action::RequestLink),
            KeyCode::Char(_) if ctrl => None,
            KeyCode::Char(c) => Some(Action::Input(c)),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Enter => Some(Action::Submit),
            KeyCode::Down => {
                self.focus = (self.focus_in(tab) + 1) % fields;
                None
            }
            KeyCode::Up => {
                self.focus = (self.focus_in(tab) + fields - 1) % fields;
                None
            }
            KeyCode::Esc => {
                self.focus = 0;
                Some(Action::SelectTab(Tab::Month))
            }
            _ => None,
        }
    }

    fn on_view_key(&mut self, key: KeyEvent, state: &BoardState) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('s') if state.is_signed_in() => Some(Action::SignOut),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                let tab = *state.available_tabs().get(index)?;
                self.focus = 0;
                Some(Action::SelectTab(tab))
            }
            _ => None,
        }
    }

    fn cycle_tab(&mut self, state: &BoardState, step: isize) -> Option<Action> {
        let tabs = state.available_tabs();
        let current = tabs.iter().position(|t| *t == state.tab).unwrap_or(0);
        let next = (current as isize + step).rem_euclid(tabs.len() as isize) as usize;
        self.focus = 0;
        Some(Action::SelectTab(tabs[next]))
    }
}

/// Apply a character or backspace to the focused field of the current tab.
pub fn edit_field(state: &mut BoardState, focus: usize, action: &Action) {
    let field = match (state.tab, focus) {
        (Tab::Publish, _) => {
            let mut draft = state.draft.clone();
            apply_edit(&mut draft, action);
            state.draft_edited(draft);
            return;
        }
        (Tab::Login, 0) => &mut state.login_form.email,
        (Tab::Login, _) => &mut state.login_form.password,
        (Tab::Register, 0) => &mut state.register_form.email,
        (Tab::Register, 1) => &mut state.register_form.password,
        (Tab::Register, _) => &mut state.register_form.username,
        _ => return,
    };
    apply_edit(field, action);
}

fn apply_edit(text: &mut String, action: &Action) {
    match action {
        Action::Input(c) => text.push(*c),
        Action::Backspace => {
            text.pop();
        }
        _ => {}
    }
}
