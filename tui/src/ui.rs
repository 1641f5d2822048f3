use client::render;
use client::{BoardState, Tab};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, List, Paragraph, Tabs, Wrap};

use crate::app::{App, field_count};

const HELP_VIEW: &str = "Tab/1-5: switch  r: refresh  s: sign out  q: quit";
const HELP_FORM: &str = "Enter: submit  Up/Down: field  Esc: back  Ctrl-C: quit";
const HELP_LOGIN: &str = "Enter: sign in  Ctrl-O: email me a link  Up/Down: field  Esc: back";

pub fn draw(frame: &mut Frame, state: &BoardState, app: &App) {
    let [tabs_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    draw_tabs(frame, state, tabs_area);
    draw_body(frame, state, app, body_area);
    draw_footer(frame, state, footer_area);
}

fn draw_tabs(frame: &mut Frame, state: &BoardState, area: Rect) {
    let tabs = state.available_tabs();
    let selected = tabs.iter().position(|t| *t == state.tab).unwrap_or(0);
    let title = format!(" {} | {} ", render::APP_TITLE, render::header(state));
    let widget = Tabs::new(render::tab_bar(state))
        .select(selected)
        .block(Block::bordered().title(title))
        .highlight_style(
            Style::new()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(widget, area);
}

fn draw_body(frame: &mut Frame, state: &BoardState, app: &App, area: Rect) {
    let block = Block::bordered().title(format!(" {} ", state.tab.title()));

    match state.tab {
        Tab::Month => {
            let text = render::month_view(state);
            frame.render_widget(
                Paragraph::new(text)
                    .wrap(Wrap { trim: false })
                    .block(block),
                area,
            );
        }
        Tab::Community => {
            frame.render_widget(List::new(render::community_lines(state)).block(block), area);
        }
        Tab::Publish => {
            let (text, style) = if state.draft.is_empty() {
                (
                    render::DRAFT_PLACEHOLDER.to_string(),
                    Style::new().fg(Color::DarkGray),
                )
            } else {
                (state.draft.clone(), Style::new())
            };
            frame.render_widget(
                Paragraph::new(text)
                    .style(style)
                    .wrap(Wrap { trim: false })
                    .block(block),
                area,
            );
        }
        Tab::Login | Tab::Register => {
            let focus = app.focus_in(state.tab);
            let lines: Vec<Line> = render::body(state)
                .into_iter()
                .take(field_count(state.tab))
                .enumerate()
                .map(|(i, line)| {
                    if i == focus {
                        Line::from(vec![
                            Span::styled("> ", Style::new().fg(Color::Yellow)),
                            Span::raw(line),
                        ])
                    } else {
                        Line::from(format!("  {}", line))
                    }
                })
                .collect();
            frame.render_widget(Paragraph::new(lines).block(block), area);
        }
    }
}

fn draw_footer(frame: &mut Frame, state: &BoardState, area: Rect) {
    let line = match &state.notice {
        Some(notice) => {
            let color = if notice.is_error() { Color::Red } else { Color::Green };
            Line::styled(notice.text().to_string(), Style::new().fg(color))
        }
        None => {
            let help = match state.tab {
                Tab::Month | Tab::Community => HELP_VIEW,
                Tab::Login => HELP_LOGIN,
                _ => HELP_FORM,
            };
            Line::styled(help, Style::new().fg(Color::DarkGray))
        }
    };
    frame.render_widget(Paragraph::new(line).block(Block::bordered()), area);
}
