//! Sign-in screen -- email/password form with async authentication.

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use tokio::sync::mpsc::UnboundedSender;

use crowdly_core::Controller;

use crate::action::Action;
use crate::component::Component;
use crate::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Email,
    Password,
}

pub struct LoginScreen {
    controller: Controller,
    action_tx: Option<UnboundedSender<Action>>,

    email: String,
    password: String,
    focus: Field,
    show_password: bool,

    authenticating: bool,
    error: Option<String>,
    throbber_state: throbber_widgets_tui::ThrobberState,
}

impl LoginScreen {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            action_tx: None,
            email: String::new(),
            password: String::new(),
            focus: Field::Email,
            show_password: false,
            authenticating: false,
            error: None,
            throbber_state: throbber_widgets_tui::ThrobberState::default(),
        }
    }

    fn focused_field_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Email => &mut self.email,
            Field::Password => &mut self.password,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Field::Email => Field::Password,
            Field::Password => Field::Email,
        };
    }

    fn submit(&mut self) {
        if self.authenticating {
            return;
        }

        let email = self.email.trim().to_owned();
        if email.is_empty() || self.password.is_empty() {
            self.error = Some("Email and password are required".to_owned());
            return;
        }

        let Some(tx) = self.action_tx.clone() else {
            return;
        };

        self.error = None;
        self.authenticating = true;

        let controller = self.controller.clone();
        let password = self.password.clone();
        tokio::spawn(async move {
            // Success surfaces through the auth watch channel; only
            // failures need an explicit action.
            if let Err(e) = controller.login(&email, &password).await {
                let _ = tx.send(Action::LoginFailed(e.to_string()));
            }
        });
    }

    fn field_block(&self, title: &'static str, field: Field) -> Block<'static> {
        let style = if self.focus == field {
            theme::border_focused()
        } else {
            theme::border_default()
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(Span::styled(title, theme::metric_label()))
    }
}

impl Component for LoginScreen {
    fn init(&mut self, action_tx: UnboundedSender<Action>) -> Result<()> {
        self.action_tx = Some(action_tx);
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.authenticating {
            // Form is locked while the login attempt runs
            return Ok(None);
        }

        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => self.toggle_focus(),
            KeyCode::Enter => match self.focus {
                Field::Email => self.focus = Field::Password,
                Field::Password => self.submit(),
            },
            KeyCode::Backspace => {
                self.focused_field_mut().pop();
            }
            KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.show_password = !self.show_password;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.focused_field_mut().push(c);
            }
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::Tick => {
                if self.authenticating {
                    self.throbber_state.calc_next();
                }
            }
            Action::SessionStarted => {
                self.authenticating = false;
                self.error = None;
                self.password.clear();
            }
            Action::LoginFailed(message) => {
                self.authenticating = false;
                self.error = Some(message.clone());
                self.password.clear();
                self.focus = Field::Password;
            }
            Action::SessionEnded => {
                self.authenticating = false;
                self.password.clear();
                self.focus = Field::Email;
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let form_width = 52.min(area.width.saturating_sub(4));
        let form_height = 14;

        let x = area.x + (area.width.saturating_sub(form_width)) / 2;
        let y = area.y + (area.height.saturating_sub(form_height)) / 2;
        let form = Rect::new(x, y, form_width, form_height.min(area.height));

        frame.render_widget(Clear, form);

        let outer = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_default())
            .title(Span::styled(" Crowdly ", theme::title_style()))
            .title_alignment(Alignment::Center);
        let inner = outer.inner(form);
        frame.render_widget(outer, form);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // caption
                Constraint::Length(3), // email
                Constraint::Length(3), // password
                Constraint::Length(1), // status / error
                Constraint::Length(1), // spacer
                Constraint::Length(1), // hints
            ])
            .split(inner);

        frame.render_widget(
            Paragraph::new("Sign in to your analytics backend")
                .style(theme::metric_label())
                .alignment(Alignment::Center),
            rows[0],
        );

        frame.render_widget(
            Paragraph::new(self.email.as_str())
                .block(self.field_block(" Email ", Field::Email)),
            rows[1],
        );

        let masked;
        let password_text = if self.show_password {
            self.password.as_str()
        } else {
            masked = "•".repeat(self.password.chars().count());
            masked.as_str()
        };
        frame.render_widget(
            Paragraph::new(password_text)
                .block(self.field_block(" Password ", Field::Password)),
            rows[2],
        );

        if self.authenticating {
            let throbber = throbber_widgets_tui::Throbber::default()
                .label("Signing in...")
                .style(Style::default().fg(theme::ACCENT_BLUE))
                .throbber_style(Style::default().fg(theme::ACCENT_TEAL));
            frame.render_stateful_widget(throbber, rows[3], &mut self.throbber_state.clone());
        } else if let Some(ref error) = self.error {
            frame.render_widget(
                Paragraph::new(error.as_str())
                    .style(theme::error_text())
                    .alignment(Alignment::Center),
                rows[3],
            );
        }

        let hints = Line::from(vec![
            Span::styled("Tab", theme::key_hint_key()),
            Span::styled(" switch  ", theme::key_hint()),
            Span::styled("Enter", theme::key_hint_key()),
            Span::styled(" sign in  ", theme::key_hint()),
            Span::styled("Ctrl+T", theme::key_hint_key()),
            Span::styled(" show password  ", theme::key_hint()),
            Span::styled("Ctrl+C", theme::key_hint_key()),
            Span::styled(" quit", theme::key_hint()),
        ]);
        frame.render_widget(
            Paragraph::new(hints).alignment(Alignment::Center),
            rows[5],
        );
    }

    fn capturing_input(&self) -> bool {
        true
    }

    fn id(&self) -> &str {
        "login"
    }
}
