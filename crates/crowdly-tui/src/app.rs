//! Application core -- event loop, screen management, action dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::TimeZone;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Tabs},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crowdly_core::{AlertDirection, AlertEvent, ConnectionState, Controller, DateRange};

use crate::action::{Action, Notification, NotificationLevel};
use crate::component::Component;
use crate::data_bridge::run_data_bridge;
use crate::event::{Event, EventReader};
use crate::screen::ScreenId;
use crate::screens::create_screens;
use crate::theme;
use crate::tui::Tui;

/// How long a transient status-bar notification stays visible.
const NOTIFICATION_TTL: Duration = Duration::from_secs(4);
/// How long an alert banner stays visible before auto-dismissing.
const BANNER_TTL: Duration = Duration::from_secs(6);

/// Top-level application state and event loop.
pub struct App {
    controller: Controller,

    active_screen: ScreenId,
    screens: HashMap<ScreenId, Box<dyn Component>>,
    running: bool,

    connection: ConnectionState,
    selected_site_name: Option<String>,
    range: DateRange,

    alerts: Arc<Vec<Arc<AlertEvent>>>,
    alert_banner: Option<(Arc<AlertEvent>, Instant)>,
    alerts_visible: bool,

    help_visible: bool,
    input_capture: bool,
    notification: Option<(Notification, Instant)>,

    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(controller: Controller) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let screens = create_screens(&controller);

        Self {
            controller,
            active_screen: ScreenId::Login,
            screens,
            running: true,
            connection: ConnectionState::Disconnected,
            selected_site_name: None,
            range: DateRange::Today,
            alerts: Arc::new(Vec::new()),
            alert_banner: None,
            alerts_visible: false,
            help_visible: false,
            input_capture: false,
            notification: None,
            action_tx,
            action_rx,
        }
    }

    fn init_screens(&mut self) -> Result<()> {
        for screen in self.screens.values_mut() {
            screen.init(self.action_tx.clone())?;
        }
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(true);
        }
        Ok(())
    }

    /// Run the main event loop.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        self.init_screens()?;

        let bridge_cancel = CancellationToken::new();
        let bridge = tokio::spawn(run_data_bridge(
            self.controller.clone(),
            self.action_tx.clone(),
            bridge_cancel.clone(),
        ));

        let mut events = EventReader::new(
            Duration::from_millis(250), // 4 Hz tick
            Duration::from_millis(33),  // ~30 FPS render
        );

        info!("TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Resize(w, h) => self.action_tx.send(Action::Resize(w, h))?,
                Event::Tick => self.action_tx.send(Action::Tick)?,
                Event::Render => self.action_tx.send(Action::Render)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        bridge_cancel.cancel();
        let _ = bridge.await;

        info!("TUI event loop ended");
        Ok(())
    }

    fn capturing(&self) -> bool {
        self.input_capture
            || self
                .screens
                .get(&self.active_screen)
                .is_some_and(|s| s.capturing_input())
    }

    /// Map a key event to an action. Global keys are handled here;
    /// screen-specific keys are delegated to the active screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        // Ctrl+C quits from anywhere, even inside a text field
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Some(Action::Quit));
        }

        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        if self.alerts_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('a') => Ok(Some(Action::ToggleAlertsPanel)),
                _ => Ok(None),
            };
        }

        // Text entry suspends global keybindings
        if self.capturing() {
            if let Some(screen) = self.screens.get_mut(&self.active_screen) {
                return screen.handle_key_event(key);
            }
            return Ok(None);
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, _) => {}

            (_, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),
            (_, KeyCode::Char('?')) => return Ok(Some(Action::ToggleHelp)),
            (_, KeyCode::Char('a')) => return Ok(Some(Action::ToggleAlertsPanel)),
            (_, KeyCode::Char('l')) => return Ok(Some(Action::RequestLogout)),

            (_, KeyCode::Char(c @ '1'..='2')) => {
                if let Some(screen) = ScreenId::from_number(c as u8 - b'0') {
                    return Ok(Some(Action::SwitchScreen(screen)));
                }
            }
            (_, KeyCode::Tab) => {
                return Ok(Some(Action::SwitchScreen(self.active_screen.next())));
            }

            _ => {}
        }

        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            return screen.handle_key_event(key);
        }
        Ok(None)
    }

    /// Process a single action: update app state, then propagate to the
    /// screens. Data actions go to every screen so inactive ones stay
    /// consistent (the entries table resets when the site changes even
    /// while the dashboard is showing).
    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => self.running = false,
            Action::Render | Action::Resize(..) => return Ok(()),

            Action::Tick => {
                self.expire_timers();
            }

            Action::SwitchScreen(target) => {
                self.switch_screen(*target);
                return Ok(());
            }

            Action::ToggleHelp => {
                self.help_visible = !self.help_visible;
                return Ok(());
            }

            Action::ToggleAlertsPanel => {
                self.alerts_visible = !self.alerts_visible;
                return Ok(());
            }

            Action::SessionStarted => {
                debug!("session started, entering dashboard");
                self.switch_screen(ScreenId::Dashboard);
                self.notify(Notification::info("Signed in"));
            }

            Action::SessionEnded => {
                self.switch_screen(ScreenId::Login);
                self.alerts = Arc::new(Vec::new());
                self.alert_banner = None;
                self.alerts_visible = false;
                self.selected_site_name = None;
                self.input_capture = false;
                self.notify(Notification::info("Signed out"));
            }

            Action::RequestLogout => {
                let controller = self.controller.clone();
                tokio::spawn(async move {
                    controller.logout().await;
                });
                return Ok(());
            }

            Action::ConnectionChanged(state) => self.connection = *state,

            Action::SiteSelected(site) => {
                self.selected_site_name = site.as_ref().map(|s| s.name.clone());
            }

            Action::DateRangeChanged(range) => self.range = range.clone(),

            Action::AlertsUpdated(list) => {
                // A new head means a fresh alert worth a banner
                let is_new = match (list.first(), self.alerts.first()) {
                    (Some(new), Some(old)) => !Arc::ptr_eq(new, old),
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if is_new {
                    if let Some(newest) = list.first() {
                        self.alert_banner = Some((Arc::clone(newest), Instant::now()));
                    }
                }
                self.alerts = Arc::clone(list);
            }

            Action::SetInputCapture(capture) => {
                self.input_capture = *capture;
            }

            Action::Notify(n) => {
                self.notify(n.clone());
                return Ok(());
            }

            _ => {}
        }

        // Propagate to all screens; collect follow-ups first
        let mut follow_ups = Vec::new();
        for screen in self.screens.values_mut() {
            if let Some(follow_up) = screen.update(action)? {
                follow_ups.push(follow_up);
            }
        }
        for follow_up in follow_ups {
            self.action_tx.send(follow_up)?;
        }

        Ok(())
    }

    fn switch_screen(&mut self, target: ScreenId) {
        if target == self.active_screen {
            return;
        }
        debug!("switching screen: {} -> {}", self.active_screen, target);
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(false);
        }
        self.active_screen = target;
        self.input_capture = false;
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(true);
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.notification = Some((notification, Instant::now()));
    }

    fn expire_timers(&mut self) {
        if self
            .notification
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() >= NOTIFICATION_TTL)
        {
            self.notification = None;
        }
        if self
            .alert_banner
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() >= BANNER_TTL)
        {
            self.alert_banner = None;
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        if self.active_screen == ScreenId::Login {
            let layout =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
            if let Some(screen) = self.screens.get(&self.active_screen) {
                screen.render(frame, layout[0]);
            }
            self.render_status_bar(frame, layout[1]);
            return;
        }

        let layout = Layout::vertical([
            Constraint::Min(1),    // Screen content
            Constraint::Length(1), // Tab bar
            Constraint::Length(1), // Status bar
        ])
        .split(area);

        if let Some(screen) = self.screens.get(&self.active_screen) {
            screen.render(frame, layout[0]);
        }

        self.render_tab_bar(frame, layout[1]);
        self.render_status_bar(frame, layout[2]);

        if let Some((ref alert, _)) = self.alert_banner {
            Self::render_alert_banner(frame, layout[0], alert);
        }
        if self.alerts_visible {
            self.render_alerts_panel(frame, area);
        }
        if self.help_visible {
            Self::render_help_overlay(frame, area);
        }
    }

    fn render_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = ScreenId::TABS
            .iter()
            .map(|&id| {
                let style = if id == self.active_screen {
                    theme::tab_active()
                } else {
                    theme::tab_inactive()
                };
                Line::from(Span::styled(
                    format!(" {} {} ", id.number(), id.label()),
                    style,
                ))
            })
            .collect();

        let tabs = Tabs::new(titles)
            .divider(Span::styled(" ", theme::key_hint()))
            .select(
                ScreenId::TABS
                    .iter()
                    .position(|&s| s == self.active_screen)
                    .unwrap_or(0),
            );

        frame.render_widget(tabs, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let connection = match self.connection {
            ConnectionState::Connected => {
                Span::styled("● connected", Style::default().fg(theme::SUCCESS_GREEN))
            }
            ConnectionState::Connecting => {
                Span::styled("◐ connecting", Style::default().fg(theme::WARN_AMBER))
            }
            ConnectionState::Disconnected => {
                Span::styled("○ disconnected", Style::default().fg(theme::ERROR_RED))
            }
        };

        let mut spans = vec![Span::raw(" "), connection];

        if let Some(ref name) = self.selected_site_name {
            spans.push(Span::styled(" │ ", theme::key_hint()));
            spans.push(Span::styled(name.clone(), theme::tab_active()));
        }

        if self.active_screen != ScreenId::Login {
            spans.push(Span::styled(" │ ", theme::key_hint()));
            spans.push(Span::styled(self.range.label(), theme::metric_label()));
        }

        if let Some((ref n, _)) = self.notification {
            let style = match n.level {
                NotificationLevel::Info => Style::default().fg(theme::SUCCESS_GREEN),
                NotificationLevel::Error => theme::error_text(),
            };
            spans.push(Span::styled(" │ ", theme::key_hint()));
            spans.push(Span::styled(n.message.clone(), style));
        } else {
            spans.push(Span::styled(
                " │ ? help  a alerts  l logout  q quit",
                theme::key_hint(),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_alert_banner(frame: &mut Frame, content: Rect, alert: &AlertEvent) {
        if content.height == 0 {
            return;
        }
        let banner = Rect::new(content.x, content.y, content.width, 1);
        frame.render_widget(Clear, banner);

        let line = Line::from(vec![
            Span::styled(
                " ⚠ ALERT ",
                Style::default()
                    .fg(theme::BG_DARK)
                    .bg(theme::severity_color(alert.severity)),
            ),
            Span::raw(" "),
            Span::styled(alert_summary(alert), theme::severity_style(alert.severity)),
        ]);
        frame.render_widget(Paragraph::new(line), banner);
    }

    fn render_alerts_panel(&self, frame: &mut Frame, area: Rect) {
        let width = 70u16.min(area.width.saturating_sub(4));
        let height = 20u16.min(area.height.saturating_sub(4));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, width, height);

        frame.render_widget(Clear, panel);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            panel,
        );

        let block = Block::default()
            .title(format!(" Alerts ({}) ", self.alerts.len()))
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(panel);
        frame.render_widget(block, panel);

        if self.alerts.is_empty() {
            frame.render_widget(
                Paragraph::new("No alerts this session")
                    .style(theme::empty_state())
                    .alignment(ratatui::layout::Alignment::Center),
                inner,
            );
            return;
        }

        let lines: Vec<Line> = self
            .alerts
            .iter()
            .take(usize::from(inner.height))
            .map(|alert| {
                Line::from(vec![
                    Span::styled(format_alert_time(alert.ts), theme::key_hint()),
                    Span::raw("  "),
                    Span::styled(
                        format!("{:<6}", severity_label(alert)),
                        theme::severity_style(alert.severity),
                    ),
                    Span::raw("  "),
                    Span::styled(alert_summary(alert), theme::table_row()),
                ])
            })
            .collect();

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_help_overlay(frame: &mut Frame, area: Rect) {
        let width = 56u16.min(area.width.saturating_sub(4));
        let height = 18u16.min(area.height.saturating_sub(4));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let help_area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, help_area);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme::BG_DARK)),
            help_area,
        );

        let block = Block::default()
            .title(" Keyboard Shortcuts ")
            .title_style(theme::title_style())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_focused());
        let inner = block.inner(help_area);
        frame.render_widget(block, help_area);

        let entry = |keys: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {keys:<10}"), theme::key_hint_key()),
                Span::styled(what, theme::key_hint()),
            ])
        };

        let help_text = vec![
            Line::from(""),
            Line::from(Span::styled("  Navigation", theme::title_style())),
            entry("1-2", "Jump to screen"),
            entry("Tab", "Next screen"),
            entry("↑/↓", "Move selection"),
            Line::from(""),
            Line::from(Span::styled("  Dashboard", theme::title_style())),
            entry("r", "Refresh now"),
            entry("s", "Cycle site"),
            entry("d", "Cycle date range"),
            entry("c", "Custom date range"),
            Line::from(""),
            Line::from(Span::styled("  Entries", theme::title_style())),
            entry("←/→", "Previous / next page"),
            entry("p", "Cycle page size"),
            Line::from(""),
            Line::from(Span::styled("  Global", theme::title_style())),
            entry("a", "Alerts panel"),
            entry("l", "Log out"),
            entry("q", "Quit"),
        ];

        frame.render_widget(Paragraph::new(help_text), inner);
    }
}

fn alert_summary(alert: &AlertEvent) -> String {
    let verb = match alert.direction {
        AlertDirection::Enter => "entered",
        AlertDirection::Exit => "exited",
    };
    format!("{} {} {}", alert.person_name, verb, alert.zone_name)
}

fn severity_label(alert: &AlertEvent) -> &'static str {
    match alert.severity {
        crowdly_core::AlertSeverity::High => "HIGH",
        crowdly_core::AlertSeverity::Medium => "MED",
        crowdly_core::AlertSeverity::Low => "LOW",
    }
}

fn format_alert_time(ts: i64) -> String {
    chrono::Local
        .timestamp_millis_opt(ts)
        .single()
        .map_or_else(|| "--:--:--".to_owned(), |t| t.format("%H:%M:%S").to_string())
}
