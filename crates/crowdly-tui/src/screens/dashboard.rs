//! Dashboard screen -- metric cards, occupancy trend, demographics.
//!
//! Renders whatever the latest [`DashboardSnapshot`] holds; every data
//! mutation happens in the core and arrives here as an action. Each
//! widget degrades to an empty state independently when its query
//! failed.

use chrono::NaiveDate;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Sparkline},
};
use tokio::sync::mpsc::UnboundedSender;

use crowdly_core::{Controller, DashboardSnapshot, DateRange, SiteResponse, SitesSnapshot};

use crate::action::{Action, Notification};
use crate::component::Component;
use crate::theme;
use crate::widgets::format_dwell;

/// Preset cycling order for the `d` key.
const RANGE_PRESETS: [DateRange; 4] = [
    DateRange::Today,
    DateRange::Yesterday,
    DateRange::Last7Days,
    DateRange::Last30Days,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomField {
    From,
    To,
}

/// In-progress custom date range entry (`c` key).
struct CustomRangeInput {
    from: String,
    to: String,
    focus: CustomField,
    error: Option<String>,
}

impl CustomRangeInput {
    fn new() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            focus: CustomField::From,
            error: None,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            CustomField::From => &mut self.from,
            CustomField::To => &mut self.to,
        }
    }

    fn parse(&self) -> Result<(NaiveDate, NaiveDate), String> {
        let from = NaiveDate::parse_from_str(self.from.trim(), "%Y-%m-%d")
            .map_err(|_| format!("invalid from date: {}", self.from.trim()))?;
        let to = NaiveDate::parse_from_str(self.to.trim(), "%Y-%m-%d")
            .map_err(|_| format!("invalid to date: {}", self.to.trim()))?;
        if from > to {
            return Err("from date is after to date".to_owned());
        }
        Ok((from, to))
    }
}

pub struct DashboardScreen {
    controller: Controller,
    action_tx: Option<UnboundedSender<Action>>,

    snapshot: DashboardSnapshot,
    sites: SitesSnapshot,
    selected: Option<SiteResponse>,
    range: DateRange,

    custom_input: Option<CustomRangeInput>,
}

impl DashboardScreen {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            action_tx: None,
            snapshot: DashboardSnapshot::default(),
            sites: SitesSnapshot::default(),
            selected: None,
            range: DateRange::Today,
            custom_input: None,
        }
    }

    fn spawn_refresh(&self) {
        let controller = self.controller.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.refresh_dashboard().await {
                if let Some(tx) = tx {
                    let _ = tx.send(Action::Notify(Notification::error(format!(
                        "Refresh failed: {e}"
                    ))));
                }
            }
        });
    }

    fn cycle_site(&self) {
        let sites = &self.sites.sites;
        if sites.len() < 2 {
            return;
        }
        let current = self
            .selected
            .as_ref()
            .and_then(|sel| sites.iter().position(|s| s.site_id == sel.site_id))
            .unwrap_or(0);
        let next = sites[(current + 1) % sites.len()].site_id.clone();

        let controller = self.controller.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.select_site(&next).await {
                if let Some(tx) = tx {
                    let _ = tx.send(Action::Notify(Notification::error(format!(
                        "Site switch failed: {e}"
                    ))));
                }
            }
        });
    }

    fn cycle_range(&self) {
        let current = RANGE_PRESETS.iter().position(|r| *r == self.range);
        let next = match current {
            Some(i) => RANGE_PRESETS[(i + 1) % RANGE_PRESETS.len()].clone(),
            // Coming from Custom: back to the first preset
            None => DateRange::Today,
        };
        self.apply_range(next);
    }

    fn apply_range(&self, range: DateRange) {
        let controller = self.controller.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.set_date_range(range).await {
                if let Some(tx) = tx {
                    let _ = tx.send(Action::Notify(Notification::error(format!(
                        "Range change failed: {e}"
                    ))));
                }
            }
        });
    }

    fn handle_custom_input_key(&mut self, key: KeyEvent) -> Option<Action> {
        let input = self.custom_input.as_mut()?;

        match key.code {
            KeyCode::Esc => {
                self.custom_input = None;
                return Some(Action::SetInputCapture(false));
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                input.focus = match input.focus {
                    CustomField::From => CustomField::To,
                    CustomField::To => CustomField::From,
                };
            }
            KeyCode::Enter => match input.parse() {
                Ok((from, to)) => {
                    self.custom_input = None;
                    self.apply_range(DateRange::Custom {
                        from: Some(from),
                        to: Some(to),
                    });
                    return Some(Action::SetInputCapture(false));
                }
                Err(message) => input.error = Some(message),
            },
            KeyCode::Backspace => {
                input.focused_mut().pop();
            }
            KeyCode::Char(c)
                if (c.is_ascii_digit() || c == '-')
                    && !key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                if input.focused_mut().len() < 10 {
                    input.focused_mut().push(c);
                }
            }
            _ => {}
        }
        None
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render_metric_cards(&self, frame: &mut Frame, area: Rect) {
        let cards = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);

        let occupancy = match (self.snapshot.current_occupancy, self.snapshot.occupancy_failed) {
            (Some(n), _) => n.to_string(),
            (None, true) => "no data".to_owned(),
            (None, false) => "—".to_owned(),
        };
        let footfall = match (self.snapshot.footfall, self.snapshot.footfall_failed) {
            (Some(n), _) => n.to_string(),
            (None, true) => "no data".to_owned(),
            (None, false) => "—".to_owned(),
        };
        let dwell = match (self.snapshot.avg_dwell_minutes, self.snapshot.dwell_failed) {
            (Some(m), _) => format_dwell(m),
            (None, true) => "no data".to_owned(),
            (None, false) => "—".to_owned(),
        };

        Self::render_card(frame, cards[0], "Current Occupancy", &occupancy);
        Self::render_card(frame, cards[1], "Footfall", &footfall);
        Self::render_card(frame, cards[2], "Avg Dwell Time", &dwell);
    }

    fn render_card(frame: &mut Frame, area: Rect, label: &str, value: &str) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_default())
            .title(Span::styled(format!(" {label} "), theme::metric_label()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let style = if value == "no data" || value == "—" {
            theme::empty_state()
        } else {
            theme::metric_value()
        };
        let y = inner.y + inner.height.saturating_sub(1) / 2;
        let value_area = Rect::new(inner.x, y, inner.width, 1.min(inner.height));
        frame.render_widget(
            Paragraph::new(value).style(style).alignment(Alignment::Center),
            value_area,
        );
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn render_occupancy_chart(&self, frame: &mut Frame, area: Rect) {
        let title = format!(" Occupancy · {} ", self.range.label());
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_default())
            .title(Span::styled(title, theme::title_style()));

        let series = &self.snapshot.occupancy_series;
        if self.snapshot.occupancy_failed || series.is_empty() {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new("no data")
                    .style(theme::empty_state())
                    .alignment(Alignment::Center),
                inner,
            );
            return;
        }

        let data: Vec<u64> = series.iter().map(|b| b.avg.max(0.0).round() as u64).collect();
        let sparkline = Sparkline::default()
            .block(block)
            .data(&data)
            .style(ratatui::style::Style::default().fg(theme::ACCENT_TEAL));
        frame.render_widget(sparkline, area);
    }

    fn render_demographics(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_default())
            .title(Span::styled(" Demographics ", theme::title_style()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.snapshot.demographics_failed {
            frame.render_widget(
                Paragraph::new("no data")
                    .style(theme::empty_state())
                    .alignment(Alignment::Center),
                inner,
            );
            return;
        }

        let totals = self.snapshot.demographics_totals;
        let total = totals.male + totals.female;

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Male   ", theme::metric_label()),
                Span::styled(totals.male.to_string(), theme::metric_value()),
            ]),
            Line::from(vec![
                Span::styled("Female ", theme::metric_label()),
                Span::styled(totals.female.to_string(), theme::metric_value()),
            ]),
        ];

        if total > 0 {
            lines.push(Line::default());
            lines.push(ratio_bar(totals.male, total, inner.width));
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn render_custom_input(&self, frame: &mut Frame, area: Rect) {
        let Some(ref input) = self.custom_input else {
            return;
        };

        let width = 40.min(area.width.saturating_sub(4));
        let height = 11;
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let popup = Rect::new(x, y, width, height.min(area.height));

        frame.render_widget(Clear, popup);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_focused())
            .title(Span::styled(" Custom Range ", theme::title_style()));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);

        let field = |title: &'static str, value: &str, focused: bool| {
            let style = if focused {
                theme::border_focused()
            } else {
                theme::border_default()
            };
            Paragraph::new(value.to_owned()).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(style)
                    .title(Span::styled(title, theme::metric_label())),
            )
        };

        frame.render_widget(
            field(" From (YYYY-MM-DD) ", &input.from, input.focus == CustomField::From),
            rows[0],
        );
        frame.render_widget(
            field(" To (YYYY-MM-DD) ", &input.to, input.focus == CustomField::To),
            rows[1],
        );

        if let Some(ref error) = input.error {
            frame.render_widget(
                Paragraph::new(error.as_str()).style(theme::error_text()),
                rows[2],
            );
        }

        let hints = Line::from(vec![
            Span::styled("Enter", theme::key_hint_key()),
            Span::styled(" apply  ", theme::key_hint()),
            Span::styled("Tab", theme::key_hint_key()),
            Span::styled(" field  ", theme::key_hint()),
            Span::styled("Esc", theme::key_hint_key()),
            Span::styled(" cancel", theme::key_hint()),
        ]);
        frame.render_widget(Paragraph::new(hints).alignment(Alignment::Center), rows[3]);
    }
}

/// A horizontal male/female split bar.
#[allow(clippy::cast_possible_truncation)]
fn ratio_bar(male: u64, total: u64, width: u16) -> Line<'static> {
    let width = u64::from(width.saturating_sub(2)).max(2);
    let male_cells = ((male * width) / total.max(1)).min(width) as usize;
    let female_cells = width as usize - male_cells;

    Line::from(vec![
        Span::styled(
            "█".repeat(male_cells),
            ratatui::style::Style::default().fg(theme::ACCENT_BLUE),
        ),
        Span::styled(
            "█".repeat(female_cells),
            ratatui::style::Style::default().fg(theme::ACCENT_PINK),
        ),
    ])
}

impl Component for DashboardScreen {
    fn init(&mut self, action_tx: UnboundedSender<Action>) -> Result<()> {
        self.action_tx = Some(action_tx);
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.custom_input.is_some() {
            return Ok(self.handle_custom_input_key(key));
        }

        match key.code {
            KeyCode::Char('r') => self.spawn_refresh(),
            KeyCode::Char('s') => self.cycle_site(),
            KeyCode::Char('d') => self.cycle_range(),
            KeyCode::Char('c') => {
                self.custom_input = Some(CustomRangeInput::new());
                return Ok(Some(Action::SetInputCapture(true)));
            }
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::DashboardUpdated(snapshot) => self.snapshot = snapshot.clone(),
            Action::SitesUpdated(sites) => self.sites = sites.clone(),
            Action::SiteSelected(site) => self.selected = site.clone(),
            Action::DateRangeChanged(range) => self.range = range.clone(),
            Action::SessionEnded => {
                self.snapshot = DashboardSnapshot::default();
                self.sites = SitesSnapshot::default();
                self.selected = None;
                self.custom_input = None;
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        if self.sites.failed && self.sites.sites.is_empty() {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(theme::border_default());
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new("Site list unavailable — no data to show")
                    .style(theme::empty_state())
                    .alignment(Alignment::Center),
                inner,
            );
            return;
        }

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(8)])
            .split(area);

        self.render_metric_cards(frame, rows[0]);

        let middle = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
            .split(rows[1]);

        self.render_occupancy_chart(frame, middle[0]);
        self.render_demographics(frame, middle[1]);

        self.render_custom_input(frame, area);
    }

    fn capturing_input(&self) -> bool {
        self.custom_input.is_some()
    }

    fn id(&self) -> &str {
        "dashboard"
    }
}
