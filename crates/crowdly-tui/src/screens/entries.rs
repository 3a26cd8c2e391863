//! Entry/exit records screen -- a paginated table of individual visits.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};
use tokio::sync::mpsc::UnboundedSender;

use crowdly_core::{Controller, EntriesPager, EntryExitPage, EntryExitRecord};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::format_dwell;

pub struct EntriesScreen {
    controller: Controller,
    action_tx: Option<UnboundedSender<Action>>,

    pager: EntriesPager,
    page: Option<Arc<EntryExitPage>>,
    loading: bool,
    error: Option<String>,

    selected_row: usize,
    focused: bool,
}

impl EntriesScreen {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            action_tx: None,
            pager: EntriesPager::new(),
            page: None,
            loading: false,
            error: None,
            selected_row: 0,
            focused: false,
        }
    }

    fn fetch_current_page(&mut self) {
        let Some(tx) = self.action_tx.clone() else {
            return;
        };

        self.loading = true;
        self.error = None;

        let controller = self.controller.clone();
        let page_number = self.pager.page();
        let page_size = self.pager.page_size();
        tokio::spawn(async move {
            match controller.fetch_entries(page_number, page_size).await {
                Ok(page) => {
                    let _ = tx.send(Action::EntriesLoaded(Arc::new(page)));
                }
                Err(e) => {
                    let _ = tx.send(Action::EntriesLoadFailed(e.to_string()));
                }
            }
        });
    }

    fn move_selection(&mut self, delta: i64) {
        let Some(ref page) = self.page else {
            return;
        };
        if page.records.is_empty() {
            return;
        }
        let last = page.records.len() - 1;
        let current = i64::try_from(self.selected_row).unwrap_or(0);
        let next = (current + delta).clamp(0, i64::try_from(last).unwrap_or(0));
        self.selected_row = usize::try_from(next).unwrap_or(0);
    }

    fn record_row(record: &EntryExitRecord) -> Row<'static> {
        let sex = record.gender.clone().unwrap_or_else(|| "—".to_owned());

        let exit = match record.exit_local {
            Some(ref exit) => Cell::from(exit.clone()),
            None => Cell::from("Still Inside")
                .style(ratatui::style::Style::default().fg(theme::WARN_AMBER)),
        };

        let dwell = record
            .dwell_minutes
            .map_or_else(|| "—".to_owned(), format_dwell);

        Row::new(vec![
            Cell::from(record.person_name.clone()),
            Cell::from(sex),
            Cell::from(record.entry_local.clone()),
            exit,
            Cell::from(dwell),
        ])
        .style(theme::table_row())
    }

    fn render_table(&self, frame: &mut Frame, area: Rect, page: &EntryExitPage) {
        if page.records.is_empty() {
            frame.render_widget(
                Paragraph::new("No records for this site and range")
                    .style(theme::empty_state())
                    .alignment(Alignment::Center),
                area,
            );
            return;
        }

        let header = Row::new(vec!["Name", "Sex", "Entry", "Exit", "Dwell"])
            .style(theme::table_header());

        let rows: Vec<Row> = page.records.iter().map(Self::record_row).collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(28),
                Constraint::Length(8),
                Constraint::Percentage(26),
                Constraint::Percentage(26),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .row_highlight_style(theme::table_selected());

        let mut state = TableState::default().with_selected(Some(self.selected_row));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn footer_line(&self) -> Line<'static> {
        let pages = format!(
            "Page {}/{}",
            self.pager.page(),
            self.pager.total_pages().max(1)
        );
        let records = format!("{} records", self.pager.total_records());
        let size = format!("{} per page", self.pager.page_size());

        Line::from(vec![
            Span::styled(pages, theme::tab_active()),
            Span::styled("  ·  ", theme::key_hint()),
            Span::styled(records, theme::metric_label()),
            Span::styled("  ·  ", theme::key_hint()),
            Span::styled(size, theme::metric_label()),
            Span::styled("    ", theme::key_hint()),
            Span::styled("←/→", theme::key_hint_key()),
            Span::styled(" page  ", theme::key_hint()),
            Span::styled("p", theme::key_hint_key()),
            Span::styled(" size  ", theme::key_hint()),
            Span::styled("r", theme::key_hint_key()),
            Span::styled(" reload", theme::key_hint()),
        ])
    }
}

impl Component for EntriesScreen {
    fn init(&mut self, action_tx: UnboundedSender<Action>) -> Result<()> {
        self.action_tx = Some(action_tx);
        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Left => {
                if self.pager.prev_page() {
                    self.fetch_current_page();
                }
            }
            KeyCode::Right => {
                if self.pager.next_page() {
                    self.fetch_current_page();
                }
            }
            KeyCode::Char('p') => {
                if self.pager.cycle_page_size() {
                    self.selected_row = 0;
                    self.fetch_current_page();
                }
            }
            KeyCode::Char('r') => self.fetch_current_page(),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::EntriesLoaded(page) => {
                self.loading = false;
                self.error = None;
                self.pager
                    .apply_totals(page.page_number, page.total_pages, page.total_records);
                self.selected_row = self
                    .selected_row
                    .min(page.records.len().saturating_sub(1));
                self.page = Some(Arc::clone(page));
            }
            Action::EntriesLoadFailed(message) => {
                self.loading = false;
                self.error = Some(message.clone());
            }
            Action::SiteSelected(_) | Action::DateRangeChanged(_) => {
                self.pager.reset();
                self.page = None;
                self.error = None;
                self.selected_row = 0;
                if self.focused {
                    self.fetch_current_page();
                }
            }
            Action::SessionEnded => {
                self.pager.reset();
                self.page = None;
                self.loading = false;
                self.error = None;
                self.selected_row = 0;
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.focused {
                theme::border_focused()
            } else {
                theme::border_default()
            })
            .title(Span::styled(" Entry / Exit Records ", theme::title_style()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(inner);

        if let Some(ref error) = self.error {
            frame.render_widget(
                Paragraph::new(error.as_str())
                    .style(theme::error_text())
                    .alignment(Alignment::Center),
                rows[0],
            );
        } else if self.loading && self.page.is_none() {
            frame.render_widget(
                Paragraph::new("Loading records...")
                    .style(theme::empty_state())
                    .alignment(Alignment::Center),
                rows[0],
            );
        } else if let Some(page) = self.page.clone() {
            self.render_table(frame, rows[0], &page);
        } else {
            frame.render_widget(
                Paragraph::new("No data loaded")
                    .style(theme::empty_state())
                    .alignment(Alignment::Center),
                rows[0],
            );
        }

        frame.render_widget(Paragraph::new(self.footer_line()), rows[1]);
    }

    fn set_focused(&mut self, focused: bool) {
        let was = self.focused;
        self.focused = focused;
        // First visit loads page one
        if focused && !was && self.page.is_none() && !self.loading {
            self.fetch_current_page();
        }
    }

    fn id(&self) -> &str {
        "entries"
    }
}
