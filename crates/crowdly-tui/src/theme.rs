//! Color palette and semantic styling for the TUI.

use crowdly_core::AlertSeverity;
use ratatui::style::{Color, Modifier, Style};

// ── Core Palette ──────────────────────────────────────────────────────

pub const ACCENT_TEAL: Color = Color::Rgb(94, 234, 212); // #5eead4
pub const ACCENT_BLUE: Color = Color::Rgb(96, 165, 250); // #60a5fa
pub const ACCENT_PINK: Color = Color::Rgb(244, 114, 182); // #f472b6
pub const WARN_AMBER: Color = Color::Rgb(251, 191, 36); // #fbbf24
pub const SUCCESS_GREEN: Color = Color::Rgb(74, 222, 128); // #4ade80
pub const ERROR_RED: Color = Color::Rgb(248, 113, 113); // #f87171

// ── Extended Palette ──────────────────────────────────────────────────

pub const DIM_WHITE: Color = Color::Rgb(203, 213, 225); // #cbd5e1
pub const BORDER_GRAY: Color = Color::Rgb(71, 85, 105); // #475569
pub const BG_HIGHLIGHT: Color = Color::Rgb(30, 41, 59); // #1e293b
pub const BG_DARK: Color = Color::Rgb(15, 23, 42); // #0f172a

// ── Semantic Styles ───────────────────────────────────────────────────

/// Title text for blocks/panels.
pub fn title_style() -> Style {
    Style::default().fg(ACCENT_TEAL).add_modifier(Modifier::BOLD)
}

/// Border for a focused panel.
pub fn border_focused() -> Style {
    Style::default().fg(ACCENT_BLUE)
}

/// Border for an unfocused panel.
pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Table header row.
pub fn table_header() -> Style {
    Style::default()
        .fg(ACCENT_TEAL)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

/// Normal table row text.
pub fn table_row() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Selected / highlighted table row.
pub fn table_selected() -> Style {
    Style::default()
        .fg(ACCENT_BLUE)
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Active tab in the tab bar.
pub fn tab_active() -> Style {
    Style::default().fg(ACCENT_BLUE).add_modifier(Modifier::BOLD)
}

/// Inactive tab in the tab bar.
pub fn tab_inactive() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Key hint text (e.g., "q quit  ? help").
pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Key hint key character.
pub fn key_hint_key() -> Style {
    Style::default().fg(ACCENT_TEAL).add_modifier(Modifier::BOLD)
}

/// Big metric value on a dashboard card.
pub fn metric_value() -> Style {
    Style::default().fg(ACCENT_TEAL).add_modifier(Modifier::BOLD)
}

/// Metric card caption.
pub fn metric_label() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Widget error / empty-state text.
pub fn empty_state() -> Style {
    Style::default().fg(BORDER_GRAY).add_modifier(Modifier::ITALIC)
}

/// Inline form error text.
pub fn error_text() -> Style {
    Style::default().fg(ERROR_RED)
}

/// Severity color for an alert row or banner.
pub fn severity_color(severity: AlertSeverity) -> Color {
    match severity {
        AlertSeverity::High => ERROR_RED,
        AlertSeverity::Medium => WARN_AMBER,
        AlertSeverity::Low => ACCENT_BLUE,
    }
}

pub fn severity_style(severity: AlertSeverity) -> Style {
    Style::default().fg(severity_color(severity))
}
