//! Screen identifier enum.

use std::fmt;

/// Identifies each primary TUI screen. Dashboard and Entries are
/// navigable by number keys; Login is entered only through the auth
/// state (startup without a session, logout, forced logout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenId {
    #[default]
    Login,
    Dashboard, // 1
    Entries,   // 2
}

impl ScreenId {
    /// Screens in tab-bar order (Login is not in the tab bar).
    pub const TABS: [ScreenId; 2] = [Self::Dashboard, Self::Entries];

    pub fn number(self) -> u8 {
        match self {
            Self::Login => 0,
            Self::Dashboard => 1,
            Self::Entries => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Dashboard),
            2 => Some(Self::Entries),
            _ => None,
        }
    }

    /// Next tab-bar screen (wraps around).
    pub fn next(self) -> Self {
        let idx = Self::TABS.iter().position(|&s| s == self).unwrap_or(0);
        Self::TABS[(idx + 1) % Self::TABS.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Login => "Sign In",
            Self::Dashboard => "Dashboard",
            Self::Entries => "Entries",
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
