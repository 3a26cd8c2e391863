//! Screen implementations. Each screen is a top-level Component.

use std::collections::HashMap;

use crowdly_core::Controller;

use crate::component::Component;
use crate::screen::ScreenId;

pub mod dashboard;
pub mod entries;
pub mod login;

pub use dashboard::DashboardScreen;
pub use entries::EntriesScreen;
pub use login::LoginScreen;

/// Build the full screen set, keyed by [`ScreenId`].
pub fn create_screens(controller: &Controller) -> HashMap<ScreenId, Box<dyn Component>> {
    let mut screens: HashMap<ScreenId, Box<dyn Component>> = HashMap::new();
    screens.insert(ScreenId::Login, Box::new(LoginScreen::new(controller.clone())));
    screens.insert(
        ScreenId::Dashboard,
        Box::new(DashboardScreen::new(controller.clone())),
    );
    screens.insert(
        ScreenId::Entries,
        Box::new(EntriesScreen::new(controller.clone())),
    );
    screens
}
