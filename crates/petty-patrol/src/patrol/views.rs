use serde::Serialize;
use tracing::debug;

use super::domain::{PlateText, Report, ReportId};

/// Payload shown on the celebration screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reward {
    Report {
        plate: PlateText,
        behavior_count: usize,
    },
    Deal {
        partner_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    Onboarding,
    Home,
    Analyzing,
    ManualEntry,
    LocationPicker,
    BehaviorPicker,
    Celebration { reward: Reward },
    PreviousReports { plate: PlateText, reports: Vec<Report> },
    Deals,
    Live,
    Badges,
    Settings,
    Editor { report_id: ReportId },
    Feedback,
    Paywall,
}

impl View {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::Home => "home",
            Self::Analyzing => "analyzing",
            Self::ManualEntry => "manual_entry",
            Self::LocationPicker => "location_picker",
            Self::BehaviorPicker => "behavior_picker",
            Self::Celebration { .. } => "celebration",
            Self::PreviousReports { .. } => "previous_reports",
            Self::Deals => "deals",
            Self::Live => "live",
            Self::Badges => "badges",
            Self::Settings => "settings",
            Self::Editor { .. } => "editor",
            Self::Feedback => "feedback",
            Self::Paywall => "paywall",
        }
    }

    /// Whether the bottom navigation is visible. A pure function of the view.
    pub const fn shows_navigation(&self) -> bool {
        matches!(
            self,
            Self::Home | Self::Deals | Self::Live | Self::Badges | Self::Settings
        )
    }
}

/// Destinations reachable from the persistent navigation chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavTab {
    Home,
    Live,
    Deals,
    Badges,
    Settings,
}

impl NavTab {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Home,
            Self::Live,
            Self::Deals,
            Self::Badges,
            Self::Settings,
        ]
    }

    pub fn view(self) -> View {
        match self {
            Self::Home => View::Home,
            Self::Live => View::Live,
            Self::Deals => View::Deals,
            Self::Badges => View::Badges,
            Self::Settings => View::Settings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("navigation is hidden on the {0} view")]
    ChromeHidden(&'static str),
    #[error("debug tools are disabled")]
    DebugToolsDisabled,
}

/// Route table: the tab bar plus debug-only jumps gated by one config-time flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTable {
    debug_tools: bool,
}

impl RouteTable {
    pub fn new(debug_tools: bool) -> Self {
        Self { debug_tools }
    }

    pub fn debug_tools(&self) -> bool {
        self.debug_tools
    }

    pub fn tab_target(&self, from: &View, tab: NavTab) -> Result<View, NavigationError> {
        if !from.shows_navigation() {
            return Err(NavigationError::ChromeHidden(from.name()));
        }
        Ok(tab.view())
    }

    pub fn debug_target(&self, target: View) -> Result<View, NavigationError> {
        if !self.debug_tools {
            return Err(NavigationError::DebugToolsDisabled);
        }
        Ok(target)
    }
}

/// Single current-view pointer.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: View,
    routes: RouteTable,
}

impl Navigator {
    pub fn new(initial: View, routes: RouteTable) -> Self {
        Self {
            current: initial,
            routes,
        }
    }

    pub fn current(&self) -> &View {
        &self.current
    }

    pub fn routes(&self) -> RouteTable {
        self.routes
    }

    /// Returns the view that was replaced.
    pub(crate) fn go(&mut self, next: View) -> View {
        debug!(from = self.current.name(), to = next.name(), "view transition");
        std::mem::replace(&mut self.current, next)
    }
}
