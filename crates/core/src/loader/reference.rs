//! Resource references discovered in page markup.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::fetch::FetchMode;

/// What a referenced resource is used for, resolved once at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceRole {
    Stylesheet,
    Script,
    Icon,
}

impl ResourceRole {
    pub fn fetch_mode(self) -> FetchMode {
        match self {
            ResourceRole::Icon => FetchMode::Binary,
            ResourceRole::Stylesheet | ResourceRole::Script => FetchMode::Text,
        }
    }

    /// Attribute of the consuming element that receives the handle.
    pub fn sink(self) -> &'static str {
        match self {
            ResourceRole::Stylesheet | ResourceRole::Icon => "href",
            ResourceRole::Script => "src",
        }
    }

    /// Icons are immutable once cached.
    pub fn revalidates(self) -> bool {
        !matches!(self, ResourceRole::Icon)
    }
}

/// A locator together with the role of the element that referenced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ResourceReference {
    pub locator: String,
    pub role: ResourceRole,
}

impl ResourceReference {
    pub fn new(locator: impl Into<String>, role: ResourceRole) -> Self {
        Self { locator: locator.into(), role }
    }

    pub fn stylesheet(locator: impl Into<String>) -> Self {
        Self::new(locator, ResourceRole::Stylesheet)
    }

    pub fn script(locator: impl Into<String>) -> Self {
        Self::new(locator, ResourceRole::Script)
    }

    pub fn icon(locator: impl Into<String>) -> Self {
        Self::new(locator, ResourceRole::Icon)
    }
}

/// How the hosting context was navigated to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NavigationType {
    #[default]
    Navigate,
    Reload,
    BackForward,
    Prerender,
}

impl NavigationType {
    /// History traversals and prerenders keep whatever the page already shows.
    pub fn runs_loader(self) -> bool {
        matches!(self, NavigationType::Navigate | NavigationType::Reload)
    }
}
