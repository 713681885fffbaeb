use serde::{Deserialize, Serialize};

/// Property carrying the license-clearing state (e.g. `APPROVED`, `NEW_CLEARING`).
pub const PROP_CLEARING_STATE: &str = "internal:clearing:clearing-state";
/// Property flagging a component as internally developed.
pub const PROP_IS_INTERNAL: &str = "internal:clearing:is-internal";
/// Property flagging a component as a development-only dependency.
pub const PROP_IS_DEVELOPMENT: &str = "internal:clearing:is-development";
/// Property naming the repository the artifact currently lives in.
pub const PROP_REPO_NAME: &str = "internal:clearing:repo-name";
/// Property holding the resolved repository path after promotion.
pub const PROP_REPO_PATH: &str = "internal:clearing:repo-path";

/// Clearing state value that marks a third-party component as cleared.
pub const CLEARING_STATE_APPROVED: &str = "APPROVED";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bom {
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Bom {
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>, // npm scope, e.g. "@angular"
    pub purl: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Component {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Reads a boolean marker; anything other than `true` (any case) is false.
    pub fn flag(&self, name: &str) -> bool {
        self.property(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.properties.push(Property {
                name: name.to_string(),
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
