//! Rule model for conditional containers

use serde::{Deserialize, Serialize};

/// Comparison operator selected for a condition in the rule builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Logic {
    Equal,
    NotEqual,
    Contains,
}

impl Logic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Logic::Equal => "equal",
            Logic::NotEqual => "not-equal",
            Logic::Contains => "contains",
        }
    }
}

impl std::fmt::Display for Logic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Logic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equal" => Ok(Logic::Equal),
            "not-equal" => Ok(Logic::NotEqual),
            "contains" => Ok(Logic::Contains),
            _ => Err(format!("Unknown logic: {}", s)),
        }
    }
}

/// What a matching condition does to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Show,
    Hide,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Show => "show",
            Visibility::Hide => "hide",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "show" => Ok(Visibility::Show),
            "hide" => Ok(Visibility::Hide),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

/// A single visibility condition from the persisted widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Profile attribute the condition reads
    pub user_key: String,
    /// Comparison operator
    pub logic: Logic,
    /// Value the attribute is compared against; always textual, even when
    /// the attribute itself holds numbers
    pub user_value: String,
    /// Whether a matching condition shows or hides the container
    pub visibility: Visibility,
}

impl Rule {
    pub fn new(
        user_key: impl Into<String>,
        logic: Logic,
        user_value: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            user_key: user_key.into(),
            logic,
            user_value: user_value.into(),
            visibility,
        }
    }
}

/// Outcome of evaluating one rule against a resolved attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Whether the rule matched; a matched rule decides visibility and ends
    /// the evaluation
    pub matched: bool,
    /// Visibility verdict, meaningful only when `matched` is true
    pub visible: bool,
}

impl RuleOutcome {
    /// A matched rule carrying its visibility verdict
    pub fn decisive(visible: bool) -> Self {
        Self {
            matched: true,
            visible,
        }
    }

    /// A rule that did not match (or was skipped); evaluation continues
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            visible: false,
        }
    }
}
