//! Brand name derivation from ad titles.
//!
//! Ad titles are free-form trafficking strings such as
//! `250415_OMD_The Home Depot_HD Home Awareness Q2'25`. The brand shown in the
//! rendered video is picked by a best-effort chain of rules evaluated in
//! [`BrandRule::ORDER`]; the first rule that yields a value wins. The chain is
//! a heuristic, not a parser: titles with short campaign codes in the second
//! segment can still produce the wrong brand.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Brand used when the title is empty or every rule produces nothing.
pub const DEFAULT_BRAND: &str = "Default Brand";

static OMD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_OMD_([^_]+)_").expect("valid OMD pattern"));

/// One step of the brand derivation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BrandRule {
    /// `_OMD_<brand>_` agency pattern, case-insensitive
    OmdSegment,
    /// Second underscore segment when longer than two characters
    SecondSegment,
    /// First underscore segment longer than three characters starting uppercase
    CapitalizedSegment,
    /// Title up to the first `(`, trimmed
    TitlePrefix,
    /// Nothing matched; [`DEFAULT_BRAND`] was used
    Default,
}

impl BrandRule {
    /// Evaluation order of the chain.
    pub const ORDER: [BrandRule; 4] = [
        BrandRule::OmdSegment,
        BrandRule::SecondSegment,
        BrandRule::CapitalizedSegment,
        BrandRule::TitlePrefix,
    ];

    /// Apply this rule to a title.
    pub fn apply(self, title: &str) -> Option<String> {
        match self {
            BrandRule::OmdSegment => OMD_PATTERN
                .captures(title)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            BrandRule::SecondSegment => title
                .split('_')
                .nth(1)
                .filter(|segment| segment.chars().count() > 2)
                .map(str::to_string),
            BrandRule::CapitalizedSegment => title
                .split('_')
                .find(|segment| {
                    segment.chars().count() > 3
                        && segment.chars().next().is_some_and(char::is_uppercase)
                })
                .map(str::to_string),
            BrandRule::TitlePrefix => title
                .split('(')
                .next()
                .map(str::trim)
                .filter(|prefix| !prefix.is_empty())
                .map(str::to_string),
            BrandRule::Default => Some(DEFAULT_BRAND.to_string()),
        }
    }

    /// Get string representation of the rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            BrandRule::OmdSegment => "omd_segment",
            BrandRule::SecondSegment => "second_segment",
            BrandRule::CapitalizedSegment => "capitalized_segment",
            BrandRule::TitlePrefix => "title_prefix",
            BrandRule::Default => "default",
        }
    }
}

impl fmt::Display for BrandRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Short display brand derived from an ad title. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct BrandName(String);

impl BrandName {
    /// Derive the brand for `title`.
    pub fn from_title(title: &str) -> Self {
        Self::derive(title).0
    }

    /// Derive the brand and report which rule produced it.
    pub fn derive(title: &str) -> (Self, BrandRule) {
        if title.is_empty() {
            return (Self(DEFAULT_BRAND.to_string()), BrandRule::Default);
        }

        BrandRule::ORDER
            .iter()
            .find_map(|rule| rule.apply(title).map(|brand| (Self(brand), *rule)))
            .unwrap_or_else(|| (Self(DEFAULT_BRAND.to_string()), BrandRule::Default))
    }

    /// Borrow the brand text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BrandName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
