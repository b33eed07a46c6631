//! Element locators.
//!
//! A [`Locator`] pairs a [`Strategy`] with a value. Most strategies are sent
//! to the server verbatim; the three attribute-match strategies
//! ([`Strategy::Text`], [`Strategy::Label`], [`Strategy::Value`]) are
//! rewritten into a class-chain query that scans every element for an exact
//! attribute match.
//!
//! ```
//! use wdrive_core::locator::{Locator, Strategy};
//!
//! let locator = Locator::label("Sign In");
//! assert_eq!(locator.strategy(), Strategy::Label);
//! assert_eq!(locator.using(), "class chain");
//! assert_eq!(locator.query(), "**/XCUIElementTypeAny[`label == 'Sign In'`]");
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

/// How the server should look an element up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Id,
    Name,
    AccessibilityId,
    XPath,
    ClassName,
    /// A raw class-chain query.
    ClassChain,
    /// Exact match on the element's `name` attribute.
    Text,
    /// Exact match on the element's `label` attribute.
    Label,
    /// Exact match on the element's `value` attribute.
    Value,
}

impl Strategy {
    pub const ALL: [Strategy; 9] = [
        Strategy::Id,
        Strategy::Name,
        Strategy::AccessibilityId,
        Strategy::XPath,
        Strategy::ClassName,
        Strategy::ClassChain,
        Strategy::Text,
        Strategy::Label,
        Strategy::Value,
    ];

    /// The `using` field sent on the wire.
    pub const fn using(self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::AccessibilityId => "accessibility id",
            Strategy::XPath => "xpath",
            Strategy::ClassName => "class name",
            Strategy::ClassChain | Strategy::Text | Strategy::Label | Strategy::Value => {
                "class chain"
            }
        }
    }

    /// Short human name, also accepted by [`FromStr`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::AccessibilityId => "accessibility_id",
            Strategy::XPath => "xpath",
            Strategy::ClassName => "class_name",
            Strategy::ClassChain => "class_chain",
            Strategy::Text => "text",
            Strategy::Label => "label",
            Strategy::Value => "value",
        }
    }

    /// Element attribute matched by the derived strategies.
    const fn attribute(self) -> Option<&'static str> {
        match self {
            Strategy::Text => Some("name"),
            Strategy::Label => Some("label"),
            Strategy::Value => Some("value"),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| format!("unknown locator strategy: {s}"))
    }
}

/// Builds the class-chain query matching `attribute == value` exactly.
fn attribute_chain(attribute: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("**/XCUIElementTypeAny[`{attribute} == '{escaped}'`]")
}

/// An immutable (strategy, value) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    strategy: Strategy,
    value: String,
}

impl Locator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new(Strategy::Name, value)
    }

    pub fn accessibility_id(value: impl Into<String>) -> Self {
        Self::new(Strategy::AccessibilityId, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(Strategy::ClassName, value)
    }

    pub fn class_chain(value: impl Into<String>) -> Self {
        Self::new(Strategy::ClassChain, value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(Strategy::Text, value)
    }

    pub fn label(value: impl Into<String>) -> Self {
        Self::new(Strategy::Label, value)
    }

    /// Match on the element's `value` attribute.
    pub fn value_attr(value: impl Into<String>) -> Self {
        Self::new(Strategy::Value, value)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The value as given by the caller, before any rewriting.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The `using` field sent on the wire.
    pub fn using(&self) -> &'static str {
        self.strategy.using()
    }

    /// The `value` field sent on the wire.
    pub fn query(&self) -> String {
        match self.strategy.attribute() {
            Some(attribute) => attribute_chain(attribute, &self.value),
            None => self.value.clone(),
        }
    }

    /// JSON body for the find-element(s) endpoints.
    pub fn to_body(&self) -> Value {
        json!({
            "using": self.using(),
            "value": self.query(),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.strategy, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_using_strings() {
        assert_eq!(Locator::id("a").using(), "id");
        assert_eq!(Locator::name("a").using(), "name");
        assert_eq!(Locator::accessibility_id("a").using(), "accessibility id");
        assert_eq!(Locator::xpath("//a").using(), "xpath");
        assert_eq!(Locator::class_name("XCUIElementTypeButton").using(), "class name");
        assert_eq!(Locator::class_chain("**/XCUIElementTypeCell").using(), "class chain");
        assert_eq!(Locator::text("a").using(), "class chain");
        assert_eq!(Locator::label("a").using(), "class chain");
        assert_eq!(Locator::value_attr("a").using(), "class chain");
    }

    #[test]
    fn derived_strategies_rewrite_to_class_chain() {
        assert_eq!(
            Locator::text("Login").query(),
            "**/XCUIElementTypeAny[`name == 'Login'`]"
        );
        assert_eq!(
            Locator::label("Log In").query(),
            "**/XCUIElementTypeAny[`label == 'Log In'`]"
        );
        assert_eq!(
            Locator::value_attr("42").query(),
            "**/XCUIElementTypeAny[`value == '42'`]"
        );
    }

    #[test]
    fn plain_strategies_pass_value_through() {
        let locator = Locator::xpath("//XCUIElementTypeButton[@name='OK']");
        assert_eq!(locator.query(), "//XCUIElementTypeButton[@name='OK']");
    }

    #[test]
    fn quotes_in_derived_values_are_escaped() {
        assert_eq!(
            Locator::label("Don't Allow").query(),
            r"**/XCUIElementTypeAny[`label == 'Don\'t Allow'`]"
        );
    }

    #[test]
    fn to_body_uses_rewritten_query() {
        let body = Locator::text("Settings").to_body();
        assert_eq!(body["using"], "class chain");
        assert_eq!(body["value"], "**/XCUIElementTypeAny[`name == 'Settings'`]");
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!("accessibility id".parse::<Strategy>().unwrap(), Strategy::AccessibilityId);
        assert_eq!("class-name".parse::<Strategy>().unwrap(), Strategy::ClassName);
        assert_eq!("XPATH".parse::<Strategy>().unwrap(), Strategy::XPath);
        assert!("css".parse::<Strategy>().is_err());

        for strategy in Strategy::ALL {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn display_keeps_original_value() {
        assert_eq!(Locator::label("Sign In").to_string(), "label 'Sign In'");
    }
}
