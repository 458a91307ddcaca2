//! Consent data model
//!
//! A visitor's consent is one `ConsentState` per process. The `necessary`
//! category is not user-settable, so the state keeps its flags private and
//! only exposes constructors that pin `necessary` to `true`.
//!
//! Effective consent (what gated features actually check) is derived from the
//! raw flags and the `has_responded` gate:
//! - `necessary` is always granted
//! - `analytics` / `marketing` are granted only after the visitor has made an
//!   explicit choice AND the category flag is set

use std::fmt;
use std::str::FromStr;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Named bucket of data processing the visitor approves or denies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentCategory {
    /// Required for the site to work; always granted
    Necessary,
    /// Interaction tracking
    Analytics,
    /// Marketing and advertising integrations
    Marketing,
}

impl ConsentCategory {
    /// Every category, in display order
    pub const ALL: [ConsentCategory; 3] = [
        ConsentCategory::Necessary,
        ConsentCategory::Analytics,
        ConsentCategory::Marketing,
    ];

    /// Wire / storage name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentCategory::Necessary => "necessary",
            ConsentCategory::Analytics => "analytics",
            ConsentCategory::Marketing => "marketing",
        }
    }

    /// Whether the visitor may change this category
    pub fn is_optional(&self) -> bool {
        !matches!(self, ConsentCategory::Necessary)
    }
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "necessary" => Ok(ConsentCategory::Necessary),
            "analytics" => Ok(ConsentCategory::Analytics),
            "marketing" => Ok(ConsentCategory::Marketing),
            other => Err(Error::InvalidInput(format!(
                "unknown consent category '{}'",
                other
            ))),
        }
    }
}

/// Per-category consent flags plus the "has the visitor responded" gate
///
/// Serialized form (also the persisted record):
/// `{"necessary":true,"analytics":false,"marketing":false,"hasResponded":false}`
///
/// Deserialization tolerates missing fields (they default to `false`) and
/// always forces `necessary` back to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawConsentState")]
pub struct ConsentState {
    necessary: bool,
    analytics: bool,
    marketing: bool,
    has_responded: bool,
}

/// Wire shape accepted on deserialization before `necessary` is pinned
///
/// Only a JSON object is accepted. Known flags must be booleans when
/// present; unknown keys are ignored.
#[derive(Debug, Default)]
struct RawConsentState {
    analytics: bool,
    marketing: bool,
    has_responded: bool,
}

impl<'de> Deserialize<'de> for RawConsentState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RawConsentVisitor)
    }
}

struct RawConsentVisitor;

impl<'de> Visitor<'de> for RawConsentVisitor {
    type Value = RawConsentState;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a consent record object")
    }

    // No visit_seq: positional arrays are not a consent record
    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut raw = RawConsentState::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                // Read for validation only; always forced back to true
                "necessary" => {
                    map.next_value::<bool>()?;
                }
                "analytics" => raw.analytics = map.next_value()?,
                "marketing" => raw.marketing = map.next_value()?,
                "hasResponded" => raw.has_responded = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(raw)
    }
}

impl From<RawConsentState> for ConsentState {
    fn from(raw: RawConsentState) -> Self {
        ConsentState::from_parts(raw.analytics, raw.marketing, raw.has_responded)
    }
}

impl Default for ConsentState {
    /// Initial unresolved state: nothing optional granted, no response yet
    fn default() -> Self {
        ConsentState::from_parts(false, false, false)
    }
}

impl ConsentState {
    /// Build a state from the user-settable flags; `necessary` is always `true`
    pub fn from_parts(analytics: bool, marketing: bool, has_responded: bool) -> Self {
        Self {
            necessary: true,
            analytics,
            marketing,
            has_responded,
        }
    }

    /// Result of "accept all"
    pub fn accepted_all() -> Self {
        ConsentState::from_parts(true, true, true)
    }

    /// Result of "accept necessary only"
    pub fn necessary_only() -> Self {
        ConsentState::from_parts(false, false, true)
    }

    /// Copy of this state with one optional category changed
    ///
    /// Marks the visitor as having responded and leaves the other category
    /// untouched. Returns `None` for `Necessary`, which cannot be changed.
    pub fn with_category(&self, category: ConsentCategory, value: bool) -> Option<Self> {
        let mut next = *self;
        match category {
            ConsentCategory::Necessary => return None,
            ConsentCategory::Analytics => next.analytics = value,
            ConsentCategory::Marketing => next.marketing = value,
        }
        next.has_responded = true;
        Some(next)
    }

    pub fn necessary(&self) -> bool {
        self.necessary
    }

    pub fn analytics(&self) -> bool {
        self.analytics
    }

    pub fn marketing(&self) -> bool {
        self.marketing
    }

    pub fn has_responded(&self) -> bool {
        self.has_responded
    }

    /// Raw stored flag for a category, ignoring the response gate
    pub fn flag(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Necessary => self.necessary,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
        }
    }

    /// Effective consent for a category
    pub fn has_consent(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Necessary => true,
            _ => self.has_responded && self.flag(category),
        }
    }

    /// Effective consent for every category at once
    pub fn effective(&self) -> EffectiveConsent {
        EffectiveConsent {
            necessary: self.has_consent(ConsentCategory::Necessary),
            analytics: self.has_consent(ConsentCategory::Analytics),
            marketing: self.has_consent(ConsentCategory::Marketing),
        }
    }
}

/// Derived consent actually used to gate behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConsent {
    pub necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unresolved() {
        let state = ConsentState::default();
        assert!(state.necessary());
        assert!(!state.analytics());
        assert!(!state.marketing());
        assert!(!state.has_responded());
    }

    #[test]
    fn test_necessary_granted_before_response() {
        let state = ConsentState::default();
        assert!(state.has_consent(ConsentCategory::Necessary));
        assert!(!state.has_consent(ConsentCategory::Analytics));
        assert!(!state.has_consent(ConsentCategory::Marketing));
    }

    #[test]
    fn test_flag_without_response_is_not_consent() {
        // A stale analytics flag must not count until the visitor responds
        let state = ConsentState::from_parts(true, true, false);
        assert!(state.flag(ConsentCategory::Analytics));
        assert!(!state.has_consent(ConsentCategory::Analytics));
        assert!(!state.has_consent(ConsentCategory::Marketing));
    }

    #[test]
    fn test_with_category_keeps_other_flag() {
        let state = ConsentState::from_parts(true, false, true);
        let next = state
            .with_category(ConsentCategory::Marketing, true)
            .expect("marketing is optional");
        assert!(next.analytics());
        assert!(next.marketing());
        assert!(next.has_responded());
    }

    #[test]
    fn test_with_category_rejects_necessary() {
        let state = ConsentState::default();
        assert!(state.with_category(ConsentCategory::Necessary, false).is_none());
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(ConsentState::accepted_all()).unwrap();
        assert_eq!(json["necessary"], true);
        assert_eq!(json["analytics"], true);
        assert_eq!(json["marketing"], true);
        assert_eq!(json["hasResponded"], true);
    }

    #[test]
    fn test_deserialize_forces_necessary() {
        let state: ConsentState =
            serde_json::from_str(r#"{"necessary":false,"analytics":true,"hasResponded":true}"#)
                .unwrap();
        assert!(state.necessary());
        assert!(state.analytics());
        assert!(!state.marketing());
        assert!(state.has_responded());
    }

    #[test]
    fn test_deserialize_rejects_non_object() {
        assert!(serde_json::from_str::<ConsentState>("[true, false]").is_err());
        assert!(serde_json::from_str::<ConsentState>("[]").is_err());
        assert!(serde_json::from_str::<ConsentState>("[true,true,true,true]").is_err());
        assert!(serde_json::from_str::<ConsentState>(r#"{"necessary":"yes"}"#).is_err());
        assert!(serde_json::from_str::<ConsentState>("null").is_err());
        assert!(serde_json::from_str::<ConsentState>(r#"{"analytics":"yes"}"#).is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "Analytics".parse::<ConsentCategory>().unwrap(),
            ConsentCategory::Analytics
        );
        assert_eq!(
            " marketing ".parse::<ConsentCategory>().unwrap(),
            ConsentCategory::Marketing
        );
        assert!(matches!(
            "tracking".parse::<ConsentCategory>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_effective_matches_has_consent() {
        let state = ConsentState::necessary_only();
        let effective = state.effective();
        for category in ConsentCategory::ALL {
            let expected = state.has_consent(category);
            let actual = match category {
                ConsentCategory::Necessary => effective.necessary,
                ConsentCategory::Analytics => effective.analytics,
                ConsentCategory::Marketing => effective.marketing,
            };
            assert_eq!(actual, expected, "category {}", category);
        }
    }
}
