//! Click attribution
//!
//! Pure functions from a click to the interaction worth reporting. No
//! consent checks and no delivery happen here.

use serde::{Deserialize, Serialize};

use super::clicks::ClickEvent;
use super::dom::{Document, NodeId};

/// Attribute that names an element for analytics
pub const TRACK_ATTRIBUTE: &str = "data-track";

/// Longest visible-text identifier, in characters
pub const MAX_TEXT_IDENTIFIER_CHARS: usize = 50;

/// Identifier used when nothing better is available
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Element type used when nothing better is available
pub const FALLBACK_ELEMENT_TYPE: &str = "element";

/// ARIA roles that mark an element as interactive
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "checkbox",
    "link",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "option",
    "radio",
    "switch",
    "tab",
    "treeitem",
];

/// One tracked click, as handed to the analytics sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedInteraction {
    pub element_identifier: String,
    pub element_type: String,
    pub position_x: f64,
    pub position_y: f64,
}

/// Resolve and describe the interactive element behind a click
///
/// `None` when no element on the path from the target to the root is
/// interactive.
pub fn detect(event: &ClickEvent<'_>) -> Option<TrackedInteraction> {
    let doc = event.document;
    let element = doc.closest(event.target, is_interactive)?;

    Some(TrackedInteraction {
        element_identifier: element_identifier(doc, element),
        element_type: element_type(doc, element),
        position_x: event.x,
        position_y: event.y,
    })
}

/// Button, anchor, interactive ARIA role, or explicit tracking tag
pub fn is_interactive(doc: &Document, node: NodeId) -> bool {
    if matches!(doc.tag(node), Some("button") | Some("a")) {
        return true;
    }
    let interactive_role = role(doc, node)
        .is_some_and(|r| INTERACTIVE_ROLES.contains(&r.to_ascii_lowercase().as_str()));
    if interactive_role {
        return true;
    }
    doc.attribute(node, TRACK_ATTRIBUTE).is_some()
}

/// First non-empty of: id, tracking tag, trimmed text (50 chars), "unknown"
pub fn element_identifier(doc: &Document, node: NodeId) -> String {
    let non_empty = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);

    non_empty(doc.attribute(node, "id"))
        .or_else(|| non_empty(doc.attribute(node, TRACK_ATTRIBUTE)))
        .or_else(|| {
            let text = doc.text_content(node);
            let text: String = text
                .trim()
                .chars()
                .take(MAX_TEXT_IDENTIFIER_CHARS)
                .collect();
            non_empty(Some(text.as_str()))
        })
        .unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())
}

/// "link", "button", the ARIA role, or "element"
pub fn element_type(doc: &Document, node: NodeId) -> String {
    match doc.tag(node) {
        Some("a") => "link".to_string(),
        Some("button") => "button".to_string(),
        _ => role(doc, node)
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_ELEMENT_TYPE.to_string()),
    }
}

/// Trimmed role attribute, as written; case only matters for matching
fn role(doc: &Document, node: NodeId) -> Option<&str> {
    doc.attribute(node, "role")
        .map(str::trim)
        .filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(doc: &Document, target: NodeId) -> Option<TrackedInteraction> {
        detect(&ClickEvent::new(doc, target, 120.0, 48.5))
    }

    #[test]
    fn test_button_with_id() {
        let mut doc = Document::new();
        let button = doc.create_element("button");
        doc.set_attribute(button, "id", "submit");
        doc.append_text(button, "Send");

        let tracked = click(&doc, button).unwrap();
        assert_eq!(tracked.element_identifier, "submit");
        assert_eq!(tracked.element_type, "button");
        assert_eq!(tracked.position_x, 120.0);
        assert_eq!(tracked.position_y, 48.5);
    }

    #[test]
    fn test_click_on_child_resolves_closest_ancestor() {
        let mut doc = Document::new();
        let nav = doc.create_element("nav");
        doc.set_attribute(nav, "data-track", "main-nav");
        let link = doc.create_element("a");
        doc.set_attribute(link, "id", "home");
        let icon = doc.create_element("span");
        doc.append_child(nav, link);
        doc.append_child(link, icon);
        let text = doc.append_text(icon, "Home");

        // Closest wins, not the outer tracked nav
        let tracked = click(&doc, text).unwrap();
        assert_eq!(tracked.element_identifier, "home");
        assert_eq!(tracked.element_type, "link");
    }

    #[test]
    fn test_plain_div_is_ignored() {
        let mut doc = Document::new();
        let body = doc.create_element("body");
        let div = doc.create_element("div");
        doc.append_child(body, div);
        doc.append_text(div, "Just text");

        assert!(click(&doc, div).is_none());
    }

    #[test]
    fn test_long_link_text_is_truncated() {
        let mut doc = Document::new();
        let link = doc.create_element("a");
        doc.append_text(
            link,
            "  Learn more about our very long service offering details page  ",
        );

        let tracked = click(&doc, link).unwrap();
        assert_eq!(
            tracked.element_identifier,
            "Learn more about our very long service offering de"
        );
        assert_eq!(tracked.element_identifier.chars().count(), 50);
        assert_eq!(tracked.element_type, "link");
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let mut doc = Document::new();
        let button = doc.create_element("button");
        doc.append_text(button, &"é".repeat(60));

        let tracked = click(&doc, button).unwrap();
        assert_eq!(tracked.element_identifier, "é".repeat(50));
    }

    #[test]
    fn test_identifier_priority() {
        let mut doc = Document::new();
        let button = doc.create_element("button");
        doc.set_attribute(button, "data-track", "hero-cta");
        doc.append_text(button, "Get started");

        // Tracking tag beats text
        assert_eq!(element_identifier(&doc, button), "hero-cta");

        // Empty id is skipped
        doc.set_attribute(button, "id", "");
        assert_eq!(element_identifier(&doc, button), "hero-cta");

        doc.set_attribute(button, "id", "start");
        assert_eq!(element_identifier(&doc, button), "start");
    }

    #[test]
    fn test_identifier_unknown_without_text() {
        let mut doc = Document::new();
        let button = doc.create_element("button");
        doc.append_text(button, "   ");

        assert_eq!(element_identifier(&doc, button), UNKNOWN_IDENTIFIER);
    }

    #[test]
    fn test_aria_role_element() {
        let mut doc = Document::new();
        let tab = doc.create_element("div");
        doc.set_attribute(tab, "role", "Tab");
        doc.append_text(tab, "Pricing");

        let tracked = click(&doc, tab).unwrap();
        assert_eq!(tracked.element_type, "Tab");
        assert_eq!(tracked.element_identifier, "Pricing");
    }

    #[test]
    fn test_non_interactive_role_is_ignored() {
        let mut doc = Document::new();
        let region = doc.create_element("section");
        doc.set_attribute(region, "role", "region");

        assert!(click(&doc, region).is_none());
    }

    #[test]
    fn test_tracking_tag_without_role_is_generic_element() {
        let mut doc = Document::new();
        let card = doc.create_element("div");
        doc.set_attribute(card, "data-track", "portfolio-card");

        let tracked = click(&doc, card).unwrap();
        assert_eq!(tracked.element_identifier, "portfolio-card");
        assert_eq!(tracked.element_type, FALLBACK_ELEMENT_TYPE);
    }

    #[test]
    fn test_tracked_element_with_non_interactive_role_reports_role() {
        let mut doc = Document::new();
        let img = doc.create_element("img");
        doc.set_attribute(img, "data-track", "logo");
        doc.set_attribute(img, "role", "presentation");

        assert_eq!(click(&doc, img).unwrap().element_type, "presentation");
    }

    #[test]
    fn test_role_reported_as_written() {
        let mut doc = Document::new();
        let item = doc.create_element("li");
        doc.set_attribute(item, "role", "  MenuItemCheckbox ");
        doc.set_attribute(item, "id", "dark-mode");

        let tracked = click(&doc, item).unwrap();
        assert_eq!(tracked.element_identifier, "dark-mode");
        assert_eq!(tracked.element_type, "MenuItemCheckbox");
    }
}
