// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recorded interaction steps.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Event kind recorded by capture sessions as the first step of every trace.
pub const START_EVENT: &str = "(start)";

/// Structural description of the interface element an event targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementTarget {
    /// Element tag, e.g. `button`.
    pub tag_name: String,
    /// Visible text content, if any.
    #[serde(default)]
    pub text_content: Option<String>,
    /// Element attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Enclosing element, walking towards the document root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ParentLink>>,
}

impl ElementTarget {
    /// Target with a tag and text content, no attributes and no parent.
    pub fn new(tag_name: impl Into<String>, text_content: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            text_content: Some(text_content.into()),
            attributes: BTreeMap::new(),
            parent: None,
        }
    }

    /// Equality that ignores the `parent` chain.
    #[must_use]
    pub fn same_element(&self, other: &Self) -> bool {
        self.tag_name == other.tag_name
            && self.text_content == other.text_content
            && self.attributes == other.attributes
    }
}

/// Position of an element inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentLink {
    /// The parent element.
    pub element: ElementTarget,
    /// Index among all children of the parent.
    pub child_index: i64,
    /// Index among the parent's children sharing the child's tag.
    pub tag_index: i64,
}

/// One recorded event: event kind plus target description or manual label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Event kind, e.g. `click`.
    pub event_type: String,
    /// Element the event targeted.
    #[serde(default)]
    pub target: Option<ElementTarget>,
    /// Label supplied by the user instead of (or on top of) the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_label: Option<String>,
}

impl Step {
    /// The marker step a capture session records when it starts.
    #[must_use]
    pub fn start_marker() -> Self {
        Self {
            event_type: START_EVENT.to_owned(),
            target: None,
            manual_label: None,
        }
    }

    /// A click on a `tag` element showing `text`.
    pub fn click(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            event_type: "click".to_owned(),
            target: Some(ElementTarget::new(tag, text)),
            manual_label: None,
        }
    }

    /// An event identified by a manual label only.
    pub fn labeled(event_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target: None,
            manual_label: Some(label.into()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.manual_label {
            return write!(f, "{} [{label}]", self.event_type);
        }
        match self.target.as_ref().and_then(|t| t.text_content.as_deref()) {
            Some(text) => write!(f, "{} {text}", self.event_type),
            None => f.write_str(&self.event_type),
        }
    }
}
