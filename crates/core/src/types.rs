use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names owned by the tree engine. Patches and extra payloads may not shadow them.
const RESERVED_KEYS: &[&str] = &["id", "name", "parent_id", "sort", "sort_index", "children"];

/// Drops keys the tree engine owns so a flattened `extra` cannot duplicate them.
pub fn strip_reserved(extra: Map<String, Value>) -> Map<String, Value> {
    extra
        .into_iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .collect()
}

/// Flat category record as delivered by the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,
    /// Backend fields the engine does not interpret (slug, status, image, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlatCategory {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: parent_id.map(str::to_owned),
            sort: None,
            extra: Map::new(),
        }
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Node of the in-memory category forest. Children are owned exclusively by their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub sort_index: usize,
    #[serde(default)]
    pub children: Vec<CategoryNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CategoryNode {
    /// Creates a detached leaf, typically for an optimistic local insert.
    pub fn leaf(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            sort_index: 0,
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Ids of this node and all of its descendants, in pre-order.
    pub fn subtree_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.id.as_str()];
        for child in &self.children {
            ids.extend(child.subtree_ids());
        }
        ids
    }
}

/// Partial update applied by `tree::update_node`.
///
/// Identity, parentage, position and children cannot be patched; structural
/// changes go through `move_node` / `reorder`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            extra: Map::new(),
        }
    }

    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.extra.is_empty()
    }

    pub(crate) fn apply(&self, node: &mut CategoryNode) {
        if let Some(name) = &self.name {
            node.name = name.clone();
        }
        node.extra.extend(strip_reserved(self.extra.clone()));
    }
}

/// Position of one node inside a renumbered sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingPosition {
    pub id: String,
    pub parent_id: Option<String>,
    pub sort_index: usize,
}

/// Result of `tree::reorder`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderPlan {
    pub tree: Vec<CategoryNode>,
    /// Renumbered list the source left. Empty when the move stayed inside one list.
    pub origin: Vec<SiblingPosition>,
    /// Renumbered list the source landed in.
    pub destination: Vec<SiblingPosition>,
}

impl ReorderPlan {
    /// All positions the caller has to persist, destination first.
    pub fn positions(&self) -> impl Iterator<Item = &SiblingPosition> {
        self.destination.iter().chain(self.origin.iter())
    }
}

/// Category name as sent by the backend: either resolved or keyed by locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedName {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedName {
    const FALLBACK_LOCALE: &'static str = "en";

    /// Resolves the display name for `locale`, falling back to English and then
    /// to the first available translation.
    pub fn resolve(&self, locale: &str) -> String {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Localized(values) => values
                .get(locale)
                .or_else(|| values.get(Self::FALLBACK_LOCALE))
                .or_else(|| values.values().next())
                .cloned()
                .unwrap_or_default(),
        }
    }
}
