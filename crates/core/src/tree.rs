//! Category tree engine.
//!
//! Every operation takes the forest by reference and returns a new forest; the
//! caller's value is never modified. Operations that cannot be applied (unknown
//! id, cycle, duplicate id) hand back an unchanged copy or `None` instead of an
//! error, since the forest is a client-side view that may lag behind the server.
//!
//! After any mutation each touched sibling list carries `sort_index` values
//! `0..n-1` in list order.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::types::{
    strip_reserved, CategoryNode, FlatCategory, NodePatch, ReorderPlan, SiblingPosition,
};

/// Builds a forest from flat parent-referencing records.
///
/// Records whose parent is missing, unknown or themselves become roots. Records
/// caught in a parent cycle are promoted to roots so nothing is dropped. When an
/// id appears more than once the first record wins.
pub fn build_tree(records: &[FlatCategory]) -> Vec<CategoryNode> {
    let mut seen = HashSet::new();
    let unique: Vec<&FlatCategory> = records
        .iter()
        .filter(|record| seen.insert(record.id.as_str()))
        .collect();

    let mut children_of: HashMap<&str, Vec<&FlatCategory>> = HashMap::new();
    let mut roots = Vec::new();
    for record in &unique {
        match record.parent_id.as_deref() {
            Some(parent) if parent != record.id && seen.contains(parent) => {
                children_of.entry(parent).or_default().push(*record);
            }
            _ => roots.push(*record),
        }
    }

    let mut reached = HashSet::new();
    for root in &roots {
        mark_reachable(&root.id, &children_of, &mut reached);
    }
    for record in &unique {
        if !reached.contains(record.id.as_str()) {
            roots.push(*record);
            mark_reachable(&record.id, &children_of, &mut reached);
        }
    }

    let mut visited = HashSet::new();
    build_siblings(roots, None, &children_of, &mut visited)
}

fn mark_reachable<'a>(
    start: &'a str,
    children_of: &HashMap<&'a str, Vec<&'a FlatCategory>>,
    reached: &mut HashSet<&'a str>,
) {
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if !reached.insert(id) {
            continue;
        }
        if let Some(children) = children_of.get(id) {
            stack.extend(children.iter().map(|child| child.id.as_str()));
        }
    }
}

fn build_siblings<'a>(
    mut records: Vec<&'a FlatCategory>,
    parent_id: Option<&str>,
    children_of: &HashMap<&'a str, Vec<&'a FlatCategory>>,
    visited: &mut HashSet<&'a str>,
) -> Vec<CategoryNode> {
    records.retain(|record| visited.insert(record.id.as_str()));
    records.sort_by(|a, b| compare_records(a, b));

    let mut nodes = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let children = children_of
            .get(record.id.as_str())
            .cloned()
            .unwrap_or_default();
        nodes.push(CategoryNode {
            id: record.id.clone(),
            name: record.name.clone(),
            parent_id: parent_id.map(str::to_owned),
            sort_index: index,
            children: build_siblings(children, Some(&record.id), children_of, visited),
            extra: strip_reserved(record.extra.clone()),
        });
    }
    nodes
}

/// Explicit sort first (unsorted records last), then case-insensitive name, then id.
fn compare_records(a: &FlatCategory, b: &FlatCategory) -> Ordering {
    let by_sort = match (a.sort, b.sort) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_sort
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Flattens the forest in pre-order. `parent_id` comes from the containing node
/// and `sort` from the node's current `sort_index`.
pub fn flatten_tree(roots: &[CategoryNode]) -> Vec<FlatCategory> {
    let mut flat = Vec::new();
    flatten_into(roots, None, &mut flat);
    flat
}

fn flatten_into(nodes: &[CategoryNode], parent_id: Option<&str>, flat: &mut Vec<FlatCategory>) {
    for node in nodes {
        flat.push(FlatCategory {
            id: node.id.clone(),
            name: node.name.clone(),
            parent_id: parent_id.map(str::to_owned),
            sort: Some(node.sort_index as i64),
            extra: node.extra.clone(),
        });
        flatten_into(&node.children, Some(&node.id), flat);
    }
}

/// Root-to-target chain of ids, found depth first.
pub fn find_path(roots: &[CategoryNode], target_id: &str) -> Option<Vec<String>> {
    for node in roots {
        if node.id == target_id {
            return Some(vec![node.id.clone()]);
        }
        if let Some(mut path) = find_path(&node.children, target_id) {
            path.insert(0, node.id.clone());
            return Some(path);
        }
    }
    None
}

pub fn find_node<'t>(roots: &'t [CategoryNode], id: &str) -> Option<&'t CategoryNode> {
    for node in roots {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_node_mut<'t>(nodes: &'t mut [CategoryNode], id: &str) -> Option<&'t mut CategoryNode> {
    for node in nodes.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Sibling list owned by `parent_id`, or the root list for `None`.
fn siblings_mut<'t>(
    tree: &'t mut Vec<CategoryNode>,
    parent_id: Option<&str>,
) -> Option<&'t mut Vec<CategoryNode>> {
    match parent_id {
        None => Some(tree),
        Some(id) => find_node_mut(tree, id).map(|node| &mut node.children),
    }
}

/// Whether `node_id` may be placed under `new_parent_id` without creating a cycle.
pub fn can_reparent(roots: &[CategoryNode], node_id: &str, new_parent_id: Option<&str>) -> bool {
    if new_parent_id == Some(node_id) {
        return false;
    }
    if find_node(roots, node_id).is_none() {
        return false;
    }
    match new_parent_id {
        None => true,
        Some(parent) => find_path(roots, parent)
            .map_or(true, |path| !path.iter().any(|id| id == node_id)),
    }
}

/// Detaches `node_id` with its whole subtree. The tree is returned unchanged and
/// `removed` is `None` when the id is unknown.
pub fn remove_node(
    roots: &[CategoryNode],
    node_id: &str,
) -> (Vec<CategoryNode>, Option<CategoryNode>) {
    let mut tree = roots.to_vec();
    let removed = detach(&mut tree, node_id);
    (tree, removed)
}

fn detach(siblings: &mut Vec<CategoryNode>, node_id: &str) -> Option<CategoryNode> {
    if let Some(position) = siblings.iter().position(|node| node.id == node_id) {
        let node = siblings.remove(position);
        renumber(siblings);
        return Some(node);
    }
    siblings
        .iter_mut()
        .find_map(|node| detach(&mut node.children, node_id))
}

/// Inserts `node` under `new_parent_id` at `new_index`.
///
/// An unknown or absent parent inserts at root level. The index is clamped to the
/// list length, so `None` or an out-of-range value appends. Nothing happens when
/// any id of the inserted subtree already exists in the forest.
pub fn insert_node(
    roots: &[CategoryNode],
    node: CategoryNode,
    new_parent_id: Option<&str>,
    new_index: Option<usize>,
) -> Vec<CategoryNode> {
    let mut tree = roots.to_vec();
    if node
        .subtree_ids()
        .into_iter()
        .any(|id| find_node(&tree, id).is_some())
    {
        return tree;
    }
    attach(&mut tree, node, new_parent_id, new_index);
    tree
}

fn attach(
    tree: &mut Vec<CategoryNode>,
    mut node: CategoryNode,
    new_parent_id: Option<&str>,
    new_index: Option<usize>,
) {
    let parent_id = new_parent_id
        .filter(|id| find_node(tree, id).is_some())
        .map(str::to_owned);
    node.parent_id = parent_id.clone();

    if let Some(siblings) = siblings_mut(tree, parent_id.as_deref()) {
        let index = new_index.map_or(siblings.len(), |index| index.min(siblings.len()));
        siblings.insert(index, node);
        renumber(siblings);
    }
}

/// Moves `node_id` under `new_parent_id` at `new_index` (interpreted against the
/// target list once the node has left its old position). Returns an unchanged copy
/// when [`can_reparent`] refuses the move.
pub fn move_node(
    roots: &[CategoryNode],
    node_id: &str,
    new_parent_id: Option<&str>,
    new_index: Option<usize>,
) -> Vec<CategoryNode> {
    if !can_reparent(roots, node_id, new_parent_id) {
        return roots.to_vec();
    }
    let (mut tree, removed) = remove_node(roots, node_id);
    let Some(node) = removed else {
        return roots.to_vec();
    };
    attach(&mut tree, node, new_parent_id, new_index);
    tree
}

/// Applies `patch` to the first node (depth first) with `node_id`.
pub fn update_node(roots: &[CategoryNode], node_id: &str, patch: &NodePatch) -> Vec<CategoryNode> {
    let mut tree = roots.to_vec();
    if let Some(node) = find_node_mut(&mut tree, node_id) {
        patch.apply(node);
    }
    tree
}

/// Drag-and-drop style move of `source_id` from the list owned by `from_parent_id`
/// to position `to_index` of the list owned by `to_parent_id`.
///
/// `to_index` refers to the destination list as it looked before the source was
/// removed, so inside one list a forward move lands one slot earlier. Returns
/// `None` when the source is not in the origin list or the destination list cannot
/// be found once the source is detached (which rules out dropping a node into its
/// own subtree).
pub fn reorder(
    roots: &[CategoryNode],
    source_id: &str,
    from_parent_id: Option<&str>,
    to_parent_id: Option<&str>,
    to_index: usize,
) -> Option<ReorderPlan> {
    let mut tree = roots.to_vec();

    let origin = siblings_mut(&mut tree, from_parent_id)?;
    let from_index = origin.iter().position(|node| node.id == source_id)?;
    let mut node = origin.remove(from_index);
    renumber(origin);
    let origin_positions = positions(origin, from_parent_id);

    let same_list = from_parent_id == to_parent_id;
    let mut index = to_index;
    if same_list && to_index > from_index {
        index -= 1;
    }

    let destination = siblings_mut(&mut tree, to_parent_id)?;
    node.parent_id = to_parent_id.map(str::to_owned);
    let index = index.min(destination.len());
    destination.insert(index, node);
    renumber(destination);
    let destination_positions = positions(destination, to_parent_id);

    Some(ReorderPlan {
        tree,
        origin: if same_list {
            Vec::new()
        } else {
            origin_positions
        },
        destination: destination_positions,
    })
}

fn renumber(siblings: &mut [CategoryNode]) {
    for (index, node) in siblings.iter_mut().enumerate() {
        node.sort_index = index;
    }
}

fn positions(siblings: &[CategoryNode], parent_id: Option<&str>) -> Vec<SiblingPosition> {
    siblings
        .iter()
        .map(|node| SiblingPosition {
            id: node.id.clone(),
            parent_id: parent_id.map(str::to_owned),
            sort_index: node.sort_index,
        })
        .collect()
}

/// Nodes of `after` whose parent or sort index differ from `before`, in pre-order.
/// Nodes absent from `before` are always reported.
pub fn position_changes(before: &[CategoryNode], after: &[CategoryNode]) -> Vec<SiblingPosition> {
    let previous: HashMap<String, (Option<String>, i64)> = flatten_tree(before)
        .into_iter()
        .map(|record| (record.id, (record.parent_id, record.sort.unwrap_or_default())))
        .collect();

    flatten_tree(after)
        .into_iter()
        .filter_map(|record| {
            let sort_index = record.sort.unwrap_or_default();
            let unchanged = previous
                .get(&record.id)
                .is_some_and(|(parent_id, sort)| *parent_id == record.parent_id && *sort == sort_index);
            (!unchanged).then(|| SiblingPosition {
                id: record.id,
                parent_id: record.parent_id,
                sort_index: sort_index as usize,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, parent: Option<&str>, name: &str, sort: i64) -> FlatCategory {
        FlatCategory::new(id, name, parent).with_sort(sort)
    }

    fn sample() -> Vec<CategoryNode> {
        build_tree(&[
            record("1", None, "A", 0),
            record("2", Some("1"), "B", 0),
            record("3", Some("1"), "C", 1),
        ])
    }

    /// Larger fixture:
    /// ```text
    /// electronics
    ///   phones
    ///     android
    ///     iphone
    ///   laptops
    /// clothing
    ///   shoes
    /// ```
    fn catalog() -> Vec<CategoryNode> {
        build_tree(&[
            record("electronics", None, "Electronics", 0),
            record("clothing", None, "Clothing", 1),
            record("phones", Some("electronics"), "Phones", 0),
            record("laptops", Some("electronics"), "Laptops", 1),
            record("android", Some("phones"), "Android", 0),
            record("iphone", Some("phones"), "iPhone", 1),
            record("shoes", Some("clothing"), "Shoes", 0),
        ])
    }

    fn ids(nodes: &[CategoryNode]) -> Vec<&str> {
        nodes.iter().map(|node| node.id.as_str()).collect()
    }

    fn assert_contiguous(nodes: &[CategoryNode]) {
        let indices: Vec<usize> = nodes.iter().map(|node| node.sort_index).collect();
        let expected: Vec<usize> = (0..nodes.len()).collect();
        assert_eq!(indices, expected, "sibling list {:?} is not contiguous", ids(nodes));
        for node in nodes {
            assert_contiguous(&node.children);
        }
    }

    #[test]
    fn builds_example_forest() {
        let tree = sample();
        assert_eq!(ids(&tree), vec!["1"]);
        assert_eq!(ids(&tree[0].children), vec!["2", "3"]);
        assert_eq!(tree[0].children[1].parent_id.as_deref(), Some("1"));
        assert_contiguous(&tree);
    }

    #[test]
    fn sorts_siblings_by_sort_then_name() {
        let tree = build_tree(&[
            FlatCategory::new("z", "zebra", None),
            FlatCategory::new("a", "Alpha", None),
            record("m", None, "Middle", 5),
            FlatCategory::new("b", "beta", None),
        ]);
        assert_eq!(ids(&tree), vec!["m", "a", "b", "z"]);
        assert_contiguous(&tree);
    }

    #[test]
    fn dangling_parent_becomes_root() {
        let tree = build_tree(&[
            record("1", None, "A", 0),
            record("2", Some("missing"), "B", 1),
        ]);
        assert_eq!(ids(&tree), vec!["1", "2"]);
        assert_eq!(tree[1].parent_id, None);
    }

    #[test]
    fn parent_cycle_in_input_is_broken() {
        let tree = build_tree(&[
            record("a", Some("b"), "A", 0),
            record("b", Some("a"), "B", 0),
            record("self", Some("self"), "Self", 1),
        ]);
        assert_eq!(ids(&tree), vec!["a", "self"]);
        assert_eq!(ids(&tree[0].children), vec!["b"]);
        assert!(tree[0].children[0].children.is_empty());
        assert_eq!(flatten_tree(&tree).len(), 3);
    }

    #[test]
    fn duplicate_ids_keep_first_record() {
        let tree = build_tree(&[
            record("1", None, "First", 0),
            record("1", None, "Second", 1),
        ]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name, "First");
    }

    #[test]
    fn find_path_returns_chain() {
        let tree = catalog();
        assert_eq!(
            find_path(&tree, "iphone"),
            Some(vec![
                "electronics".to_string(),
                "phones".to_string(),
                "iphone".to_string()
            ])
        );
        assert_eq!(find_path(&tree, "nope"), None);
    }

    #[test]
    fn can_reparent_rejects_self_descendant_and_unknown() {
        let tree = catalog();
        assert!(!can_reparent(&tree, "phones", Some("phones")));
        assert!(!can_reparent(&tree, "electronics", Some("android")));
        assert!(!can_reparent(&tree, "electronics", Some("phones")));
        assert!(!can_reparent(&tree, "ghost", None));
        assert!(can_reparent(&tree, "phones", Some("clothing")));
        assert!(can_reparent(&tree, "android", None));
        assert!(can_reparent(&tree, "android", Some("unknown-parent")));
    }

    #[test]
    fn move_into_descendant_is_a_noop() {
        let tree = catalog();
        let moved = move_node(&tree, "electronics", Some("iphone"), Some(0));
        assert_eq!(moved, tree);
    }

    #[test]
    fn move_to_root_matches_example() {
        let tree = sample();
        let moved = move_node(&tree, "3", None, Some(0));

        assert_eq!(ids(&moved), vec!["3", "1"]);
        assert_eq!(moved[0].sort_index, 0);
        assert_eq!(moved[0].parent_id, None);
        assert_eq!(moved[1].sort_index, 1);
        assert_eq!(ids(&moved[1].children), vec!["2"]);
        assert_eq!(moved[1].children[0].sort_index, 0);
        assert_contiguous(&moved);
    }

    #[test]
    fn move_across_parents_renumbers_both_lists() {
        let tree = catalog();
        let moved = move_node(&tree, "android", Some("clothing"), Some(0));

        let phones = find_node(&moved, "phones").expect("phones");
        assert_eq!(ids(&phones.children), vec!["iphone"]);
        let clothing = find_node(&moved, "clothing").expect("clothing");
        assert_eq!(ids(&clothing.children), vec!["android", "shoes"]);
        assert_eq!(clothing.children[0].parent_id.as_deref(), Some("clothing"));
        assert_contiguous(&moved);

        // untouched subtree compares equal
        assert_eq!(
            find_node(&moved, "laptops"),
            find_node(&tree, "laptops")
        );
    }

    #[test]
    fn move_out_of_range_index_appends() {
        let tree = catalog();
        let moved = move_node(&tree, "shoes", Some("electronics"), Some(99));
        let electronics = find_node(&moved, "electronics").expect("electronics");
        assert_eq!(ids(&electronics.children), vec!["phones", "laptops", "shoes"]);

        let appended = move_node(&tree, "shoes", Some("electronics"), None);
        assert_eq!(appended, moved);
    }

    #[test]
    fn move_leaves_input_untouched() {
        let tree = catalog();
        let snapshot = tree.clone();
        let _ = move_node(&tree, "phones", None, Some(0));
        let _ = reorder(&tree, "android", Some("phones"), Some("phones"), 2);
        let _ = update_node(&tree, "shoes", &NodePatch::rename("Sneakers"));
        assert_eq!(tree, snapshot);
    }

    #[test]
    fn remove_detaches_whole_subtree() {
        let tree = catalog();
        let (after, removed) = remove_node(&tree, "phones");
        let removed = removed.expect("removed");
        assert_eq!(ids(&removed.children), vec!["android", "iphone"]);
        let electronics = find_node(&after, "electronics").expect("electronics");
        assert_eq!(ids(&electronics.children), vec!["laptops"]);
        assert_eq!(electronics.children[0].sort_index, 0);
        assert!(find_node(&after, "android").is_none());
    }

    #[test]
    fn remove_unknown_id_is_a_noop() {
        let tree = catalog();
        let (after, removed) = remove_node(&tree, "ghost");
        assert!(removed.is_none());
        assert_eq!(after, tree);
    }

    #[test]
    fn insert_falls_back_to_root_and_stamps_parent() {
        let tree = catalog();
        let mut orphan = CategoryNode::leaf("toys", "Toys");
        orphan.parent_id = Some("stale".into());
        let inserted = insert_node(&tree, orphan, Some("nowhere"), Some(1));
        assert_eq!(ids(&inserted), vec!["electronics", "toys", "clothing"]);
        assert_eq!(inserted[1].parent_id, None);
        assert_contiguous(&inserted);

        let nested = insert_node(&tree, CategoryNode::leaf("boots", "Boots"), Some("clothing"), None);
        let boots = find_node(&nested, "boots").expect("boots");
        assert_eq!(boots.parent_id.as_deref(), Some("clothing"));
        assert_eq!(boots.sort_index, 1);
    }

    #[test]
    fn insert_with_existing_id_is_a_noop() {
        let tree = catalog();
        let inserted = insert_node(&tree, CategoryNode::leaf("shoes", "Again"), None, None);
        assert_eq!(inserted, tree);
    }

    #[test]
    fn update_applies_patch_to_matching_node() {
        let tree = catalog();
        let mut patch = NodePatch::rename("Smartphones");
        patch.extra.insert("is_active".into(), json!(false));
        let updated = update_node(&tree, "phones", &patch);

        let phones = find_node(&updated, "phones").expect("phones");
        assert_eq!(phones.name, "Smartphones");
        assert_eq!(phones.extra.get("is_active"), Some(&json!(false)));
        assert_eq!(ids(&phones.children), vec!["android", "iphone"]);

        assert_eq!(update_node(&tree, "ghost", &patch), tree);
    }

    #[test]
    fn reorder_forward_within_list_adjusts_index() {
        let tree = build_tree(&[
            record("a", None, "A", 0),
            record("b", None, "B", 1),
            record("c", None, "C", 2),
            record("d", None, "D", 3),
        ]);
        // drop "a" before "d"
        let plan = reorder(&tree, "a", None, None, 3).expect("plan");
        assert_eq!(ids(&plan.tree), vec!["b", "c", "a", "d"]);
        assert!(plan.origin.is_empty());
        let destination: Vec<(&str, usize)> = plan
            .destination
            .iter()
            .map(|position| (position.id.as_str(), position.sort_index))
            .collect();
        assert_eq!(destination, vec![("b", 0), ("c", 1), ("a", 2), ("d", 3)]);
    }

    #[test]
    fn reorder_backward_within_list() {
        let tree = build_tree(&[
            record("a", None, "A", 0),
            record("b", None, "B", 1),
            record("c", None, "C", 2),
        ]);
        let plan = reorder(&tree, "c", None, None, 0).expect("plan");
        assert_eq!(ids(&plan.tree), vec!["c", "a", "b"]);
        assert_contiguous(&plan.tree);
    }

    #[test]
    fn reorder_across_lists_reports_both() {
        let tree = catalog();
        let plan = reorder(&tree, "iphone", Some("phones"), Some("clothing"), 1).expect("plan");

        assert_eq!(plan.origin.len(), 1);
        assert_eq!(plan.origin[0].id, "android");
        assert_eq!(plan.origin[0].sort_index, 0);
        let destination: Vec<&str> = plan.destination.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(destination, vec!["shoes", "iphone"]);
        assert!(plan
            .destination
            .iter()
            .all(|p| p.parent_id.as_deref() == Some("clothing")));
        assert_contiguous(&plan.tree);
        assert_eq!(plan.positions().count(), 3);
    }

    #[test]
    fn reorder_returns_none_for_missing_lists() {
        let tree = catalog();
        assert!(reorder(&tree, "iphone", Some("ghost"), None, 0).is_none());
        assert!(reorder(&tree, "iphone", Some("clothing"), None, 0).is_none());
        assert!(reorder(&tree, "iphone", Some("phones"), Some("ghost"), 0).is_none());
        // the destination lives inside the moved subtree
        assert!(reorder(&tree, "electronics", None, Some("phones"), 0).is_none());
    }

    #[test]
    fn flatten_then_build_round_trips() {
        let tree = catalog();
        let flat = flatten_tree(&tree);
        let flat_ids: Vec<&str> = flat.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            flat_ids,
            vec!["electronics", "phones", "android", "iphone", "laptops", "clothing", "shoes"]
        );
        assert_eq!(build_tree(&flat), tree);
    }

    #[test]
    fn flatten_preserves_extra_fields() {
        let mut shoes = record("shoes", None, "Shoes", 0);
        shoes.extra.insert("slug".into(), json!("shoes"));
        let tree = build_tree(&[shoes]);
        let flat = flatten_tree(&tree);
        assert_eq!(flat[0].extra.get("slug"), Some(&json!("shoes")));
    }

    #[test]
    fn engine_keys_in_extra_do_not_leak_into_nodes() {
        let records: Vec<FlatCategory> = serde_json::from_value(json!([
            { "id": "1", "name": "A", "parent_id": null, "children": [], "sort_index": 9 }
        ]))
        .expect("records");

        let tree = build_tree(&records);
        assert!(tree[0].extra.is_empty());

        let encoded = serde_json::to_string(&tree).expect("encode");
        assert_eq!(encoded.matches("\"children\"").count(), 1);
        let decoded: Vec<CategoryNode> = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, tree);
    }

    #[test]
    fn position_changes_lists_moved_and_shifted_nodes() {
        let tree = catalog();
        let moved = move_node(&tree, "laptops", Some("clothing"), Some(0));
        let changes = position_changes(&tree, &moved);

        let summary: Vec<(&str, Option<&str>, usize)> = changes
            .iter()
            .map(|c| (c.id.as_str(), c.parent_id.as_deref(), c.sort_index))
            .collect();
        assert_eq!(
            summary,
            vec![("laptops", Some("clothing"), 0), ("shoes", Some("clothing"), 1)]
        );
        assert!(position_changes(&tree, &tree).is_empty());
    }
}
