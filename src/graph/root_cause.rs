use std::collections::{BTreeSet, HashSet, VecDeque};

use super::{DependencyGraph, PackageNode};

/// Direct dependencies whose installation pulls `node` in.
///
/// A directly declared package is its own sole root cause. Otherwise walk parent
/// edges breadth-first, stopping at each directly declared parent. Sorted and
/// deduplicated.
pub fn trace_root_causes(
    node: &PackageNode,
    graph: &DependencyGraph,
    direct: &BTreeSet<String>,
) -> Vec<String> {
    if direct.contains(&node.name) {
        return vec![node.name.clone()];
    }

    let mut causes: BTreeSet<&str> = BTreeSet::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(node.id.as_str());
    let mut queue: VecDeque<&str> = node.parents.iter().map(String::as_str).collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) || graph.anchors.contains(id) {
            continue;
        }
        let Some(parent) = graph.get(id) else {
            continue;
        };
        if direct.contains(&parent.name) {
            causes.insert(parent.name.as_str());
            continue;
        }
        queue.extend(
            parent
                .parents
                .iter()
                .map(String::as_str)
                .filter(|p| !visited.contains(p)),
        );
    }

    causes.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::diamond_tree;
    use serde_json::json;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_direct_is_its_own_root_cause() {
        let graph = DependencyGraph::from_tree(&diamond_tree());
        let direct = names(&["a", "c", "d"]);
        let c = graph.get("c@3.0.0").unwrap();
        assert_eq!(trace_root_causes(c, &graph, &direct), vec!["c"]);
    }

    #[test]
    fn test_transitive_stops_at_direct_parent() {
        let graph = DependencyGraph::from_tree(&diamond_tree());
        let direct = names(&["a", "c", "d"]);
        let b = graph.get("b@2.0.0").unwrap();
        assert_eq!(trace_root_causes(b, &graph, &direct), vec!["a"]);
    }

    #[test]
    fn test_closure_includes_every_direct_ancestor() {
        let graph = DependencyGraph::from_tree(&diamond_tree());
        // c not direct: both a (via b) and d pull it in
        let direct = names(&["a", "d"]);
        let c = graph.get("c@3.0.0").unwrap();
        assert_eq!(trace_root_causes(c, &graph, &direct), vec!["a", "d"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let tree = json!({
            "dependencies": {
                "root": { "version": "1", "dependencies": {
                    "x": { "version": "1", "dependencies": {
                        "y": { "version": "1", "dependencies": { "x": { "version": "1" } } }
                    } }
                } }
            }
        });
        let graph = DependencyGraph::from_tree(&tree);
        let direct = names(&["root"]);
        let y = graph.get("y@1").unwrap();
        assert_eq!(trace_root_causes(y, &graph, &direct), vec!["root"]);
    }

    #[test]
    fn test_orphan_has_no_root_cause() {
        let tree = json!({ "dependencies": { "stray": { "version": "1" } } });
        let graph = DependencyGraph::from_tree(&tree);
        let stray = graph.get("stray@1").unwrap();
        assert!(trace_root_causes(stray, &graph, &BTreeSet::new()).is_empty());
    }
}
