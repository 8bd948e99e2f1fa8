use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::DependencyGraph;
use crate::manifest::DeclaredSets;
use crate::models::RuntimeClass;

/// Propagates declared scope down the graph. One instance per aggregation run;
/// the memo is keyed by node identity.
pub struct RuntimeClassifier<'a> {
    graph: &'a DependencyGraph,
    declared: &'a DeclaredSets,
    memo: HashMap<String, RuntimeClass>,
    in_progress: HashSet<String>,
}

impl<'a> RuntimeClassifier<'a> {
    pub fn new(graph: &'a DependencyGraph, declared: &'a DeclaredSets) -> Self {
        RuntimeClassifier {
            graph,
            declared,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn classify(&mut self, id: &str) -> RuntimeClass {
        if let Some(class) = self.memo.get(id) {
            return *class;
        }
        let graph = self.graph;
        let Some(node) = graph.get(id) else {
            return RuntimeClass::BuildTime;
        };

        let class = if self.declared.runtime.contains(&node.name) {
            RuntimeClass::Runtime
        } else if self.declared.dev.contains(&node.name) {
            RuntimeClass::DevOnly
        } else {
            if !self.in_progress.insert(id.to_string()) {
                debug!(package = %id, "runtime class cycle, assuming build-time");
                return RuntimeClass::BuildTime;
            }
            let mut any_runtime = false;
            let mut any_build = false;
            for parent in &node.parents {
                match self.classify(parent) {
                    RuntimeClass::Runtime => any_runtime = true,
                    RuntimeClass::BuildTime => any_build = true,
                    RuntimeClass::DevOnly => {}
                }
            }
            self.in_progress.remove(id);

            if any_runtime {
                RuntimeClass::Runtime
            } else if any_build {
                RuntimeClass::BuildTime
            } else {
                RuntimeClass::DevOnly
            }
        };

        self.memo.insert(id.to_string(), class);
        class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::diamond_tree;
    use crate::manifest::Manifest;
    use serde_json::json;

    fn declared(json: &str) -> DeclaredSets {
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        DeclaredSets::from_manifest(&manifest)
    }

    #[test]
    fn test_inherits_from_parents() {
        let graph = DependencyGraph::from_tree(&diamond_tree());
        let sets = declared(r#"{ "dependencies": { "a": "1" }, "devDependencies": { "d": "1" } }"#);
        let mut classifier = RuntimeClassifier::new(&graph, &sets);
        assert_eq!(classifier.classify("a@1.0.0"), RuntimeClass::Runtime);
        assert_eq!(classifier.classify("d@1.0.0"), RuntimeClass::DevOnly);
        assert_eq!(classifier.classify("b@2.0.0"), RuntimeClass::Runtime);
        // c: parents b (runtime) and d (dev-only)
        assert_eq!(classifier.classify("c@3.0.0"), RuntimeClass::Runtime);
    }

    #[test]
    fn test_dev_only_chain() {
        let graph = DependencyGraph::from_tree(&diamond_tree());
        let sets = declared(r#"{ "devDependencies": { "a": "1", "d": "1" } }"#);
        let mut classifier = RuntimeClassifier::new(&graph, &sets);
        assert_eq!(classifier.classify("c@3.0.0"), RuntimeClass::DevOnly);
    }

    #[test]
    fn test_cycle_members_are_build_time() {
        let tree = json!({
            "dependencies": {
                "x": { "version": "1", "dependencies": {
                    "y": { "version": "1", "dependencies": { "x": { "version": "1" } } }
                } }
            }
        });
        let graph = DependencyGraph::from_tree(&tree);
        let sets = DeclaredSets::default();
        let mut classifier = RuntimeClassifier::new(&graph, &sets);
        assert_eq!(classifier.classify("x@1"), RuntimeClass::BuildTime);
        assert_eq!(classifier.classify("y@1"), RuntimeClass::BuildTime);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let graph = DependencyGraph::from_tree(&diamond_tree());
        let sets = declared(r#"{ "dependencies": { "a": "1" }, "devDependencies": { "d": "1" } }"#);
        let run = || {
            let mut classifier = RuntimeClassifier::new(&graph, &sets);
            graph
                .nodes
                .keys()
                .map(|id| classifier.classify(id))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
