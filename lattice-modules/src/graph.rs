//! Module dependency graph

use crate::{ModuleError, ModuleSource, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Represents the dependency graph of loaded module sources.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules in the graph
    modules: FxHashMap<String, Arc<ModuleSource>>,

    /// Dependencies: module name -> list of dependency names
    dependencies: FxHashMap<String, Vec<String>>,

    /// Reverse dependencies: module name -> modules that depend on it
    dependents: FxHashMap<String, Vec<String>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a set of loaded sources.
    pub fn build(sources: &[Arc<ModuleSource>]) -> Self {
        let mut graph = Self::new();
        for source in sources {
            graph.add_module(source.clone());
            for dep in &source.dependencies {
                graph.add_dependency(source.name.clone(), dep.clone());
            }
        }
        graph
    }

    pub fn add_module(&mut self, module: Arc<ModuleSource>) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn add_dependency(&mut self, module: String, dependency: String) {
        self.dependencies
            .entry(module.clone())
            .or_default()
            .push(dependency.clone());
        self.dependents.entry(dependency).or_default().push(module);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ModuleSource>> {
        self.modules.get(name)
    }

    pub fn get_dependencies(&self, name: &str) -> Option<&Vec<String>> {
        self.dependencies.get(name)
    }

    pub fn get_dependents(&self, name: &str) -> Option<&Vec<String>> {
        self.dependents.get(name)
    }

    /// Topological order: every module appears after its dependencies.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut sorted = Vec::new();
        let mut visited = FxHashSet::default();
        let mut rec_stack = FxHashSet::default();

        // Sort names for a deterministic iteration order.
        let mut names: Vec<_> = self.modules.keys().cloned().collect();
        names.sort();

        for name in names {
            if !visited.contains(&name) {
                self.sort_visit(&name, &mut visited, &mut rec_stack, &mut sorted)?;
            }
        }

        // DFS post-order already yields dependencies-first.
        Ok(sorted)
    }

    fn sort_visit(
        &self,
        name: &str,
        visited: &mut FxHashSet<String>,
        rec_stack: &mut FxHashSet<String>,
        sorted: &mut Vec<String>,
    ) -> Result<()> {
        visited.insert(name.to_string());
        rec_stack.insert(name.to_string());

        if let Some(deps) = self.dependencies.get(name) {
            for dep in deps {
                if !visited.contains(dep) {
                    self.sort_visit(dep, visited, rec_stack, sorted)?;
                } else if rec_stack.contains(dep) {
                    return Err(ModuleError::CircularDependency {
                        cycle: format!("{} -> {}", name, dep),
                    });
                }
            }
        }

        rec_stack.remove(name);
        sorted.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, deps: Vec<String>) -> Arc<ModuleSource> {
        Arc::new(ModuleSource {
            name: name.to_string(),
            types: vec![],
            providers: vec![],
            exports: vec![],
            dependencies: deps,
        })
    }

    #[test]
    fn sorts_dependencies_first() {
        let sources = vec![
            source("a", vec!["b".to_string()]),
            source("b", vec!["c".to_string()]),
            source("c", vec![]),
        ];
        let graph = ModuleGraph::build(&sources);

        let sorted = graph.topological_sort().unwrap();
        assert_eq!(sorted, vec!["c", "b", "a"]);
    }

    #[test]
    fn detects_circular_dependencies() {
        let sources = vec![
            source("a", vec!["b".to_string()]),
            source("b", vec!["a".to_string()]),
        ];
        let graph = ModuleGraph::build(&sources);

        let result = graph.topological_sort();
        assert!(matches!(result, Err(ModuleError::CircularDependency { .. })));
    }

    #[test]
    fn tracks_dependents() {
        let sources = vec![source("a", vec!["b".to_string()]), source("b", vec![])];
        let graph = ModuleGraph::build(&sources);

        assert_eq!(graph.get_dependents("b").unwrap(), &vec!["a".to_string()]);
        assert!(graph.get_dependents("a").is_none());
    }
}
