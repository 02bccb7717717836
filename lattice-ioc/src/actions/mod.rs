//! Named, composable pipeline steps
//!
//! Actions form a tree; a resolution executes the tree depth-first,
//! restricted to the paths registered for the decorators present on
//! the target type. Stages communicate exclusively through the shared
//! [`ResolutionContext`](crate::context::ResolutionContext).

pub mod design;
pub mod runtime;

use crate::container::Container;
use crate::context::ResolutionContext;
use crate::error::DiResult;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// One pipeline step.
pub trait Action: Send + Sync {
    fn execute(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()>;
}

/// A node in the action tree: a group, or a leaf wrapping an action.
pub struct ActionNode {
    name: &'static str,
    action: Option<Arc<dyn Action>>,
    children: Vec<ActionNode>,
}

impl ActionNode {
    pub fn group(name: &'static str) -> Self {
        Self {
            name,
            action: None,
            children: Vec::new(),
        }
    }

    pub fn leaf(name: &'static str, action: Arc<dyn Action>) -> Self {
        Self {
            name,
            action: Some(action),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: ActionNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Locate a node by dotted path; the first segment must match this
    /// node's own name.
    pub fn find(&self, path: &str) -> Option<&ActionNode> {
        let mut segments = path.split('.');
        if segments.next() != Some(self.name) {
            return None;
        }
        let mut node = self;
        for segment in segments {
            node = node.children.iter().find(|c| c.name == segment)?;
        }
        Some(node)
    }

    /// Execute the subtree at `path` unconditionally, pre-order.
    pub fn execute_path(
        &self,
        path: &str,
        container: &Container,
        ctx: &mut ResolutionContext,
    ) -> DiResult<()> {
        if let Some(node) = self.find(path) {
            node.execute_all(container, ctx)?;
        }
        Ok(())
    }

    fn execute_all(&self, container: &Container, ctx: &mut ResolutionContext) -> DiResult<()> {
        if ctx.is_done() {
            return Ok(());
        }
        if let Some(action) = &self.action {
            action.execute(container, ctx)?;
        }
        for child in &self.children {
            child.execute_all(container, ctx)?;
        }
        Ok(())
    }

    /// Execute the tree restricted to the registered `applicable`
    /// paths. A node runs when an applicable path names it or one of
    /// its ancestors; it is descended into when an applicable path
    /// also names one of its descendants.
    pub fn execute_applicable(
        &self,
        applicable: &FxHashSet<String>,
        container: &Container,
        ctx: &mut ResolutionContext,
    ) -> DiResult<()> {
        self.execute_applicable_at(self.name, applicable, container, ctx)
    }

    fn execute_applicable_at(
        &self,
        path: &str,
        applicable: &FxHashSet<String>,
        container: &Container,
        ctx: &mut ResolutionContext,
    ) -> DiResult<()> {
        if ctx.is_done() {
            return Ok(());
        }
        let runs = applicable
            .iter()
            .any(|a| a == path || path.starts_with(&format!("{a}.")));
        let descends =
            runs || applicable.iter().any(|a| a.starts_with(&format!("{path}.")));
        if !descends {
            return Ok(());
        }
        if runs {
            if let Some(action) = &self.action {
                action.execute(container, ctx)?;
            }
        }
        for child in &self.children {
            let child_path = format!("{path}.{}", child.name);
            child.execute_applicable_at(&child_path, applicable, container, ctx)?;
        }
        Ok(())
    }
}
