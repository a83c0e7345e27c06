//! Template test tree: an arena of elements and their behaviours
//!
//! The tree built from a plan is a template. It is shared read-only by every
//! thread once configured; each thread materializes its own
//! [`ThreadTree`](crate::ThreadTree) from it.

use crate::error::{ControlError, Result};
use crate::kind::{ControllerKind, INCLUDE_PATH};
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use volley_core::{
    Assertion, ConfigElement, ExprError, ExpressionCompiler, Listener, PostProcessor, Sampler,
    TestElement, ThreadContext, Timer,
};

/// Maximum nesting of include controllers
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Index of a node in a [`TestTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// When a thread group runs relative to the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Setup,
    Regular,
    Teardown,
}

/// What a node does during a run
#[derive(Clone)]
pub enum Component {
    TestPlan,
    ThreadGroup(GroupKind),
    Controller(ControllerKind),
    Sampler(Arc<dyn Sampler>),
    Listener(Arc<dyn Listener>),
    PostProcessor(Arc<dyn PostProcessor>),
    Assertion(Arc<dyn Assertion>),
    Timer(Arc<dyn Timer>),
    Config(Arc<dyn ConfigElement>),
}

impl Component {
    /// Whether the walker steps into or yields this node
    pub fn is_walked(&self) -> bool {
        matches!(self, Component::Controller(_) | Component::Sampler(_))
    }

    pub fn controller_kind(&self) -> Option<ControllerKind> {
        match self {
            Component::Controller(kind) => Some(*kind),
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Component::TestPlan => "test_plan".to_string(),
            Component::ThreadGroup(kind) => format!("thread_group({kind:?})"),
            Component::Controller(kind) => kind.to_string(),
            Component::Sampler(s) => format!("sampler({s:?})"),
            Component::Listener(l) => format!("listener({l:?})"),
            Component::PostProcessor(p) => format!("post_processor({p:?})"),
            Component::Assertion(a) => format!("assertion({a:?})"),
            Component::Timer(t) => format!("timer({t:?})"),
            Component::Config(c) => format!("config({c:?})"),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One node of the template tree
#[derive(Debug, Clone)]
pub struct TemplateNode {
    pub element: TestElement,
    pub component: Component,
    /// False for elements shared by all threads instead of copied per thread
    pub clonable: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TemplateNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Supplies the subtree an include controller stands for
pub trait SubtreeResolver: Send + Sync {
    /// Returns a tree whose root's children are grafted under the include node
    fn resolve(&self, path: &str) -> Result<TestTree>;
}

/// Arena of template nodes rooted at a test plan
#[derive(Debug, Clone)]
pub struct TestTree {
    nodes: Vec<TemplateNode>,
}

impl TestTree {
    /// A tree holding only the test plan root
    pub fn new(plan: TestElement) -> Self {
        Self {
            nodes: vec![TemplateNode {
                element: plan,
                component: Component::TestPlan,
                clonable: false,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Appends a node under `parent`
    pub fn add(
        &mut self,
        parent: NodeId,
        element: TestElement,
        component: Component,
        clonable: bool,
    ) -> Result<NodeId> {
        if parent.0 >= self.nodes.len() {
            return Err(ControlError::UnknownNode(parent));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(TemplateNode {
            element,
            component,
            clonable,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&TemplateNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TemplateNode> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn get(&self, id: NodeId) -> &TemplateNode {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&TestElement> {
        self.node(id).map(|n| &n.element)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Ancestors of `id` from its parent up to the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(node) = cursor {
            out.push(node);
            cursor = self.parent(node);
        }
        out
    }

    /// Number of slots in the arena, including detached nodes
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes reachable from `id` in depth-first pre-order, `id` included
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Thread groups directly under the root, in plan order
    pub fn thread_groups(&self) -> Vec<(NodeId, GroupKind)> {
        self.children(self.root())
            .iter()
            .filter_map(|&id| match self.get(id).component {
                Component::ThreadGroup(kind) => Some((id, kind)),
                _ => None,
            })
            .collect()
    }

    /// Detaches every disabled node together with its subtree
    pub fn remove_disabled(&mut self) -> usize {
        let mut removed = 0;
        for id in self.descendants(self.root()) {
            let children = self.nodes[id.0].children.clone();
            let before = children.len();
            let keep: Vec<NodeId> = children
                .into_iter()
                .filter(|c| self.nodes[c.0].element.is_enabled())
                .collect();
            removed += before - keep.len();
            self.nodes[id.0].children = keep;
        }
        removed
    }

    /// Copies the children of `subtree`'s root under `parent`
    pub fn graft(&mut self, parent: NodeId, subtree: &TestTree) -> Result<()> {
        let mut pending: Vec<(NodeId, NodeId)> = subtree
            .children(subtree.root())
            .iter()
            .map(|&c| (c, parent))
            .collect();
        pending.reverse();
        while let Some((source, target_parent)) = pending.pop() {
            let node = subtree.get(source);
            let id = self.add(
                target_parent,
                node.element.clone(),
                node.component.clone(),
                node.clonable,
            )?;
            pending.extend(node.children.iter().rev().map(|&c| (c, id)));
        }
        Ok(())
    }

    /// Replaces every include controller's content with its resolved subtree.
    ///
    /// An include that cannot be resolved is logged and left empty.
    pub fn resolve_includes(
        &mut self,
        resolver: &dyn SubtreeResolver,
        compiler: &ExpressionCompiler,
        ctx: &mut ThreadContext,
    ) -> Result<()> {
        let mut resolved = std::collections::HashSet::new();
        for _ in 0..MAX_INCLUDE_DEPTH {
            let pending: Vec<NodeId> = self
                .descendants(self.root())
                .into_iter()
                .filter(|id| {
                    matches!(
                        self.get(*id).component,
                        Component::Controller(ControllerKind::Include)
                    ) && !resolved.contains(id)
                })
                .collect();
            if pending.is_empty() {
                return Ok(());
            }
            for id in pending {
                resolved.insert(id);
                let element = &mut self.nodes[id.0].element;
                for error in element.compile(compiler) {
                    warn!(include = %element.name(), "{}", error);
                }
                let path = element.text(INCLUDE_PATH, ctx);
                if path.trim().is_empty() {
                    warn!(include = %element.name(), "Include controller has no path");
                    continue;
                }
                match resolver.resolve(path.trim()) {
                    Ok(subtree) => self.graft(id, &subtree)?,
                    Err(e) => warn!(include = %path, "Include not resolved: {}", e),
                }
            }
        }
        Err(ControlError::IncludeDepth(MAX_INCLUDE_DEPTH))
    }

    /// Compiles the properties of every attached node
    pub fn compile(&mut self, compiler: &ExpressionCompiler) -> Vec<(String, ExprError)> {
        let mut errors = Vec::new();
        for id in self.descendants(self.root()) {
            let element = &mut self.nodes[id.0].element;
            for error in element.compile(compiler) {
                errors.push((element.name(), error));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_core::{ExpressionCompiler, FunctionRegistry};

    fn controller(kind: ControllerKind) -> Component {
        Component::Controller(kind)
    }

    #[test]
    fn test_add_and_navigate() {
        let mut tree = TestTree::new(TestElement::new("plan"));
        let group = tree
            .add(tree.root(), TestElement::new("g"), Component::ThreadGroup(GroupKind::Regular), true)
            .unwrap();
        let inner = tree
            .add(group, TestElement::new("loop"), controller(ControllerKind::Loop), true)
            .unwrap();

        assert_eq!(tree.children(tree.root()), &[group]);
        assert_eq!(tree.parent(inner), Some(group));
        assert_eq!(tree.ancestors(inner), vec![group, tree.root()]);
        assert_eq!(tree.thread_groups(), vec![(group, GroupKind::Regular)]);
        assert_eq!(tree.descendants(tree.root()), vec![tree.root(), group, inner]);
        assert!(matches!(
            tree.add(NodeId(99), TestElement::new("x"), controller(ControllerKind::Generic), true),
            Err(ControlError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_remove_disabled_drops_subtrees() {
        let mut tree = TestTree::new(TestElement::new("plan"));
        let mut off = TestElement::new("off");
        off.set_enabled(false);
        let disabled = tree
            .add(tree.root(), off, controller(ControllerKind::Generic), true)
            .unwrap();
        tree.add(disabled, TestElement::new("child"), controller(ControllerKind::Generic), true)
            .unwrap();
        tree.add(tree.root(), TestElement::new("on"), controller(ControllerKind::Generic), true)
            .unwrap();

        assert_eq!(tree.remove_disabled(), 1);
        assert_eq!(tree.descendants(tree.root()).len(), 2);
    }

    struct Fixed;

    impl SubtreeResolver for Fixed {
        fn resolve(&self, path: &str) -> Result<TestTree> {
            if path != "common.yaml" {
                return Err(ControlError::Include {
                    path: path.to_string(),
                    message: "not found".to_string(),
                });
            }
            let mut sub = TestTree::new(TestElement::new("fragment"));
            let a = sub
                .add(sub.root(), TestElement::new("a"), controller(ControllerKind::Generic), true)
                .unwrap();
            sub.add(a, TestElement::new("b"), controller(ControllerKind::Generic), true)
                .unwrap();
            Ok(sub)
        }
    }

    #[test]
    fn test_includes_are_grafted() {
        let compiler = ExpressionCompiler::new(Arc::new(FunctionRegistry::new()));
        let mut ctx = ThreadContext::default();
        ctx.variables.put("file", "common");

        let mut tree = TestTree::new(TestElement::new("plan"));
        let include = tree
            .add(
                tree.root(),
                TestElement::new("inc").with(INCLUDE_PATH, "${file}.yaml"),
                controller(ControllerKind::Include),
                true,
            )
            .unwrap();
        let missing = tree
            .add(
                tree.root(),
                TestElement::new("gone").with(INCLUDE_PATH, "missing.yaml"),
                controller(ControllerKind::Include),
                true,
            )
            .unwrap();

        tree.resolve_includes(&Fixed, &compiler, &mut ctx).unwrap();
        let grafted = tree.children(include);
        assert_eq!(grafted.len(), 1);
        assert_eq!(tree.element(grafted[0]).unwrap().name(), "a");
        assert_eq!(tree.children(grafted[0]).len(), 1);
        assert!(tree.children(missing).is_empty());
    }

    struct SelfIncluding;

    impl SubtreeResolver for SelfIncluding {
        fn resolve(&self, _path: &str) -> Result<TestTree> {
            let mut sub = TestTree::new(TestElement::new("again"));
            sub.add(
                sub.root(),
                TestElement::new("inc").with(INCLUDE_PATH, "self.yaml"),
                Component::Controller(ControllerKind::Include),
                true,
            )?;
            Ok(sub)
        }
    }

    #[test]
    fn test_recursive_include_is_bounded() {
        let compiler = ExpressionCompiler::new(Arc::new(FunctionRegistry::new()));
        let mut tree = TestTree::new(TestElement::new("plan"));
        tree.add(
            tree.root(),
            TestElement::new("inc").with(INCLUDE_PATH, "self.yaml"),
            controller(ControllerKind::Include),
            true,
        )
        .unwrap();

        let err = tree
            .resolve_includes(&SelfIncluding, &compiler, &mut ThreadContext::default())
            .unwrap_err();
        assert!(matches!(err, ControlError::IncludeDepth(_)));
    }
}
