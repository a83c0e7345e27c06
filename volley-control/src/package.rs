//! Elements in scope of a sampler

use crate::kind::ControllerKind;
use crate::tree::{Component, NodeId, TestTree};

/// Timers, processors, assertions, listeners and transactions that apply to
/// one sampler (or one transaction controller's own result).
///
/// Each list is ordered from the test plan down to the node itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplePackage {
    pub timers: Vec<NodeId>,
    pub post_processors: Vec<NodeId>,
    pub assertions: Vec<NodeId>,
    pub listeners: Vec<NodeId>,
    /// Enclosing transaction controllers, outermost first; never the node itself
    pub transactions: Vec<NodeId>,
}

impl SamplePackage {
    /// Scans the levels from the root down to `node` inclusive
    pub fn collect(tree: &TestTree, node: NodeId) -> Self {
        let mut levels = tree.ancestors(node);
        levels.reverse();
        levels.push(node);

        let mut package = SamplePackage::default();
        for &level in &levels {
            if level != node
                && tree.node(level).is_some_and(|n| {
                    matches!(n.component, Component::Controller(ControllerKind::Transaction))
                })
            {
                package.transactions.push(level);
            }
            for &child in tree.children(level) {
                match tree.node(child).map(|n| &n.component) {
                    Some(Component::Timer(_)) => package.timers.push(child),
                    Some(Component::PostProcessor(_)) => package.post_processors.push(child),
                    Some(Component::Assertion(_)) => package.assertions.push(child),
                    Some(Component::Listener(_)) => package.listeners.push(child),
                    _ => {}
                }
            }
        }
        package
    }
}
