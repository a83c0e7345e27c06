//! Test tree and controller state machines for Volley
//!
//! A plan is held as a [`TestTree`] template. For each virtual user the
//! engine materializes a [`ThreadTree`] and pulls from it with
//! [`ThreadTree::next`], which enumerates samplers depth first according to
//! the controllers on the way.

pub mod error;
pub mod kind;
pub mod package;
mod state;
pub mod thread_tree;
pub mod tree;

pub use error::{ControlError, Result};
pub use kind::ControllerKind;
pub use package::SamplePackage;
pub use thread_tree::{Pulled, ThreadTree};
pub use tree::{Component, GroupKind, NodeId, SubtreeResolver, TemplateNode, TestTree};
