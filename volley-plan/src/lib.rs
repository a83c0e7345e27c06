//! YAML test plans for Volley
//!
//! A plan file describes a tree of typed nodes. The [`Catalog`] maps each
//! node `type` to the element schema that validates its properties and to
//! the component that implements it; [`PlanLoader`] turns a document into a
//! [`TestTree`](volley_control::TestTree) ready for the engine.

pub mod catalog;
pub mod document;
pub mod error;
pub mod loader;
mod value;

pub use catalog::{Catalog, CatalogEntry};
pub use document::{NodeDocument, PlanDocument};
pub use error::{PlanError, Result};
pub use loader::{FileSubtreeResolver, PlanLoader};
