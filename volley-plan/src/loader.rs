//! Building test trees from plan documents

use crate::catalog::Catalog;
use crate::document::{FragmentDocument, NodeDocument, PlanDocument};
use crate::error::{PlanError, Result};
use crate::value::{convert, named_entry, scalar_text};
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use volley_control::{Component, ControlError, NodeId, SubtreeResolver, TestTree};
use volley_core::{ElementSpec, TestElement};
use volley_engine::builtin::variables::VARIABLES;
use volley_engine::builtin::{UserDefinedVariables, USER_VARIABLES_SPEC};
use volley_engine::TEST_PLAN_SPEC;

const DEFAULT_PLAN_NAME: &str = "Test Plan";
const PLAN_VARIABLES_NAME: &str = "User Defined Variables";

/// Where a node sits, which decides what it may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    Plan,
    /// Thread group, controller or included fragment
    Container,
    Sampler,
    Leaf,
}

impl Place {
    fn of(component: &Component) -> Self {
        match component {
            Component::TestPlan => Place::Plan,
            Component::ThreadGroup(_) | Component::Controller(_) => Place::Container,
            Component::Sampler(_) => Place::Sampler,
            _ => Place::Leaf,
        }
    }
}

/// Turns plan documents into test trees using a [`Catalog`]
#[derive(Debug, Clone)]
pub struct PlanLoader {
    catalog: Arc<Catalog>,
}

impl Default for PlanLoader {
    fn default() -> Self {
        Self::new(Arc::new(Catalog::standard()))
    }
}

impl PlanLoader {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Reads and builds the plan at `path`
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<TestTree> {
        let path = path.as_ref();
        let source = read(path)?;
        let tree = self.load_str(&source)?;
        debug!(path = %path.display(), nodes = tree.capacity(), "Loaded test plan");
        Ok(tree)
    }

    pub fn load_str(&self, source: &str) -> Result<TestTree> {
        self.build(PlanDocument::from_yaml(source)?)
    }

    /// Resolver for the include controllers of the plan file at `plan_path`
    pub fn resolver_for(&self, plan_path: impl AsRef<Path>) -> FileSubtreeResolver {
        let base_dir = plan_path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        FileSubtreeResolver::new(self.clone(), base_dir)
    }

    pub fn build(&self, document: PlanDocument) -> Result<TestTree> {
        let name = document.name.as_deref().unwrap_or(DEFAULT_PLAN_NAME);
        let mut plan = TestElement::new(name);
        set_properties(&mut plan, &TEST_PLAN_SPEC, &document.properties)?;

        let mut tree = TestTree::new(plan);
        let root = tree.root();
        if !document.variables.is_empty() {
            let entries = document
                .variables
                .iter()
                .map(|(key, value)| match (scalar_text(key), scalar_text(value)) {
                    (Some(key), Some(value)) => Ok(named_entry(key, value)),
                    _ => Err(PlanError::Invalid(
                        "plan variables must map names to scalar values".to_string(),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            let element = USER_VARIABLES_SPEC
                .instantiate(PLAN_VARIABLES_NAME)
                .with(VARIABLES, entries);
            tree.add(
                root,
                element,
                Component::Config(Arc::new(UserDefinedVariables)),
                USER_VARIABLES_SPEC.clonable,
            )?;
        }
        for child in &document.children {
            self.add_node(&mut tree, root, Place::Plan, child)?;
        }
        Ok(tree)
    }

    /// A tree whose root's children are the fragment's nodes
    pub fn build_fragment(&self, document: &FragmentDocument) -> Result<TestTree> {
        let name = document.name.as_deref().unwrap_or("fragment");
        let mut tree = TestTree::new(TestElement::new(name));
        let root = tree.root();
        for child in &document.children {
            self.add_node(&mut tree, root, Place::Container, child)?;
        }
        Ok(tree)
    }

    fn add_node(
        &self,
        tree: &mut TestTree,
        parent: NodeId,
        place: Place,
        node: &NodeDocument,
    ) -> Result<()> {
        let entry = self
            .catalog
            .get(&node.kind)
            .ok_or_else(|| PlanError::UnknownKind(node.kind.clone()))?;
        let component = entry.create();
        check_placement(place, &component, &node.kind)?;

        let mut element = TestElement::new(node.name.as_deref().unwrap_or(entry.spec.kind));
        element.set_enabled(node.enabled);
        set_properties(&mut element, entry.spec, &node.properties)?;

        let own_place = Place::of(&component);
        let id = tree.add(parent, element, component, entry.spec.clonable)?;
        if own_place == Place::Leaf && !node.children.is_empty() {
            return Err(PlanError::Invalid(format!(
                "'{}' elements cannot have children",
                node.kind
            )));
        }
        for child in &node.children {
            self.add_node(tree, id, own_place, child)?;
        }
        Ok(())
    }
}

fn check_placement(place: Place, component: &Component, kind: &str) -> Result<()> {
    let misplaced = match (place, component) {
        (Place::Plan, Component::ThreadGroup(_)) => None,
        (_, Component::ThreadGroup(_)) => Some("thread groups must be top-level plan elements"),
        (Place::Plan, Component::Controller(_) | Component::Sampler(_)) => {
            Some("controllers and samplers must be inside a thread group")
        }
        (Place::Sampler, Component::Controller(_) | Component::Sampler(_)) => {
            Some("samplers cannot contain controllers or samplers")
        }
        _ => None,
    };
    match misplaced {
        Some(reason) => Err(PlanError::Invalid(format!("{}: {}", kind, reason))),
        None => Ok(()),
    }
}

/// Validates `properties` against `spec`, sets them and fills in defaults
fn set_properties(element: &mut TestElement, spec: &ElementSpec, properties: &Mapping) -> Result<()> {
    for (key, value) in properties {
        let Some(key) = key.as_str() else {
            return Err(PlanError::Invalid(format!(
                "property names of '{}' must be text",
                spec.kind
            )));
        };
        let property = spec.property(key).ok_or_else(|| PlanError::UnknownProperty {
            kind: spec.kind.to_string(),
            property: key.to_string(),
        })?;
        element.set_property(key, convert(spec.kind, property, value)?);
    }
    spec.apply_defaults(element);
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves include paths to plan fragments on disk, relative to `base_dir`
#[derive(Debug, Clone)]
pub struct FileSubtreeResolver {
    loader: PlanLoader,
    base_dir: PathBuf,
}

impl FileSubtreeResolver {
    pub fn new(loader: PlanLoader, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            base_dir: base_dir.into(),
        }
    }

    fn load(&self, path: &str) -> Result<TestTree> {
        let full = self.base_dir.join(path);
        let source = read(&full)?;
        let document: FragmentDocument = serde_yaml::from_str(&source)?;
        self.loader.build_fragment(&document)
    }
}

impl SubtreeResolver for FileSubtreeResolver {
    fn resolve(&self, path: &str) -> volley_control::Result<TestTree> {
        self.load(path).map_err(|e| ControlError::Include {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}
