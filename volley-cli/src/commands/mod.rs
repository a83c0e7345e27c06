//! Subcommand handlers

pub mod config;
pub mod functions;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use volley_config::{ConfigLoader, EngineConfig, VolleyConfig};
use volley_control::{Component, TestTree};
use volley_engine::builtin::{SummaryListener, SUMMARY_LISTENER_SPEC};
use volley_engine::{Engine, EngineSettings};
use volley_functions::{default_registry, BoaScriptEngineFactory};
use volley_plan::PlanLoader;

/// Load configuration from file or environment
pub fn load_config(config_path: Option<&Path>) -> Result<VolleyConfig> {
    ConfigLoader::new()
        .load(config_path)
        .context("Failed to load configuration")
}

pub fn engine_settings(config: &EngineConfig) -> EngineSettings {
    EngineSettings {
        thread_stop_timeout: config.thread_stop_timeout,
        grace_per_thread: config.grace_per_thread,
        exit_on_stop_failure: config.exit_on_stop_failure,
        delayed_start_default: config.delayed_start_default,
        serialized_override: config.serialized_override,
    }
}

/// An engine wired with the standard functions, the JavaScript engine and
/// includes resolved next to `plan`
pub fn build_engine(config: &VolleyConfig, loader: &PlanLoader, plan: &Path) -> Engine {
    Engine::new(
        Arc::new(default_registry()),
        engine_settings(&config.engine),
    )
    .with_script_engine(Arc::new(BoaScriptEngineFactory))
    .with_resolver(Arc::new(loader.resolver_for(plan)))
}

/// Reads a plan file, attaching `summary` at the plan root
pub fn load_plan(
    loader: &PlanLoader,
    plan: &Path,
    summary: Option<Arc<SummaryListener>>,
) -> Result<TestTree> {
    let mut tree = loader
        .load_file(plan)
        .with_context(|| format!("Failed to load plan {}", plan.display()))?;
    if let Some(listener) = summary {
        let root = tree.root();
        tree.add(
            root,
            SUMMARY_LISTENER_SPEC.instantiate("Summary"),
            Component::Listener(listener),
            false,
        )?;
    }
    Ok(tree)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use tempfile::TempDir;

    pub const PLAN: &str = r#"
name: smoke
children:
  - type: thread_group
    name: users
    num_threads: 2
    loops: 2
    children:
      - type: dummy_sampler
        name: "home ${__P(site,none)}"
"#;

    pub fn write_plan(source: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, source).unwrap();
        (dir, path)
    }
}
