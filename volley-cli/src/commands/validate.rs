//! `volley validate`

use super::{build_engine, load_plan};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};
use volley_config::VolleyConfig;
use volley_plan::PlanLoader;

/// Parses a plan and compiles every expression without running it.
///
/// Returns the number of thread groups.
pub fn validate_plan(config: &VolleyConfig, plan: &Path) -> Result<usize> {
    let loader = PlanLoader::default();
    let tree = load_plan(&loader, plan, None)?;
    let mut engine = build_engine(config, &loader, plan);
    engine
        .configure(tree)
        .with_context(|| format!("Plan {} is invalid", plan.display()))?;
    Ok(engine
        .plan()
        .map(|tree| tree.thread_groups().len())
        .unwrap_or(0))
}

/// Handle plan validation
pub fn handle_validate(config: &VolleyConfig, plan: &Path) -> Result<()> {
    info!("Validating test plan: {:?}", plan);
    match validate_plan(config, plan) {
        Ok(groups) => {
            println!("✅ Test plan is valid ({} thread group(s))", groups);
            Ok(())
        }
        Err(e) => {
            println!("❌ Test plan validation failed: {:#}", e);
            error!("Test plan validation failed: {:#}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{write_plan, PLAN};

    #[test]
    fn test_valid_plan() {
        let (_dir, path) = write_plan(PLAN);
        assert_eq!(validate_plan(&VolleyConfig::default(), &path).unwrap(), 1);
    }

    #[test]
    fn test_plan_with_broken_expression() {
        let (_dir, path) = write_plan(&PLAN.replace("${__P(site,none)}", "${__intSum(1,2}"));
        let err = validate_plan(&VolleyConfig::default(), &path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid"));
    }

    #[test]
    fn test_unknown_element_type() {
        let (_dir, path) = write_plan(&PLAN.replace("dummy_sampler", "http_sampler"));
        assert!(validate_plan(&VolleyConfig::default(), &path).is_err());
    }
}
