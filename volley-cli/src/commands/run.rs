//! `volley run`

use super::{build_engine, load_plan};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use volley_config::VolleyConfig;
use volley_core::SharedProperties;
use volley_engine::builtin::SummaryListener;
use volley_engine::RunReport;
use volley_plan::PlanLoader;

/// What the n-th Ctrl-C during a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    AskToStop,
    StopNow,
    Exit,
}

impl Escalation {
    pub fn after(interrupts: usize) -> Self {
        match interrupts {
            0 | 1 => Escalation::AskToStop,
            2 => Escalation::StopNow,
            _ => Escalation::Exit,
        }
    }
}

/// Splits a `-J name=value` argument
pub fn parse_property(arg: &str) -> Result<(String, String)> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid property '{}': expected NAME=VALUE", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow::anyhow!("Invalid property '{}': empty name", arg));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Properties from the configuration, overridden by the command line
pub fn shared_properties(config: &VolleyConfig, overrides: &[String]) -> Result<SharedProperties> {
    let properties: SharedProperties = config.properties.clone().into_iter().collect();
    for arg in overrides {
        let (name, value) = parse_property(arg)?;
        properties.set(name, value);
    }
    Ok(properties)
}

/// Loads, configures and runs a plan, stopping on Ctrl-C
pub async fn execute(
    config: &VolleyConfig,
    plan: &Path,
    overrides: &[String],
    summary: Option<Arc<SummaryListener>>,
) -> Result<RunReport> {
    let loader = PlanLoader::default();
    let tree = load_plan(&loader, plan, summary)?;
    let mut engine = build_engine(config, &loader, plan)
        .with_properties(shared_properties(config, overrides)?);
    engine
        .configure(tree)
        .with_context(|| format!("Failed to configure plan {}", plan.display()))?;

    let engine = Arc::new(engine);
    let handle = engine.handle();
    let runner = engine.clone();
    let mut run = tokio::task::spawn_blocking(move || runner.run());

    let mut interrupts = 0;
    let report = loop {
        tokio::select! {
            joined = &mut run => {
                break joined.context("Engine thread failed")?.context("Test run failed")?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                interrupts += 1;
                match Escalation::after(interrupts) {
                    Escalation::AskToStop => {
                        warn!("Interrupted, asking threads to stop (Ctrl-C again stops now)");
                        handle.ask_threads_to_stop();
                    }
                    Escalation::StopNow => {
                        warn!("Interrupted again, stopping test now");
                        handle.stop_test(true);
                    }
                    Escalation::Exit => handle.exit(),
                }
            }
        }
    };
    Ok(report)
}

/// Handle the run command
pub async fn handle_run(
    config: &VolleyConfig,
    plan: &Path,
    overrides: &[String],
    summary: bool,
) -> Result<()> {
    info!("Running test plan: {:?}", plan);
    let listener = summary.then(|| Arc::new(SummaryListener::new()));
    let report = execute(config, plan, overrides, listener.clone()).await?;

    if let Some(listener) = listener {
        let table = SummaryListener::render(&listener.report());
        let mut lines = table.lines();
        if let Some(header) = lines.next() {
            println!("{}", header.bold());
        }
        for line in lines {
            println!("{}", line);
        }
    }
    if report.stopped {
        println!(
            "⚠️  Test stopped early after starting {} thread(s)",
            report.threads_started
        );
    } else {
        println!(
            "✅ Test completed: {} thread(s) run",
            report.threads_started
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{write_plan, PLAN};

    #[test]
    fn test_escalation_by_count() {
        assert_eq!(Escalation::after(1), Escalation::AskToStop);
        assert_eq!(Escalation::after(2), Escalation::StopNow);
        assert_eq!(Escalation::after(3), Escalation::Exit);
        assert_eq!(Escalation::after(7), Escalation::Exit);
    }

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("env=staging").unwrap(),
            ("env".to_string(), "staging".to_string())
        );
        assert_eq!(
            parse_property("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_property("empty=").unwrap().1, "");
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }

    #[test]
    fn test_command_line_overrides_config_properties() {
        let mut config = VolleyConfig::default();
        config.properties.insert("site".into(), "config".into());
        config.properties.insert("users".into(), "5".into());

        let properties = shared_properties(&config, &["site=cli".to_string()]).unwrap();
        assert_eq!(properties.get("site").as_deref(), Some("cli"));
        assert_eq!(properties.get("users").as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_execute_reports_summary() {
        let (_dir, path) = write_plan(PLAN);
        let listener = Arc::new(SummaryListener::new());

        let report = execute(
            &VolleyConfig::default(),
            &path,
            &["site=shop".to_string()],
            Some(listener.clone()),
        )
        .await
        .unwrap();

        assert_eq!(report.threads_started, 2);
        assert!(!report.stopped);
        let summary = listener.report();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].label, "home shop");
        assert_eq!(summary[0].count, 4);
        assert_eq!(summary[0].errors, 0);
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_property() {
        let (_dir, path) = write_plan(PLAN);
        let result = execute(&VolleyConfig::default(), &path, &["oops".to_string()], None).await;
        assert!(result.is_err());
    }
}
