use std::sync::Arc;
use volley_control::{Component, GroupKind, TestTree};
use volley_core::{PropertyValue, TestElement, ThreadContext};
use volley_engine::builtin::CollectingListener;
use volley_engine::{Engine, EngineSettings};
use volley_functions::default_registry;
use volley_plan::{PlanError, PlanLoader};

const EXAMPLE: &str = r#"
name: Example plan
serialized: false
variables: { base: "/api" }
children:
  - type: summary_listener
  - type: thread_group
    name: users
    num_threads: 4
    ramp_up: 2
    loops: 3
    children:
      - type: dummy_sampler
        name: "login ${__threadNum}"
        response_data: "<html>token=abc</html>"
        children:
          - type: regex_extractor
            ref_name: token
            regex: "token=(\\w+)"
      - type: constant_timer
        delay: 0
      - type: dummy_sampler
        name: disabled
        enabled: false
"#;

fn attach_collector(tree: &mut TestTree) -> Arc<CollectingListener> {
    let listener = Arc::new(CollectingListener::new());
    let root = tree.root();
    tree.add(
        root,
        TestElement::new("collector"),
        Component::Listener(listener.clone()),
        false,
    )
    .unwrap();
    listener
}

#[test]
fn test_example_plan_structure() {
    let tree = PlanLoader::default().load_str(EXAMPLE).unwrap();
    let root = tree.element(tree.root()).unwrap();
    assert_eq!(root.name(), "Example plan");
    assert!(matches!(root.property("serialized"), Some(PropertyValue::Bool(false))));
    assert!(matches!(
        root.property("tear_down_on_shutdown"),
        Some(PropertyValue::Bool(true))
    ));

    let children = tree.children(tree.root());
    assert_eq!(children.len(), 3);
    assert!(matches!(tree.node(children[0]).unwrap().component, Component::Config(_)));
    assert!(matches!(tree.node(children[1]).unwrap().component, Component::Listener(_)));
    assert_eq!(tree.thread_groups(), vec![(children[2], GroupKind::Regular)]);

    let mut ctx = ThreadContext::default();
    let group = tree.element(children[2]).unwrap();
    assert!(matches!(group.property("num_threads"), Some(PropertyValue::Int(4))));
    assert!(matches!(group.property("loops"), Some(PropertyValue::Text(s)) if s == "3"));
    assert_eq!(group.float("ramp_up", &mut ctx).unwrap(), 2.0);
    assert_eq!(group.text("on_error", &mut ctx), "continue");

    let samplers = tree.children(children[2]);
    assert_eq!(samplers.len(), 3);
    assert!(!tree.element(samplers[2]).unwrap().is_enabled());
    assert_eq!(tree.children(samplers[0]).len(), 1);
}

#[test]
fn test_example_plan_runs() {
    let mut tree = PlanLoader::default().load_str(EXAMPLE).unwrap();
    let listener = attach_collector(&mut tree);

    let mut engine = Engine::new(Arc::new(default_registry()), EngineSettings::default());
    engine.configure(tree).unwrap();
    let report = engine.run().unwrap();
    assert_eq!(report.threads_started, 4);

    let labels = listener.labels();
    assert_eq!(labels.len(), 12);
    for n in 1..=4 {
        let label = format!("login {}", n);
        assert_eq!(labels.iter().filter(|l| **l == label).count(), 3);
    }
}

#[test]
fn test_plan_variables_reach_threads() {
    let source = r#"
variables:
  host: example.org
  port: 8080
children:
  - type: thread_group
    children:
      - type: dummy_sampler
        name: "${host}:${port}"
"#;
    let mut tree = PlanLoader::default().load_str(source).unwrap();
    assert_eq!(tree.element(tree.root()).unwrap().name(), "Test Plan");
    let listener = attach_collector(&mut tree);

    let mut engine = Engine::new(Arc::new(default_registry()), EngineSettings::default());
    engine.configure(tree).unwrap();
    engine.run().unwrap();
    assert_eq!(listener.labels(), ["example.org:8080"]);
}

fn load_error(source: &str) -> PlanError {
    PlanLoader::default().load_str(source).unwrap_err()
}

#[test]
fn test_invalid_plans() {
    assert!(matches!(
        load_error("children: [{type: http_sampler}]"),
        PlanError::UnknownKind(kind) if kind == "http_sampler"
    ));
    assert!(matches!(
        load_error("children: [{type: thread_group, threads: 3}]"),
        PlanError::UnknownProperty { property, .. } if property == "threads"
    ));
    assert!(matches!(
        load_error("children: [{type: thread_group, num_threads: [1]}]"),
        PlanError::PropertyType { expected: "integer", .. }
    ));
    assert!(matches!(
        load_error("children: [{type: dummy_sampler}]"),
        PlanError::Invalid(_)
    ));
    assert!(matches!(
        load_error(
            "children: [{type: thread_group, children: [{type: thread_group}]}]"
        ),
        PlanError::Invalid(_)
    ));
    assert!(matches!(
        load_error(
            "children: [{type: thread_group, children: [{type: dummy_sampler, children: [{type: loop_controller}]}]}]"
        ),
        PlanError::Invalid(_)
    ));
    assert!(matches!(
        load_error("children: [{type: constant_timer, children: [{type: constant_timer}]}]"),
        PlanError::Invalid(_)
    ));
    assert!(matches!(load_error("children: {"), PlanError::Yaml(_)));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let error = PlanLoader::default()
        .load_file(dir.path().join("absent.yaml"))
        .unwrap_err();
    assert!(matches!(error, PlanError::Io { .. }));
}

#[test]
fn test_includes_resolve_relative_to_plan() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("parts")).unwrap();
    std::fs::write(
        dir.path().join("parts/login.yaml"),
        r#"
children:
  - type: dummy_sampler
    name: open login
  - type: include_controller
    include_path: parts/submit.yaml
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("parts/submit.yaml"),
        "children: [{type: dummy_sampler, name: submit login}]\n",
    )
    .unwrap();
    let plan_path = dir.path().join("plan.yaml");
    std::fs::write(
        &plan_path,
        r#"
children:
  - type: thread_group
    children:
      - type: include_controller
        include_path: parts/login.yaml
      - type: dummy_sampler
        name: home
"#,
    )
    .unwrap();

    let loader = PlanLoader::default();
    let mut tree = loader.load_file(&plan_path).unwrap();
    let listener = attach_collector(&mut tree);

    let mut engine = Engine::new(Arc::new(default_registry()), EngineSettings::default())
        .with_resolver(Arc::new(loader.resolver_for(&plan_path)));
    engine.configure(tree).unwrap();
    engine.run().unwrap();
    assert_eq!(listener.labels(), ["open login", "submit login", "home"]);
}
