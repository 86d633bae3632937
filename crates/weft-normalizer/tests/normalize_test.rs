use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Value, json};
use weft_config::{EnvMap, Input, TaskConfig, TaskKind, WorkflowConfig};
use weft_normalizer::{NormalizeError, Normalizer, ParentContext, Scope};

fn input(value: Value) -> Input {
  value.as_object().cloned().expect("fixture must be an object")
}

fn env(pairs: &[(&str, &str)]) -> EnvMap {
  pairs
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn workflow(tasks: Vec<TaskConfig>) -> WorkflowConfig {
  let mut workflow = WorkflowConfig::new("user-sync");
  workflow.cwd = Some(PathBuf::from("/projects/sync"));
  workflow.file_path = Some(PathBuf::from("/projects/sync/workflow.yaml"));
  workflow.env = Some(env(&[("API_BASE", "https://api.example.com")]));
  workflow.tasks = tasks;
  workflow
}

fn trigger() -> Input {
  input(json!({
    "user": { "id": "user123", "name": "Ada" },
    "users": [{ "name": "ann" }, { "name": "bob" }, { "name": "cy" }]
  }))
}

fn with_input(mut task: TaskConfig, with: Value) -> TaskConfig {
  task.with = Some(input(with));
  task
}

fn parallel(id: &str, tasks: Vec<TaskConfig>) -> TaskConfig {
  TaskConfig::new(
    id,
    TaskKind::Parallel {
      tasks,
      strategy: Default::default(),
      max_workers: None,
    },
  )
}

fn composite(id: &str, tasks: Vec<TaskConfig>) -> TaskConfig {
  TaskConfig::new(id, TaskKind::Composite { tasks })
}

fn collection(id: &str, items: Value, template: TaskConfig) -> TaskConfig {
  TaskConfig::new(
    id,
    TaskKind::Collection {
      items,
      item_var: "item".to_string(),
      index_var: "index".to_string(),
      mode: Default::default(),
      batch: None,
      filter: None,
      task: Box::new(template),
    },
  )
}

fn wait(id: &str, processor: Option<TaskConfig>) -> TaskConfig {
  TaskConfig::new(
    id,
    TaskKind::Wait {
      wait_for: "approved".to_string(),
      condition: None,
      timeout: Some("5m".to_string()),
      processor: processor.map(Box::new),
    },
  )
}

#[test]
fn test_end_to_end_endpoint_resolution() {
  let task = with_input(
    TaskConfig::basic("fetch-user"),
    json!({ "endpoint": "{{ .env.API_BASE }}/users/{{ .trigger.input.user.id }}" }),
  );

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![task]), &trigger())
    .unwrap();

  let with = normalized.tasks[0].with.as_ref().unwrap();
  assert_eq!(
    with["endpoint"],
    json!("https://api.example.com/users/user123")
  );
}

#[test]
fn test_parallel_and_composite_children_inherit_only_unset_fields() {
  let mut explicit = TaskConfig::basic("explicit");
  explicit.cwd = Some(PathBuf::from("/elsewhere"));
  explicit.env = Some(env(&[("API_BASE", "http://localhost")]));

  let tree = parallel(
    "fan-out",
    vec![
      TaskConfig::basic("inherits"),
      composite("steps", vec![explicit, TaskConfig::basic("deep")]),
    ],
  );

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![tree]), &trigger())
    .unwrap();

  let inherits = normalized.find_task("inherits").unwrap();
  assert_eq!(inherits.cwd, Some(PathBuf::from("/projects/sync")));
  assert_eq!(
    inherits.env.as_ref().unwrap()["API_BASE"],
    "https://api.example.com"
  );

  let explicit = normalized.find_task("explicit").unwrap();
  assert_eq!(explicit.cwd, Some(PathBuf::from("/elsewhere")));
  assert_eq!(
    explicit.file_path,
    Some(PathBuf::from("/projects/sync/workflow.yaml"))
  );
  assert_eq!(explicit.env.as_ref().unwrap()["API_BASE"], "http://localhost");

  let deep = normalized.find_task("deep").unwrap();
  assert_eq!(deep.cwd, Some(PathBuf::from("/projects/sync")));
}

#[test]
fn test_child_inherits_from_its_resolved_parent() {
  let mut steps = composite("steps", vec![TaskConfig::basic("child")]);
  steps.cwd = Some(PathBuf::from("/projects/sync/steps"));
  steps.env = Some(env(&[("STAGE", "two")]));

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![steps]), &trigger())
    .unwrap();

  let child = normalized.find_task("child").unwrap();
  assert_eq!(child.cwd, Some(PathBuf::from("/projects/sync/steps")));
  assert_eq!(
    child.env,
    Some(env(&[
      ("API_BASE", "https://api.example.com"),
      ("STAGE", "two")
    ]))
  );
}

#[test]
fn test_normalization_is_idempotent() {
  let tree = parallel(
    "fan-out",
    vec![
      with_input(
        TaskConfig::basic("a"),
        json!({ "user": "{{ .trigger.input.user }}", "prior": "{{ .tasks.a.output }}" }),
      ),
      wait("approval", Some(TaskConfig::basic("record"))),
      collection(
        "each",
        json!("{{ .trigger.input.users }}"),
        with_input(TaskConfig::basic("item-{{ .index }}"), json!({ "n": "{{ .item.name }}" })),
      ),
    ],
  );

  let normalizer = Normalizer::new();
  let once = normalizer
    .normalize_workflow(&workflow(vec![tree]), &trigger())
    .unwrap();
  let twice = normalizer.normalize_workflow(&once, &trigger()).unwrap();

  assert_eq!(once, twice);
}

#[test]
fn test_single_placeholder_keeps_mapping_type() {
  let task = with_input(
    TaskConfig::basic("a"),
    json!({ "user": "{{ .trigger.input.user }}", "label": "user {{ .trigger.input.user.name }}" }),
  );

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![task]), &trigger())
    .unwrap();

  let with = normalized.tasks[0].with.as_ref().unwrap();
  assert_eq!(with["user"], json!({ "id": "user123", "name": "Ada" }));
  assert_eq!(with["label"], json!("user Ada"));
}

#[test]
fn test_prior_task_references_are_deferred() {
  let task = with_input(
    TaskConfig::basic("b"),
    json!({ "body": "{{ .tasks.a.output.body }}" }),
  );

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![task]), &trigger())
    .unwrap();

  assert_eq!(
    normalized.tasks[0].with.as_ref().unwrap()["body"],
    json!("{{ .tasks.a.output.body }}")
  );
}

#[test]
fn test_collection_template_normalized_once() {
  let tree = collection(
    "each",
    json!("{{ .trigger.input.users }}"),
    with_input(
      TaskConfig::basic("greet-{{ .index }}"),
      json!({ "name": "{{ .item.name }}", "region": "{{ .env.API_BASE }}" }),
    ),
  );

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![tree]), &trigger())
    .unwrap();

  let each = &normalized.tasks[0];
  let TaskKind::Collection { items, task, .. } = &each.kind else {
    panic!("expected collection");
  };
  assert_eq!(items, &json!("{{ .trigger.input.users }}"));
  assert_eq!(task.id, "greet-{{ .index }}");
  assert_eq!(task.cwd, Some(PathBuf::from("/projects/sync")));
  let with = task.with.as_ref().unwrap();
  assert_eq!(with["name"], json!("{{ .item.name }}"));
  assert_eq!(with["region"], json!("https://api.example.com"));
}

#[test]
fn test_decision_condition_and_routes_untouched() {
  let mut routes = BTreeMap::new();
  routes.insert("approved".to_string(), json!("{{ .tasks.notify }}"));
  routes.insert("rejected".to_string(), json!("archive"));
  let decision = TaskConfig::new(
    "route",
    TaskKind::Decision {
      condition: "{{ .trigger.input.user.name }}".to_string(),
      routes: routes.clone(),
    },
  );

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow(vec![decision]), &trigger())
    .unwrap();

  let route = &normalized.tasks[0];
  assert_eq!(route.cwd, Some(PathBuf::from("/projects/sync")));
  assert_eq!(
    route.kind,
    TaskKind::Decision {
      condition: "{{ .trigger.input.user.name }}".to_string(),
      routes,
    }
  );
}

#[test]
fn test_wait_processor_inherits_and_absence_is_valid() {
  let normalized = Normalizer::new()
    .normalize_workflow(
      &workflow(vec![
        wait("with-processor", Some(TaskConfig::basic("record"))),
        wait("bare", None),
      ]),
      &trigger(),
    )
    .unwrap();

  let record = normalized.find_task("record").unwrap();
  assert_eq!(
    record.file_path,
    Some(PathBuf::from("/projects/sync/workflow.yaml"))
  );
  assert_eq!(
    record.env.as_ref().unwrap()["API_BASE"],
    "https://api.example.com"
  );
  assert!(normalized.find_task("bare").unwrap().children().is_empty());
}

#[test]
fn test_error_aborts_whole_tree_and_names_node() {
  let tree = parallel(
    "fan-out",
    vec![
      TaskConfig::basic("fine"),
      composite(
        "steps",
        vec![with_input(
          TaskConfig::basic("broken"),
          json!({ "x": "{{ .trigger.input.user.email }}" }),
        )],
      ),
    ],
  );

  let err = Normalizer::new()
    .normalize_workflow(&workflow(vec![tree]), &trigger())
    .unwrap_err();

  assert_eq!(err.node_id(), "broken");
  match err {
    NormalizeError::Template { source, .. } => {
      assert!(source.to_string().contains(".trigger.input.user.email"));
    }
    other => panic!("unexpected error {other:?}"),
  }
}

#[test]
fn test_malformed_expression_is_reported() {
  let task = with_input(TaskConfig::basic("bad"), json!({ "x": "{{ .a" }));
  let err = Normalizer::new()
    .normalize_workflow(&workflow(vec![task]), &trigger())
    .unwrap_err();
  assert_eq!(err.node_id(), "bad");
}

#[test]
fn test_workflow_without_paths_requires_task_paths() {
  let mut wf = workflow(vec![TaskConfig::basic("a")]);
  wf.cwd = None;
  let err = Normalizer::new().normalize_workflow(&wf, &trigger()).unwrap_err();
  assert!(matches!(err, NormalizeError::MissingContext { .. }));
}

fn expanded(template: TaskConfig, filter: Option<&str>) -> Result<Vec<TaskConfig>, NormalizeError> {
  let mut each = collection("each", json!("{{ .trigger.input.users }}"), template);
  if let TaskKind::Collection { filter: f, .. } = &mut each.kind {
    *f = filter.map(str::to_string);
  }
  let normalizer = Normalizer::new();
  let normalized = normalizer
    .normalize_workflow(&workflow(vec![each]), &trigger())
    .unwrap();
  let scope = Scope::new("user-sync", trigger());
  normalizer.expand_collection(&normalized.tasks[0], &scope)
}

#[test]
fn test_expand_collection_binds_item_and_index() {
  let template = with_input(
    TaskConfig::basic("greet-{{ .index }}"),
    json!({ "greeting": "hello {{ .item.name | title }}" }),
  );

  let instances = expanded(template, None).unwrap();

  let ids: Vec<&str> = instances.iter().map(|t| t.id.as_str()).collect();
  assert_eq!(ids, vec!["greet-0", "greet-1", "greet-2"]);

  let second = instances[1].with.as_ref().unwrap();
  assert_eq!(second["greeting"], json!("hello Bob"));
  assert_eq!(second["item"], json!({ "name": "bob" }));
  assert_eq!(second["index"], json!(1));
  assert_eq!(instances[1].cwd, Some(PathBuf::from("/projects/sync")));
}

#[test]
fn test_expand_collection_static_id_unchanged() {
  let instances = expanded(TaskConfig::basic("static"), None).unwrap();
  assert_eq!(instances.len(), 3);
  assert!(instances.iter().all(|t| t.id == "static"));
}

#[test]
fn test_expand_collection_filter_keeps_original_index() {
  let template = TaskConfig::basic("n-{{ .index }}");
  let instances = expanded(template, Some("ne .item.name \"bob\"")).unwrap();
  let ids: Vec<&str> = instances.iter().map(|t| t.id.as_str()).collect();
  assert_eq!(ids, vec!["n-0", "n-2"]);

  let templated = expanded(
    TaskConfig::basic("t-{{ .index }}"),
    Some("{{ eq .item.name \"cy\" }}"),
  )
  .unwrap();
  assert_eq!(templated.len(), 1);
  assert_eq!(templated[0].id, "t-2");
}

#[test]
fn test_expand_rejects_non_collection_and_non_sequence() {
  let normalizer = Normalizer::new();
  let scope = Scope::new("user-sync", trigger());

  let basic = normalizer
    .normalize_task(
      &TaskConfig::basic("leaf"),
      &ParentContext {
        cwd: Some(PathBuf::from("/p")),
        file_path: Some(PathBuf::from("/p/w.yaml")),
        env: EnvMap::new(),
      },
      &scope,
    )
    .unwrap();
  assert!(matches!(
    normalizer.expand_collection(&basic, &scope),
    Err(NormalizeError::InvalidCollection { .. })
  ));

  let scalar = collection("each", json!("{{ .trigger.input.user.name }}"), TaskConfig::basic("x"));
  assert!(matches!(
    normalizer.expand_collection(&scalar, &scope),
    Err(NormalizeError::InvalidCollection { .. })
  ));
}

#[test]
fn test_expand_with_prior_task_outputs() {
  let each = collection("each", json!("{{ .tasks.list.output }}"), TaskConfig::basic("x-{{ .item }}"));
  let scope = Scope::new("user-sync", trigger())
    .with_tasks(input(json!({ "list": { "output": ["a", "b"] } })));

  let instances = Normalizer::new().expand_collection(&each, &scope).unwrap();
  let ids: Vec<&str> = instances.iter().map(|t| t.id.as_str()).collect();
  assert_eq!(ids, vec!["x-a", "x-b"]);
}

fn literal_braces_trigger() -> Input {
  let mut trigger = trigger();
  trigger.insert("msg".to_string(), json!("literal {{ .nope }} text"));
  trigger
}

#[test]
fn test_trigger_data_with_braces_is_rendered_once() {
  let mut wf = workflow(vec![TaskConfig::basic("leaf")]);
  wf.env = Some(env(&[("GREETING", "{{ .trigger.input.msg }}")]));

  let normalized = Normalizer::new()
    .normalize_workflow(&wf, &literal_braces_trigger())
    .unwrap();

  let expected = env(&[("GREETING", "literal {{ .nope }} text")]);
  assert_eq!(normalized.env, Some(expected.clone()));
  assert_eq!(normalized.tasks[0].env, Some(expected));
}

#[test]
fn test_expansion_leaves_rendered_values_alone() {
  let mut template = with_input(
    TaskConfig::basic("greet-{{ .index }}"),
    json!({ "msg": "{{ .trigger.input.msg }}", "name": "{{ .item.name }}" }),
  );
  template.env = Some(env(&[("WHO", "{{ .item.name }}")]));
  let mut wf = workflow(vec![collection(
    "each",
    json!("{{ .trigger.input.users }}"),
    template,
  )]);
  wf.env = Some(env(&[("NOTE", "{{ .trigger.input.msg }}")]));

  let normalizer = Normalizer::new();
  let normalized = normalizer
    .normalize_workflow(&wf, &literal_braces_trigger())
    .unwrap();
  let scope = Scope::new("user-sync", literal_braces_trigger());
  let instances = normalizer
    .expand_collection(&normalized.tasks[0], &scope)
    .unwrap();

  assert_eq!(instances.len(), 3);
  let first = &instances[0];
  assert_eq!(first.id, "greet-0");
  let with = first.with.as_ref().unwrap();
  assert_eq!(with["msg"], json!("literal {{ .nope }} text"));
  assert_eq!(with["name"], json!("ann"));
  let env = first.env.as_ref().unwrap();
  assert_eq!(env["NOTE"], "literal {{ .nope }} text");
  assert_eq!(env["WHO"], "ann");
}
