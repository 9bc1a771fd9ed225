//! Decision routing: exact keys, default fallback, skips that do not cascade

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use weft::{EventKind, MockProvider, TaskState};

use common::{batch_of, yaml_runner};

const ROUTED: &str = r#"
final: reply
tasks:
  - id: classify
    type: computation
    prompt: "classify"
  - id: route
    type: decision
    condition: "{{outputs.classify}}"
    routes:
      question: answer
      default: chat
  - id: answer
    type: computation
    prompt: "A:{{outputs.classify}}"
  - id: chat
    type: computation
    prompt: "C"
  - id: reply
    type: computation
    prompt: "{{outputs.answer}}{{outputs.chat}}"
"#;

#[tokio::test]
async fn exact_route_runs_and_other_branch_is_skipped() {
    let mut runner = yaml_runner(ROUTED, MockProvider::with_responses(["Question"]));

    let out = runner.run().await.unwrap();

    assert_eq!(out, json!("A:Question"));
    assert_eq!(runner.state("answer"), Some(TaskState::Completed));
    assert_eq!(runner.state("chat"), Some(TaskState::Skipped));
    assert_eq!(
        runner.outputs().unwrap().get("route").map(|v| (**v).clone()),
        Some(json!({"decision": "answer"}))
    );
    assert!(batch_of(&runner, "chat").is_none());

    let skipped = runner.event_log().count(|k| {
        matches!(k, EventKind::TaskSkipped { task_id, decided_by } if &**task_id == "chat" && &**decided_by == "route")
    });
    assert_eq!(skipped, 1);
}

#[tokio::test]
async fn unmatched_condition_takes_default() {
    let mut runner = yaml_runner(ROUTED, MockProvider::with_responses(["smalltalk"]));

    let out = runner.run().await.unwrap();

    assert_eq!(out, json!("C"));
    assert_eq!(runner.state("answer"), Some(TaskState::Skipped));
    assert_eq!(runner.state("chat"), Some(TaskState::Completed));
}

#[tokio::test]
async fn branches_wait_for_their_decision() {
    let mut runner = yaml_runner(ROUTED, MockProvider::with_responses(["question"]));
    runner.run().await.unwrap();

    // chat has no textual reference to route, only the structural edge
    assert!(batch_of(&runner, "answer").unwrap() > batch_of(&runner, "route").unwrap());
    let ctx = runner.execution().unwrap();
    assert!(ctx.graph().dependencies("chat").iter().any(|d| &**d == "route"));
}

#[tokio::test]
async fn no_match_without_default_skips_every_target() {
    let yaml = r#"
tasks:
  - id: pick
    type: decision
    condition: maybe
    routes: { yes: accept, no: reject }
  - { id: accept, type: computation, prompt: "+" }
  - { id: reject, type: computation, prompt: "-" }
"#;
    let mut runner = yaml_runner(yaml, MockProvider::new());

    let out = runner.run().await.unwrap();

    assert_eq!(out, json!(weft::util::NO_OUTPUT_SENTINEL));
    assert_eq!(runner.state("accept"), Some(TaskState::Skipped));
    assert_eq!(runner.state("reject"), Some(TaskState::Skipped));
    assert_eq!(
        runner.outputs().unwrap().get("pick").map(|v| (**v).clone()),
        Some(json!({"decision": null}))
    );
}

#[tokio::test]
async fn skip_does_not_cascade_to_dependents() {
    let yaml = r#"
tasks:
  - id: pick
    type: decision
    condition: choice
    routes: { a: left, b: right }
  - { id: left, type: computation, prompt: "L" }
  - { id: right, type: computation, prompt: "R" }
  - id: after_left
    type: computation
    prompt: "after[{{outputs.left}}]"
"#;
    let context: weft::PipelineContext = serde_yaml::from_str("choice: B").unwrap();
    let mut runner = yaml_runner(yaml, MockProvider::new()).with_context(context);

    let out = runner.run().await.unwrap();

    assert_eq!(runner.state("right"), Some(TaskState::Completed));
    assert_eq!(runner.state("left"), Some(TaskState::Skipped));
    assert_eq!(runner.state("after_left"), Some(TaskState::Completed));
    assert_eq!(out, json!("after[]"));
}

#[tokio::test]
async fn skipped_fanout_releases_its_waiters() {
    let yaml = r#"
final: W
tasks:
  - id: topics
    type: function
    function: transform::json
    params: { text: '["x","y"]' }
  - id: pick
    type: decision
    condition: choice
    routes: { fan: F, plain: other }
  - id: F
    type: fanout
    input: outputs.topics
    child: { type: computation, prompt: "{{item}}" }
  - { id: other, type: computation, prompt: "O" }
  - id: W
    type: computation
    prompt: "w[{{outputs.F}}]"
"#;
    let context: weft::PipelineContext = serde_yaml::from_str("choice: plain").unwrap();
    let mut runner = yaml_runner(yaml, MockProvider::new()).with_context(context);

    let out = runner.run().await.unwrap();

    assert_eq!(runner.state("F"), Some(TaskState::Skipped));
    assert_eq!(runner.state("other"), Some(TaskState::Completed));
    assert_eq!(runner.state("W"), Some(TaskState::Completed));
    assert!(runner.execution().unwrap().children("F").is_empty());
    assert_eq!(out, json!("w[]"));
}

#[tokio::test]
async fn condition_can_address_json_fields() {
    let yaml = r#"
tasks:
  - id: classify
    type: computation
    prompt: "classify"
  - id: route
    type: decision
    condition: "{{outputs.classify.intent}}"
    routes: { yes: go, default: stop }
  - { id: go, type: computation, prompt: "went" }
  - { id: stop, type: computation, prompt: "stopped" }
"#;
    let provider = MockProvider::with_responses([r#"{"intent": " YES "}"#]);
    let mut runner = yaml_runner(yaml, provider);
    runner.run().await.unwrap();

    assert_eq!(runner.state("go"), Some(TaskState::Completed));
    assert_eq!(runner.state("stop"), Some(TaskState::Skipped));

    let condition = runner.event_log().events().into_iter().find_map(|e| match e.kind {
        EventKind::DecisionMade { condition, .. } => Some(condition),
        _ => None,
    });
    assert_eq!(condition.as_deref(), Some("yes"));
}

#[tokio::test]
async fn bare_path_condition_reads_context() {
    let yaml = r#"
tasks:
  - id: route
    type: decision
    condition: mood
    routes: { happy: smile, default: frown }
  - { id: smile, type: computation, prompt: ":)" }
  - { id: frown, type: computation, prompt: ":(" }
"#;
    let context: weft::PipelineContext = serde_yaml::from_str("mood: Happy").unwrap();
    let mut runner = yaml_runner(yaml, MockProvider::new()).with_context(context);
    runner.run().await.unwrap();

    assert_eq!(runner.state("smile"), Some(TaskState::Completed));
    assert_eq!(runner.state("frown"), Some(TaskState::Skipped));
}
