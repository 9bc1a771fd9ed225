//! Template rendering against a scope of context, outputs and injected vars

use std::borrow::Cow;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use weft::binding::{render_with, resolve_value, TextStyle};
use weft::{render, OutputStore, Scope};

fn outputs() -> OutputStore {
    let mut store = OutputStore::new();
    store.insert(Arc::from("plan"), json!({"steps": ["a", "b"], "count": 2}));
    store.insert(Arc::from("raw"), json!(r#"{"mood": "calm"}"#));
    store
}

#[test]
fn template_without_tokens_is_borrowed() {
    let context = json!({});
    let store = OutputStore::new();
    let scope = Scope::new(&context, &store);

    let rendered = render("no tokens here", &scope);
    assert!(matches!(rendered.text, Cow::Borrowed("no tokens here")));
    assert!(rendered.misses.is_empty());
}

#[test]
fn missing_output_renders_empty_without_miss() {
    let context = json!({});
    let store = outputs();
    let scope = Scope::new(&context, &store);

    let rendered = render("[{{outputs.missing}}]", &scope);
    assert_eq!(rendered.text, "[]");
    assert!(rendered.misses.is_empty());
}

#[test]
fn missing_context_path_is_a_miss() {
    let context = json!({"user": "Ana"});
    let store = OutputStore::new();
    let scope = Scope::new(&context, &store);

    let rendered = render("{{user}} / {{persona.name}}", &scope);
    assert_eq!(rendered.text, "Ana / ");
    assert_eq!(rendered.misses, vec!["persona.name".to_string()]);
}

#[test]
fn output_paths_traverse_values_and_json_text() {
    let context = json!({});
    let store = outputs();
    let scope = Scope::new(&context, &store);

    assert_eq!(render("{{outputs.plan.steps.1}}", &scope).text, "b");
    assert_eq!(render("{{outputs.plan.count}}", &scope).text, "2");
    assert_eq!(render("{{ outputs.raw.mood }}", &scope).text, "calm");
}

#[test]
fn structured_values_render_as_json() {
    let context = json!({});
    let store = outputs();
    let scope = Scope::new(&context, &store);

    let text = render("{{outputs.plan.steps}}", &scope).text.into_owned();
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, json!(["a", "b"]));
}

#[test]
fn history_renders_as_transcript() {
    let context = json!({
        "history": [
            {"name": "Ana", "content": "hi"},
            {"name": "Bot", "role": "assistant", "content": "hello"}
        ]
    });
    let store = OutputStore::new();
    let scope = Scope::new(&context, &store);

    let rendered = render_with("{{history}}", &scope, TextStyle::Transcript);
    assert_eq!(rendered.text, "Ana: hi\nBot: hello");
}

#[test]
fn injected_vars_shadow_context() {
    let context = json!({"item": "from context", "user": "Ana"});
    let store = OutputStore::new();
    let mut injected = Map::new();
    injected.insert("item".into(), json!("from fan-out"));
    let scope = Scope::new(&context, &store).with_injected(Some(&injected));

    assert_eq!(render("{{item}} for {{user}}", &scope).text, "from fan-out for Ana");
}

#[test]
fn resolve_value_keeps_structure() {
    let context = json!({"topics": ["x", "y"]});
    let store = outputs();
    let scope = Scope::new(&context, &store);

    let (value, misses) = resolve_value("{{outputs.plan.steps}}", &scope);
    assert_eq!(value, Some(json!(["a", "b"])));
    assert!(misses.is_empty());

    assert_eq!(resolve_value("topics", &scope).0, Some(json!(["x", "y"])));
    assert_eq!(resolve_value("plan.count", &scope).0, Some(json!(2)));
    assert_eq!(
        resolve_value("n={{outputs.plan.count}}", &scope).0,
        Some(json!("n=2"))
    );
}

#[test]
fn resolve_value_reports_unknown_bare_path() {
    let context = json!({});
    let store = OutputStore::new();
    let scope = Scope::new(&context, &store);

    let (value, misses) = resolve_value("nowhere", &scope);
    assert_eq!(value, None);
    assert_eq!(misses, vec!["nowhere".to_string()]);
}
