//! Built-in functions

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use crate::ast::source_task_ids;
use crate::runtime::ContextView;

use super::FunctionRegistry;

pub(super) fn register_all(registry: &mut FunctionRegistry) {
    let builtins: [(&str, fn(&ContextView<'_>, Value) -> Result<Value>); 6] = [
        ("aggregate::collect", aggregate_collect),
        ("aggregate::merge", aggregate_merge),
        ("fanout::gather", fanout_gather),
        ("transform::format", transform_format),
        ("transform::json", transform_json),
        ("text::lines", text_lines),
    ];
    for (reference, function) in builtins {
        registry
            .register_fn(reference, function)
            .expect("built-in names are module::name literals");
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing string param '{key}'"))
}

/// Outputs of `source_task` then `source_tasks` in order (null for tasks
/// without output), or the `values` param as-is
fn aggregate_collect(view: &ContextView<'_>, params: Value) -> Result<Value> {
    let ids = source_task_ids(&params);
    if ids.is_empty() {
        return Ok(match params.get("values") {
            Some(Value::Array(items)) => Value::Array(items.clone()),
            Some(other) => Value::Array(vec![other.clone()]),
            None => Value::Array(Vec::new()),
        });
    }

    Ok(Value::Array(
        ids.into_iter()
            .map(|id| view.output(id).cloned().unwrap_or(Value::Null))
            .collect(),
    ))
}

/// Later sources win on key conflicts; non-object outputs land under their id
fn aggregate_merge(view: &ContextView<'_>, params: Value) -> Result<Value> {
    let mut merged = Map::new();
    for id in source_task_ids(&params) {
        match view.output(id) {
            Some(Value::Object(obj)) => {
                merged.extend(obj.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(other) => {
                merged.insert(id.to_string(), other.clone());
            }
            None => {}
        }
    }
    Ok(Value::Object(merged))
}

/// Ordered outputs of the children spawned by `source_task`
fn fanout_gather(view: &ContextView<'_>, params: Value) -> Result<Value> {
    let fanout = str_param(&params, "source_task")?;
    let children = view.children(fanout);
    if children.is_empty() && view.output(fanout).is_none() {
        bail!("'{fanout}' has not spawned any children");
    }

    Ok(Value::Array(
        children
            .iter()
            .map(|child| view.output(child).cloned().unwrap_or(Value::Null))
            .collect(),
    ))
}

fn transform_format(_view: &ContextView<'_>, params: Value) -> Result<Value> {
    match params.get("template") {
        Some(Value::String(s)) => Ok(Value::String(s.clone())),
        Some(other) => Ok(Value::String(serde_json::to_string_pretty(other)?)),
        None => bail!("missing param 'template'"),
    }
}

/// Parse `text`; a surrounding markdown code fence is ignored
fn transform_json(_view: &ContextView<'_>, params: Value) -> Result<Value> {
    let text = str_param(&params, "text")?.trim();
    let body = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(text);

    serde_json::from_str(body.trim()).context("text is not valid JSON")
}

fn text_lines(_view: &ContextView<'_>, params: Value) -> Result<Value> {
    let text = str_param(&params, "text")?;
    Ok(Value::Array(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Value::String(line.to_string()))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Pipeline, TaskDefinition};
    use crate::runtime::{ExecutionContext, Registration};
    use crate::util::intern;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn context() -> ExecutionContext {
        let pipeline = Pipeline::new([
            TaskDefinition::computation("a", "x"),
            TaskDefinition::computation("b", "y"),
            TaskDefinition::fanout("each", "outputs.a", TaskDefinition::computation("each", "{{item}}")),
            TaskDefinition::function("caller", "aggregate::collect", json!({})),
        ]);
        let mut ctx = ExecutionContext::new(&pipeline, json!({}));
        ctx.record_output(&intern("a"), json!({"k": 1, "shared": "a"}));
        ctx.record_output(&intern("b"), json!("plain"));
        ctx
    }

    fn with_view<T>(ctx: &ExecutionContext, f: impl FnOnce(&ContextView<'_>) -> T) -> T {
        let task = ctx.task("caller").unwrap();
        f(&ContextView::new(ctx, task))
    }

    #[test]
    fn collect_orders_sources_and_nulls_missing() {
        let ctx = context();
        let out = with_view(&ctx, |v| {
            aggregate_collect(v, json!({"source_tasks": ["b", "ghost", "a"]}))
        })
        .unwrap();
        assert_eq!(out, json!(["plain", null, {"k": 1, "shared": "a"}]));
    }

    #[test]
    fn collect_accepts_single_source_task() {
        let ctx = context();
        let out = with_view(&ctx, |v| aggregate_collect(v, json!({"source_task": "b"}))).unwrap();
        assert_eq!(out, json!(["plain"]));

        let out = with_view(&ctx, |v| {
            aggregate_collect(v, json!({"source_task": "b", "source_tasks": "a"}))
        })
        .unwrap();
        assert_eq!(out, json!(["plain", {"k": 1, "shared": "a"}]));
    }

    #[test]
    fn collect_falls_back_to_values() {
        let ctx = context();
        let out = with_view(&ctx, |v| aggregate_collect(v, json!({"values": [1, 2]}))).unwrap();
        assert_eq!(out, json!([1, 2]));
        let out = with_view(&ctx, |v| aggregate_collect(v, json!({}))).unwrap();
        assert_eq!(out, json!([]));
    }

    #[test]
    fn merge_puts_scalars_under_their_id() {
        let ctx = context();
        let out = with_view(&ctx, |v| aggregate_merge(v, json!({"source_tasks": ["a", "b"]}))).unwrap();
        assert_eq!(out, json!({"k": 1, "shared": "a", "b": "plain"}));
    }

    #[test]
    fn gather_follows_spawn_order() {
        let mut ctx = context();
        for (i, item) in ["x", "y"].iter().enumerate() {
            let id = ctx.register(Registration {
                parent: intern("each"),
                definition: TaskDefinition::computation(format!("each_{i}"), "{{item}}"),
                injected: Default::default(),
            });
            ctx.record_output(&id, json!(item.to_uppercase()));
        }

        let out = with_view(&ctx, |v| fanout_gather(v, json!({"source_task": "each"}))).unwrap();
        assert_eq!(out, json!(["X", "Y"]));
    }

    #[test]
    fn gather_without_children_fails() {
        let ctx = context();
        let err = with_view(&ctx, |v| fanout_gather(v, json!({"source_task": "each"}))).unwrap_err();
        assert!(err.to_string().contains("has not spawned"));
    }

    #[test]
    fn json_strips_code_fence() {
        let ctx = context();
        let text = "```json\n[\"a\", \"b\"]\n```";
        let out = with_view(&ctx, |v| transform_json(v, json!({"text": text}))).unwrap();
        assert_eq!(out, json!(["a", "b"]));

        let err = with_view(&ctx, |v| transform_json(v, json!({"text": "nope"}))).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn lines_drop_blanks() {
        let ctx = context();
        let out = with_view(&ctx, |v| text_lines(v, json!({"text": " one\n\n two \n"}))).unwrap();
        assert_eq!(out, json!(["one", "two"]));
    }

    #[test]
    fn format_passes_rendered_template_through() {
        let ctx = context();
        let out = with_view(&ctx, |v| transform_format(v, json!({"template": "hi Ana"}))).unwrap();
        assert_eq!(out, json!("hi Ana"));
        assert!(with_view(&ctx, |v| transform_format(v, json!({}))).is_err());
    }
}
