//! Eager primitives: built-in operators applied to evaluated arguments.

use axon_memory::{ContextGenerationInput, MatchingStrategy};
use axon_sexp::Node;
use axon_types::{FreshContext, TaskFailureReason, TaskResult, TaskStatus};
use serde_json::json;
use tracing::info;

use crate::env::Env;
use crate::error::EvalError;
use crate::evaluator::SexpEvaluator;
use crate::value::Value;

/// Apply an eager primitive to its evaluated arguments.
pub(crate) async fn apply(
    ev: &SexpEvaluator,
    name: &str,
    args: Vec<Value>,
    expr: &Node,
) -> Result<Value, EvalError> {
    match name {
        "list" => Ok(Value::List(args)),
        "eq?" => eq(args, expr),
        "null?" | "nil?" => nullp(name, args, expr),
        "+" => add(args, expr),
        "-" => subtract(args, expr),
        "<" => compare_lt(args, expr),
        "=" => compare_eq(args, expr),
        "string=?" => string_eq(args, expr),
        "string-append" => string_append(args, expr),
        "get-field" => get_field(args, expr),
        "log-message" => log_message(args),
        "read-files" => read_files(ev, args, expr).await,
        other => Err(EvalError::unbound(other, expr)),
    }
}

fn eq(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let [a, b] = args.as_slice() else {
        return Err(EvalError::arity("'eq?' requires exactly 2 arguments", expr));
    };
    Ok(Value::Bool(a.structural_eq(b)))
}

fn nullp(name: &str, args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let [value] = args.as_slice() else {
        return Err(EvalError::arity(
            format!("'{name}' requires exactly 1 argument"),
            expr,
        ));
    };
    Ok(Value::Bool(value.is_nullish()))
}

/// Numeric view of a value for arithmetic.
enum Num {
    Int(i64),
    Float(f64),
}

/// Extract a number. Booleans count as integers for addition only.
fn number_of(value: &Value, allow_bool: bool, op: &str, expr: &Node) -> Result<Num, EvalError> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Float(x) => Ok(Num::Float(*x)),
        Value::Bool(b) if allow_bool => Ok(Num::Int(i64::from(*b))),
        other => Err(EvalError::type_error(
            format!("'{op}' requires numeric arguments, got {}", other.type_name()),
            expr,
        )),
    }
}

fn add(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let mut acc = Num::Int(0);
    for arg in &args {
        let n = number_of(arg, true, "+", expr)?;
        acc = match (acc, n) {
            // Integer overflow promotes to float rather than wrapping.
            (Num::Int(a), Num::Int(b)) => a
                .checked_add(b)
                .map(Num::Int)
                .unwrap_or(Num::Float(a as f64 + b as f64)),
            (Num::Int(a), Num::Float(b)) => Num::Float(a as f64 + b),
            (Num::Float(a), Num::Int(b)) => Num::Float(a + b as f64),
            (Num::Float(a), Num::Float(b)) => Num::Float(a + b),
        };
    }
    Ok(match acc {
        Num::Int(n) => Value::Int(n),
        Num::Float(x) => Value::Float(x),
    })
}

fn subtract(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    match args.as_slice() {
        [value] => match number_of(value, false, "-", expr)? {
            Num::Int(n) => Ok(Value::Int(-n)),
            Num::Float(x) => Ok(Value::Float(-x)),
        },
        [a, b] => {
            let a = number_of(a, false, "-", expr)?;
            let b = number_of(b, false, "-", expr)?;
            Ok(match (a, b) {
                (Num::Int(a), Num::Int(b)) => Value::Int(a - b),
                (Num::Int(a), Num::Float(b)) => Value::Float(a as f64 - b),
                (Num::Float(a), Num::Int(b)) => Value::Float(a - b as f64),
                (Num::Float(a), Num::Float(b)) => Value::Float(a - b),
            })
        }
        _ => Err(EvalError::arity("'-' requires 1 or 2 arguments", expr)),
    }
}

fn numeric_pair(args: &[Value], op: &str, expr: &Node) -> Result<(f64, f64), EvalError> {
    let [a, b] = args else {
        return Err(EvalError::arity(
            format!("'{op}' requires exactly 2 arguments"),
            expr,
        ));
    };
    let a = match number_of(a, false, op, expr)? {
        Num::Int(n) => n as f64,
        Num::Float(x) => x,
    };
    let b = match number_of(b, false, op, expr)? {
        Num::Int(n) => n as f64,
        Num::Float(x) => x,
    };
    Ok((a, b))
}

fn compare_lt(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let (a, b) = numeric_pair(&args, "<", expr)?;
    Ok(Value::Bool(a < b))
}

fn compare_eq(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let (a, b) = numeric_pair(&args, "=", expr)?;
    Ok(Value::Bool(a == b))
}

fn string_eq(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    match args.as_slice() {
        [Value::Str(a), Value::Str(b)] => Ok(Value::Bool(a == b)),
        [_, _] => Err(EvalError::type_error(
            "'string=?' requires two string arguments",
            expr,
        )),
        _ => Err(EvalError::arity(
            "'string=?' requires exactly 2 arguments",
            expr,
        )),
    }
}

fn string_append(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let mut out = String::new();
    for arg in &args {
        match arg {
            Value::Str(s) => out.push_str(s),
            Value::Symbol(name) => out.push_str(name),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(x) => out.push_str(&format!("{x:?}")),
            Value::Bool(true) => out.push_str("true"),
            Value::Bool(false) => out.push_str("false"),
            Value::Nil => {}
            other => {
                return Err(EvalError::type_error(
                    format!("'string-append' cannot coerce a {}", other.type_name()),
                    expr,
                ));
            }
        }
    }
    Ok(Value::Str(out))
}

fn get_field(args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let [object, key] = args.as_slice() else {
        return Err(EvalError::arity(
            "'get-field' requires an object and a key",
            expr,
        ));
    };
    let key = match key {
        Value::Str(s) | Value::Symbol(s) => s.as_str(),
        other => {
            return Err(EvalError::type_error(
                format!("'get-field' key must be a string or symbol, got {}", other.type_name()),
                expr,
            ));
        }
    };

    match object {
        // Association list: a list of (key value) pairs.
        Value::List(items) => {
            for item in items {
                if let Value::List(pair) = item
                    && let [entry_key, entry_value] = pair.as_slice()
                    && matches!(entry_key, Value::Str(s) | Value::Symbol(s) if s == key)
                {
                    return Ok(entry_value.clone());
                }
            }
            Ok(Value::Nil)
        }
        Value::TaskResult(result) => Ok(task_result_field(result, key)),
        Value::Nil => Ok(Value::Nil),
        other => Err(EvalError::type_error(
            format!(
                "'get-field' requires an association list or task result, got {}",
                other.type_name()
            ),
            expr,
        )),
    }
}

fn task_result_field(result: &TaskResult, key: &str) -> Value {
    match key {
        "status" => Value::Str(
            match result.status {
                TaskStatus::Complete => "COMPLETE",
                TaskStatus::Failed => "FAILED",
                TaskStatus::Pending => "PENDING",
                TaskStatus::Partial => "PARTIAL",
            }
            .to_string(),
        ),
        "content" => Value::Str(result.content.clone()),
        "notes" => Value::from_json(&serde_json::Value::Object(result.notes.clone())),
        // Convenience: unknown keys fall through to the notes map.
        other => result
            .notes
            .get(other)
            .map(Value::from_json)
            .unwrap_or(Value::Nil),
    }
}

fn log_message(args: Vec<Value>) -> Result<Value, EvalError> {
    let message = args
        .iter()
        .map(|arg| match arg {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    info!(target: "axon::workflow", "{message}");
    Ok(Value::Nil)
}

/// `(read-files (quote (path...)))` — read files through the handler's
/// file-access manager, returning a task result with their contents.
async fn read_files(ev: &SexpEvaluator, args: Vec<Value>, expr: &Node) -> Result<Value, EvalError> {
    let [paths_value] = args.as_slice() else {
        return Err(EvalError::arity(
            "'read-files' requires exactly one list of paths",
            expr,
        ));
    };
    let Value::List(items) = paths_value else {
        return Err(EvalError::type_error(
            "'read-files' requires a list of path strings",
            expr,
        ));
    };
    let mut paths = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Str(path) => paths.push(path.clone()),
            other => {
                return Err(EvalError::type_error(
                    format!("'read-files' paths must be strings, got {}", other.type_name()),
                    expr,
                ));
            }
        }
    }

    let outcomes = ev.handler().files().read_files(&paths).await;
    let mut content = String::new();
    let mut errors = serde_json::Map::new();
    let mut read = 0usize;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(text) => {
                read += 1;
                content.push_str(&format!("=== {path} ===\n{text}\n"));
            }
            Err(error) => {
                errors.insert(path, json!(error.to_string()));
            }
        }
    }

    let mut result = if read == 0 && !paths.is_empty() {
        TaskResult::failed("no files could be read")
    } else {
        TaskResult::complete(content)
    };
    result.notes.insert("files".to_string(), json!(paths));
    result.notes.insert("file_count".to_string(), json!(read));
    if !errors.is_empty() {
        result
            .notes
            .insert("read_errors".to_string(), serde_json::Value::Object(errors));
    }
    Ok(Value::TaskResult(result))
}

/// `(get-context (option value)...)` — build a context generation input
/// from named options and return the matched paths.
pub(crate) async fn get_context(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    if args.is_empty() {
        return Err(EvalError::type_error("'get-context' requires options", expr));
    }

    let mut input = ContextGenerationInput::default();
    for (name, value) in ev.named_pairs(args, env, expr).await? {
        match name.as_str() {
            "query" | "templateDescription" => {
                input.template_description = expect_string(&value, &name, expr)?;
            }
            "templateType" => input.template_type = expect_string(&value, &name, expr)?,
            "templateSubtype" => input.template_subtype = expect_string(&value, &name, expr)?,
            "inputs" => input.inputs = assoc_to_map(&value, expr)?,
            "matching_strategy" => {
                let text = expect_string(&value, &name, expr)?;
                input.matching_strategy = MatchingStrategy::parse(&text)
                    .map_err(|error| EvalError::type_error(error.to_string(), expr))?;
            }
            "inheritedContext" => input.inherited_context = expect_string(&value, &name, expr)?,
            "previousOutputs" => {
                let Value::List(items) = &value else {
                    return Err(EvalError::type_error(
                        "'previousOutputs' must be a list of strings",
                        expr,
                    ));
                };
                input.previous_outputs = items
                    .iter()
                    .map(|item| expect_string(item, "previousOutputs", expr))
                    .collect::<Result<_, _>>()?;
            }
            "fresh_context" => {
                input.fresh_context = match expect_string(&value, &name, expr)?.as_str() {
                    "enabled" => FreshContext::Enabled,
                    "disabled" => FreshContext::Disabled,
                    other => {
                        return Err(EvalError::type_error(
                            format!("'fresh_context' must be \"enabled\" or \"disabled\", got \"{other}\""),
                            expr,
                        ));
                    }
                };
            }
            other => {
                return Err(EvalError::type_error(
                    format!("unknown 'get-context' option '{other}'"),
                    expr,
                ));
            }
        }
    }

    let matches = ev
        .memory()
        .get_relevant_context_for(&input)
        .await
        .map_err(|error| {
            EvalError::task_failure(
                TaskFailureReason::ContextRetrievalFailure,
                format!("Context retrieval failed: {error}"),
                expr,
            )
        })?;
    Ok(Value::List(
        matches.paths().into_iter().map(Value::Str).collect(),
    ))
}

fn expect_string(value: &Value, what: &str, expr: &Node) -> Result<String, EvalError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::type_error(
            format!("'{what}' must be a string, got {}", other.type_name()),
            expr,
        )),
    }
}

fn assoc_to_map(
    value: &Value,
    expr: &Node,
) -> Result<serde_json::Map<String, serde_json::Value>, EvalError> {
    let Value::List(items) = value else {
        return Err(EvalError::type_error(
            "'inputs' must be an association list (usually quoted)",
            expr,
        ));
    };
    let mut map = serde_json::Map::new();
    for item in items {
        let Value::List(pair) = item else {
            return Err(EvalError::type_error(
                format!("'inputs' entries must be (key value) pairs, got {item}"),
                expr,
            ));
        };
        let [key, entry_value] = pair.as_slice() else {
            return Err(EvalError::type_error(
                format!("'inputs' entries must be (key value) pairs, got {item}"),
                expr,
            ));
        };
        let key = match key {
            Value::Str(s) | Value::Symbol(s) => s.clone(),
            other => {
                return Err(EvalError::type_error(
                    format!("'inputs' keys must be symbols or strings, got {}", other.type_name()),
                    expr,
                ));
            }
        };
        map.insert(key, entry_value.to_json(&expr.to_string())?);
    }
    Ok(map)
}
