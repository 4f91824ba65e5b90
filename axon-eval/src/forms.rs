//! Special-form handlers: operators that receive their arguments
//! unevaluated and choose their own evaluation order.

use std::sync::Arc;

use axon_sexp::Node;
use axon_types::{
    HistoryConfig, ModelPreference, OutputFormat, ParamSpec, TaskFailureReason, TaskTemplate,
};
use tracing::{debug, warn};

use crate::env::Env;
use crate::error::EvalError;
use crate::evaluator::{SexpEvaluator, is_reserved};
use crate::value::{Closure, TaskHandle, Value};
use crate::loops;

/// Route a special form to its handler.
pub(crate) async fn dispatch(
    ev: &SexpEvaluator,
    name: &str,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    match name {
        "if" => if_form(ev, args, env, expr).await,
        "let" => let_form(ev, args, env, expr).await,
        "bind" => bind_form(ev, args, env, expr).await,
        "set!" => set_form(ev, args, env, expr).await,
        "progn" => progn_form(ev, args, env).await,
        "quote" => quote_form(args, expr),
        "lambda" => lambda_form(args, env, expr),
        "defatom" => defatom_form(ev, args, env, expr).await,
        "loop" => loop_form(ev, args, env, expr).await,
        "and" => and_form(ev, args, env).await,
        "or" => or_form(ev, args, env).await,
        "director-evaluator-loop" => loops::director_evaluator(ev, args, env, expr).await,
        "iterative-loop" => loops::iterative(ev, args, env, expr).await,
        other => Err(EvalError::unbound(other, expr)),
    }
}

/// `(if condition then else)`
async fn if_form(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    let [condition, then_branch, else_branch] = args else {
        return Err(EvalError::arity(
            "'if' requires 3 arguments: (if condition then else)",
            expr,
        ));
    };
    let chosen = if ev.eval(condition, env).await?.is_truthy() {
        then_branch
    } else {
        else_branch
    };
    ev.eval(chosen, env).await
}

/// `(let ((var expr)...) body...)` — binding values evaluate in the outer
/// environment; the body evaluates in the child frame.
async fn let_form(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    let Some((bindings_node, body)) = args.split_first() else {
        return Err(EvalError::arity(
            "'let' requires a bindings list and at least one body expression",
            expr,
        ));
    };
    let Some(binding_exprs) = bindings_node.as_list() else {
        return Err(EvalError::type_error(
            "'let' bindings must be a list of (symbol expression) pairs",
            expr,
        ));
    };
    if body.is_empty() {
        return Err(EvalError::arity(
            "'let' requires at least one body expression",
            expr,
        ));
    }

    let mut evaluated = Vec::with_capacity(binding_exprs.len());
    for binding in binding_exprs {
        let (name, value_expr) = match binding.as_list() {
            Some([name_node, value_expr]) => match name_node.as_symbol() {
                Some(name) => (name, value_expr),
                None => {
                    return Err(EvalError::type_error(
                        format!("'let' binding name must be a symbol, got {name_node}"),
                        expr,
                    ));
                }
            },
            _ => {
                return Err(EvalError::type_error(
                    format!("invalid 'let' binding, expected (symbol expression): {binding}"),
                    expr,
                ));
            }
        };
        let value = ev.eval(value_expr, env).await?;
        evaluated.push((name.to_string(), value));
    }

    let frame = env.extend(evaluated);
    let mut result = Value::empty_list();
    for body_expr in body {
        result = ev.eval(body_expr, &frame).await?;
    }
    Ok(result)
}

/// `(bind symbol expression)` — define in the current frame, return the
/// value.
async fn bind_form(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    let [name_node, value_expr] = args else {
        return Err(EvalError::arity(
            "'bind' requires a symbol and a value expression",
            expr,
        ));
    };
    let Some(name) = name_node.as_symbol() else {
        return Err(EvalError::type_error(
            format!("'bind' target must be a symbol, got {name_node}"),
            expr,
        ));
    };
    if is_reserved(name) {
        warn!(symbol = name, "binding shadows a built-in operator");
    }
    let value = ev.eval(value_expr, env).await?;
    env.define(name, value.clone()).await;
    Ok(value)
}

/// `(set! symbol expression)` — mutate the nearest existing binding.
async fn set_form(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    let [name_node, value_expr] = args else {
        return Err(EvalError::arity(
            "'set!' requires a symbol and a value expression",
            expr,
        ));
    };
    let Some(name) = name_node.as_symbol() else {
        return Err(EvalError::type_error(
            format!("'set!' target must be a symbol, got {name_node}"),
            expr,
        ));
    };
    let value = ev.eval(value_expr, env).await?;
    if !env.set(name, value.clone()).await {
        return Err(EvalError::unbound(name, expr));
    }
    Ok(value)
}

/// `(progn expr...)` — evaluate sequentially, return the last value.
async fn progn_form(ev: &SexpEvaluator, args: &[Node], env: &Env) -> Result<Value, EvalError> {
    let mut result = Value::empty_list();
    for arg in args {
        result = ev.eval(arg, env).await?;
    }
    Ok(result)
}

/// `(quote expression)` — the expression as data; symbols survive.
fn quote_form(args: &[Node], expr: &Node) -> Result<Value, EvalError> {
    let [quoted] = args else {
        return Err(EvalError::arity("'quote' requires exactly one argument", expr));
    };
    Ok(Value::from_node(quoted))
}

/// `(lambda (params...) body...)` — a closure over the current
/// environment.
fn lambda_form(args: &[Node], env: &Env, expr: &Node) -> Result<Value, EvalError> {
    let Some((params_node, body)) = args.split_first() else {
        return Err(EvalError::arity(
            "'lambda' requires a parameter list and at least one body expression",
            expr,
        ));
    };
    let Some(param_nodes) = params_node.as_list() else {
        return Err(EvalError::type_error(
            "'lambda' parameters must be a list of symbols",
            expr,
        ));
    };
    let mut params = Vec::with_capacity(param_nodes.len());
    for param in param_nodes {
        let Some(name) = param.as_symbol() else {
            return Err(EvalError::type_error(
                format!("'lambda' parameter must be a symbol, got {param}"),
                expr,
            ));
        };
        params.push(name.to_string());
    }
    if body.is_empty() {
        return Err(EvalError::arity(
            "'lambda' requires at least one body expression",
            expr,
        ));
    }
    Ok(Value::Closure(Arc::new(Closure {
        params,
        body: body.to_vec(),
        env: env.clone(),
    })))
}

/// `(loop n body)` — evaluate `body` `n` times in the current environment;
/// the empty list when `n` is zero.
async fn loop_form(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    let [count_expr, body_expr] = args else {
        return Err(EvalError::arity(
            "'loop' requires a count expression and a body expression",
            expr,
        ));
    };
    let count = match ev.eval(count_expr, env).await? {
        Value::Int(n) if n >= 0 => n,
        Value::Int(n) => {
            return Err(EvalError::type_error(
                format!("'loop' count must be non-negative, got {n}"),
                expr,
            ));
        }
        other => {
            return Err(EvalError::type_error(
                format!("'loop' count must be an integer, got {}", other.type_name()),
                expr,
            ));
        }
    };

    let mut result = Value::empty_list();
    for _ in 0..count {
        result = ev.eval(body_expr, env).await?;
    }
    Ok(result)
}

/// `(and expr...)` — first falsey value, else the last value; `true` with
/// no arguments.
async fn and_form(ev: &SexpEvaluator, args: &[Node], env: &Env) -> Result<Value, EvalError> {
    let mut last = Value::Bool(true);
    for arg in args {
        last = ev.eval(arg, env).await?;
        if !last.is_truthy() {
            return Ok(last);
        }
    }
    Ok(last)
}

/// `(or expr...)` — first truthy value, else the last value; `false` with
/// no arguments.
async fn or_form(ev: &SexpEvaluator, args: &[Node], env: &Env) -> Result<Value, EvalError> {
    let mut last = Value::Bool(false);
    for arg in args {
        last = ev.eval(arg, env).await?;
        if last.is_truthy() {
            return Ok(last);
        }
    }
    Ok(last)
}

/// `(defatom name (params ...) (instructions "...") clauses...)` —
/// register an atomic task template and bind `name` to a callable handle.
async fn defatom_form(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    let Some((name_node, clauses)) = args.split_first() else {
        return Err(EvalError::arity(
            "'defatom' requires at least a task name and an (instructions ...) clause",
            expr,
        ));
    };
    let Some(task_name) = name_node.as_symbol() else {
        return Err(EvalError::type_error(
            format!("'defatom' task name must be a symbol, got {name_node}"),
            expr,
        ));
    };
    if is_reserved(task_name) {
        warn!(task = task_name, "defatom shadows a built-in operator");
    }

    let mut instructions: Option<String> = None;
    let mut params: Option<Vec<ParamSpec>> = None;
    let mut subtype: Option<String> = None;
    let mut description: Option<String> = None;
    let mut model: Option<String> = None;
    let mut output_format: Option<OutputFormat> = None;
    let mut history_config: Option<HistoryConfig> = None;

    for clause in clauses {
        let Some(items) = clause.as_list() else {
            return Err(EvalError::type_error(
                format!("unexpected 'defatom' argument {clause}; expected a (key ...) clause"),
                expr,
            ));
        };
        let Some(key) = items.first().and_then(Node::as_symbol) else {
            return Err(EvalError::type_error(
                format!("unexpected 'defatom' argument {clause}; expected a (key ...) clause"),
                expr,
            ));
        };
        match key {
            "instructions" => {
                if instructions.is_some() {
                    return Err(EvalError::type_error(
                        format!("duplicate (instructions ...) clause for task '{task_name}'"),
                        expr,
                    ));
                }
                match items {
                    [_, Node::Str(text)] => instructions = Some(text.clone()),
                    _ => {
                        return Err(EvalError::type_error(
                            format!(
                                "'defatom' requires an (instructions \"string\") clause, got {clause}"
                            ),
                            expr,
                        ));
                    }
                }
            }
            "params" => {
                if params.is_some() {
                    return Err(EvalError::type_error(
                        format!("duplicate (params ...) clause for task '{task_name}'"),
                        expr,
                    ));
                }
                params = Some(parse_params(&items[1..], task_name, expr)?);
            }
            "subtype" => subtype = Some(string_clause(items, key, expr)?),
            "description" => description = Some(string_clause(items, key, expr)?),
            "model" => model = Some(string_clause(items, key, expr)?),
            "output_format" => {
                let object = structured_clause(items, key, expr)?;
                output_format = Some(serde_json::from_value(object).map_err(|error| {
                    EvalError::type_error(format!("invalid 'output_format': {error}"), expr)
                })?);
            }
            "history_config" => {
                let object = structured_clause(items, key, expr)?;
                history_config = Some(serde_json::from_value(object).map_err(|error| {
                    EvalError::type_error(format!("invalid 'history_config': {error}"), expr)
                })?);
            }
            other => {
                return Err(EvalError::type_error(
                    format!(
                        "unknown 'defatom' clause '{other}'; expected params, instructions, \
                         subtype, description, model, output_format, or history_config"
                    ),
                    expr,
                ));
            }
        }
    }

    let Some(instructions) = instructions else {
        return Err(EvalError::type_error(
            format!("'defatom' for task '{task_name}' is missing the (instructions \"...\") clause"),
            expr,
        ));
    };
    let params = params.unwrap_or_default();
    let param_names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();

    let mut template = TaskTemplate::atomic(task_name, instructions);
    if let Some(subtype) = subtype {
        template.subtype = subtype;
    }
    template.description =
        Some(description.unwrap_or_else(|| format!("Dynamically defined task: {task_name}")));
    template.params = params;
    template.model = model.map(ModelPreference::Name);
    template.output_format = output_format;
    template.history_config = history_config;

    ev.tasks()
        .register_template(template)
        .await
        .map_err(|error| {
            EvalError::task_failure(TaskFailureReason::InputValidationFailure, error.message, expr)
        })?;
    debug!(task = task_name, "registered dynamic atomic task");

    // Lexical binding: applying the handle with positional arguments
    // executes the task.
    env.define(
        task_name,
        Value::Task(Arc::new(TaskHandle {
            name: task_name.to_string(),
            params: param_names,
        })),
    )
    .await;
    Ok(Value::Symbol(task_name.to_string()))
}

/// Parse `(params p1 (p2 "type") ...)` items into required parameters.
fn parse_params(items: &[Node], task_name: &str, expr: &Node) -> Result<Vec<ParamSpec>, EvalError> {
    let mut params = Vec::with_capacity(items.len());
    for item in items {
        let name = match item {
            Node::Symbol(name) => name.clone(),
            Node::List(inner) => match inner.first().and_then(Node::as_symbol) {
                Some(name) => name.to_string(),
                None => {
                    return Err(EvalError::type_error(
                        format!(
                            "invalid parameter definition in (params ...) for task \
                             '{task_name}': {item}"
                        ),
                        expr,
                    ));
                }
            },
            _ => {
                return Err(EvalError::type_error(
                    format!(
                        "invalid parameter definition in (params ...) for task '{task_name}': {item}"
                    ),
                    expr,
                ));
            }
        };
        params.push(ParamSpec::required(name));
    }
    Ok(params)
}

/// Parse a `(key "string")` clause.
fn string_clause(items: &[Node], key: &str, expr: &Node) -> Result<String, EvalError> {
    match items {
        [_, Node::Str(value)] => Ok(value.clone()),
        _ => Err(EvalError::type_error(
            format!("value for 'defatom' clause '{key}' must be a string"),
            expr,
        )),
    }
}

/// Parse a `(key ((inner value)...))` clause into a JSON object. The value
/// may be quoted; keys are symbols and values are strings, integers,
/// booleans, or nil.
fn structured_clause(
    items: &[Node],
    key: &str,
    expr: &Node,
) -> Result<serde_json::Value, EvalError> {
    let [_, value_node] = items else {
        return Err(EvalError::type_error(
            format!("'defatom' clause '{key}' is missing its value"),
            expr,
        ));
    };
    // Accept (quote (...)) — the reader normalizes 'X to that shape.
    let value_node = match value_node.as_list() {
        Some([quote, inner]) if quote.as_symbol() == Some("quote") => inner,
        _ => value_node,
    };
    let Some(pairs) = value_node.as_list() else {
        return Err(EvalError::type_error(
            format!("value for 'defatom' clause '{key}' must be a list of (key value) pairs"),
            expr,
        ));
    };

    let mut object = serde_json::Map::new();
    for pair in pairs {
        let (inner_key, inner_value) = match pair.as_list() {
            Some([key_node, value]) => match key_node.as_symbol() {
                Some(inner_key) => (inner_key, value),
                None => {
                    return Err(EvalError::type_error(
                        format!("invalid pair in '{key}': {pair}"),
                        expr,
                    ));
                }
            },
            _ => {
                return Err(EvalError::type_error(
                    format!("invalid pair in '{key}': {pair}"),
                    expr,
                ));
            }
        };
        let json = match inner_value {
            Node::Str(s) => serde_json::Value::String(s.clone()),
            Node::Int(n) => serde_json::Value::from(*n),
            Node::Bool(b) => serde_json::Value::Bool(*b),
            Node::Nil => serde_json::Value::Null,
            other => {
                return Err(EvalError::type_error(
                    format!(
                        "invalid value for '{inner_key}' in '{key}': {other}; expected a \
                         string, integer, true/false, or nil"
                    ),
                    expr,
                ));
            }
        };
        object.insert(inner_key.to_string(), json);
    }
    Ok(serde_json::Value::Object(object))
}
