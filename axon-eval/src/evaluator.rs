//! The evaluator core: node dispatch and callable application.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axon_handler::Handler;
use axon_memory::MemorySystem;
use axon_sexp::Node;
use axon_task::TaskSystem;
use axon_types::{ContextOverrides, SubtaskRequest};
use tracing::debug;

use crate::BoxFuture;
use crate::env::Env;
use crate::error::EvalError;
use crate::value::Value;
use crate::{forms, primitives};

/// Operators that receive their arguments unevaluated.
const SPECIAL_FORMS: &[&str] = &[
    "if",
    "let",
    "bind",
    "set!",
    "progn",
    "quote",
    "lambda",
    "defatom",
    "loop",
    "and",
    "or",
    "director-evaluator-loop",
    "iterative-loop",
];

/// Operators that receive evaluated arguments.
const EAGER_PRIMITIVES: &[&str] = &[
    "list",
    "eq?",
    "null?",
    "nil?",
    "+",
    "-",
    "<",
    "=",
    "string=?",
    "string-append",
    "get-field",
    "log-message",
    "read-files",
];

/// Whether `name` is taken by a special form or primitive and should not
/// be shadowed by user definitions.
pub(crate) fn is_reserved(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name) || EAGER_PRIMITIVES.contains(&name) || name == "get-context"
}

/// Interprets parsed workflow programs.
///
/// Owns shared handles to the task system, handler, and memory system; the
/// static special-form and primitive tables are consulted first, then the
/// lexical environment, then the template and tool registries.
pub struct SexpEvaluator {
    tasks: Arc<TaskSystem>,
    handler: Arc<Handler>,
    memory: Arc<MemorySystem>,
    task_counter: AtomicU64,
}

impl SexpEvaluator {
    /// An evaluator over the given collaborators.
    #[must_use]
    pub fn new(tasks: Arc<TaskSystem>, handler: Arc<Handler>, memory: Arc<MemorySystem>) -> Self {
        Self {
            tasks,
            handler,
            memory,
            task_counter: AtomicU64::new(0),
        }
    }

    /// The task system this evaluator executes against.
    pub(crate) fn tasks(&self) -> &Arc<TaskSystem> {
        &self.tasks
    }

    /// The handler this evaluator executes against.
    pub(crate) fn handler(&self) -> &Arc<Handler> {
        &self.handler
    }

    /// The memory system consulted by `get-context`.
    pub(crate) fn memory(&self) -> &Arc<MemorySystem> {
        &self.memory
    }

    /// Parse and evaluate one top-level expression in `env`.
    pub async fn evaluate_str(&self, source: &str, env: &Env) -> Result<Value, EvalError> {
        let node = axon_sexp::parse(source)?;
        self.eval(&node, env).await
    }

    /// Evaluate one node in `env`.
    pub fn eval<'a>(&'a self, node: &'a Node, env: &'a Env) -> BoxFuture<'a, Result<Value, EvalError>> {
        Box::pin(async move {
            match node {
                Node::Int(n) => Ok(Value::Int(*n)),
                Node::Float(x) => Ok(Value::Float(*x)),
                Node::Str(s) => Ok(Value::Str(s.clone())),
                Node::Bool(b) => Ok(Value::Bool(*b)),
                Node::Nil => Ok(Value::Nil),
                Node::Symbol(name) => env
                    .lookup(name)
                    .await
                    .ok_or_else(|| EvalError::unbound(name, node)),
                Node::List(items) => {
                    if items.is_empty() {
                        return Ok(Value::empty_list());
                    }
                    self.eval_list(items, node, env).await
                }
            }
        })
    }

    async fn eval_list(
        &self,
        items: &[Node],
        node: &Node,
        env: &Env,
    ) -> Result<Value, EvalError> {
        let Some((op, args)) = items.split_first() else {
            return Ok(Value::empty_list());
        };

        if let Some(name) = op.as_symbol() {
            // Phase one: the static tables.
            if SPECIAL_FORMS.contains(&name) {
                return forms::dispatch(self, name, args, env, node).await;
            }
            if name == "get-context" {
                return primitives::get_context(self, args, env, node).await;
            }
            if EAGER_PRIMITIVES.contains(&name) {
                let values = self.eval_args(args, env).await?;
                return primitives::apply(self, name, values, node).await;
            }

            // Phase two: lexical bindings shadow the registries and apply
            // positionally.
            if let Some(value) = env.lookup(name).await {
                let args = self.eval_args(args, env).await?;
                return self.apply(value, args, node).await;
            }

            // Registered callables take named `(key value)` arguments;
            // templates shadow tools.
            if self.tasks.find_template(name).await.is_some() {
                return self.invoke_template_by_name(name, args, env, node).await;
            }
            if self.handler.has_tool(name).await {
                return self.invoke_tool_by_name(name, args, env, node).await;
            }

            return Err(EvalError::unbound(name, node));
        }

        // Non-symbol head: evaluate it and apply positionally, e.g.
        // ((lambda (x) x) 1).
        let callee = self.eval(op, env).await?;
        let args = self.eval_args(args, env).await?;
        self.apply(callee, args, node).await
    }

    /// Evaluate argument expressions left to right.
    pub(crate) async fn eval_args(
        &self,
        args: &[Node],
        env: &Env,
    ) -> Result<Vec<Value>, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env).await?);
        }
        Ok(values)
    }

    /// Apply a value to positional arguments.
    pub(crate) async fn apply(
        &self,
        callee: Value,
        args: Vec<Value>,
        expr: &Node,
    ) -> Result<Value, EvalError> {
        self.apply_with_frame(&callee, args, &[], expr).await
    }

    /// Apply a value to positional arguments, seeding `extras` into the
    /// call frame (used by the loop constructs to expose `*loop-config*`
    /// inside phase closures).
    pub(crate) async fn apply_with_frame(
        &self,
        callee: &Value,
        args: Vec<Value>,
        extras: &[(String, Value)],
        expr: &Node,
    ) -> Result<Value, EvalError> {
        match callee {
            Value::Closure(closure) => {
                if args.len() != closure.params.len() {
                    return Err(EvalError::arity(
                        format!(
                            "closure expects {} argument(s), got {}",
                            closure.params.len(),
                            args.len()
                        ),
                        expr,
                    ));
                }
                let frame = closure.env.extend(
                    closure
                        .params
                        .iter()
                        .cloned()
                        .zip(args)
                        .chain(extras.iter().cloned()),
                );
                let mut result = Value::empty_list();
                for body_expr in &closure.body {
                    result = self.eval(body_expr, &frame).await?;
                }
                Ok(result)
            }
            Value::Native(native) => native.call(args).await,
            Value::Task(handle) => {
                if args.len() != handle.params.len() {
                    return Err(EvalError::arity(
                        format!(
                            "task '{}' expects {} argument(s), got {}",
                            handle.name,
                            handle.params.len(),
                            args.len()
                        ),
                        expr,
                    ));
                }
                let mut inputs = serde_json::Map::new();
                for (param, value) in handle.params.iter().zip(&args) {
                    inputs.insert(param.clone(), value.to_json(&expr.to_string())?);
                }
                let mut request =
                    SubtaskRequest::new(self.next_task_id(&handle.name), handle.name.clone());
                request.inputs = inputs;
                debug!(task = %handle.name, "applying defatom task handle");
                let result = self.tasks.execute_atomic_template(request).await;
                Ok(Value::TaskResult(result))
            }
            other => Err(EvalError::type_error(
                format!("{} is not callable", other.type_name()),
                expr,
            )),
        }
    }

    /// Invoke a registered template with named `(key value)` arguments.
    /// The keys `files` and `context` carry execution overrides rather
    /// than inputs.
    async fn invoke_template_by_name(
        &self,
        name: &str,
        args: &[Node],
        env: &Env,
        expr: &Node,
    ) -> Result<Value, EvalError> {
        let mut inputs = serde_json::Map::new();
        let mut files: Option<Vec<String>> = None;
        let mut context: Option<ContextOverrides> = None;

        for (arg_name, value) in self.named_pairs(args, env, expr).await? {
            match arg_name.as_str() {
                "files" => files = Some(string_list(&value, expr)?),
                "context" => context = Some(context_overrides(&value, expr)?),
                _ => {
                    inputs.insert(arg_name, value.to_json(&expr.to_string())?);
                }
            }
        }

        let mut request = SubtaskRequest::new(self.next_task_id(name), name.to_string());
        request.inputs = inputs;
        request.file_paths = files;
        request.context = context;
        debug!(task = name, "invoking atomic task by name");
        let result = self.tasks.execute_atomic_template(request).await;
        Ok(Value::TaskResult(result))
    }

    /// Invoke a registered tool with named `(key value)` arguments.
    async fn invoke_tool_by_name(
        &self,
        name: &str,
        args: &[Node],
        env: &Env,
        expr: &Node,
    ) -> Result<Value, EvalError> {
        let mut input = serde_json::Map::new();
        for (arg_name, value) in self.named_pairs(args, env, expr).await? {
            input.insert(arg_name, value.to_json(&expr.to_string())?);
        }
        debug!(tool = name, "invoking direct tool");
        match self.handler.execute_tool(name, input).await {
            Ok(result) => Ok(Value::TaskResult(result)),
            Err(error) => Err(EvalError::tool(error.to_string(), expr)),
        }
    }

    /// Parse `(name value)` argument pairs, evaluating each value.
    pub(crate) async fn named_pairs(
        &self,
        args: &[Node],
        env: &Env,
        expr: &Node,
    ) -> Result<Vec<(String, Value)>, EvalError> {
        let mut pairs = Vec::with_capacity(args.len());
        for arg in args {
            let (key, value_expr) = match arg.as_list() {
                Some([key, value_expr]) => (key, value_expr),
                _ => {
                    return Err(EvalError::type_error(
                        format!("expected a (name value) argument pair, got {arg}"),
                        expr,
                    ));
                }
            };
            let Some(name) = key.as_symbol() else {
                return Err(EvalError::type_error(
                    format!("argument name must be a symbol, got {key}"),
                    expr,
                ));
            };
            let value = self.eval(value_expr, env).await?;
            pairs.push((name.to_string(), value));
        }
        Ok(pairs)
    }

    fn next_task_id(&self, name: &str) -> String {
        let n = self.task_counter.fetch_add(1, Ordering::Relaxed);
        format!("sexp_{name}_{n}")
    }
}

/// Coerce a value to a list of strings (the `files` argument).
fn string_list(value: &Value, expr: &Node) -> Result<Vec<String>, EvalError> {
    let Value::List(items) = value else {
        return Err(EvalError::type_error(
            "'files' argument must be a list of strings",
            expr,
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Str(s) => Ok(s.clone()),
            other => Err(EvalError::type_error(
                format!("'files' entries must be strings, got {}", other.type_name()),
                expr,
            )),
        })
        .collect()
}

/// Coerce an association-list value to context overrides.
fn context_overrides(value: &Value, expr: &Node) -> Result<ContextOverrides, EvalError> {
    let Value::List(items) = value else {
        return Err(EvalError::type_error(
            "'context' argument must be an association list of settings",
            expr,
        ));
    };
    let mut object = serde_json::Map::new();
    for item in items {
        let Value::List(pair) = item else {
            return Err(EvalError::type_error(
                format!("'context' entries must be (key value) pairs, got {item}"),
                expr,
            ));
        };
        let [key, val] = pair.as_slice() else {
            return Err(EvalError::type_error(
                format!("'context' entries must be (key value) pairs, got {item}"),
                expr,
            ));
        };
        let key = match key {
            Value::Symbol(s) | Value::Str(s) => s.clone(),
            other => {
                return Err(EvalError::type_error(
                    format!("'context' keys must be symbols, got {}", other.type_name()),
                    expr,
                ));
            }
        };
        object.insert(key, val.to_json(&expr.to_string())?);
    }
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|error| EvalError::type_error(format!("invalid 'context' settings: {error}"), expr))
}
