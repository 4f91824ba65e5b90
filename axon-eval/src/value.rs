//! Runtime values.

use std::fmt;
use std::sync::Arc;

use axon_sexp::Node;
use axon_types::TaskResult;

use crate::BoxFuture;
use crate::env::Env;
use crate::error::EvalError;

/// A first-class function value created by `lambda`.
///
/// Owns its parameter symbols and unevaluated body, and shares ownership of
/// the environment captured at definition time. Application extends that
/// captured environment with a fresh call frame.
pub struct Closure {
    /// Formal parameter names.
    pub params: Vec<String>,
    /// Body expressions, evaluated sequentially on application.
    pub body: Vec<Node>,
    /// The definition environment.
    pub env: Env,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body_exprs", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// A host function exposed as a first-class value.
pub trait NativeCallable: Send + Sync {
    /// Name used in error messages and display output.
    fn name(&self) -> &str;
    /// Apply the callable to evaluated arguments.
    fn call(&self, args: Vec<Value>) -> BoxFuture<'_, Result<Value, EvalError>>;
}

/// A callable wrapper bound by `defatom`: applying it with arity-matching
/// positional arguments executes the registered atomic task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle {
    /// Registered template name.
    pub name: String,
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
    /// A boolean.
    Bool(bool),
    /// The unit value.
    Nil,
    /// A symbol (from quoted data).
    Symbol(String),
    /// A list of values; also the result of quoting a list.
    List(Vec<Value>),
    /// A lambda closure.
    Closure(Arc<Closure>),
    /// A host callable.
    Native(Arc<dyn NativeCallable>),
    /// A `defatom`-bound atomic task.
    Task(Arc<TaskHandle>),
    /// A task or tool result envelope.
    TaskResult(TaskResult),
}

impl Value {
    /// The empty list.
    #[must_use]
    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    /// Truthiness: only `false` and `nil` are falsey.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    /// Whether this value answers true to `null?` / `nil?`: `nil` or the
    /// empty list.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Nil) || matches!(self, Value::List(items) if items.is_empty())
    }

    /// Whether the value can be applied to arguments.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Native(_) | Value::Task(_))
    }

    /// A short name for the value's type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Closure(_) => "closure",
            Value::Native(_) => "native function",
            Value::Task(_) => "task",
            Value::TaskResult(_) => "task result",
        }
    }

    /// Build the value a quoted node denotes: symbols survive as symbols,
    /// lists recurse.
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        match node {
            Node::Int(n) => Value::Int(*n),
            Node::Float(x) => Value::Float(*x),
            Node::Str(s) => Value::Str(s.clone()),
            Node::Bool(b) => Value::Bool(*b),
            Node::Nil => Value::Nil,
            Node::Symbol(name) => Value::Symbol(name.clone()),
            Node::List(items) => Value::List(items.iter().map(Value::from_node).collect()),
        }
    }

    /// Structural equality with numeric cross-type coercion (`1` equals
    /// `1.0`). Values of otherwise different types compare unequal;
    /// closures and natives compare by identity.
    #[must_use]
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => a == b,
            (Value::TaskResult(a), Value::TaskResult(b)) => a == b,
            _ => false,
        }
    }

    /// Convert to a JSON value for task/tool inputs. Callables do not
    /// serialize.
    pub fn to_json(&self, context: &str) -> Result<serde_json::Value, EvalError> {
        match self {
            Value::Int(n) => Ok(serde_json::Value::from(*n)),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    EvalError::type_error(format!("cannot serialize non-finite float {x}"), context)
                }),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Nil => Ok(serde_json::Value::Null),
            Value::Symbol(name) => Ok(serde_json::Value::String(name.clone())),
            Value::List(items) => Ok(serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json(context))
                    .collect::<Result<_, _>>()?,
            )),
            Value::TaskResult(result) => serde_json::to_value(result).map_err(|error| {
                EvalError::type_error(format!("cannot serialize task result: {error}"), context)
            }),
            Value::Closure(_) | Value::Native(_) | Value::Task(_) => Err(EvalError::type_error(
                format!("cannot serialize a {} as task input", self.type_name()),
                context,
            )),
        }
    }

    /// Convert a JSON value back into a runtime value. Objects become
    /// association lists of `(key value)` pairs.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::List(
                map.iter()
                    .map(|(key, value)| {
                        Value::List(vec![Value::Str(key.clone()), Value::from_json(value)])
                    })
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    /// Strict equality: same type and equal contents (no numeric
    /// coercion; language-level `eq?` uses [`Value::structural_eq`]).
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => a == b,
            (Value::TaskResult(a), Value::TaskResult(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bool(true) => f.write_str("true"),
            Value::Bool(false) => f.write_str("false"),
            Value::Nil => f.write_str("nil"),
            Value::Symbol(name) => f.write_str(name),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Closure(c) => write!(f, "#<closure/{}>", c.params.len()),
            Value::Native(n) => write!(f, "#<native {}>", n.name()),
            Value::Task(t) => write!(f, "#<task {}>", t.name),
            Value::TaskResult(r) => write!(f, "#<task-result {:?}>", r.status),
        }
    }
}
