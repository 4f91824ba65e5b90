//! The plan/execute/validate/control loop constructs.

use std::collections::HashMap;

use axon_sexp::Node;
use tracing::{debug, info};

use crate::env::Env;
use crate::error::EvalError;
use crate::evaluator::SexpEvaluator;
use crate::value::Value;

/// `(director-evaluator-loop (max-iterations N) (initial-director-input E)
/// (director F) (executor F) (evaluator F) (controller F))`
pub(crate) async fn director_evaluator(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    const CONSTRUCT: &str = "director-evaluator-loop";
    let clauses = parse_clauses(
        CONSTRUCT,
        args,
        &[
            "max-iterations",
            "initial-director-input",
            "director",
            "executor",
            "evaluator",
            "controller",
        ],
        expr,
    )?;

    let max_iterations = eval_max_iterations(ev, clauses["max-iterations"], env, CONSTRUCT, expr).await?;
    let mut director_input = ev.eval(clauses["initial-director-input"], env).await?;

    let director = eval_phase_fn(ev, clauses["director"], env, "director", CONSTRUCT, expr).await?;
    let executor = eval_phase_fn(ev, clauses["executor"], env, "executor", CONSTRUCT, expr).await?;
    let evaluator = eval_phase_fn(ev, clauses["evaluator"], env, "evaluator", CONSTRUCT, expr).await?;
    let controller =
        eval_phase_fn(ev, clauses["controller"], env, "controller", CONSTRUCT, expr).await?;

    // Immutable loop configuration, visible to phases as *loop-config*.
    let config = Value::List(vec![
        pair("max-iterations", Value::Int(max_iterations)),
        pair("initial-director-input", director_input.clone()),
    ]);
    let extras = [("*loop-config*".to_string(), config)];

    let mut last_executor_result = Value::empty_list();
    for iteration in 1..=max_iterations as usize {
        debug!(iteration, max_iterations, "director-evaluator-loop iteration");
        let iter_value = Value::Int(iteration as i64);

        let plan = ev
            .apply_with_frame(&director, vec![director_input.clone(), iter_value.clone()], &extras, expr)
            .await
            .map_err(|e| e.in_loop_phase("director", iteration))?;
        let exec_result = ev
            .apply_with_frame(&executor, vec![plan.clone(), iter_value.clone()], &extras, expr)
            .await
            .map_err(|e| e.in_loop_phase("executor", iteration))?;
        last_executor_result = exec_result.clone();
        let feedback = ev
            .apply_with_frame(
                &evaluator,
                vec![exec_result.clone(), plan.clone(), iter_value.clone()],
                &extras,
                expr,
            )
            .await
            .map_err(|e| e.in_loop_phase("evaluator", iteration))?;
        let decision = ev
            .apply_with_frame(
                &controller,
                vec![feedback, plan, exec_result, iter_value],
                &extras,
                expr,
            )
            .await
            .map_err(|e| e.in_loop_phase("controller", iteration))?;

        match decide(decision, expr)? {
            Decision::Stop(value) => {
                info!(iteration, "director-evaluator-loop stopped by controller");
                return Ok(value);
            }
            Decision::Continue(value) => director_input = value,
        }
    }

    info!(max_iterations, "director-evaluator-loop exhausted max iterations");
    Ok(last_executor_result)
}

/// `(iterative-loop (max-iterations N) (initial-input E) (test-command S)
/// (executor F) (validator F) (controller F))`
pub(crate) async fn iterative(
    ev: &SexpEvaluator,
    args: &[Node],
    env: &Env,
    expr: &Node,
) -> Result<Value, EvalError> {
    const CONSTRUCT: &str = "iterative-loop";
    let clauses = parse_clauses(
        CONSTRUCT,
        args,
        &[
            "max-iterations",
            "initial-input",
            "test-command",
            "executor",
            "validator",
            "controller",
        ],
        expr,
    )?;

    let max_iterations = eval_max_iterations(ev, clauses["max-iterations"], env, CONSTRUCT, expr).await?;

    let mut input = ev.eval(clauses["initial-input"], env).await?;
    // A quoted bare symbol as initial input means its name.
    if let Value::Symbol(name) = input {
        input = Value::Str(name);
    }

    let test_command = match ev.eval(clauses["test-command"], env).await? {
        Value::Str(command) => command,
        other => {
            return Err(EvalError::type_error(
                format!(
                    "{CONSTRUCT}: 'test-command' must evaluate to a string, got {}",
                    other.type_name()
                ),
                expr,
            ));
        }
    };

    let executor = eval_phase_fn(ev, clauses["executor"], env, "executor", CONSTRUCT, expr).await?;
    let validator = eval_phase_fn(ev, clauses["validator"], env, "validator", CONSTRUCT, expr).await?;
    let controller =
        eval_phase_fn(ev, clauses["controller"], env, "controller", CONSTRUCT, expr).await?;

    let config = Value::List(vec![
        pair("max-iterations", Value::Int(max_iterations)),
        pair("initial-input", input.clone()),
        pair("test-command", Value::Str(test_command.clone())),
    ]);
    let extras = [("*loop-config*".to_string(), config)];

    let mut last_executor_result = Value::empty_list();
    for iteration in 1..=max_iterations as usize {
        debug!(iteration, max_iterations, "iterative-loop iteration");
        let iter_value = Value::Int(iteration as i64);

        let exec_result = ev
            .apply_with_frame(&executor, vec![input.clone(), iter_value.clone()], &extras, expr)
            .await
            .map_err(|e| e.in_loop_phase("executor", iteration))?;
        last_executor_result = exec_result.clone();
        let validation = ev
            .apply_with_frame(
                &validator,
                vec![Value::Str(test_command.clone()), iter_value.clone()],
                &extras,
                expr,
            )
            .await
            .map_err(|e| e.in_loop_phase("validator", iteration))?;
        let decision = ev
            .apply_with_frame(
                &controller,
                vec![exec_result, validation, input.clone(), iter_value],
                &extras,
                expr,
            )
            .await
            .map_err(|e| e.in_loop_phase("controller", iteration))?;

        match decide(decision, expr)? {
            Decision::Stop(value) => {
                info!(iteration, "iterative-loop stopped by controller");
                return Ok(value);
            }
            Decision::Continue(value) => input = value,
        }
    }

    info!(max_iterations, "iterative-loop exhausted max iterations");
    Ok(last_executor_result)
}

/// A controller's verdict.
enum Decision {
    Stop(Value),
    Continue(Value),
}

/// Validate a controller return value: a two-element list
/// `(continue value)` or `(stop value)`.
fn decide(decision: Value, expr: &Node) -> Result<Decision, EvalError> {
    let Value::List(items) = &decision else {
        return Err(EvalError::type_error(
            format!("controller must return (action value), got {decision}"),
            expr,
        ));
    };
    let [action, value] = items.as_slice() else {
        return Err(EvalError::type_error(
            format!("controller must return a two-element (action value) list, got {decision}"),
            expr,
        ));
    };
    match action {
        Value::Symbol(name) if name == "stop" => Ok(Decision::Stop(value.clone())),
        Value::Symbol(name) if name == "continue" => Ok(Decision::Continue(value.clone())),
        other => Err(EvalError::type_error(
            format!("controller action must be the symbol 'continue' or 'stop', got {other}"),
            expr,
        )),
    }
}

/// Parse `(ClauseName Expression)` pairs, requiring each listed clause
/// exactly once.
fn parse_clauses<'a>(
    construct: &str,
    args: &'a [Node],
    required: &[&'static str],
    expr: &Node,
) -> Result<HashMap<&'a str, &'a Node>, EvalError> {
    let mut clauses = HashMap::new();
    for arg in args {
        let (name, value) = match arg.as_list() {
            Some([name_node, value]) => match name_node.as_symbol() {
                Some(name) => (name, value),
                None => {
                    return Err(EvalError::type_error(
                        format!("{construct}: each clause must be (ClauseName Expression), got {arg}"),
                        expr,
                    ));
                }
            },
            _ => {
                return Err(EvalError::type_error(
                    format!("{construct}: each clause must be (ClauseName Expression), got {arg}"),
                    expr,
                ));
            }
        };
        if clauses.insert(name, value).is_some() {
            return Err(EvalError::type_error(
                format!("{construct}: duplicate clause '{name}'"),
                expr,
            ));
        }
    }

    let mut missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !clauses.contains_key(name))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(EvalError::type_error(
            format!("{construct}: missing required clauses: {}", missing.join(", ")),
            expr,
        ));
    }
    Ok(clauses)
}

async fn eval_max_iterations(
    ev: &SexpEvaluator,
    node: &Node,
    env: &Env,
    construct: &str,
    expr: &Node,
) -> Result<i64, EvalError> {
    match ev.eval(node, env).await? {
        Value::Int(n) if n >= 0 => Ok(n),
        other => Err(EvalError::type_error(
            format!(
                "{construct}: 'max-iterations' must evaluate to a non-negative integer, got {other}"
            ),
            expr,
        )),
    }
}

async fn eval_phase_fn(
    ev: &SexpEvaluator,
    node: &Node,
    env: &Env,
    phase: &str,
    construct: &str,
    expr: &Node,
) -> Result<Value, EvalError> {
    let value = ev.eval(node, env).await?;
    if !value.is_callable() {
        return Err(EvalError::type_error(
            format!(
                "{construct}: '{phase}' must evaluate to a callable, got {}",
                value.type_name()
            ),
            expr,
        ));
    }
    Ok(value)
}

fn pair(key: &str, value: Value) -> Value {
    Value::List(vec![Value::Symbol(key.to_string()), value])
}
