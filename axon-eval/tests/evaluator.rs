//! End-to-end evaluator tests: literals, scoping, closures, special forms,
//! loop constructs, and task/tool invocation.

use std::sync::Arc;

use axon_eval::{Env, EvalError, SexpEvaluator, Value};
use axon_handler::{FnTool, Handler, ScriptedProvider, ToolError, ToolSpec};
use axon_memory::MemorySystem;
use axon_task::TaskSystem;
use axon_types::{TaskResult, TaskStatus, TaskTemplate};
use serde_json::json;

struct World {
    evaluator: SexpEvaluator,
    tasks: Arc<TaskSystem>,
    handler: Arc<Handler>,
    memory: Arc<MemorySystem>,
}

fn world_with(responses: &[&str]) -> World {
    let memory = Arc::new(MemorySystem::new());
    let handler = Arc::new(Handler::new(Arc::new(ScriptedProvider::new(
        responses.iter().copied(),
    ))));
    let tasks = Arc::new(TaskSystem::new(Arc::clone(&memory), Arc::clone(&handler)));
    World {
        evaluator: SexpEvaluator::new(Arc::clone(&tasks), Arc::clone(&handler), Arc::clone(&memory)),
        tasks,
        handler,
        memory,
    }
}

fn world() -> World {
    world_with(&[])
}

async fn eval(world: &World, source: &str) -> Result<Value, EvalError> {
    world.evaluator.evaluate_str(source, &Env::root()).await
}

async fn eval_ok(world: &World, source: &str) -> Value {
    eval(world, source)
        .await
        .unwrap_or_else(|error| panic!("{source} failed: {error}"))
}

// --- Literals and lookup ---

#[tokio::test]
async fn literals_evaluate_to_themselves() {
    let w = world();
    assert_eq!(eval_ok(&w, "42").await, Value::Int(42));
    assert_eq!(eval_ok(&w, "2.5").await, Value::Float(2.5));
    assert_eq!(eval_ok(&w, "\"hi\"").await, Value::Str("hi".into()));
    assert_eq!(eval_ok(&w, "true").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "nil").await, Value::Nil);
    assert_eq!(eval_ok(&w, "()").await, Value::empty_list());
}

#[tokio::test]
async fn unbound_symbol_errors() {
    let w = world();
    let error = eval(&w, "nope").await.unwrap_err();
    assert!(matches!(error, EvalError::UnboundSymbol { name, .. } if name == "nope"));

    let error = eval(&w, "(nope 1)").await.unwrap_err();
    assert!(matches!(error, EvalError::UnboundSymbol { name, .. } if name == "nope"));
}

#[tokio::test]
async fn syntax_errors_surface() {
    let w = world();
    assert!(matches!(
        eval(&w, "(missing").await.unwrap_err(),
        EvalError::Syntax(_)
    ));
}

// --- Scoping ---

#[tokio::test]
async fn let_binds_and_sums() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(let ((x 10) (y 20)) (+ x y))").await,
        Value::Int(30)
    );
}

#[tokio::test]
async fn let_values_evaluate_in_the_outer_environment() {
    let w = world();
    // y sees the outer x, not the sibling binding.
    assert_eq!(
        eval_ok(&w, "(let ((x 1)) (let ((x 2) (y x)) y))").await,
        Value::Int(1)
    );
}

#[tokio::test]
async fn let_bindings_are_not_visible_outside_the_body() {
    let w = world();
    let error = eval(&w, "(progn (let ((z 9)) z) z)").await.unwrap_err();
    assert!(matches!(error, EvalError::UnboundSymbol { name, .. } if name == "z"));
}

#[tokio::test]
async fn bind_defines_in_the_current_scope() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(progn (bind x 5) (+ x 1))").await,
        Value::Int(6)
    );
}

#[tokio::test]
async fn set_mutates_nearest_binding_and_fails_when_unbound() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(let ((x 1)) (progn (set! x 7) x))").await,
        Value::Int(7)
    );
    let error = eval(&w, "(set! ghost 1)").await.unwrap_err();
    assert!(matches!(error, EvalError::UnboundSymbol { name, .. } if name == "ghost"));
    let error = eval(&w, "(set! 5 1)").await.unwrap_err();
    assert!(matches!(error, EvalError::TypeError { .. }));
}

// --- Closures ---

#[tokio::test]
async fn lambda_applies_positionally() {
    let w = world();
    assert_eq!(eval_ok(&w, "((lambda (x) (+ x 1)) 5)").await, Value::Int(6));
}

#[tokio::test]
async fn each_closure_captures_its_own_frame() {
    let w = world();
    assert_eq!(
        eval_ok(
            &w,
            "(let ((make (lambda (n) (lambda () n)))) (list ((make 100)) ((make 200))))"
        )
        .await,
        Value::List(vec![Value::Int(100), Value::Int(200)])
    );
}

#[tokio::test]
async fn closures_observe_mutations_of_captured_frames() {
    let w = world();
    assert_eq!(
        eval_ok(
            &w,
            "(let ((x 1)) (let ((f (lambda () x))) (progn (set! x 42) (f))))"
        )
        .await,
        Value::Int(42)
    );
}

#[tokio::test]
async fn closures_do_not_see_later_child_extensions() {
    let w = world();
    let error = eval(&w, "(let ((f (lambda () y))) (let ((y 5)) (f)))")
        .await
        .unwrap_err();
    assert!(matches!(error, EvalError::UnboundSymbol { name, .. } if name == "y"));
}

#[tokio::test]
async fn closure_arity_is_exact() {
    let w = world();
    for source in ["((lambda (x y) x) 1)", "((lambda (x y) x) 1 2 3)"] {
        let error = eval(&w, source).await.unwrap_err();
        assert!(matches!(error, EvalError::ArityMismatch { .. }), "{source}");
    }
}

#[tokio::test]
async fn lambda_validates_structure() {
    let w = world();
    assert!(matches!(
        eval(&w, "(lambda (x 5) x)").await.unwrap_err(),
        EvalError::TypeError { .. }
    ));
    assert!(matches!(
        eval(&w, "(lambda (x))").await.unwrap_err(),
        EvalError::ArityMismatch { .. }
    ));
}

#[tokio::test]
async fn non_callables_do_not_apply() {
    let w = world();
    let error = eval(&w, "(let ((x 5)) (x 1))").await.unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("not callable")));
}

// --- loop, progn, quote ---

#[tokio::test]
async fn loop_repeats_in_the_current_environment() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(let ((x 0)) (progn (loop 3 (set! x (+ x 1))) x))").await,
        Value::Int(3)
    );
}

#[tokio::test]
async fn loop_zero_yields_the_empty_list() {
    let w = world();
    assert_eq!(eval_ok(&w, "(loop 0 (+ 1 1))").await, Value::empty_list());
}

#[tokio::test]
async fn loop_rejects_bad_counts() {
    let w = world();
    assert!(matches!(
        eval(&w, "(loop \"three\" 1)").await.unwrap_err(),
        EvalError::TypeError { .. }
    ));
    assert!(matches!(
        eval(&w, "(loop (- 0 2) 1)").await.unwrap_err(),
        EvalError::TypeError { .. }
    ));
}

#[tokio::test]
async fn progn_returns_the_last_value() {
    let w = world();
    assert_eq!(eval_ok(&w, "(progn 1 2 3)").await, Value::Int(3));
    assert_eq!(eval_ok(&w, "(progn)").await, Value::empty_list());
}

#[tokio::test]
async fn quote_preserves_symbols_and_shorthand_matches() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(quote (a 1))").await,
        Value::List(vec![Value::Symbol("a".into()), Value::Int(1)])
    );
    assert_eq!(eval_ok(&w, "'x").await, Value::Symbol("x".into()));
}

// --- Truthiness, and/or ---

#[tokio::test]
async fn only_false_and_nil_are_falsey() {
    let w = world();
    assert_eq!(eval_ok(&w, "(if 0 \"t\" \"f\")").await, Value::Str("t".into()));
    assert_eq!(eval_ok(&w, "(if \"\" \"t\" \"f\")").await, Value::Str("t".into()));
    assert_eq!(eval_ok(&w, "(if () \"t\" \"f\")").await, Value::Str("t".into()));
    assert_eq!(eval_ok(&w, "(if nil \"t\" \"f\")").await, Value::Str("f".into()));
    assert_eq!(eval_ok(&w, "(if false \"t\" \"f\")").await, Value::Str("f".into()));
}

#[tokio::test]
async fn and_or_short_circuit_and_return_values() {
    let w = world();
    assert_eq!(eval_ok(&w, "(and)").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(or)").await, Value::Bool(false));
    assert_eq!(eval_ok(&w, "(and 1 2)").await, Value::Int(2));
    assert_eq!(eval_ok(&w, "(and 1 false 3)").await, Value::Bool(false));
    assert_eq!(eval_ok(&w, "(or false nil)").await, Value::Nil);
    assert_eq!(eval_ok(&w, "(or false 0)").await, Value::Int(0));
    // Short-circuit: the unbound symbol after the decision point is never
    // evaluated.
    assert_eq!(eval_ok(&w, "(and false nope)").await, Value::Bool(false));
    assert_eq!(eval_ok(&w, "(or 1 nope)").await, Value::Int(1));
}

// --- Primitives ---

#[tokio::test]
async fn equality_coerces_numerics_only() {
    let w = world();
    assert_eq!(eval_ok(&w, "(eq? 1 1.0)").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(eq? \"a\" \"a\")").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(eq? (list 1 2) (quote (1 2)))").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(eq? nil ())").await, Value::Bool(false));
    assert_eq!(eval_ok(&w, "(eq? 1 \"1\")").await, Value::Bool(false));
    assert!(matches!(
        eval(&w, "(eq? 1)").await.unwrap_err(),
        EvalError::ArityMismatch { .. }
    ));
}

#[tokio::test]
async fn null_predicate_accepts_nil_and_empty_list() {
    let w = world();
    assert_eq!(eval_ok(&w, "(null? nil)").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(nil? ())").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(null? 0)").await, Value::Bool(false));
}

#[tokio::test]
async fn arithmetic() {
    let w = world();
    assert_eq!(eval_ok(&w, "(+)").await, Value::Int(0));
    assert_eq!(eval_ok(&w, "(+ 5)").await, Value::Int(5));
    assert_eq!(eval_ok(&w, "(+ 1 2 3)").await, Value::Int(6));
    assert_eq!(eval_ok(&w, "(+ 1 2.5)").await, Value::Float(3.5));
    assert_eq!(eval_ok(&w, "(+ true true 1)").await, Value::Int(3));
    assert!(matches!(
        eval(&w, "(+ 1 \"x\")").await.unwrap_err(),
        EvalError::TypeError { .. }
    ));

    assert_eq!(eval_ok(&w, "(- 5)").await, Value::Int(-5));
    assert_eq!(eval_ok(&w, "(- 10 4)").await, Value::Int(6));
    assert!(matches!(
        eval(&w, "(- 1 2 3)").await.unwrap_err(),
        EvalError::ArityMismatch { .. }
    ));

    assert_eq!(eval_ok(&w, "(< 1 2)").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(< 2 1)").await, Value::Bool(false));
    assert_eq!(eval_ok(&w, "(= 2 2.0)").await, Value::Bool(true));
    assert!(matches!(
        eval(&w, "(< true 2)").await.unwrap_err(),
        EvalError::TypeError { .. }
    ));
}

#[tokio::test]
async fn string_primitives() {
    let w = world();
    assert_eq!(eval_ok(&w, "(string=? \"a\" \"a\")").await, Value::Bool(true));
    assert_eq!(eval_ok(&w, "(string=? \"a\" \"b\")").await, Value::Bool(false));
    assert_eq!(
        eval_ok(&w, "(string-append \"n=\" 1 \" \" true nil 'sym)").await,
        Value::Str("n=1 truesym".into())
    );
    assert!(matches!(
        eval(&w, "(string-append (list 1))").await.unwrap_err(),
        EvalError::TypeError { .. }
    ));
}

#[tokio::test]
async fn get_field_reads_association_lists() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(get-field (quote ((a 1) (b 2))) 'b)").await,
        Value::Int(2)
    );
    assert_eq!(
        eval_ok(&w, "(get-field (quote ((a 1))) \"missing\")").await,
        Value::Nil
    );
}

// --- defatom and atomic task invocation ---

#[tokio::test]
async fn defatom_registers_binds_and_executes() {
    let w = world_with(&["hi world"]);
    let value = eval_ok(
        &w,
        "(progn (defatom greet (params (who)) (instructions \"Say hi to {{who}}\")) (greet \"world\"))",
    )
    .await;

    let Value::TaskResult(result) = value else {
        panic!("expected a task result, got {value}");
    };
    assert_eq!(result.status, TaskStatus::Complete);
    assert_eq!(result.content, "hi world");
    assert_eq!(result.note("template_used"), Some(&json!("greet")));

    // The template is registered for later programs too.
    assert!(w.tasks.find_template("greet").await.is_some());
}

#[tokio::test]
async fn defatom_returns_the_task_name_symbol() {
    let w = world();
    assert_eq!(
        eval_ok(&w, "(defatom t0 (instructions \"x\"))").await,
        Value::Symbol("t0".into())
    );
}

#[tokio::test]
async fn defatom_validates_clauses() {
    let w = world();
    let error = eval(&w, "(defatom t1 (params (a)))").await.unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("instructions")));

    let error = eval(
        &w,
        "(defatom t2 (instructions \"a\") (instructions \"b\"))",
    )
    .await
    .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("duplicate")));

    let error = eval(&w, "(defatom t3 (instructions \"a\") (wat 1))")
        .await
        .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("unknown")));

    let error = eval(&w, "(defatom t4 (instructions \"a\") (subtype 5))")
        .await
        .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("string")));

    let result = eval(&w, "(defatom t5 (params (a 5 b)) (instructions \"x\"))").await;
    assert!(result.is_ok(), "(a 5 b) has a symbol head and parses as parameter 'a'");

    let error = eval(&w, "(defatom t6 (params 5) (instructions \"x\"))")
        .await
        .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { .. }));
}

#[tokio::test]
async fn defatom_subtype_and_output_format_flow_through() {
    let w = world_with(&[r#"{"answer": 7}"#]);
    let value = eval_ok(
        &w,
        "(progn \
           (defatom classify \
             (params (text)) \
             (instructions \"Classify {{text}}\") \
             (subtype \"classifier\") \
             (output_format ((type \"json\")))) \
           (classify \"some text\"))",
    )
    .await;

    let Value::TaskResult(result) = value else {
        panic!("expected a task result");
    };
    assert_eq!(result.note("parsedContent"), Some(&json!({"answer": 7})));
    assert_eq!(
        w.tasks.find_template("atomic:classifier").await.unwrap().name,
        "classify"
    );
}

#[tokio::test]
async fn task_handle_arity_is_checked() {
    let w = world();
    let error = eval(
        &w,
        "(progn (defatom pair (params (a b)) (instructions \"{{a}} {{b}}\")) (pair 1))",
    )
    .await
    .unwrap_err();
    assert!(matches!(error, EvalError::ArityMismatch { .. }));
}

#[tokio::test]
async fn registered_templates_invoke_with_named_arguments() {
    let w = world_with(&["summarized"]);
    let mut template = TaskTemplate::atomic("summarize", "Summarize {{text}}");
    template.params.push(axon_types::ParamSpec::required("text"));
    w.tasks.register_template(template).await.unwrap();

    let value = eval_ok(&w, "(summarize (text \"the content\"))").await;
    let Value::TaskResult(result) = value else {
        panic!("expected a task result");
    };
    assert_eq!(result.content, "summarized");
    assert_eq!(result.note("context_source"), Some(&json!("none")));
}

#[tokio::test]
async fn files_argument_overrides_context_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "important facts").unwrap();

    let w = world_with(&["ok"]);
    w.tasks
        .register_template(TaskTemplate::atomic("briefed", "Use the files"))
        .await
        .unwrap();

    let source = format!("(briefed (files (quote (\"{}\"))))", path.display());
    let Value::TaskResult(result) = eval_ok(&w, &source).await else {
        panic!("expected a task result");
    };
    assert_eq!(result.note("context_source"), Some(&json!("explicit_request")));
    assert_eq!(result.note("file_count"), Some(&json!(1)));
}

#[tokio::test]
async fn files_argument_must_be_a_list_of_strings() {
    let w = world();
    w.tasks
        .register_template(TaskTemplate::atomic("t", "x"))
        .await
        .unwrap();
    let error = eval(&w, "(t (files (quote (1 2))))").await.unwrap_err();
    assert!(matches!(error, EvalError::TypeError { .. }));
}

#[tokio::test]
async fn contradictory_context_override_is_a_failed_result_not_an_error() {
    let w = world();
    w.tasks
        .register_template(TaskTemplate::atomic("t", "x"))
        .await
        .unwrap();
    // freshContext stays enabled by default; inheriting fully contradicts it.
    let value = eval_ok(&w, "(t (context (quote ((inheritContext \"full\")))))").await;
    let Value::TaskResult(result) = value else {
        panic!("expected a task result");
    };
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.note("error").unwrap()["reason"],
        "input_validation_failure"
    );
}

// --- Direct tools ---

async fn register_echo_tool(w: &World) {
    w.handler
        .register_tool(
            ToolSpec::new("echo_tool", "Echoes its input"),
            Arc::new(FnTool(|input: serde_json::Map<_, _>| {
                Ok(TaskResult::complete(
                    input
                        .get("message")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ))
            })),
        )
        .await;
}

#[tokio::test]
async fn tools_invoke_with_named_arguments() {
    let w = world();
    register_echo_tool(&w).await;
    let Value::TaskResult(result) = eval_ok(&w, "(echo_tool (message \"ping\"))").await else {
        panic!("expected a task result");
    };
    assert_eq!(result.content, "ping");
}

#[tokio::test]
async fn templates_shadow_tools_with_the_same_name() {
    let w = world_with(&["from-template"]);
    register_echo_tool(&w).await;
    w.handler
        .register_tool(
            ToolSpec::new("both", "The tool variant"),
            Arc::new(FnTool(|_| Ok(TaskResult::complete("from-tool")))),
        )
        .await;
    w.tasks
        .register_template(TaskTemplate::atomic("both", "The template variant"))
        .await
        .unwrap();

    let Value::TaskResult(result) = eval_ok(&w, "(both)").await else {
        panic!("expected a task result");
    };
    assert_eq!(result.content, "from-template");
}

#[tokio::test]
async fn lexical_bindings_shadow_registries() {
    let w = world();
    register_echo_tool(&w).await;
    assert_eq!(
        eval_ok(&w, "(let ((echo_tool (lambda (x) x))) (echo_tool 9))").await,
        Value::Int(9)
    );
}

#[tokio::test]
async fn tool_faults_become_tool_execution_errors() {
    let w = world();
    w.handler
        .register_tool(
            ToolSpec::new("broken", "Always faults"),
            Arc::new(FnTool(|_| {
                Err(ToolError::ExecutionFailed("wires crossed".into()))
            })),
        )
        .await;
    let error = eval(&w, "(broken)").await.unwrap_err();
    assert!(matches!(error, EvalError::ToolExecution { message, .. } if message.contains("wires crossed")));
}

#[tokio::test]
async fn tool_reported_failure_is_a_value() {
    let w = world();
    w.handler
        .register_tool(
            ToolSpec::new("sad", "Reports failure"),
            Arc::new(FnTool(|_| Ok(TaskResult::failed("did not work")))),
        )
        .await;
    assert_eq!(
        eval_ok(&w, "(get-field (sad) 'status)").await,
        Value::Str("FAILED".into())
    );
}

// --- Native callables ---

struct Doubler;

impl axon_eval::NativeCallable for Doubler {
    fn name(&self) -> &str {
        "doubler"
    }
    fn call(&self, args: Vec<Value>) -> axon_eval::BoxFuture<'_, Result<Value, EvalError>> {
        Box::pin(async move {
            match args.as_slice() {
                [Value::Int(n)] => Ok(Value::Int(n * 2)),
                _ => Err(EvalError::type_error("doubler takes one integer", "(doubler)")),
            }
        })
    }
}

#[tokio::test]
async fn host_injected_natives_apply_positionally() {
    let w = world();
    let env = Env::root();
    env.define("doubler", Value::Native(Arc::new(Doubler))).await;

    let value = w
        .evaluator
        .evaluate_str("(doubler 21)", &env)
        .await
        .unwrap();
    assert_eq!(value, Value::Int(42));
}

#[tokio::test]
async fn natives_serve_as_loop_phases() {
    let w = world();
    let env = Env::root();
    env.define("doubler", Value::Native(Arc::new(Doubler))).await;

    let error = w
        .evaluator
        .evaluate_str(
            "(director-evaluator-loop \
               (max-iterations 1) \
               (initial-director-input 5) \
               (director doubler) \
               (executor (lambda (plan iter) plan)) \
               (evaluator (lambda (exec plan iter) exec)) \
               (controller (lambda (f p e iter) (list 'stop f))))",
            &env,
        )
        .await
        .unwrap_err();
    // The director receives (input iter): two arguments, so the
    // single-argument native faults inside the director phase.
    assert!(matches!(
        error,
        EvalError::LoopPhase { phase: "director", iteration: 1, .. }
    ));
}

// --- director-evaluator-loop ---

#[tokio::test]
async fn director_loop_stops_on_controller_verdict() {
    let w = world();
    let value = eval_ok(
        &w,
        "(let ((calls 0)) \
           (list \
             (director-evaluator-loop \
               (max-iterations 5) \
               (initial-director-input 0) \
               (director (lambda (input iter) (progn (set! calls (+ calls 1)) input))) \
               (executor (lambda (plan iter) (+ plan 1))) \
               (evaluator (lambda (exec plan iter) exec)) \
               (controller (lambda (feedback plan exec iter) \
                 (if (< feedback 3) (list 'continue feedback) (list 'stop feedback))))) \
             calls))",
    )
    .await;
    // Stops on iteration 3 with value 3; the director ran exactly 3 times.
    assert_eq!(value, Value::List(vec![Value::Int(3), Value::Int(3)]));
}

#[tokio::test]
async fn director_loop_exhaustion_returns_last_executor_result() {
    let w = world();
    let value = eval_ok(
        &w,
        "(director-evaluator-loop \
           (max-iterations 2) \
           (initial-director-input nil) \
           (director (lambda (input iter) input)) \
           (executor (lambda (plan iter) iter)) \
           (evaluator (lambda (exec plan iter) exec)) \
           (controller (lambda (f p e iter) (list 'continue f))))",
    )
    .await;
    assert_eq!(value, Value::Int(2));
}

#[tokio::test]
async fn director_loop_zero_iterations_is_the_empty_list() {
    let w = world();
    let value = eval_ok(
        &w,
        "(director-evaluator-loop \
           (max-iterations 0) \
           (initial-director-input nil) \
           (director (lambda (i n) i)) \
           (executor (lambda (p n) p)) \
           (evaluator (lambda (e p n) e)) \
           (controller (lambda (f p e n) (list 'stop f))))",
    )
    .await;
    assert_eq!(value, Value::empty_list());
}

#[tokio::test]
async fn loop_config_is_visible_inside_phase_closures() {
    let w = world();
    let value = eval_ok(
        &w,
        "(director-evaluator-loop \
           (max-iterations 1) \
           (initial-director-input nil) \
           (director (lambda (input iter) (get-field *loop-config* 'max-iterations))) \
           (executor (lambda (plan iter) plan)) \
           (evaluator (lambda (exec plan iter) exec)) \
           (controller (lambda (f p e iter) (list 'stop f))))",
    )
    .await;
    assert_eq!(value, Value::Int(1));
}

#[tokio::test]
async fn director_loop_validates_structure() {
    let w = world();
    let error = eval(
        &w,
        "(director-evaluator-loop (max-iterations 1) (director (lambda (i n) i)))",
    )
    .await
    .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("missing required clauses")));

    let error = eval(
        &w,
        "(director-evaluator-loop \
           (max-iterations 1) (max-iterations 2) \
           (initial-director-input nil) \
           (director (lambda (i n) i)) (executor (lambda (p n) p)) \
           (evaluator (lambda (e p n) e)) (controller (lambda (f p e n) (list 'stop f))))",
    )
    .await
    .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("duplicate clause")));

    let error = eval(
        &w,
        "(director-evaluator-loop \
           (max-iterations 1) (initial-director-input nil) \
           (director 5) (executor (lambda (p n) p)) \
           (evaluator (lambda (e p n) e)) (controller (lambda (f p e n) (list 'stop f))))",
    )
    .await
    .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("'director'")));
}

#[tokio::test]
async fn controller_verdict_shape_is_validated() {
    let w = world();
    for (controller, fragment) in [
        ("(lambda (f p e n) 5)", "must return (action value)"),
        ("(lambda (f p e n) (list 'stop 1 2))", "two-element"),
        ("(lambda (f p e n) (list 'pause 1))", "'continue' or 'stop'"),
    ] {
        let source = format!(
            "(director-evaluator-loop \
               (max-iterations 1) (initial-director-input nil) \
               (director (lambda (i n) i)) (executor (lambda (p n) p)) \
               (evaluator (lambda (e p n) e)) (controller {controller}))"
        );
        let error = eval(&w, &source).await.unwrap_err();
        assert!(
            matches!(&error, EvalError::TypeError { message, .. } if message.contains(fragment)),
            "{controller}: {error}"
        );
    }
}

#[tokio::test]
async fn phase_errors_are_annotated_with_phase_and_iteration() {
    let w = world();
    let error = eval(
        &w,
        "(director-evaluator-loop \
           (max-iterations 3) (initial-director-input nil) \
           (director (lambda (i n) i)) \
           (executor (lambda (p n) missing-symbol)) \
           (evaluator (lambda (e p n) e)) \
           (controller (lambda (f p e n) (list 'continue f))))",
    )
    .await
    .unwrap_err();
    let EvalError::LoopPhase {
        phase,
        iteration,
        source,
    } = error
    else {
        panic!("expected a loop-phase error");
    };
    assert_eq!(phase, "executor");
    assert_eq!(iteration, 1);
    assert!(matches!(*source, EvalError::UnboundSymbol { name, .. } if name == "missing-symbol"));
}

// --- iterative-loop ---

#[tokio::test]
async fn iterative_loop_counts_to_three() {
    let w = world();
    let value = eval_ok(
        &w,
        "(iterative-loop \
           (max-iterations 5) \
           (initial-input 0) \
           (test-command \"true\") \
           (executor (lambda (n i) (+ n 1))) \
           (validator (lambda (c i) (list (list 'exit_code 0)))) \
           (controller (lambda (r v c i) \
             (if (< r 3) (list 'continue r) (list 'stop r)))))",
    )
    .await;
    assert_eq!(value, Value::Int(3));
}

#[tokio::test]
async fn iterative_loop_passes_the_test_command_to_the_validator() {
    let w = world();
    let value = eval_ok(
        &w,
        "(iterative-loop \
           (max-iterations 1) \
           (initial-input nil) \
           (test-command \"cargo test\") \
           (executor (lambda (n i) n)) \
           (validator (lambda (cmd i) cmd)) \
           (controller (lambda (r v c i) (list 'stop v))))",
    )
    .await;
    assert_eq!(value, Value::Str("cargo test".into()));
}

#[tokio::test]
async fn iterative_loop_requires_a_string_test_command() {
    let w = world();
    let error = eval(
        &w,
        "(iterative-loop \
           (max-iterations 1) (initial-input nil) (test-command 5) \
           (executor (lambda (n i) n)) (validator (lambda (c i) c)) \
           (controller (lambda (r v c i) (list 'stop r))))",
    )
    .await
    .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("test-command")));
}

#[tokio::test]
async fn iterative_loop_unwraps_quoted_initial_input() {
    let w = world();
    let value = eval_ok(
        &w,
        "(iterative-loop \
           (max-iterations 1) \
           (initial-input (quote (1 2))) \
           (test-command \"true\") \
           (executor (lambda (n i) n)) \
           (validator (lambda (c i) c)) \
           (controller (lambda (r v c i) (list 'stop r))))",
    )
    .await;
    assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));
}

// --- get-context and read-files ---

#[tokio::test]
async fn get_context_returns_matched_paths() {
    let w = world();
    w.memory
        .update_global_index(
            [
                ("src/auth.rs".to_string(), "authentication tokens".to_string()),
                ("src/ui.rs".to_string(), "widget drawing".to_string()),
            ]
            .into_iter()
            .collect(),
        )
        .await;

    let value = eval_ok(
        &w,
        "(get-context (query \"authentication tokens\") (matching_strategy \"metadata\"))",
    )
    .await;
    assert_eq!(value, Value::List(vec![Value::Str("src/auth.rs".into())]));
}

#[tokio::test]
async fn get_context_validates_options() {
    let w = world();
    let error = eval(&w, "(get-context)").await.unwrap_err();
    assert!(matches!(error, EvalError::TypeError { .. }));

    let error = eval(&w, "(get-context (matching_strategy \"vibes\"))")
        .await
        .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("matching strategy")));

    let error = eval(&w, "(get-context (query \"x\") (wat 1))")
        .await
        .unwrap_err();
    assert!(matches!(error, EvalError::TypeError { message, .. } if message.contains("unknown")));
}

#[tokio::test]
async fn get_context_disabled_fresh_context_matches_nothing() {
    let w = world();
    w.memory
        .update_global_index(
            [("src/auth.rs".to_string(), "authentication".to_string())]
                .into_iter()
                .collect(),
        )
        .await;
    let value = eval_ok(
        &w,
        "(get-context (query \"authentication\") (fresh_context \"disabled\"))",
    )
    .await;
    assert_eq!(value, Value::empty_list());
}

#[tokio::test]
async fn read_files_returns_contents_and_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    std::fs::write(&path, "file body").unwrap();

    let w = world();
    let source = format!(
        "(read-files (quote (\"{}\" \"/definitely/missing\")))",
        path.display()
    );
    let Value::TaskResult(result) = eval_ok(&w, &source).await else {
        panic!("expected a task result");
    };
    assert_eq!(result.status, TaskStatus::Complete);
    assert!(result.content.contains("file body"));
    assert_eq!(result.note("file_count"), Some(&json!(1)));
    assert!(result.note("read_errors").is_some());
}
