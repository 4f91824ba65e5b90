//! Workspace-level end-to-end scenarios: S-expression programs driving
//! tasks and tools through a fully wired runtime, and the dispatcher
//! boundary.

use std::sync::Arc;

use axon::prelude::*;
use serde_json::json;

fn runtime_with(responses: &[&str]) -> Runtime {
    Runtime::new(Arc::new(ScriptedProvider::new(responses.iter().copied())))
}

fn params(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// --- Language scenarios ---

#[tokio::test]
async fn let_binding_sums() {
    let runtime = runtime_with(&[]);
    let value = runtime.evaluate("(let ((x 10) (y 20)) (+ x y))").await.unwrap();
    assert_eq!(value, Value::Int(30));
}

#[tokio::test]
async fn lambda_application() {
    let runtime = runtime_with(&[]);
    let value = runtime.evaluate("((lambda (x) (+ x 1)) 5)").await.unwrap();
    assert_eq!(value, Value::Int(6));
}

#[tokio::test]
async fn closures_capture_independent_frames() {
    let runtime = runtime_with(&[]);
    let value = runtime
        .evaluate("(let ((make (lambda (n) (lambda () n)))) (list ((make 100)) ((make 200))))")
        .await
        .unwrap();
    assert_eq!(value, Value::List(vec![Value::Int(100), Value::Int(200)]));
}

#[tokio::test]
async fn loop_with_mutation() {
    let runtime = runtime_with(&[]);
    let value = runtime
        .evaluate("(let ((x 0)) (progn (loop 3 (set! x (+ x 1))) x))")
        .await
        .unwrap();
    assert_eq!(value, Value::Int(3));
}

#[tokio::test]
async fn defatom_then_call_returns_the_llm_result() {
    let runtime = runtime_with(&["hi world"]);
    let value = runtime
        .evaluate(
            "(progn \
               (defatom greet (params (who)) (instructions \"Say hi to {{who}}\")) \
               (greet \"world\"))",
        )
        .await
        .unwrap();

    let Value::TaskResult(result) = value else {
        panic!("expected a task result, got {value}");
    };
    assert_eq!(result.status, TaskStatus::Complete);
    assert_eq!(result.content, "hi world");
    assert_eq!(result.note("template_used"), Some(&json!("greet")));
}

#[tokio::test]
async fn iterative_loop_counts_to_three() {
    let runtime = runtime_with(&[]);
    let value = runtime
        .evaluate(
            "(iterative-loop \
               (max-iterations 5) \
               (initial-input 0) \
               (test-command \"true\") \
               (executor (lambda (n i) (+ n 1))) \
               (validator (lambda (c i) (list (list 'exit_code 0)))) \
               (controller (lambda (r v c i) \
                 (if (< r 3) (list 'continue r) (list 'stop r)))))",
        )
        .await
        .unwrap();
    assert_eq!(value, Value::Int(3));
}

#[tokio::test]
async fn workflows_branch_on_failed_results_instead_of_erroring() {
    let runtime = runtime_with(&[]);
    runtime
        .handler()
        .register_tool(
            ToolSpec::new("flaky", "Reports failure"),
            Arc::new(FnTool(|_| Ok(TaskResult::failed("nope")))),
        )
        .await;
    let value = runtime
        .evaluate("(if (string=? (get-field (flaky) 'status) \"FAILED\") \"fell back\" \"ran\")")
        .await
        .unwrap();
    assert_eq!(value, Value::Str("fell back".into()));
}

// --- Dispatcher scenarios ---

#[tokio::test]
async fn unknown_identifier_fails_validation() {
    let runtime = runtime_with(&[]);
    let result = execute_programmatic_task(
        &runtime,
        "nope:task",
        params(&[]),
        DispatchFlags::default(),
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.note("error").unwrap()["reason"],
        "input_validation_failure"
    );
}

#[tokio::test]
async fn dispatcher_routes_templates_by_name_and_subtype() {
    let runtime = runtime_with(&["done", "done again"]);
    let mut template = TaskTemplate::atomic("review", "Review {{target}}");
    template.subtype = "code".to_string();
    template.params.push(ParamSpec::required("target"));
    runtime.tasks().register_template(template).await.unwrap();

    for identifier in ["review", "atomic:code"] {
        let result = execute_programmatic_task(
            &runtime,
            identifier,
            params(&[("target", json!("the diff"))]),
            DispatchFlags::default(),
            None,
        )
        .await;
        assert_eq!(result.status, TaskStatus::Complete, "{identifier}");
        assert_eq!(result.note("execution_path"), Some(&json!("subtask_template")));
        assert_eq!(result.note("template_used"), Some(&json!("review")));
    }
}

#[tokio::test]
async fn dispatcher_prefers_templates_over_tools() {
    let runtime = runtime_with(&["template won"]);
    runtime
        .handler()
        .register_tool(
            ToolSpec::new("both", "The tool variant"),
            Arc::new(FnTool(|_| Ok(TaskResult::complete("tool won")))),
        )
        .await;
    runtime
        .tasks()
        .register_template(TaskTemplate::atomic("both", "The template variant"))
        .await
        .unwrap();

    let result =
        execute_programmatic_task(&runtime, "both", params(&[]), DispatchFlags::default(), None)
            .await;
    assert_eq!(result.content, "template won");
}

#[tokio::test]
async fn dispatcher_routes_tools_and_annotates_the_path() {
    let runtime = runtime_with(&[]);
    runtime
        .handler()
        .register_tool(
            ToolSpec::new("ping", "Replies"),
            Arc::new(FnTool(|_| Ok(TaskResult::complete("pong")))),
        )
        .await;
    let result =
        execute_programmatic_task(&runtime, "ping", params(&[]), DispatchFlags::default(), None)
            .await;
    assert_eq!(result.content, "pong");
    assert_eq!(result.note("execution_path"), Some(&json!("direct_tool")));
}

#[tokio::test]
async fn dispatcher_parses_file_context() {
    let dir = tempfile_dir();
    let path = dir.join("ctx.txt");
    std::fs::write(&path, "facts").unwrap();

    let runtime = runtime_with(&["ok"]);
    runtime
        .tasks()
        .register_template(TaskTemplate::atomic("task", "Go"))
        .await
        .unwrap();

    let result = execute_programmatic_task(
        &runtime,
        "task",
        params(&[("file_context", json!([path.to_str().unwrap()]))]),
        DispatchFlags::default(),
        None,
    )
    .await;
    assert_eq!(result.note("file_count"), Some(&json!(1)));
    assert_eq!(result.note("context_source"), Some(&json!("explicit_request")));

    // Wrong type fails validation without executing.
    let result = execute_programmatic_task(
        &runtime,
        "task",
        params(&[("file_context", json!(42))]),
        DispatchFlags::default(),
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.content.contains("Invalid type for file_context parameter: number"));
}

#[tokio::test]
async fn help_flag_describes_without_executing() {
    let runtime = runtime_with(&[]);
    let mut template = TaskTemplate::atomic("greet", "Say hi to {{who}}");
    template.description = Some("Greets someone".to_string());
    template.params.push(ParamSpec::required("who"));
    runtime.tasks().register_template(template).await.unwrap();

    let result = execute_programmatic_task(
        &runtime,
        "greet",
        params(&[]),
        DispatchFlags {
            help: true,
            ..Default::default()
        },
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Complete);
    assert!(result.content.contains("Usage: greet <who>"));
    assert!(result.content.contains("who (required)"));
}

#[tokio::test]
async fn help_flag_describes_tools_from_their_schema() {
    let runtime = runtime_with(&[]);
    runtime.install_builtin_tools().await;

    let result = execute_programmatic_task(
        &runtime,
        "execute_command",
        params(&[]),
        DispatchFlags {
            help: true,
            ..Default::default()
        },
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Complete);
    assert!(result.content.contains("Usage: execute_command"));
    assert!(result.content.contains("command (required)"));
    assert!(result.content.contains("cwd (optional)"));
}

#[tokio::test]
async fn history_flows_through_when_requested() {
    let runtime = runtime_with(&[]);
    let mut template = TaskTemplate::atomic("recap", "Summarize the conversation");
    template.history_config = Some(axon_types::HistoryConfig {
        use_history: true,
        turns_to_include: None,
    });
    runtime.tasks().register_template(template).await.unwrap();

    // The echo provider returns the prompt, which must include the history.
    let result = execute_programmatic_task(
        &runtime,
        "recap",
        params(&[]),
        DispatchFlags {
            use_history: true,
            ..Default::default()
        },
        Some("user: hello there"),
    )
    .await;
    assert!(result.content.contains("user: hello there"));
}

#[tokio::test]
async fn sexp_flag_evaluates_a_program() {
    let runtime = runtime_with(&[]);
    let result = execute_programmatic_task(
        &runtime,
        "(+ 1 2)",
        params(&[]),
        DispatchFlags {
            is_sexp_string: true,
            ..Default::default()
        },
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Complete);
    assert_eq!(result.content, "3");

    let result = execute_programmatic_task(
        &runtime,
        "(+ 1",
        params(&[]),
        DispatchFlags {
            is_sexp_string: true,
            ..Default::default()
        },
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.note("error").unwrap()["reason"], "unexpected_error");
}

#[tokio::test]
async fn builtin_shell_tool_enforces_the_denylist_end_to_end() {
    let runtime = runtime_with(&[]);
    runtime.install_builtin_tools().await;

    let result = execute_programmatic_task(
        &runtime,
        "execute_command",
        params(&[("command", json!("rm -rf /"))]),
        DispatchFlags::default(),
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.note("success"), Some(&json!(false)));

    let result = execute_programmatic_task(
        &runtime,
        "execute_command",
        params(&[("command", json!("echo safe"))]),
        DispatchFlags::default(),
        None,
    )
    .await;
    assert_eq!(result.status, TaskStatus::Complete);
    assert_eq!(result.content.trim(), "safe");
}

fn tempfile_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("axon-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
