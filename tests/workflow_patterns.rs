//! Composite workflow patterns: LLM-backed phase functions inside the loop
//! constructs, tool-backed validation, and context-driven file reading.

use std::sync::Arc;

use axon::prelude::*;
use serde_json::json;

fn runtime_with(responses: &[&str]) -> Runtime {
    Runtime::new(Arc::new(ScriptedProvider::new(responses.iter().copied())))
}

/// A plan/apply/judge cycle where the director and executor are atomic
/// tasks defined in the same program. The controller keeps iterating until
/// the executor reports a fix.
#[tokio::test]
async fn debug_fix_loop_converges() {
    // Iteration 1: plan A -> still broken; iteration 2: plan B -> fixed.
    let runtime = runtime_with(&["plan A", "still broken", "plan B", "fixed"]);

    let value = runtime
        .evaluate(
            "(progn \
               (defatom plan-fix (params (report)) (instructions \"Plan a fix for: {{report}}\")) \
               (defatom apply-fix (params (plan)) (instructions \"Apply: {{plan}}\")) \
               (director-evaluator-loop \
                 (max-iterations 3) \
                 (initial-director-input \"tests failing in parser\") \
                 (director (lambda (input iter) (get-field (plan-fix input) 'content))) \
                 (executor (lambda (plan iter) (get-field (apply-fix plan) 'content))) \
                 (evaluator (lambda (exec plan iter) exec)) \
                 (controller (lambda (feedback plan exec iter) \
                   (if (string=? feedback \"fixed\") \
                       (list 'stop feedback) \
                       (list 'continue feedback))))))",
        )
        .await
        .unwrap();

    assert_eq!(value, Value::Str("fixed".into()));
}

/// An iterative loop whose validator shells out through the built-in
/// command tool; the controller branches on the tool's status field.
#[tokio::test]
async fn iterative_loop_validates_with_the_command_tool() {
    let runtime = runtime_with(&[]);
    runtime.install_builtin_tools().await;

    let value = runtime
        .evaluate(
            "(iterative-loop \
               (max-iterations 3) \
               (initial-input \"attempt\") \
               (test-command \"true\") \
               (executor (lambda (input iter) input)) \
               (validator (lambda (cmd iter) (execute_command (command cmd)))) \
               (controller (lambda (exec valid input iter) \
                 (if (string=? (get-field valid 'status) \"COMPLETE\") \
                     (list 'stop \"validated\") \
                     (list 'continue input)))))",
        )
        .await
        .unwrap();

    assert_eq!(value, Value::Str("validated".into()));
}

/// A failing test command flows back as a FAILED result the controller can
/// see, and the loop runs to exhaustion.
#[tokio::test]
async fn iterative_loop_sees_failing_commands() {
    let runtime = runtime_with(&[]);
    runtime.install_builtin_tools().await;

    let value = runtime
        .evaluate(
            "(iterative-loop \
               (max-iterations 2) \
               (initial-input 0) \
               (test-command \"false\") \
               (executor (lambda (input iter) (+ input 1))) \
               (validator (lambda (cmd iter) (execute_command (command cmd)))) \
               (controller (lambda (exec valid input iter) \
                 (if (string=? (get-field valid 'status) \"COMPLETE\") \
                     (list 'stop exec) \
                     (list 'continue exec)))))",
        )
        .await
        .unwrap();

    // Never validated: the loop exhausts and yields the last executor
    // result.
    assert_eq!(value, Value::Int(2));
}

/// Retrieval feeds `read-files`, whose result the workflow inspects.
#[tokio::test]
async fn context_retrieval_drives_file_reading() {
    let dir = std::env::temp_dir().join(format!("axon-patterns-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("tokenizer.md");
    std::fs::write(&path, "tokenizer internals notes").unwrap();

    let runtime = runtime_with(&[]);
    runtime
        .memory()
        .update_global_index(
            [(
                path.to_str().unwrap().to_string(),
                "tokenizer internals".to_string(),
            )]
            .into_iter()
            .collect(),
        )
        .await;

    let value = runtime
        .evaluate(
            "(let ((paths (get-context (query \"tokenizer internals\") \
                                       (matching_strategy \"metadata\")))) \
               (if (null? paths) \
                   \"no context\" \
                   (get-field (read-files paths) 'file_count)))",
        )
        .await
        .unwrap();

    assert_eq!(value, Value::Int(1));
}

/// Templates registered by the host are callable with named arguments and
/// a per-call context override.
#[tokio::test]
async fn host_registered_template_with_context_override() {
    let runtime = runtime_with(&["reviewed"]);
    let mut template = TaskTemplate::atomic("review", "Review {{target}}");
    template.params.push(ParamSpec::required("target"));
    runtime.tasks().register_template(template).await.unwrap();

    let value = runtime
        .evaluate(
            "(review (target \"the diff\") \
                     (context (quote ((freshContext \"disabled\")))))",
        )
        .await
        .unwrap();

    let Value::TaskResult(result) = value else {
        panic!("expected a task result");
    };
    assert_eq!(result.status, TaskStatus::Complete);
    assert_eq!(result.content, "reviewed");
    assert_eq!(result.note("context_source"), Some(&json!("none")));
}
