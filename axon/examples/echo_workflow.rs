//! A self-contained workflow run against the scripted provider.
//!
//! Defines an atomic task, then drives a plan/apply loop until the
//! controller sees a fix. Run with:
//!
//! ```sh
//! cargo run -p axon --example echo_workflow
//! ```

use std::sync::Arc;

use axon::prelude::*;

#[tokio::main]
async fn main() {
    // Scripted responses stand in for a real LLM provider: one plan and
    // one apply per iteration.
    let provider = ScriptedProvider::new([
        "add a bounds check before indexing",
        "still broken",
        "also clamp the offset",
        "fixed",
    ]);
    let runtime = Runtime::new(Arc::new(provider));
    runtime.install_builtin_tools().await;

    let program = "(progn \
       (defatom plan-fix (params (report)) (instructions \"Plan a fix for: {{report}}\")) \
       (defatom apply-fix (params (plan)) (instructions \"Apply: {{plan}}\")) \
       (director-evaluator-loop \
         (max-iterations 5) \
         (initial-director-input \"index out of bounds in the tokenizer\") \
         (director (lambda (input iter) (get-field (plan-fix input) 'content))) \
         (executor (lambda (plan iter) (get-field (apply-fix plan) 'content))) \
         (evaluator (lambda (exec plan iter) exec)) \
         (controller (lambda (feedback plan exec iter) \
           (if (string=? feedback \"fixed\") \
               (list 'stop feedback) \
               (list 'continue feedback))))))";

    match runtime.evaluate(program).await {
        Ok(value) => println!("workflow finished: {value}"),
        Err(error) => eprintln!("workflow failed: {error}"),
    }
}
