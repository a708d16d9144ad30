//! Plan Executor
//!
//! Runs the steps of a [`Plan`] strictly in order through the request's
//! [`ToolRunner`], feeding earlier payloads into later arguments. The whole
//! reference graph is checked before the first step runs.

use crate::conductor::types::{ArgValue, Plan, PlanReport, PlanStatus, StepOutcome};
use crate::tools::ToolRunner;
use sdk::errors::EngineError;
use sdk::types::{FailureKind, ToolCallRequest, ToolCallResult};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Executes declared multi-step plans
pub struct PlanExecutor<'a> {
    runner: &'a ToolRunner,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(runner: &'a ToolRunner) -> Self {
        Self { runner }
    }

    /// Check the plan and parse every step's arguments.
    ///
    /// Rejects empty plans, unknown tools, nested plans, and references to
    /// steps that have not run before the referencing step.
    pub fn validate(&self, plan: &Plan) -> Result<Vec<ArgValue>, EngineError> {
        if plan.steps.is_empty() {
            return Err(EngineError::InvalidPlan("plan has no steps".to_string()));
        }

        let registry = self.runner.registry();
        let mut parsed = Vec::with_capacity(plan.steps.len());

        for (index, step) in plan.steps.iter().enumerate() {
            let spec = registry.get(&step.tool).map_err(|_| {
                EngineError::InvalidPlan(format!("step {} uses unknown tool '{}'", index, step.tool))
            })?;
            if spec.is_plan() {
                return Err(EngineError::InvalidPlan(format!(
                    "step {} cannot run another plan",
                    index
                )));
            }

            let raw_args = match &step.args {
                Value::Null => Value::Object(Default::default()),
                Value::Object(_) => step.args.clone(),
                other => {
                    return Err(EngineError::InvalidPlan(format!(
                        "step {} arguments must be an object, got {}",
                        index, other
                    )))
                }
            };
            let args = ArgValue::parse(&raw_args)
                .map_err(|e| EngineError::InvalidPlan(format!("step {}: {}", index, e)))?;

            if let Some(bad) = args.references().into_iter().find(|r| r.step >= index) {
                return Err(EngineError::InvalidPlan(format!(
                    "step {} references step {}, which has not run yet",
                    index, bad.step
                )));
            }

            parsed.push(args);
        }

        Ok(parsed)
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// `call_id` prefixes the ids of the per-step calls.
    pub async fn execute(&self, plan: &Plan, call_id: &str) -> Result<PlanReport, EngineError> {
        let parsed = self.validate(plan)?;
        info!(
            "Executing plan with {} steps for '{}'",
            plan.steps.len(),
            plan.user_request
        );

        let mut report = PlanReport {
            user_request: plan.user_request.clone(),
            planned_steps: plan.steps.len(),
            steps: Vec::with_capacity(plan.steps.len()),
        };
        let mut payloads: Vec<Value> = Vec::with_capacity(plan.steps.len());

        for (index, (step, args)) in plan.steps.iter().zip(parsed.iter()).enumerate() {
            let step_id = format!("{}_step_{}", call_id, index);
            info!(
                "Plan step {}: {} {}",
                index,
                step.tool,
                step.description.as_deref().unwrap_or_default()
            );

            let result = match args.resolve(&payloads) {
                Ok(Value::Object(arguments)) => {
                    debug!("Step {} resolved arguments: {:?}", index, arguments);
                    let call = ToolCallRequest::new(&step_id, &step.tool, arguments);
                    self.runner.execute(&call).await
                }
                Ok(other) => ToolCallResult::failure(
                    &step_id,
                    &step.tool,
                    FailureKind::InvalidArguments,
                    format!("step {} arguments resolved to {}", index, other),
                ),
                Err(e) => ToolCallResult::failure(
                    &step_id,
                    &step.tool,
                    FailureKind::InvalidArguments,
                    format!("step {}: {}", index, e),
                ),
            };

            let success = result.success;
            payloads.push(result.payload.clone());
            report.steps.push(StepOutcome {
                index,
                description: step.description.clone(),
                result,
            });

            if !success {
                warn!("Plan stopped at step {} ({})", index, step.tool);
                break;
            }
        }

        info!("Plan finished: {}", report.summary());
        Ok(report)
    }

    /// Run the planner tool call and fold the report into one result
    pub async fn run_call(&self, call: &ToolCallRequest) -> ToolCallResult {
        let plan = match self
            .runner
            .registry()
            .validate(&call.name, &call.arguments)
            .and_then(|args| Plan::from_arguments(&args))
        {
            Ok(plan) => plan,
            Err(EngineError::InvalidPlan(msg)) => {
                return ToolCallResult::failure(&call.id, &call.name, FailureKind::InvalidPlan, msg)
            }
            Err(e) => {
                return ToolCallResult::failure(&call.id, &call.name, FailureKind::InvalidArguments, e.to_string())
            }
        };

        match self.execute(&plan, &call.id).await {
            Ok(report) if report.final_status() == PlanStatus::Success => {
                ToolCallResult::success(&call.id, &call.name, report.to_payload())
            }
            Ok(report) => {
                let kind = report
                    .failed_step()
                    .and_then(|s| s.result.failure_kind())
                    .unwrap_or(FailureKind::ToolExecution);
                ToolCallResult::failure(&call.id, &call.name, kind, report.summary())
                    .with_details(report.to_payload())
            }
            Err(e) => {
                warn!("Rejected plan: {}", e);
                ToolCallResult::failure(&call.id, &call.name, FailureKind::InvalidPlan, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use crate::conductor::types::PlanStep;
    use crate::gateway::RevitGateway;
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn runner() -> ToolRunner {
        let gateway = RevitGateway::new(ListenerConfig::default()).unwrap();
        ToolRunner::new(Arc::new(ToolRegistry::builtin()), Arc::new(gateway))
    }

    fn step(tool: &str, args: Value) -> PlanStep {
        PlanStep {
            tool: tool.to_string(),
            args,
            description: None,
        }
    }

    fn plan(steps: Vec<PlanStep>) -> Plan {
        Plan {
            user_request: "test".to_string(),
            steps,
        }
    }

    #[test]
    fn test_empty_plan_rejected() {
        let runner = runner();
        let err = PlanExecutor::new(&runner).validate(&plan(vec![])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[test]
    fn test_forward_and_self_references_rejected() {
        let runner = runner();
        let executor = PlanExecutor::new(&runner);

        let forward = plan(vec![
            step("select_elements_by_id", json!({"element_ids": "${step_1.element_ids}"})),
            step("get_elements_by_category", json!({"category_name": "Doors"})),
        ]);
        let err = executor.validate(&forward).unwrap_err();
        assert!(err.to_string().contains("step 0 references step 1"));

        let self_ref = plan(vec![step(
            "get_elements_by_category",
            json!({"category_name": "${step_0.category}"}),
        )]);
        assert!(matches!(executor.validate(&self_ref), Err(EngineError::InvalidPlan(_))));
    }

    #[test]
    fn test_unknown_and_nested_plan_tools_rejected() {
        let runner = runner();
        let executor = PlanExecutor::new(&runner);

        let unknown = plan(vec![step("make_coffee", json!({}))]);
        assert!(executor.validate(&unknown).unwrap_err().to_string().contains("make_coffee"));

        let nested = plan(vec![step("plan_and_execute_workflow", json!({}))]);
        assert!(matches!(executor.validate(&nested), Err(EngineError::InvalidPlan(_))));
    }

    #[test]
    fn test_backward_reference_accepted() {
        let runner = runner();
        let ok = plan(vec![
            step("get_elements_by_category", json!({"category_name": "Doors"})),
            step("select_elements_by_id", json!({"element_ids": "${step_0.element_ids}"})),
        ]);
        let parsed = PlanExecutor::new(&runner).validate(&ok).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn test_local_steps_run_without_listener() {
        let runner = runner();
        let report = PlanExecutor::new(&runner)
            .execute(
                &plan(vec![
                    step("list_stored_elements", Value::Null),
                    step("list_stored_elements", json!({})),
                ]),
                "call_1",
            )
            .await
            .unwrap();
        assert_eq!(report.final_status(), PlanStatus::Success);
        assert_eq!(report.steps[1].result.call_id, "call_1_step_1");
    }

    #[tokio::test]
    async fn test_run_call_reports_invalid_plan() {
        let runner = runner();
        let call = ToolCallRequest::new(
            "call_9",
            "plan_and_execute_workflow",
            json!({
                "user_request": "x",
                "execution_plan": [{"tool": "select_elements_by_id", "args": {"element_ids": "${step_3.ids}"}}]
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        let result = PlanExecutor::new(&runner).run_call(&call).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidPlan));
    }

    #[tokio::test]
    async fn test_unresolvable_path_stops_plan() {
        let runner = runner();
        let report = PlanExecutor::new(&runner)
            .execute(
                &plan(vec![
                    step("list_stored_elements", json!({})),
                    step("select_elements_by_id", json!({"element_ids": "${step_0.element_ids}"})),
                    step("list_stored_elements", json!({})),
                ]),
                "c",
            )
            .await
            .unwrap();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.final_status(), PlanStatus::Failed);
        assert_eq!(
            report.steps[1].result.failure_kind(),
            Some(FailureKind::InvalidArguments)
        );
    }
}
