//! Integration tests for plan execution against a mocked listener

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{
    matchers::{any, body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use revit_mcp_engine::conductor::{Plan, PlanExecutor, PlanStatus};
use revit_mcp_engine::config::ListenerConfig;
use revit_mcp_engine::gateway::RevitGateway;
use revit_mcp_engine::tools::{ToolRegistry, ToolRunner};
use sdk::types::{FailureKind, ToolCallRequest};

fn runner_for(server: &MockServer) -> ToolRunner {
    let port = server.address().port();
    let config = ListenerConfig {
        host: "127.0.0.1".to_string(),
        candidate_ports: vec![port],
        default_port: port,
        probe_timeout_secs: 1,
        request_timeout_secs: 2,
        ..ListenerConfig::default()
    };
    let gateway = RevitGateway::new(config).unwrap();
    ToolRunner::new(Arc::new(ToolRegistry::builtin()), Arc::new(gateway))
}

fn plan(value: Value) -> Plan {
    Plan::from_arguments(value.as_object().unwrap()).unwrap()
}

async fn mount_doors(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/revit-mcp-v1/project_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"project_name": "Tower A"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/revit-mcp-v1/get_elements_by_category"))
        .and(body_json(json!({"category_name": "Doors"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "category": "Doors",
            "count": 2,
            "element_ids": ["101", "102"]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_backward_reference_feeds_next_step() {
    let server = MockServer::start().await;
    mount_doors(&server).await;
    Mock::given(method("POST"))
        .and(path("/revit-mcp-v1/select_elements_by_id"))
        .and(body_json(json!({"element_ids": ["101", "102"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "selected": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let runner = runner_for(&server);
    let report = PlanExecutor::new(&runner)
        .execute(
            &plan(json!({
                "user_request": "Select all doors",
                "execution_plan": [
                    {"tool": "get_elements_by_category", "args": {"category_name": "Doors"}, "description": "Find doors"},
                    {"tool": "select_elements_by_id", "args": {"element_ids": "${step_0.element_ids}"}, "description": "Select them"}
                ]
            })),
            "call_plan",
        )
        .await
        .unwrap();

    assert_eq!(report.final_status(), PlanStatus::Success);
    assert_eq!(report.completed_steps(), 2);
    assert_eq!(report.steps[0].result.call_id, "call_plan_step_0");

    // Steps hit the listener in index order.
    let posted: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        posted,
        vec![
            "/revit-mcp-v1/get_elements_by_category".to_string(),
            "/revit-mcp-v1/select_elements_by_id".to_string()
        ]
    );

    // Storing routes still record results when run inside a plan.
    assert_eq!(runner.store().keys(), vec!["doors".to_string()]);
}

#[tokio::test]
async fn test_template_and_indexed_references() {
    let server = MockServer::start().await;
    mount_doors(&server).await;
    Mock::given(method("POST"))
        .and(path("/revit-mcp-v1/elements/update_parameters"))
        .and(body_json(json!({
            "updates": [{"element_id": "101", "parameters": {"Comments": "Checked 2 doors"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "updated": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let runner = runner_for(&server);
    let report = PlanExecutor::new(&runner)
        .execute(
            &plan(json!({
                "user_request": "Comment the first door",
                "execution_plan": [
                    {"tool": "get_elements_by_category", "args": {"category_name": "Doors"}},
                    {"tool": "update_element_parameters", "args": {"updates": [{
                        "element_id": "${step_0.element_ids.0}",
                        "parameters": {"Comments": "Checked ${step_0.count} doors"}
                    }]}}
                ]
            })),
            "c",
        )
        .await
        .unwrap();

    assert_eq!(report.final_status(), PlanStatus::Success);
}

#[tokio::test]
async fn test_failed_step_stops_plan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/revit-mcp-v1/project_info"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/revit-mcp-v1/get_elements_by_category"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Unknown category 'Dors'"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/revit-mcp-v1/select_elements_by_id"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let runner = runner_for(&server);
    let call = ToolCallRequest::new(
        "call_7",
        "plan_and_execute_workflow",
        json!({
            "user_request": "Select the dors",
            "execution_plan": [
                {"tool": "get_elements_by_category", "args": {"category_name": "Dors"}},
                {"tool": "select_elements_by_id", "args": {"element_ids": "${step_0.element_ids}"}}
            ]
        })
        .as_object()
        .cloned()
        .unwrap(),
    );
    let result = PlanExecutor::new(&runner).run_call(&call).await;

    assert!(!result.success);
    assert_eq!(result.failure_kind(), Some(FailureKind::ToolExecution));
    let failure = result.error.unwrap();
    assert_eq!(failure.message, "Completed 0 of 2 steps; step 0 (get_elements_by_category) failed");

    let details = failure.details.unwrap();
    assert_eq!(details["final_status"], "failed");
    assert_eq!(details["executed_steps"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_plan_makes_no_listener_calls() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let runner = runner_for(&server);
    let call = ToolCallRequest::new(
        "call_8",
        "plan_and_execute_workflow",
        json!({
            "user_request": "Select doors",
            "execution_plan": [
                {"tool": "select_elements_by_id", "args": {"element_ids": "${step_1.element_ids}"}},
                {"tool": "get_elements_by_category", "args": {"category_name": "Doors"}}
            ]
        })
        .as_object()
        .cloned()
        .unwrap(),
    );
    let result = PlanExecutor::new(&runner).run_call(&call).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidPlan));
    assert!(result.error.unwrap().message.contains("step 0 references step 1"));
}
