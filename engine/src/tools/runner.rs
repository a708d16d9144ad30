//! Execution of single, non-plan tool calls

use super::storage::{filter_storage_key, ElementStore};
use super::{ToolExecution, ToolRegistry};
use crate::gateway::RevitGateway;
use sdk::types::{FailureKind, ToolCallRequest, ToolCallResult};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Runs validated tool calls for one chat request.
///
/// Holds the request's [`ElementStore`], so the runner must not be shared
/// across requests.
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    gateway: Arc<RevitGateway>,
    store: ElementStore,
}

impl ToolRunner {
    pub fn new(registry: Arc<ToolRegistry>, gateway: Arc<RevitGateway>) -> Self {
        Self {
            registry,
            gateway,
            store: ElementStore::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    /// Validate and execute one call.
    ///
    /// Unknown tools and schema violations come back as `InvalidArguments`
    /// results. Plan calls are not handled here.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolCallResult {
        let spec = match self.registry.get(&call.name) {
            Ok(spec) => spec,
            Err(e) => {
                return ToolCallResult::failure(&call.id, &call.name, FailureKind::InvalidArguments, e.to_string())
            }
        };

        let arguments = match self.registry.validate(&call.name, &call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("Rejected arguments for '{}': {}", call.name, e);
                return ToolCallResult::failure(&call.id, &call.name, FailureKind::InvalidArguments, e.to_string());
            }
        };
        let call = ToolCallRequest::new(&call.id, &call.name, arguments);

        info!("Executing tool '{}'", call.name);
        match &spec.execution {
            ToolExecution::Host(route) => {
                let route = route.for_arguments(&call.arguments);
                let mut result = self.gateway.invoke(&call, &route).await;
                if route.stores_results && result.success {
                    self.store_result(&call, &mut result);
                }
                result
            }
            ToolExecution::StoreSelect(route) => self.select_stored(&call, route).await,
            ToolExecution::StoreList => {
                ToolCallResult::success(&call.id, &call.name, self.store.summary())
            }
            ToolExecution::Plan => ToolCallResult::failure(
                &call.id,
                &call.name,
                FailureKind::InvalidPlan,
                format!("'{}' cannot be run as a single tool call", call.name),
            ),
        }
    }

    fn store_result(&self, call: &ToolCallRequest, result: &mut ToolCallResult) {
        let Some(ids) = result.payload.get("element_ids").and_then(Value::as_array) else {
            return;
        };
        let element_ids: Vec<String> = ids
            .iter()
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        let count = result
            .payload
            .get("count")
            .and_then(Value::as_u64)
            .map(|c| c as usize)
            .unwrap_or(element_ids.len());

        let category = call.arg_str("category_name").unwrap_or_default();
        let key = filter_storage_key(
            category,
            call.arg_str("level_name"),
            call.arguments
                .get("parameters")
                .and_then(Value::as_array)
                .is_some_and(|p| !p.is_empty()),
        );

        let stored_as = self.store.store(&key, category, element_ids, count);
        if let Value::Object(ref mut payload) = result.payload {
            payload.insert("stored_as".into(), Value::String(stored_as.clone()));
            payload.insert(
                "storage_message".into(),
                Value::String(format!(
                    "Results stored as '{}' - use select_stored_elements to select these elements",
                    stored_as
                )),
            );
        }
    }

    async fn select_stored(&self, call: &ToolCallRequest, route: &super::HostRoute) -> ToolCallResult {
        let category = call.arg_str("category_name").unwrap_or_default();

        let Some((key, stored)) = self.store.lookup(category) else {
            let available = self.store.keys();
            return ToolCallResult::failure(
                &call.id,
                &call.name,
                FailureKind::ToolExecution,
                format!(
                    "No stored elements found for category '{}'. Available stored categories: {:?}",
                    category, available
                ),
            )
            .with_details(json!({
                "available_categories": available,
                "suggestion": "Use list_stored_elements to see available categories, or get_elements_by_category to find elements first."
            }));
        };

        info!("Selecting {} stored elements from '{}'", stored.element_ids.len(), key);
        let mut args = Map::new();
        args.insert("element_ids".into(), json!(stored.element_ids));
        let host_call = ToolCallRequest::new(&call.id, &call.name, args);

        let mut result = self.gateway.invoke(&host_call, route).await;
        if result.success {
            if let Value::Object(ref mut payload) = result.payload {
                payload.insert("matched_key".into(), Value::String(key));
                payload.insert("stored_count".into(), json!(stored.count));
                payload.insert("stored_at".into(), Value::String(stored.stored_at.to_rfc3339()));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListenerConfig;
    use crate::tools::{LIST_STORED_ELEMENTS, PLAN_AND_EXECUTE, SELECT_STORED_ELEMENTS};

    fn runner() -> ToolRunner {
        let gateway = RevitGateway::new(ListenerConfig::default()).unwrap();
        ToolRunner::new(Arc::new(ToolRegistry::builtin()), Arc::new(gateway))
    }

    fn call(name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::new("call_1", name, args.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_list_stored_elements_is_local() {
        let runner = runner();
        runner.store().store("doors", "Doors", vec!["1".into()], 1);

        let result = runner.execute(&call(LIST_STORED_ELEMENTS, json!({}))).await;
        assert!(result.success);
        assert_eq!(result.payload["total_categories"], 1);
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn test_select_stored_without_entries_fails_locally() {
        let runner = runner();
        let result = runner
            .execute(&call(SELECT_STORED_ELEMENTS, json!({"category_name": "windows"})))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::ToolExecution));
        assert!(result.error.unwrap().message.contains("windows"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_result() {
        let runner = runner();
        let result = runner.execute(&call(SELECT_STORED_ELEMENTS, json!({}))).await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_plan_tool_is_not_a_single_call() {
        let runner = runner();
        let result = runner
            .execute(&call(
                PLAN_AND_EXECUTE,
                json!({"user_request": "x", "execution_plan": []}),
            ))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidPlan));
    }
}
