use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

use revit_mcp_engine::conductor::{Plan, PlanExecutor, PlanStep};
use revit_mcp_engine::config::{Config, ListenerConfig};
use revit_mcp_engine::gateway::RevitGateway;
use revit_mcp_engine::tools::storage::storage_key;
use revit_mcp_engine::tools::{ToolRegistry, ToolRunner};
use sdk::errors::EngineError;

proptest! {
    #[test]
    fn test_config_round_trip(
        log_level in "error|warn|info|debug|trace",
        port in 1024u16..=65535,
        candidate_ports in prop::collection::vec(1024u16..=65535, 1..5),
        max_turns in 1usize..=64,
        provider_timeout in 1u64..=600,
        max_tokens in 1u32..=8192,
    ) {
        let mut config = Config::default();
        config.core.log_level = log_level.clone();
        config.server.port = port;
        config.listener.candidate_ports = candidate_ports.clone();
        config.orchestrator.max_turns = max_turns;
        config.orchestrator.provider_timeout_secs = provider_timeout;
        config.llm.anthropic.max_tokens = max_tokens;

        let text = config.to_toml_string().expect("Failed to serialize config");
        let parsed = Config::from_toml_str(&text).expect("Failed to parse serialized config");

        prop_assert_eq!(parsed.core.log_level, log_level);
        prop_assert_eq!(parsed.server.port, port);
        prop_assert_eq!(parsed.listener.candidate_ports, candidate_ports);
        prop_assert_eq!(parsed.orchestrator.max_turns, max_turns);
        prop_assert_eq!(parsed.orchestrator.provider_timeout_secs, provider_timeout);
        prop_assert_eq!(parsed.llm.anthropic.max_tokens, max_tokens);
    }

    #[test]
    fn test_invalid_log_level_rejected(level in "[a-z]{3,8}") {
        prop_assume!(!["error", "warn", "info", "debug", "trace"].contains(&level.as_str()));
        let text = format!("[core]\nlog_level = \"{}\"\n", level);
        prop_assert!(matches!(Config::from_toml_str(&text), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_storage_key_is_normalized(category in "(OST_)?[A-Z][a-z]{3,10}( [A-Z][a-z]{3,10})?") {
        let key = storage_key(&category);
        prop_assert!(!key.starts_with("ost_"));
        prop_assert!(!key.contains(' '));
        prop_assert_eq!(key.clone(), key.to_lowercase());
        prop_assert_eq!(storage_key(&key), key);
    }

    #[test]
    fn test_references_must_point_backwards(steps in 1usize..6, from in 0usize..6, to in 0usize..6) {
        prop_assume!(from < steps);

        let gateway = RevitGateway::new(ListenerConfig::default()).expect("Failed to build gateway");
        let runner = ToolRunner::new(Arc::new(ToolRegistry::builtin()), Arc::new(gateway));

        let plan = Plan {
            user_request: "generated".to_string(),
            steps: (0..steps)
                .map(|i| {
                    let args = if i == from {
                        json!({"element_ids": format!("${{step_{}.element_ids}}", to)})
                    } else {
                        json!({"element_ids": ["1"]})
                    };
                    PlanStep {
                        tool: "select_elements_by_id".to_string(),
                        args,
                        description: None,
                    }
                })
                .collect(),
        };

        let result = PlanExecutor::new(&runner).validate(&plan);
        if to < from {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(EngineError::InvalidPlan(_))));
        }
    }
}
