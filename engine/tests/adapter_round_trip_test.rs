//! Encode/decode fidelity of every built-in tool through every adapter
//!
//! For each vendor the encoded tool declaration is read back out of the
//! request body, arguments are generated from its advertised schema, and a
//! vendor-shaped tool call echo is decoded into a `ToolCallRequest`.

use serde_json::{json, Map, Value};

use revit_mcp_engine::config::LLMConfig;
use revit_mcp_engine::llm::{adapter_for, Message, ProviderConfig, ProviderKind, ProviderTurn};
use revit_mcp_engine::tools::ToolRegistry;
use sdk::types::ToolCallRequest;

const KINDS: [ProviderKind; 4] = [
    ProviderKind::OpenAI,
    ProviderKind::Anthropic,
    ProviderKind::Gemini,
    ProviderKind::Ollama,
];

fn model_for(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAI => "gpt-4o",
        ProviderKind::Anthropic => "claude-sonnet-4-20250514",
        ProviderKind::Gemini => "gemini-1.5-pro",
        ProviderKind::Ollama => "llama3.1",
    }
}

/// (name, parameters schema) of every tool declared in a request body
fn declared_tools(kind: ProviderKind, body: &Value) -> Vec<(String, Value)> {
    let (tools, schema_key) = match kind {
        ProviderKind::OpenAI | ProviderKind::Ollama => (
            body["tools"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t["function"].clone())
                .collect::<Vec<_>>(),
            "parameters",
        ),
        ProviderKind::Anthropic => (body["tools"].as_array().unwrap().clone(), "input_schema"),
        ProviderKind::Gemini => (
            body["tools"][0]["functionDeclarations"].as_array().unwrap().clone(),
            "parameters",
        ),
    };
    tools
        .iter()
        .map(|t| (t["name"].as_str().unwrap().to_string(), t[schema_key].clone()))
        .collect()
}

/// A value satisfying a schema fragment. Every declared property is filled.
fn sample(schema: &Value) -> Value {
    match schema["type"].as_str() {
        Some("string") => schema["enum"]
            .get(0)
            .cloned()
            .unwrap_or_else(|| json!("Level 1")),
        Some("integer") => json!(3),
        Some("number") => json!(2.5),
        Some("boolean") => json!(true),
        Some("array") => json!([sample(&schema["items"]), sample(&schema["items"])]),
        Some("object") => {
            let properties = schema["properties"].as_object().cloned().unwrap_or_default();
            if properties.is_empty() {
                return json!({"Comments": "Checked"});
            }
            Value::Object(
                properties
                    .iter()
                    .map(|(name, field)| (name.clone(), sample(field)))
                    .collect(),
            )
        }
        other => panic!("unexpected schema type {:?}", other),
    }
}

fn sample_arguments(schema: &Value) -> Map<String, Value> {
    schema["properties"]
        .as_object()
        .map(|properties| {
            properties
                .iter()
                .map(|(name, field)| (name.clone(), sample(field)))
                .collect()
        })
        .unwrap_or_default()
}

/// The vendor response that requests exactly this call
fn vendor_echo(kind: ProviderKind, id: &str, name: &str, args: &Map<String, Value>) -> Value {
    match kind {
        ProviderKind::OpenAI | ProviderKind::Ollama => json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": Value::Object(args.clone()).to_string()}
                }]
            }}]
        }),
        ProviderKind::Anthropic => json!({
            "content": [{"type": "tool_use", "id": id, "name": name, "input": args}],
            "stop_reason": "tool_use"
        }),
        ProviderKind::Gemini => json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": name, "args": args}}
            ]}}]
        }),
    }
}

#[test]
fn test_every_tool_survives_every_adapter() {
    let registry = ToolRegistry::builtin();
    let specs = registry.list_specs();
    let llm_config = LLMConfig::default();
    let messages = vec![Message::user("List all doors on Level 1")];

    for kind in KINDS {
        let adapter = adapter_for(kind, &llm_config);
        let config = ProviderConfig::new(kind, model_for(kind)).with_api_key("test-key");
        let body = adapter.encode_request(&messages, specs, &config).unwrap();

        let declared = declared_tools(kind, &body);
        assert_eq!(declared.len(), specs.len(), "{} dropped tools", kind);

        for (spec, (name, schema)) in specs.iter().zip(&declared) {
            assert_eq!(&spec.name, name, "{} reordered tools", kind);
            assert_eq!(schema, &spec.json_schema(), "{} altered the schema of {}", kind, name);

            let arguments = sample_arguments(schema);
            let id = format!("call_{}", name);
            let turn = adapter
                .decode_response(vendor_echo(kind, &id, name, &arguments))
                .unwrap_or_else(|e| panic!("{} failed to decode {}: {}", kind, name, e));

            let ProviderTurn::ToolCalls { calls, .. } = turn else {
                panic!("{} decoded {} as a final answer", kind, name);
            };
            assert_eq!(calls.len(), 1);
            let call: &ToolCallRequest = &calls[0];

            assert_eq!(&call.name, name, "{}", kind);
            assert_eq!(call.arguments, arguments, "{} changed the arguments of {}", kind, name);
            if kind == ProviderKind::Gemini {
                assert!(call.id.starts_with("call_"), "synthesized id: {}", call.id);
                assert_ne!(call.id, id);
            } else {
                assert_eq!(call.id, id, "{}", kind);
            }

            // Echoed arguments still satisfy the registry.
            assert!(
                registry.validate(name, &call.arguments).is_ok(),
                "{} arguments for {} no longer validate",
                kind,
                name
            );
        }
    }
}

#[test]
fn test_gemini_ids_are_distinct_per_call() {
    let adapter = adapter_for(ProviderKind::Gemini, &LLMConfig::default());
    let turn = adapter
        .decode_response(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "get_elements_by_category", "args": {"category_name": "Doors"}}},
                {"functionCall": {"name": "get_elements_by_category", "args": {"category_name": "Windows"}}}
            ]}}]
        }))
        .unwrap();

    let ProviderTurn::ToolCalls { calls, .. } = turn else {
        panic!("expected tool calls");
    };
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].id, calls[1].id);
    assert_eq!(calls[1].arguments["category_name"], "Windows");
}
