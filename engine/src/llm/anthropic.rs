use super::{LLMError, Message, MessageRole, ProviderAdapter, ProviderConfig, ProviderKind, ProviderTurn};
use crate::config::AnthropicConfig;
use crate::tools::ToolSpec;
use sdk::types::ToolCallRequest;
use serde_json::{json, Value};

pub struct AnthropicAdapter {
    config: AnthropicConfig,
}

impl AnthropicAdapter {
    pub fn new(config: AnthropicConfig) -> Self {
        Self { config }
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn endpoint(&self, _config: &ProviderConfig) -> super::Result<String> {
        Ok(format!("{}/messages", self.config.base_url.trim_end_matches('/')))
    }

    fn headers(&self, config: &ProviderConfig) -> super::Result<Vec<(String, String)>> {
        let key = config.require_api_key()?;
        Ok(vec![
            ("x-api-key".to_string(), key.to_string()),
            ("anthropic-version".to_string(), self.config.api_version.clone()),
        ])
    }

    fn encode_request(
        &self,
        messages: &[Message],
        specs: &[ToolSpec],
        config: &ProviderConfig,
    ) -> super::Result<Value> {
        let system_prompt: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut api_messages: Vec<Value> = Vec::new();
        for msg in messages {
            match msg.role {
                MessageRole::System => {}
                MessageRole::Tool => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                        "content": msg.content,
                    });
                    // Consecutive tool results share one user turn.
                    if let Some(blocks) = api_messages
                        .last_mut()
                        .filter(|last| last["role"] == "user" && is_tool_result_turn(last))
                        .and_then(|last| last["content"].as_array_mut())
                    {
                        blocks.push(block);
                    } else {
                        api_messages.push(json!({"role": "user", "content": [block]}));
                    }
                }
                MessageRole::Assistant if !msg.tool_calls.is_empty() => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": msg.content}));
                    }
                    for call in &msg.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": Value::Object(call.arguments.clone()),
                        }));
                    }
                    api_messages.push(json!({"role": "assistant", "content": blocks}));
                }
                role => api_messages.push(json!({"role": role.to_string(), "content": msg.content})),
            }
        }

        let mut payload = json!({
            "model": self.config.resolve_model(&config.model),
            "max_tokens": self.config.max_tokens,
            "messages": api_messages,
        });

        if !system_prompt.is_empty() {
            payload["system"] = Value::String(system_prompt.join("\n\n"));
        }

        if !specs.is_empty() {
            let tools: Vec<Value> = specs
                .iter()
                .map(|spec| {
                    json!({
                        "name": spec.name,
                        "description": spec.description,
                        "input_schema": spec.json_schema(),
                    })
                })
                .collect();
            payload["tools"] = Value::Array(tools);
        }

        Ok(payload)
    }

    fn decode_response(&self, body: Value) -> super::Result<ProviderTurn> {
        let blocks = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LLMError::ParseError("No content in response".to_string()))?;

        let mut text_parts = Vec::new();
        let mut calls = Vec::new();

        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        text_parts.push(text.to_string());
                    }
                }
                Some("tool_use") => {
                    let id = block
                        .get("id")
                        .and_then(|i| i.as_str())
                        .ok_or_else(|| LLMError::ParseError("tool_use block without id".to_string()))?;
                    let name = block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| LLMError::ParseError("tool_use block without name".to_string()))?;
                    let arguments = match block.get("input") {
                        None | Some(Value::Null) => Default::default(),
                        Some(Value::Object(obj)) => obj.clone(),
                        Some(other) => {
                            return Err(LLMError::ParseError(format!(
                                "Malformed input for tool '{}': {}",
                                name, other
                            )))
                        }
                    };
                    calls.push(ToolCallRequest::new(id, name, arguments));
                }
                _ => {}
            }
        }

        let text = Some(text_parts.join("\n")).filter(|t| !t.is_empty());
        if calls.is_empty() {
            text.map(ProviderTurn::FinalAnswer)
                .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))
        } else {
            Ok(ProviderTurn::ToolCalls { text, calls })
        }
    }
}

fn is_tool_result_turn(message: &Value) -> bool {
    message["content"]
        .as_array()
        .is_some_and(|blocks| blocks.iter().all(|b| b["type"] == "tool_result"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use sdk::types::ToolCallResult;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(AnthropicConfig::default())
    }

    fn config() -> ProviderConfig {
        ProviderConfig::new(ProviderKind::Anthropic, "claude-3-5-sonnet").with_api_key("key")
    }

    #[test]
    fn test_encode_groups_tool_results() {
        let first = ToolCallRequest::new("toolu_1", "get_revit_project_info", Default::default());
        let second = ToolCallRequest::new("toolu_2", "list_stored_elements", Default::default());
        let messages = vec![
            Message::system("plan carefully"),
            Message::user("what project is this?"),
            Message::assistant_tool_calls("Checking.", vec![first, second]),
            Message::tool_result(&ToolCallResult::success("toolu_1", "get_revit_project_info", json!({}))),
            Message::tool_result(&ToolCallResult::success("toolu_2", "list_stored_elements", json!({}))),
        ];

        let body = adapter()
            .encode_request(&messages, ToolRegistry::builtin().list_specs(), &config())
            .unwrap();

        assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(body["max_tokens"], 3000);
        assert_eq!(body["system"], "plan carefully");
        assert!(body["tools"][0].get("input_schema").is_some());

        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1]["content"][0]["type"], "text");
        assert_eq!(msgs[1]["content"][1]["type"], "tool_use");
        assert_eq!(msgs[1]["content"][2]["id"], "toolu_2");
        assert_eq!(msgs[2]["role"], "user");
        assert_eq!(msgs[2]["content"].as_array().unwrap().len(), 2);
        assert_eq!(msgs[2]["content"][1]["tool_use_id"], "toolu_2");
    }

    #[test]
    fn test_decode_tool_use() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_9", "name": "filter_elements", "input": {"category_name": "Doors"}}
            ],
            "stop_reason": "tool_use"
        });

        let ProviderTurn::ToolCalls { text, calls } = adapter().decode_response(body).unwrap() else {
            panic!("expected tool calls");
        };
        assert_eq!(text.as_deref(), Some("Let me look."));
        assert_eq!(calls[0].id, "toolu_9");
        assert_eq!(calls[0].arg_str("category_name"), Some("Doors"));
    }

    #[test]
    fn test_decode_text_only() {
        let body = json!({"content": [{"type": "text", "text": "All done."}]});
        assert_eq!(
            adapter().decode_response(body).unwrap(),
            ProviderTurn::FinalAnswer("All done.".to_string())
        );
    }

    #[test]
    fn test_headers() {
        let headers = adapter().headers(&config()).unwrap();
        assert!(headers.contains(&("x-api-key".to_string(), "key".to_string())));
        assert!(headers.contains(&("anthropic-version".to_string(), "2023-06-01".to_string())));
    }
}
