use super::{
    synthesize_call_id, LLMError, Message, MessageRole, ProviderAdapter, ProviderConfig, ProviderKind,
    ProviderTurn,
};
use crate::config::OpenAIConfig;
use crate::tools::ToolSpec;
use sdk::types::ToolCallRequest;
use serde_json::{json, Map, Value};

pub struct OpenAIAdapter {
    config: OpenAIConfig,
}

impl OpenAIAdapter {
    pub fn new(config: OpenAIConfig) -> Self {
        Self { config }
    }
}

impl ProviderAdapter for OpenAIAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn endpoint(&self, _config: &ProviderConfig) -> super::Result<String> {
        Ok(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
    }

    fn headers(&self, config: &ProviderConfig) -> super::Result<Vec<(String, String)>> {
        let key = config.require_api_key()?;
        Ok(vec![("Authorization".to_string(), format!("Bearer {}", key))])
    }

    fn encode_request(
        &self,
        messages: &[Message],
        specs: &[ToolSpec],
        config: &ProviderConfig,
    ) -> super::Result<Value> {
        Ok(encode_chat_completion(&config.model, messages, specs))
    }

    fn decode_response(&self, body: Value) -> super::Result<ProviderTurn> {
        decode_chat_completion(body)
    }
}

/// Chat completions request body, shared with OpenAI-compatible servers
pub(crate) fn encode_chat_completion(model: &str, messages: &[Message], specs: &[ToolSpec]) -> Value {
    let api_messages: Vec<Value> = messages.iter().map(encode_message).collect();

    let mut payload = json!({
        "model": model,
        "messages": api_messages,
    });

    if !specs.is_empty() {
        let tools: Vec<Value> = specs
            .iter()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.json_schema(),
                    }
                })
            })
            .collect();
        payload["tools"] = Value::Array(tools);
        payload["tool_choice"] = json!("auto");
    }

    payload
}

fn encode_message(msg: &Message) -> Value {
    match msg.role {
        MessageRole::Assistant if !msg.tool_calls.is_empty() => {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": Value::Object(call.arguments.clone()).to_string(),
                        }
                    })
                })
                .collect();
            let content = if msg.content.is_empty() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        MessageRole::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.content,
        }),
        role => json!({"role": role.to_string(), "content": msg.content}),
    }
}

/// Parse a chat completions response body
pub(crate) fn decode_chat_completion(data: Value) -> super::Result<ProviderTurn> {
    let choice = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| LLMError::ParseError("No message in choice".to_string()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .filter(|c| !c.is_empty());

    let raw_calls = message
        .get("tool_calls")
        .and_then(|c| c.as_array())
        .filter(|c| !c.is_empty());

    let Some(raw_calls) = raw_calls else {
        return text
            .map(ProviderTurn::FinalAnswer)
            .ok_or_else(|| LLMError::ParseError("Empty content".to_string()));
    };

    let mut calls = Vec::with_capacity(raw_calls.len());
    for raw in raw_calls {
        let function = raw
            .get("function")
            .ok_or_else(|| LLMError::ParseError("Tool call without function".to_string()))?;
        let name = function
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| LLMError::ParseError("Tool call without name".to_string()))?;
        let id = raw
            .get("id")
            .and_then(|i| i.as_str())
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .unwrap_or_else(synthesize_call_id);
        let arguments = parse_arguments(name, function.get("arguments"))?;

        calls.push(ToolCallRequest::new(id, name, arguments));
    }

    Ok(ProviderTurn::ToolCalls { text, calls })
}

/// Arguments arrive as a JSON string; some compatible servers send an object.
fn parse_arguments(tool: &str, raw: Option<&Value>) -> super::Result<Map<String, Value>> {
    let malformed = |detail: String| {
        LLMError::ParseError(format!("Malformed arguments for tool '{}': {}", tool, detail))
    };

    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(obj)) => Ok(obj.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(obj)) => Ok(obj),
            Ok(other) => Err(malformed(format!("expected an object, got {}", other))),
            Err(e) => Err(malformed(e.to_string())),
        },
        Some(other) => Err(malformed(format!("unexpected value {}", other))),
    }
}
