use super::{
    content_as_json, synthesize_call_id, LLMError, Message, MessageRole, ProviderAdapter, ProviderConfig,
    ProviderKind, ProviderTurn,
};
use crate::config::GeminiConfig;
use crate::tools::ToolSpec;
use sdk::types::ToolCallRequest;
use serde_json::{json, Value};

pub struct GeminiAdapter {
    config: GeminiConfig,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn endpoint(&self, config: &ProviderConfig) -> super::Result<String> {
        let key = config.require_api_key()?;
        Ok(format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            config.model,
            key
        ))
    }

    fn headers(&self, _config: &ProviderConfig) -> super::Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }

    fn encode_request(
        &self,
        messages: &[Message],
        specs: &[ToolSpec],
        _config: &ProviderConfig,
    ) -> super::Result<Value> {
        let system_prompt: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut contents: Vec<Value> = Vec::new();
        for msg in messages {
            match msg.role {
                MessageRole::System => {}
                MessageRole::Tool => {
                    let response = match content_as_json(&msg.content) {
                        Value::Object(obj) => Value::Object(obj),
                        other => json!({"result": other}),
                    };
                    let part = json!({
                        "functionResponse": {
                            "name": msg.tool_name.clone().unwrap_or_default(),
                            "response": response,
                        }
                    });
                    // Consecutive function responses share one turn.
                    if let Some(parts) = contents
                        .last_mut()
                        .filter(|last| is_function_response_turn(last))
                        .and_then(|last| last["parts"].as_array_mut())
                    {
                        parts.push(part);
                    } else {
                        contents.push(json!({"role": "user", "parts": [part]}));
                    }
                }
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(json!({"text": msg.content}));
                    }
                    for call in &msg.tool_calls {
                        parts.push(json!({
                            "functionCall": {
                                "name": call.name,
                                "args": Value::Object(call.arguments.clone()),
                            }
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(json!({"role": "model", "parts": parts}));
                    }
                }
                MessageRole::User => {
                    contents.push(json!({"role": "user", "parts": [{"text": msg.content}]}));
                }
            }
        }

        let mut payload = json!({ "contents": contents });

        if !system_prompt.is_empty() {
            payload["systemInstruction"] = json!({"parts": [{"text": system_prompt.join("\n\n")}]});
        }

        if !specs.is_empty() {
            let declarations: Vec<Value> = specs
                .iter()
                .map(|spec| {
                    json!({
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.json_schema(),
                    })
                })
                .collect();
            payload["tools"] = json!([{ "functionDeclarations": declarations }]);
            payload["toolConfig"] = json!({"functionCallingConfig": {"mode": "AUTO"}});
        }

        Ok(payload)
    }

    fn decode_response(&self, body: Value) -> super::Result<ProviderTurn> {
        let Some(candidate) = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        else {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .map(|r| format!(" (blocked: {})", r))
                .unwrap_or_default();
            return Err(LLMError::ParseError(format!("No candidates in response{}", reason)));
        };

        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .ok_or_else(|| LLMError::ParseError("No content parts in candidate".to_string()))?;

        let mut text_parts = Vec::new();
        let mut calls = Vec::new();

        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                text_parts.push(text.to_string());
            }
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| LLMError::ParseError("functionCall without name".to_string()))?;
                let arguments = match call.get("args") {
                    None | Some(Value::Null) => Default::default(),
                    Some(Value::Object(obj)) => obj.clone(),
                    Some(other) => {
                        return Err(LLMError::ParseError(format!(
                            "Malformed args for tool '{}': {}",
                            name, other
                        )))
                    }
                };
                // Gemini has no call ids; the synthesized one travels with the history.
                calls.push(ToolCallRequest::new(synthesize_call_id(), name, arguments));
            }
        }

        let text = Some(text_parts.join("")).filter(|t| !t.trim().is_empty());
        if calls.is_empty() {
            text.map(ProviderTurn::FinalAnswer)
                .ok_or_else(|| LLMError::ParseError("Empty content".to_string()))
        } else {
            Ok(ProviderTurn::ToolCalls { text, calls })
        }
    }
}

fn is_function_response_turn(content: &Value) -> bool {
    content["role"] == "user"
        && content["parts"]
            .as_array()
            .is_some_and(|parts| parts.iter().all(|p| p.get("functionResponse").is_some()))
}
