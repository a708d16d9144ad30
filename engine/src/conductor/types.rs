//! Plan data model and step references
//!
//! A plan argument may point at the payload of an earlier step with
//! `${step_<index>.<field.path>}`. Indices are 0-based, path segments are
//! object keys or array indices. A string that is exactly one reference
//! resolves to the referenced JSON value; a string that embeds references
//! becomes a template whose references are stringified in place.

use regex::Regex;
use sdk::errors::EngineError;
use sdk::types::ToolCallResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// A declared multi-step workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub user_request: String,

    #[serde(rename = "execution_plan", alias = "steps")]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan from the planner tool's arguments
    pub fn from_arguments(args: &Map<String, Value>) -> Result<Self, EngineError> {
        serde_json::from_value(Value::Object(args.clone()))
            .map_err(|e| EngineError::InvalidPlan(format!("malformed plan: {}", e)))
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub tool: String,

    #[serde(default, alias = "params")]
    pub args: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Pointer into an earlier step's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    pub step: usize,
    pub path: Vec<String>,
}

impl StepRef {
    fn resolve<'a>(&self, payloads: &'a [Value]) -> Result<&'a Value, String> {
        let mut current = payloads
            .get(self.step)
            .ok_or_else(|| format!("step {} has no result", self.step))?;

        for segment in &self.path {
            current = match current {
                Value::Object(obj) => obj.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| {
                format!(
                    "step {} result has no field '{}'",
                    self.step,
                    self.path.join(".")
                )
            })?;
        }

        Ok(current)
    }
}

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{step_(\d+)(?:\.([^}]+))?\}").expect("Invalid step reference pattern")
    })
}

/// A plan argument with its references parsed
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Literal(Value),
    Reference(StepRef),
    Template { raw: String, refs: Vec<StepRef> },
    Object(Vec<(String, ArgValue)>),
    Array(Vec<ArgValue>),
}

impl ArgValue {
    /// Parse a raw JSON argument, recognizing step references in strings
    pub fn parse(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => parse_string(s),
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| Ok((k.clone(), Self::parse(v)?)))
                .collect::<Result<Vec<_>, String>>()
                .map(ArgValue::Object),
            Value::Array(items) => items
                .iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>, String>>()
                .map(ArgValue::Array),
            other => Ok(ArgValue::Literal(other.clone())),
        }
    }

    /// Every reference contained in this argument
    pub fn references(&self) -> Vec<&StepRef> {
        match self {
            ArgValue::Literal(_) => Vec::new(),
            ArgValue::Reference(r) => vec![r],
            ArgValue::Template { refs, .. } => refs.iter().collect(),
            ArgValue::Object(fields) => fields.iter().flat_map(|(_, v)| v.references()).collect(),
            ArgValue::Array(items) => items.iter().flat_map(ArgValue::references).collect(),
        }
    }

    /// Substitute references with values from earlier step payloads
    pub fn resolve(&self, payloads: &[Value]) -> Result<Value, String> {
        match self {
            ArgValue::Literal(v) => Ok(v.clone()),
            ArgValue::Reference(r) => r.resolve(payloads).cloned(),
            ArgValue::Template { raw, .. } => {
                let mut out = String::with_capacity(raw.len());
                let mut last = 0;
                for caps in reference_pattern().captures_iter(raw) {
                    let Some(whole) = caps.get(0) else { continue };
                    let step_ref = step_ref_from(&caps)?;
                    out.push_str(&raw[last..whole.start()]);
                    match step_ref.resolve(payloads)? {
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                    last = whole.end();
                }
                out.push_str(&raw[last..]);
                Ok(Value::String(out))
            }
            ArgValue::Object(fields) => {
                let mut obj = Map::new();
                for (k, v) in fields {
                    obj.insert(k.clone(), v.resolve(payloads)?);
                }
                Ok(Value::Object(obj))
            }
            ArgValue::Array(items) => items
                .iter()
                .map(|item| item.resolve(payloads))
                .collect::<Result<Vec<_>, String>>()
                .map(Value::Array),
        }
    }
}

fn step_ref_from(caps: &regex::Captures<'_>) -> Result<StepRef, String> {
    let index = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let step = index
        .parse::<usize>()
        .map_err(|_| format!("invalid step index '{}'", index))?;
    let path = caps
        .get(2)
        .map(|m| m.as_str().split('.').map(str::to_string).collect())
        .unwrap_or_default();
    Ok(StepRef { step, path })
}

fn parse_string(s: &str) -> Result<ArgValue, String> {
    let pattern = reference_pattern();
    let mut refs = Vec::new();
    let mut whole_match = false;

    for caps in pattern.captures_iter(s) {
        if let Some(m) = caps.get(0) {
            whole_match = m.start() == 0 && m.end() == s.len();
        }
        refs.push(step_ref_from(&caps)?);
    }

    Ok(match refs.len() {
        0 => ArgValue::Literal(Value::String(s.to_string())),
        1 if whole_match => ArgValue::Reference(refs.remove(0)),
        _ => ArgValue::Template {
            raw: s.to_string(),
            refs,
        },
    })
}

/// Outcome of a plan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Success,
    Failed,
}

/// One attempted step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub index: usize,
    pub description: Option<String>,
    pub result: ToolCallResult,
}

/// Results of every attempted step plus a summary
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub user_request: String,
    pub planned_steps: usize,
    pub steps: Vec<StepOutcome>,
}

impl PlanReport {
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.result.success).count()
    }

    pub fn final_status(&self) -> PlanStatus {
        if self.completed_steps() == self.planned_steps {
            PlanStatus::Success
        } else {
            PlanStatus::Failed
        }
    }

    /// The step that stopped the plan, if any
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| !s.result.success)
    }

    pub fn summary(&self) -> String {
        match self.failed_step() {
            None => format!("Completed all {} steps", self.planned_steps),
            Some(failed) => format!(
                "Completed {} of {} steps; step {} ({}) failed",
                self.completed_steps(),
                self.planned_steps,
                failed.index,
                failed.result.tool_name
            ),
        }
    }

    /// Payload shown to the LLM
    pub fn to_payload(&self) -> Value {
        let executed: Vec<Value> = self
            .steps
            .iter()
            .map(|s| {
                json!({
                    "step": s.index,
                    "tool": s.result.tool_name,
                    "description": s.description.clone().unwrap_or_default(),
                    "success": s.result.success,
                    "result": s.result.to_content_value(),
                })
            })
            .collect();

        json!({
            "user_request": self.user_request,
            "final_status": self.final_status(),
            "planned_steps": self.planned_steps,
            "completed_steps": self.completed_steps(),
            "summary": self.summary(),
            "executed_steps": executed,
        })
    }
}
