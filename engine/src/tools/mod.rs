//! Tool registry
//!
//! The registry is the single catalog of tools the LLM may call. Each
//! [`ToolSpec`] carries a canonical parameter schema that every provider
//! adapter renders into its own vendor format, and an execution route that
//! tells the runner where the call goes (host listener, element store, or
//! plan executor).
//!
//! Arguments are validated here, before any network call is made.

pub mod catalog;
pub mod runner;
pub mod storage;

pub use runner::ToolRunner;
pub use storage::ElementStore;

use sdk::errors::EngineError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const PROJECT_INFO: &str = "get_revit_project_info";
pub const GET_ELEMENTS_BY_CATEGORY: &str = "get_elements_by_category";
pub const SELECT_ELEMENTS_BY_ID: &str = "select_elements_by_id";
pub const SELECT_STORED_ELEMENTS: &str = "select_stored_elements";
pub const LIST_STORED_ELEMENTS: &str = "list_stored_elements";
pub const FILTER_ELEMENTS: &str = "filter_elements";
pub const GET_ELEMENT_PROPERTIES: &str = "get_element_properties";
pub const UPDATE_ELEMENT_PARAMETERS: &str = "update_element_parameters";
pub const PLAN_AND_EXECUTE: &str = "plan_and_execute_workflow";

/// Kind of value a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    StringArray,
    Object,
    ObjectArray,
}

impl ParamType {
    fn label(&self) -> &'static str {
        match self {
            ParamType::String => "a string",
            ParamType::Integer => "an integer",
            ParamType::Number => "a number",
            ParamType::Boolean => "a boolean",
            ParamType::StringArray => "an array of strings",
            ParamType::Object => "an object",
            ParamType::ObjectArray => "an array of objects",
        }
    }
}

/// One parameter of a tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,

    /// Allowed values for string parameters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,

    /// Declared fields of an object, or of each item of an object array
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ParamSpec>,

    /// Other names accepted for this parameter; never advertised to providers
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            enum_values: Vec::new(),
            fields: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_fields(mut self, fields: Vec<ParamSpec>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    fn accepts(&self, key: &str) -> bool {
        self.name == key || self.aliases.iter().any(|a| a == key)
    }

    /// Render this parameter as a JSON schema fragment
    pub fn json_schema(&self) -> Value {
        let mut schema = match self.kind {
            ParamType::String => json!({"type": "string"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            ParamType::StringArray => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Object => object_schema(&self.fields),
            ParamType::ObjectArray => json!({"type": "array", "items": object_schema(&self.fields)}),
        };

        if let Value::Object(ref mut obj) = schema {
            if !self.description.is_empty() {
                obj.insert("description".into(), Value::String(self.description.clone()));
            }
            if !self.enum_values.is_empty() {
                obj.insert("enum".into(), json!(self.enum_values));
            }
        }

        schema
    }
}

fn object_schema(fields: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.clone(), field.json_schema());
    }
    let required: Vec<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.as_str())
        .collect();

    let mut schema = json!({"type": "object", "properties": properties});
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// HTTP method of a host listener route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Route on the host listener a tool maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRoute {
    pub method: HttpMethod,
    pub path: String,

    /// Whether element ids in a successful response go into the element store
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stores_results: bool,

    /// POST route used instead when the call names a `level_name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_path: Option<String>,
}

impl HostRoute {
    pub fn get(path: &str) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.to_string(),
            stores_results: false,
            level_path: None,
        }
    }

    pub fn post(path: &str) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.to_string(),
            stores_results: false,
            level_path: None,
        }
    }

    pub fn storing(mut self) -> Self {
        self.stores_results = true;
        self
    }

    pub fn narrowed_by_level(mut self, path: &str) -> Self {
        self.level_path = Some(path.to_string());
        self
    }

    /// Route to call for these validated arguments
    pub fn for_arguments(&self, args: &Map<String, Value>) -> HostRoute {
        let has_level = args
            .get("level_name")
            .and_then(Value::as_str)
            .is_some_and(|l| !l.trim().is_empty());
        match &self.level_path {
            Some(path) if has_level => HostRoute {
                method: HttpMethod::Post,
                path: path.clone(),
                stores_results: self.stores_results,
                level_path: None,
            },
            _ => self.clone(),
        }
    }
}

/// Where a tool call is executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolExecution {
    /// Forwarded to the host listener
    Host(HostRoute),

    /// Ids resolved from the element store, then sent to the host listener
    StoreSelect(HostRoute),

    /// Answered from the element store without a network call
    StoreList,

    /// Runs a multi-step plan
    Plan,
}

/// Specification of a single tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    pub execution: ToolExecution,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>, execution: ToolExecution) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
            execution,
        }
    }

    /// Canonical JSON schema of the tool arguments.
    ///
    /// Every adapter embeds this value verbatim (OpenAI `parameters`,
    /// Anthropic `input_schema`, Gemini `parameters`).
    pub fn json_schema(&self) -> Value {
        object_schema(&self.params)
    }

    pub fn is_plan(&self) -> bool {
        matches!(self.execution, ToolExecution::Plan)
    }
}

/// Catalog of available tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    /// Create a registry from a list of specs. Duplicate names keep the first.
    pub fn new(specs: Vec<ToolSpec>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(specs.len());
        for spec in specs {
            if seen.insert(spec.name.clone()) {
                unique.push(spec);
            } else {
                warn!("Duplicate tool '{}' ignored", spec.name);
            }
        }
        Self { specs: unique }
    }

    /// Registry holding the built-in Revit tools
    pub fn builtin() -> Self {
        Self::new(catalog::builtin_specs())
    }

    pub fn list_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Result<&ToolSpec, EngineError> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| EngineError::UnknownTool(name.to_string()))
    }

    /// Validate arguments against a tool schema.
    ///
    /// Returns the argument map after lenient coercions: a bare string where
    /// a string array is expected becomes a one-element array, and numbers
    /// inside string arrays are stringified. Null optional values are dropped.
    /// Aliased keys come back under the parameter's canonical name.
    pub fn validate(&self, name: &str, args: &Map<String, Value>) -> Result<Map<String, Value>, EngineError> {
        let spec = self.get(name)?;
        let invalid = |reason: String| EngineError::InvalidArguments {
            tool: name.to_string(),
            reason,
        };

        let mut supplied: Map<String, Value> = Map::new();
        for (key, value) in args {
            let param = spec
                .params
                .iter()
                .find(|p| p.accepts(key))
                .ok_or_else(|| invalid(format!("unknown field '{}'", key)))?;
            if value.is_null() {
                continue;
            }
            if supplied.contains_key(&param.name) {
                return Err(invalid(format!("field '{}' given more than once", param.name)));
            }
            supplied.insert(param.name.clone(), value.clone());
        }

        let mut validated = Map::new();
        for param in &spec.params {
            match supplied.get(&param.name) {
                None => {
                    if param.required {
                        return Err(invalid(format!("missing required field '{}'", param.name)));
                    }
                }
                Some(value) => {
                    let coerced = check_value(param, value, &param.name).map_err(invalid)?;
                    validated.insert(param.name.clone(), coerced);
                }
            }
        }

        debug!("Validated arguments for '{}': {:?}", name, validated);
        Ok(validated)
    }
}

fn check_value(param: &ParamSpec, value: &Value, path: &str) -> Result<Value, String> {
    let mismatch = || format!("field '{}' must be {}", path, param.kind.label());

    match param.kind {
        ParamType::String => {
            let s = value.as_str().ok_or_else(mismatch)?;
            if !param.enum_values.is_empty() && !param.enum_values.iter().any(|v| v == s) {
                return Err(format!(
                    "field '{}' must be one of: {}",
                    path,
                    param.enum_values.join(", ")
                ));
            }
            Ok(value.clone())
        }
        ParamType::Integer => {
            if value.is_i64() || value.is_u64() {
                Ok(value.clone())
            } else {
                Err(mismatch())
            }
        }
        ParamType::Number => {
            if value.is_number() {
                Ok(value.clone())
            } else {
                Err(mismatch())
            }
        }
        ParamType::Boolean => {
            if value.is_boolean() {
                Ok(value.clone())
            } else {
                Err(mismatch())
            }
        }
        ParamType::StringArray => match value {
            Value::String(s) => Ok(json!([s])),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::String(_) => out.push(item.clone()),
                        Value::Number(n) => out.push(Value::String(n.to_string())),
                        _ => return Err(format!("item {} of field '{}' must be a string", i, path)),
                    }
                }
                Ok(Value::Array(out))
            }
            _ => Err(mismatch()),
        },
        ParamType::Object => {
            let obj = value.as_object().ok_or_else(mismatch)?;
            check_fields(&param.fields, obj, path).map(Value::Object)
        }
        ParamType::ObjectArray => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                let obj = item
                    .as_object()
                    .ok_or_else(|| format!("item {} of field '{}' must be an object", i, path))?;
                out.push(Value::Object(check_fields(&param.fields, obj, &item_path)?));
            }
            Ok(Value::Array(out))
        }
    }
}

/// Nested objects check declared fields and pass extra keys through.
fn check_fields(fields: &[ParamSpec], obj: &Map<String, Value>, path: &str) -> Result<Map<String, Value>, String> {
    let mut out = obj.clone();
    for field in fields {
        let field_path = format!("{}.{}", path, field.name);
        match obj.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(format!("missing required field '{}'", field_path));
                }
            }
            Some(value) => {
                out.insert(field.name.clone(), check_value(field, value, &field_path)?);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_builtin_catalog_names() {
        let registry = ToolRegistry::builtin();
        let names = registry.names();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&PROJECT_INFO));
        assert!(names.contains(&PLAN_AND_EXECUTE));
    }

    #[test]
    fn test_get_unknown_tool() {
        let registry = ToolRegistry::builtin();
        let err = registry.get("make_coffee").unwrap_err();
        assert!(matches!(err, EngineError::UnknownTool(name) if name == "make_coffee"));
    }

    #[test]
    fn test_validate_missing_required_field() {
        let registry = ToolRegistry::builtin();
        let err = registry
            .validate(GET_ELEMENTS_BY_CATEGORY, &Map::new())
            .unwrap_err();
        assert!(err.to_string().contains("category_name"));
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let registry = ToolRegistry::builtin();
        let err = registry
            .validate(
                GET_ELEMENTS_BY_CATEGORY,
                &args(json!({"category_name": "Doors", "colour": "red"})),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArguments { .. }));
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_validate_wrong_kind() {
        let registry = ToolRegistry::builtin();
        let err = registry
            .validate(GET_ELEMENTS_BY_CATEGORY, &args(json!({"category_name": 5})))
            .unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn test_validate_coerces_bare_string_to_array() {
        let registry = ToolRegistry::builtin();
        let out = registry
            .validate(SELECT_ELEMENTS_BY_ID, &args(json!({"element_ids": "12345"})))
            .unwrap();
        assert_eq!(out["element_ids"], json!(["12345"]));
    }

    #[test]
    fn test_validate_stringifies_numeric_ids() {
        let registry = ToolRegistry::builtin();
        let out = registry
            .validate(SELECT_ELEMENTS_BY_ID, &args(json!({"element_ids": [1, "2", 3]})))
            .unwrap();
        assert_eq!(out["element_ids"], json!(["1", "2", "3"]));
    }

    #[test]
    fn test_validate_nested_enum() {
        let registry = ToolRegistry::builtin();
        let ok = registry.validate(
            FILTER_ELEMENTS,
            &args(json!({
                "category_name": "Windows",
                "parameters": [{"name": "Sill Height", "value": "900", "condition": "equals"}]
            })),
        );
        assert!(ok.is_ok());

        let err = registry
            .validate(
                FILTER_ELEMENTS,
                &args(json!({
                    "category_name": "Windows",
                    "parameters": [{"name": "Sill Height", "value": "900", "condition": "roughly"}]
                })),
            )
            .unwrap_err();
        assert!(err.to_string().contains("parameters[0].condition"));
    }

    #[test]
    fn test_validate_drops_null_optional() {
        let registry = ToolRegistry::builtin();
        let out = registry
            .validate(
                FILTER_ELEMENTS,
                &args(json!({"category_name": "Doors", "level_name": null})),
            )
            .unwrap();
        assert!(!out.contains_key("level_name"));
    }

    #[test]
    fn test_validate_maps_aliases_to_canonical_names() {
        let registry = ToolRegistry::builtin();
        let out = registry
            .validate(
                GET_ELEMENTS_BY_CATEGORY,
                &args(json!({"category": "Doors", "level": "Level 1"})),
            )
            .unwrap();
        assert_eq!(out, args(json!({"category_name": "Doors", "level_name": "Level 1"})));

        let err = registry
            .validate(
                GET_ELEMENTS_BY_CATEGORY,
                &args(json!({"category": "Doors", "category_name": "Walls"})),
            )
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_aliases_are_not_advertised() {
        let registry = ToolRegistry::builtin();
        let schema = registry.get(GET_ELEMENTS_BY_CATEGORY).unwrap().json_schema();
        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("level_name"));
        assert!(!properties.contains_key("level"));
        assert!(!properties.contains_key("category"));
    }

    #[test]
    fn test_level_narrows_category_route() {
        let registry = ToolRegistry::builtin();
        let ToolExecution::Host(route) = &registry.get(GET_ELEMENTS_BY_CATEGORY).unwrap().execution else {
            panic!("expected a host route");
        };

        let plain = route.for_arguments(&args(json!({"category_name": "Doors"})));
        assert_eq!(plain.path, "/get_elements_by_category");

        let narrowed = route.for_arguments(&args(json!({"category_name": "Doors", "level_name": "Level 1"})));
        assert_eq!(narrowed.path, "/elements/filter");
        assert_eq!(narrowed.method, HttpMethod::Post);
        assert!(narrowed.stores_results);

        let blank = route.for_arguments(&args(json!({"category_name": "Doors", "level_name": " "})));
        assert_eq!(blank.path, "/get_elements_by_category");
    }

    #[test]
    fn test_json_schema_shape() {
        let registry = ToolRegistry::builtin();
        let schema = registry.get(FILTER_ELEMENTS).unwrap().json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["category_name"]));
        assert_eq!(schema["properties"]["parameters"]["type"], "array");
        assert_eq!(
            schema["properties"]["parameters"]["items"]["properties"]["condition"]["enum"][0],
            "equals"
        );

        let empty = registry.get(PROJECT_INFO).unwrap().json_schema();
        assert_eq!(empty, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let first = ToolSpec::new("a", "first", vec![], ToolExecution::StoreList);
        let second = ToolSpec::new("a", "second", vec![], ToolExecution::StoreList);
        let registry = ToolRegistry::new(vec![first, second]);
        assert_eq!(registry.list_specs().len(), 1);
        assert_eq!(registry.get("a").unwrap().description, "first");
    }
}
