//! System prompt prepended to every conversation

use crate::tools::{ToolRegistry, ToolSpec, PLAN_AND_EXECUTE};

const PLANNING_GUIDE: &str = r#"You are a Revit automation assistant with planning capabilities.

PLANNING APPROACH:
For requests that need more than one tool, use the plan_and_execute_workflow tool, which lets you:
1. Analyze the user request
2. Plan a sequence of steps using the available tools
3. Execute all steps in one operation
4. Return complete results

EXECUTION PLAN FORMAT:
Steps are numbered from 0. A later step can use a field from an earlier step's result
with ${step_<index>.<field>}. Nested fields and list items use dots, e.g. ${step_0.element_ids.0}.
[
  {
    "tool": "filter_elements",
    "args": {"category_name": "Windows", "level_name": "L5", "parameters": [{"name": "Sill Height", "value": "2' 3\"", "condition": "equals"}]},
    "description": "Find windows on L5 with sill height 2'3\""
  },
  {
    "tool": "get_element_properties",
    "args": {"element_ids": "${step_0.element_ids}", "parameter_names": ["Sill Height"]},
    "description": "Read the current sill heights"
  }
]

WORKFLOW EXAMPLES:
- Parameter updates: filter_elements -> get_element_properties -> update_element_parameters -> select_stored_elements
- Property inspection: filter_elements -> get_element_properties
- Element discovery: get_elements_by_category -> get_element_properties -> select_stored_elements

Use plan_and_execute_workflow for multi-step operations to provide complete results in one response."#;

/// Build the planning prompt, listing every tool the plan may use
pub fn planning_prompt(registry: &ToolRegistry) -> String {
    let tools: Vec<String> = registry
        .list_specs()
        .iter()
        .filter(|spec| spec.name != PLAN_AND_EXECUTE)
        .map(describe)
        .collect();

    format!(
        "{}\n\nAVAILABLE TOOLS FOR PLANNING:\n{}",
        PLANNING_GUIDE,
        tools.join("\n")
    )
}

fn describe(spec: &ToolSpec) -> String {
    if spec.params.is_empty() {
        format!("- {}: (no params)", spec.name)
    } else {
        let params: Vec<&str> = spec.params.iter().map(|p| p.name.as_str()).collect();
        format!("- {}: (params: {})", spec.name, params.join(", "))
    }
}
