//! Built-in Revit tools

use super::*;

pub fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            PROJECT_INFO,
            "Retrieves detailed information about the currently open Revit project, such as project name, file path, Revit version, Revit build number, and active document title.",
            vec![],
            ToolExecution::Host(HostRoute::get("/project_info")),
        ),
        ToolSpec::new(
            GET_ELEMENTS_BY_CATEGORY,
            "Retrieves and stores all elements in the current Revit model for the specified category. Use this ONLY when the user wants to find/get elements. This automatically stores results for later selection. After calling this, if the user wants to select the elements, use select_stored_elements.",
            vec![
                ParamSpec::required(
                    "category_name",
                    ParamType::String,
                    "The name of the Revit category to retrieve elements from (e.g., 'OST_Windows', 'OST_Doors', 'OST_Walls' or simplified like 'Windows', 'Doors', 'Walls').",
                )
                .with_aliases(&["category"]),
                ParamSpec::optional(
                    "level_name",
                    ParamType::String,
                    "Optional level name to restrict results to (e.g., 'Level 1', 'L5')",
                )
                .with_aliases(&["level"]),
            ],
            ToolExecution::Host(
                HostRoute::post("/get_elements_by_category")
                    .storing()
                    .narrowed_by_level("/elements/filter"),
            ),
        ),
        ToolSpec::new(
            SELECT_ELEMENTS_BY_ID,
            "Selects elements by exact IDs. Prefer select_stored_elements for elements found by get_elements_by_category or filter_elements.",
            vec![ParamSpec::required(
                "element_ids",
                ParamType::StringArray,
                "An array of Element IDs (as strings) of the Revit elements to be selected.",
            )],
            ToolExecution::Host(HostRoute::post("/select_elements_by_id")),
        ),
        ToolSpec::new(
            SELECT_STORED_ELEMENTS,
            "Selects elements that were previously retrieved by get_elements_by_category or filter_elements. When the user says 'select windows', 'select doors', 'select them', use this tool with the category name. Zooms to show selected elements without changing the user's view.",
            vec![ParamSpec::required(
                "category_name",
                ParamType::String,
                "The category name of the stored elements to select (e.g., 'windows', 'doors', 'walls'). Use the same category name that was used with get_elements_by_category.",
            )
            .with_aliases(&["category"])],
            ToolExecution::StoreSelect(HostRoute::post("/select_elements_focused")),
        ),
        ToolSpec::new(
            LIST_STORED_ELEMENTS,
            "Lists all currently stored element categories and their counts. Use this to see what elements are available for selection using select_stored_elements.",
            vec![],
            ToolExecution::StoreList,
        ),
        ToolSpec::new(
            FILTER_ELEMENTS,
            "Filters elements by category, level, and parameter conditions. Use this when you need to find specific elements with certain criteria (e.g., windows on Level 5 with specific sill height). Results are stored for later selection.",
            vec![
                ParamSpec::required(
                    "category_name",
                    ParamType::String,
                    "The Revit category (e.g., 'OST_Windows', 'Windows')",
                )
                .with_aliases(&["category"]),
                ParamSpec::optional(
                    "level_name",
                    ParamType::String,
                    "Optional level name to filter by (e.g., 'Level 1', 'L5')",
                )
                .with_aliases(&["level"]),
                ParamSpec::optional(
                    "parameters",
                    ParamType::ObjectArray,
                    "Optional parameter filters",
                )
                .with_fields(vec![
                    ParamSpec::required(
                        "name",
                        ParamType::String,
                        "Parameter name (e.g., 'Sill Height', 'Width')",
                    ),
                    ParamSpec::required(
                        "value",
                        ParamType::String,
                        "Parameter value to match (e.g., '2' 3\"', '900')",
                    ),
                    ParamSpec::optional("condition", ParamType::String, "Comparison condition")
                        .with_enum(&["equals", "contains", "greater_than", "less_than"]),
                ]),
            ],
            ToolExecution::Host(HostRoute::post("/elements/filter").storing()),
        ),
        ToolSpec::new(
            GET_ELEMENT_PROPERTIES,
            "Gets parameter values for specified elements. Use this to read current values before updating or to display element properties to the user.",
            vec![
                ParamSpec::required(
                    "element_ids",
                    ParamType::StringArray,
                    "Array of element IDs to get properties for",
                ),
                ParamSpec::optional(
                    "parameter_names",
                    ParamType::StringArray,
                    "Optional array of specific parameter names to retrieve (e.g., ['Sill Height', 'Width']). If not provided, gets common parameters.",
                ),
            ],
            ToolExecution::Host(HostRoute::post("/elements/get_properties")),
        ),
        ToolSpec::new(
            UPDATE_ELEMENT_PARAMETERS,
            "Updates parameter values for elements. Use this to modify element properties like sill height, dimensions or comments. Typically the final step of filter_elements -> get_element_properties -> update_element_parameters.",
            vec![ParamSpec::required(
                "updates",
                ParamType::ObjectArray,
                "Array of element updates",
            )
            .with_fields(vec![
                ParamSpec::required("element_id", ParamType::String, "Element ID to update"),
                ParamSpec::required(
                    "parameters",
                    ParamType::Object,
                    "Object with parameter names as keys and new values as values (e.g., {'Sill Height': '2' 6\"', 'Comments': 'Updated'})",
                ),
            ])],
            ToolExecution::Host(HostRoute::post("/elements/update_parameters")),
        ),
        ToolSpec::new(
            PLAN_AND_EXECUTE,
            "Executes a sequence of tools based on a planned workflow. Analyze the user request first, then provide a step-by-step execution plan. Later steps can use earlier results with ${step_<index>.<field>} references, where index is 0-based.",
            vec![
                ParamSpec::required("user_request", ParamType::String, "The original user request"),
                ParamSpec::required(
                    "execution_plan",
                    ParamType::ObjectArray,
                    "List of planned steps",
                )
                .with_fields(vec![
                    ParamSpec::required("tool", ParamType::String, "The tool to execute"),
                    ParamSpec::optional("args", ParamType::Object, "Arguments for the tool"),
                    ParamSpec::optional(
                        "description",
                        ParamType::String,
                        "What this step accomplishes",
                    ),
                ]),
            ],
            ToolExecution::Plan,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storing_routes() {
        let storing: Vec<String> = builtin_specs()
            .into_iter()
            .filter(|s| matches!(&s.execution, ToolExecution::Host(r) if r.stores_results))
            .map(|s| s.name)
            .collect();
        assert_eq!(storing, vec![GET_ELEMENTS_BY_CATEGORY, FILTER_ELEMENTS]);
    }

    #[test]
    fn test_only_project_info_uses_get() {
        for spec in builtin_specs() {
            if let ToolExecution::Host(route) = &spec.execution {
                let expect_get = spec.name == PROJECT_INFO;
                assert_eq!(route.method == HttpMethod::Get, expect_get, "{}", spec.name);
            }
        }
    }
}
