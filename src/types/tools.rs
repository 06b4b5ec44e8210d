//! Tool declarations and their per-session resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AgentError;

/// Tool types understood by the agent service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    CortexAnalystTextToSql,
    SqlExec,
    DataToChart,
    CortexSearch,
}

/// `{"tool_spec": {"type": ..., "name": ...}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSpec {
    pub tool_spec: ToolDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub name: String,
}

impl ToolSpec {
    pub fn new(kind: ToolKind, name: impl Into<String>) -> Self {
        Self {
            tool_spec: ToolDescriptor {
                kind,
                name: name.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.tool_spec.name
    }

    pub fn kind(&self) -> ToolKind {
        self.tool_spec.kind
    }
}

/// Execution contract bound to a tool name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResource {
    SemanticModel {
        semantic_model_file: String,
    },
    SqlExec {
        warehouse: String,
        timeout: u64,
    },
    Search {
        name: String,
        max_results: u32,
    },
    Other(serde_json::Value),
}

/// Stage path of a semantic model file: `@DB.SCHEMA.STAGE/file.yaml`.
pub fn semantic_model_path(database: &str, schema: &str, stage: &str, file: &str) -> String {
    format!("@{database}.{schema}.{stage}/{file}")
}

/// Tools and resources replayed unchanged on every request of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSet {
    tools: Vec<ToolSpec>,
    resources: BTreeMap<String, ToolResource>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text-to-SQL tool bound to a semantic model file.
    pub fn text_to_sql(
        self,
        name: impl Into<String>,
        semantic_model_file: impl Into<String>,
    ) -> Self {
        self.with_tool(
            ToolSpec::new(ToolKind::CortexAnalystTextToSql, name),
            Some(ToolResource::SemanticModel {
                semantic_model_file: semantic_model_file.into(),
            }),
        )
    }

    /// SQL execution tool, executed client side. Without a warehouse no resource
    /// entry is sent.
    pub fn sql_exec(self, name: impl Into<String>, warehouse: Option<String>, timeout_secs: u64) -> Self {
        let resource = warehouse.map(|warehouse| ToolResource::SqlExec {
            warehouse,
            timeout: timeout_secs,
        });
        self.with_tool(ToolSpec::new(ToolKind::SqlExec, name), resource)
    }

    pub fn data_to_chart(self, name: impl Into<String>) -> Self {
        self.with_tool(ToolSpec::new(ToolKind::DataToChart, name), None)
    }

    /// Search tool bound to a search service.
    pub fn search(self, name: impl Into<String>, service: impl Into<String>, max_results: u32) -> Self {
        self.with_tool(
            ToolSpec::new(ToolKind::CortexSearch, name),
            Some(ToolResource::Search {
                name: service.into(),
                max_results,
            }),
        )
    }

    /// Add an arbitrary tool with an optional resource.
    pub fn with_tool(mut self, spec: ToolSpec, resource: Option<ToolResource>) -> Self {
        match resource {
            Some(resource) => {
                self.resources.insert(spec.name().to_string(), resource);
            }
            None => {
                self.resources.remove(spec.name());
            }
        }
        self.tools.retain(|t| t.name() != spec.name());
        self.tools.push(spec);
        self
    }

    /// The analyst + SQL execution pair used by the Superstore deployment.
    pub fn superstore(
        database: &str,
        schema: &str,
        stage: &str,
        semantic_model: &str,
        warehouse: Option<String>,
    ) -> Self {
        Self::new()
            .text_to_sql(
                "cortex_analyst_text_to_sql",
                semantic_model_path(database, schema, stage, semantic_model),
            )
            .sql_exec("sql_exec", warehouse, 60)
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn resources(&self) -> &BTreeMap<String, ToolResource> {
        &self.resources
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Name of the client-executed SQL tool, if one is registered.
    pub fn sql_exec_tool(&self) -> Option<&str> {
        self.tools
            .iter()
            .find(|t| t.kind() == ToolKind::SqlExec)
            .map(ToolSpec::name)
    }

    /// Tool and resource names must line up, and at most one SQL tool may exist.
    pub fn validate(&self) -> Result<(), AgentError> {
        for name in self.resources.keys() {
            if !self.tools.iter().any(|t| t.name() == name) {
                return Err(AgentError::Configuration(format!(
                    "tool_resources entry '{name}' has no matching tool"
                )));
            }
        }
        let sql_tools = self
            .tools
            .iter()
            .filter(|t| t.kind() == ToolKind::SqlExec)
            .count();
        if sql_tools > 1 {
            return Err(AgentError::Configuration(format!(
                "expected at most one sql_exec tool, found {sql_tools}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn superstore_preset_wire_shape() {
        let set = ToolSet::superstore(
            "SUPERSTOREDB",
            "DATA",
            "SUPERSTORE_STAGE",
            "superstore_semantic_model.yaml",
            Some("COMPUTE_WH".to_string()),
        );

        assert_eq!(
            serde_json::to_value(set.tools()).unwrap(),
            json!([
                {"tool_spec": {"type": "cortex_analyst_text_to_sql", "name": "cortex_analyst_text_to_sql"}},
                {"tool_spec": {"type": "sql_exec", "name": "sql_exec"}}
            ])
        );
        assert_eq!(
            serde_json::to_value(set.resources()).unwrap(),
            json!({
                "cortex_analyst_text_to_sql": {
                    "semantic_model_file": "@SUPERSTOREDB.DATA.SUPERSTORE_STAGE/superstore_semantic_model.yaml"
                },
                "sql_exec": {"warehouse": "COMPUTE_WH", "timeout": 60}
            })
        );
        assert_eq!(set.sql_exec_tool(), Some("sql_exec"));
        set.validate().unwrap();
    }

    #[test]
    fn sql_exec_without_warehouse_has_no_resource() {
        let set = ToolSet::new().sql_exec("sql_exec", None, 30);
        assert!(set.resources().is_empty());
        assert_eq!(set.sql_exec_tool(), Some("sql_exec"));
    }

    #[test]
    fn orphan_resource_fails_validation() {
        let set = ToolSet::new().with_tool(
            ToolSpec::new(ToolKind::DataToChart, "chart"),
            None,
        );
        let mut value = serde_json::to_value(&set).unwrap();
        value["resources"]["ghost"] = json!({"semantic_model_file": "@x"});
        let set: ToolSet = serde_json::from_value(value).unwrap();

        assert!(matches!(set.validate(), Err(AgentError::Configuration(_))));
    }

    #[test]
    fn duplicate_sql_tools_fail_validation() {
        let set = ToolSet::new()
            .sql_exec("first", None, 60)
            .sql_exec("second", None, 60);
        assert!(set.validate().is_err());
    }

    #[test]
    fn re_adding_a_tool_replaces_it() {
        let set = ToolSet::new().data_to_chart("chart").data_to_chart("chart");
        assert_eq!(set.tools().len(), 1);
    }

    #[test]
    fn tool_kind_parses_from_wire_name() {
        assert_eq!("sql_exec".parse::<ToolKind>().unwrap(), ToolKind::SqlExec);
        assert_eq!(ToolKind::CortexAnalystTextToSql.to_string(), "cortex_analyst_text_to_sql");
    }
}
