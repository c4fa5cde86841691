use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use leadflow_core::AgentRole;
use serde_json::Value;

/// Read-only tools the conversational agent may call directly. Mutations
/// never run from this list.
pub const CONVERSATIONAL_TOOL_NAMES: &[&str] = &[
    "analyzePipeline",
    "getBoardMetrics",
    "searchDeals",
    "searchContacts",
    "listDealsByStage",
    "listStagnantDeals",
    "listOverdueDeals",
    "getDealDetails",
];

/// Mutating tools reserved for the executor role, invoked only after an
/// approved action.
pub const EXECUTOR_TOOL_NAMES: &[&str] = &[
    "moveDeal",
    "createDeal",
    "updateDeal",
    "markDealAsWon",
    "markDealAsLost",
    "assignDeal",
    "createTask",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolAccess {
    ReadOnly,
    Mutating,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn access(&self) -> ToolAccess;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    /// Tool names the given role is allowed to invoke. Registration does not
    /// grant access; the role allow-list does.
    pub fn names_for_role(&self, role: AgentRole) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .values()
            .filter(|tool| role_allows(role, tool.name(), tool.access()))
            .map(|tool| tool.name())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn is_allowed(&self, role: AgentRole, name: &str) -> bool {
        self.tools
            .get(name)
            .is_some_and(|tool| role_allows(role, tool.name(), tool.access()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn role_allows(role: AgentRole, name: &str, access: ToolAccess) -> bool {
    match role {
        AgentRole::Conversational => {
            access == ToolAccess::ReadOnly && CONVERSATIONAL_TOOL_NAMES.contains(&name)
        }
        AgentRole::Executor => EXECUTOR_TOOL_NAMES.contains(&name),
        // Background roles never touch CRM tools.
        AgentRole::Dna | AgentRole::Researcher | AgentRole::FollowUp => false,
    }
}
