//! Named, reusable action sequences

use crate::actions::{execute_actions, Action};
use crate::environment::ActionEnvironment;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    id: String,
    actions: Vec<Action>,
}

impl Rule {
    pub fn new(id: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            id: id.into(),
            actions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Run the actions in order; the result is the last action's result
    pub fn execute(&self, env: &mut ActionEnvironment<'_>) -> Result<bool> {
        execute_actions(&self.actions, env)
    }
}
