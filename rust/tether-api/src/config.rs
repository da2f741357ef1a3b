use serde::{Deserialize, Serialize};
use tether_schema::GuardConfig;

/// Settings of an [crate::Api]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Budgets every extend query must stay within. Extend queries are only
    /// checked against their output descriptor when unset.
    pub guard: Option<GuardConfig>,
}

impl ApiConfig {
    /// Bound extend queries with `guard`
    pub fn with_guard(mut self, guard: GuardConfig) -> Self {
        self.guard = Some(guard);
        self
    }
}
