use serde::Serialize;

/// Named goal a warning rule's target measures progress against.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct GoalType {
    pub id: i32,
    pub category: String,
    pub description: String,
}

/// Static rule configuration: a warning fires when the live metric for
/// `category` lies beyond `target` in the direction of `trigger_greater_than`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct WarningType {
    pub id: i32,
    pub category: String,
    pub description: String,
    pub trigger_greater_than: bool,
    pub target: f64,
    pub goal_type_id: Option<i32>,
}

impl WarningType {
    pub fn is_violated_by(&self, metric: f64) -> bool {
        if self.trigger_greater_than {
            metric > self.target
        } else {
            metric < self.target
        }
    }
}
