// Invocation payloads
//
// One function serves both roles. A payload carrying `url` is a work item
// from a fanned-out dispatcher; anything else (timer trigger, manual test
// event) is a dispatcher tick.

use cdnlog_core::WorkItem;
use serde::Deserialize;

/// Timer trigger payload. Every field is optional; only logged.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TimerEvent {
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "TriggerName", default)]
    pub trigger_name: Option<String>,
    #[serde(rename = "Time", default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InvocationEvent {
    Work(WorkItem),
    Timer(TimerEvent),
    /// Non-object payloads (`null`, strings) from manual invocations
    Other(serde_json::Value),
}
