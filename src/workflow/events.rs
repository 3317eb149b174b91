/*!
 * Workflow events: the append-only audit log of every translation request.
 *
 * Events are never mutated or deleted. Duration analytics read the
 * `status_change` events exclusively.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

use super::models::RequestStatus;

/// Kind of workflow event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChange,
    Assignment,
    Submission,
    Review,
    Approval,
    Rejection,
    Comment,
    DeadlineChange,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::StatusChange => "status_change",
            EventType::Assignment => "assignment",
            EventType::Submission => "submission",
            EventType::Review => "review",
            EventType::Approval => "approval",
            EventType::Rejection => "rejection",
            EventType::Comment => "comment",
            EventType::DeadlineChange => "deadline_change",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "status_change" => Ok(EventType::StatusChange),
            "assignment" => Ok(EventType::Assignment),
            "submission" => Ok(EventType::Submission),
            "review" => Ok(EventType::Review),
            "approval" => Ok(EventType::Approval),
            "rejection" => Ok(EventType::Rejection),
            "comment" => Ok(EventType::Comment),
            "deadline_change" => Ok(EventType::DeadlineChange),
            _ => Err(anyhow::anyhow!("Invalid event type: {}", s)),
        }
    }
}

/// Role of the actor behind an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    System,
    Scheduler,
    Manager,
    Translator,
    Reviewer,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActorRole::System => "system",
            ActorRole::Scheduler => "scheduler",
            ActorRole::Manager => "manager",
            ActorRole::Translator => "translator",
            ActorRole::Reviewer => "reviewer",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for ActorRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(ActorRole::System),
            "scheduler" => Ok(ActorRole::Scheduler),
            "manager" => Ok(ActorRole::Manager),
            "translator" => Ok(ActorRole::Translator),
            "reviewer" => Ok(ActorRole::Reviewer),
            _ => Err(anyhow::anyhow!("Invalid actor role: {}", s)),
        }
    }
}

/// Who performed an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// The engine itself
    pub fn system() -> Self {
        Self::new("system", "System", ActorRole::System)
    }

    /// The automatic assignment scheduler
    pub fn scheduler() -> Self {
        Self::new("scheduler", "Assignment Scheduler", ActorRole::Scheduler)
    }
}

/// Immutable audit record of one action on a translation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: String,
    pub request_id: String,
    pub event_type: EventType,
    pub actor: Actor,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

impl WorkflowEvent {
    /// Create an event with a fresh id
    pub fn new(
        request_id: &str,
        event_type: EventType,
        actor: &Actor,
        timestamp: DateTime<Utc>,
        details: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            event_type,
            actor: actor.clone(),
            timestamp,
            details,
        }
    }

    /// A status change; `old_status` is `None` for the creation event
    pub fn status_change(
        request_id: &str,
        old_status: Option<RequestStatus>,
        new_status: RequestStatus,
        actor: &Actor,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let details = json!({
            "oldStatus": old_status.map(|s| s.to_string()),
            "newStatus": new_status.to_string(),
        });
        Self::new(request_id, EventType::StatusChange, actor, timestamp, details)
    }

    /// New status carried by a `status_change` event
    pub fn new_status(&self) -> Option<RequestStatus> {
        if self.event_type != EventType::StatusChange {
            return None;
        }
        self.details
            .get("newStatus")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Previous status carried by a `status_change` event
    pub fn old_status(&self) -> Option<RequestStatus> {
        if self.event_type != EventType::StatusChange {
            return None;
        }
        self.details
            .get("oldStatus")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statusChange_shouldCarryOldAndNewStatus() {
        let event = WorkflowEvent::status_change(
            "req-1",
            Some(RequestStatus::Requested),
            RequestStatus::Assigned,
            &Actor::system(),
            Utc::now(),
        );

        assert_eq!(event.event_type, EventType::StatusChange);
        assert_eq!(event.details["oldStatus"], "requested");
        assert_eq!(event.details["newStatus"], "assigned");
        assert_eq!(event.old_status(), Some(RequestStatus::Requested));
        assert_eq!(event.new_status(), Some(RequestStatus::Assigned));
    }

    #[test]
    fn test_statusChange_creation_shouldHaveNullOldStatus() {
        let event = WorkflowEvent::status_change(
            "req-1",
            None,
            RequestStatus::Requested,
            &Actor::system(),
            Utc::now(),
        );

        assert!(event.details["oldStatus"].is_null());
        assert_eq!(event.old_status(), None);
    }

    #[test]
    fn test_newStatus_onCommentEvent_shouldBeNone() {
        let event = WorkflowEvent::new(
            "req-1",
            EventType::Comment,
            &Actor::system(),
            Utc::now(),
            json!({ "newStatus": "assigned" }),
        );
        assert_eq!(event.new_status(), None);
    }

    #[test]
    fn test_eventType_displayAndParse_shouldAgree() {
        for event_type in [
            EventType::StatusChange,
            EventType::Assignment,
            EventType::DeadlineChange,
        ] {
            let parsed: EventType = event_type.to_string().parse().unwrap();
            assert_eq!(parsed, event_type);
        }
    }
}
