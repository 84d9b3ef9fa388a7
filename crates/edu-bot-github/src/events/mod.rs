//! Webhook event taxonomy and typed payloads.
//!
//! The bot recognises a closed set of event names. Deliveries with any other
//! `X-GitHub-Event` value are refused before they reach a handler. Payloads
//! decode strictly: a recognised event whose body lacks a required field is a
//! decode error, not a partially filled struct.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auth::GitHubAppId;
use crate::error::ValidationError;

// ============================================================================
// Event names
// ============================================================================

/// Event names the bot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    Ping,
    PullRequest,
}

impl EventName {
    /// Every recognised event name.
    pub const ALL: [EventName; 2] = [EventName::Ping, EventName::PullRequest];

    /// Wire name as sent in `X-GitHub-Event`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "event".to_string(),
                message: format!("unrecognised event name '{}'", s),
            })
    }
}

/// Whether `name` is a recognised event name.
///
/// ```
/// use edu_bot_github::events::is_event_name;
///
/// assert!(is_event_name("ping"));
/// assert!(!is_event_name("Ping"));
/// assert!(!is_event_name("push"));
/// ```
pub fn is_event_name(name: &str) -> bool {
    name.parse::<EventName>().is_ok()
}

// ============================================================================
// Payloads
// ============================================================================

/// A decoded webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Ping(PingEvent),
    PullRequest(PullRequestEvent),
}

impl WebhookEvent {
    /// Decode `payload` as the event named `name`.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the payload does not match the event's shape.
    pub fn decode(name: EventName, payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        match name {
            EventName::Ping => Ok(Self::Ping(PingEvent::deserialize(payload)?)),
            EventName::PullRequest => Ok(Self::PullRequest(PullRequestEvent::deserialize(payload)?)),
        }
    }

    /// Name of this event.
    pub fn name(&self) -> EventName {
        match self {
            Self::Ping(_) => EventName::Ping,
            Self::PullRequest(_) => EventName::PullRequest,
        }
    }
}

/// Sent once when the webhook is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingEvent {
    #[serde(default)]
    pub zen: Option<String>,
    pub hook: PingHook,
}

/// Webhook configuration echoed by a ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingHook {
    pub app_id: GitHubAppId,
}

/// Pull request activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    pub number: u64,
    pub pull_request: PullRequestDetails,
    pub repository: EventRepository,
}

impl PullRequestEvent {
    /// Whether this delivery reports a merge.
    pub fn is_merge(&self) -> bool {
        self.action == PullRequestAction::Closed && self.pull_request.merged
    }
}

/// Actions that can occur on pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Assigned,
    Unassigned,
    ReviewRequested,
    ReviewRequestRemoved,
    Labeled,
    Unlabeled,
    Opened,
    Edited,
    Closed,
    Reopened,
    Synchronize,
    ReadyForReview,
    ConvertedToDraft,
}

impl fmt::Display for PullRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::ReviewRequested => "review_requested",
            Self::ReviewRequestRemoved => "review_request_removed",
            Self::Labeled => "labeled",
            Self::Unlabeled => "unlabeled",
            Self::Opened => "opened",
            Self::Edited => "edited",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
            Self::Synchronize => "synchronize",
            Self::ReadyForReview => "ready_for_review",
            Self::ConvertedToDraft => "converted_to_draft",
        };
        f.write_str(s)
    }
}

/// The part of a pull request the bot reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetails {
    pub merged: bool,
    pub user: EventUser,
}

/// Repository the event happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRepository {
    pub name: String,
    pub owner: EventUser,
}

impl EventRepository {
    /// `owner/name`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// A GitHub account as it appears in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUser {
    pub login: String,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
