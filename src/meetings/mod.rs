use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{domain::MeetingHandle, error::Result};

pub mod zoom;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use zoom::ZoomMeetingGateway;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeMeetingGateway;

/// What the provider needs to know about a session to host it. Derived
/// from a booking by the services; the gateway never sees domain types
/// beyond this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingContext {
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub agenda: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub handle: MeetingHandle,
    pub topic: String,
    pub start_time: Option<DateTime<Utc>>,
    pub status: String,
}

/// Capability interface over the video-conferencing provider. All calls
/// carry a per-call deadline; a deadline exceed surfaces as
/// `AppError::UpstreamTimeout` and the caller's transaction rolls back.
#[async_trait]
pub trait MeetingGateway: Send + Sync {
    async fn create(&self, context: &MeetingContext) -> Result<MeetingHandle>;
    async fn update(&self, handle: &MeetingHandle, context: &MeetingContext) -> Result<()>;
    async fn delete(&self, handle: &MeetingHandle) -> Result<()>;
    async fn get(&self, handle: &MeetingHandle) -> Result<MeetingInfo>;
    /// Verifies a provider-signed inbound event before any state change.
    fn verify_webhook(&self, payload: &str, timestamp: &str, signature: &str) -> Result<()>;
}
