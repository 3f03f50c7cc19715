use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::{
    domain::MeetingHandle,
    error::{AppError, Result},
    meetings::{MeetingContext, MeetingGateway, MeetingInfo},
};

const TOKEN_URL: &str = "https://zoom.us/oauth/token";
const API_BASE: &str = "https://api.zoom.us/v2";

/// Refresh the cached token this long before it actually expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Server-to-server OAuth client for the Zoom meetings API. The access
/// token is a process-wide cached value; concurrent callers either see
/// the cached token or wait on the one in-flight refresh (the cache
/// mutex is held across the token exchange).
pub struct ZoomMeetingGateway {
    client: reqwest::Client,
    account_id: String,
    client_id: String,
    client_secret: String,
    webhook_secret: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct MeetingResponse {
    id: i64,
    join_url: String,
    start_url: String,
    password: Option<String>,
    topic: Option<String>,
    start_time: Option<DateTime<Utc>>,
    status: Option<String>,
}

impl ZoomMeetingGateway {
    pub fn new(
        account_id: String,
        client_id: String,
        client_secret: String,
        webhook_secret: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            account_id,
            client_id,
            client_secret,
            webhook_secret,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            let margin = chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
            if token.expires_at - margin > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        let basic = general_purpose::STANDARD.encode(credentials.as_bytes());

        let response = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", basic))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.account_id.as_str()),
            ])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::External(format!(
                "Meeting provider token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Invalid token response: {}", e)))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        });

        Ok(access_token)
    }

    fn meeting_body(context: &MeetingContext) -> serde_json::Value {
        serde_json::json!({
            "topic": context.topic,
            "type": 2,
            "start_time": context.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "duration": context.duration_minutes,
            "timezone": "UTC",
            "agenda": context.agenda,
            "settings": {
                "join_before_host": false,
                "waiting_room": true,
                "approval_type": 2,
            }
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::UpstreamTimeout(format!("Meeting provider call timed out: {}", e))
    } else {
        AppError::External(format!("Meeting provider error: {}", e))
    }
}

async fn error_from_response(response: reqwest::Response, action: &str) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::External(format!(
        "Meeting provider {} failed ({}): {}",
        action, status, body
    ))
}

#[async_trait]
impl MeetingGateway for ZoomMeetingGateway {
    async fn create(&self, context: &MeetingContext) -> Result<MeetingHandle> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}/users/me/meetings", API_BASE))
            .bearer_auth(token)
            .json(&Self::meeting_body(context))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "create").await);
        }

        let meeting: MeetingResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Invalid meeting response: {}", e)))?;

        Ok(MeetingHandle {
            id: meeting.id.to_string(),
            join_url: meeting.join_url,
            host_url: meeting.start_url,
            password: meeting.password,
        })
    }

    async fn update(&self, handle: &MeetingHandle, context: &MeetingContext) -> Result<()> {
        let token = self.access_token().await?;

        let response = self
            .client
            .patch(format!("{}/meetings/{}", API_BASE, handle.id))
            .bearer_auth(token)
            .json(&Self::meeting_body(context))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "update").await);
        }

        Ok(())
    }

    async fn delete(&self, handle: &MeetingHandle) -> Result<()> {
        let token = self.access_token().await?;

        let response = self
            .client
            .delete(format!("{}/meetings/{}", API_BASE, handle.id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        // Already-gone meetings count as deleted.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(error_from_response(response, "delete").await);
        }

        Ok(())
    }

    async fn get(&self, handle: &MeetingHandle) -> Result<MeetingInfo> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}/meetings/{}", API_BASE, handle.id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "get").await);
        }

        let meeting: MeetingResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Invalid meeting response: {}", e)))?;

        Ok(MeetingInfo {
            handle: MeetingHandle {
                id: meeting.id.to_string(),
                join_url: meeting.join_url,
                host_url: meeting.start_url,
                password: meeting.password,
            },
            topic: meeting.topic.unwrap_or_default(),
            start_time: meeting.start_time,
            status: meeting.status.unwrap_or_default(),
        })
    }

    fn verify_webhook(&self, payload: &str, timestamp: &str, signature: &str) -> Result<()> {
        type HmacSha256 = Hmac<Sha256>;

        let message = format!("v0:{}:{}", timestamp, payload);
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".to_string()))?;
        mac.update(message.as_bytes());
        let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

        if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}
