//! In-memory meeting gateway for tests: records every call and can be
//! told to fail the next operation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::MeetingHandle,
    error::{AppError, Result},
    meetings::{MeetingContext, MeetingGateway, MeetingInfo},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Create,
    Update(String),
    Delete(String),
    Get(String),
}

#[derive(Default)]
pub struct FakeMeetingGateway {
    next_id: AtomicU64,
    fail_next: AtomicBool,
    calls: Mutex<Vec<FakeCall>>,
}

impl FakeMeetingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, FakeCall::Create))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, FakeCall::Update(_)))
            .count()
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(AppError::External("meeting provider unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MeetingGateway for FakeMeetingGateway {
    async fn create(&self, _context: &MeetingContext) -> Result<MeetingHandle> {
        self.check_failure()?;
        self.calls.lock().unwrap().push(FakeCall::Create);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MeetingHandle {
            id: format!("fake-meeting-{}", id),
            join_url: format!("https://meet.example.com/j/{}", id),
            host_url: format!("https://meet.example.com/s/{}", id),
            password: Some("secret".to_string()),
        })
    }

    async fn update(&self, handle: &MeetingHandle, _context: &MeetingContext) -> Result<()> {
        self.check_failure()?;
        self.calls
            .lock()
            .unwrap()
            .push(FakeCall::Update(handle.id.clone()));
        Ok(())
    }

    async fn delete(&self, handle: &MeetingHandle) -> Result<()> {
        self.check_failure()?;
        self.calls
            .lock()
            .unwrap()
            .push(FakeCall::Delete(handle.id.clone()));
        Ok(())
    }

    async fn get(&self, handle: &MeetingHandle) -> Result<MeetingInfo> {
        self.check_failure()?;
        self.calls
            .lock()
            .unwrap()
            .push(FakeCall::Get(handle.id.clone()));
        Ok(MeetingInfo {
            handle: handle.clone(),
            topic: "fake".to_string(),
            start_time: None,
            status: "waiting".to_string(),
        })
    }

    fn verify_webhook(&self, _payload: &str, _timestamp: &str, signature: &str) -> Result<()> {
        if signature == "valid" {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }
}
