use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Per-teacher write locks backing the booking non-overlap invariant.
/// The guard is held only across the in-transaction overlap re-check and
/// insert, never across a gateway call.
#[derive(Default)]
pub struct TeacherLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TeacherLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_teacher(&self, teacher_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(teacher_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Per-payment locks serializing the open-refund-count check.
#[derive(Default)]
pub struct PaymentLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl PaymentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_payment(&self, payment_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(payment_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
