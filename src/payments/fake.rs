//! In-memory payment gateway for tests. Charges succeed unless the
//! method token is one of the declined test tokens or a failure is
//! queued; refunds likewise.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::User,
    error::{AppError, Result},
    payments::{
        CardDetails, ChargeOutcome, ChargeRequest, PaymentEvent, PaymentGateway, RefundOutcome,
    },
};

#[derive(Debug, Clone)]
pub struct RecordedCharge {
    pub charge_id: String,
    pub customer_id: String,
    pub method_id: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct RecordedRefund {
    pub refund_id: String,
    pub charge_id: String,
    pub amount_cents: i64,
}

#[derive(Default)]
pub struct FakePaymentGateway {
    next_id: AtomicU64,
    fail_next_refund: AtomicBool,
    charges: Mutex<Vec<RecordedCharge>>,
    refunds: Mutex<Vec<RecordedRefund>>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_refund(&self) {
        self.fail_next_refund.store(true, Ordering::SeqCst);
    }

    pub fn charges(&self) -> Vec<RecordedCharge> {
        self.charges.lock().unwrap().clone()
    }

    pub fn refunds(&self) -> Vec<RecordedRefund> {
        self.refunds.lock().unwrap().clone()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn get_or_create_customer(&self, user: &User) -> Result<String> {
        if let Some(existing) = &user.provider_customer_id {
            return Ok(existing.clone());
        }
        Ok(format!("cus_fake_{}", self.next()))
    }

    async fn attach_payment_method(
        &self,
        _customer_id: &str,
        method_token: &str,
    ) -> Result<CardDetails> {
        Ok(CardDetails {
            method_id: method_token.to_string(),
            brand: "visa".to_string(),
            last_four: "4242".to_string(),
            exp_month: 12,
            exp_year: 2030,
        })
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome> {
        if request.method_id.contains("Declined") {
            return Err(AppError::Payment("Your card was declined".to_string()));
        }

        let charge_id = format!("pi_fake_{}", self.next());
        self.charges.lock().unwrap().push(RecordedCharge {
            charge_id: charge_id.clone(),
            customer_id: request.customer_id,
            method_id: request.method_id,
            amount_cents: request.amount_cents,
        });

        Ok(ChargeOutcome { charge_id })
    }

    async fn refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        _metadata: HashMap<String, String>,
    ) -> Result<RefundOutcome> {
        if self.fail_next_refund.swap(false, Ordering::SeqCst) {
            return Err(AppError::External(
                "payment provider refund unavailable".to_string(),
            ));
        }

        let refund_id = format!("re_fake_{}", self.next());
        self.refunds.lock().unwrap().push(RecordedRefund {
            refund_id: refund_id.clone(),
            charge_id: charge_id.to_string(),
            amount_cents,
        });

        Ok(RefundOutcome {
            refund_id,
            amount_cents,
        })
    }

    /// Fake webhook wire format: "<kind>:<charge_id>[:payment_id]"
    /// signed with the literal signature "valid".
    fn verify_webhook(&self, payload: &str, signature: &str) -> Result<PaymentEvent> {
        if signature != "valid" {
            return Err(AppError::Unauthorized);
        }

        let mut parts = payload.splitn(3, ':');
        let kind = parts.next().unwrap_or_default();
        let charge_id = parts.next().unwrap_or_default().to_string();
        let mut metadata = std::collections::BTreeMap::new();
        if let Some(payment_id) = parts.next() {
            metadata.insert("payment_id".to_string(), payment_id.to_string());
        }

        let event = match kind {
            "charge.succeeded" => PaymentEvent::ChargeSucceeded {
                charge_id,
                metadata,
            },
            "charge.failed" => PaymentEvent::ChargeFailed {
                charge_id,
                metadata,
            },
            _ => PaymentEvent::Ignored,
        };

        Ok(event)
    }
}
