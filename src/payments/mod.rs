use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{domain::User, error::Result};

pub mod stripe_gateway;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use stripe_gateway::StripeGateway;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakePaymentGateway;

/// A confirm-in-one-step card charge. Redirect-requiring methods are
/// rejected by the gateway; the core never handles a second round-trip.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub customer_id: String,
    pub method_id: String,
    pub amount_cents: i64,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub charge_id: String,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub amount_cents: i64,
}

/// Cached display attributes of a tokenised card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub method_id: String,
    pub brand: String,
    pub last_four: String,
    pub exp_month: i64,
    pub exp_year: i64,
}

/// Decoded, signature-verified provider event. The charge metadata is
/// carried along so a payment whose original response was lost can still
/// be located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    ChargeSucceeded {
        charge_id: String,
        metadata: std::collections::BTreeMap<String, String>,
    },
    ChargeFailed {
        charge_id: String,
        metadata: std::collections::BTreeMap<String, String>,
    },
    Ignored,
}

/// Capability interface over the card-payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the provider customer id, creating the customer on first use.
    async fn get_or_create_customer(&self, user: &User) -> Result<String>;
    /// Attaches a tokenised payment method to the customer and returns its
    /// display attributes.
    async fn attach_payment_method(&self, customer_id: &str, method_token: &str)
        -> Result<CardDetails>;
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome>;
    async fn refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Result<RefundOutcome>;
    /// Verifies the webhook signature and decodes the event.
    fn verify_webhook(&self, payload: &str, signature: &str) -> Result<PaymentEvent>;
}
