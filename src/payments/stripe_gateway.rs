use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    AttachPaymentMethod, Client, CreateCustomer, CreatePaymentIntent, CreateRefund, Currency,
    Customer, CustomerId, EventObject, EventType, PaymentIntent, PaymentIntentId,
    PaymentIntentStatus, PaymentMethod, PaymentMethodId, Refund, Webhook, WebhookError,
};

use crate::{
    domain::User,
    error::{AppError, Result},
    payments::{CardDetails, ChargeOutcome, ChargeRequest, PaymentEvent, PaymentGateway, RefundOutcome},
};

pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(api_key: String, webhook_secret: String) -> Self {
        let client = Client::new(api_key);
        Self {
            client,
            webhook_secret,
        }
    }
}

/// Translates well-known test card numbers to the provider's
/// pre-configured method tokens. Production traffic carries tokenised
/// method identifiers and never goes through this table.
pub fn test_card_token(card_number: &str) -> Option<&'static str> {
    match card_number {
        "4242424242424242" => Some("pm_card_visa"),
        "5555555555554444" => Some("pm_card_mastercard"),
        "378282246310005" => Some("pm_card_amex"),
        "4000000000000002" => Some("pm_card_chargeDeclined"),
        "4000000000009995" => Some("pm_card_chargeDeclinedInsufficientFunds"),
        _ => None,
    }
}

fn map_stripe_error(context: &str, e: stripe::StripeError) -> AppError {
    match e {
        stripe::StripeError::Stripe(ref request_error) => AppError::Payment(format!(
            "{}: {}",
            context,
            request_error
                .message
                .clone()
                .unwrap_or_else(|| "payment provider rejected the request".to_string())
        )),
        stripe::StripeError::Timeout => {
            AppError::UpstreamTimeout(format!("{}: payment provider timed out", context))
        }
        other => AppError::External(format!("{}: {}", context, other)),
    }
}

fn parse_customer_id(customer_id: &str) -> Result<CustomerId> {
    customer_id
        .parse::<CustomerId>()
        .map_err(|e| AppError::BadRequest(format!("Invalid customer id: {}", e)))
}

fn parse_method_id(method_id: &str) -> Result<PaymentMethodId> {
    method_id
        .parse::<PaymentMethodId>()
        .map_err(|e| AppError::BadRequest(format!("Invalid payment method id: {}", e)))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn get_or_create_customer(&self, user: &User) -> Result<String> {
        if let Some(existing) = &user.provider_customer_id {
            return Ok(existing.clone());
        }

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), user.id.to_string());

        let mut params = CreateCustomer::new();
        params.email = Some(&user.email);
        params.name = Some(&user.display_name);
        params.metadata = Some(metadata);

        let customer = Customer::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error("Customer creation failed", e))?;

        Ok(customer.id.to_string())
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        method_token: &str,
    ) -> Result<CardDetails> {
        let customer = parse_customer_id(customer_id)?;
        let method = parse_method_id(method_token)?;

        let attached = PaymentMethod::attach(
            &self.client,
            &method,
            AttachPaymentMethod { customer },
        )
        .await
        .map_err(|e| map_stripe_error("Payment method attach failed", e))?;

        let card = attached
            .card
            .ok_or_else(|| AppError::Payment("Only card payment methods are supported".to_string()))?;

        Ok(CardDetails {
            method_id: attached.id.to_string(),
            brand: card.brand,
            last_four: card.last4,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
        })
    }

    async fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome> {
        let customer = parse_customer_id(&request.customer_id)?;
        let method = parse_method_id(&request.method_id)?;

        let mut params = CreatePaymentIntent::new(request.amount_cents, Currency::USD);
        params.customer = Some(customer);
        params.payment_method = Some(method);
        params.description = Some(&request.description);
        params.metadata = Some(request.metadata.clone());
        params.payment_method_types = Some(vec!["card".to_string()]);
        params.confirm = Some(true);
        // Redirect-based methods would leave the intent in requires_action;
        // we only support one-step card confirmation, so fail them outright.
        params.error_on_requires_action = Some(true);

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error("Charge failed", e))?;

        match intent.status {
            PaymentIntentStatus::Succeeded | PaymentIntentStatus::Processing => {
                Ok(ChargeOutcome {
                    charge_id: intent.id.to_string(),
                })
            }
            status => Err(AppError::Payment(format!(
                "Charge not completed (status: {:?})",
                status
            ))),
        }
    }

    async fn refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        metadata: HashMap<String, String>,
    ) -> Result<RefundOutcome> {
        let intent_id = charge_id
            .parse::<PaymentIntentId>()
            .map_err(|e| AppError::BadRequest(format!("Invalid charge id: {}", e)))?;

        let mut params = CreateRefund::new();
        params.payment_intent = Some(intent_id);
        params.amount = Some(amount_cents);
        params.metadata = Some(metadata);

        let refund = Refund::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error("Refund failed", e))?;

        Ok(RefundOutcome {
            refund_id: refund.id.to_string(),
            amount_cents: refund.amount,
        })
    }

    fn verify_webhook(&self, payload: &str, signature: &str) -> Result<PaymentEvent> {
        let event = Webhook::construct_event(payload, signature, &self.webhook_secret).map_err(
            |e| match e {
                WebhookError::BadSignature => AppError::Unauthorized,
                other => AppError::External(format!("Webhook error: {}", other)),
            },
        )?;

        let decoded = match event.type_ {
            EventType::PaymentIntentSucceeded => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    PaymentEvent::ChargeSucceeded {
                        charge_id: intent.id.to_string(),
                        metadata: intent.metadata.into_iter().collect(),
                    }
                } else {
                    PaymentEvent::Ignored
                }
            }
            EventType::PaymentIntentPaymentFailed => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    PaymentEvent::ChargeFailed {
                        charge_id: intent.id.to_string(),
                        metadata: intent.metadata.into_iter().collect(),
                    }
                } else {
                    PaymentEvent::Ignored
                }
            }
            _ => {
                tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
                PaymentEvent::Ignored
            }
        };

        Ok(decoded)
    }
}
