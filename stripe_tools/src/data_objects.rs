use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_CHECKOUT_ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";

//-----------------------------------------  CheckoutSession  ---------------------------------------------------------
/// The subset of a Stripe checkout session the gateway cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Total in minor currency units, as Stripe reports it.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub payment_intent: Option<PaymentIntentRef>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

/// `payment_intent` arrives as a bare id string, or as the expanded object when the retrieval asked for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentIntentRef {
    Object(PaymentIntent),
    Id(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl CheckoutSession {
    /// The "any signal is sufficient" paid check. Providers surface completion differently depending on payment
    /// method timing, so a session counts as paid when any of the three flags says so.
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid") ||
            self.status.as_deref() == Some("complete") ||
            self.payment_intent_status() == Some("succeeded")
    }

    pub fn payment_intent_id(&self) -> Option<String> {
        match &self.payment_intent {
            Some(PaymentIntentRef::Id(id)) => Some(id.clone()),
            Some(PaymentIntentRef::Object(pi)) => Some(pi.id.clone()),
            None => None,
        }
    }

    pub fn payment_intent_status(&self) -> Option<&str> {
        match &self.payment_intent {
            Some(PaymentIntentRef::Object(pi)) => pi.status.as_deref(),
            _ => None,
        }
    }

    /// The best human-readable status string we can produce for receipts and retry responses.
    pub fn status_label(&self) -> String {
        self.payment_status
            .clone()
            .or_else(|| self.status.clone())
            .or_else(|| self.payment_intent_status().map(|s| format!("pi:{s}")))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// A metadata value, with empty strings treated as absent (Stripe stores cleared keys as `""`).
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }
}

//----------------------------------------------  Event  --------------------------------------------------------------
/// A webhook event envelope. `data.object` stays opaque until the caller knows the event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl Event {
    /// Interpret the event payload as a checkout session. Only meaningful for `checkout.session.*` events.
    pub fn checkout_session(&self) -> Result<CheckoutSession, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

//-----------------------------------------  NewCheckoutSession  ------------------------------------------------------
/// Parameters for creating a one-item payment session. Serialized into Stripe's form-encoded bracket syntax.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
    /// Unit amount in minor currency units.
    pub unit_amount: i64,
    pub product_name: String,
    pub quantity: u32,
    pub metadata: Vec<(String, String)>,
}

impl NewCheckoutSession {
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            ("line_items[0][quantity]".to_string(), self.quantity.max(1).to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.to_lowercase()),
            ("line_items[0][price_data][unit_amount]".to_string(), self.unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), self.product_name.clone()),
        ];
        for (key, value) in &self.metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }
        params
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn or_policy_paid_detection() {
        let mut session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "unpaid",
            "status": "open",
        }))
        .unwrap();
        assert!(!session.is_paid());

        // An "unpaid" session with a succeeded payment intent still counts as paid.
        session.payment_intent = Some(PaymentIntentRef::Object(PaymentIntent {
            id: "pi_1".to_string(),
            status: Some("succeeded".to_string()),
        }));
        assert!(session.is_paid());

        let by_payment_status: CheckoutSession =
            serde_json::from_value(serde_json::json!({"id": "cs_2", "payment_status": "paid"})).unwrap();
        assert!(by_payment_status.is_paid());

        let by_status: CheckoutSession =
            serde_json::from_value(serde_json::json!({"id": "cs_3", "status": "complete"})).unwrap();
        assert!(by_status.is_paid());
    }

    #[test]
    fn payment_intent_deserializes_from_id_or_object() {
        let bare: CheckoutSession =
            serde_json::from_value(serde_json::json!({"id": "cs", "payment_intent": "pi_raw"})).unwrap();
        assert_eq!(bare.payment_intent_id().as_deref(), Some("pi_raw"));
        assert_eq!(bare.payment_intent_status(), None);

        let expanded: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs",
            "payment_intent": {"id": "pi_obj", "status": "succeeded"}
        }))
        .unwrap();
        assert_eq!(expanded.payment_intent_id().as_deref(), Some("pi_obj"));
        assert_eq!(expanded.payment_intent_status(), Some("succeeded"));
    }

    #[test]
    fn status_label_prefers_payment_status() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs",
            "payment_status": "unpaid",
            "status": "open",
        }))
        .unwrap();
        assert_eq!(session.status_label(), "unpaid");

        let bare: CheckoutSession = serde_json::from_value(serde_json::json!({"id": "cs"})).unwrap();
        assert_eq!(bare.status_label(), "unknown");
    }

    #[test]
    fn empty_metadata_values_count_as_absent() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs",
            "metadata": {"product_id": "42", "device_id": ""}
        }))
        .unwrap();
        assert_eq!(session.metadata_value("product_id"), Some("42"));
        assert_eq!(session.metadata_value("device_id"), None);
        assert_eq!(session.metadata_value("missing"), None);
    }

    #[test]
    fn form_params_use_bracket_syntax() {
        let session = NewCheckoutSession {
            success_url: "https://x/success".into(),
            cancel_url: "https://x/cancel".into(),
            currency: "EUR".into(),
            unit_amount: 1999,
            product_name: "Vintage lamp".into(),
            quantity: 0,
            metadata: vec![("product_id".into(), "42".into())],
        };
        let params = session.form_params();
        assert!(params.contains(&("line_items[0][price_data][currency]".to_string(), "eur".to_string())));
        assert!(params.contains(&("line_items[0][quantity]".to_string(), "1".to_string())));
        assert!(params.contains(&("metadata[product_id]".to_string(), "42".to_string())));
    }
}
