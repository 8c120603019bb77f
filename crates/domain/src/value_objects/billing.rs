pub const STRIPE_PROVIDER: &str = "stripe";

/// Prices the engine charges on its own initiative (subscriptions, notice fees).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    pub subscription_price_id: String,
    pub notice_fee_minor: i64,
    pub currency: String,
}
