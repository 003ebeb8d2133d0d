//! Relay clients — typed access to the backend proxy, plus the call
//! lifecycle every relay request goes through.

pub mod call;
pub mod client;
pub mod types;

pub use call::{CallState, bounded};
pub use client::{
    ChatRelay, CheckoutRelay, HttpRelay, NotifyRelay, PaymentConfirmation, confirm_payment,
    notify_provisioning, spawn_best_effort, start_checkout,
};
pub use types::{
    ChatContext, ChatReply, ChatRequest, ChatStatus, CheckoutRedirect, CheckoutStatus,
    CreateCheckoutRequest, NotifyRequest, PlanTier,
};
