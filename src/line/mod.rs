//! LINE Messaging API: webhook signatures, webhook event payloads, and the
//! reply / endpoint-registration calls.

pub mod client;
pub mod events;
pub mod signature;

pub use client::{LineClient, MessagingApi};
pub use events::{TextMessageEvent, WebhookBody};

pub const SIGNATURE_HEADER: &str = "X-Line-Signature";
