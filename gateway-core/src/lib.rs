//! Shared domain types for the LLM gateway.
//!
//! Holds the pieces every other gateway crate needs a copy of: the
//! [`KeyInfo`]/[`UsageCounter`] data model (`§3`), the gateway-wide error
//! taxonomy (`§7`), and correlation-id plumbing used by both the HTTP and
//! realtime surfaces (`§6`).

pub mod correlation;
pub mod error;
pub mod key_info;
pub mod usage;

pub use correlation::CorrelationId;
pub use error::{GatewayError, GatewayErrorKind, LimitDetails};
pub use key_info::{KeyInfo, KeyKind, QuotaDescriptor};
pub use usage::UsageCounter;
