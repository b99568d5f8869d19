//! Payment confirmation.
//!
//! Gateways deliver notifications at least once and in any order. The
//! [`ConfirmationBuilder`] turns one verified [`PaymentResult`] into exactly
//! one membership change, or refuses it with a [`ConfirmError`] whose
//! `retry` flag tells the caller whether redelivery could help.
//!
//! [`PaymentResult`]: crate::order::PaymentResult

mod builder;
mod error;

pub use builder::{ConfirmationBuilder, ConfirmationResult};
pub use error::{ConfirmError, ConfirmErrorKind};
