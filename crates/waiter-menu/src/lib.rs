//! Restaurant catalog and per-call order store.
//!
//! The [`Menu`] is the immutable catalog loaded at start-up; the
//! [`OrderStore`] is the mutable cart owned by one call. Prices are kept as
//! dollars in `f64` to match the menu listing format and the persistence
//! payload; totals are rounded to cents.

pub mod catalog;
pub mod error;
pub mod order;

pub use catalog::{Menu, MenuItem};
pub use error::{MenuError, OrderError};
pub use order::{CustomerDetails, Order, OrderLine, OrderStore, EMPTY_ORDER_MESSAGE};

/// Formats a dollar amount the way it is read to callers (`$12.99`).
pub fn format_price(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Rounds a dollar amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
