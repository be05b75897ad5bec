//! The per-call order store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::Menu;
use crate::error::OrderError;
use crate::{format_price, round_cents};

/// Spoken when a summary is requested for an order with no lines.
pub const EMPTY_ORDER_MESSAGE: &str = "Your order is currently empty.";

/// One line of the cart. Lines are keyed by `(item_id, special_instructions)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: String,
    pub name: String,
    #[serde(rename = "price")]
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub special_instructions: String,
}

impl OrderLine {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Who the order is for and how it is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub customer_name: String,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default)]
    pub payment_method: String,
}

impl Default for CustomerDetails {
    fn default() -> Self {
        Self {
            customer_name: "Anonymous".to_string(),
            delivery_address: String::new(),
            payment_method: String::new(),
        }
    }
}

/// A point-in-time copy of the order, as handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(flatten)]
    pub customer: CustomerDetails,
    #[serde(rename = "items")]
    pub lines: Vec<OrderLine>,
    pub total: f64,
    #[serde(rename = "order_time")]
    pub timestamp: DateTime<Utc>,
}

impl Order {
    /// Total number of dishes across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// The mutable cart for one call.
///
/// Not synchronised: the connection handler that owns it is responsible for
/// single-writer access.
#[derive(Debug, Clone)]
pub struct OrderStore {
    menu: Arc<Menu>,
    lines: Vec<OrderLine>,
    customer: CustomerDetails,
}

impl OrderStore {
    pub fn new(menu: Arc<Menu>) -> Self {
        Self {
            menu,
            lines: Vec::new(),
            customer: CustomerDetails::default(),
        }
    }

    /// Adds `quantity` of a catalog item to the order.
    ///
    /// A line with the same item and the same special instructions is merged
    /// by summing quantities. Returns the resulting line.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::UnknownItem` if `item_id` is not on the menu and
    /// `OrderError::InvalidQuantity` for a zero quantity. The order is left
    /// untouched in both cases.
    pub fn add(
        &mut self,
        item_id: &str,
        quantity: u32,
        special_instructions: &str,
    ) -> Result<OrderLine, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity);
        }
        let item = self
            .menu
            .find(item_id)
            .ok_or_else(|| OrderError::UnknownItem(item_id.to_string()))?;

        let special_instructions = special_instructions.trim();
        if let Some(line) = self.lines.iter_mut().find(|line| {
            line.item_id == item_id && line.special_instructions == special_instructions
        }) {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(line.clone());
        }

        let line = OrderLine {
            item_id: item_id.to_string(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity,
            special_instructions: special_instructions.to_string(),
        };
        self.lines.push(line.clone());
        Ok(line)
    }

    /// Sum of `unit_price * quantity`, rounded to cents.
    pub fn total(&self) -> f64 {
        round_cents(self.lines.iter().map(OrderLine::subtotal).sum())
    }

    /// Human-readable order summary.
    pub fn summary(&self) -> String {
        if self.lines.is_empty() {
            return EMPTY_ORDER_MESSAGE.to_string();
        }

        let mut summary = String::from("Here's your current order:\n");
        for line in &self.lines {
            summary.push_str(&format!(
                "- {}x {} ({} each)\n",
                line.quantity,
                line.name,
                format_price(line.unit_price)
            ));
            if !line.special_instructions.is_empty() {
                summary.push_str(&format!(
                    "  Special instructions: {}\n",
                    line.special_instructions
                ));
            }
        }
        summary.push_str(&format!("\nTotal: {}", format_price(self.total())));
        summary
    }

    /// Removes every line. Customer details are kept.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn set_customer(&mut self, customer: CustomerDetails) {
        self.customer = customer;
    }

    pub fn customer(&self) -> &CustomerDetails {
        &self.customer
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Copies the current order for persistence, stamped with the current time.
    pub fn snapshot(&self) -> Order {
        Order {
            customer: self.customer.clone(),
            lines: self.lines.clone(),
            total: self.total(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> OrderStore {
        OrderStore::new(Arc::new(Menu::sample()))
    }

    #[test]
    fn identical_lines_merge() {
        let mut order = store();
        order.add("pad_thai", 1, "").unwrap();
        order.add("pad_thai", 2, "").unwrap();
        let line = order.add("pad_thai", 3, "").unwrap();

        assert_eq!(order.lines().len(), 1);
        assert_eq!(line.quantity, 6);
        assert_eq!(order.lines()[0].quantity, 6);
    }

    #[test]
    fn different_instructions_stay_separate() {
        let mut order = store();
        order.add("pad_thai", 1, "").unwrap();
        order.add("pad_thai", 1, "no peanuts").unwrap();
        order.add("pad_thai", 1, " no peanuts ").unwrap();

        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.lines()[1].special_instructions, "no peanuts");
        assert_eq!(order.lines()[1].quantity, 2);
    }

    #[test]
    fn unknown_item_leaves_order_untouched() {
        let mut order = store();
        order.add("wings", 1, "").unwrap();

        assert_eq!(
            order.add("pizza", 1, ""),
            Err(OrderError::UnknownItem("pizza".to_string()))
        );
        assert_eq!(order.add("wings", 0, ""), Err(OrderError::InvalidQuantity));
        assert_eq!(order.lines().len(), 1);
        assert_eq!(order.lines()[0].quantity, 1);
    }

    #[test]
    fn total_is_rounded_to_cents() {
        let mut order = store();
        order.add("pad_thai", 2, "").unwrap();
        assert_eq!(order.total(), 25.98);

        order.add("spring_rolls", 3, "").unwrap();
        assert_eq!(order.total(), 43.95);
    }

    #[test]
    fn summary_lists_lines_and_total() {
        let mut order = store();
        order.add("pad_thai", 2, "extra spicy").unwrap();
        order.add("ice_cream", 1, "").unwrap();

        assert_eq!(
            order.summary(),
            "Here's your current order:\n\
             - 2x Pad Thai ($12.99 each)\n  Special instructions: extra spicy\n\
             - 1x Ice Cream ($4.99 each)\n\
             \nTotal: $30.97"
        );
    }

    #[test]
    fn cleared_order_reports_empty() {
        let mut order = store();
        assert_eq!(order.summary(), EMPTY_ORDER_MESSAGE);

        order.add("curry", 1, "").unwrap();
        order.clear();
        order.clear();
        assert!(order.is_empty());
        assert_eq!(order.summary(), EMPTY_ORDER_MESSAGE);
    }

    #[test]
    fn snapshot_serializes_persistence_payload() {
        let mut order = store();
        order.add("pad_thai", 2, "").unwrap();
        order.set_customer(CustomerDetails {
            customer_name: "Sam".to_string(),
            delivery_address: String::new(),
            payment_method: "Cash".to_string(),
        });

        let snapshot = order.snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["customer_name"], "Sam");
        assert_eq!(json["payment_method"], "Cash");
        assert_eq!(json["items"][0]["item_id"], "pad_thai");
        assert_eq!(json["items"][0]["price"], 12.99);
        assert_eq!(json["items"][0]["quantity"], 2);
        assert!(json["order_time"].is_string());

        let decoded: Order = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.item_count(), 2);
        assert!((decoded.total - 25.98).abs() < 1e-9);
    }

    #[test]
    fn snapshot_defaults_to_anonymous_customer() {
        let snapshot = store().snapshot();
        assert_eq!(snapshot.customer.customer_name, "Anonymous");
        assert!(snapshot.lines.is_empty());
        assert_eq!(snapshot.total, 0.0);
    }
}
