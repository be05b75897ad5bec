use thiserror::Error;

/// Errors raised while loading or validating a menu listing.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("menu listing is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read menu file: {0}")]
    Io(#[from] std::io::Error),

    #[error("menu has no categories")]
    Empty,

    #[error("menu category {0} has no items")]
    EmptyCategory(String),

    #[error("menu item {item_id} has an invalid price: {price}")]
    InvalidPrice { item_id: String, price: f64 },

    #[error("menu item id {0} appears in more than one category")]
    DuplicateItem(String),
}

/// Domain errors from order mutations. These are reported back to the model,
/// never spoken to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Item {0} not found in menu")]
    UnknownItem(String),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}
