//! Menu catalog.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MenuError;
use crate::format_price;

/// A single dish on the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

/// The restaurant catalog: `category -> item_id -> item`, in listing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Menu {
    categories: IndexMap<String, IndexMap<String, MenuItem>>,
}

impl Menu {
    /// Parses and validates a menu listing in its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `MenuError` if the JSON is malformed, a category is empty, a
    /// price is negative or not finite, or an item id is reused.
    pub fn from_json(listing: &str) -> Result<Self, MenuError> {
        let menu: Menu = serde_json::from_str(listing)?;
        menu.validate()?;
        Ok(menu)
    }

    /// Reads a menu listing from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MenuError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// The built-in sample menu used when no listing is configured.
    pub fn sample() -> Self {
        fn item(name: &str, price: f64, description: &str) -> MenuItem {
            MenuItem {
                name: name.to_string(),
                price,
                description: description.to_string(),
            }
        }

        let mut categories = IndexMap::new();
        categories.insert(
            "appetizers".to_string(),
            IndexMap::from([
                (
                    "spring_rolls".to_string(),
                    item(
                        "Spring Rolls",
                        5.99,
                        "Crispy vegetable spring rolls with sweet chili sauce",
                    ),
                ),
                (
                    "wings".to_string(),
                    item(
                        "Chicken Wings",
                        8.99,
                        "8 pieces of crispy wings with choice of sauce",
                    ),
                ),
            ]),
        );
        categories.insert(
            "main_courses".to_string(),
            IndexMap::from([
                (
                    "pad_thai".to_string(),
                    item(
                        "Pad Thai",
                        12.99,
                        "Stir-fried rice noodles with tofu, peanuts, and tamarind sauce",
                    ),
                ),
                (
                    "curry".to_string(),
                    item(
                        "Green Curry",
                        13.99,
                        "Coconut milk curry with vegetables and choice of protein",
                    ),
                ),
            ]),
        );
        categories.insert(
            "desserts".to_string(),
            IndexMap::from([
                (
                    "ice_cream".to_string(),
                    item("Ice Cream", 4.99, "Vanilla ice cream with chocolate sauce"),
                ),
                (
                    "cheesecake".to_string(),
                    item(
                        "Cheesecake",
                        6.99,
                        "New York style cheesecake with berry compote",
                    ),
                ),
            ]),
        );

        Self { categories }
    }

    fn validate(&self) -> Result<(), MenuError> {
        if self.categories.is_empty() {
            return Err(MenuError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for (category, items) in &self.categories {
            if items.is_empty() {
                return Err(MenuError::EmptyCategory(category.clone()));
            }
            for (item_id, item) in items {
                if !item.price.is_finite() || item.price < 0.0 {
                    return Err(MenuError::InvalidPrice {
                        item_id: item_id.clone(),
                        price: item.price,
                    });
                }
                if !seen.insert(item_id.as_str()) {
                    return Err(MenuError::DuplicateItem(item_id.clone()));
                }
            }
        }
        Ok(())
    }

    /// Looks up an item by id across all categories.
    pub fn find(&self, item_id: &str) -> Option<&MenuItem> {
        self.categories.values().find_map(|items| items.get(item_id))
    }

    /// Category keys in listing order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Number of dishes across all categories.
    pub fn item_count(&self) -> usize {
        self.categories.values().map(IndexMap::len).sum()
    }

    /// The listing as compact JSON, as embedded in the system prompt.
    pub fn to_json(&self) -> String {
        // Serializing string-keyed maps of plain structs cannot fail.
        serde_json::to_string(&self.categories).unwrap_or_default()
    }

    /// Renders the menu as plain text.
    ///
    /// With a known `category` only that category is rendered; a missing or
    /// unknown category renders every category instead of failing.
    pub fn render(&self, category: Option<&str>) -> String {
        let mut text = String::from("Here's our menu:\n\n");

        match category.and_then(|c| self.categories.get_key_value(c)) {
            Some((name, items)) => render_category(&mut text, name, items),
            None => {
                for (name, items) in &self.categories {
                    render_category(&mut text, name, items);
                    text.push('\n');
                }
            }
        }

        text
    }
}

fn render_category(text: &mut String, name: &str, items: &IndexMap<String, MenuItem>) {
    text.push_str(&title_case(name));
    text.push_str(":\n");
    for item in items.values() {
        text.push_str(&format!("- {}: {}\n", item.name, format_price(item.price)));
        if !item.description.is_empty() {
            text.push_str(&format!("  {}\n", item.description));
        }
    }
}

/// `main_courses` -> `Main Courses`.
fn title_case(key: &str) -> String {
    key.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
