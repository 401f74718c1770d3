use serde::{Deserialize, Serialize};

/// One product extracted from a detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoeRecord {
    /// URL the detail page finally loaded from
    pub url: String,

    /// Product title, empty if the page had none
    pub title: String,

    /// Current price as displayed, empty if the page had none
    pub price: String,

    /// Product description, empty if the page had none
    pub description: String,
}

impl ShoeRecord {
    /// Create a new record
    pub fn new(url: String, title: String, price: String, description: String) -> Self {
        Self {
            url,
            title,
            price,
            description,
        }
    }
}
