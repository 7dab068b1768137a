use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{ChatMessage, ProductAction, ProductMessage, message_id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    pub image_url: String,
    pub rating: f64,
    pub in_stock: bool,
    pub shipping: String,
    pub category: String,
}

impl Product {
    /// Project into a product card. Actions are always Buy Now, Add to Cart,
    /// View Details, in that order.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::Product(ProductMessage {
            id: message_id(),
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
            actions: vec![
                ProductAction {
                    label: "Buy Now".to_string(),
                    value: format!("buy_{}", self.id),
                    url: Some(format!("/products/{}", self.id)),
                },
                ProductAction {
                    label: "Add to Cart".to_string(),
                    value: format!("cart_{}", self.id),
                    url: None,
                },
                ProductAction {
                    label: "View Details".to_string(),
                    value: format!("details_{}", self.id),
                    url: Some(format!("/products/{}?view=details", self.id)),
                },
            ],
            rating: Some(self.rating),
            original_price: self.original_price,
            in_stock: Some(self.in_stock),
            shipping: Some(self.shipping.clone()),
        })
    }
}

/// Percentage saved against the original price, rounded to the nearest
/// whole number. `None` when there is no real markdown.
pub fn discount_percent(price: f64, original_price: f64) -> Option<u32> {
    if original_price <= 0.0 || price >= original_price {
        return None;
    }
    Some(((original_price - price) / original_price * 100.0).round() as u32)
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog {0} has no products")]
    Empty(PathBuf),
}

/// Read-only product table, built once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Load a replacement catalog from a JSON array of products.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let products: Vec<Product> =
            serde_json::from_reader(reader).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if products.is_empty() {
            return Err(CatalogError::Empty(path.to_path_buf()));
        }
        Ok(Self { products })
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            Product {
                id: "prod_headphones".to_string(),
                title: "Premium Wireless Headphones".to_string(),
                description: "Experience crystal clear sound with our latest noise-cancelling technology. Features 30-hour battery life and premium comfort.".to_string(),
                price: 199.99,
                original_price: Some(249.99),
                image_url: "https://placehold.co/400x300/6c5ce7/white?text=Premium+Headphones".to_string(),
                rating: 4.7,
                in_stock: true,
                shipping: "Free 2-day shipping".to_string(),
                category: "headphones".to_string(),
            },
            Product {
                id: "prod_earbuds".to_string(),
                title: "Wireless Earbuds Pro".to_string(),
                description: "Compact and comfortable wireless earbuds with great sound quality. Water resistant with 8-hour battery life.".to_string(),
                price: 79.99,
                original_price: Some(99.99),
                image_url: "https://placehold.co/400x300/1abc9c/white?text=Wireless+Earbuds".to_string(),
                rating: 4.5,
                in_stock: true,
                shipping: "Free shipping".to_string(),
                category: "headphones".to_string(),
            },
            Product {
                id: "prod_speaker".to_string(),
                title: "Portable Bluetooth Speaker".to_string(),
                description: "Powerful 360° sound with deep bass. Waterproof design for beach and pool parties. 20-hour battery life.".to_string(),
                price: 129.99,
                original_price: None,
                image_url: "https://placehold.co/400x300/e74c3c/white?text=Bluetooth+Speaker".to_string(),
                rating: 4.3,
                in_stock: true,
                shipping: "Free shipping".to_string(),
                category: "speakers".to_string(),
            },
            Product {
                id: "prod_watch".to_string(),
                title: "Smart Fitness Watch".to_string(),
                description: "Track your workouts, heart rate, and sleep patterns. Water resistant with 7-day battery life.".to_string(),
                price: 149.99,
                original_price: Some(179.99),
                image_url: "https://placehold.co/400x300/3498db/white?text=Smart+Watch".to_string(),
                rating: 4.6,
                in_stock: true,
                shipping: "Arrives tomorrow".to_string(),
                category: "accessories".to_string(),
            },
            Product {
                id: "prod_charger".to_string(),
                title: "Fast Charging Power Bank".to_string(),
                description: "20,000mAh capacity with fast charging support for all your devices. Charge up to 4 devices simultaneously.".to_string(),
                price: 49.99,
                original_price: None,
                image_url: "https://placehold.co/400x300/f39c12/white?text=Fast+Charger".to_string(),
                rating: 4.2,
                in_stock: true,
                shipping: "Free shipping".to_string(),
                category: "accessories".to_string(),
            },
        ])
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn first(&self) -> Option<&Product> {
        self.products.first()
    }

    pub fn nth(&self, index: usize) -> Option<&Product> {
        self.products.get(index)
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Products whose category matches exactly, in catalog order.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Product> {
        self.products.iter().filter(move |p| p.category == category)
    }

    /// Products with `min <= price < max`, in catalog order.
    pub fn priced_between(&self, min: f64, max: f64) -> impl Iterator<Item = &Product> {
        self.products
            .iter()
            .filter(move |p| p.price >= min && p.price < max)
    }
}
