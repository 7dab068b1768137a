pub mod action;
pub mod brain;
pub mod catalog;
pub mod config;
pub mod error;
pub mod face;
pub mod gate;
pub mod types;

pub use action::{Action, IdParsing, PriceBucket};
pub use brain::{Brain, Dice, ThreadDice, classify};
pub use catalog::{Catalog, CatalogError, Product, discount_percent};
pub use config::Config;
pub use types::{ChatMessage, ChatReply, ChatRequest};
