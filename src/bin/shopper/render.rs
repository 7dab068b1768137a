use shopchat::ChatMessage;
use shopchat::discount_percent;
use shopchat::types::{ActionMessage, ProductMessage};

use crate::wire::Incoming;

/// Terminal rendering of one message. Returns the action values offered by
/// the message so the prompt can accept a numbered choice.
pub fn render(message: &Incoming) -> (String, Vec<String>) {
    match message {
        Incoming::Known(ChatMessage::Text(text)) => (format!("bot> {}", text.content), Vec::new()),
        Incoming::Known(ChatMessage::Product(product)) => render_product(product),
        Incoming::Known(ChatMessage::Action(action)) => render_choice(action),
        Incoming::Known(ChatMessage::Image(image)) => {
            let caption = image.caption.as_deref().unwrap_or("image");
            (format!("bot> [{}] {}", caption, image.image_url), Vec::new())
        }
        Incoming::Unknown(raw) => {
            let kind = raw.get("type").and_then(|t| t.as_str()).unwrap_or("?");
            (format!("bot> [unsupported message type: {}]", kind), Vec::new())
        }
    }
}

fn render_product(product: &ProductMessage) -> (String, Vec<String>) {
    let mut lines = vec![format!("  ┌ {}", product.title)];

    let mut price = format!("  │ ${:.2}", product.price);
    if let Some(original) = product.original_price {
        price.push_str(&format!(" (was ${:.2}", original));
        if let Some(off) = discount_percent(product.price, original) {
            price.push_str(&format!(", {}% off", off));
        }
        price.push(')');
    }
    if let Some(rating) = product.rating {
        price.push_str(&format!("  ★ {:.1}", rating));
    }
    lines.push(price);

    lines.push(format!("  │ {}", product.description));
    let mut stock = String::new();
    if let Some(in_stock) = product.in_stock {
        stock.push_str(if in_stock { "In stock" } else { "Out of stock" });
    }
    if let Some(shipping) = &product.shipping {
        if !stock.is_empty() {
            stock.push_str(" · ");
        }
        stock.push_str(shipping);
    }
    if !stock.is_empty() {
        lines.push(format!("  │ {}", stock));
    }

    let mut values = Vec::with_capacity(product.actions.len());
    for action in &product.actions {
        values.push(action.value.clone());
        let link = action
            .url
            .as_deref()
            .map(|url| format!("  <{}>", url))
            .unwrap_or_default();
        lines.push(format!("  │ {}. {}{}", values.len(), action.label, link));
    }
    lines.push("  └".to_string());
    (lines.join("\n"), values)
}

fn render_choice(action: &ActionMessage) -> (String, Vec<String>) {
    let mut lines = vec![format!("bot> {}", action.question)];
    let mut values = Vec::with_capacity(action.options.len());
    for option in &action.options {
        values.push(option.value.clone());
        lines.push(format!("  {}. {}", values.len(), option.label));
    }
    (lines.join("\n"), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopchat::Catalog;

    #[test]
    fn product_shows_discount_and_actions() {
        let product = Catalog::builtin().first().unwrap().to_message();
        let (text, values) = render(&Incoming::Known(product));

        assert!(text.contains("Premium Wireless Headphones"));
        assert!(text.contains("$199.99 (was $249.99, 20% off)"));
        assert!(text.contains("1. Buy Now  </products/prod_headphones>"));
        assert_eq!(
            values,
            vec!["buy_prod_headphones", "cart_prod_headphones", "details_prod_headphones"]
        );
    }

    #[test]
    fn unknown_type_renders_placeholder() {
        let (text, values) = render(&Incoming::Unknown(json!({"type": "video"})));
        assert_eq!(text, "bot> [unsupported message type: video]");
        assert!(values.is_empty());
    }
}
