use std::sync::Arc;

use tracing::debug;

use crate::action::{Action, IdParsing, PriceBucket};
use crate::catalog::{Catalog, Product};
use crate::types::{ActionOption, ChatMessage, ChatRequest};

/// Products shown per category or price reply.
pub const MAX_PRODUCTS_PER_REPLY: usize = 3;

const GREETINGS: [&str; 6] = [
    "Hello! How can I help you today?",
    "Hi there! What can I do for you?",
    "Good day! Do you need any assistance?",
    "Hey! Feel free to ask me anything.",
    "Welcome! How's your day going?",
    "Hi! I'm here if you need any support.",
];

/// Source of randomness for the few replies that are not deterministic.
pub trait Dice {
    /// Uniform index in `0..sides`. `sides` is never zero.
    fn roll(&mut self, sides: usize) -> usize;
}

/// `Dice` backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDice;

impl Dice for ThreadDice {
    fn roll(&mut self, sides: usize) -> usize {
        rand::random_range(0..sides)
    }
}

/// Stateless responder: every turn is a function of the request and the
/// catalog alone.
#[derive(Debug, Clone)]
pub struct Brain {
    catalog: Arc<Catalog>,
    ids: IdParsing,
}

impl Brain {
    pub fn new(catalog: Arc<Catalog>, ids: IdParsing) -> Self {
        Self { catalog, ids }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Opening sequence: greeting, category prompt, best-seller lead-in and
    /// the first catalog product.
    pub fn welcome(&self) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::text(
                "Welcome to our store! I'm here to help you find the perfect product.",
            ),
            category_prompt("What are you looking for today?"),
        ];
        if let Some(best_seller) = self.catalog.first() {
            messages.push(ChatMessage::text("Here's one of our best sellers:"));
            messages.push(best_seller.to_message());
        }
        messages
    }

    /// One of the canned greetings.
    pub fn greeting(&self, dice: &mut impl Dice) -> &'static str {
        GREETINGS[dice.roll(GREETINGS.len())]
    }

    /// Answer one turn. An action wins over free text; with neither present
    /// the generic help reply is returned.
    pub fn respond(&self, request: &ChatRequest, dice: &mut impl Dice) -> Vec<ChatMessage> {
        if let Some(raw) = request.action_str() {
            let action = Action::parse(raw, self.ids);
            debug!(raw, ?action, "Dispatching action");
            return self.act(&action, dice);
        }

        if let Some(text) = request.message_str() {
            return match classify(text) {
                Some(action) => {
                    debug!(?action, "Free text matched a keyword");
                    self.act(&action, dice)
                }
                None => echo(text),
            };
        }

        help()
    }

    pub fn act(&self, action: &Action, dice: &mut impl Dice) -> Vec<ChatMessage> {
        match action {
            Action::ShowPriceRanges => vec![
                ChatMessage::text("What's your budget?"),
                ChatMessage::choice(
                    "Price range:",
                    vec![
                        ActionOption::new(
                            "Under $100",
                            Action::PriceRange(PriceBucket::Under100).as_wire(),
                        ),
                        ActionOption::new(
                            "$100 - $200",
                            Action::PriceRange(PriceBucket::From100To200).as_wire(),
                        ),
                        ActionOption::new(
                            "Over $200",
                            Action::PriceRange(PriceBucket::Over200).as_wire(),
                        ),
                    ],
                ),
            ],
            Action::Category(category) => showcase(
                format!("Here are our best {}:", category),
                self.catalog.in_category(category),
            )
            .unwrap_or_else(|| {
                vec![ChatMessage::text(format!(
                    "Sorry, we couldn't find any products in the {} category.",
                    category
                ))]
            }),
            Action::PriceRange(bucket) => {
                let (min, max) = bucket.bounds();
                showcase(
                    format!("Here are our products {}:", bucket.describe()),
                    self.catalog.priced_between(min, max),
                )
                .unwrap_or_else(|| {
                    vec![ChatMessage::text(
                        "Sorry, we couldn't find any products in this price range.",
                    )]
                })
            }
            Action::Buy(id) => match self.catalog.get(id) {
                Some(product) => purchase(product),
                None => missing_product(),
            },
            Action::Cart(id) => match self.catalog.get(id) {
                Some(product) => added_to_cart(product),
                None => missing_product(),
            },
            Action::ShowCategories => vec![
                ChatMessage::text("Here are our product categories:"),
                category_prompt("What are you interested in?"),
            ],
            Action::Featured => match self.catalog.nth(dice.roll(self.catalog.len().max(1))) {
                Some(product) => vec![
                    ChatMessage::text("Check out this featured product:"),
                    product.to_message(),
                ],
                None => help(),
            },
            Action::Unrecognized(_) => help(),
        }
    }
}

/// Map free text onto an action by keyword, first match wins.
pub fn classify(text: &str) -> Option<Action> {
    let text = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["headphone", "earphone", "earbuds"]) {
        Some(Action::Category("headphones".to_string()))
    } else if has(&["speaker"]) {
        Some(Action::Category("speakers".to_string()))
    } else if has(&["accessory", "accessories"]) {
        Some(Action::Category("accessories".to_string()))
    } else if has(&["cheap", "affordable", "budget"]) {
        Some(Action::PriceRange(PriceBucket::Under100))
    } else if has(&["premium", "high end", "expensive"]) {
        Some(Action::PriceRange(PriceBucket::Over200))
    } else {
        None
    }
}

/// Intro text plus up to three product cards, or `None` when nothing matched.
fn showcase<'a>(
    intro: String,
    products: impl Iterator<Item = &'a Product>,
) -> Option<Vec<ChatMessage>> {
    let cards: Vec<ChatMessage> = products
        .take(MAX_PRODUCTS_PER_REPLY)
        .map(Product::to_message)
        .collect();
    if cards.is_empty() {
        return None;
    }
    let mut messages = Vec::with_capacity(cards.len() + 1);
    messages.push(ChatMessage::text(intro));
    messages.extend(cards);
    Some(messages)
}

fn category_prompt(question: &str) -> ChatMessage {
    ChatMessage::choice(
        question,
        ["headphones", "speakers", "accessories"]
            .into_iter()
            .map(|name| {
                let mut label = name.to_string();
                label[..1].make_ascii_uppercase();
                ActionOption::new(label, Action::Category(name.to_string()).as_wire())
            })
            .collect(),
    )
}

fn purchase(product: &Product) -> Vec<ChatMessage> {
    vec![
        ChatMessage::text(format!(
            "Great choice! You're about to purchase the {}.",
            product.title
        )),
        ChatMessage::choice(
            "Would you like to add extended warranty?",
            vec![
                ActionOption::new("Yes, add warranty", format!("warranty_{}", product.id)),
                ActionOption::new("No, thanks", format!("checkout_{}", product.id)),
            ],
        ),
    ]
}

fn added_to_cart(product: &Product) -> Vec<ChatMessage> {
    vec![
        ChatMessage::text(format!("{} has been added to your cart!", product.title)),
        ChatMessage::choice(
            "What would you like to do next?",
            vec![
                ActionOption::new("Checkout", "view_cart"),
                ActionOption::new("Continue Shopping", Action::ShowCategories.as_wire()),
            ],
        ),
    ]
}

fn missing_product() -> Vec<ChatMessage> {
    vec![ChatMessage::text("Sorry, we couldn't find that product.")]
}

fn help() -> Vec<ChatMessage> {
    vec![
        ChatMessage::text("I'm here to help! What would you like to know?"),
        ChatMessage::choice(
            "Would you like to:",
            vec![
                ActionOption::new("Browse Products", Action::ShowCategories.as_wire()),
                ActionOption::new("See Featured Items", Action::Featured.as_wire()),
                ActionOption::new("Shop by Price", Action::ShowPriceRanges.as_wire()),
            ],
        ),
    ]
}

fn echo(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::text(format!(
            "I received your message: \"{}\". How can I help you further?",
            escape_html(text)
        )),
        ChatMessage::choice(
            "Would you like to:",
            vec![
                ActionOption::new("Browse Products", Action::ShowCategories.as_wire()),
                ActionOption::new("Shop by Price", Action::ShowPriceRanges.as_wire()),
                ActionOption::new("See Featured Items", Action::Featured.as_wire()),
            ],
        ),
    ]
}

// Text content is rendered as an HTML fragment by the widget.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionMessage, ProductMessage, TextMessage};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct Fixed(usize);

    impl Dice for Fixed {
        fn roll(&mut self, sides: usize) -> usize {
            self.0 % sides
        }
    }

    fn brain() -> Brain {
        Brain::new(Arc::new(Catalog::builtin()), IdParsing::Exact)
    }

    fn ask(brain: &Brain, action: &str) -> Vec<ChatMessage> {
        brain.respond(&ChatRequest::action(action), &mut Fixed(0))
    }

    fn text(msg: &ChatMessage) -> &TextMessage {
        match msg {
            ChatMessage::Text(t) => t,
            other => panic!("expected text, got {}", other.kind()),
        }
    }

    fn choice(msg: &ChatMessage) -> &ActionMessage {
        match msg {
            ChatMessage::Action(a) => a,
            other => panic!("expected action, got {}", other.kind()),
        }
    }

    fn cards(messages: &[ChatMessage]) -> Vec<&ProductMessage> {
        messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::Product(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn option_values(msg: &ChatMessage) -> Vec<&str> {
        choice(msg).options.iter().map(|o| o.value.as_str()).collect()
    }

    /// Shape of a reply, ignoring ids.
    fn kinds(messages: &[ChatMessage]) -> Vec<&'static str> {
        messages.iter().map(ChatMessage::kind).collect()
    }

    #[rstest]
    #[case("headphones")]
    #[case("speakers")]
    #[case("accessories")]
    fn category_reply_lists_only_that_category(#[case] category: &str) {
        let brain = brain();
        let in_category: Vec<&Product> = brain.catalog().in_category(category).collect();
        let reply = ask(&brain, &format!("category_{}", category));

        assert_eq!(reply.len(), 1 + in_category.len().min(MAX_PRODUCTS_PER_REPLY));
        assert_eq!(
            text(&reply[0]).content,
            format!("Here are our best {}:", category)
        );
        for card in cards(&reply) {
            assert!(in_category.iter().any(|p| p.title == card.title));
        }
    }

    #[test]
    fn category_reply_is_capped_at_three() {
        let mut products: Vec<Product> = Catalog::builtin().iter().cloned().collect();
        for p in &mut products {
            p.category = "audio".to_string();
        }
        let brain = Brain::new(Arc::new(Catalog::new(products)), IdParsing::Exact);

        let reply = ask(&brain, "category_audio");
        assert_eq!(reply.len(), 4);
        let titles: Vec<&str> = cards(&reply).iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Premium Wireless Headphones",
                "Wireless Earbuds Pro",
                "Portable Bluetooth Speaker"
            ]
        );
    }

    #[rstest]
    #[case("category_laptops")]
    #[case("category_")]
    fn empty_category_is_a_single_apology(#[case] action: &str) {
        let reply = ask(&brain(), action);
        assert_eq!(reply.len(), 1);
        assert!(text(&reply[0]).content.starts_with("Sorry"));
    }

    #[rstest]
    #[case("price_under_100", PriceBucket::Under100, "under $100")]
    #[case("price_100_200", PriceBucket::From100To200, "between $100 and $200")]
    fn price_reply_respects_bucket(
        #[case] action: &str,
        #[case] bucket: PriceBucket,
        #[case] described: &str,
    ) {
        let reply = ask(&brain(), action);
        assert_eq!(
            text(&reply[0]).content,
            format!("Here are our products {}:", described)
        );
        let found = cards(&reply);
        assert!(!found.is_empty());
        for card in found {
            assert!(bucket.contains(card.price), "{} out of bucket", card.price);
        }
    }

    #[test]
    fn nothing_over_two_hundred_in_the_builtin_catalog() {
        let reply = ask(&brain(), "price_over_200");
        assert_eq!(reply.len(), 1);
        assert_eq!(
            text(&reply[0]).content,
            "Sorry, we couldn't find any products in this price range."
        );
    }

    #[test]
    fn over_two_hundred_bucket_includes_boundary() {
        let mut pricey = Catalog::builtin().first().unwrap().clone();
        pricey.price = 200.0;
        let brain = Brain::new(Arc::new(Catalog::new(vec![pricey])), IdParsing::Exact);

        let reply = ask(&brain, "price_over_200");
        assert_eq!(reply.len(), 2);
        assert!(cards(&reply).iter().all(|c| c.price >= 200.0));
    }

    #[test]
    fn unknown_price_suffix_shows_everything() {
        let reply = ask(&brain(), "price_whatever");
        assert_eq!(text(&reply[0]).content, "Here are our products at any price:");
        assert_eq!(cards(&reply).len(), MAX_PRODUCTS_PER_REPLY);
    }

    #[test]
    fn buy_offers_warranty() {
        let reply = ask(&brain(), "buy_prod_headphones");
        assert_eq!(reply.len(), 2);
        assert!(text(&reply[0]).content.contains("Premium Wireless Headphones"));
        assert_eq!(
            option_values(&reply[1]),
            vec!["warranty_prod_headphones", "checkout_prod_headphones"]
        );
    }

    #[test]
    fn cart_offers_checkout_or_browsing() {
        let reply = ask(&brain(), "cart_prod_earbuds");
        assert_eq!(reply.len(), 2);
        assert_eq!(
            text(&reply[0]).content,
            "Wireless Earbuds Pro has been added to your cart!"
        );
        assert_eq!(option_values(&reply[1]), vec!["view_cart", "show_categories"]);
    }

    #[rstest]
    #[case("buy_prod_nothing")]
    #[case("cart_")]
    fn unknown_product_is_an_apology(#[case] action: &str) {
        let reply = ask(&brain(), action);
        assert_eq!(reply.len(), 1);
        assert_eq!(text(&reply[0]).content, "Sorry, we couldn't find that product.");
    }

    #[test]
    fn first_token_parsing_cannot_reach_underscored_ids() {
        let brain = Brain::new(Arc::new(Catalog::builtin()), IdParsing::FirstToken);
        let reply = ask(&brain, "buy_prod_headphones");
        assert_eq!(reply.len(), 1);
        assert_eq!(text(&reply[0]).content, "Sorry, we couldn't find that product.");
    }

    #[rstest]
    #[case("show_categories")]
    #[case("show_products")]
    fn browse_prompt_lists_categories(#[case] action: &str) {
        let reply = ask(&brain(), action);
        assert_eq!(kinds(&reply), vec!["text", "action"]);
        assert_eq!(
            option_values(&reply[1]),
            vec!["category_headphones", "category_speakers", "category_accessories"]
        );
        let labels: Vec<&str> = choice(&reply[1]).options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Headphones", "Speakers", "Accessories"]);
    }

    #[test]
    fn price_ranges_prompt_has_three_buckets() {
        let reply = ask(&brain(), "show_price_ranges");
        assert_eq!(kinds(&reply), vec!["text", "action"]);
        assert_eq!(
            option_values(&reply[1]),
            vec!["price_under_100", "price_100_200", "price_over_200"]
        );
    }

    #[test]
    fn featured_uses_the_dice() {
        let brain = brain();
        for index in 0..brain.catalog().len() {
            let reply = brain.respond(&ChatRequest::action("featured_products"), &mut Fixed(index));
            assert_eq!(kinds(&reply), vec!["text", "product"]);
            assert_eq!(
                cards(&reply)[0].title,
                brain.catalog().nth(index).unwrap().title
            );
        }
    }

    #[rstest]
    #[case(ChatRequest::action("details_prod_watch"))]
    #[case(ChatRequest::action("view_cart"))]
    #[case(ChatRequest::default())]
    #[case(ChatRequest { action: Some(String::new()), message: None })]
    fn unmatched_turns_get_the_help_menu(#[case] request: ChatRequest) {
        let reply = brain().respond(&request, &mut Fixed(0));
        assert_eq!(kinds(&reply), vec!["text", "action"]);
        assert_eq!(
            option_values(&reply[1]),
            vec!["show_categories", "featured_products", "show_price_ranges"]
        );
    }

    #[test]
    fn action_takes_priority_over_message() {
        let request = ChatRequest {
            action: Some("show_categories".into()),
            message: Some("cheap stuff".into()),
        };
        let reply = brain().respond(&request, &mut Fixed(0));
        assert_eq!(text(&reply[0]).content, "Here are our product categories:");
    }

    #[rstest]
    #[case("Do you sell HEADPHONES?", Some(Action::Category("headphones".into())))]
    #[case("earbuds please", Some(Action::Category("headphones".into())))]
    #[case("a speaker for the beach", Some(Action::Category("speakers".into())))]
    #[case("any accessories?", Some(Action::Category("accessories".into())))]
    #[case("I want something cheap", Some(Action::PriceRange(PriceBucket::Under100)))]
    #[case("show me high end gear", Some(Action::PriceRange(PriceBucket::Over200)))]
    #[case("cheap headphones", Some(Action::Category("headphones".into())))]
    #[case("what's the weather", None)]
    fn keyword_classifier(#[case] input: &str, #[case] expected: Option<Action>) {
        assert_eq!(classify(input), expected);
    }

    #[test]
    fn free_text_routes_like_the_matching_action() {
        let brain = brain();
        let by_text = brain.respond(&ChatRequest::message("I want something cheap"), &mut Fixed(0));
        let by_action = ask(&brain, "price_under_100");

        assert_eq!(kinds(&by_text), kinds(&by_action));
        assert_eq!(text(&by_text[0]).content, text(&by_action[0]).content);
        let titles = |m: &[ChatMessage]| -> Vec<String> {
            cards(m).iter().map(|c| c.title.clone()).collect()
        };
        assert_eq!(titles(&by_text), titles(&by_action));
    }

    #[test]
    fn unmatched_free_text_is_echoed_escaped() {
        let reply = brain().respond(&ChatRequest::message("<b>hello</b>"), &mut Fixed(0));
        assert_eq!(kinds(&reply), vec!["text", "action"]);
        assert_eq!(
            text(&reply[0]).content,
            "I received your message: \"&lt;b&gt;hello&lt;/b&gt;\". How can I help you further?"
        );
        assert_eq!(
            option_values(&reply[1]),
            vec!["show_categories", "show_price_ranges", "featured_products"]
        );
    }

    #[test]
    fn welcome_sequence_is_stable() {
        let brain = brain();
        let first = brain.welcome();
        let second = brain.welcome();

        assert_eq!(kinds(&first), vec!["text", "action", "text", "product"]);
        assert_eq!(kinds(&first), kinds(&second));
        assert_eq!(
            option_values(&first[1]),
            vec!["category_headphones", "category_speakers", "category_accessories"]
        );
        assert_eq!(cards(&first)[0].title, "Premium Wireless Headphones");
    }

    #[test]
    fn greeting_comes_from_the_pool() {
        let brain = brain();
        assert_eq!(brain.greeting(&mut Fixed(0)), GREETINGS[0]);
        assert_eq!(brain.greeting(&mut Fixed(5)), GREETINGS[5]);
        assert!(GREETINGS.contains(&brain.greeting(&mut ThreadDice)));
    }

    #[test]
    fn thread_dice_stays_in_range() {
        let mut dice = ThreadDice;
        for _ in 0..100 {
            assert!(dice.roll(5) < 5);
        }
    }

    #[test]
    fn every_reply_has_unique_ids() {
        let reply = brain().welcome();
        let mut ids: Vec<&str> = reply.iter().map(ChatMessage::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), reply.len());
    }
}
