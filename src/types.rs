use serde::{Deserialize, Serialize};

/// One unit of conversation content sent to the widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatMessage {
    Text(TextMessage),
    Product(ProductMessage),
    Action(ActionMessage),
    Image(ImageMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMessage {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub image_url: String,
    pub actions: Vec<ProductAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<String>,
}

/// A button attached to a product card. `url` is a deep link the widget may
/// open instead of posting the value back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAction {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A question rendered as a row of choice buttons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub id: String,
    pub question: String,
    pub options: Vec<ActionOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMessage {
    pub id: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl ChatMessage {
    pub fn text(content: impl Into<String>) -> Self {
        ChatMessage::Text(TextMessage {
            id: message_id(),
            content: content.into(),
        })
    }

    pub fn choice(question: impl Into<String>, options: Vec<ActionOption>) -> Self {
        ChatMessage::Action(ActionMessage {
            id: message_id(),
            question: question.into(),
            options,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            ChatMessage::Text(m) => &m.id,
            ChatMessage::Product(m) => &m.id,
            ChatMessage::Action(m) => &m.id,
            ChatMessage::Image(m) => &m.id,
        }
    }

    /// The wire tag, as found in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatMessage::Text(_) => "text",
            ChatMessage::Product(_) => "product",
            ChatMessage::Action(_) => "action",
            ChatMessage::Image(_) => "image",
        }
    }
}

impl ActionOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Body of `POST /api/chat/message`. Exactly one field is expected, but
/// neither is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatRequest {
    pub fn action(value: impl Into<String>) -> Self {
        Self {
            action: Some(value.into()),
            message: None,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            action: None,
            message: Some(text.into()),
        }
    }

    /// Action string, ignoring the empty string.
    pub fn action_str(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }

    /// Free text, ignoring the empty string.
    pub fn message_str(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

/// Success envelope for both chat endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub messages: Vec<ChatMessage>,
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// `msg_<unix millis>_<random base36>`. Collisions are unlikely, not impossible.
pub fn message_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut bits = rand::random::<u64>();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| {
            let c = ID_ALPHABET[(bits % 36) as usize] as char;
            bits /= 36;
            c
        })
        .collect();
    format!("msg_{}_{}", millis, suffix)
}
