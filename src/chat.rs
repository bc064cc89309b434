//! Chat-transport boundary types.
//!
//! The transport layer (message rendering, delivery, inline query protocol)
//! lives outside this service. These are the typed events it delivers and the
//! response descriptors it renders; both sides of the HTTP bridge speak them
//! as tagged JSON.

use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// Catalog page size for inline queries.
pub const INLINE_PAGE_SIZE: i64 = 5;

/// An inbound event from the chat transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Text { text: String },
    Location { lat: f64, lon: f64 },
    Photo { file_ref: String },
    Button { token: String },
    InlineQuery { query: String, offset: i64 },
}

/// One pressable button: a visible label plus an opaque callback token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self { label: label.into(), token: token.into() }
    }
}

/// A button layout, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn rows(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// One button per row.
    pub fn column(buttons: Vec<Button>) -> Self {
        Self { rows: buttons.into_iter().map(|b| vec![b]).collect() }
    }
}

/// One entry of a paginated inline result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineItem {
    pub id: String,
    pub title: String,
    pub message: String,
    pub description: String,
    pub thumb_ref: String,
}

/// An outbound response descriptor for the transport to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundResponse {
    Text {
        text: String,
    },
    Photo {
        image_ref: String,
        caption: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        keyboard: Option<Keyboard>,
    },
    Menu {
        text: String,
        keyboard: Keyboard,
    },
    InlineResults {
        items: Vec<InlineItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_offset: Option<i64>,
    },
}

impl OutboundResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn menu(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Menu { text: text.into(), keyboard }
    }
}
