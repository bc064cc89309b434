use std::sync::Arc;

use crate::engine::ConversationEngine;

pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub transport_token: String,
}
