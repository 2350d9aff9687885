use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::analyzer::{analyze_blocks, extract_blocks};
use crate::model::{ModelError, TextGenerator, mock_response};
use crate::prompt;
use crate::rules;
use crate::store::ConversationStore;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, CodeBlock, Role};

#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Stored messages replayed into the prompt.
    pub history_turns: usize,
    pub max_tokens: usize,
    pub temperature: f64,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            history_turns: 10,
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

/// Runs one conversation turn: history, prompt, generation, analysis and
/// persistence.
pub struct TurnOrchestrator {
    generator: Arc<dyn TextGenerator>,
    store: Option<Arc<dyn ConversationStore>>,
    options: TurnOptions,
}

impl TurnOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Option<Arc<dyn ConversationStore>>,
        options: TurnOptions,
    ) -> Self {
        Self {
            generator,
            store,
            options,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.generator.is_loaded()
    }

    /// Always produces a response. Model failures fall back to the mock
    /// answer; store failures are logged and the turn is simply not saved.
    #[instrument(skip_all, fields(user_id = user_id.unwrap_or("anonymous")))]
    pub async fn process(&self, user_id: Option<&str>, request: &ChatRequest) -> ChatResponse {
        let history = self.load_history(user_id).await;
        let prompt = prompt::build(request, &history);

        let (response, mock) = match self
            .generator
            .generate(&prompt, self.options.max_tokens, self.options.temperature)
            .await
        {
            Ok(text) if !text.trim().is_empty() => (text, false),
            Ok(_) => {
                warn!("model returned an empty answer, using mock response");
                (mock_response(&request.message).to_owned(), true)
            }
            Err(ModelError::NotLoaded) => {
                debug!("model not loaded, using mock response");
                (mock_response(&request.message).to_owned(), true)
            }
            Err(e) => {
                warn!(error = %e, "generation failed, using mock response");
                (mock_response(&request.message).to_owned(), true)
            }
        };

        let inbound_blocks = extract_blocks(&request.message);
        let code_blocks = extract_blocks(&response);
        let error_details = analyze_blocks(inbound_blocks.iter().chain(code_blocks.iter()));

        let keywords = rules::detect_keywords(&format!("{}\n{}", request.message, response));
        let has_code = !inbound_blocks.is_empty() || !code_blocks.is_empty();
        debug!(
            keywords = ?keywords.iter().map(|k| k.as_ref()).collect::<Vec<_>>(),
            blocks = code_blocks.len(),
            findings = error_details.len(),
            mock,
            "turn analysed"
        );

        if let Some(user_id) = user_id {
            self.persist(user_id, request, inbound_blocks, &response, &code_blocks)
                .await;
        }

        ChatResponse {
            suggestions: rules::suggestions(&keywords, request.skill_level, has_code),
            follow_up_questions: rules::follow_up_questions(&request.message),
            error_detected: !error_details.is_empty(),
            error_details,
            code_blocks,
            response,
            mock_response: mock,
        }
    }

    async fn load_history(&self, user_id: Option<&str>) -> Vec<ChatMessage> {
        let (Some(user_id), Some(store)) = (user_id, &self.store) else {
            return Vec::new();
        };
        match store.read_recent(user_id, self.options.history_turns).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "failed to read history, continuing without it");
                Vec::new()
            }
        }
    }

    async fn persist(
        &self,
        user_id: &str,
        request: &ChatRequest,
        inbound_blocks: Vec<CodeBlock>,
        response: &str,
        code_blocks: &[CodeBlock],
    ) {
        let Some(store) = &self.store else {
            return;
        };
        let inbound = ChatMessage::new(Role::User, request.message.clone())
            .with_code_blocks(inbound_blocks);
        let outbound =
            ChatMessage::new(Role::Assistant, response).with_code_blocks(code_blocks.to_vec());
        for message in [inbound, outbound] {
            if let Err(e) = store.append(user_id, &message).await {
                warn!(error = %e, role = %message.role, "failed to persist message");
            }
        }
    }
}
