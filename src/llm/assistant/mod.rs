
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::schemas::{
    Answer, ContentKind, ContentSchema, GeneratedContent, GeneratedNameList, ItemList,
    LocationList, NpcList, PuzzleList, RumourList,
};
use super::{ChatMessage, ChatProvider};
use crate::config::settings::DEFAULT_MAX_RETRIES;
use crate::{RagError, Result};

/// Prepended to generation requests before retrieval and prompting
pub const GENERATION_PREFIX: &str =
    "This query requires creativity and imagination to generate the following: ";

const CONTEXT_SEPARATOR: &str = "\n\n";

#[inline]
pub fn generation_query(query: &str) -> String {
    format!("{}{}", GENERATION_PREFIX, query)
}

/// Dungeon Master assistant that turns retrieved context into typed replies
#[derive(Clone)]
pub struct Assistant {
    provider: Arc<dyn ChatProvider>,
    max_retries: u32,
}

impl Assistant {
    #[inline]
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            provider,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Number of attempts before giving up on schema-invalid replies
    #[inline]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Wrap the query and the retrieved documents into the assistant prompt
    #[inline]
    pub fn build_prompt(query: &str, context: &[String]) -> String {
        let context = context.join(CONTEXT_SEPARATOR);

        format!(
            "==================
You are a virtual assistant for a Dungeon Master running Dungeons & Dragons (D&D) sessions.

- Helping prepare and run sessions by providing ideas, rules clarifications, encounter design, and narrative suggestions.
- Answering queries using provided campaign documents, focusing only on the relevant content.
- If no documents are provided, rely on your general D&D knowledge (primarily 5th Edition unless specified).

Be accurate, concise, and helpful. Prioritize clarity when referencing documents. Prioritize clarity and creativity when assisting with gameplay and storytelling.
==================

==================
DOCUMENT CONTEXT:
{context}
==================

==================
Query:
{query}
=================="
        )
    }

    /// Ask for a reply matching `T`, feeding validation errors back to the
    /// model until a reply validates or the attempts run out
    #[inline]
    pub fn ask<T: ContentSchema>(&self, query: &str, context: &[String]) -> Result<T> {
        let schema = T::json_schema();
        let mut messages = vec![ChatMessage::user(Self::build_prompt(query, context))];
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            debug!(
                "Requesting {} from {} (attempt {}/{})",
                T::NAME,
                self.provider.model(),
                attempt,
                self.max_retries
            );

            let reply = self.provider.chat(&messages, &schema)?;
            match T::parse_reply(&reply) {
                Ok(value) => {
                    info!("Received valid {} on attempt {}", T::NAME, attempt);
                    return Ok(value);
                }
                Err(error) => {
                    warn!(
                        "Reply failed {} validation on attempt {}: {}",
                        T::NAME,
                        attempt,
                        error
                    );
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!(
                        "The previous reply was not valid {} JSON:\n{}\nReply again with only JSON that matches the schema.",
                        T::NAME,
                        error
                    )));
                    last_error = error;
                }
            }
        }

        Err(RagError::SchemaValidation {
            schema: T::NAME.to_string(),
            attempts: self.max_retries,
            message: last_error,
        })
    }

    #[inline]
    pub fn answer(&self, query: &str, context: &[String]) -> Result<Answer> {
        self.ask(query, context)
    }

    /// Generate content of `kind`. `query` should already carry the
    /// generation prefix, since retrieval ran with it.
    #[inline]
    pub fn generate(
        &self,
        kind: ContentKind,
        query: &str,
        context: &[String],
    ) -> Result<GeneratedContent> {
        let content = match kind {
            ContentKind::Npc => GeneratedContent::Npc(self.ask::<NpcList>(query, context)?),
            ContentKind::Location => {
                GeneratedContent::Location(self.ask::<LocationList>(query, context)?)
            }
            ContentKind::Puzzle => GeneratedContent::Puzzle(self.ask::<PuzzleList>(query, context)?),
            ContentKind::Item => GeneratedContent::Item(self.ask::<ItemList>(query, context)?),
            ContentKind::Rumour => GeneratedContent::Rumour(self.ask::<RumourList>(query, context)?),
            ContentKind::Name => {
                GeneratedContent::Name(self.ask::<GeneratedNameList>(query, context)?)
            }
        };

        Ok(content)
    }
}
