//! The generation seam between the agent loop and the host's inference
//! engine.
//!
//! The library never talks to a model itself; the host implements
//! [`Generator`] over whatever inference stack it embeds and returns the
//! produced tokens as a stream of chunks. The orchestrator accumulates the
//! chunks, so the stream is the single source of truth for the response
//! text. Early termination — the user's token callback returning `false`,
//! or a `stop()` — is expressed by dropping the stream.

use crate::error::Result;
use crate::types::Message;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

/// Stream of token chunks produced by one generation.
///
/// Chunks are `String` (valid UTF-8); hosts slicing raw model output into
/// bytes must cut on a scalar boundary before building chunks.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Host-supplied text generation.
///
/// `messages` is the working history for the current iteration (the
/// permanent transcript plus intermediate assistant/tool messages);
/// `system_prompt` already embeds the tool schema. Implementations should
/// yield chunks as they are produced so streaming consumers see tokens
/// promptly; yielding the whole response as one chunk is also valid.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next assistant response as a token stream.
    async fn generate(&self, messages: &[Message], system_prompt: &str) -> Result<TokenStream>;
}

/// Adapts a plain closure returning the full response text.
///
/// Convenient for blocking inference engines and for tests; the text is
/// delivered as a single chunk.
///
/// ```
/// use agent_loop::{FnGenerator, Generator, Message};
///
/// # tokio_test::block_on(async {
/// let generator = FnGenerator::new(|_messages, _system| Ok("Hi there!".to_string()));
/// let mut stream = generator.generate(&[], "").await.unwrap();
/// # use futures::StreamExt;
/// assert_eq!(stream.next().await.unwrap().unwrap(), "Hi there!");
/// # });
/// ```
pub struct FnGenerator<F> {
    f: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(&[Message], &str) -> Result<String> + Send + Sync,
{
    /// Wrap a closure as a [`Generator`].
    pub fn new(f: F) -> Self {
        FnGenerator { f }
    }
}

#[async_trait]
impl<F> Generator for FnGenerator<F>
where
    F: Fn(&[Message], &str) -> Result<String> + Send + Sync,
{
    async fn generate(&self, messages: &[Message], system_prompt: &str) -> Result<TokenStream> {
        let text = (self.f)(messages, system_prompt)?;
        Ok(stream::iter([Ok(text)]).boxed())
    }
}
