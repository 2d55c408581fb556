//! The out-of-band model call [`Session::compact`] delegates to.
//!
//! Send old messages to the model with a summarization prompt, get back a
//! summary string. A standalone trait rather than a `ContextStrategy` impl,
//! since compaction here is a `Session` responsibility, not a loop-injected
//! strategy.

use std::future::Future;
use std::pin::Pin;

use rt_protocol::ResponseItem;

use crate::error::SessionError;

/// Produces a natural-language summary of a slice of history, for
/// [`crate::Session::compact`] to fold into a `compacted` item.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(
        &'a self,
        history: &'a [ResponseItem],
    ) -> Pin<Box<dyn Future<Output = Result<String, SessionError>> + Send + 'a>>;
}

impl<F, Fut> Summarizer for F
where
    F: Fn(&[ResponseItem]) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, SessionError>> + Send + 'static,
{
    fn summarize<'a>(
        &'a self,
        history: &'a [ResponseItem],
    ) -> Pin<Box<dyn Future<Output = Result<String, SessionError>> + Send + 'a>> {
        Box::pin((self)(history))
    }
}
