use crate::{Backend, Result};
use pgfeatures::{Envelope, Search};
use std::time::Instant;

/// Runs one search against a backend.
///
/// This is the request's only backend round trip. Failures are logged and
/// returned as-is; nothing is retried.
pub async fn execute<B: Backend>(backend: &B, search: Search) -> Result<Envelope> {
    let start = Instant::now();
    let has_token = search.token.is_some();
    match backend.search(search).await {
        Ok(envelope) => {
            tracing::debug!(
                backend = backend.name(),
                elapsed = ?start.elapsed(),
                number_returned = envelope.number_returned(),
                number_matched = envelope.number_matched,
                "search"
            );
            Ok(envelope)
        }
        Err(err) => {
            tracing::warn!(
                backend = backend.name(),
                elapsed = ?start.elapsed(),
                has_token,
                "search failed: {err}"
            );
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::execute;
    use crate::{Error, MemoryBackend};
    use pgfeatures::Search;

    #[tokio::test]
    async fn cursor_not_found() {
        let error = execute(&MemoryBackend::new(), Search::new().token("next:1"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::CursorNotFound(token) if token == "next:1"));
    }

    #[tokio::test]
    async fn empty() {
        let envelope = execute(&MemoryBackend::new(), Search::new()).await.unwrap();
        assert_eq!(envelope.number_matched, Some(0));
        assert!(envelope.features.is_empty());
    }
}
