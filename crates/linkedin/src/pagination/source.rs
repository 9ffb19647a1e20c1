use async_trait::async_trait;
use tracing::instrument;

use super::state::{Page, PageRequest, PageState};
use crate::error::Result;

/// Anything that can serve one page of results.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    fn name(&self) -> &str;

    /// Largest page the endpoint accepts.
    fn page_size(&self) -> usize;

    /// Token sources stop as soon as a page comes back without a token.
    fn uses_token(&self) -> bool {
        false
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Self::Item>>;
}

/// Drain `source` into one list of at most `limit` items, starting at `offset`.
#[instrument(skip(source), fields(source = source.name()))]
pub async fn fetch_paginated<P>(
    source: &P,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<P::Item>>
where
    P: PageSource + ?Sized,
{
    let mut state = PageState::new(source.page_size(), limit, offset, source.uses_token());
    let mut results = Vec::new();

    while let Some(request) = state.next_request() {
        let page = source.fetch_page(&request).await?;
        state.advance(page, &mut results);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkedinError;
    use parking_lot::Mutex;

    /// Serves `total` numbered items, optionally never running dry.
    struct CountingSource {
        page_size: usize,
        total: Option<usize>,
        requests: Mutex<Vec<PageRequest>>,
        fail_on_round: Option<usize>,
    }

    impl CountingSource {
        fn new(page_size: usize, total: Option<usize>) -> Self {
            Self {
                page_size,
                total,
                requests: Mutex::new(Vec::new()),
                fail_on_round: None,
            }
        }
    }

    #[async_trait]
    impl PageSource for CountingSource {
        type Item = usize;

        fn name(&self) -> &str {
            "counting"
        }

        fn page_size(&self) -> usize {
            self.page_size
        }

        async fn fetch_page(&self, request: &PageRequest) -> Result<Page<usize>> {
            let round = {
                let mut requests = self.requests.lock();
                requests.push(request.clone());
                requests.len()
            };
            if self.fail_on_round == Some(round) {
                return Err(LinkedinError::RateLimited { status: 429 });
            }
            let end = match self.total {
                Some(total) => (request.start + request.count).min(total),
                None => request.start + request.count,
            };
            Ok(Page::new((request.start.min(end)..end).collect()))
        }
    }

    #[tokio::test]
    async fn test_single_call_when_first_page_fills_limit() {
        let source = CountingSource::new(49, None);
        let results = fetch_paginated(&source, Some(10), 0).await.unwrap();

        assert_eq!(results, (0..10).collect::<Vec<_>>());
        assert_eq!(source.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_collects_until_source_runs_dry() {
        let source = CountingSource::new(10, Some(25));
        let results = fetch_paginated(&source, None, 0).await.unwrap();

        assert_eq!(results.len(), 25);
        let starts: Vec<usize> = source.requests.lock().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 10, 20, 25]);
    }

    #[tokio::test]
    async fn test_offset_shifts_every_request() {
        let source = CountingSource::new(10, Some(100));
        let results = fetch_paginated(&source, Some(15), 40).await.unwrap();

        assert_eq!(results.first(), Some(&40));
        assert_eq!(results.len(), 15);
        let requests = source.requests.lock();
        assert_eq!(requests[1].start, 50);
        assert_eq!(requests[1].count, 5);
    }

    #[tokio::test]
    async fn test_fresh_state_per_call() {
        let source = CountingSource::new(10, Some(30));
        let first = fetch_paginated(&source, Some(20), 0).await.unwrap();
        let second = fetch_paginated(&source, Some(20), 0).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_page_error_propagates() {
        let mut source = CountingSource::new(10, None);
        source.fail_on_round = Some(2);

        let result = fetch_paginated(&source, Some(50), 0).await;
        assert!(matches!(result, Err(LinkedinError::RateLimited { .. })));
    }
}
