use tracing::debug;

/// Upper bound on rounds of one paginated fetch, and on
/// `accumulated / page_size`. Conservative to stay clear of rate limits.
pub const MAX_REPEATED_REQUESTS: usize = 200;

/// What the next page request should ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub start: usize,
    pub count: usize,
    /// Opaque continuation token, resubmitted verbatim.
    pub token: Option<String>,
}

/// One page as returned by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.next_token = token;
        self
    }
}

/// Bookkeeping of a single paginated fetch. Never shared between fetches.
#[derive(Debug, Clone)]
pub struct PageState {
    page_size: usize,
    limit: Option<usize>,
    offset: usize,
    uses_token: bool,
    accumulated: usize,
    rounds: usize,
    token: Option<String>,
    done: bool,
}

impl PageState {
    pub fn new(page_size: usize, limit: Option<usize>, offset: usize, uses_token: bool) -> Self {
        Self {
            page_size: page_size.max(1),
            limit,
            offset,
            uses_token,
            accumulated: 0,
            rounds: 0,
            token: None,
            done: limit == Some(0),
        }
    }

    pub fn accumulated(&self) -> usize {
        self.accumulated
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn is_done(&self) -> bool {
        self.done || self.rounds >= MAX_REPEATED_REQUESTS
    }

    /// The next request, or `None` once the fetch is over.
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.is_done() {
            return None;
        }
        let count = match self.limit {
            Some(limit) => self.page_size.min(limit.saturating_sub(self.accumulated)),
            None => self.page_size,
        };
        Some(PageRequest {
            start: self.offset + self.accumulated,
            count,
            token: self.token.clone(),
        })
    }

    /// Fold a received page into `out`, truncating at the limit, and decide
    /// whether another round is needed.
    pub fn advance<T>(&mut self, page: Page<T>, out: &mut Vec<T>) {
        self.rounds += 1;
        let received = page.items.len();

        let room = self
            .limit
            .map_or(usize::MAX, |limit| limit.saturating_sub(self.accumulated));
        let taken = received.min(room);
        out.extend(page.items.into_iter().take(taken));
        self.accumulated += taken;

        let token = page.next_token.filter(|t| !t.is_empty());
        let stop_reason = if received == 0 {
            Some("empty page")
        } else if self.limit.is_some_and(|limit| self.accumulated >= limit) {
            Some("limit reached")
        } else if self.accumulated / self.page_size >= MAX_REPEATED_REQUESTS
            || self.rounds >= MAX_REPEATED_REQUESTS
        {
            Some("request cap reached")
        } else if self.uses_token && token.is_none() {
            Some("no continuation token")
        } else {
            None
        };

        self.token = token;
        if let Some(reason) = stop_reason {
            debug!(
                accumulated = self.accumulated,
                rounds = self.rounds,
                reason,
                "Pagination finished"
            );
            self.done = true;
        } else {
            debug!(accumulated = self.accumulated, "Results grew");
        }
    }
}
