//! Page addressing. UI state counts pages from 0, the API from 1.

/// Parameters of one list request as the UI holds them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub page_index: u64,
    pub page_size: u64,
    pub query: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 10)
    }
}

impl PageRequest {
    pub fn new(page_index: u64, page_size: u64) -> Self {
        Self {
            page_index,
            page_size,
            query: None,
        }
    }

    /// Blank queries are dropped so they never reach the wire.
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        self
    }

    /// The 1-based `page` parameter sent to the server.
    pub fn wire_page(&self) -> u64 {
        self.page_index + 1
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.wire_page().to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(q) = &self.query {
            pairs.push(("query", q.clone()));
        }
        pairs
    }
}

/// Number of pages for `total` records at `limit` per page.
pub fn page_count(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}
