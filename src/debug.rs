use crate::transport::Exchange;

/// The request side of a recorded SOAP call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugQuery {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Recorded SOAP calls. Queries and results are appended in pairs, so the `n`th query
/// belongs to the `n`th result.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    queries: Vec<DebugQuery>,
    results: Vec<Exchange>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, body: &[u8], exchange: &Exchange) {
        self.queries.push(DebugQuery {
            headers: exchange.request_headers.clone(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        self.results.push(exchange.clone());
    }

    pub fn queries(&self) -> &[DebugQuery] {
        &self.queries
    }

    pub fn results(&self) -> &[Exchange] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn reset(&mut self) {
        self.queries.clear();
        self.results.clear();
    }
}
