use std::time::Duration;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

/// Everything that identifies one dashboard request.
///
/// Built once per request and passed by reference. A different tenant or
/// reference date means a new context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_id: String,
    /// Windows end strictly before this date.
    pub today: NaiveDate,
    /// Budget for each call into the metric source.
    pub query_timeout: Duration,
}

impl RequestContext {
    pub fn new(client_id: impl Into<String>, today: NaiveDate, query_timeout: Duration) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            client_id: client_id.into(),
            today,
            query_timeout,
        }
    }

    pub fn for_today(client_id: impl Into<String>, query_timeout: Duration) -> Self {
        Self::new(client_id, Utc::now().date_naive(), query_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_context_gets_its_own_request_id() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let a = RequestContext::new("hb", today, Duration::from_secs(5));
        let b = RequestContext::new("hb", today, Duration::from_secs(5));
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.client_id, b.client_id);
    }
}
