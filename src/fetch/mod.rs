// src/fetch/mod.rs

pub mod urls;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Constants;
use crate::error::RequestError;
use crate::process::RawTable;

/// Anything that can answer a prepared API request with a table.
///
/// `Ok(None)` is a valid "no data" answer (empty body or `[]`).
pub trait TableSource {
    fn get_table(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<Option<RawTable>, RequestError>> + Send;
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Row 0 is the header, the rest are data rows.
pub fn decode_table(rows: Vec<Vec<Value>>) -> Option<RawTable> {
    let mut rows = rows.into_iter();
    let headers: Vec<String> = rows.next()?.into_iter().map(cell_to_string).collect();
    if headers.is_empty() {
        return None;
    }
    let data = rows
        .map(|r| {
            let mut row: Vec<String> = r.into_iter().map(cell_to_string).collect();
            row.resize(headers.len(), String::new());
            row
        })
        .collect();
    Some(RawTable::new(headers, data))
}

pub fn decode_body(url: &str, body: &str) -> Result<Option<RawTable>, RequestError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|source| RequestError::Decode {
            url: url.to_string(),
            source,
        })?;
    Ok(decode_table(rows))
}

/// Exponential backoff (×1.5 per attempt), capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_constants(c: &Constants) -> Self {
        Self {
            max_retries: c.max_retries,
            initial_delay: Duration::from_secs(c.retry_delay_secs),
            max_delay: Duration::from_secs(c.max_retry_delay_secs),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1.5f64.powi(attempt.saturating_sub(1).min(64) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// HTTP client for the statistics API.
#[derive(Debug, Clone)]
pub struct CensusClient {
    client: Client,
    retry: RetryPolicy,
}

impl CensusClient {
    pub fn new(constants: &Constants) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(constants.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self::with_client(client, RetryPolicy::from_constants(constants)))
    }

    pub fn with_client(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn get_body(&self, url: &Url) -> Result<String, reqwest::Error> {
        debug!(%url, "GET");
        self.client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

impl TableSource for CensusClient {
    async fn get_table(&self, url: &Url) -> Result<Option<RawTable>, RequestError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.get_body(url).await {
                Ok(body) => return decode_body(url.as_str(), &body),
                Err(e) if attempts <= self.retry.max_retries => {
                    let backoff = self.retry.delay(attempts);
                    warn!(%url, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %e, "Retrying");
                    sleep(backoff).await;
                }
                Err(source) => {
                    error!(%url, attempts, error = %source, "Exhausted retries");
                    return Err(RequestError::Transient {
                        url: url.to_string(),
                        attempts,
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_header_and_rows() {
        let body = r#"[["NAME","B01003_001E","GEO_ID"],["Alpha","1200","8600000US00601"],["Beta",null,"8600000US00602"]]"#;
        let table = decode_body("u", body).unwrap().unwrap();
        assert_eq!(table.headers, ["NAME", "B01003_001E", "GEO_ID"]);
        assert_eq!(table.rows[1], ["Beta", "", "8600000US00602"]);
    }

    #[test]
    fn non_string_cells_are_rendered() {
        let table = decode_table(vec![
            vec![json!("a"), json!("b")],
            vec![json!(12), json!(1.5)],
            vec![json!(true)],
        ])
        .unwrap();
        assert_eq!(table.rows, [vec!["12", "1.5"], vec!["true", ""]]);
    }

    #[test]
    fn empty_payloads_are_no_data() {
        assert_eq!(decode_body("u", "").unwrap(), None);
        assert_eq!(decode_body("u", "  \n").unwrap(), None);
        assert_eq!(decode_body("u", "[]").unwrap(), None);
        let header_only = decode_body("u", r#"[["NAME","GEO_ID"]]"#).unwrap().unwrap();
        assert!(header_only.is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_body("u", "<html>error</html>"),
            Err(RequestError::Decode { .. })
        ));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(p.delay(1), Duration::from_secs(2));
        assert_eq!(p.delay(2), Duration::from_secs(3));
        assert_eq!(p.delay(3), Duration::from_millis(4500));
        assert_eq!(p.delay(4), Duration::from_secs(5));
        assert_eq!(p.delay(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_retries() {
        let retry = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let client = CensusClient::with_client(
            Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
            retry,
        );
        let url = Url::parse("http://127.0.0.1:9/data").unwrap();
        match client.get_table(&url).await {
            Err(RequestError::Transient { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected transient failure, got {other:?}"),
        }
    }
}
