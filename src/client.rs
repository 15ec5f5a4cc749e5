//! Bounded quote client
//!
//! Performs a single GET against the quote server within a fixed budget and
//! appends `<timestamp>\t<bidPrice>` to a local log file. Nothing is written
//! unless a well-formed quote arrived in time.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::config::ClientConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};

/// Timestamp layout of each log line, e.g. `Mon Jan  2 15:04:05 2006`
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Body of a successful `GET /quote`
#[derive(Debug, Deserialize)]
struct QuoteReply {
    #[serde(rename = "bidPrice")]
    bid_price: String,
}

/// Fetches one quote and appends it to `config.output`
///
/// # Returns
/// * `Ok(String)` - The bid price that was recorded
/// * `Err(Error::Timeout)` - The server did not answer within `config.timeout_ms`
/// * `Err(Error)` - Connection failure, non-200 reply, bad JSON, or file I/O error
pub async fn fetch_and_record(config: &ClientConfig) -> Result<String> {
    let http_client = Client::new();
    let deadline = Deadline::after(config.timeout());

    let (status, body) = deadline
        .run(async {
            let response = http_client.get(&config.url).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        })
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| if e.is_timeout() { Error::Timeout } else { Error::Http(e) })?;

    if !status.is_success() {
        return Err(Error::Rejected {
            status: status.as_u16(),
            body: body.trim_end().to_string(),
        });
    }

    let reply: QuoteReply = serde_json::from_str(&body)?;
    append_line(&config.output, &Local::now(), &reply.bid_price)?;

    info!(bid = %reply.bid_price, output = %config.output.display(), "quote recorded");
    Ok(reply.bid_price)
}

/// Renders one log line
pub fn format_line<Tz: TimeZone>(at: &DateTime<Tz>, bid_price: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}\t{}\n", at.format(TIMESTAMP_FORMAT), bid_price)
}

/// Appends one line to `path`, creating the file if needed
fn append_line<Tz: TimeZone>(path: &Path, at: &DateTime<Tz>, bid_price: &str) -> std::io::Result<()>
where
    Tz::Offset: std::fmt::Display,
{
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_line(at, bid_price).as_bytes())
}
