//! In-process HTTP stub for integration tests
//!
//! Serves canned responses keyed by request target (path plus query) and
//! records every request it receives. Unknown targets get a 404.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use aurn_fetcher::app::ClientConfig;

/// A request as seen by the stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
struct CannedResponse {
    status: u16,
    body: String,
}

/// Builder collecting routes before the stub starts listening
#[derive(Debug, Default)]
pub struct StubBuilder {
    routes: HashMap<String, CannedResponse>,
}

impl StubBuilder {
    /// Answer `target` with `status` and `body`
    pub fn route(mut self, target: &str, status: u16, body: impl Into<String>) -> Self {
        self.routes.insert(
            target.to_string(),
            CannedResponse {
                status,
                body: body.into(),
            },
        );
        self
    }

    pub async fn start(self) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let routes = Arc::new(self.routes);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let accept_requests = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = Arc::clone(&routes);
                let requests = Arc::clone(&accept_requests);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, &routes, &requests).await;
                });
            }
        });

        StubServer {
            base_url: format!("http://{}", address),
            requests,
            handle,
        }
    }
}

/// Running stub; stops listening when dropped
pub struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub fn builder() -> StubBuilder {
        StubBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests received for `target`
    pub fn hits(&self, target: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.target == target)
            .count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    routes: &HashMap<String, CannedResponse>,
    requests: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(position) = find_subsequence(&buffer, b"\r\n\r\n") {
            break position;
        }
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    let response = routes.get(&target).cloned().unwrap_or(CannedResponse {
        status: 404,
        body: "Not Found".to_string(),
    });
    requests.lock().unwrap().push(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let reply = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason_phrase(response.status),
        response.body.len(),
        response.body
    );
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        410 => "Gone",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Client settings that keep tests fast
pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        rate_limit_rps: 1000,
        max_retries: 1,
        retry_base_delay: Duration::from_millis(5),
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

/// Station listing with one station per interesting case
///
/// - Aberdeen: open since 1999, download code in the listing
/// - Old Street: closed in 2017
/// - Glasgow Kerbside: not in the network
/// - Lookup Field: code only on its site-info page
/// - No Code Moor: code nowhere
pub const LISTING_CSV: &str = "\
UK-AIR ID,EU Site ID,Site Name,Environment Type,Zone,Start Date,End Date,Latitude,Longitude,Altitude (m),Networks,Site Code
UKA00399,GB0999A,Aberdeen,Urban Background,North East Scotland,1999-09-18,,57.15736,-2.094278,20,Automatic Urban and Rural Network (AURN),ABD
UKA00001,GB0001A,Old Street,Urban Traffic,Greater London Urban Area,1990-01-01,2017-12-31,51.5,-0.1,10,Automatic Urban and Rural Network (AURN),OLD
UKA00500,GB0500A,Glasgow Kerbside,Urban Traffic,Glasgow Urban Area,2000-01-01,,55.86,-4.25,,Scottish Air Quality Network,GKA8
UKA00600,,Lookup Field,Rural Background,Eastern,2015-03-01,,52.0,0.5,,Automatic Urban and Rural Network (AURN),
UKA00700,,No Code Moor,Rural Background,Eastern,2016-01-01,,52.5,0.7,,Automatic Urban and Rural Network (AURN),
";

/// Site-info page carrying a `site_id=` data link
pub const LOOKUP_SITE_INFO: &str = r#"<html><body>
<a class="bData" href="/data/data_selector_service?site_id=LKF&amp;type=hourly">Download data</a>
</body></html>"#;

/// Site-info page without any data link
pub const EMPTY_SITE_INFO: &str = "<html><body><p>No data available</p></body></html>";

/// Yearly measurement file with the four-line preamble UK-AIR writes
pub fn measurement_csv(rows: &[&str]) -> String {
    let mut text = String::from(
        "Hourly data from DEFRA Site\n\
         Site Name,Aberdeen\n\
         Currently operational\n\
         All Data GMT hour ending\n\
         Date,time,Ozone,status,unit,Nitric oxide,status,unit,Unknown Gas X,status,unit\n",
    );
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}
