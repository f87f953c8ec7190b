//! HTTP Client: HEAD for size discovery, ranged GET for
//! chunk fetches, over a connection-pooled, HTTP/2-capable libcurl handle.

use anyhow::{bail, Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Result of a `HEAD` probe.
#[derive(Debug, Clone)]
pub struct HeadResult {
    pub content_length: i64,
    pub status: u32,
}

/// Final status of a streamed ranged `GET`.
pub struct RangeStatus {
    pub status: u32,
}

/// Keep-alive, connection-pooled, HTTP/2-capable HTTP client.
///
/// libcurl is synchronous; `head`/`get_range` block the calling thread and
/// are always invoked from async call sites via `tokio::task::spawn_blocking`
/// so a slow transfer never blocks the runtime's reactor thread. Connection
/// reuse across calls is provided by a shared `curl::easy::Share` handle
/// (DNS cache + connection cache), configured once here so every `Easy`
/// built from this client reuses the same pool.
///
/// This cache is libcurl's normal per-handle connection reuse, not a sized
/// pool: `Share::cache_connect`/`cache_dns` turn reuse on but don't bound how
/// many connections it holds or how long an idle one survives. Enforcing a
/// concrete count (max idle total, max idle per host) and an idle-eviction
/// deadline needs `CURLMOPT_MAXCONNECTS`/`CURLMOPT_MAX_HOST_CONNECTIONS`,
/// which only exist on `curl::multi::Multi` — a cooperative single-thread
/// event loop over many transfers at once, a different shape than the
/// one-blocking-thread-per-transfer model `head`/`get_range` use here, and
/// not something this client drives. `tcp_keepalive`/`tcp_keepintvl` below
/// is a TCP-level keepalive probe on an already-open socket; it keeps a
/// connection from looking dead to NATs and load balancers, but it isn't a
/// pooled-connection eviction timer either.
#[derive(Clone)]
pub struct HttpClient {
    share: Arc<Mutex<curl::easy::Share>>,
    read_timeout: Duration,
}

impl HttpClient {
    pub fn new(read_timeout: Duration) -> Self {
        let mut share = curl::easy::Share::new();
        // Connection reuse + DNS cache across every Easy handle built
        // against this Share.
        let _ = share.cache_connect(true);
        let _ = share.cache_dns(true);
        Self {
            share: Arc::new(Mutex::new(share)),
            read_timeout,
        }
    }

    fn new_easy(&self, url: &str) -> Result<curl::easy::Easy> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url).context("invalid URL")?;
        easy.follow_location(true)?;
        easy.connect_timeout(Duration::from_secs(15))?;
        easy.timeout(self.read_timeout)?;
        // Negotiate HTTP/2 when the server supports it; libcurl
        // falls back to HTTP/1.1 transparently when it can't.
        let _ = easy.http_version(curl::easy::HttpVersion::V2TLS);
        // TCP keepalive probes, not a connection-pool idle timeout: this
        // keeps an otherwise-idle socket from being silently dropped by a
        // NAT or load balancer, it doesn't bound how long libcurl keeps a
        // cached connection around for reuse.
        easy.tcp_keepalive(true)?;
        easy.tcp_keepintvl(Duration::from_secs(90))?;
        {
            let share = self.share.lock().unwrap();
            easy.share(&share)?;
        }
        Ok(easy)
    }

    /// `HEAD <url>` — returns `Content-Length` and status.
    /// The caller rejects the download creation if status != 200.
    pub fn head(&self, url: &str) -> Result<HeadResult> {
        let mut easy = self.new_easy(url)?;
        easy.nobody(true)?;

        let mut content_length: Option<i64> = None;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(line) = std::str::from_utf8(data) {
                    if let Some((name, value)) = line.trim_end().split_once(':') {
                        if name.trim().eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse::<i64>().ok();
                        }
                    }
                }
                true
            })?;
            transfer.perform().context("HEAD request failed")?;
        }

        let status = easy.response_code().context("no response code")? as u32;
        let content_length = content_length.unwrap_or(-1);
        Ok(HeadResult {
            content_length,
            status,
        })
    }

    /// `GET <url>` with `Range: bytes=<start>-<end>` and `Connection: close`
    ///. Accepts 200 or 206; caller honors the requested
    /// window either way (a 200 means the server ignored the Range header).
    ///
    /// Streams the body through `on_chunk` as libcurl delivers it, rather
    /// than buffering the whole range in memory — this is what lets the
    /// per-chunk download routine do its write-then-persist-
    /// then-emit dance on every buffer, and what lets it check the
    /// cancellation token on every iteration: `on_chunk` returns `Err` to
    /// unwind the transfer early (e.g. `Cancelled`, or a local I/O error).
    pub fn get_range(
        &self,
        url: &str,
        start: i64,
        end: i64,
        mut on_chunk: impl FnMut(&[u8]) -> Result<()>,
    ) -> Result<RangeStatus> {
        let mut easy = self.new_easy(url)?;

        let range = format!("{start}-{end}");
        easy.range(&range)?;

        let mut list = curl::easy::List::new();
        list.append("Connection: close")?;
        easy.http_headers(list)?;

        let mut callback_err: Option<anyhow::Error> = None;
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match on_chunk(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    callback_err = Some(e);
                    Err(curl::easy::WriteError::Pause)
                }
            })?;
            if let Err(curl_err) = transfer.perform() {
                if let Some(e) = callback_err {
                    return Err(e);
                }
                return Err(curl_err).context("ranged GET failed");
            }
        }
        if let Some(e) = callback_err {
            return Err(e);
        }

        let status = easy.response_code().context("no response code")? as u32;
        if status != 200 && status != 206 {
            bail!("unexpected status {status} for range {start}-{end}");
        }

        Ok(RangeStatus { status })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
