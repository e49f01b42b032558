//! Server-sent-event plumbing shared by the provider adapters.
//!
//! Every vendor streams its reply as SSE; only the payload shape differs.
//! An adapter opens an [`EventSource`] for its request and hands it to
//! [`fragments`] together with a parser for one event, and gets back a
//! lazy stream of fragments. Dropping that stream drops the event source,
//! which closes the HTTP connection.
//!
//! A reply is only complete once the vendor says so. A connection that
//! closes before the parser reported [`SseStep::Done`] or
//! [`SseStep::Finished`] ends the stream with a transport error, so a
//! truncated reply is never mistaken for a whole one.

use std::collections::VecDeque;

use futures_util::{stream, StreamExt};
use reqwest_eventsource::{Error as SseError, Event, EventSource};
use tracing::{debug, error};

use super::{Fragment, FragmentStream};
use crate::error::ProviderError;

/// What one SSE event means for the reply.
#[derive(Debug, PartialEq)]
pub(crate) enum SseStep {
    Text(String),
    Skip,
    /// End-of-reply marker; nothing after it is read.
    Done,
    /// The last chunk of a reply whose end is the server closing the
    /// connection. `text` may be empty; `notice` explains an unusual stop.
    Finished {
        text: String,
        notice: Option<String>,
    },
}

/// Open an event source for `request` with reconnection disabled.
pub(crate) fn open(request: reqwest::RequestBuilder) -> Result<EventSource, ProviderError> {
    let mut source =
        EventSource::new(request).map_err(|e| ProviderError::Transport(e.to_string()))?;
    source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));
    Ok(source)
}

/// Turn an event source into a fragment stream using `parse(event, data)`.
///
/// The stream yields at most one error, after which it is exhausted.
pub(crate) fn fragments<F>(source: EventSource, parse: F) -> FragmentStream
where
    F: FnMut(&str, &str) -> Result<SseStep, ProviderError> + Send + 'static,
{
    let reader = Reader {
        source,
        parse,
        pending: VecDeque::new(),
        finished: false,
    };
    Box::pin(stream::unfold(Some(reader), |reader| next_fragment(reader)))
}

struct Reader<F> {
    source: EventSource,
    parse: F,
    /// Fragments of a `Finished` step not yet handed out.
    pending: VecDeque<Fragment>,
    finished: bool,
}

type Item<F> = (Result<Fragment, ProviderError>, Option<Reader<F>>);

async fn next_fragment<F>(reader: Option<Reader<F>>) -> Option<Item<F>>
where
    F: FnMut(&str, &str) -> Result<SseStep, ProviderError> + Send + 'static,
{
    let mut reader = reader?;
    loop {
        if let Some(fragment) = reader.pending.pop_front() {
            return Some((Ok(fragment), Some(reader)));
        }
        match reader.source.next().await {
            Some(Ok(Event::Open)) => continue,
            Some(Ok(Event::Message(message))) => {
                match (reader.parse)(&message.event, &message.data) {
                    Ok(SseStep::Text(text)) => {
                        return Some((Ok(Fragment::Text(text)), Some(reader)));
                    }
                    Ok(SseStep::Skip) => continue,
                    Ok(SseStep::Done) => {
                        reader.source.close();
                        return None;
                    }
                    Ok(SseStep::Finished { text, notice }) => {
                        reader.finished = true;
                        if !text.is_empty() {
                            reader.pending.push_back(Fragment::Text(text));
                        }
                        if let Some(notice) = notice {
                            reader.pending.push_back(Fragment::Notice(notice));
                        }
                    }
                    Err(e) => {
                        reader.source.close();
                        error!("stream event rejected: {}", e);
                        return Some((Err(e), None));
                    }
                }
            }
            Some(Err(SseError::StreamEnded)) | None => {
                reader.source.close();
                if reader.finished {
                    debug!("event stream closed by server");
                    return None;
                }
                let err = ProviderError::Transport("stream ended before completion".to_string());
                error!("event stream cut short: {}", err);
                return Some((Err(err), None));
            }
            Some(Err(e)) => {
                reader.source.close();
                let err = describe(e).await;
                error!("event stream failed: {}", err);
                return Some((Err(err), None));
            }
        }
    }
}

async fn describe(err: SseError) -> ProviderError {
    match err {
        SseError::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            ProviderError::Status {
                status: status.as_u16(),
                body: summarize_error_body(&body),
            }
        }
        SseError::InvalidContentType(content_type, response) => {
            let body = response.text().await.unwrap_or_default();
            ProviderError::Malformed(format!(
                "expected an event stream but got {:?}: {}",
                content_type,
                summarize_error_body(&body)
            ))
        }
        SseError::Transport(e) => ProviderError::Transport(e.to_string()),
        other => ProviderError::Malformed(other.to_string()),
    }
}

/// Pull the human-readable message out of a vendor error body.
///
/// All three vendors nest it under `error.message`; Gemini sometimes wraps
/// the whole object in a one-element array.
pub(crate) fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return trimmed.to_string();
    };
    let value = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| trimmed.to_string())
}

/// A one-shot HTTP server that answers a single request with a canned body.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// A client that ignores proxy settings, so requests reach the local server.
    pub(crate) fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// The request the server saw: head (request line + headers) and body.
    pub(crate) struct Captured {
        pub head: String,
        pub body: String,
    }

    /// Serve one response; returns the base URL and a receiver for the request.
    pub(crate) async fn serve_once(
        status: &str,
        content_type: &str,
        body: &str,
    ) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n{}",
            status, content_type, body
        );
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(captured);
        });
        (format!("http://{}", addr), rx)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> Captured {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < head_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[head_end..]).to_string();
        Captured { head, body }
    }
}
