//! Long-poll connections over reqwest
//!
//! Each connection is a single `GET` of the device's event URL. The response
//! is never given an overall timeout: the stream stays open for as long as
//! the device keeps it open, with TCP keepalive detecting dead peers.

use std::error::Error as StdError;

use bytes::Bytes;
use dahua_parser::STATUS_OK_LINE;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode};

use super::digest::DigestChallenge;
use super::{Connector, FailureKind, HandleStream, TransportEvent, TransportFailure};
use crate::config::WatcherSettings;
use crate::device::ConnectionTarget;
use crate::error::TransportError;

/// [`Connector`] issuing real HTTP requests with Digest authentication
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// Build a connector with the connect timeout and keepalive from `settings`
    pub fn new(settings: &WatcherSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .tcp_keepalive(settings.keepalive_idle)
            .tcp_keepalive_interval(settings.keepalive_interval)
            .http1_only()
            .build()?;

        Ok(Self { client })
    }
}

enum Phase {
    Opening {
        client: Client,
        target: ConnectionTarget,
    },
    Streaming(BoxStream<'static, reqwest::Result<Bytes>>),
    Finished,
}

impl Connector for HttpConnector {
    fn connect(&self, target: &ConnectionTarget) -> HandleStream {
        let initial = Phase::Opening {
            client: self.client.clone(),
            target: target.clone(),
        };

        stream::unfold(initial, |phase| async move {
            match phase {
                Phase::Opening { client, target } => match open(&client, &target).await {
                    Ok(response) => {
                        if response.status() != StatusCode::OK {
                            tracing::debug!(
                                "{} answered {:?} {}, treating as connected",
                                target.host(),
                                response.version(),
                                response.status()
                            );
                        }
                        let body = response.bytes_stream().boxed();
                        Some((TransportEvent::Data(connected_line()), Phase::Streaming(body)))
                    }
                    Err(failure) => Some((TransportEvent::Failed(failure), Phase::Finished)),
                },
                Phase::Streaming(mut body) => match body.next().await {
                    Some(Ok(chunk)) => Some((TransportEvent::Data(chunk), Phase::Streaming(body))),
                    Some(Err(e)) => Some((TransportEvent::Failed(classify(&e)), Phase::Finished)),
                    None => Some((TransportEvent::Completed, Phase::Finished)),
                },
                Phase::Finished => None,
            }
        })
        .boxed()
    }
}

/// Send the request, answering one Digest challenge if the device asks
async fn open(client: &Client, target: &ConnectionTarget) -> Result<Response, TransportFailure> {
    let response = client
        .get(target.url.clone())
        .send()
        .await
        .map_err(|e| classify(&e))?;

    if response.status() != StatusCode::UNAUTHORIZED {
        return check_status(response);
    }

    let challenge = select_challenge(response.headers())?;
    let cnonce = uuid::Uuid::new_v4().simple().to_string();
    let authorization = challenge.authorization(
        &target.credentials,
        "GET",
        &target.request_uri(),
        &cnonce,
        1,
    );

    tracing::trace!("Answering Digest challenge from {} (realm {})", target.host(), challenge.realm);

    let response = client
        .get(target.url.clone())
        .header(AUTHORIZATION, authorization)
        .send()
        .await
        .map_err(|e| classify(&e))?;

    check_status(response)
}

/// reqwest consumes the status line. Any accepted response is reported as
/// the line a device sends on a successful attach, whatever its exact
/// version or 2xx code.
fn connected_line() -> Bytes {
    Bytes::from(format!("{}\r\n", STATUS_OK_LINE))
}

fn check_status(response: Response) -> Result<Response, TransportFailure> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportFailure::new(
            FailureKind::Status(status.as_u16()),
            status.canonical_reason().unwrap_or("Unexpected status"),
        ))
    }
}

/// Pick the first Digest challenge we can answer
fn select_challenge(headers: &HeaderMap) -> Result<DigestChallenge, TransportFailure> {
    let mut last_error = None;

    for value in headers.get_all(WWW_AUTHENTICATE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match DigestChallenge::parse(value) {
            Ok(challenge) => return Ok(challenge),
            Err(e) => last_error = Some(e),
        }
    }

    let message = match last_error {
        Some(e) => e.to_string(),
        None => "Unauthorized without an authentication challenge".to_string(),
    };
    Err(TransportFailure::new(FailureKind::Auth, message))
}

fn classify(error: &reqwest::Error) -> TransportFailure {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::Connect
    } else if error.is_body() || error.is_decode() {
        FailureKind::Body
    } else {
        FailureKind::Request
    };

    TransportFailure::new(kind, root_cause(error))
}

/// Message of the innermost error, e.g. "Connection refused (os error 111)"
fn root_cause(error: &(dyn StdError + 'static)) -> String {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
