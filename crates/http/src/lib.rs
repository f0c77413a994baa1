//! A transport for the Dust conversation API over HTTP.

#[macro_use]
extern crate tracing;

mod config;
mod events;
mod io;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use dust_ask_protocol::{
    AgentConfiguration, AgentConfigurations, CreatedConversation, ErrorKind,
    EventStream, Transport, TransportError,
};
use mime::Mime;
use reqwest::{Client, Response, header};

pub use config::{DustConfig, DustConfigBuilder};
use events::spawn_event_stream;
use io::{Chunks, Sse};

/// Error type for [`DustClient`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_status() {
            ErrorKind::Status
        } else if err.is_decode() {
            ErrorKind::Decode
        } else {
            ErrorKind::Request
        };
        Self::new(describe(&err), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl TransportError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Formats an error along with its sources, so that the root cause
/// (a reset connection, a DNS failure, ...) stays visible.
fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
        source = source.and_then(|err| err.source());
    }
    message
}

/// Dust conversation API client.
#[derive(Clone, Debug)]
pub struct DustClient {
    client: Client,
    config: Arc<DustConfig>,
}

impl DustClient {
    /// Creates a new `DustClient` with the given configuration.
    #[inline]
    pub fn new(config: DustConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this client.
    #[inline]
    pub fn config(&self) -> &DustConfig {
        &self.config
    }
}

impl Transport for DustClient {
    type Error = Error;

    fn create_conversation(
        &self,
        question: &str,
        agent_id: &str,
    ) -> impl Future<Output = Result<CreatedConversation, Self::Error>>
    + Send
    + 'static {
        let config = &self.config;
        let body = proto::create_conversation_request(question, agent_id, config);
        let resp_fut = self
            .client
            .post(self.config.conversations_url())
            .header(header::AUTHORIZATION, self.config.bearer())
            .json(&body)
            .send();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;
            resp.json::<CreatedConversation>()
                .await
                .map_err(|err| Error::new(describe(&err), ErrorKind::Decode))
        }
    }

    fn open_event_stream(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> impl Future<Output = Option<EventStream>> + Send + 'static {
        let resp_fut = self
            .client
            .get(self.config.events_url(conversation_id, message_id))
            .header(header::AUTHORIZATION, self.config.bearer())
            .header(header::ACCEPT, "text/event-stream")
            .send();
        let capacity = self.config.event_queue_capacity;

        async move {
            let resp = match resp_fut.await {
                Ok(resp) => resp,
                Err(err) => {
                    error!("error opening event stream: {}", describe(&err));
                    return None;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                error!(
                    "error running streamed app: status_code={status} - message={text}"
                );
                return None;
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_event_stream {
                warn!("unexpected content type for events: {content_type:?}");
            }

            // Here we got a successful response.
            let sse = Sse::new(Chunks::from_response(resp));
            Some(spawn_event_stream(sse, capacity))
        }
    }

    fn list_agents(
        &self,
    ) -> impl Future<Output = Result<Vec<AgentConfiguration>, Self::Error>>
    + Send
    + 'static {
        let resp_fut = self
            .client
            .get(self.config.agents_url())
            .header(header::AUTHORIZATION, self.config.bearer())
            .send();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;
            let directory = resp
                .json::<AgentConfigurations>()
                .await
                .map_err(|err| Error::new(describe(&err), ErrorKind::Decode))?;
            Ok(directory.agent_configurations)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "error sending request")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_describe_keeps_root_cause() {
        let err = Wrapper(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "ECONNRESET",
        ));
        assert_eq!(describe(&err), "error sending request: ECONNRESET");
    }

    #[test]
    fn test_error_accessors() {
        let err = Error::new("boom", ErrorKind::Status);
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.kind(), ErrorKind::Status);
    }
}
