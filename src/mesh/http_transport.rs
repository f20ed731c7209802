use std::time::Duration;

use async_trait::async_trait;
use epidemic_mesh::{GossipMessage, GossipTransport, TransportError};
use reqwest::Client;

/// Delivers gossip as `POST http://{peer}/gossip` with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl GossipTransport for HttpTransport {
    async fn deliver(&self, peer: &str, message: &GossipMessage) -> Result<(), TransportError> {
        let url = format!("http://{}/gossip", peer);
        let resp = self
            .client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}
