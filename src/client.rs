//! HTTP clients for the node and admin APIs, used by the observer tools.

use std::time::Duration;

use epidemic_mesh::NodeStatus;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    admin::{ClusterInfo, NodeInfo},
    mesh::{SetValueResponse, TriggerResponse},
};

pub const GOSSIP_CLIENT_TIMEOUT: Duration = Duration::from_secs(3);
pub const ADMIN_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

async fn decode<T: DeserializeOwned>(url: &str, resp: Response) -> ClientResult<T> {
    if !resp.status().is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }
    resp.json::<T>().await.map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}

fn request_error(url: &str) -> impl FnOnce(reqwest::Error) -> ClientError + '_ {
    move |source| ClientError::Request {
        url: url.to_string(),
        source,
    }
}

/// Client for the per-node API, addressed by port on a fixed host.
#[derive(Debug, Clone)]
pub struct GossipClient {
    host: String,
    client: Client,
}

impl GossipClient {
    pub fn new(host: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(GOSSIP_CLIENT_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            host: host.into(),
            client,
        })
    }

    fn url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{}{}", self.host, port, path)
    }

    pub async fn get_status(&self, port: u16) -> ClientResult<NodeStatus> {
        let url = self.url(port, "/status");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(request_error(&url))?;
        decode(&url, resp).await
    }

    pub async fn trigger_gossip(&self, port: u16) -> ClientResult<TriggerResponse> {
        let url = self.url(port, "/trigger");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(request_error(&url))?;
        decode(&url, resp).await
    }

    pub async fn set_value(&self, port: u16, value: &str) -> ClientResult<SetValueResponse> {
        let url = self.url(port, "/set");
        let resp = self
            .client
            .post(&url)
            .query(&[("value", value)])
            .send()
            .await
            .map_err(request_error(&url))?;
        decode(&url, resp).await
    }

    /// Number of nodes in `base_port..base_port+count` answering `/status`.
    /// Ports past 65535 count as unhealthy.
    pub async fn count_healthy_nodes(&self, base_port: u16, node_count: usize) -> usize {
        let mut healthy = 0;
        for i in 0..node_count {
            let Some(port) = u16::try_from(i)
                .ok()
                .and_then(|offset| base_port.checked_add(offset))
            else {
                break;
            };
            if self.get_status(port).await.is_ok() {
                healthy += 1;
            }
        }
        healthy
    }
}

/// Client for the admin API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    base_url: String,
    client: Client,
}

impl AdminClient {
    pub fn new(host: &str, admin_port: u16) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(ADMIN_CLIENT_TIMEOUT)
            .no_proxy()
            .build()?;
        Ok(Self {
            base_url: format!("http://{}:{}", host, admin_port),
            client,
        })
    }

    pub async fn get_cluster_info(&self) -> ClientResult<ClusterInfo> {
        let url = format!("{}/cluster", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(request_error(&url))?;
        decode(&url, resp).await
    }

    pub async fn get_nodes(&self) -> ClientResult<Vec<NodeInfo>> {
        let url = format!("{}/nodes", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(request_error(&url))?;
        decode(&url, resp).await
    }
}
