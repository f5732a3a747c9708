use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use tokio::net::UdpSocket;

use crate::{error::VpcError, platform::Zone};

/// Instance metadata endpoint reporting the availability zone on AWS
pub const DEFAULT_METADATA_URL: &str =
    "http://169.254.169.254/latest/meta-data/placement/availability-zone";

/// Link-local address of the instance metadata service
const METADATA_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254)), 80);

/// Client for the instance metadata service
#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
    url: String,
}

impl MetadataClient {
    /// Create a client querying `url`, each request bounded by `timeout` if set
    ///
    /// Proxies are never used, the metadata service is only reachable directly.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, VpcError> {
        let url = url.into();

        let mut builder = reqwest::Client::builder().no_proxy();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|source| VpcError::Metadata {
            url: url.clone(),
            source: Arc::new(source),
        })?;

        Ok(Self { client, url })
    }

    /// Ask the metadata service which availability zone this instance runs in
    pub async fn availability_zone(&self) -> Result<Zone, VpcError> {
        let metadata_err = |source: reqwest::Error| VpcError::Metadata {
            url: self.url.clone(),
            source: Arc::new(source),
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(metadata_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(VpcError::MetadataStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(metadata_err)?;
        Ok(Zone::from(body.trim()))
    }
}

/// Local address the host uses to reach the metadata service
///
/// Connecting a UDP socket only selects a route, no packet is sent.
pub async fn local_ip() -> Result<IpAddr, VpcError> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.connect(METADATA_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}
