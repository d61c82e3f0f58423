// src/net/http.rs
//! Production data source client over reqwless and an embassy-net stack.
//!
//! The stack itself (radio driver, DHCP, the `embassy_net::Runner` task) is
//! board bring-up and stays outside this crate; this client only borrows the
//! ready stack handle. TLS runs without certificate verification, which is
//! the usual trade-off on this class of device.

use alloc::vec;

use async_trait::async_trait;
use embassy_net::Stack;
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_time::{Duration, with_timeout};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::{Method, RequestBuilder};
use serde_json::Value;

use crate::common::error::FetchError;
use crate::net::client::DataSource;

const RESPONSE_BUFFER_SIZE: usize = 16 * 1024;

pub struct HttpDataSource {
    stack: Stack<'static>,
    tcp_state: TcpClientState<1, 4096, 4096>,
    tls_seed: u64,
}

impl HttpDataSource {
    /// `tls_seed` must come from a hardware RNG at bring-up.
    pub fn new(stack: Stack<'static>, tls_seed: u64) -> Self {
        Self {
            stack,
            tcp_state: TcpClientState::new(),
            tls_seed,
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let tcp_client = TcpClient::new(self.stack, &self.tcp_state);
        let dns_socket = DnsSocket::new(self.stack);

        let mut rx_buffer = [0u8; 4096];
        let mut tx_buffer = [0u8; 4096];
        let tls_config = TlsConfig::new(self.tls_seed, &mut rx_buffer, &mut tx_buffer, TlsVerify::None);
        let mut client = HttpClient::new_with_tls(&tcp_client, &dns_socket, tls_config);

        log::debug!("GET {url}");
        let mut request = client.request(Method::GET, url).await.map_err(|err| {
            log::warn!("Failed to create request: {err:?}");
            FetchError::Unreachable
        })?;
        request = request.headers(&[("Accept", "application/json")]);

        let mut buffer = vec![0u8; RESPONSE_BUFFER_SIZE];
        let response = request.send(&mut buffer).await.map_err(|err| {
            log::warn!("HTTP send failed: {err:?}");
            FetchError::Unreachable
        })?;

        let status = response.status;
        if !status.is_successful() {
            log::warn!("HTTP request failed with status: {status:?}");
            return Err(FetchError::Rejected);
        }

        let body = response.body().read_to_end().await.map_err(|err| {
            log::warn!("Failed to read response body: {err:?}");
            FetchError::MalformedResponse
        })?;
        serde_json::from_slice(body).map_err(|_| FetchError::MalformedResponse)
    }
}

#[async_trait(?Send)]
impl DataSource for HttpDataSource {
    async fn fetch_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        match with_timeout(timeout, self.get_json(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }
}
