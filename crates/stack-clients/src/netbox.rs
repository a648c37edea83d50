//! Device directory over a NetBox-style inventory API

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use stack_orchestration::{ClientError, DeviceDirectory, DeviceFilter, DeviceInfo};
use tracing::debug;
use url::Url;

/// Platform assumed when the inventory record carries none
const DEFAULT_PLATFORM: &str = "cisco_ios";

#[derive(Debug, Deserialize)]
struct DeviceList {
    results: Vec<NetboxDevice>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NetboxDevice {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    primary_ip: Option<PrimaryIp>,
    #[serde(default)]
    platform: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct PrimaryIp {
    address: String,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl NetboxDevice {
    /// Flatten the inventory record into connection metadata
    ///
    /// Host prefers the primary IP (mask stripped) and falls back to
    /// the device name. Nameless records are skipped.
    fn into_device_info(self) -> Option<DeviceInfo> {
        let name = self.name.filter(|n| !n.is_empty())?;
        let host = self
            .primary_ip
            .map(|ip| strip_prefix_length(&ip.address))
            .unwrap_or_else(|| name.clone());
        let platform = self
            .platform
            .and_then(|p| p.slug.or(p.name))
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());
        Some(DeviceInfo {
            name,
            host,
            platform,
            port: None,
        })
    }
}

/// Drop the CIDR suffix from an address like `10.0.0.1/24`
fn strip_prefix_length(address: &str) -> String {
    address.split('/').next().unwrap_or(address).to_string()
}

/// Directory backed by a NetBox-style inventory API
#[derive(Debug, Clone)]
pub struct NetboxDirectory {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl NetboxDirectory {
    /// Create a directory client for the inventory at `base_url`
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    fn devices_url(&self, filter: &DeviceFilter) -> Result<Url> {
        let mut url = self.base_url.join("api/dcim/devices/")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", "1000");
            if let Some(names) = &filter.names {
                for name in names {
                    query.append_pair("name", name);
                }
            }
            if let Some(platform) = &filter.platform {
                query.append_pair("platform", platform);
            }
            if let Some(site) = &filter.site {
                query.append_pair("site", site);
            }
        }
        Ok(url)
    }

    async fn fetch_page(&self, url: Url) -> Result<DeviceList> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Token {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();
        let mut next = Some(self.devices_url(filter)?);

        while let Some(url) = next {
            let page = self.fetch_page(url).await?;
            devices.extend(page.results.into_iter().filter_map(NetboxDevice::into_device_info));
            next = match page.next.as_deref() {
                Some(link) => Some(Url::parse(link)?),
                None => None,
            };
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }
}

#[async_trait]
impl DeviceDirectory for NetboxDirectory {
    async fn lookup(&self, filter: &DeviceFilter) -> std::result::Result<Vec<DeviceInfo>, ClientError> {
        self.fetch_devices(filter)
            .await
            .map_err(|e| ClientError::Directory(e.to_string()))
    }
}
