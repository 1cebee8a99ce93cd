//! NetBox REST client.
//!
//! Thin blocking wrapper over the NetBox IPAM endpoints, called directly
//! against the REST paths.

use super::types::{
    AvailablePrefixRequest, Page, Prefix, PrefixTagsUpdate, Vrf, WritablePrefix, WritableVrf,
};
use super::{Ipam, IpamAdmin};
use crate::config::NetboxConfig;
use crate::error::IpamError;
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Characters of an error body kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// `available-prefixes` answers with an object or a list depending on the
/// NetBox release
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Blocking NetBox API client
#[derive(Debug, Clone)]
pub struct NetboxClient {
    http: Client,
    base_url: String,
    token: String,
}

impl NetboxClient {
    /// Build a client for the configured endpoint. No request is made.
    pub fn new(config: &NetboxConfig) -> Result<Self, IpamError> {
        let base_url = config.base_url();
        debug!("Initializing NetBox client for {}", base_url);
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| IpamError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            token: config.app_id.clone(),
        })
    }

    /// Check the endpoint and token with a cheap authenticated request
    pub fn validate_connection(&self) -> Result<(), IpamError> {
        debug!("Validating NetBox connection by listing DCIM racks");
        let page: Page<serde_json::Value> =
            self.get_json("/api/dcim/racks/", &[("limit", "1".to_string())])?;
        debug!("NetBox reachable, {} racks visible", page.count);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/json")
            .header("Authorization", format!("Token {}", self.token))
    }

    fn send(&self, url: &str, builder: RequestBuilder) -> Result<Response, IpamError> {
        builder.send().map_err(|source| IpamError::Http {
            url: url.to_string(),
            source,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, IpamError> {
        let url = self.url(path);
        let response = self.send(&url, self.request(Method::GET, &url).query(query))?;
        if !response.status().is_success() {
            return Err(status_error(&url, response));
        }
        decode(&url, response)
    }

    /// Fetch every page of a list endpoint
    fn list_all<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>, IpamError> {
        let mut page: Page<T> = self.get_json(path, query)?;
        let mut results = std::mem::take(&mut page.results);

        while let Some(next) = page.next.take() {
            debug!("Following pagination link {}", next);
            let response = self.send(&next, self.request(Method::GET, &next))?;
            if !response.status().is_success() {
                return Err(status_error(&next, response));
            }
            page = decode(&next, response)?;
            results.append(&mut page.results);
        }
        Ok(results)
    }

    fn send_json<B: serde::Serialize>(&self, method: Method, path: &str, body: &B) -> Result<(String, Response), IpamError> {
        let url = self.url(path);
        if let Ok(json) = serde_json::to_string(body) {
            debug!("{} {} body {}", method, url, json);
        }
        let response = self.send(&url, self.request(method, &url).json(body))?;
        Ok((url, response))
    }

    fn delete(&self, path: &str) -> Result<StatusCode, IpamError> {
        let url = self.url(path);
        let response = self.send(&url, self.request(Method::DELETE, &url))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(status);
        }
        Err(status_error(&url, response))
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, IpamError> {
    let body = response.text().map_err(|source| IpamError::Http {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| IpamError::Decode {
        url: url.to_string(),
        source,
    })
}

fn status_error(url: &str, response: Response) -> IpamError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    IpamError::Status {
        url: url.to_string(),
        status,
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}

impl Ipam for NetboxClient {
    fn lookup_vrfs_by_name(&self, name: &str) -> Result<Vec<Vrf>, IpamError> {
        debug!("Looking up VRF {}", name);
        self.list_all("/api/ipam/vrfs/", &[("name", name.to_string())])
    }

    fn lookup_pool_prefixes(&self, cidr: &str, vrf_id: i64) -> Result<Vec<Prefix>, IpamError> {
        debug!("Looking up pool {} in VRF id {}", cidr, vrf_id);
        self.list_all(
            "/api/ipam/prefixes/",
            &[
                ("prefix", cidr.to_string()),
                ("vrf_id", vrf_id.to_string()),
                ("is_pool", "true".to_string()),
            ],
        )
    }

    fn allocate_sub_prefix(&self, pool_id: i64, length: u8, tags: &[String]) -> Result<Prefix, IpamError> {
        let path = format!("/api/ipam/prefixes/{}/available-prefixes/", pool_id);
        let body = AvailablePrefixRequest {
            prefix_length: length,
            tags,
        };
        let (url, response) = self.send_json(Method::POST, &path, &body)?;
        debug!("Available prefix request answered with {}", response.status());

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => match decode::<OneOrMany<Prefix>>(&url, response)? {
                OneOrMany::One(prefix) => Ok(prefix),
                OneOrMany::Many(prefixes) => prefixes
                    .into_iter()
                    .next()
                    .ok_or(IpamError::Exhausted { pool_id, length }),
            },
            // Older releases answer 204 with a detail message, newer ones 409.
            StatusCode::NO_CONTENT | StatusCode::CONFLICT => Err(IpamError::Exhausted { pool_id, length }),
            _ => Err(status_error(&url, response)),
        }
    }

    fn read_prefix(&self, id: i64) -> Result<Option<Prefix>, IpamError> {
        let url = self.url(&format!("/api/ipam/prefixes/{}/", id));
        debug!("Reading prefix {}", id);
        let response = self.send(&url, self.request(Method::GET, &url))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => decode(&url, response).map(Some),
            _ => Err(status_error(&url, response)),
        }
    }

    fn update_prefix_tags(&self, id: i64, cidr: &str, tags: &[String]) -> Result<Prefix, IpamError> {
        let path = format!("/api/ipam/prefixes/{}/", id);
        let body = PrefixTagsUpdate { prefix: cidr, tags };
        let (url, response) = self.send_json(Method::PATCH, &path, &body)?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(IpamError::NotFound { kind: "prefix", id }),
            status if status.is_success() => decode(&url, response),
            _ => Err(status_error(&url, response)),
        }
    }

    fn delete_prefix(&self, id: i64) -> Result<(), IpamError> {
        debug!("Deleting prefix with ID {}", id);
        match self.delete(&format!("/api/ipam/prefixes/{}/", id))? {
            StatusCode::NOT_FOUND => Err(IpamError::NotFound { kind: "prefix", id }),
            _ => Ok(()),
        }
    }
}

impl IpamAdmin for NetboxClient {
    fn list_vrfs(&self) -> Result<Vec<Vrf>, IpamError> {
        self.list_all("/api/ipam/vrfs/", &[])
    }

    fn create_vrf(&self, name: &str) -> Result<Vrf, IpamError> {
        let body = WritableVrf {
            name,
            enforce_unique: true,
            tags: Vec::new(),
        };
        let (url, response) = self.send_json(Method::POST, "/api/ipam/vrfs/", &body)?;
        if !response.status().is_success() {
            return Err(status_error(&url, response));
        }
        decode(&url, response)
    }

    fn delete_vrf(&self, id: i64) -> Result<(), IpamError> {
        match self.delete(&format!("/api/ipam/vrfs/{}/", id))? {
            StatusCode::NOT_FOUND => Err(IpamError::NotFound { kind: "vrf", id }),
            _ => Ok(()),
        }
    }

    fn list_prefixes(&self) -> Result<Vec<Prefix>, IpamError> {
        self.list_all("/api/ipam/prefixes/", &[])
    }

    fn create_prefix(&self, cidr: &str, vrf_id: Option<i64>, is_pool: bool) -> Result<Prefix, IpamError> {
        let body = WritablePrefix {
            prefix: cidr,
            vrf: vrf_id,
            is_pool,
            tags: Vec::new(),
        };
        let (url, response) = self.send_json(Method::POST, "/api/ipam/prefixes/", &body)?;
        if !response.status().is_success() {
            return Err(status_error(&url, response));
        }
        decode(&url, response)
    }
}
