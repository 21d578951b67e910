//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by the pipeline:
//! - Building the shared HTTP client from configuration
//! - GET requests for listing pages (chapter list, image list, cover feed)
//! - Bounded downloads of image files into the sandbox

use crate::config::HttpConfig;
use crate::sandbox::Sandbox;
use crate::{CbzError, Result};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{header::CONTENT_LENGTH, redirect::Policy, Client, Response};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP client configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use cbz_stream::config::HttpConfig;
/// use cbz_stream::pipeline::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .build()
}

/// Sends a GET request and rejects any non-success status
async fn get(client: &Client, url: &Url) -> Result<Response> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| CbzError::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(CbzError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Fetches a listing page and returns its raw body
///
/// Listing pages (chapter list, image list, cover feed) are buffered whole: the
/// markup parser needs the complete document before it can select links. Their size
/// is bounded by the request timeout only. Image bodies never take this path; they
/// are streamed to the sandbox by [`fetch_to_sandbox`].
pub async fn fetch_page(client: &Client, url: &Url) -> Result<Bytes> {
    let response = get(client, url).await?;
    let body = response.bytes().await.map_err(|source| CbzError::Http {
        url: url.to_string(),
        source,
    })?;

    tracing::debug!("Fetched {} ({} bytes)", url, body.len());
    Ok(body)
}

/// Downloads a file into the sandbox, trusting the declared length
///
/// The response must carry a parsable `Content-Length`. At most that many bytes
/// are accepted; a longer body or an empty one is a size error.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The file to download
/// * `sandbox` - Where the file is written
/// * `name` - The sandbox file name; must not exist yet
///
/// # Returns
///
/// The number of bytes written
pub async fn fetch_to_sandbox(
    client: &Client,
    url: &Url,
    sandbox: &Sandbox,
    name: &str,
) -> Result<u64> {
    let response = get(client, url).await?;
    let declared = declared_length(&response, url)?;

    let mut file = sandbox.create(name).await?;
    let mut body = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|source| CbzError::Http {
            url: url.to_string(),
            source,
        })?;

        written += chunk.len() as u64;
        if written > declared {
            return Err(CbzError::Size {
                url: url.to_string(),
                message: format!("body exceeds declared length of {} bytes", declared),
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(CbzError::Size {
            url: url.to_string(),
            message: "no data".to_string(),
        });
    }

    Ok(written)
}

/// Reads the `Content-Length` header of a response
fn declared_length(response: &Response, url: &Url) -> Result<u64> {
    let size_err = |message: &str| CbzError::Size {
        url: url.to_string(),
        message: message.to_string(),
    };

    let value = response
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or_else(|| size_err("missing Content-Length"))?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| size_err("invalid Content-Length"))
}
