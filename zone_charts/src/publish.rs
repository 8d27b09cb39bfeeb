//! Where rendered documents go: a local directory or a remote blob container.
//!
//! The mode is picked once at construction; every publish returns the location
//! (file path or blob URL). Nothing is retried.

use std::{fs, path::PathBuf};

use reqwest::{Url, blocking::Client, header::CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_secret_env_var;
use snafu::ResultExt;
use tracing::info;
use zone_store::config::PublishCfg;

use crate::{
    error::{
        InvalidContainerUrlSnafu, IoSnafu, MissingCredentialsSnafu, PublishError, RejectedSnafu,
        RequestSnafu,
    },
    naming::{OutputKind, file_name},
};

/// Stores one rendered output under a name and reports where it went.
pub trait Publisher {
    /// `stem` has no extension; `kind` decides it.
    fn publish(&self, bytes: &[u8], stem: &str, kind: OutputKind) -> Result<String, PublishError>;
}

/// Writes files under a fixed directory.
#[derive(Debug, Clone)]
pub struct LocalDir {
    root: PathBuf,
}

impl LocalDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Publisher for LocalDir {
    fn publish(&self, bytes: &[u8], stem: &str, kind: OutputKind) -> Result<String, PublishError> {
        fs::create_dir_all(&self.root).context(IoSnafu { path: &self.root })?;
        let path = self.root.join(file_name(stem, kind));
        fs::write(&path, bytes).context(IoSnafu { path: &path })?;
        info!(path = %path.display(), bytes = bytes.len(), "chart written");
        Ok(path.display().to_string())
    }
}

/// Uploads block blobs with a SAS-authorized `PUT`.
pub struct BlobContainer {
    client: Client,
    /// `scheme://host/container`, no query.
    base: String,
    sas: SecretString,
}

impl BlobContainer {
    /// `sas_url` is the storage account (or container) URL carrying a SAS query.
    /// A URL without a path uses `container`; a URL with a path names the container itself.
    pub fn new(sas_url: &SecretString, container: &str) -> Result<Self, PublishError> {
        let mut url = Url::parse(sas_url.expose_secret().trim()).map_err(|e| {
            InvalidContainerUrlSnafu {
                message: e.to_string(),
            }
            .build()
        })?;
        let sas = match url.query() {
            Some(q) if !q.is_empty() => SecretString::from(q.to_string()),
            _ => {
                return InvalidContainerUrlSnafu {
                    message: "missing SAS query string",
                }
                .fail();
            }
        };
        url.set_query(None);
        url.set_fragment(None);

        let path = url.path().trim_matches('/').to_string();
        let host = url.host_str().ok_or_else(|| {
            InvalidContainerUrlSnafu {
                message: "missing host",
            }
            .build()
        })?;
        let origin = match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };
        let container = if path.is_empty() { container.trim() } else { path.as_str() };
        if container.is_empty() {
            return InvalidContainerUrlSnafu {
                message: "no container name",
            }
            .fail();
        }

        let client = Client::builder().build().context(RequestSnafu)?;
        Ok(Self {
            client,
            base: format!("{origin}/{container}"),
            sas,
        })
    }

    /// Credentials from the environment variable named in `cfg`.
    pub fn from_env(cfg: &PublishCfg) -> Result<Self, PublishError> {
        let sas_url = get_secret_env_var(&cfg.credentials_env).context(MissingCredentialsSnafu)?;
        Self::new(&sas_url, &cfg.container)
    }

    /// Public URL of a blob, without credentials.
    pub fn blob_url(&self, blob_name: &str) -> String {
        format!("{}/{blob_name}", self.base)
    }
}

impl Publisher for BlobContainer {
    fn publish(&self, bytes: &[u8], stem: &str, kind: OutputKind) -> Result<String, PublishError> {
        let name = file_name(stem, kind);
        let location = self.blob_url(&name);
        let response = self
            .client
            .put(format!("{location}?{}", self.sas.expose_secret()))
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, kind.content_type())
            .body(bytes.to_vec())
            .send()
            .map_err(reqwest::Error::without_url)
            .context(RequestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return RejectedSnafu {
                name,
                status: status.as_u16(),
                body,
            }
            .fail();
        }
        info!(url = %location, bytes = bytes.len(), "chart uploaded");
        Ok(location)
    }
}

/// Local directory when `local_only`, otherwise the remote container from the environment.
pub fn from_config(cfg: &PublishCfg, local_only: bool) -> Result<Box<dyn Publisher>, PublishError> {
    if local_only {
        Ok(Box::new(LocalDir::new(&cfg.local_dir)))
    } else {
        Ok(Box::new(BlobContainer::from_env(cfg)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn local_dir_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = LocalDir::new(dir.path().join("nested/charts"));
        let loc = publisher.publish(b"<html></html>", "AAPL_demand_30min_x", OutputKind::Html).unwrap();
        assert!(loc.ends_with("AAPL_demand_30min_x.html"));
        assert_eq!(fs::read(&loc).unwrap(), b"<html></html>");
    }

    #[test]
    fn account_url_uses_configured_container() {
        let blob = BlobContainer::new(
            &secret("https://acct.blob.core.windows.net/?sv=2024&sig=abc"),
            "trading-charts",
        )
        .unwrap();
        assert_eq!(
            blob.blob_url("a.html"),
            "https://acct.blob.core.windows.net/trading-charts/a.html"
        );
        assert_eq!(blob.sas.expose_secret(), "sv=2024&sig=abc");
    }

    #[test]
    fn container_url_wins_over_config() {
        let blob = BlobContainer::new(&secret("http://127.0.0.1:10000/alerts/?sig=x"), "ignored").unwrap();
        assert_eq!(blob.blob_url("b.png"), "http://127.0.0.1:10000/alerts/b.png");
    }

    #[test]
    fn url_without_sas_is_rejected() {
        let err = BlobContainer::new(&secret("https://acct.blob.core.windows.net/c"), "c")
            .err()
            .unwrap();
        assert!(matches!(err, PublishError::InvalidContainerUrl { .. }));
        assert!(BlobContainer::new(&secret("not a url"), "c").is_err());
    }
}
