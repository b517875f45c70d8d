//! Configuration for the strata server.
//!
//! Values are layered, lowest precedence first:
//! 1. built-in defaults ([`Config::default`]),
//! 2. a TOML file (explicit path, or `config.toml` in the platform config
//!    directory if it exists),
//! 3. environment variables prefixed with `STRATA_`, nested keys separated
//!    by a double underscore (`STRATA_SERVER__PORT=9000`,
//!    `STRATA_STORAGE__BUNDLE_FORMAT=zstd`).
//!
//! ```toml
//! download_prefix = "/download/"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8081
//!
//! [storage]
//! low_dir = "/srv/strata/low_storage"
//! deep_dir = "/srv/strata/deep_storage"
//! bundle_format = "zstd"
//!
//! [index]
//! backend = "sqlite"
//! path = "/srv/strata/storage.db"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Deserializer};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use strata_compress::Compression;
use strata_index::Backend;

const ENV_PREFIX: &str = "STRATA_";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub index: IndexConfig,
    /// Leading part of every file URL; starts and ends with `/`.
    pub download_prefix: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            index: IndexConfig::default(),
            download_prefix: "/download/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Backend URL shown on the listing page; derived from host and port
    /// when unset.
    pub public_url: Option<String>,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8081,
            public_url: None,
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub low_dir: PathBuf,
    pub deep_dir: PathBuf,
    #[serde(deserialize_with = "compression")]
    pub bundle_format: Compression,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            low_dir: PathBuf::from("./storage/low_storage"),
            deep_dir: PathBuf::from("./storage/deep_storage"),
            bundle_format: Compression::Gzip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: Backend,
    pub path: PathBuf,
}
impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            path: PathBuf::from("./storage/storage.data"),
        }
    }
}

/// Accept any name [`Compression`] parses (`gz`, `zstd`, `bzip2`, ...).
fn compression<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Compression, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.parse::<Compression>().map_err(|err| serde::de::Error::custom(&*err))
}

impl Config {
    /// Location of the configuration file used when none is given.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "strata").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Layered sources without extraction, for callers that want to add
    /// providers of their own.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    ///
    /// An explicit `file` must exist; otherwise the default path is used
    /// only if present.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        match &file {
            Some(path) => tracing::info!(path = %path.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file, using defaults and environment"),
        }
        let config: Self = Self::figment(file.as_deref())
            .extract()
            .map_err(|err| ErrorKind::Load(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the server can't run with.
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.download_prefix;
        if !prefix.starts_with('/') || !prefix.ends_with('/') {
            exn::bail!(ErrorKind::Invalid(format!("download_prefix {prefix:?} must start and end with '/'")));
        }
        // Route syntax characters.
        if prefix.contains([':', '*', '{', '}']) {
            exn::bail!(ErrorKind::Invalid(format!("download_prefix {prefix:?} contains reserved characters")));
        }
        if self.storage.low_dir == self.storage.deep_dir {
            exn::bail!(ErrorKind::Invalid("storage.low_dir and storage.deep_dir must differ".to_string()));
        }
        if !self.storage.bundle_format.is_compressed() {
            exn::bail!(ErrorKind::Invalid(format!(
                "storage.bundle_format `{}` does not compress",
                self.storage.bundle_format
            )));
        }
        if self.server.max_upload_bytes == 0 {
            exn::bail!(ErrorKind::Invalid("server.max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Backend URL advertised on the listing page, without a trailing slash.
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.socket_addr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    fn load(file: Option<&str>) -> std::result::Result<Config, figment::Error> {
        Config::load(file.map(Path::new)).map_err(|err| format!("{err:?}").into())
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8081");
        assert_eq!(config.public_url(), "http://0.0.0.0:8081");
        assert_eq!(config.storage.bundle_format, Compression::Gzip);
        assert_eq!(config.index.backend, Backend::File);
    }

    #[test]
    fn file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "strata.toml",
                r#"
                    download_prefix = "/files/"

                    [server]
                    host = "127.0.0.1"
                    port = 9000
                    public_url = "https://files.example.com/"

                    [storage]
                    bundle_format = "bz2"

                    [index]
                    backend = "sqlite"
                    path = "index.db"
                "#,
            )?;
            jail.set_env("STRATA_SERVER__PORT", "9100");
            jail.set_env("STRATA_STORAGE__DEEP_DIR", "/srv/deep");

            let config = load(Some("strata.toml"))?;
            assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9100");
            assert_eq!(config.public_url(), "https://files.example.com");
            assert_eq!(config.download_prefix, "/files/");
            assert_eq!(config.storage.bundle_format, Compression::Bzip2);
            assert_eq!(config.storage.deep_dir, PathBuf::from("/srv/deep"));
            assert_eq!(config.storage.low_dir, PathBuf::from("./storage/low_storage"));
            assert_eq!(config.index.backend, Backend::Sqlite);
            assert_eq!(config.index.path, PathBuf::from("index.db"));
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        Jail::expect_with(|_| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::MissingFile(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("STRATA_DOWNLOAD_PREFIX", "download")]
    #[case("STRATA_DOWNLOAD_PREFIX", "/download")]
    #[case("STRATA_DOWNLOAD_PREFIX", "/:file/")]
    #[case("STRATA_STORAGE__BUNDLE_FORMAT", "none")]
    #[case("STRATA_STORAGE__LOW_DIR", "./storage/deep_storage")]
    #[case("STRATA_SERVER__MAX_UPLOAD_BYTES", "0")]
    fn invalid_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            jail.set_env(key, value);
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)), "{err:?}");
            Ok(())
        });
    }

    #[rstest]
    #[case("STRATA_STORAGE__BUNDLE_FORMAT", "lz4")]
    #[case("STRATA_INDEX__BACKEND", "redis")]
    #[case("STRATA_SERVER__PORT", "not-a-port")]
    fn malformed_values_fail_to_load(#[case] key: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            jail.set_env(key, value);
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load(_)), "{err:?}");
            Ok(())
        });
    }
}
