use std::{
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sampctl_core::config::{QueryOptions, RconOptions};

/// Configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    /// Server to query.
    #[serde(default)]
    pub query: QueryOptions,
    /// Remote console. Defaults to the query target when omitted.
    pub rcon: Option<RconOptions>,
    /// Favourites file to operate on.
    pub favourites: Option<PathBuf>,
}

/// Reads the configuration file.
///
/// ## Arguments
///
/// * `config_file` - Config file path
/// * `required` - Whether a missing file is an error rather than an empty config
pub async fn read_config<P: AsRef<Path>>(
    config_file: P,
    required: bool,
) -> anyhow::Result<RootConfig> {
    let contents = match tokio::fs::read_to_string(config_file).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            return Ok(RootConfig::default())
        }
        Err(err) => return Err(err.into()),
    };
    let config: RootConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, time::Duration};

    use super::*;

    #[test]
    fn full_config() {
        let config: RootConfig = toml::from_str(
            r#"
            favourites = "USERDATA.DAT"

            [query]
            host = "play.example.org"
            port = 7778
            timeout_ms = 1000

            [rcon]
            ip = "10.0.0.2"
            password = "changeme"
            "#,
        )
        .unwrap();
        assert_eq!(config.query.host.as_deref(), Some("play.example.org"));
        assert_eq!(config.query.timeout, Duration::from_millis(1000));
        let rcon = config.rcon.unwrap();
        assert_eq!(rcon.ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(rcon.port, 7777);
        assert_eq!(rcon.timeout, Duration::from_millis(5000));
        assert_eq!(config.favourites, Some(PathBuf::from("USERDATA.DAT")));
    }

    #[tokio::test]
    async fn missing_optional_file() {
        let config = read_config("does-not-exist.toml", false).await.unwrap();
        assert!(config.rcon.is_none());
        assert!(read_config("does-not-exist.toml", true).await.is_err());
    }
}
