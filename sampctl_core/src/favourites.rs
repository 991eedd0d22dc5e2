use std::{io, path::Path};

use bytes::Bytes;

use proto::favourites::{self, FavouritesError};

pub use proto::favourites::FavouriteServer;

#[derive(Debug, thiserror::Error)]
pub enum FavouriteListError {
    /// An entry with the same ip and port is already in the list.
    #[error("server {ip}:{port} is already a favourite")]
    Duplicate { ip: String, port: u32 },
    #[error(transparent)]
    Format(#[from] FavouritesError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A server to add to a [`FavouriteList`]. Unset fields get defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFavourite {
    pub ip: String,
    pub port: u32,
    pub name: Option<String>,
    pub password: Option<String>,
    pub rcon_password: Option<String>,
}

/// Ordered favourite servers. No two entries share an ip and port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavouriteList {
    servers: Vec<FavouriteServer>,
}

impl NewFavourite {
    pub fn new(ip: impl Into<String>, port: u32) -> Self {
        Self {
            ip: ip.into(),
            port,
            ..Self::default()
        }
    }
}

impl FavouriteList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from records, keeping the first of any duplicates.
    pub fn from_servers(servers: impl IntoIterator<Item = FavouriteServer>) -> Self {
        let mut list = Self::new();
        for server in servers {
            if list.has(&server.ip, server.port) {
                log::debug!("Dropping duplicate favourite {}:{}", server.ip, server.port);
                continue;
            }
            list.servers.push(server);
        }
        list
    }

    /// Decodes the contents of a favourites file.
    pub fn from_bytes(data: Bytes) -> Result<Self, FavouriteListError> {
        Ok(Self::from_servers(favourites::deserialize(data)?))
    }

    /// Encodes the list in favourites file format, in list order.
    pub fn to_bytes(&self) -> Result<Bytes, FavouriteListError> {
        Ok(favourites::serialize(&self.servers)?)
    }

    /// Reads a favourites file.
    ///
    /// ## Arguments
    ///
    /// * `path` - File path, usually `USERDATA.DAT`
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, FavouriteListError> {
        let data = tokio::fs::read(path).await?;
        Self::from_bytes(Bytes::from(data))
    }

    /// Writes the list to a favourites file, replacing its contents.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FavouriteListError> {
        let data = self.to_bytes()?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    pub fn has(&self, ip: &str, port: u32) -> bool {
        self.get(ip, port).is_some()
    }

    pub fn get(&self, ip: &str, port: u32) -> Option<&FavouriteServer> {
        self.servers.iter().find(|server| server.is(ip, port))
    }

    /// Appends a server.
    ///
    /// A missing name becomes a placeholder naming the address, missing
    /// passwords become empty. The list is left untouched on error.
    pub fn add(&mut self, entry: NewFavourite) -> Result<&FavouriteServer, FavouriteListError> {
        if self.has(&entry.ip, entry.port) {
            return Err(FavouriteListError::Duplicate {
                ip: entry.ip,
                port: entry.port,
            });
        }
        let name = entry
            .name
            .unwrap_or_else(|| format!("(Retrieving info...) {}:{}", entry.ip, entry.port));
        self.servers.push(FavouriteServer {
            ip: entry.ip,
            port: entry.port,
            name,
            password: entry.password.unwrap_or_default(),
            rcon_password: entry.rcon_password.unwrap_or_default(),
        });
        Ok(&self.servers[self.servers.len() - 1])
    }

    /// Removes a server, returning it if it was present.
    pub fn remove(&mut self, ip: &str, port: u32) -> Option<FavouriteServer> {
        let index = self.servers.iter().position(|server| server.is(ip, port))?;
        Some(self.servers.remove(index))
    }

    /// Entries in insertion order, which is also file order.
    pub fn servers(&self) -> &[FavouriteServer] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FavouriteList {
        let mut list = FavouriteList::new();
        list.add(NewFavourite::new("127.0.0.1", 7777)).unwrap();
        list.add(NewFavourite {
            name: Some("Roleplay".to_owned()),
            password: Some("join".to_owned()),
            rcon_password: Some("admin".to_owned()),
            ..NewFavourite::new("play.example.org", 7778)
        })
        .unwrap();
        list
    }

    #[test]
    fn add_fills_defaults() {
        let list = sample();
        let local = list.get("127.0.0.1", 7777).unwrap();
        assert_eq!(local.name, "(Retrieving info...) 127.0.0.1:7777");
        assert_eq!(local.password, "");
        assert_eq!(local.rcon_password, "");
        let remote = list.get("play.example.org", 7778).unwrap();
        assert_eq!(remote.name, "Roleplay");
        assert_eq!(remote.rcon_password, "admin");
    }

    #[test]
    fn duplicate_is_rejected_without_change() {
        let mut list = sample();
        let before = list.clone();
        let res = list.add(NewFavourite {
            name: Some("Other".to_owned()),
            ..NewFavourite::new("127.0.0.1", 7777)
        });
        assert!(matches!(
            res,
            Err(FavouriteListError::Duplicate { ref ip, port: 7777 }) if ip == "127.0.0.1"
        ));
        assert_eq!(list, before);
    }

    #[test]
    fn identity_is_ip_and_port() {
        let mut list = sample();
        assert!(list.has("127.0.0.1", 7777));
        assert!(!list.has("127.0.0.1", 7778));
        assert!(!list.has("127.0.0.2", 7777));
        list.add(NewFavourite::new("127.0.0.1", 7778)).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.servers()[2].port, 7778);
    }

    #[test]
    fn remove_entry() {
        let mut list = sample();
        let removed = list.remove("127.0.0.1", 7777).unwrap();
        assert_eq!(removed.port, 7777);
        assert!(!list.has("127.0.0.1", 7777));
        assert!(list.remove("127.0.0.1", 7777).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn bytes_round_trip() {
        let list = sample();
        let decoded = FavouriteList::from_bytes(list.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.servers()[0].ip, "127.0.0.1");
    }

    #[test]
    fn from_servers_drops_duplicates() {
        let server = FavouriteServer {
            ip: "1.2.3.4".to_owned(),
            port: 7777,
            name: "First".to_owned(),
            password: String::new(),
            rcon_password: String::new(),
        };
        let copy = FavouriteServer {
            name: "Second".to_owned(),
            ..server.clone()
        };
        let list = FavouriteList::from_servers([server, copy]);
        assert_eq!(list.len(), 1);
        assert_eq!(list.servers()[0].name, "First");
    }

    #[test]
    fn bad_file() {
        let res = FavouriteList::from_bytes(Bytes::from_static(b"SAMP\x07\x00\x00\x00"));
        assert!(matches!(
            res,
            Err(FavouriteListError::Format(FavouritesError::UnsupportedVersion(7)))
        ));
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("USERDATA.DAT");
        let list = sample();
        list.save(&path).await.unwrap();
        assert_eq!(FavouriteList::load(&path).await.unwrap(), list);
    }

    #[tokio::test]
    async fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = FavouriteList::load(dir.path().join("missing.dat")).await;
        assert!(matches!(res, Err(FavouriteListError::Io(_))));
    }
}
