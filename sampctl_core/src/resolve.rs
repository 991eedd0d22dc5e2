use std::net::{Ipv4Addr, SocketAddr};

/// Turns host names into IPv4 addresses.
#[async_trait::async_trait]
pub trait HostResolver: Send + Sync {
    /// First IPv4 address of `host`, or `None` if it has none.
    async fn resolve_v4(&self, host: &str) -> Option<Ipv4Addr>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait::async_trait]
impl HostResolver for SystemResolver {
    async fn resolve_v4(&self, host: &str) -> Option<Ipv4Addr> {
        let addrs = match tokio::net::lookup_host((host, 0)).await {
            Ok(addrs) => addrs,
            Err(err) => {
                log::debug!("Could not resolve {}: {:?}", host, err);
                return None;
            }
        };
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(addr) => Some(*addr.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_address() {
        let ip = SystemResolver.resolve_v4("10.1.2.3").await;
        assert_eq!(ip, Some(Ipv4Addr::new(10, 1, 2, 3)));
    }
}
