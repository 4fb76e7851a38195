//! Handle bridge: translate wire identities to and from live driver handles.
//!
//! Live handles are acquired through [`DomainGuard`]/[`NetworkGuard`], scoped
//! owners that release the underlying handle on every exit path — including
//! early returns and driver failures — via `Drop`. `Destroy` is the one
//! operation that consumes the handle instead of merely using it; callers
//! take the guard's inner value with [`DomainGuard::into_destroyed`] before
//! the driver call, which neutralises the guard so `Drop` does not also try
//! to release it.

use std::sync::Arc;

use crate::driver::{ConnId, Domain, DriverFacade, Network};
use crate::wire::{Reader, WireError, Writer};

/// Wire descriptor identifying a domain: name, UUID, and a client-supplied id.
///
/// The `id` field is a known trust-the-client point: [`get_nonnull_domain`]
/// resolves by `(name, uuid)` and then *overwrites* the resolved handle's id
/// with whatever the client sent, rather than verifying the two agree. This
/// mirrors the original dispatcher's behavior; it is preserved deliberately,
/// not by oversight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDesc {
    /// Domain name.
    pub name: String,
    /// 16-byte UUID.
    pub uuid: [u8; 16],
    /// Client-supplied numeric id; trusted, not verified. See struct docs.
    pub id: i32,
}

/// Wire descriptor identifying a network: name and UUID only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDesc {
    /// Network name.
    pub name: String,
    /// 16-byte UUID.
    pub uuid: [u8; 16],
}

/// Resolve a wire [`DomainDesc`] to a live, guarded [`Domain`] handle.
///
/// Returns `None` if the driver facade cannot locate the object; callers
/// translate that into a dispatch-level "domain not found" error.
pub async fn get_nonnull_domain(
    driver: &Arc<dyn DriverFacade>,
    conn: ConnId,
    desc: &DomainDesc,
) -> Option<DomainGuard> {
    let mut domain = driver.domain_lookup_by_uuid(conn, &desc.uuid).await?;
    // Trust-the-client point (see `DomainDesc` docs): overwrite rather than verify.
    domain.id = desc.id;
    Some(DomainGuard::new(Arc::clone(driver), conn, domain))
}

/// Resolve a wire [`NetworkDesc`] to a live, guarded [`Network`] handle.
pub async fn get_nonnull_network(
    driver: &Arc<dyn DriverFacade>,
    conn: ConnId,
    desc: &NetworkDesc,
) -> Option<NetworkGuard> {
    let network = driver.network_lookup_by_uuid(conn, &desc.uuid).await?;
    Some(NetworkGuard::new(Arc::clone(driver), conn, network))
}

/// Copy the wire-relevant fields out of a live domain handle into an owned
/// descriptor, for serialization into a reply.
#[must_use]
pub fn make_nonnull_domain(domain: &Domain) -> DomainDesc {
    DomainDesc {
        name: domain.name.clone(),
        uuid: domain.uuid,
        id: domain.id,
    }
}

/// Copy the wire-relevant fields out of a live network handle into an owned
/// descriptor, for serialization into a reply.
#[must_use]
pub fn make_nonnull_network(network: &Network) -> NetworkDesc {
    NetworkDesc {
        name: network.name.clone(),
        uuid: network.uuid,
    }
}

/// Decode a wire [`DomainDesc`]: name, UUID, then the client-supplied id.
pub fn read_domain_desc(reader: &mut Reader<'_>) -> Result<DomainDesc, WireError> {
    Ok(DomainDesc {
        name: reader.read_string("domain.name", crate::wire::caps::STRING_MAX)?,
        uuid: reader.read_fixed_opaque::<16>()?,
        id: reader.read_i32()?,
    })
}

/// Encode a wire [`DomainDesc`].
pub fn encode_domain_desc(writer: &mut Writer, desc: &DomainDesc) {
    writer.write_string(&desc.name);
    writer.write_fixed_opaque(&desc.uuid);
    writer.write_i32(desc.id);
}

/// Decode a wire [`NetworkDesc`]: name then UUID.
pub fn read_network_desc(reader: &mut Reader<'_>) -> Result<NetworkDesc, WireError> {
    Ok(NetworkDesc {
        name: reader.read_string("network.name", crate::wire::caps::STRING_MAX)?,
        uuid: reader.read_fixed_opaque::<16>()?,
    })
}

/// Encode a wire [`NetworkDesc`].
pub fn encode_network_desc(writer: &mut Writer, desc: &NetworkDesc) {
    writer.write_string(&desc.name);
    writer.write_fixed_opaque(&desc.uuid);
}

/// Scoped owner of a live [`Domain`] handle. Releases the handle through the
/// driver facade on drop unless [`into_destroyed`](Self::into_destroyed) has
/// already consumed it.
pub struct DomainGuard {
    facade: Arc<dyn DriverFacade>,
    conn: ConnId,
    domain: Option<Domain>,
}

impl DomainGuard {
    fn new(facade: Arc<dyn DriverFacade>, conn: ConnId, domain: Domain) -> Self {
        Self {
            facade,
            conn,
            domain: Some(domain),
        }
    }

    /// Borrow the live domain.
    ///
    /// # Panics
    ///
    /// Panics if called after [`into_destroyed`](Self::into_destroyed) has
    /// already taken the domain — callers never hold a guard past that
    /// point, since `into_destroyed` consumes `self`.
    #[must_use]
    #[expect(clippy::expect_used, reason = "into_destroyed consumes self, so a live guard always still holds the domain")]
    pub fn get(&self) -> &Domain {
        self.domain.as_ref().expect("guard used after destroy")
    }

    /// Take ownership of the inner domain ahead of a `Destroy` call, which
    /// consumes the handle in the driver. This neutralises the guard so its
    /// `Drop` impl does not also try to release an already-destroyed handle.
    ///
    /// # Panics
    ///
    /// Never panics in practice: `self` is consumed by value and this is the
    /// only place `domain` is taken, so the `Option` is always `Some` here.
    #[must_use]
    #[expect(clippy::expect_used, reason = "self is consumed by value; domain is always Some on first (and only) call")]
    pub fn into_destroyed(mut self) -> Domain {
        self.domain.take().expect("guard used after destroy")
    }
}

impl Drop for DomainGuard {
    fn drop(&mut self) {
        if let Some(domain) = self.domain.take() {
            self.facade.release_domain(self.conn, domain);
        }
    }
}

/// Scoped owner of a live [`Network`] handle; same release-on-drop discipline
/// as [`DomainGuard`]. Networks have no `Destroy`-style consuming operation
/// in this catalogue, so there is no `into_destroyed` twin.
pub struct NetworkGuard {
    facade: Arc<dyn DriverFacade>,
    conn: ConnId,
    network: Option<Network>,
}

impl NetworkGuard {
    fn new(facade: Arc<dyn DriverFacade>, conn: ConnId, network: Network) -> Self {
        Self {
            facade,
            conn,
            network: Some(network),
        }
    }

    /// Borrow the live network.
    ///
    /// # Panics
    ///
    /// Never panics in practice: networks have no consuming operation that
    /// takes the inner value early, so a live guard always still holds it.
    #[must_use]
    #[expect(clippy::expect_used, reason = "nothing takes network out of a live guard before drop")]
    pub fn get(&self) -> &Network {
        self.network.as_ref().expect("guard used after release")
    }
}

impl Drop for NetworkGuard {
    fn drop(&mut self) {
        if let Some(network) = self.network.take() {
            self.facade.release_network(self.conn, network);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::MockDriver;

    #[tokio::test]
    async fn lookup_overwrites_client_supplied_id() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [7_u8; 16];
        driver.seed_domain(conn, "vm1", uuid, 3).await;

        let desc = DomainDesc {
            name: "vm1".to_owned(),
            uuid,
            id: 999,
        };
        let guard = get_nonnull_domain(&driver, conn, &desc).await.unwrap();
        assert_eq!(guard.get().id, 999, "client-supplied id overwrites the resolved one");
    }

    #[tokio::test]
    async fn lookup_miss_returns_none() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let desc = DomainDesc {
            name: "missing".to_owned(),
            uuid: [0_u8; 16],
            id: 0,
        };
        assert!(get_nonnull_domain(&driver, conn, &desc).await.is_none());
    }

    #[tokio::test]
    async fn guard_release_restores_refcount_on_drop() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [9_u8; 16];
        driver.seed_domain(conn, "vm2", uuid, 1).await;

        let before = driver.refcount(conn, uuid).await;
        {
            let desc = DomainDesc {
                name: "vm2".to_owned(),
                uuid,
                id: 1,
            };
            let _guard = get_nonnull_domain(&driver, conn, &desc).await.unwrap();
            assert_eq!(driver.refcount(conn, uuid).await, before + 1);
        }
        assert_eq!(driver.refcount(conn, uuid).await, before);
    }
}
