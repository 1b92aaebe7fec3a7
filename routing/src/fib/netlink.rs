// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel routes over rtnetlink.
//!
//! Each backend owns a netlink socket opened in the network namespace of its VRF,
//! and a single-threaded tokio runtime that drives it. Routes live in the main table.

use crate::fib::kernel::{KernelError, KernelFactory, KernelOp, KernelRoute, KernelRoutes};
use crate::prefix::{AddressFamily, Prefix};
use crate::rib::route::{FibNextHop, RouteOrigin};
use futures::TryStreamExt;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sched::{CloneFlags, setns};
use nix::sys::stat::Mode;
use rtnetlink::packet_route::AddressFamily as NlFamily;
use rtnetlink::packet_route::link::LinkAttribute;
use rtnetlink::packet_route::route::{
    RouteAddress, RouteAttribute, RouteMessage, RouteNextHop, RouteProtocol, RouteScope, RouteType,
};
use rtnetlink::{Handle, RouteMessageBuilder};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

/// Where named network namespaces are mounted by `ip netns`
pub const NETNS_DIR: &str = "/run/netns";

/// The main routing table
const RT_TABLE_MAIN: u32 = 254;

fn route_address(address: IpAddr) -> RouteAddress {
    match address {
        IpAddr::V4(a) => RouteAddress::Inet(a),
        IpAddr::V6(a) => RouteAddress::Inet6(a),
    }
}

fn ip_of(address: &RouteAddress) -> Option<IpAddr> {
    match address {
        RouteAddress::Inet(a) => Some(IpAddr::V4(*a)),
        RouteAddress::Inet6(a) => Some(IpAddr::V6(*a)),
        _ => None,
    }
}

fn gateway_of(attributes: &[RouteAttribute]) -> Option<IpAddr> {
    attributes.iter().find_map(|attr| match attr {
        RouteAttribute::Gateway(address) => ip_of(address),
        _ => None,
    })
}

fn rtproto(origin: RouteOrigin) -> RouteProtocol {
    match origin {
        RouteOrigin::Connected => RouteProtocol::Kernel,
        RouteOrigin::Static => RouteProtocol::Static,
        RouteOrigin::Ospf => RouteProtocol::Ospf,
        RouteOrigin::Bgp => RouteProtocol::Bgp,
    }
}

fn origin_of(protocol: RouteProtocol) -> RouteOrigin {
    match protocol {
        RouteProtocol::Kernel => RouteOrigin::Connected,
        RouteProtocol::Ospf => RouteOrigin::Ospf,
        RouteProtocol::Bgp => RouteOrigin::Bgp,
        // routes added by hand (proto boot) count as static
        _ => RouteOrigin::Static,
    }
}

/// A message for the main table with a destination, to be completed by the caller
fn base_message(prefix: &Prefix, protocol: RouteProtocol, scope: RouteScope) -> RouteMessage {
    match prefix.as_address() {
        IpAddr::V4(address) => RouteMessageBuilder::<Ipv4Addr>::new()
            .destination_prefix(address, prefix.length())
            .table_id(RT_TABLE_MAIN)
            .protocol(protocol)
            .scope(scope)
            .build(),
        IpAddr::V6(address) => RouteMessageBuilder::<Ipv6Addr>::new()
            .destination_prefix(address, prefix.length())
            .table_id(RT_TABLE_MAIN)
            .protocol(protocol)
            .scope(scope)
            .build(),
    }
}

/// The message to add or replace a route. A single next-hop goes in the header
/// attributes, several go in a multipath attribute with weight 1 each.
pub(crate) fn route_message(route: &KernelRoute) -> RouteMessage {
    let scope = match route.nexthops.as_slice() {
        [nh] if nh.gateway.is_none() => RouteScope::Link,
        _ => RouteScope::Universe,
    };
    let mut message = base_message(&route.prefix, rtproto(route.protocol), scope);
    match route.nexthops.as_slice() {
        [] => {}
        [nh] => {
            message.attributes.push(RouteAttribute::Oif(nh.ifindex));
            if let Some(gw) = nh.gateway {
                message
                    .attributes
                    .push(RouteAttribute::Gateway(route_address(gw)));
            }
        }
        nhops => {
            let multipath = nhops
                .iter()
                .map(|nh| {
                    let mut hop = RouteNextHop::default();
                    hop.interface_index = nh.ifindex;
                    hop.attributes = nh
                        .gateway
                        .map(|gw| vec![RouteAttribute::Gateway(route_address(gw))])
                        .unwrap_or_default();
                    hop
                })
                .collect();
            message.attributes.push(RouteAttribute::MultiPath(multipath));
        }
    }
    message
}

/// The message to delete the route for a prefix, whatever its protocol and scope
pub(crate) fn delete_message(prefix: &Prefix) -> RouteMessage {
    base_message(prefix, RouteProtocol::Unspec, RouteScope::NoWhere)
}

/// Read a unicast route of the main table. Interfaces not in `ifnames` are named after their index.
pub(crate) fn parse_route(message: &RouteMessage, ifnames: &BTreeMap<u32, String>) -> Option<KernelRoute> {
    if message.header.kind != RouteType::Unicast {
        return None;
    }
    let mut table = u32::from(message.header.table);
    let mut destination = None;
    let mut oif = None;
    let mut multipath: Vec<(Option<IpAddr>, u32)> = vec![];
    for attr in &message.attributes {
        match attr {
            RouteAttribute::Table(id) => table = *id,
            RouteAttribute::Destination(address) => destination = ip_of(address),
            RouteAttribute::Oif(ifindex) => oif = Some(*ifindex),
            RouteAttribute::MultiPath(nhops) => {
                multipath = nhops
                    .iter()
                    .map(|nh| (gateway_of(&nh.attributes), nh.interface_index))
                    .collect();
            }
            _ => {}
        }
    }
    if table != RT_TABLE_MAIN {
        return None;
    }
    let destination = destination.unwrap_or(match message.header.address_family {
        NlFamily::Inet6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    });
    let prefix = Prefix::new(destination, message.header.destination_prefix_length).ok()?;
    if multipath.is_empty() {
        multipath.extend(oif.map(|ifindex| (gateway_of(&message.attributes), ifindex)));
    }
    let nexthops = multipath
        .into_iter()
        .map(|(gateway, ifindex)| FibNextHop {
            gateway,
            ifname: ifnames
                .get(&ifindex)
                .cloned()
                .unwrap_or_else(|| ifindex.to_string()),
            ifindex,
        })
        .collect();
    Some(KernelRoute {
        prefix,
        protocol: origin_of(message.header.protocol),
        nexthops,
    })
}

fn errno_of(e: &rtnetlink::Error) -> Errno {
    match e {
        rtnetlink::Error::NetlinkError(msg) => msg.code.map_or(Errno::EIO, |code| Errno::from_raw(-code.get())),
        _ => Errno::EIO,
    }
}

fn io_errno(e: &std::io::Error) -> Errno {
    e.raw_os_error().map_or(Errno::EIO, Errno::from_raw)
}

/// Move the current thread to the network namespace mounted at `path`
fn enter_netns(path: &Path) -> Result<(), Errno> {
    let fd = open(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())?;
    setns(&fd, CloneFlags::CLONE_NEWNET)
}

/// Open a netlink connection in a namespace, from a thread that is dropped right after.
/// The socket stays in the namespace it was created in.
fn connect(netns: &str, path: Option<PathBuf>) -> Result<(Runtime, Handle), Errno> {
    std::thread::Builder::new()
        .name(format!("netns-{netns}"))
        .spawn(move || -> Result<(Runtime, Handle), Errno> {
            if let Some(path) = &path {
                enter_netns(path)?;
            }
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .enable_time()
                .build()
                .map_err(|e| io_errno(&e))?;
            let handle = {
                let _guard = runtime.enter();
                let (connection, handle, _) = rtnetlink::new_connection().map_err(|e| io_errno(&e))?;
                runtime.spawn(connection);
                handle
            };
            Ok((runtime, handle))
        })
        .map_err(|e| io_errno(&e))?
        .join()
        .map_err(|_| Errno::EIO)?
}

async fn dump(
    handle: Arc<Handle>,
    message: RouteMessage,
) -> Result<(Vec<RouteMessage>, BTreeMap<u32, String>), rtnetlink::Error> {
    let mut routes = vec![];
    let mut stream = handle.route().get(message).execute();
    while let Some(route) = stream.try_next().await? {
        routes.push(route);
    }
    let mut ifnames = BTreeMap::new();
    let mut links = handle.link().get().execute();
    while let Some(link) = links.try_next().await? {
        for attr in link.attributes {
            if let LinkAttribute::IfName(name) = attr {
                ifnames.insert(link.header.index, name);
            }
        }
    }
    Ok((routes, ifnames))
}

/// The routes of the main table of a network namespace, programmed over netlink
pub struct NetlinkKernel {
    netns: String,
    runtime: Option<Runtime>,
    handle: Arc<Handle>,
}

impl NetlinkKernel {
    /// Connect to the namespace mounted at `path`, or to the current one if `None`
    pub fn open(netns: &str, path: Option<&Path>) -> Result<Self, KernelError> {
        let (runtime, handle) = connect(netns, path.map(Path::to_path_buf)).map_err(|errno| {
            error!("Failed to open netlink socket in netns {netns}: {errno}");
            KernelError::new(KernelOp::Open, errno)
        })?;
        info!("Opened netlink socket in netns {netns}");
        Ok(Self {
            netns: netns.to_owned(),
            runtime: Some(runtime),
            handle: Arc::new(handle),
        })
    }

    /// Run a request to completion. Blocking a runtime thread from within is not
    /// allowed, so callers running on one get the request run from a scoped thread.
    fn block_on<F>(&self, op: KernelOp, request: F) -> Result<F::Output, KernelError>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or(KernelError::new(op, Errno::EBADF))?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Ok(runtime.block_on(request));
        }
        std::thread::scope(|s| s.spawn(|| runtime.block_on(request)).join())
            .map_err(|_| KernelError::new(op, Errno::EIO))
    }

    fn request<F>(&self, op: KernelOp, request: F) -> Result<(), KernelError>
    where
        F: Future<Output = Result<(), rtnetlink::Error>> + Send,
    {
        self.block_on(op, request)?
            .map_err(|e| KernelError::new(op, errno_of(&e)))
    }

    fn dump_family(&self, op: KernelOp, afi: AddressFamily) -> Result<Vec<KernelRoute>, KernelError> {
        let message = match afi {
            AddressFamily::Ipv4 => RouteMessageBuilder::<Ipv4Addr>::new().build(),
            AddressFamily::Ipv6 => RouteMessageBuilder::<Ipv6Addr>::new().build(),
        };
        let (routes, ifnames) = self
            .block_on(op, dump(self.handle.clone(), message))?
            .map_err(|e| KernelError::new(op, errno_of(&e)))?;
        Ok(routes
            .iter()
            .filter_map(|route| parse_route(route, &ifnames))
            .collect())
    }
}

impl Drop for NetlinkKernel {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl KernelRoutes for NetlinkKernel {
    fn netns(&self) -> &str {
        &self.netns
    }
    fn observe(&self, prefix: &Prefix) -> Result<Option<KernelRoute>, KernelError> {
        Ok(self
            .dump_family(KernelOp::Observe, prefix.afi())?
            .into_iter()
            .find(|route| route.prefix == *prefix))
    }
    fn install(&mut self, route: &KernelRoute) -> Result<(), KernelError> {
        debug!("[{}] ip route add {route}", self.netns);
        let message = route_message(route);
        self.request(KernelOp::Install, self.handle.route().add(message).execute())
    }
    fn replace(&mut self, route: &KernelRoute) -> Result<(), KernelError> {
        debug!("[{}] ip route replace {route}", self.netns);
        let message = route_message(route);
        self.request(
            KernelOp::Replace,
            self.handle.route().add(message).replace().execute(),
        )
    }
    fn delete(&mut self, prefix: &Prefix) -> Result<(), KernelError> {
        debug!("[{}] ip route del {prefix}", self.netns);
        let message = delete_message(prefix);
        self.request(KernelOp::Delete, self.handle.route().del(message).execute())
    }
    fn routes(&self) -> Result<Vec<KernelRoute>, KernelError> {
        let mut routes = self.dump_family(KernelOp::Observe, AddressFamily::Ipv4)?;
        routes.extend(self.dump_family(KernelOp::Observe, AddressFamily::Ipv6)?);
        Ok(routes)
    }
}

/// Opens a [`NetlinkKernel`] per VRF. The host namespace is the one the process
/// runs in; any other is looked up by name under the namespace directory.
#[derive(Debug, Clone)]
pub struct NetlinkKernelFactory {
    host_netns: String,
    netns_dir: PathBuf,
}

impl NetlinkKernelFactory {
    #[must_use]
    pub fn new(host_netns: &str) -> Self {
        Self {
            host_netns: host_netns.to_owned(),
            netns_dir: PathBuf::from(NETNS_DIR),
        }
    }
    #[must_use]
    pub fn with_netns_dir(mut self, dir: &Path) -> Self {
        self.netns_dir = dir.to_path_buf();
        self
    }
    /// Where the namespace is mounted, or `None` for the host namespace
    #[must_use]
    pub fn netns_path(&self, netns: &str) -> Option<PathBuf> {
        (netns != self.host_netns).then(|| self.netns_dir.join(netns))
    }
}

impl KernelFactory for NetlinkKernelFactory {
    fn kernel(&self, netns: &str) -> Result<Box<dyn KernelRoutes>, KernelError> {
        let path = self.netns_path(netns);
        Ok(Box::new(NetlinkKernel::open(netns, path.as_deref())?))
    }
}
