//! wirecall server: connection dispatcher and the server half of the public
//! surface (spec §4.6, §4.7).
//!
//! [`Server`] is the idiomatic, `Result`-returning API. [`init_server`],
//! [`register`], and [`serve_all`] are thin wrappers around it for callers
//! that want the distilled spec's C-shaped sentinel contract (`none`/`-1`
//! instead of `Err`).

#![allow(clippy::expect_used, reason = "registry lock poisoning should panic")]

mod connection;
mod dispatcher;
pub mod error;

use std::{
    convert::Infallible,
    net::{Ipv6Addr, SocketAddr, SocketAddrV6, TcpListener},
    sync::{Arc, RwLock},
};

pub use error::ServerError;
use socket2::{Domain, Socket, Type};
use wirecall_core::{Handler, Registry};

use crate::dispatcher::Dispatcher;

/// Backlog passed to `listen()` (spec §4.6).
const LISTEN_BACKLOG: i32 = 10;

/// A bound wirecall server, not yet serving.
pub struct Server {
    listener: TcpListener,
    registry: Arc<RwLock<Registry>>,
}

impl Server {
    /// Binds an IPv6 dual-stack listening socket on `port`, with
    /// `SO_REUSEADDR` set and a backlog of [`LISTEN_BACKLOG`] (spec §4.6).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidPort`] if `port` is 0, or
    /// [`ServerError::BindFailed`] if the socket cannot be created, bound, or
    /// set to listen.
    pub fn bind(port: u16) -> Result<Self, ServerError> {
        if port == 0 {
            return Err(ServerError::InvalidPort(0));
        }

        let socket =
            Socket::new(Domain::IPV6, Type::STREAM, None).map_err(ServerError::BindFailed)?;
        socket.set_only_v6(false).map_err(ServerError::BindFailed)?;
        socket.set_reuse_address(true).map_err(ServerError::BindFailed)?;

        let addr: SocketAddr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0).into();
        socket.bind(&addr.into()).map_err(ServerError::BindFailed)?;
        socket.listen(LISTEN_BACKLOG).map_err(ServerError::BindFailed)?;

        let listener: TcpListener = socket.into();
        tracing::info!(port, "wirecall server bound");

        Ok(Self { listener, registry: Arc::new(RwLock::new(Registry::new())) })
    }

    /// Registers `handler` under `name`. A conforming caller registers every
    /// handler before calling [`Server::serve`]; concurrent registration
    /// while serving is safe (guarded by a read/write lock) but not
    /// ordered against in-flight FUNC_FIND/FUNC_CALL lookups.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Registry`] if `name` fails validation.
    pub fn register(&self, name: &[u8], handler: Handler) -> Result<(), ServerError> {
        let mut registry = self.registry.write().expect("registry lock poisoned");
        registry.insert(name, handler)?;
        Ok(())
    }

    /// Runs the dispatcher: spawns the fixed worker pool, then loops
    /// accepting connections and enqueueing them forever. Never returns under
    /// normal operation.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] only if `accept` itself fails
    /// unrecoverably (the loop does not retry on an accept error, per the
    /// reference server).
    pub fn serve(self) -> Result<Infallible, ServerError> {
        let dispatcher = Dispatcher::spawn(Arc::clone(&self.registry));

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    dispatcher.enqueue(stream);
                },
                Err(err) => {
                    tracing::error!(%err, "accept failed");
                    return Err(ServerError::BindFailed(err));
                },
            }
        }
    }
}

/// C-shaped `init_server(port) -> server | none` (spec §4.7).
#[must_use]
pub fn init_server(port: u32) -> Option<Server> {
    let port = u16::try_from(port).ok()?;
    Server::bind(port).ok()
}

/// C-shaped `register(server, name, handler) -> 1 | -1` (spec §4.7).
pub fn register(server: &Server, name: &[u8], handler: Handler) -> i32 {
    if server.register(name, handler).is_ok() { 1 } else { -1 }
}

/// C-shaped `serve_all(server)`: runs the dispatcher, never returns under
/// normal operation (spec §4.7).
pub fn serve_all(server: Server) {
    let _: Result<Infallible, ServerError> = server.serve();
}
