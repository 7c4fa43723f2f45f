//! Fixed worker-pool dispatcher: a shared FIFO queue of accepted sockets
//! guarded by a mutex and condition variable (spec §4.6).

#![allow(clippy::expect_used, reason = "mutex poisoning and thread spawn failure should panic")]

use std::{
    collections::VecDeque,
    net::TcpStream,
    sync::{Arc, Condvar, Mutex, RwLock},
    thread,
};

use wirecall_core::Registry;

use crate::connection;

/// Fixed size of the server's worker thread pool.
pub const WORKER_POOL_SIZE: usize = 10;

#[derive(Default)]
struct Queue {
    mutex: Mutex<VecDeque<TcpStream>>,
    condvar: Condvar,
}

impl Queue {
    fn push(&self, stream: TcpStream) {
        let mut queue = self.mutex.lock().expect("connection queue mutex poisoned");
        queue.push_back(stream);
        self.condvar.notify_one();
    }

    fn pop(&self) -> TcpStream {
        let mut queue = self.mutex.lock().expect("connection queue mutex poisoned");
        loop {
            if let Some(stream) = queue.pop_front() {
                return stream;
            }
            queue = self.condvar.wait(queue).expect("connection queue mutex poisoned");
        }
    }
}

/// Owns the pending-connection queue and the worker threads draining it.
///
/// Workers are spawned once, at construction, and run until the process
/// exits; there is no shutdown handshake, matching the reference server's
/// "serve forever" contract.
pub struct Dispatcher {
    queue: Arc<Queue>,
}

impl Dispatcher {
    /// Spawns [`WORKER_POOL_SIZE`] worker threads, each running the
    /// per-connection loop against `registry` for whatever socket it
    /// dequeues next.
    pub fn spawn(registry: Arc<RwLock<Registry>>) -> Self {
        let queue = Arc::new(Queue::default());

        for worker_id in 0..WORKER_POOL_SIZE {
            let queue = Arc::clone(&queue);
            let registry = Arc::clone(&registry);
            thread::Builder::new()
                .name(format!("wirecall-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &queue, &registry))
                .expect("failed to spawn wirecall worker thread");
        }

        Self { queue }
    }

    /// Enqueues a freshly accepted socket for a worker to pick up.
    pub fn enqueue(&self, stream: TcpStream) {
        self.queue.push(stream);
    }
}

fn worker_loop(worker_id: usize, queue: &Queue, registry: &RwLock<Registry>) {
    loop {
        let stream = queue.pop();
        let peer = stream.peer_addr().ok();
        tracing::debug!(worker_id, ?peer, "dequeued connection");

        match connection::serve(stream, registry) {
            Ok(()) => tracing::debug!(worker_id, ?peer, "connection closed"),
            Err(err) => tracing::warn!(worker_id, ?peer, %err, "connection aborted"),
        }
    }
}
