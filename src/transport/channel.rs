use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::foundation::clock::Clock;
use crate::foundation::core::LayerId;
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::pipeline::buffer::FrameBuffer;
use crate::pipeline::producer::FrameNotifier;
use crate::transport::protocol::{FrameRequest, FrameUpdate};
use crate::transport::server::{FrameServer, ServerStats};

/// Compositor-facing side of the transport.
///
/// Requests are fire-and-forget; updates are collected without blocking the render loop.
pub trait FrameTransport: Send {
    /// Send a `frame-request`.
    fn send_request(&mut self, request: FrameRequest) -> StreamViewResult<()>;
    /// Take every update that arrived since the last call, in arrival order.
    fn drain_updates(&mut self) -> Vec<FrameUpdate>;
}

/// In-memory transport for tests: records requests and hands out scripted updates.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    requests: Vec<FrameRequest>,
    inbox: VecDeque<FrameUpdate>,
}

impl InMemoryTransport {
    /// Empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an update for the next drain.
    pub fn deliver(&mut self, update: FrameUpdate) {
        self.inbox.push_back(update);
    }

    pub fn requests(&self) -> &[FrameRequest] {
        &self.requests
    }

    /// Take the recorded requests.
    pub fn take_requests(&mut self) -> Vec<FrameRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Recorded requests for one layer.
    pub fn request_count(&self, layer_id: &LayerId) -> usize {
        self.requests
            .iter()
            .filter(|r| &r.layer_id == layer_id)
            .count()
    }
}

impl FrameTransport for InMemoryTransport {
    fn send_request(&mut self, request: FrameRequest) -> StreamViewResult<()> {
        self.requests.push(request);
        Ok(())
    }

    fn drain_updates(&mut self) -> Vec<FrameUpdate> {
        self.inbox.drain(..).collect()
    }
}

enum ServerCommand {
    Register(Arc<FrameBuffer>),
    Unregister(LayerId),
    Request(FrameRequest),
    FrameReady(LayerId),
    Shutdown,
}

/// Producer-side control of a [`LocalTransport`]: registration and frame-ready signals.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    commands: Sender<ServerCommand>,
}

impl ServerHandle {
    fn send(&self, cmd: ServerCommand) -> StreamViewResult<()> {
        self.commands
            .send(cmd)
            .map_err(|_| StreamViewError::transport("frame server is not running"))
    }

    /// Start serving `buffer`.
    pub fn register(&self, buffer: Arc<FrameBuffer>) -> StreamViewResult<()> {
        self.send(ServerCommand::Register(buffer))
    }

    /// Stop serving a layer.
    pub fn unregister(&self, layer_id: LayerId) -> StreamViewResult<()> {
        self.send(ServerCommand::Unregister(layer_id))
    }

    /// Notifier for a producer: signals the server that a frame was pushed.
    pub fn notifier(&self) -> FrameNotifier {
        let commands = self.commands.clone();
        Arc::new(move |layer_id: &LayerId| {
            // A stopped server simply has nobody left to notify.
            let _ = commands.send(ServerCommand::FrameReady(layer_id.clone()));
        })
    }
}

/// In-process transport: a [`FrameServer`] on its own thread, linked by channels.
///
/// Requests and frame-ready signals share one command queue, so the server handles them in the
/// order they were sent.
pub struct LocalTransport {
    handle: ServerHandle,
    updates: Receiver<FrameUpdate>,
    worker: Option<JoinHandle<ServerStats>>,
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl LocalTransport {
    /// Spawn the server thread. `clock` is the producer-side clock used for `send_time`.
    pub fn spawn(clock: Arc<dyn Clock>) -> StreamViewResult<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<ServerCommand>();
        let (upd_tx, upd_rx) = mpsc::channel::<FrameUpdate>();
        let mut server = FrameServer::new(clock);

        let worker = std::thread::Builder::new()
            .name("frame-server".to_owned())
            .spawn(move || {
                while let Ok(cmd) = cmd_rx.recv() {
                    let update = match cmd {
                        ServerCommand::Register(buffer) => {
                            server.register(buffer);
                            None
                        }
                        ServerCommand::Unregister(id) => {
                            server.unregister(&id);
                            None
                        }
                        ServerCommand::Request(req) => server.handle_request(&req),
                        ServerCommand::FrameReady(id) => server.on_frame_ready(&id),
                        ServerCommand::Shutdown => break,
                    };
                    if let Some(update) = update
                        && upd_tx.send(update).is_err()
                    {
                        break;
                    }
                }
                tracing::debug!(stats = ?server.stats(), "frame server stopped");
                server.stats()
            })
            .map_err(|e| StreamViewError::transport(format!("failed to spawn frame server: {e}")))?;

        Ok(Self {
            handle: ServerHandle { commands: cmd_tx },
            updates: upd_rx,
            worker: Some(worker),
        })
    }

    pub fn server(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Stop the server thread and return its counters.
    pub fn shutdown(mut self) -> StreamViewResult<ServerStats> {
        self.stop()
    }

    fn stop(&mut self) -> StreamViewResult<ServerStats> {
        let Some(worker) = self.worker.take() else {
            return Ok(ServerStats::default());
        };
        let _ = self.handle.commands.send(ServerCommand::Shutdown);
        worker
            .join()
            .map_err(|_| StreamViewError::transport("frame server thread panicked"))
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "frame server did not stop cleanly");
        }
    }
}

impl FrameTransport for LocalTransport {
    fn send_request(&mut self, request: FrameRequest) -> StreamViewResult<()> {
        self.handle.send(ServerCommand::Request(request))
    }

    fn drain_updates(&mut self) -> Vec<FrameUpdate> {
        self.updates.try_iter().collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transport/channel.rs"]
mod tests;
