use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use image::RgbaImage;

use crate::foundation::clock::Clock;
use crate::foundation::core::{LayerId, Millis};
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::pipeline::frame::FrameMetadata;
use crate::telemetry::sample::TransportEstimate;

/// Decode an encoded payload into premultiplied RGBA.
pub fn decode_payload(bytes: &[u8]) -> StreamViewResult<RgbaImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| StreamViewError::decode(format!("decode payload: {e}")))?;
    let mut rgba = dyn_img.to_rgba8();
    premultiply_rgba8_in_place(&mut rgba);
    Ok(rgba)
}

/// Payload waiting to be decoded, with everything needed to apply the result.
#[derive(Clone, Debug)]
pub struct DecodeJob {
    /// Target layer.
    pub layer_id: LayerId,
    /// Layer incarnation the job was submitted for.
    pub epoch: u64,
    /// Per-layer submission order.
    pub seq: u64,
    /// Encoded bytes.
    pub payload: Vec<u8>,
    /// Producer metadata.
    pub metadata: FrameMetadata,
    /// Transport segment already estimated at receive time.
    pub transport: TransportEstimate,
    /// Receive stamp on the compositor clock.
    pub receive_time: Millis,
}

/// Finished decode.
#[derive(Debug)]
pub struct DecodeDone {
    /// Target layer.
    pub layer_id: LayerId,
    /// Layer incarnation the job was submitted for.
    pub epoch: u64,
    /// Per-layer submission order.
    pub seq: u64,
    /// Producer metadata.
    pub metadata: FrameMetadata,
    /// Transport estimate carried through.
    pub transport: TransportEstimate,
    /// Receive stamp on the compositor clock.
    pub receive_time: Millis,
    /// Decode start on the compositor clock.
    pub decode_start: Millis,
    /// Decode end on the compositor clock.
    pub decode_end: Millis,
    /// Premultiplied image or the decode failure.
    pub result: StreamViewResult<RgbaImage>,
}

fn run_job(job: DecodeJob, clock: &dyn Clock) -> DecodeDone {
    let decode_start = clock.now_ms();
    let result = decode_payload(&job.payload);
    let decode_end = clock.now_ms();
    DecodeDone {
        layer_id: job.layer_id,
        epoch: job.epoch,
        seq: job.seq,
        metadata: job.metadata,
        transport: job.transport,
        receive_time: job.receive_time,
        decode_start,
        decode_end,
        result,
    }
}

/// Completion-signalled decoding. The render loop submits jobs and later drains completions.
pub trait DecodeQueue: Send {
    /// Queue a payload. An error means the job was dropped and will never complete.
    fn submit(&mut self, job: DecodeJob) -> StreamViewResult<()>;
    /// Take finished decodes without blocking.
    fn drain_completed(&mut self) -> Vec<DecodeDone>;
}

/// Decodes on submit; completions are visible on the next drain.
pub struct InlineDecoder {
    clock: Arc<dyn Clock>,
    done: Vec<DecodeDone>,
}

impl std::fmt::Debug for InlineDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineDecoder")
            .field("done", &self.done.len())
            .finish()
    }
}

impl InlineDecoder {
    /// Decoder stamping times from `clock` (the compositor clock).
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            done: Vec::new(),
        }
    }
}

impl DecodeQueue for InlineDecoder {
    fn submit(&mut self, job: DecodeJob) -> StreamViewResult<()> {
        let done = run_job(job, self.clock.as_ref());
        self.done.push(done);
        Ok(())
    }

    fn drain_completed(&mut self) -> Vec<DecodeDone> {
        std::mem::take(&mut self.done)
    }
}

/// Decodes on a worker thread so large payloads never stall the render tick.
pub struct ThreadedDecoder {
    jobs: Option<Sender<DecodeJob>>,
    done: Receiver<DecodeDone>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ThreadedDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedDecoder")
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl ThreadedDecoder {
    /// Spawn the worker.
    pub fn spawn(clock: Arc<dyn Clock>) -> StreamViewResult<Self> {
        let (job_tx, job_rx) = mpsc::channel::<DecodeJob>();
        let (done_tx, done_rx) = mpsc::channel::<DecodeDone>();
        let worker = std::thread::Builder::new()
            .name("frame-decoder".to_owned())
            .spawn(move || {
                for job in job_rx {
                    if done_tx.send(run_job(job, clock.as_ref())).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| StreamViewError::decode(format!("failed to spawn decoder thread: {e}")))?;
        Ok(Self {
            jobs: Some(job_tx),
            done: done_rx,
            worker: Some(worker),
        })
    }
}

impl DecodeQueue for ThreadedDecoder {
    fn submit(&mut self, job: DecodeJob) -> StreamViewResult<()> {
        self.jobs
            .as_ref()
            .ok_or_else(|| StreamViewError::decode("decoder is shut down"))?
            .send(job)
            .map_err(|_| StreamViewError::decode("decoder thread is gone"))
    }

    fn drain_completed(&mut self) -> Vec<DecodeDone> {
        self.done.try_iter().collect()
    }
}

impl Drop for ThreadedDecoder {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::warn!("decoder thread panicked");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/decode.rs"]
mod tests;
