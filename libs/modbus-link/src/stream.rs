//! Passive frame capture from a live byte stream
//!
//! [`StreamDecoder`] decodes frames back to back with a fixed direction and
//! publishes them on a bounded channel. Decode failures are counted as
//! resynchronisation events and decoding carries on from the current stream
//! position. The loop stops when the stream ends, the consumer goes away, or
//! the cancellation token fires.
//!
//! Cancellation is checked once per frame. A read that is already waiting for
//! bytes is not interrupted; put a read timeout on the underlying source if
//! capture must stop within a bound.

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::function::Direction;
use crate::reader::FrameReader;

/// Why a capture run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStop {
    Cancelled,
    ConsumerClosed,
}

/// Counters for the last (or current) run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames handed to the consumer
    pub frames: u64,
    /// Frames dropped by the station filter
    pub filtered: u64,
    /// Decode failures skipped over
    pub resyncs: u64,
}

#[derive(Debug)]
pub struct StreamDecoder {
    codec: Codec,
    direction: Direction,
    station_filter: Option<u8>,
    cancel: CancellationToken,
    stats: CaptureStats,
}

impl StreamDecoder {
    pub fn new(codec: Codec, direction: Direction) -> Self {
        Self {
            codec,
            direction,
            station_filter: None,
            cancel: CancellationToken::new(),
            stats: CaptureStats::default(),
        }
    }

    /// Only publish frames for `station_id`; 0 accepts every station
    pub fn with_station_filter(mut self, station_id: u8) -> Self {
        self.station_filter = (station_id != 0).then_some(station_id);
        self
    }

    /// Token that stops the current run. A cancelled run installs a fresh
    /// token, so fetch it again before restarting.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn station_filter(&self) -> Option<u8> {
        self.station_filter
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    fn accepts(&self, frame: &Frame) -> bool {
        self.station_filter
            .map_or(true, |station| frame.station_id == station)
    }

    /// Decode until cancelled, the consumer closes, or the source fails
    ///
    /// End of stream and fatal transport errors (`ConnectionLost`, `Io`) are
    /// returned as `Err`.
    pub async fn run<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut FrameReader<R>,
        sender: &mpsc::Sender<Frame>,
    ) -> ModbusResult<CaptureStop> {
        self.stats = CaptureStats::default();
        debug!("{} capture started ({})", self.codec, self.direction);

        let outcome = loop {
            if self.cancel.is_cancelled() {
                self.cancel = CancellationToken::new();
                break Ok(CaptureStop::Cancelled);
            }

            match self.codec.decode(reader, self.direction).await {
                Ok(frame) => {
                    if !self.accepts(&frame) {
                        self.stats.filtered += 1;
                        continue;
                    }
                    self.stats.frames += 1;
                    if sender.send(frame).await.is_err() {
                        break Ok(CaptureStop::ConsumerClosed);
                    }
                },
                Err(e) if e.is_frame_error() || e.is_recoverable() => {
                    self.stats.resyncs += 1;
                    warn!("{} capture resync: {}", self.codec, e);
                },
                Err(e) => break Err(e),
            }
        };

        info!(
            "{} capture ended: {:?} frames={} filtered={} resyncs={}",
            self.codec, outcome, self.stats.frames, self.stats.filtered, self.stats.resyncs
        );
        outcome
    }
}

/// Run `decoder` over `source` on its own task
///
/// Returns the task handle, the receiving end of a channel holding up to
/// `capacity` frames, and the token that cancels the run. The task hands the
/// decoder back with the outcome so it can be spawned again.
pub fn spawn_capture<R>(
    mut decoder: StreamDecoder,
    source: R,
    capacity: usize,
) -> (
    JoinHandle<(StreamDecoder, ModbusResult<CaptureStop>)>,
    mpsc::Receiver<Frame>,
    CancellationToken,
)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let token = decoder.cancel_token();
    let handle = tokio::spawn(async move {
        let mut reader = FrameReader::new(source);
        let outcome = decoder.run(&mut reader, &tx).await;
        (decoder, outcome)
    });
    (handle, rx, token)
}

/// True when a run ended because the source ran dry
pub fn is_end_of_stream(result: &ModbusResult<CaptureStop>) -> bool {
    matches!(result, Err(ModbusError::EndOfStream))
}
