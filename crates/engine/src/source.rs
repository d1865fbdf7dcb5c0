//! Drift-correcting time-stretched sample playback.
//!
//! A source knows when it should have started and how many frames it has produced. Every
//! block it compares that count with what the clock says it should be and, once the two are
//! at least `drift_tolerance` frames apart, catches up: a source that fell behind renders the
//! missing frames and drops them, one that ran ahead (or fell far behind) moves its read
//! position and resets the stretcher.

use beatgraph_transport::{AudioArc, EngineEvent, NodeKey, StretchSourceNode};

use crate::param::{AutomatedParam, Block};
use crate::stretch::{MAX_TEMPO, TimeStretch};

/// Past this many tolerances behind, a source jumps instead of rendering the gap.
const MAX_DISCARD_TOLERANCES: u64 = 8;

/// Where render-thread events go.
pub trait EventSink {
    fn push_event(&mut self, event: EngineEvent);
}

impl EventSink for rtrb::Producer<EngineEvent> {
    fn push_event(&mut self, event: EngineEvent) {
        // a full queue drops the event
        let _ = self.push(event);
    }
}

impl EventSink for Vec<EngineEvent> {
    fn push_event(&mut self, event: EngineEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Stopped,
    Scheduled,
    Playing,
}

pub struct StretchSource<S> {
    key: NodeKey,
    buffer: AudioArc,
    stretch: S,
    state: SourceState,
    start_time: f64,
    stop_time: f64,
    /// Clock time of the first frame actually played.
    started_at: f64,
    /// Fractional read position in buffer frames.
    cursor: f64,
    /// Frames produced since `started_at`.
    played: u64,
    pitch: AutomatedParam,
    tempo: AutomatedParam,
    /// Buffer frames per output frame at tempo 1.
    rate_ratio: f64,
    drift_tolerance: u64,
    /// Interleaved input staged for the stretcher.
    input: Vec<f32>,
    /// Output sink for frames rendered only to catch up.
    discard: Vec<f32>,
}

impl<S: TimeStretch> StretchSource<S> {
    pub fn new(
        key: NodeKey,
        node: &StretchSourceNode,
        stretch: S,
        sample_rate: u32,
        max_block_frames: usize,
        drift_tolerance: u64,
    ) -> Self {
        let rate_ratio = node.buffer.sample_rate() as f64 / sample_rate as f64;
        let max_input = (max_block_frames as f64 * MAX_TEMPO * rate_ratio).ceil() as usize + 2;
        let mut source = Self {
            key,
            buffer: node.buffer.clone(),
            stretch,
            state: SourceState::Stopped,
            start_time: 0.0,
            stop_time: f64::INFINITY,
            started_at: 0.0,
            cursor: 0.0,
            played: 0,
            pitch: AutomatedParam::constant(node.pitch),
            tempo: AutomatedParam::new(node.tempo.clone(), 1.0),
            rate_ratio,
            drift_tolerance: drift_tolerance.max(1),
            input: vec![0.0; max_input * 2],
            discard: vec![0.0; max_block_frames.max(1) * 2],
        };
        source.start(node.start_time, node.offset_time);
        source.stop(node.stop_time);
        source
    }

    /// Schedule playback at clock time `start_time` (a past time means now), reading from
    /// `offset_time` seconds into the buffer.
    pub fn start(&mut self, start_time: f64, offset_time: f64) {
        self.state = SourceState::Scheduled;
        self.start_time = start_time;
        self.cursor = offset_time.max(0.0) * self.buffer.sample_rate() as f64;
        self.played = 0;
        self.stretch.clear();
    }

    /// Schedule silence from clock time `stop_time`.
    pub fn stop(&mut self, stop_time: f64) {
        self.stop_time = stop_time;
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn played_frames(&self) -> u64 {
        self.played
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    fn is_playing(&self, time: f64) -> bool {
        self.start_time <= time && time < self.stop_time
    }

    /// Render `block` into `out` (interleaved stereo, `block.frames` long).
    pub fn render(&mut self, block: &Block, out: &mut [f32], events: &mut impl EventSink) {
        out.fill(0.0);
        if self.state == SourceState::Stopped {
            return;
        }

        let mut first = block.frames;
        let mut end = block.frames;
        for frame in 0..block.frames {
            let playing = self.is_playing(block.frame_time(frame));
            if playing && first == block.frames {
                first = frame;
            } else if !playing && first < block.frames {
                end = frame;
                break;
            }
        }
        let gated = end - first;

        if gated > 0 {
            if self.state == SourceState::Scheduled {
                self.state = SourceState::Playing;
                self.started_at = block.frame_time(first);
            }

            self.stretch.set_pitch(self.pitch.block_average(block));
            self.stretch.set_tempo(self.tempo.block_average(block));

            self.correct_drift(block, events);
            self.pull(&mut out[first * 2..end * 2]);
            self.played += gated as u64;
        }

        if block.end_time() >= self.stop_time && self.state != SourceState::Stopped {
            self.state = SourceState::Stopped;
            events.push_event(EngineEvent::SourceEnded { key: self.key });
        }
    }

    fn correct_drift(&mut self, block: &Block, events: &mut impl EventSink) {
        let sample_rate = block.sample_rate as f64;
        let now = block.end_time();
        let elapsed = (now - self.started_at).min(self.stop_time - self.started_at);
        let expected = (elapsed * sample_rate - block.frames as f64).max(0.0).round() as u64;
        let actual = self.played;
        if expected.abs_diff(actual) < self.drift_tolerance {
            return;
        }

        let behind = expected.saturating_sub(actual);
        if behind > 0 && behind <= self.drift_tolerance * MAX_DISCARD_TOLERANCES {
            // render the missing frames and drop them
            self.discard_frames(behind as usize);
        } else {
            // too far behind skips ahead; ahead rewinds
            let frames = expected as f64 - actual as f64;
            self.cursor = (self.cursor + frames * self.frames_per_output()).max(0.0);
            self.stretch.clear();
        }
        self.played = expected;
        events.push_event(EngineEvent::Drift {
            key: self.key,
            expected,
            actual,
        });
    }

    fn discard_frames(&mut self, frames: usize) {
        let mut sink = std::mem::take(&mut self.discard);
        let chunk = sink.len() / 2;
        let mut left = frames;
        while left > 0 && chunk > 0 {
            let n = left.min(chunk);
            self.pull(&mut sink[..n * 2]);
            left -= n;
        }
        self.discard = sink;
    }

    fn frames_per_output(&self) -> f64 {
        self.stretch.tempo() * self.rate_ratio
    }

    /// Stretch the next stretch of buffer into `out`.
    fn pull(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        let advance = frames as f64 * self.frames_per_output();
        let from = self.cursor.floor();
        let count = (((self.cursor + advance).floor() - from).max(0.0) as usize)
            .min(self.input.len() / 2);

        let first = from as usize;
        for (i, frame) in self.input[..count * 2].chunks_exact_mut(2).enumerate() {
            let (left, right) = self.buffer.stereo_frame(first + i);
            frame[0] = left;
            frame[1] = right;
        }
        self.stretch.process(&self.input[..count * 2], out);
        self.cursor += advance;
    }
}
