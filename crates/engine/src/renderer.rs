//! The audio-thread side of the engine: swaps in new render graphs and renders device blocks.

use basedrop::Owned;
use beatgraph_transport::EngineEvent;
use cpal::{FromSample, Sample};

use crate::clock::AudioClock;
use crate::graph::RenderGraph;
use crate::param::Block;
use crate::source::EventSink;
use crate::stretch::{SignalsmithStretch, TimeStretch};

pub type GraphHandoff<S = SignalsmithStretch> = Owned<RenderGraph<S>>;

pub struct Renderer<S = SignalsmithStretch, E = rtrb::Producer<EngineEvent>> {
    graph: Option<GraphHandoff<S>>,
    graphs: rtrb::Consumer<GraphHandoff<S>>,
    events: E,
    clock: AudioClock,
    sample_rate: u32,
    /// Interleaved stereo mix of one graph pass.
    mix: Vec<f32>,
}

impl<S: TimeStretch, E: EventSink> Renderer<S, E> {
    pub fn new(
        graphs: rtrb::Consumer<GraphHandoff<S>>,
        events: E,
        clock: AudioClock,
        sample_rate: u32,
        block_frames: usize,
    ) -> Self {
        Self {
            graph: None,
            graphs,
            events,
            clock,
            sample_rate,
            mix: vec![0.0; block_frames.max(1) * 2],
        }
    }

    /// Take the newest pending graph, if any. Retired graphs go back to the collector.
    fn swap_graphs(&mut self) {
        while let Ok(mut next) = self.graphs.pop() {
            let adopted = match self.graph.as_mut() {
                Some(previous) => next.adopt(previous),
                None => 0,
            };
            let nodes = next.len();
            self.graph = Some(next);
            self.events
                .push_event(EngineEvent::GraphSwapped { nodes, adopted });
        }
    }

    /// Fill `data` (interleaved, `channels` wide) starting at clock time `start_time`.
    pub fn process<T>(&mut self, data: &mut [T], channels: usize, start_time: f64)
    where
        T: Sample + FromSample<f32>,
    {
        self.swap_graphs();
        self.clock.set(start_time);

        let channels = channels.max(1);
        let Some(graph) = self.graph.as_mut() else {
            data.fill(T::EQUILIBRIUM);
            return;
        };

        let chunk_frames = self.mix.len() / 2;
        let mut offset = 0;
        for chunk in data.chunks_mut(chunk_frames * channels) {
            let frames = chunk.len() / channels;
            let block = Block {
                start_time: start_time + offset as f64 / self.sample_rate as f64,
                frames,
                sample_rate: self.sample_rate,
            };
            graph.render(&block, &mut self.mix, &mut self.events);

            for (frame, stereo) in chunk.chunks_mut(channels).zip(self.mix.chunks_exact(2)) {
                let (left, right) = (stereo[0], stereo[1]);
                if channels == 1 {
                    frame[0] = T::from_sample((left + right) * 0.5);
                    continue;
                }
                for (ch, sample) in frame.iter_mut().enumerate() {
                    *sample = T::from_sample(match ch {
                        0 => left,
                        1 => right,
                        _ => 0.0,
                    });
                }
            }
            offset += frames;
        }
    }
}
