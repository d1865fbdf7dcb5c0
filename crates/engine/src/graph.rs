//! Live node graph built from an [`AudioGraph`].
//!
//! Realising happens on the control thread and does all the allocation: nodes are put in
//! topological order with their input lists resolved to indices and one output buffer each.
//! Rendering then walks the nodes once per block.

use std::collections::{HashMap, VecDeque};

use beatgraph_transport::{AudioGraph, NodeKey, NodeKind, Output};
use log::warn;

use crate::config::EngineConfig;
use crate::dsp::{Biquad, Delay, Gain};
use crate::param::{AutomatedParam, Block};
use crate::source::{EventSink, StretchSource};
use crate::stretch::{SignalsmithStretch, TimeStretch};

#[derive(Debug, thiserror::Error)]
pub enum RealizeError {
    #[error("audio graph has a cycle through node {0}")]
    Cycle(NodeKey),

    #[error("sample rate must be positive")]
    InvalidSampleRate,
}

/// Render-side settings a graph is realised with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub block_frames: usize,
    pub drift_tolerance: u64,
    pub max_delay_secs: f64,
}

impl RenderSettings {
    pub fn new(config: &EngineConfig, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            block_frames: config.block_frames(),
            drift_tolerance: config.drift_tolerance_frames,
            max_delay_secs: config.max_delay_secs,
        }
    }
}

enum Processor<S> {
    Merger,
    Gain(Gain),
    Biquad(Biquad),
    Delay(Delay),
    Source(StretchSource<S>),
}

struct RenderNode<S> {
    key: NodeKey,
    processor: Processor<S>,
    /// Indices of upstream nodes, all lower than this node's own index.
    inputs: Vec<usize>,
    to_destination: bool,
}

pub struct RenderGraph<S = SignalsmithStretch> {
    nodes: Vec<RenderNode<S>>,
    /// One interleaved stereo buffer per node.
    buffers: Vec<Vec<f32>>,
    index: HashMap<NodeKey, usize>,
    settings: RenderSettings,
}

impl RenderGraph<SignalsmithStretch> {
    pub fn realize(graph: &AudioGraph, settings: RenderSettings) -> Result<Self, RealizeError> {
        Self::realize_with(graph, settings, SignalsmithStretch::new)
    }
}

impl<S: TimeStretch> RenderGraph<S> {
    /// Realise `graph`, building time-stretch cores with `make_stretch(sample_rate)`.
    pub fn realize_with(
        graph: &AudioGraph,
        settings: RenderSettings,
        mut make_stretch: impl FnMut(u32) -> S,
    ) -> Result<Self, RealizeError> {
        if settings.sample_rate == 0 {
            return Err(RealizeError::InvalidSampleRate);
        }
        let keys: Vec<NodeKey> = graph.iter().map(|(key, _)| *key).collect();
        let position: HashMap<NodeKey, usize> =
            keys.iter().enumerate().map(|(i, key)| (*key, i)).collect();

        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
        let mut in_degree = vec![0usize; keys.len()];
        for (i, (key, descriptor)) in graph.iter().enumerate() {
            for output in &descriptor.outputs {
                let Some(target) = output.target() else {
                    continue;
                };
                match position.get(&target) {
                    Some(&j) => {
                        downstream[i].push(j);
                        in_degree[j] += 1;
                    }
                    None => warn!("node {key} outputs to missing node {target}, dropping the connection"),
                }
            }
        }

        // Kahn's algorithm, seeded in key order
        let mut ready: VecDeque<usize> = (0..keys.len()).filter(|i| in_degree[*i] == 0).collect();
        let mut order = Vec::with_capacity(keys.len());
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &j in &downstream[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    ready.push_back(j);
                }
            }
        }
        if order.len() < keys.len() {
            let stuck = (0..keys.len()).find(|i| in_degree[*i] > 0).unwrap_or(0);
            return Err(RealizeError::Cycle(keys[stuck]));
        }

        let mut rank = vec![0usize; keys.len()];
        for (r, &i) in order.iter().enumerate() {
            rank[i] = r;
        }

        let descriptors: Vec<_> = graph.iter().map(|(_, descriptor)| descriptor).collect();
        let mut nodes: Vec<RenderNode<S>> = order
            .iter()
            .map(|&i| {
                let key = keys[i];
                let descriptor = descriptors[i];
                RenderNode {
                    key,
                    processor: build_processor(key, &descriptor.kind, &settings, &mut make_stretch),
                    inputs: Vec::new(),
                    to_destination: descriptor
                        .outputs
                        .iter()
                        .any(|output| matches!(output, Output::Destination)),
                }
            })
            .collect();
        for (i, targets) in downstream.iter().enumerate() {
            for &j in targets {
                nodes[rank[j]].inputs.push(rank[i]);
            }
        }

        let index = nodes.iter().enumerate().map(|(i, node)| (node.key, i)).collect();
        let buffers = vec![vec![0.0; settings.block_frames * 2]; nodes.len()];
        Ok(Self {
            nodes,
            buffers,
            index,
            settings,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn block_frames(&self) -> usize {
        self.settings.block_frames
    }

    /// Carry effect state over from the graph this one replaces. Nodes match by key and kind;
    /// sources always start fresh. Returns the number of adopted nodes.
    pub fn adopt(&mut self, previous: &mut RenderGraph<S>) -> usize {
        let mut adopted = 0;
        for node in &mut self.nodes {
            let Some(&i) = previous.index.get(&node.key) else {
                continue;
            };
            let old = &mut previous.nodes[i].processor;
            match (&mut node.processor, old) {
                (Processor::Biquad(new), Processor::Biquad(old)) => new.adopt_state(old),
                (Processor::Delay(new), Processor::Delay(old)) => new.adopt_state(old),
                (Processor::Gain(_), Processor::Gain(_))
                | (Processor::Merger, Processor::Merger) => {}
                _ => continue,
            }
            adopted += 1;
        }
        adopted
    }

    /// Render one block of at most [`block_frames`](Self::block_frames) frames into `out`
    /// (interleaved stereo).
    pub fn render(&mut self, block: &Block, out: &mut [f32], events: &mut impl EventSink) {
        let frames = block.frames.min(self.settings.block_frames);
        let block = Block { frames, ..*block };
        let len = frames * 2;

        for i in 0..self.nodes.len() {
            let (done, rest) = self.buffers.split_at_mut(i);
            let buffer = &mut rest[0][..len];
            let node = &mut self.nodes[i];

            if let Processor::Source(source) = &mut node.processor {
                source.render(&block, buffer, events);
                continue;
            }

            buffer.fill(0.0);
            for &input in &node.inputs {
                for (sample, upstream) in buffer.iter_mut().zip(&done[input][..len]) {
                    *sample += upstream;
                }
            }
            match &mut node.processor {
                Processor::Merger | Processor::Source(_) => {}
                Processor::Gain(gain) => gain.process(buffer, &block),
                Processor::Biquad(biquad) => biquad.process(buffer, &block),
                Processor::Delay(delay) => delay.process(buffer, &block),
            }
        }

        let out = &mut out[..len];
        out.fill(0.0);
        for (node, buffer) in self.nodes.iter().zip(&self.buffers) {
            if node.to_destination {
                for (sample, value) in out.iter_mut().zip(&buffer[..len]) {
                    *sample += value;
                }
            }
        }
    }
}

fn build_processor<S: TimeStretch>(
    key: NodeKey,
    kind: &NodeKind,
    settings: &RenderSettings,
    make_stretch: &mut impl FnMut(u32) -> S,
) -> Processor<S> {
    match kind {
        NodeKind::ChannelMerger { .. } => Processor::Merger,
        NodeKind::Gain { gain } => Processor::Gain(Gain::new(AutomatedParam::new(gain.clone(), 1.0))),
        NodeKind::Biquad(node) => Processor::Biquad(Biquad::new(node, (1000.0, 1.0, 0.0))),
        NodeKind::Delay(node) => Processor::Delay(Delay::new(
            node,
            settings.sample_rate,
            settings.max_delay_secs,
        )),
        NodeKind::StretchSource(node) => Processor::Source(StretchSource::new(
            key,
            node,
            make_stretch(settings.sample_rate),
            settings.sample_rate,
            settings.block_frames,
            settings.drift_tolerance,
        )),
    }
}
