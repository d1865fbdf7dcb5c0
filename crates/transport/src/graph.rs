//! Declarative audio graph produced by the compiler and realised by the engine.
//!
//! A graph is a flat map from [`NodeKey`] to [`NodeDescriptor`]. Descriptors say what kind
//! of node to build, where its output goes, and how its parameters move over absolute time.
//! Nothing here touches audio; the engine turns a graph into live nodes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{AudioArc, ChannelId, ClipId};

/// Position of an effect stage in a channel's chain.
///
/// The derive order is the signal order: a channel's input passes through the stages
/// in ascending order before reaching its outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FxStage {
    Delay,
    Highpass,
    Lowpass,
    HighBand,
    MidBand,
    LowBand,
    Gain,
}

impl FxStage {
    pub const CHAIN: [FxStage; 7] = [
        FxStage::Delay,
        FxStage::Highpass,
        FxStage::Lowpass,
        FxStage::HighBand,
        FxStage::MidBand,
        FxStage::LowBand,
        FxStage::Gain,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            FxStage::Delay => "delay",
            FxStage::Highpass => "highpass",
            FxStage::Lowpass => "lowpass",
            FxStage::HighBand => "high",
            FxStage::MidBand => "mid",
            FxStage::LowBand => "low",
            FxStage::Gain => "gain",
        }
    }
}

/// Stable identity of a node across compiles. The runtime reuses live nodes by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Channel(ChannelId),
    Clip(ClipId),
    Fx(ChannelId, FxStage),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Channel(id) => write!(f, "{id}"),
            NodeKey::Clip(id) => write!(f, "{id}"),
            NodeKey::Fx(id, stage) => write!(f, "{id}_{}", stage.suffix()),
        }
    }
}

/// Where a node's output is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    /// The audio device.
    Destination,
    /// The main input of another node.
    Node(NodeKey),
    /// A numbered input of a channel merger.
    MergerInput { key: NodeKey, slot: usize },
}

impl Output {
    pub fn target(&self) -> Option<NodeKey> {
        match self {
            Output::Destination => None,
            Output::Node(key) | Output::MergerInput { key, .. } => Some(*key),
        }
    }
}

/// An immutable, sampled parameter trajectory.
#[derive(Clone, PartialEq)]
pub struct ValueCurve(Arc<[f32]>);

impl ValueCurve {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<f32> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<f32> {
        self.0.last().copied()
    }
}

impl From<Vec<f32>> for ValueCurve {
    fn from(values: Vec<f32>) -> Self {
        Self(Arc::from(values))
    }
}

impl fmt::Debug for ValueCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCurve")
            .field("len", &self.len())
            .field("first", &self.first())
            .field("last", &self.last())
            .finish()
    }
}

/// One scheduling instruction, with the semantics of the Web Audio `AudioParam` methods
/// of the same name.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamEvent {
    SetValueAtTime {
        value: f64,
        time: f64,
    },
    SetValueCurveAtTime {
        curve: ValueCurve,
        start_time: f64,
        duration: f64,
    },
}

impl ParamEvent {
    pub fn time(&self) -> f64 {
        match self {
            ParamEvent::SetValueAtTime { time, .. } => *time,
            ParamEvent::SetValueCurveAtTime { start_time, .. } => *start_time,
        }
    }
}

/// Time-ordered list of parameter events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchedule {
    events: Vec<ParamEvent>,
}

impl ParamSchedule {
    /// A parameter held at `value` for all time.
    pub fn constant(value: f64) -> Self {
        Self {
            events: vec![ParamEvent::SetValueAtTime { value, time: 0.0 }],
        }
    }

    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> &mut Self {
        self.insert(ParamEvent::SetValueAtTime { value, time })
    }

    pub fn set_value_curve_at_time(
        &mut self,
        curve: ValueCurve,
        start_time: f64,
        duration: f64,
    ) -> &mut Self {
        if curve.is_empty() || duration <= 0.0 {
            return self;
        }
        self.insert(ParamEvent::SetValueCurveAtTime {
            curve,
            start_time,
            duration,
        })
    }

    fn insert(&mut self, event: ParamEvent) -> &mut Self {
        // Stable: events at the same time keep their insertion order.
        let at = self
            .events
            .partition_point(|existing| existing.time() <= event.time());
        self.events.insert(at, event);
        self
    }

    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Highpass,
    Lowpass,
    LowShelf,
    Peaking,
    HighShelf,
}

/// A time-stretched sample clip.
#[derive(Debug, Clone, PartialEq)]
pub struct StretchSourceNode {
    pub buffer: AudioArc,
    /// Wall-clock start. Zero (or any time already past) means "now".
    pub start_time: f64,
    pub stop_time: f64,
    /// Read offset into `buffer`, seconds.
    pub offset_time: f64,
    /// Transposition in semitones, held for the life of the node.
    pub pitch: f64,
    /// Playback tempo relative to the sample's native tempo.
    pub tempo: ParamSchedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BiquadNode {
    pub filter: FilterKind,
    /// Hz.
    pub frequency: ParamSchedule,
    pub q: ParamSchedule,
    /// dB, used by the shelf and peaking shapes.
    pub gain: ParamSchedule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelayNode {
    pub wet: ParamSchedule,
    /// Highpass cutoff on the wet path, Hz.
    pub cutoff: ParamSchedule,
    pub delay_time: f64,
    pub feedback: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    ChannelMerger { inputs: usize },
    Gain { gain: ParamSchedule },
    Biquad(BiquadNode),
    Delay(DelayNode),
    StretchSource(StretchSourceNode),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::ChannelMerger { .. } => "merger",
            NodeKind::Gain { .. } => "gain",
            NodeKind::Biquad(_) => "biquad",
            NodeKind::Delay(_) => "delay",
            NodeKind::StretchSource(_) => "stretch-source",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub kind: NodeKind,
    pub outputs: Vec<Output>,
}

/// The flat result of one compile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioGraph {
    nodes: BTreeMap<NodeKey, NodeDescriptor>,
}

impl AudioGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: NodeKey, descriptor: NodeDescriptor) {
        self.nodes.insert(key, descriptor);
    }

    pub fn get(&self, key: &NodeKey) -> Option<&NodeDescriptor> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &NodeDescriptor)> {
        self.nodes.iter()
    }

    /// Follow first outputs from `start` through plain node connections. Stops at the
    /// sink: the destination, a merger slot, or a missing node.
    /// Returns the visited keys, `start` included, and the sink output.
    pub fn trace(&self, start: NodeKey) -> (Vec<NodeKey>, Option<Output>) {
        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(output) = self.get(&current).and_then(|node| node.outputs.first()) else {
                return (path, None);
            };
            match output {
                Output::Node(next) if self.contains(next) && !path.contains(next) => {
                    path.push(*next);
                    current = *next;
                }
                _ => return (path, Some(*output)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_stage_order_matches_chain() {
        let mut sorted = FxStage::CHAIN;
        sorted.sort();
        assert_eq!(sorted, FxStage::CHAIN);
    }

    #[test]
    fn test_node_key_display() {
        assert_eq!(NodeKey::Channel(ChannelId(3)).to_string(), "3");
        assert_eq!(NodeKey::Clip(ClipId(9)).to_string(), "clip-9");
        assert_eq!(
            NodeKey::Fx(ChannelId(3), FxStage::Gain).to_string(),
            "3_gain"
        );
    }

    #[test]
    fn test_schedule_keeps_time_order() {
        let mut schedule = ParamSchedule::constant(1.0);
        schedule.set_value_at_time(0.5, 4.0);
        schedule.set_value_at_time(0.25, 2.0);
        let times: Vec<f64> = schedule.events().iter().map(ParamEvent::time).collect();
        assert_eq!(times, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_schedule_ignores_empty_curves() {
        let mut schedule = ParamSchedule::constant(1.0);
        schedule.set_value_curve_at_time(ValueCurve::empty(), 1.0, 2.0);
        schedule.set_value_curve_at_time(ValueCurve::from(vec![1.0, 2.0]), 1.0, 0.0);
        assert_eq!(schedule.events().len(), 1);
    }

    #[test]
    fn test_trace_follows_chain_to_sink() {
        let channel = ChannelId(1);
        let mut graph = AudioGraph::new();
        graph.insert(
            NodeKey::Channel(channel),
            NodeDescriptor {
                kind: NodeKind::ChannelMerger { inputs: 0 },
                outputs: vec![Output::Node(NodeKey::Fx(channel, FxStage::Gain))],
            },
        );
        graph.insert(
            NodeKey::Fx(channel, FxStage::Gain),
            NodeDescriptor {
                kind: NodeKind::Gain {
                    gain: ParamSchedule::constant(1.0),
                },
                outputs: vec![Output::Destination],
            },
        );

        let (path, sink) = graph.trace(NodeKey::Channel(channel));
        assert_eq!(
            path,
            vec![NodeKey::Channel(channel), NodeKey::Fx(channel, FxStage::Gain)]
        );
        assert_eq!(sink, Some(Output::Destination));
    }

    #[test]
    fn test_trace_stops_at_merger_slot() {
        let (parent, child) = (ChannelId(0), ChannelId(1));
        let slot = Output::MergerInput {
            key: NodeKey::Channel(parent),
            slot: 2,
        };
        let mut graph = AudioGraph::new();
        graph.insert(
            NodeKey::Channel(parent),
            NodeDescriptor {
                kind: NodeKind::ChannelMerger { inputs: 3 },
                outputs: vec![Output::Destination],
            },
        );
        graph.insert(
            NodeKey::Channel(child),
            NodeDescriptor {
                kind: NodeKind::ChannelMerger { inputs: 0 },
                outputs: vec![Output::Node(NodeKey::Fx(child, FxStage::Gain))],
            },
        );
        graph.insert(
            NodeKey::Fx(child, FxStage::Gain),
            NodeDescriptor {
                kind: NodeKind::Gain {
                    gain: ParamSchedule::constant(1.0),
                },
                outputs: vec![slot],
            },
        );

        let (path, sink) = graph.trace(NodeKey::Channel(child));
        assert_eq!(
            path,
            vec![NodeKey::Channel(child), NodeKey::Fx(child, FxStage::Gain)]
        );
        assert_eq!(sink, Some(slot));
    }
}
