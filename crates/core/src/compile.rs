//! Channel tree → flat [`AudioGraph`].
//!
//! Each channel becomes a merger keyed by its id. Children feed the merger through numbered
//! slots, sample clips feed its main input, and its effect chain sits between the merger and
//! whatever the channel was told to output to. All times in the graph are clock times.

use std::collections::HashMap;

use beatgraph_transport::{
    AudioGraph, ChannelId, NodeDescriptor, NodeKey, NodeKind, Output, ParamSchedule,
    StretchSourceNode,
};
use log::debug;

use crate::automation::{ChainSettings, PitchTrack, build_chain};
use crate::curve::{sample_window, tick_count};
use crate::play_state::{PlayState, Timeline};
use crate::tempo::{ClipSpan, clip_tempo_scale};
use crate::time::TimeScale;
use crate::tree::{Clip, ClipContent, MixTree, SampleClip};

/// Compile `tree` at clock time `now` with the root routed to `outputs`.
pub fn compile(tree: &MixTree, play_state: &PlayState, now: f64, outputs: &[Output]) -> AudioGraph {
    let scale = tree.time_scale();
    Compiler::new(tree, &scale, play_state, now).compile(outputs)
}

pub struct Compiler<'a> {
    tree: &'a MixTree,
    timeline: Timeline<'a>,
    playing: bool,
    origins: HashMap<ChannelId, f64>,
    settings: ChainSettings,
}

impl<'a> Compiler<'a> {
    pub fn new(tree: &'a MixTree, scale: &'a TimeScale, play_state: &PlayState, now: f64) -> Self {
        Self {
            tree,
            timeline: Timeline::new(scale, play_state, now),
            playing: play_state.status.is_playing(),
            origins: tree.origins(),
            settings: ChainSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ChainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn compile(&self, outputs: &[Output]) -> AudioGraph {
        let mut graph = AudioGraph::new();
        self.compile_channel(self.tree.root_id(), outputs.to_vec(), &mut graph);
        graph
    }

    fn compile_channel(&self, id: ChannelId, outputs: Vec<Output>, graph: &mut AudioGraph) {
        let Some(channel) = self.tree.channel(id) else {
            return;
        };
        let merger = NodeKey::Channel(id);

        for (slot, child) in channel.children().iter().enumerate() {
            let input = Output::MergerInput { key: merger, slot };
            self.compile_channel(*child, vec![input], graph);
        }

        let origin = self.origins.get(&id).copied().unwrap_or(0.0);
        let chain = build_chain(self.tree, channel, origin, &self.timeline, &self.settings);
        let (stages, pitch) = chain.into_stages();

        // wire back to front so each stage outputs to the one after it
        let mut next = outputs;
        for (stage, kind) in stages.into_iter().rev() {
            let key = NodeKey::Fx(id, stage);
            graph.insert(key, NodeDescriptor { kind, outputs: next });
            next = vec![Output::Node(key)];
        }
        graph.insert(
            merger,
            NodeDescriptor {
                kind: NodeKind::ChannelMerger {
                    inputs: channel.children().len(),
                },
                outputs: next,
            },
        );

        if !self.playing {
            return;
        }
        for clip in self.tree.clips_of(channel) {
            if let ClipContent::Sample(sample_clip) = &clip.content {
                self.compile_sample_clip(clip, sample_clip, origin, &pitch, merger, graph);
            }
        }
    }

    fn compile_sample_clip(
        &self,
        clip: &Clip,
        sample_clip: &SampleClip,
        origin: f64,
        pitch: &PitchTrack,
        merger: NodeKey,
        graph: &mut AudioGraph,
    ) {
        let scale = self.timeline.scale;
        let span = ClipSpan::new(scale, origin + clip.start_beat, clip.beat_count);
        let current = self.timeline.current_beat;
        if current >= span.end_beat {
            return;
        }
        let Some(sample) = sample_clip.sample.loaded() else {
            debug!("{} has no loaded sample ({}), skipping", clip.id, sample_clip.sample.id());
            return;
        };

        let (start_time, offset_time, from) = if span.strictly_contains(current) {
            let skipped = match sample.bpm.filter(|bpm| bpm.is_finite() && *bpm > 0.0) {
                Some(bpm) => (current - span.start_beat) * 60.0 / bpm,
                None => scale.time_at(current) - span.start_time,
            };
            (0.0, sample_clip.audio_start_time + skipped, current)
        } else {
            let start = self.timeline.wall_time(span.start_beat);
            (start, sample_clip.audio_start_time, span.start_beat)
        };

        // sampled over clip-local seconds, at the resolution of the remaining beats
        let ratio = clip_tempo_scale(scale, &span, sample.bpm);
        let local_from = span.local_time(scale, from);
        let remaining = span.duration() - local_from;
        let mut tempo = ParamSchedule::constant(ratio.eval(local_from));
        tempo.set_value_curve_at_time(
            sample_window(&ratio, local_from, remaining, tick_count(span.end_beat - from)),
            self.timeline.wall_time(from).max(0.0),
            remaining,
        );

        graph.insert(
            NodeKey::Clip(clip.id),
            NodeDescriptor {
                kind: NodeKind::StretchSource(StretchSourceNode {
                    buffer: sample.audio.clone(),
                    start_time,
                    stop_time: self.timeline.wall_time(span.end_beat),
                    offset_time,
                    pitch: pitch.pitch_at(from),
                    tempo,
                }),
                outputs: vec![Output::Node(merger)],
            },
        );
    }
}
