//! Automation clips → per-channel effect chain.
//!
//! Every control kind belongs to one stage of the fixed chain
//! `delay → highpass → lowpass → high band → mid band → low band → gain`, except pitch,
//! which is held on the channel's sample clips instead. A stage exists only if at least one
//! automation clip targets it; parameters nobody automates keep their default.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use beatgraph_transport::{
    BiquadNode, DelayNode, FilterKind, FxStage, NodeKind, ParamSchedule,
};
use log::warn;

use crate::curve::{sample_window, tick_count};
use crate::play_state::Timeline;
use crate::tempo::ClipSpan;
use crate::time::{Scale, finite_or_zero};
use crate::tree::{AutomationClip, Channel, ClipContent, ControlPoint, MixTree};

/// EQ band centres.
pub const LOW_BAND_FREQ: f64 = 100.0;
pub const MID_BAND_FREQ: f64 = 1000.0;
pub const HIGH_BAND_FREQ: f64 = 10000.0;
pub const MID_BAND_Q: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Gain,
    LowBand,
    MidBand,
    HighBand,
    HighpassCutoff,
    HighpassQ,
    LowpassCutoff,
    LowpassQ,
    DelayWet,
    DelayCutoff,
    Pitch,
}

impl ControlKind {
    pub const ALL: [ControlKind; 11] = [
        ControlKind::Gain,
        ControlKind::LowBand,
        ControlKind::MidBand,
        ControlKind::HighBand,
        ControlKind::HighpassCutoff,
        ControlKind::HighpassQ,
        ControlKind::LowpassCutoff,
        ControlKind::LowpassQ,
        ControlKind::DelayWet,
        ControlKind::DelayCutoff,
        ControlKind::Pitch,
    ];

    fn spec(self) -> &'static ControlSpec {
        &CONTROL_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// The chain stage this control drives, `None` for pitch.
    pub fn stage(self) -> Option<FxStage> {
        self.spec().stage
    }

    /// Value in physical units when nothing is automated.
    pub fn default_value(self) -> f64 {
        self.spec().default
    }

    /// Map a normalized `0..=1` control value to physical units.
    pub fn to_unit(self, normalized: f64) -> f64 {
        self.spec().unit.from_normalized(normalized)
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControlTypeError {
    #[error("unknown control type `{0}`")]
    Unknown(String),
}

impl FromStr for ControlKind {
    type Err = ControlTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s || kind.spec().aliases.iter().any(|alias| *alias == s))
            .ok_or_else(|| ControlTypeError::Unknown(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Linear,
    /// EQ band gain, flat at 0.5.
    BandDecibels,
    /// 20 Hz .. 20 kHz, exponential.
    Hertz,
    /// 0.1 .. 20, exponential.
    Q,
    /// ±12 semitones around 0.5.
    Semitones,
}

impl Unit {
    fn from_normalized(self, value: f64) -> f64 {
        let v = finite_or_zero(value).clamp(0.0, 1.0);
        match self {
            Unit::Linear => v,
            Unit::BandDecibels => band_to_db(v),
            Unit::Hertz => 20.0 * 1000f64.powf(v),
            Unit::Q => 0.1 * 200f64.powf(v),
            Unit::Semitones => (v - 0.5) * 24.0,
        }
    }
}

/// 0.0 = kill, 0.5 = flat, 1.0 = +6 dB.
fn band_to_db(value: f64) -> f64 {
    if value < 0.01 {
        -60.0
    } else if value < 0.5 {
        let t = (value - 0.01) / 0.49;
        -60.0 * (1.0 - t)
    } else {
        (value - 0.5) * 12.0
    }
}

struct ControlSpec {
    name: &'static str,
    /// Older short tags still accepted when parsing.
    aliases: &'static [&'static str],
    stage: Option<FxStage>,
    /// Parameter index within the stage node.
    slot: usize,
    default: f64,
    unit: Unit,
}

// Indexed by `ControlKind as usize`.
static CONTROL_TABLE: [ControlSpec; 11] = [
    ControlSpec { name: "gain", aliases: &[], stage: Some(FxStage::Gain), slot: 0, default: 1.0, unit: Unit::Linear },
    ControlSpec { name: "low-band", aliases: &["low"], stage: Some(FxStage::LowBand), slot: 0, default: 0.0, unit: Unit::BandDecibels },
    ControlSpec { name: "mid-band", aliases: &["mid"], stage: Some(FxStage::MidBand), slot: 0, default: 0.0, unit: Unit::BandDecibels },
    ControlSpec { name: "high-band", aliases: &["high"], stage: Some(FxStage::HighBand), slot: 0, default: 0.0, unit: Unit::BandDecibels },
    ControlSpec { name: "highpass-cutoff", aliases: &[], stage: Some(FxStage::Highpass), slot: 0, default: 0.0, unit: Unit::Hertz },
    ControlSpec { name: "highpass-Q", aliases: &["highpass-q"], stage: Some(FxStage::Highpass), slot: 1, default: 1.0, unit: Unit::Q },
    ControlSpec { name: "lowpass-cutoff", aliases: &[], stage: Some(FxStage::Lowpass), slot: 0, default: 22050.0, unit: Unit::Hertz },
    ControlSpec { name: "lowpass-Q", aliases: &["lowpass-q"], stage: Some(FxStage::Lowpass), slot: 1, default: 1.0, unit: Unit::Q },
    ControlSpec { name: "delay-wet", aliases: &[], stage: Some(FxStage::Delay), slot: 0, default: 0.0, unit: Unit::Linear },
    ControlSpec { name: "delay-cutoff", aliases: &[], stage: Some(FxStage::Delay), slot: 1, default: 0.0, unit: Unit::Hertz },
    ControlSpec { name: "pitch", aliases: &[], stage: None, slot: 0, default: 0.0, unit: Unit::Semitones },
];

/// Non-automatable delay parameters, fixed per compile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    /// Seconds.
    pub delay_time: f64,
    pub delay_feedback: f64,
}

impl ChainSettings {
    /// Delay time of `delay_beats` at `bpm`.
    pub fn synced(delay_beats: f64, delay_feedback: f64, bpm: f64) -> Self {
        let delay_time = delay_beats * 60.0 / bpm;
        Self {
            delay_time: if delay_time.is_finite() && delay_time > 0.0 { delay_time } else { 0.0 },
            delay_feedback: finite_or_zero(delay_feedback).clamp(0.0, 0.95),
        }
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self::synced(0.75, 0.35, crate::time::DEFAULT_TEMPO)
    }
}

/// One automation clip resolved onto the absolute beat axis.
struct Lane {
    span: ClipSpan,
    kind: ControlKind,
    /// Clip-local beat → normalized value.
    curve: Option<Scale>,
    single_point: bool,
}

impl Lane {
    fn new(kind: ControlKind, clip: &AutomationClip, span: ClipSpan) -> Self {
        let mut points: Vec<ControlPoint> = clip
            .points
            .iter()
            .copied()
            .filter(|p| p.beat.is_finite() && p.value.is_finite())
            .collect();
        points.sort_by(|a, b| a.beat.total_cmp(&b.beat));

        let single_point = points.len() == 1;
        let curve = (!points.is_empty()).then(|| {
            let (domain, range) = points.iter().map(|p| (p.beat, p.value)).unzip();
            Scale::linear(domain, range).clamped()
        });
        Self {
            span,
            kind,
            curve,
            single_point,
        }
    }

    /// Physical value at a clip-local beat.
    fn value_at(&self, local_beat: f64) -> f64 {
        match &self.curve {
            Some(curve) => self.kind.to_unit(curve.eval(local_beat)),
            None => self.kind.default_value(),
        }
    }

    /// Append this clip's events: the sampled curve from the later of clip start and the
    /// current beat, or a single held value.
    fn schedule_into(&self, schedule: &mut ParamSchedule, timeline: &Timeline) {
        if self.curve.is_none() {
            return;
        }
        let span = &self.span;
        let start_at = timeline.wall_time(span.start_beat).max(0.0);
        let final_value = self.value_at(span.beat_count());

        if self.single_point || timeline.current_beat >= span.end_beat {
            schedule.set_value_at_time(final_value, start_at);
            return;
        }

        // sampled over clip-local seconds, each tick mapped back to its beat
        let scale = timeline.scale;
        let from = span.start_beat.max(timeline.current_beat);
        let local_from = span.local_time(scale, from);
        let duration = span.duration() - local_from;
        let at_time =
            |local: f64| self.value_at(span.beat_at_local(scale, local) - span.start_beat);
        let ticks = tick_count(span.end_beat - from);
        let curve = sample_window(&at_time, local_from, duration, ticks);
        if curve.is_empty() {
            schedule.set_value_at_time(final_value, start_at);
            return;
        }
        schedule.set_value_curve_at_time(curve, timeline.wall_time(from).max(0.0), duration);
    }
}

/// Held pitch (semitones) along a channel's timeline.
#[derive(Default)]
pub struct PitchTrack {
    lanes: Vec<Lane>,
}

impl PitchTrack {
    /// The pitch in effect at an absolute beat: the latest pitch clip that has started,
    /// holding its last value after it ends.
    pub fn pitch_at(&self, beat: f64) -> f64 {
        self.lanes
            .iter()
            .filter(|lane| lane.span.start_beat <= beat)
            .max_by(|a, b| a.span.start_beat.total_cmp(&b.span.start_beat))
            .map_or(ControlKind::Pitch.default_value(), |lane| {
                let local = (beat - lane.span.start_beat).min(lane.span.beat_count());
                lane.value_at(local)
            })
    }
}

/// A channel's effect stages, in signal order.
pub struct FxChain {
    stages: Vec<(FxStage, NodeKind)>,
    pitch: PitchTrack,
}

impl FxChain {
    pub fn stages(&self) -> &[(FxStage, NodeKind)] {
        &self.stages
    }

    pub fn into_stages(self) -> (Vec<(FxStage, NodeKind)>, PitchTrack) {
        (self.stages, self.pitch)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn pitch_at(&self, beat: f64) -> f64 {
        self.pitch.pitch_at(beat)
    }
}

/// Build the effect chain for `channel`, whose timeline starts at absolute beat `origin`.
pub fn build_chain(
    tree: &MixTree,
    channel: &Channel,
    origin: f64,
    timeline: &Timeline,
    settings: &ChainSettings,
) -> FxChain {
    let mut params: BTreeMap<FxStage, [ParamSchedule; 2]> = BTreeMap::new();
    let mut pitch = PitchTrack::default();

    for clip in tree.clips_of(channel) {
        let ClipContent::Automation(automation) = &clip.content else {
            continue;
        };
        let kind = match automation.control_type.parse::<ControlKind>() {
            Ok(kind) => kind,
            Err(err) => {
                warn!("{err} on {} (channel {}), skipping", clip.id, channel.id);
                continue;
            }
        };
        let span = ClipSpan::new(timeline.scale, origin + clip.start_beat, clip.beat_count);
        let lane = Lane::new(kind, automation, span);

        match kind.stage() {
            Some(stage) => {
                let slots = params.entry(stage).or_insert_with(|| stage_defaults(stage));
                lane.schedule_into(&mut slots[kind.spec().slot], timeline);
            }
            None => pitch.lanes.push(lane),
        }
    }

    let stages = params
        .into_iter()
        .map(|(stage, slots)| (stage, stage_node(stage, slots, settings)))
        .collect();
    FxChain { stages, pitch }
}

fn stage_defaults(stage: FxStage) -> [ParamSchedule; 2] {
    let mut slots = [ParamSchedule::default(), ParamSchedule::default()];
    for kind in ControlKind::ALL {
        let spec = kind.spec();
        if spec.stage == Some(stage) {
            slots[spec.slot] = ParamSchedule::constant(spec.default);
        }
    }
    slots
}

fn stage_node(stage: FxStage, slots: [ParamSchedule; 2], settings: &ChainSettings) -> NodeKind {
    let [first, second] = slots;
    let band = |filter, frequency, q, gain| {
        NodeKind::Biquad(BiquadNode {
            filter,
            frequency: ParamSchedule::constant(frequency),
            q: ParamSchedule::constant(q),
            gain,
        })
    };
    match stage {
        FxStage::Delay => NodeKind::Delay(DelayNode {
            wet: first,
            cutoff: second,
            delay_time: settings.delay_time,
            feedback: settings.delay_feedback,
        }),
        FxStage::Highpass => NodeKind::Biquad(BiquadNode {
            filter: FilterKind::Highpass,
            frequency: first,
            q: second,
            gain: ParamSchedule::constant(0.0),
        }),
        FxStage::Lowpass => NodeKind::Biquad(BiquadNode {
            filter: FilterKind::Lowpass,
            frequency: first,
            q: second,
            gain: ParamSchedule::constant(0.0),
        }),
        FxStage::HighBand => band(FilterKind::HighShelf, HIGH_BAND_FREQ, 1.0, first),
        FxStage::MidBand => band(FilterKind::Peaking, MID_BAND_FREQ, MID_BAND_Q, first),
        FxStage::LowBand => band(FilterKind::LowShelf, LOW_BAND_FREQ, 1.0, first),
        FxStage::Gain => NodeKind::Gain { gain: first },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::play_state::PlayState;
    use crate::time::TimeScale;
    use crate::tree::{ChannelKind, Clip};
    use beatgraph_transport::{ChannelId, ClipId, ParamEvent};

    fn points(values: &[(f64, f64)]) -> Vec<ControlPoint> {
        values
            .iter()
            .map(|&(beat, value)| ControlPoint { beat, value })
            .collect()
    }

    fn tree_with(clips: Vec<Clip>) -> MixTree {
        let mut tree = MixTree::new(ChannelId(0), 120.0);
        tree.add_channel(ChannelId(0), ChannelId(1), ChannelKind::PrimaryTrack, 0.0)
            .unwrap();
        for clip in clips {
            tree.add_clip(ChannelId(1), clip).unwrap();
        }
        tree
    }

    fn chain_at(tree: &MixTree, scale: &TimeScale, state: &PlayState, now: f64) -> FxChain {
        let timeline = Timeline::new(scale, state, now);
        let channel = tree.channel(ChannelId(1)).unwrap();
        build_chain(tree, channel, 0.0, &timeline, &ChainSettings::default())
    }

    #[test]
    fn test_control_names_round_trip() {
        for kind in ControlKind::ALL {
            assert_eq!(kind.name().parse::<ControlKind>().unwrap(), kind);
        }
        assert!("wobble".parse::<ControlKind>().is_err());
    }

    #[test]
    fn test_parse_document_tags() {
        let tags = [
            ("gain", ControlKind::Gain),
            ("low-band", ControlKind::LowBand),
            ("mid-band", ControlKind::MidBand),
            ("high-band", ControlKind::HighBand),
            ("highpass-cutoff", ControlKind::HighpassCutoff),
            ("highpass-Q", ControlKind::HighpassQ),
            ("lowpass-cutoff", ControlKind::LowpassCutoff),
            ("lowpass-Q", ControlKind::LowpassQ),
            ("delay-wet", ControlKind::DelayWet),
            ("delay-cutoff", ControlKind::DelayCutoff),
            ("pitch", ControlKind::Pitch),
        ];
        for (tag, kind) in tags {
            assert_eq!(tag.parse::<ControlKind>().unwrap(), kind, "{tag}");
            assert_eq!(kind.name(), tag);
        }
        assert_eq!("low".parse::<ControlKind>().unwrap(), ControlKind::LowBand);
        assert_eq!("lowpass-q".parse::<ControlKind>().unwrap(), ControlKind::LowpassQ);
        assert!("Low-Band".parse::<ControlKind>().is_err());
    }

    #[test]
    fn test_defaults_and_units() {
        assert_eq!(ControlKind::Gain.default_value(), 1.0);
        assert_eq!(ControlKind::LowBand.default_value(), 0.0);
        assert_eq!(ControlKind::HighpassQ.default_value(), 1.0);
        assert_eq!(ControlKind::LowpassCutoff.default_value(), 22050.0);
        assert_eq!(ControlKind::DelayWet.default_value(), 0.0);
        assert_eq!(ControlKind::Pitch.default_value(), 0.0);

        assert_eq!(ControlKind::MidBand.to_unit(0.5), 0.0);
        assert_eq!(ControlKind::MidBand.to_unit(0.0), -60.0);
        assert!((ControlKind::HighBand.to_unit(1.0) - 6.0).abs() < 1e-12);
        assert!((ControlKind::LowpassCutoff.to_unit(1.0) - 20000.0).abs() < 1e-6);
        assert_eq!(ControlKind::Pitch.to_unit(1.0), 12.0);
        assert_eq!(ControlKind::Gain.to_unit(f64::NAN), 0.0);
    }

    #[test]
    fn test_stages_follow_chain_order() {
        let tree = tree_with(vec![
            Clip::automation(ClipId(1), 0.0, 4.0, "gain", points(&[(0.0, 1.0), (4.0, 0.0)])),
            Clip::automation(ClipId(2), 0.0, 4.0, "low-band", points(&[(0.0, 0.5)])),
            Clip::automation(ClipId(3), 0.0, 4.0, "delay-wet", points(&[(0.0, 0.2)])),
        ]);
        let scale = tree.time_scale();
        let chain = chain_at(&tree, &scale, &PlayState::default(), 0.0);
        let order: Vec<FxStage> = chain.stages().iter().map(|(stage, _)| *stage).collect();
        assert_eq!(order, vec![FxStage::Delay, FxStage::LowBand, FxStage::Gain]);
    }

    #[test]
    fn test_paired_controls_share_a_node() {
        let tree = tree_with(vec![
            Clip::automation(ClipId(1), 0.0, 4.0, "highpass-cutoff", points(&[(0.0, 0.5)])),
            Clip::automation(ClipId(2), 0.0, 4.0, "highpass-Q", points(&[(0.0, 1.0)])),
        ]);
        let scale = tree.time_scale();
        let chain = chain_at(&tree, &scale, &PlayState::default(), 0.0);
        assert_eq!(chain.stages().len(), 1);

        let NodeKind::Biquad(node) = &chain.stages()[0].1 else {
            panic!("expected a biquad");
        };
        assert_eq!(node.filter, FilterKind::Highpass);
        let ParamEvent::SetValueAtTime { value, .. } = node.q.events()[1] else {
            panic!("expected a held value");
        };
        assert!((value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_control_is_skipped() {
        let tree = tree_with(vec![
            Clip::automation(ClipId(1), 0.0, 4.0, "flanger", points(&[(0.0, 0.5)])),
            Clip::automation(ClipId(2), 0.0, 4.0, "mid-band", points(&[(0.0, 0.5)])),
        ]);
        let scale = tree.time_scale();
        let chain = chain_at(&tree, &scale, &PlayState::default(), 0.0);
        assert_eq!(chain.stages().len(), 1);
        assert_eq!(chain.stages()[0].0, FxStage::MidBand);
    }

    #[test]
    fn test_curve_schedule_starts_at_clip_start() {
        let tree = tree_with(vec![Clip::automation(
            ClipId(1),
            2.0,
            4.0,
            "gain",
            points(&[(0.0, 0.0), (4.0, 1.0)]),
        )]);
        let scale = tree.time_scale();
        let mut state = PlayState::default();
        state.play(10.0);
        let chain = chain_at(&tree, &scale, &state, 10.0);

        let NodeKind::Gain { gain } = &chain.stages()[0].1 else {
            panic!("expected a gain stage");
        };
        let events = gain.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ParamEvent::SetValueAtTime { value: 1.0, time: 0.0 });
        let ParamEvent::SetValueCurveAtTime {
            curve,
            start_time,
            duration,
        } = &events[1]
        else {
            panic!("expected a curve");
        };
        // beat 2 at 120 bpm is one second after the transport started
        assert!((start_time - 11.0).abs() < 1e-9);
        assert!((duration - 2.0).abs() < 1e-9);
        assert_eq!(curve.len(), 400);
        assert!(curve.first().is_some_and(|v| v.abs() < 1e-6));
        assert!(curve.last().is_some_and(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_curve_resumes_from_current_beat() {
        let tree = tree_with(vec![Clip::automation(
            ClipId(1),
            0.0,
            4.0,
            "gain",
            points(&[(0.0, 0.0), (4.0, 1.0)]),
        )]);
        let scale = tree.time_scale();
        let mut state = PlayState::default();
        state.seek(2.0, 5.0);
        state.play(5.0);
        let chain = chain_at(&tree, &scale, &state, 5.0);

        let NodeKind::Gain { gain } = &chain.stages()[0].1 else {
            panic!("expected a gain stage");
        };
        let ParamEvent::SetValueCurveAtTime {
            curve,
            start_time,
            duration,
        } = &gain.events()[1]
        else {
            panic!("expected a curve");
        };
        assert!((start_time - 5.0).abs() < 1e-9);
        assert!((duration - 1.0).abs() < 1e-9);
        assert_eq!(curve.len(), 200);
        assert!(curve.first().is_some_and(|v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_curve_follows_clock_time_across_tempo_change() {
        let mut tree = tree_with(vec![Clip::automation(
            ClipId(1),
            0.0,
            16.0,
            "gain",
            points(&[(0.0, 0.0), (16.0, 1.0)]),
        )]);
        // beat 8 is at 4 s, beat 16 at 12 s
        tree.set_tempo_changes(vec![crate::time::TempoChange { beat: 8.0, bpm: 60.0 }]);
        let scale = tree.time_scale();
        let chain = chain_at(&tree, &scale, &PlayState::default(), 0.0);

        let NodeKind::Gain { gain } = &chain.stages()[0].1 else {
            panic!("expected a gain stage");
        };
        let ParamEvent::SetValueCurveAtTime { curve, duration, .. } = &gain.events()[1] else {
            panic!("expected a curve");
        };
        assert!((duration - 12.0).abs() < 1e-9);
        assert_eq!(curve.len(), 1600);

        let at = |seconds: f64| curve.as_slice()[(seconds / 12.0 * 1599.0).round() as usize];
        // 2 s is beat 4, 8 s is beat 12
        assert!((at(2.0) - 0.25).abs() < 1e-3);
        assert!((at(8.0) - 0.75).abs() < 1e-3);
    }

    #[test]
    fn test_past_clip_holds_final_value() {
        let tree = tree_with(vec![Clip::automation(
            ClipId(1),
            0.0,
            2.0,
            "delay-wet",
            points(&[(0.0, 0.0), (1.0, 0.8)]),
        )]);
        let scale = tree.time_scale();
        let mut state = PlayState::default();
        state.seek(3.0, 0.0);
        let chain = chain_at(&tree, &scale, &state, 0.0);

        let NodeKind::Delay(delay) = &chain.stages()[0].1 else {
            panic!("expected a delay stage");
        };
        assert_eq!(delay.wet.events().len(), 2);
        let ParamEvent::SetValueAtTime { value, time } = delay.wet.events()[1] else {
            panic!("expected a held value");
        };
        assert!((value - 0.8).abs() < 1e-12);
        assert_eq!(time, 0.0);
        // untouched slot keeps its default
        assert_eq!(delay.cutoff, ParamSchedule::constant(0.0));
    }

    #[test]
    fn test_pitch_is_held_not_staged() {
        let tree = tree_with(vec![Clip::automation(
            ClipId(1),
            4.0,
            4.0,
            "pitch",
            points(&[(0.0, 0.5), (4.0, 1.0)]),
        )]);
        let scale = tree.time_scale();
        let chain = chain_at(&tree, &scale, &PlayState::default(), 0.0);
        assert!(chain.is_empty());
        assert_eq!(chain.pitch_at(2.0), 0.0);
        assert_eq!(chain.pitch_at(4.0), 0.0);
        assert!((chain.pitch_at(6.0) - 6.0).abs() < 1e-9);
        assert!((chain.pitch_at(20.0) - 12.0).abs() < 1e-9);
    }
}
