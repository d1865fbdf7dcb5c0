//! The channel/clip tree a mix is compiled from.
//!
//! Channels and clips live in flat maps keyed by id; a channel lists its children and
//! clips by id, in order. Nodes can only be attached to an existing parent under a fresh
//! id, so the structure is always a tree rooted at the mix.

use std::collections::HashMap;

use beatgraph_transport::{ChannelId, ClipId, SampleRef};

use crate::time::{DEFAULT_TEMPO, TempoChange, TimeScale, finite_or_zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    PrimaryTrack,
    SampleTrack,
    TrackGroup,
    Mix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    /// Offset of this channel's timeline within its parent's, in beats.
    pub start_beat: f64,
    children: Vec<ChannelId>,
    clips: Vec<ClipId>,
}

impl Channel {
    pub fn children(&self) -> &[ChannelId] {
        &self.children
    }

    pub fn clips(&self) -> &[ClipId] {
        &self.clips
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleClip {
    pub sample: SampleRef,
    /// Where playback starts inside the sample, seconds.
    pub audio_start_time: f64,
}

/// One knot of an automation curve: a clip-local beat and a value in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub beat: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutomationClip {
    /// Control type tag as stored by the document layer, e.g. `"lowpass-cutoff"`.
    pub control_type: String,
    pub points: Vec<ControlPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipContent {
    Sample(SampleClip),
    Automation(AutomationClip),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub id: ClipId,
    /// Offset within the owning channel, in beats.
    pub start_beat: f64,
    pub beat_count: f64,
    pub content: ClipContent,
}

impl Clip {
    pub fn sample(id: ClipId, start_beat: f64, beat_count: f64, sample: SampleRef) -> Self {
        Self {
            id,
            start_beat,
            beat_count,
            content: ClipContent::Sample(SampleClip {
                sample,
                audio_start_time: 0.0,
            }),
        }
    }

    pub fn automation(
        id: ClipId,
        start_beat: f64,
        beat_count: f64,
        control_type: impl Into<String>,
        points: Vec<ControlPoint>,
    ) -> Self {
        Self {
            id,
            start_beat,
            beat_count,
            content: ClipContent::Automation(AutomationClip {
                control_type: control_type.into(),
                points,
            }),
        }
    }

    pub fn end_beat(&self) -> f64 {
        finite_or_zero(self.start_beat) + finite_or_zero(self.beat_count).max(0.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    #[error("channel {0} already exists")]
    DuplicateChannel(ChannelId),

    #[error("{0} already exists")]
    DuplicateClip(ClipId),

    #[error("a mix channel can only be the root")]
    NestedMix,
}

/// An immutable-by-convention snapshot of a mix: the root channel, its descendants and clips.
#[derive(Debug, Clone, PartialEq)]
pub struct MixTree {
    root: ChannelId,
    tempo: f64,
    tempo_changes: Vec<TempoChange>,
    channels: HashMap<ChannelId, Channel>,
    clips: HashMap<ClipId, Clip>,
}

impl MixTree {
    pub fn new(root: ChannelId, tempo: f64) -> Self {
        let mut channels = HashMap::new();
        channels.insert(
            root,
            Channel {
                id: root,
                kind: ChannelKind::Mix,
                start_beat: 0.0,
                children: Vec::new(),
                clips: Vec::new(),
            },
        );
        Self {
            root,
            tempo,
            tempo_changes: Vec::new(),
            channels,
            clips: HashMap::new(),
        }
    }

    pub fn add_channel(
        &mut self,
        parent: ChannelId,
        id: ChannelId,
        kind: ChannelKind,
        start_beat: f64,
    ) -> Result<(), TreeError> {
        if kind == ChannelKind::Mix {
            return Err(TreeError::NestedMix);
        }
        if self.channels.contains_key(&id) {
            return Err(TreeError::DuplicateChannel(id));
        }
        let parent_channel = self
            .channels
            .get_mut(&parent)
            .ok_or(TreeError::UnknownChannel(parent))?;
        parent_channel.children.push(id);

        self.channels.insert(
            id,
            Channel {
                id,
                kind,
                start_beat: finite_or_zero(start_beat).max(0.0),
                children: Vec::new(),
                clips: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn add_clip(&mut self, channel: ChannelId, clip: Clip) -> Result<(), TreeError> {
        if self.clips.contains_key(&clip.id) {
            return Err(TreeError::DuplicateClip(clip.id));
        }
        let owner = self
            .channels
            .get_mut(&channel)
            .ok_or(TreeError::UnknownChannel(channel))?;
        owner.clips.push(clip.id);
        self.clips.insert(clip.id, clip);
        Ok(())
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
    }

    pub fn set_tempo_changes(&mut self, changes: Vec<TempoChange>) {
        self.tempo_changes = changes;
    }

    pub fn tempo(&self) -> f64 {
        if self.tempo.is_finite() && self.tempo > 0.0 {
            self.tempo
        } else {
            DEFAULT_TEMPO
        }
    }

    pub fn root(&self) -> &Channel {
        &self.channels[&self.root]
    }

    pub fn root_id(&self) -> ChannelId {
        self.root
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(&id)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Clips of `channel` in their stored order.
    pub fn clips_of(&self, channel: &Channel) -> impl Iterator<Item = &Clip> {
        channel.clips.iter().filter_map(|id| self.clips.get(id))
    }

    /// Effective timeline origin of every channel: parent origin plus own start beat.
    pub fn origins(&self) -> HashMap<ChannelId, f64> {
        let mut origins = HashMap::with_capacity(self.channels.len());
        self.fold(self.root, 0.0, &mut |channel, origin| {
            origins.insert(channel.id, origin);
        });
        origins
    }

    /// Length of the mix in beats: the latest clip end anywhere in the tree.
    pub fn beat_count(&self) -> f64 {
        let mut end: f64 = 0.0;
        self.fold(self.root, 0.0, &mut |channel, origin| {
            for clip in self.clips_of(channel) {
                end = end.max(origin + clip.end_beat());
            }
        });
        end
    }

    /// The mix's beat/time/tempo mapping.
    pub fn time_scale(&self) -> TimeScale {
        TimeScale::with_tempo_changes(self.beat_count(), self.tempo(), &self.tempo_changes)
    }

    fn fold<'a>(&'a self, id: ChannelId, parent_origin: f64, visit: &mut impl FnMut(&'a Channel, f64)) {
        let Some(channel) = self.channels.get(&id) else {
            return;
        };
        let origin = if id == self.root {
            0.0
        } else {
            parent_origin + channel.start_beat
        };
        visit(channel, origin);
        for child in &channel.children {
            self.fold(*child, origin, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatgraph_transport::SampleId;

    fn unloaded_clip(id: u64, start: f64, beats: f64) -> Clip {
        Clip::sample(ClipId(id), start, beats, SampleRef::Unloaded(SampleId(id)))
    }

    #[test]
    fn test_origins_accumulate_down_the_tree() {
        let mut tree = MixTree::new(ChannelId(0), 128.0);
        tree.add_channel(ChannelId(0), ChannelId(1), ChannelKind::TrackGroup, 4.0)
            .unwrap();
        tree.add_channel(ChannelId(1), ChannelId(2), ChannelKind::SampleTrack, 2.0)
            .unwrap();
        tree.add_channel(ChannelId(0), ChannelId(3), ChannelKind::PrimaryTrack, 8.0)
            .unwrap();

        let origins = tree.origins();
        assert_eq!(origins[&ChannelId(0)], 0.0);
        assert_eq!(origins[&ChannelId(1)], 4.0);
        assert_eq!(origins[&ChannelId(2)], 6.0);
        assert_eq!(origins[&ChannelId(3)], 8.0);
    }

    #[test]
    fn test_beat_count_is_latest_clip_end() {
        let mut tree = MixTree::new(ChannelId(0), 128.0);
        tree.add_channel(ChannelId(0), ChannelId(1), ChannelKind::SampleTrack, 4.0)
            .unwrap();
        tree.add_clip(ChannelId(1), unloaded_clip(1, 2.0, 8.0)).unwrap();
        tree.add_clip(ChannelId(0), unloaded_clip(2, 0.0, 3.0)).unwrap();

        assert_eq!(tree.beat_count(), 14.0);
    }

    #[test]
    fn test_rejects_unknown_parent_and_duplicates() {
        let mut tree = MixTree::new(ChannelId(0), 128.0);
        assert!(matches!(
            tree.add_channel(ChannelId(9), ChannelId(1), ChannelKind::SampleTrack, 0.0),
            Err(TreeError::UnknownChannel(ChannelId(9)))
        ));
        tree.add_channel(ChannelId(0), ChannelId(1), ChannelKind::SampleTrack, 0.0)
            .unwrap();
        assert!(matches!(
            tree.add_channel(ChannelId(0), ChannelId(1), ChannelKind::SampleTrack, 0.0),
            Err(TreeError::DuplicateChannel(_))
        ));
        // re-attaching the root would create a cycle
        assert!(matches!(
            tree.add_channel(ChannelId(1), ChannelId(0), ChannelKind::TrackGroup, 0.0),
            Err(TreeError::DuplicateChannel(_))
        ));
        assert!(matches!(
            tree.add_channel(ChannelId(1), ChannelId(5), ChannelKind::Mix, 0.0),
            Err(TreeError::NestedMix)
        ));

        tree.add_clip(ChannelId(1), unloaded_clip(1, 0.0, 1.0)).unwrap();
        assert!(matches!(
            tree.add_clip(ChannelId(0), unloaded_clip(1, 0.0, 1.0)),
            Err(TreeError::DuplicateClip(_))
        ));
    }

    #[test]
    fn test_invalid_tempo_and_start_beat_fall_back() {
        let mut tree = MixTree::new(ChannelId(0), f64::NAN);
        assert_eq!(tree.tempo(), DEFAULT_TEMPO);
        tree.add_channel(ChannelId(0), ChannelId(1), ChannelKind::SampleTrack, f64::NAN)
            .unwrap();
        assert_eq!(tree.channel(ChannelId(1)).unwrap().start_beat, 0.0);
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let mut tree = MixTree::new(ChannelId(0), 128.0);
        for id in [5, 2, 9] {
            tree.add_channel(ChannelId(0), ChannelId(id), ChannelKind::SampleTrack, 0.0)
                .unwrap();
        }
        assert_eq!(
            tree.root().children(),
            &[ChannelId(5), ChannelId(2), ChannelId(9)]
        );
    }
}
