//! Per-clip tempo curves.
//!
//! A sample clip plays its buffer at `mix_bpm / native_bpm` of its recorded speed. The ratio
//! is expressed over clip-local time (seconds since the clip started) so the engine's tempo
//! parameter can be scheduled directly.

use crate::time::{Scale, TimeScale};

/// A clip's extent on the absolute beat axis together with its clock-time equivalents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSpan {
    pub start_beat: f64,
    pub end_beat: f64,
    pub start_time: f64,
    pub end_time: f64,
}

impl ClipSpan {
    pub fn new(scale: &TimeScale, start_beat: f64, beat_count: f64) -> Self {
        let start_beat = crate::time::finite_or_zero(start_beat);
        let beat_count = crate::time::finite_or_zero(beat_count).max(0.0);
        let end_beat = start_beat + beat_count;
        Self {
            start_beat,
            end_beat,
            start_time: scale.time_at(start_beat),
            end_time: scale.time_at(end_beat),
        }
    }

    pub fn beat_count(&self) -> f64 {
        self.end_beat - self.start_beat
    }

    /// Seconds from clip start to clip end.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Clip-local time of an absolute beat.
    pub fn local_time(&self, scale: &TimeScale, beat: f64) -> f64 {
        scale.time_at(beat) - self.start_time
    }

    /// Absolute beat at a clip-local time.
    pub fn beat_at_local(&self, scale: &TimeScale, local_time: f64) -> f64 {
        scale.beat_at(self.start_time + local_time)
    }

    pub fn strictly_contains(&self, beat: f64) -> bool {
        self.start_beat < beat && beat < self.end_beat
    }
}

/// Ratio of mix tempo to the sample's native tempo, or 1.0 if either is unusable.
pub fn tempo_ratio(sync_bpm: f64, audio_bpm: Option<f64>) -> f64 {
    let ratio = audio_bpm.map_or(f64::NAN, |bpm| sync_bpm / bpm);
    if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 }
}

/// Derive the clip-local time → tempo ratio scale for a sample clip.
///
/// Knots sit at the clip start, at every tempo knot strictly inside the clip and at the
/// clip end. The scale follows the mix's tempo interpolation and is clamped, so times outside
/// the clip hold the boundary ratio.
pub fn clip_tempo_scale(scale: &TimeScale, span: &ClipSpan, audio_bpm: Option<f64>) -> Scale {
    let mut beats = vec![span.start_beat];
    beats.extend(
        scale
            .domain_knots()
            .iter()
            .copied()
            .filter(|knot| span.strictly_contains(*knot)),
    );
    if span.end_beat > span.start_beat {
        beats.push(span.end_beat);
    }

    let mut domain = Vec::with_capacity(beats.len());
    let mut range = Vec::with_capacity(beats.len());
    for beat in beats {
        let local = span.local_time(scale, beat);
        // beat_at(start_time + local) == beat; read the tempo at the exact knot beat
        domain.push(local);
        range.push(tempo_ratio(scale.tempo_at(beat), audio_bpm));
    }

    Scale::new(domain, range, scale.bpm_scale().interpolation()).clamped()
}
