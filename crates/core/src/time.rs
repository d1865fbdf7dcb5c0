//! Beat ↔ clock-time mapping for a mix.
//!
//! Tempo is held constant between tempo changes, which keeps beat → time exactly
//! piecewise linear: one knot per change, linear extrapolation past either end.

/// Tempo of a mix that doesn't specify one.
pub const DEFAULT_TEMPO: f64 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Straight lines between knots.
    Linear,
    /// Each knot's value holds until the next knot.
    Hold,
}

/// A piecewise function over sorted knots.
///
/// Unclamped linear scales extrapolate with the slope of the outermost segment;
/// clamped scales hold the boundary value outside the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    domain: Vec<f64>,
    range: Vec<f64>,
    interpolation: Interpolation,
    clamp: bool,
}

impl Scale {
    /// # Panics
    ///
    /// Panics if `domain` is empty or the two knot lists differ in length.
    pub fn new(domain: Vec<f64>, range: Vec<f64>, interpolation: Interpolation) -> Self {
        assert!(!domain.is_empty(), "scale needs at least one knot");
        assert_eq!(domain.len(), range.len(), "domain and range must be the same length");
        Self {
            domain,
            range,
            interpolation,
            clamp: false,
        }
    }

    pub fn linear(domain: Vec<f64>, range: Vec<f64>) -> Self {
        Self::new(domain, range, Interpolation::Linear)
    }

    pub fn clamped(mut self) -> Self {
        self.clamp = true;
        self
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn range(&self) -> &[f64] {
        &self.range
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self.interpolation {
            Interpolation::Linear => interpolate(&self.domain, &self.range, x, self.clamp),
            Interpolation::Hold => hold(&self.domain, &self.range, x),
        }
    }

    /// Map a range value back to the domain. Only meaningful for linear scales
    /// whose range increases monotonically.
    pub fn invert(&self, y: f64) -> f64 {
        interpolate(&self.range, &self.domain, y, self.clamp)
    }
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64, clamp: bool) -> f64 {
    let last = xs.len() - 1;
    if last == 0 {
        return ys[0];
    }
    let x = if clamp { x.clamp(xs[0], xs[last]) } else { x };

    let i = xs.partition_point(|knot| *knot <= x).saturating_sub(1).min(last - 1);
    let (x0, x1) = (xs[i], xs[i + 1]);
    let (y0, y1) = (ys[i], ys[i + 1]);
    let width = x1 - x0;
    if width <= 0.0 {
        return if x >= x1 { y1 } else { y0 };
    }
    y0 + (x - x0) / width * (y1 - y0)
}

fn hold(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let i = xs.partition_point(|knot| *knot <= x).saturating_sub(1);
    ys[i.min(ys.len() - 1)]
}

/// A tempo that takes effect at `beat` and holds until the next change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoChange {
    pub beat: f64,
    pub bpm: f64,
}

/// The BeatScale/BpmScale pair of a mix, shared by every channel below it.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeScale {
    beats: Scale,
    bpm: Scale,
}

impl TimeScale {
    pub fn new(beat_count: f64, bpm: f64) -> Self {
        Self::with_tempo_changes(beat_count, bpm, &[])
    }

    /// Build from a base tempo plus changes. Changes outside `(0, beat_count)` or with an
    /// invalid tempo are ignored, except that a change at beat 0 replaces `bpm`.
    pub fn with_tempo_changes(beat_count: f64, bpm: f64, changes: &[TempoChange]) -> Self {
        let end = if beat_count.is_finite() && beat_count > 0.0 {
            beat_count
        } else {
            1.0
        };

        let mut knots = vec![(0.0, valid_bpm(bpm).unwrap_or(DEFAULT_TEMPO))];
        let mut sorted: Vec<TempoChange> = changes
            .iter()
            .copied()
            .filter(|change| change.beat.is_finite() && valid_bpm(change.bpm).is_some())
            .collect();
        sorted.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        for change in sorted {
            if change.beat <= 0.0 {
                knots[0].1 = change.bpm;
            } else if change.beat < end {
                match knots.last_mut() {
                    Some(last) if last.0 == change.beat => last.1 = change.bpm,
                    _ => knots.push((change.beat, change.bpm)),
                }
            }
        }

        let mut beat_knots = Vec::with_capacity(knots.len() + 1);
        let mut time_knots = Vec::with_capacity(knots.len() + 1);
        let mut bpm_values = Vec::with_capacity(knots.len() + 1);
        let mut time = 0.0;
        for (i, &(beat, tempo)) in knots.iter().enumerate() {
            beat_knots.push(beat);
            time_knots.push(time);
            bpm_values.push(tempo);
            let next = knots.get(i + 1).map_or(end, |k| k.0);
            time += (next - beat) * 60.0 / tempo;
        }
        let last_tempo = knots[knots.len() - 1].1;
        beat_knots.push(end);
        time_knots.push(time);
        bpm_values.push(last_tempo);

        Self {
            beats: Scale::linear(beat_knots.clone(), time_knots),
            bpm: Scale::new(beat_knots, bpm_values, Interpolation::Hold),
        }
    }

    /// Seconds from the start of the mix to `beat`.
    pub fn time_at(&self, beat: f64) -> f64 {
        self.beats.eval(finite_or_zero(beat))
    }

    /// The exact inverse of [`time_at`](Self::time_at). Invalid times map to beat 0.
    pub fn beat_at(&self, time: f64) -> f64 {
        if !time.is_finite() {
            return 0.0;
        }
        finite_or_zero(self.beats.invert(time))
    }

    pub fn tempo_at(&self, beat: f64) -> f64 {
        self.bpm.eval(finite_or_zero(beat))
    }

    /// Beat positions where the beat → time slope may change, including both ends.
    pub fn domain_knots(&self) -> &[f64] {
        self.beats.domain()
    }

    pub fn beat_scale(&self) -> &Scale {
        &self.beats
    }

    pub fn bpm_scale(&self) -> &Scale {
        &self.bpm
    }
}

fn valid_bpm(bpm: f64) -> Option<f64> {
    (bpm.is_finite() && bpm > 0.0).then_some(bpm)
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
