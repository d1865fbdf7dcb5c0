//! Sampling continuous scales into value curves for `SetValueCurveAtTime`.

use beatgraph_transport::ValueCurve;

use crate::time::Scale;

/// Resolution of sampled curves.
pub const TICKS_PER_BEAT: f64 = 100.0;

/// Anything that can be evaluated along a one-dimensional axis.
pub trait Curve {
    fn value_at(&self, x: f64) -> f64;
}

impl Curve for Scale {
    fn value_at(&self, x: f64) -> f64 {
        self.eval(x)
    }
}

impl<F> Curve for F
where
    F: Fn(f64) -> f64,
{
    fn value_at(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Sample `scale` over `[start_beat, start_beat + beat_count]` at [`TICKS_PER_BEAT`].
///
/// The result has `floor(beat_count * TICKS_PER_BEAT)` values. A value curve is played back
/// with its values spread evenly from the first to the last, so value `i` is taken at
/// `i / (n - 1)` of the window; the first and last values are the exact boundary values.
/// A one-value curve holds the start value.
pub fn sample_curve<C>(scale: Option<&C>, start_beat: f64, beat_count: f64) -> ValueCurve
where
    C: Curve + ?Sized,
{
    let Some(scale) = scale else {
        return ValueCurve::empty();
    };
    sample_window(scale, start_beat, beat_count, tick_count(beat_count))
}

/// Number of curve values for a window of `beat_count` beats.
pub fn tick_count(beat_count: f64) -> usize {
    if beat_count > 0.0 && beat_count.is_finite() {
        (beat_count * TICKS_PER_BEAT).floor() as usize
    } else {
        0
    }
}

/// Sample `len` values of `curve` evenly over `[start, start + width]`, endpoints included.
///
/// Used when the axis being sampled is not beats, e.g. clip-local seconds, while the
/// resolution still follows the window's beat length.
pub fn sample_window<C>(curve: &C, start: f64, width: f64, len: usize) -> ValueCurve
where
    C: Curve + ?Sized,
{
    if len == 0 || !(width > 0.0) || !start.is_finite() || !width.is_finite() {
        return ValueCurve::empty();
    }

    let mut values = Vec::with_capacity(len);
    values.push(curve.value_at(start) as f32);
    if len > 1 {
        let last = len - 1;
        for i in 1..last {
            let x = start + (i as f64 / last as f64) * width;
            values.push(curve.value_at(x) as f32);
        }
        values.push(curve.value_at(start + width) as f32);
    }
    ValueCurve::from(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_pinned_boundaries() {
        let scale = Scale::linear(vec![0.0, 4.0], vec![0.0, 1.0]);
        let curve = sample_curve(Some(&scale), 1.0, 2.5);

        assert_eq!(curve.len(), 250);
        assert_eq!(curve.first(), Some(scale.eval(1.0) as f32));
        assert_eq!(curve.last(), Some(scale.eval(3.5) as f32));
    }

    #[test]
    fn test_interior_values_follow_playback_grid() {
        let curve = sample_curve(Some(&|x: f64| x), 0.0, 1.0);
        let values = curve.as_slice();
        assert_eq!(values.len(), 100);
        assert!((values[33] - 33.0 / 99.0).abs() < 1e-6);
        // monotone input gives monotone samples, with no flat tail at the edge
        assert!(values.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_empty_cases() {
        let scale = |x: f64| x * 2.0;
        assert!(sample_curve(Some(&scale), 0.0, 0.0).is_empty());
        assert!(sample_curve(Some(&scale), 0.0, -1.0).is_empty());
        assert!(sample_curve(Some(&scale), 0.0, f64::NAN).is_empty());
        assert!(sample_curve(Some(&scale), 0.0, 0.005).is_empty());
        assert!(sample_curve::<Scale>(None, 0.0, 4.0).is_empty());
    }

    #[test]
    fn test_single_tick_holds_start_value() {
        let curve = sample_curve(Some(&|x: f64| x + 1.0), 2.0, 0.015);
        assert_eq!(curve.as_slice(), &[3.0]);
    }

    #[test]
    fn test_window_spreads_over_its_own_axis() {
        // 4 beats' worth of values over a 3 second window
        let curve = sample_window(&|t: f64| t, 1.0, 3.0, tick_count(4.0));
        let values = curve.as_slice();
        assert_eq!(values.len(), 400);
        assert_eq!(values[0], 1.0);
        assert_eq!(values[399], 4.0);
        assert!((values[133] - (1.0 + 3.0 * 133.0 / 399.0) as f32).abs() < 1e-5);
        assert!(sample_window(&|t: f64| t, 0.0, 0.0, 10).is_empty());
    }

    #[test]
    fn test_fractional_tick_counts_floor() {
        let curve = sample_curve(Some(&|_: f64| 0.5), 0.0, 1.239);
        assert_eq!(curve.len(), 123);
    }
}
