//! Time-stretch cores.

use signalsmith_stretch::Stretch;

/// Playback tempo is clamped to this range.
pub const MIN_TEMPO: f64 = 0.25;
pub const MAX_TEMPO: f64 = 4.0;

/// A streaming time-stretcher over interleaved stereo.
///
/// The tempo is owned by the caller's bookkeeping: it decides how many input frames are fed
/// per output frame, and `process` stretches whatever it is given into `output`.
pub trait TimeStretch: Send + 'static {
    fn set_tempo(&mut self, tempo: f64);
    fn tempo(&self) -> f64;
    fn set_pitch(&mut self, semitones: f64);
    /// Drop all buffered audio.
    fn clear(&mut self);
    fn process(&mut self, input: &[f32], output: &mut [f32]);
}

pub struct SignalsmithStretch {
    stretch: Stretch,
    tempo: f64,
    pitch: f64,
}

impl SignalsmithStretch {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            stretch: Stretch::preset_default(2, sample_rate),
            tempo: 1.0,
            pitch: 0.0,
        }
    }

    pub fn latency(&self) -> usize {
        self.stretch.input_latency() + self.stretch.output_latency()
    }
}

impl TimeStretch for SignalsmithStretch {
    fn set_tempo(&mut self, tempo: f64) {
        self.tempo = clamp_tempo(tempo);
    }

    fn tempo(&self) -> f64 {
        self.tempo
    }

    fn set_pitch(&mut self, semitones: f64) {
        let semitones = if semitones.is_finite() { semitones.clamp(-24.0, 24.0) } else { 0.0 };
        if semitones != self.pitch {
            self.pitch = semitones;
            self.stretch
                .set_transpose_factor_semitones(semitones as f32, None);
        }
    }

    fn clear(&mut self) {
        self.stretch.reset();
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if input.is_empty() {
            output.fill(0.0);
            return;
        }
        self.stretch.process(input, output);
    }
}

pub fn clamp_tempo(tempo: f64) -> f64 {
    if tempo.is_finite() {
        tempo.clamp(MIN_TEMPO, MAX_TEMPO)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_is_clamped() {
        assert_eq!(clamp_tempo(0.0), MIN_TEMPO);
        assert_eq!(clamp_tempo(10.0), MAX_TEMPO);
        assert_eq!(clamp_tempo(f64::NAN), 1.0);
        assert_eq!(clamp_tempo(1.5), 1.5);
    }

    #[test]
    fn test_signalsmith_fills_output() {
        let mut stretch = SignalsmithStretch::new(44100);
        stretch.set_tempo(1.0);
        assert!(stretch.latency() > 0);

        let input = vec![0.0; 512 * 2];
        let mut output = vec![1.0; 512 * 2];
        stretch.process(&input, &mut output);
        assert_eq!(output.len(), 1024);
        assert!(output.iter().all(|v| v.is_finite()));
    }
}
