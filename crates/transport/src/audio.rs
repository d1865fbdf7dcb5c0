use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::SampleId;

/// Shared, immutable interleaved sample data.
///
/// Cloning only bumps the reference count of the sample slice, so a buffer can be
/// referenced from the tree snapshot, every compiled graph and the render thread at once.
///
/// ```
/// use beatgraph_transport::AudioArc;
///
/// let audio = AudioArc::new(vec![0.0, 0.5, 1.0, 0.5], 44100, 2);
/// assert_eq!(audio.frames(), 2);
/// assert_eq!(audio.stereo_frame(1), (1.0, 0.5));
/// ```
#[derive(Clone)]
pub struct AudioArc {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// # Panics
    ///
    /// Panics if `channels` is 0 or `samples.len()` is not a multiple of `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self::from_arc(Arc::from(samples), sample_rate, channels)
    }

    pub fn from_arc(samples: Arc<[f32]>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read one frame as a stereo pair. Mono is duplicated, channels past the
    /// second are ignored, and frames past the end read as silence.
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        if frame >= self.frames() {
            return (0.0, 0.0);
        }
        let channels = self.channels as usize;
        let base = frame * channels;
        let left = self.samples[base];
        let right = if channels > 1 { self.samples[base + 1] } else { left };
        (left, right)
    }

    /// Two handles are equal when they share the same sample allocation.
    pub fn ptr_eq(&self, other: &AudioArc) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Resample to `target_sample_rate`, returning a cheap clone when the rate already matches.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }
        resample_audio_arc(self, target_sample_rate)
    }
}

impl PartialEq for AudioArc {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) && self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}

impl std::fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Sinc resampling of interleaved audio through rubato.
pub fn resample_audio_arc(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }

    let channels = audio.channels as usize;
    let input_frames = audio.frames();
    if input_frames == 0 {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }
    let ratio = target_sample_rate as f64 / audio.sample_rate as f64;

    let mut planar = vec![Vec::with_capacity(input_frames); channels];
    for frame in audio.samples().chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_frames, channels)?;
    let output = resampler.process(&planar, None)?;

    let output_frames = output[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for channel in &output {
            interleaved.push(channel[frame]);
        }
    }

    Ok(AudioArc::new(interleaved, target_sample_rate, audio.channels))
}

/// A decoded sample as handed out by the sample provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
    pub audio: AudioArc,
    /// Native tempo from metadata, if the sample has one.
    pub bpm: Option<f64>,
}

/// A sample clip's reference: either resolved, or known to be missing.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleRef {
    Loaded(Sample),
    Unloaded(SampleId),
}

impl SampleRef {
    pub fn id(&self) -> SampleId {
        match self {
            SampleRef::Loaded(sample) => sample.id,
            SampleRef::Unloaded(id) => *id,
        }
    }

    pub fn loaded(&self) -> Option<&Sample> {
        match self {
            SampleRef::Loaded(sample) => Some(sample),
            SampleRef::Unloaded(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, duration_secs: f32, channels: u16) -> AudioArc {
        let frames = (sample_rate as f32 * duration_secs) as usize;
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let value = (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin();
            samples.extend(std::iter::repeat_n(value, channels as usize));
        }
        AudioArc::new(samples, sample_rate, channels)
    }

    #[test]
    #[should_panic(expected = "channels must be greater than 0")]
    fn test_zero_channels_panics() {
        AudioArc::new(vec![0.0], 44100, 0);
    }

    #[test]
    #[should_panic(expected = "samples.len() must be divisible by channels")]
    fn test_ragged_length_panics() {
        AudioArc::new(vec![0.0, 0.1, 0.2], 44100, 2);
    }

    #[test]
    fn test_stereo_frame_mono_and_past_end() {
        let mono = AudioArc::new(vec![0.25, 0.5], 48000, 1);
        assert_eq!(mono.stereo_frame(1), (0.5, 0.5));
        assert_eq!(mono.stereo_frame(2), (0.0, 0.0));
    }

    #[test]
    fn test_clone_shares_allocation() {
        let audio = AudioArc::new(vec![0.0; 1024], 44100, 2);
        let other = audio.clone();
        assert!(audio.ptr_eq(&other));
        assert_eq!(audio, other);
        assert_eq!(Arc::strong_count(audio.samples_arc()), 2);
    }

    #[test]
    fn test_equal_content_different_allocation_is_not_equal() {
        let a = AudioArc::new(vec![0.0; 4], 44100, 2);
        let b = AudioArc::new(vec![0.0; 4], 44100, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_resample_same_rate_is_cheap() {
        let audio = sine(440.0, 44100, 0.05, 2);
        let resampled = audio.resample(44100).unwrap();
        assert!(resampled.ptr_eq(&audio));
    }

    #[test]
    fn test_resample_changes_length_by_ratio() {
        let audio = sine(440.0, 44100, 0.1, 2);
        let resampled = audio.resample(48000).unwrap();
        assert_eq!(resampled.sample_rate(), 48000);
        assert_eq!(resampled.channels(), 2);

        let expected = (audio.frames() as f64 * 48000.0 / 44100.0) as i64;
        let tolerance = (expected as f64 * 0.03) as i64;
        assert!((resampled.frames() as i64 - expected).abs() <= tolerance);
    }
}
