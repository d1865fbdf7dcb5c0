//! Effect nodes. All of them process interleaved stereo in place and never allocate after
//! construction.

use beatgraph_transport::{BiquadNode, DelayNode, FilterKind};
use std::f64::consts::PI;

use crate::param::{AutomatedParam, Block};

/// Shelf slope used by the band shelves.
const SHELF_SLOPE: f64 = 0.9;

/// A lowpass at or above this cutoff is fully open.
const OPEN_LOWPASS_HZ: f64 = 20000.0;

pub struct Gain {
    gain: AutomatedParam,
}

impl Gain {
    pub fn new(gain: AutomatedParam) -> Self {
        Self { gain }
    }

    pub fn process(&mut self, buffer: &mut [f32], block: &Block) {
        for (start, len) in block.sub_blocks() {
            let gain = self.gain.value_at(block.frame_time(start)) as f32;
            for sample in &mut buffer[start * 2..(start + len) * 2] {
                *sample *= gain;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// RBJ cookbook coefficients. Degenerate settings (cutoff outside the audible band,
    /// a flat shelf) pass audio through untouched.
    fn design(filter: FilterKind, frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let nyquist = sample_rate / 2.0;
        let frequency = if frequency.is_finite() { frequency } else { 0.0 };
        match filter {
            FilterKind::Highpass if frequency <= 0.0 => return Self::passthrough(),
            FilterKind::Lowpass if frequency >= OPEN_LOWPASS_HZ.min(nyquist) => {
                return Self::passthrough();
            }
            FilterKind::LowShelf | FilterKind::Peaking | FilterKind::HighShelf
                if gain_db.abs() <= 0.1 =>
            {
                return Self::passthrough();
            }
            _ => {}
        }

        let f0 = frequency.clamp(10.0, nyquist * 0.99);
        let q = if q.is_finite() { q.clamp(0.05, 30.0) } else { 1.0 };
        let a = 10f64.powf(gain_db.clamp(-60.0, 24.0) / 40.0);
        let w0 = 2.0 * PI * f0 / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let shelf_alpha =
            sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();

        let (b0, b1, b2, a0, a1, a2) = match filter {
            FilterKind::Lowpass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Highpass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterKind::LowShelf => {
                let k = 2.0 * a.sqrt() * shelf_alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - k),
                    (a + 1.0) + (a - 1.0) * cos_w0 + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - k,
                )
            }
            FilterKind::HighShelf => {
                let k = 2.0 * a.sqrt() * shelf_alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - k),
                    (a + 1.0) - (a - 1.0) * cos_w0 + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - k,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Transposed direct form II state, one pair per channel.
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: [f64; 2],
    z2: [f64; 2],
}

impl BiquadState {
    fn process(&mut self, buffer: &mut [f32], c: &Coefficients) {
        for frame in buffer.chunks_exact_mut(2) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let x = *sample as f64;
                let y = c.b0 * x + self.z1[ch];
                self.z1[ch] = c.b1 * x - c.a1 * y + self.z2[ch];
                self.z2[ch] = c.b2 * x - c.a2 * y;
                *sample = y as f32;
            }
        }
        for z in self.z1.iter_mut().chain(self.z2.iter_mut()) {
            if z.abs() < 1e-15 {
                *z = 0.0;
            }
        }
    }
}

pub struct Biquad {
    filter: FilterKind,
    frequency: AutomatedParam,
    q: AutomatedParam,
    gain: AutomatedParam,
    /// (frequency, q, gain) the cached coefficients were designed for.
    designed_for: Option<(f64, f64, f64)>,
    coefficients: Coefficients,
    state: BiquadState,
}

impl Biquad {
    pub fn new(node: &BiquadNode, defaults: (f64, f64, f64)) -> Self {
        Self {
            filter: node.filter,
            frequency: AutomatedParam::new(node.frequency.clone(), defaults.0),
            q: AutomatedParam::new(node.q.clone(), defaults.1),
            gain: AutomatedParam::new(node.gain.clone(), defaults.2),
            designed_for: None,
            coefficients: Coefficients::passthrough(),
            state: BiquadState::default(),
        }
    }

    pub fn filter(&self) -> FilterKind {
        self.filter
    }

    pub fn process(&mut self, buffer: &mut [f32], block: &Block) {
        for (start, len) in block.sub_blocks() {
            let time = block.frame_time(start);
            let params = (
                self.frequency.value_at(time),
                self.q.value_at(time),
                self.gain.value_at(time),
            );
            if self.needs_design(params) {
                self.coefficients = Coefficients::design(
                    self.filter,
                    params.0,
                    params.1,
                    params.2,
                    block.sample_rate as f64,
                );
                self.designed_for = Some(params);
            }
            self.state
                .process(&mut buffer[start * 2..(start + len) * 2], &self.coefficients);
        }
    }

    fn needs_design(&self, (frequency, q, gain): (f64, f64, f64)) -> bool {
        match self.designed_for {
            None => true,
            Some((f, old_q, g)) => {
                (f - frequency).abs() >= 0.01 || (old_q - q).abs() >= 0.001 || (g - gain).abs() >= 0.01
            }
        }
    }

    /// Continue from `previous`'s filter memory if it is the same shape.
    pub fn adopt_state(&mut self, previous: &mut Biquad) {
        if previous.filter == self.filter {
            std::mem::swap(&mut self.state, &mut previous.state);
        }
    }
}

/// Feedback delay with a one-pole highpass on the wet signal.
pub struct Delay {
    wet: AutomatedParam,
    cutoff: AutomatedParam,
    delay_frames: usize,
    feedback: f32,
    /// Interleaved stereo ring.
    line: Vec<f32>,
    write: usize,
    lowpass: [f32; 2],
}

impl Delay {
    pub fn new(node: &DelayNode, sample_rate: u32, max_delay_secs: f64) -> Self {
        let max_frames = (max_delay_secs.max(0.0) * sample_rate as f64).ceil() as usize;
        let delay_frames = (node.delay_time.max(0.0) * sample_rate as f64).round() as usize;
        let delay_frames = delay_frames.clamp(1, max_frames.max(1));
        Self {
            wet: AutomatedParam::new(node.wet.clone(), 0.0),
            cutoff: AutomatedParam::new(node.cutoff.clone(), 0.0),
            delay_frames,
            feedback: node.feedback.clamp(0.0, 0.95) as f32,
            line: vec![0.0; delay_frames * 2],
            write: 0,
            lowpass: [0.0; 2],
        }
    }

    pub fn process(&mut self, buffer: &mut [f32], block: &Block) {
        for (start, len) in block.sub_blocks() {
            let time = block.frame_time(start);
            let wet = self.wet.value_at(time) as f32;
            let coeff = one_pole_coeff(self.cutoff.value_at(time), block.sample_rate);

            for frame in buffer[start * 2..(start + len) * 2].chunks_exact_mut(2) {
                let at = self.write * 2;
                for ch in 0..2 {
                    let delayed = self.line[at + ch];
                    // highpass = input minus its one-pole lowpass
                    self.lowpass[ch] += coeff * (delayed - self.lowpass[ch]);
                    let wet_signal = delayed - self.lowpass[ch];
                    self.line[at + ch] = frame[ch] + delayed * self.feedback;
                    frame[ch] += wet_signal * wet;
                }
                self.write = (self.write + 1) % self.delay_frames;
            }
        }
    }

    /// Keep `previous`'s delay line ringing if it has the same length.
    pub fn adopt_state(&mut self, previous: &mut Delay) {
        if previous.delay_frames == self.delay_frames {
            std::mem::swap(&mut self.line, &mut previous.line);
            self.write = previous.write;
            self.lowpass = previous.lowpass;
        }
    }
}

/// One-pole lowpass coefficient for `cutoff` Hz. Zero or negative cutoffs give 0, which
/// makes the derived highpass a passthrough.
fn one_pole_coeff(cutoff: f64, sample_rate: u32) -> f32 {
    if !(cutoff > 0.0) {
        return 0.0;
    }
    let rc = 1.0 / (2.0 * PI * cutoff);
    let dt = 1.0 / sample_rate as f64;
    (dt / (rc + dt)) as f32
}
