use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use beatgraph_transport::{AudioArc, Sample, SampleId, SampleRef};
use log::{debug, info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

const SAMPLES_ROOT: &str = "samples";

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("sample not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to resample {path} to {rate} Hz")]
    Resample {
        path: PathBuf,
        rate: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("invalid tempo {0} for sample")]
    InvalidTempo(f64),
}

/// Resolve a sample path to an existing file.
/// Accepts paths as given or relative to the samples root (e.g. `cr78/hihat.wav`).
pub fn resolve_sample_path(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }
    let with_root = Path::new(SAMPLES_ROOT).join(path);
    with_root.exists().then_some(with_root)
}

pub fn decode_file(path: &Path) -> anyhow::Result<AudioArc> {
    let resolved = resolve_sample_path(path)
        .ok_or_else(|| anyhow::anyhow!("sample not found: {}", path.display()))?;
    decode_file_direct(&resolved)
}

/// Decode the default track of an audio file into interleaved `f32`.
pub fn decode_file_direct(path: &Path) -> anyhow::Result<AudioArc> {
    let source = MediaSourceStream::new(Box::new(File::open(path)?), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let mut format = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())?
        .format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("{} has no audio track", path.display()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("{} has no sample rate", path.display()))?;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let mut staging: Option<SampleBuffer<f32>> = None;
    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(err)) => {
                warn!("{}: skipping corrupt packet: {err}", path.display());
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let spec = *decoded.spec();
        channels.get_or_insert(spec.channels.count() as u16);
        let capacity = decoded.capacity() as u64;
        if staging.as_ref().is_some_and(|b| b.capacity() < decoded.capacity()) {
            staging = None;
        }
        let buffer = staging.get_or_insert_with(|| SampleBuffer::new(capacity, spec));
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let channels = channels.unwrap_or(2).max(1);
    let whole = samples.len() - samples.len() % channels as usize;
    samples.truncate(whole);
    Ok(AudioArc::new(samples, sample_rate, channels))
}

/// Decoded samples at the output rate, handed to clips as [`SampleRef`]s.
pub struct SampleLibrary {
    sample_rate: u32,
    samples: HashMap<SampleId, Sample>,
    next_id: u64,
}

impl SampleLibrary {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode `path`, resample it to the library rate and register it.
    /// `bpm` is the sample's native tempo; without one, clips play it at its own speed.
    pub fn load(&mut self, path: &Path, bpm: Option<f64>) -> Result<SampleId, LibraryError> {
        if let Some(bpm) = bpm
            && !(bpm.is_finite() && bpm > 0.0)
        {
            return Err(LibraryError::InvalidTempo(bpm));
        }

        let resolved =
            resolve_sample_path(path).ok_or_else(|| LibraryError::NotFound(path.to_path_buf()))?;
        let decoded = decode_file_direct(&resolved).map_err(|source| LibraryError::Decode {
            path: resolved.clone(),
            source,
        })?;
        debug!(
            "decoded {}: {} frames, {} channels at {} Hz",
            resolved.display(),
            decoded.frames(),
            decoded.channels(),
            decoded.sample_rate()
        );

        let audio = decoded
            .resample(self.sample_rate)
            .map_err(|source| LibraryError::Resample {
                path: resolved.clone(),
                rate: self.sample_rate,
                source,
            })?;

        let name = resolved
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| resolved.display().to_string());
        info!("loaded sample '{name}' ({:.2}s)", audio.duration_secs());
        Ok(self.insert(name, audio, bpm))
    }

    /// Register already-decoded audio. It is stored as given, without resampling.
    pub fn insert(&mut self, name: impl Into<String>, audio: AudioArc, bpm: Option<f64>) -> SampleId {
        let id = SampleId(self.next_id);
        self.next_id += 1;
        self.samples.insert(
            id,
            Sample {
                id,
                name: name.into(),
                audio,
                bpm,
            },
        );
        id
    }

    pub fn remove(&mut self, id: SampleId) -> Option<Sample> {
        self.samples.remove(&id)
    }

    /// Reference for a clip; ids the library doesn't hold resolve to `Unloaded`.
    pub fn get(&self, id: SampleId) -> SampleRef {
        match self.samples.get(&id) {
            Some(sample) => SampleRef::Loaded(sample.clone()),
            None => SampleRef::Unloaded(id),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
