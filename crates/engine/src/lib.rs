mod clock;
mod config;
mod dsp;
mod graph;
mod param;
mod renderer;
mod source;
mod stretch;

pub use clock::AudioClock;
pub use config::{ConfigError, EngineConfig};
pub use param::{AutomatedParam, Block, SUB_BLOCK_FRAMES};
pub use graph::{RealizeError, RenderGraph, RenderSettings};
pub use renderer::{GraphHandoff, Renderer};
pub use source::{EventSink, SourceState, StretchSource};
pub use stretch::{MAX_TEMPO, MIN_TEMPO, SignalsmithStretch, TimeStretch, clamp_tempo};

use basedrop::{Collector, Handle, Owned};
use beatgraph_transport::{AudioGraph, EngineEvent};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

pub struct AudioEngineHandle {
    pub graphs: rtrb::Producer<GraphHandoff>,
    pub events: rtrb::Consumer<EngineEvent>,
    pub collector: Collector,
    pub handle: Handle,
    clock: AudioClock,
    settings: RenderSettings,
    _stream: cpal::Stream,
}

impl AudioEngineHandle {
    /// Realise `graph` and queue it for the audio thread.
    pub fn apply(&mut self, graph: &AudioGraph) -> anyhow::Result<()> {
        let render = RenderGraph::realize(graph, self.settings)?;
        self.graphs
            .push(Owned::new(&self.handle, render))
            .map_err(|_| anyhow::anyhow!("render graph queue is full"))?;
        Ok(())
    }

    /// Clock time of the latest audio block, seconds since the stream started.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    /// Free graphs the audio thread has retired.
    pub fn collect(&mut self) {
        self.collector.collect();
    }
}

pub fn start(config: &EngineConfig) -> anyhow::Result<AudioEngineHandle> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (graph_tx, graph_rx) = rtrb::RingBuffer::<GraphHandoff>::new(config.graph_queue_capacity.max(1));
    let (event_tx, event_rx) = rtrb::RingBuffer::<EngineEvent>::new(config.event_queue_capacity.max(1));

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let mut stream_config: cpal::StreamConfig = supported.into();
    if let Some(rate) = config.sample_rate {
        stream_config.sample_rate = cpal::SampleRate(rate);
    }
    let settings = RenderSettings::new(config, stream_config.sample_rate.0);
    log::info!(
        "audio output: {} channels at {} Hz, {} frame blocks",
        stream_config.channels,
        settings.sample_rate,
        settings.block_frames
    );

    let clock = AudioClock::new();
    let renderer = Renderer::new(
        graph_rx,
        event_tx,
        clock.clone(),
        settings.sample_rate,
        settings.block_frames,
    );

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, renderer)?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;

    Ok(AudioEngineHandle {
        graphs: graph_tx,
        events: event_rx,
        collector,
        handle,
        clock,
        settings,
        _stream: stream,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as f64;

    let mut origin: Option<cpal::StreamInstant> = None;
    let mut frames_rendered: u64 = 0;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
            // block time: device playback timestamp relative to the first callback
            let playback = info.timestamp().playback;
            let first = *origin.get_or_insert(playback);
            let start_time = playback
                .duration_since(&first)
                .map_or(frames_rendered as f64 / sample_rate, |elapsed| elapsed.as_secs_f64());

            renderer.process(data, output_channels, start_time);
            frames_rendered += (data.len() / output_channels.max(1)) as u64;
        },
        |err| log::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
