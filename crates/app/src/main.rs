use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use beatgraph_core::{
    ChannelId, ChannelKind, Clip, ClipId, ControlKind, ControlPoint, EngineConfig, EngineEvent,
    MixTree, SampleId, Session,
};
use beatgraph_decode::SampleLibrary;
use clap::Parser;

const MIX: ChannelId = ChannelId(0);
const TRACK: ChannelId = ChannelId(1);

#[derive(Parser)]
#[command(name = "beatgraph-play")]
#[command(about = "Play a sample tempo-synced to a mix", long_about = None)]
struct Cli {
    /// Audio file to play (wav, flac, mp3, ...)
    sample: PathBuf,

    /// Native tempo of the sample; without it the sample plays at its own speed
    #[arg(long)]
    sample_bpm: Option<f64>,

    /// Mix tempo in BPM (default: from config)
    #[arg(short, long)]
    tempo: Option<f64>,

    /// Length of the clip in beats
    #[arg(short, long, default_value = "16")]
    beats: f64,

    /// Beat to start playback from
    #[arg(short, long, default_value = "0")]
    seek: f64,

    /// Open a lowpass filter over the length of the clip
    #[arg(long)]
    sweep: bool,

    /// Pitch shift in semitones
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pitch: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load();
    let tempo = cli.tempo.unwrap_or(config.default_tempo);

    let mut session = Session::new(MixTree::new(MIX, tempo), config)?;
    let mut library = SampleLibrary::new(session.sample_rate());
    let sample_id = library
        .load(&cli.sample, cli.sample_bpm)
        .with_context(|| format!("loading {}", cli.sample.display()))?;

    session.set_tree(build_tree(&cli, tempo, &library, sample_id)?)?;
    session.seek(cli.seek)?;
    session.play()?;
    log::info!(
        "playing {} beats at {tempo} BPM from beat {}",
        cli.beats,
        cli.seek
    );

    let mut drift_corrections = 0;
    while !session.is_finished() {
        drift_corrections += session
            .poll()
            .iter()
            .filter(|event| matches!(event, EngineEvent::Drift { .. }))
            .count();
        std::thread::sleep(Duration::from_millis(50));
    }
    session.pause()?;
    session.poll();

    log::info!("done, {drift_corrections} drift corrections");
    Ok(())
}

fn build_tree(
    cli: &Cli,
    tempo: f64,
    library: &SampleLibrary,
    sample: SampleId,
) -> anyhow::Result<MixTree> {
    let mut tree = MixTree::new(MIX, tempo);
    tree.add_channel(MIX, TRACK, ChannelKind::SampleTrack, 0.0)?;
    tree.add_clip(TRACK, Clip::sample(ClipId(0), 0.0, cli.beats, library.get(sample)))?;

    if cli.sweep {
        let points = vec![
            ControlPoint { beat: 0.0, value: 0.3 },
            ControlPoint { beat: cli.beats, value: 1.0 },
        ];
        tree.add_clip(
            TRACK,
            Clip::automation(ClipId(1), 0.0, cli.beats, ControlKind::LowpassCutoff.name(), points),
        )?;
    }

    if cli.pitch != 0.0 {
        // normalized 0.5 is no shift, the range is two octaves
        let value = (cli.pitch / 24.0 + 0.5).clamp(0.0, 1.0);
        tree.add_clip(
            TRACK,
            Clip::automation(
                ClipId(2),
                0.0,
                cli.beats,
                ControlKind::Pitch.name(),
                vec![ControlPoint { beat: 0.0, value }],
            ),
        )?;
    }

    Ok(tree)
}
