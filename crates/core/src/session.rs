use beatgraph_engine::{AudioEngineHandle, EngineConfig};
use beatgraph_transport::{EngineEvent, Output};
use log::{debug, info, warn};

use crate::automation::ChainSettings;
use crate::compile::Compiler;
use crate::play_state::{PlayState, PlayStatus};
use crate::time::TimeScale;
use crate::tree::MixTree;

/// Transport controller: owns the mix, the play state and the running engine. Every
/// transport change recompiles the mix and hands the new graph to the engine.
pub struct Session {
    engine: AudioEngineHandle,
    config: EngineConfig,
    tree: MixTree,
    time_scale: TimeScale,
    play_state: PlayState,
}

impl Session {
    pub fn new(tree: MixTree, config: EngineConfig) -> anyhow::Result<Self> {
        let engine = beatgraph_engine::start(&config)?;
        let mut session = Self {
            engine,
            config,
            time_scale: tree.time_scale(),
            tree,
            play_state: PlayState::default(),
        };
        session.publish()?;
        Ok(session)
    }

    /// # Panics
    ///
    /// Panics if already playing.
    pub fn play(&mut self) -> anyhow::Result<()> {
        let now = self.engine.now();
        self.play_state.play(now);
        info!("play from beat {:.2}", self.play_state.seek_beat);
        self.publish()
    }

    /// # Panics
    ///
    /// Panics if not playing.
    pub fn pause(&mut self) -> anyhow::Result<()> {
        let now = self.engine.now();
        self.play_state.pause(&self.time_scale, now);
        info!("paused at beat {:.2}", self.play_state.seek_beat);
        self.publish()
    }

    pub fn seek(&mut self, beat: f64) -> anyhow::Result<()> {
        let now = self.engine.now();
        self.play_state.seek(beat, now);
        debug!("seek to beat {:.2}", self.play_state.seek_beat);
        self.publish()
    }

    /// Replace the mix, keeping the transport where it is.
    pub fn set_tree(&mut self, tree: MixTree) -> anyhow::Result<()> {
        if self.play_state.status.is_playing() {
            let now = self.engine.now();
            let beat = self.current_beat();
            self.play_state.seek(beat, now);
        }
        self.time_scale = tree.time_scale();
        self.tree = tree;
        self.publish()
    }

    /// Drain engine events, logging drift corrections, and free retired graphs.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.engine.events.pop() {
            match event {
                EngineEvent::Drift {
                    key,
                    expected,
                    actual,
                } => warn!("{key} drifted: expected frame {expected}, was at {actual}"),
                EngineEvent::SourceEnded { key } => debug!("{key} ended"),
                EngineEvent::GraphSwapped { nodes, adopted } => {
                    debug!("graph swapped: {nodes} nodes, {adopted} adopted")
                }
            }
            events.push(event);
        }
        self.engine.collect();
        events
    }

    pub fn current_beat(&self) -> f64 {
        self.play_state
            .current_beat(&self.time_scale, self.engine.now())
    }

    pub fn play_state(&self) -> &PlayState {
        &self.play_state
    }

    pub fn is_playing(&self) -> bool {
        self.play_state.status == PlayStatus::Playing
    }

    /// True once playback has passed the last clip.
    pub fn is_finished(&self) -> bool {
        self.current_beat() >= self.tree.beat_count()
    }

    pub fn tree(&self) -> &MixTree {
        &self.tree
    }

    pub fn time_scale(&self) -> &TimeScale {
        &self.time_scale
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    fn chain_settings(&self) -> ChainSettings {
        ChainSettings::synced(
            self.config.delay_beats,
            self.config.delay_feedback,
            self.tree.tempo(),
        )
    }

    fn publish(&mut self) -> anyhow::Result<()> {
        let now = self.engine.now();
        let graph = Compiler::new(&self.tree, &self.time_scale, &self.play_state, now)
            .with_settings(self.chain_settings())
            .compile(&[Output::Destination]);
        debug!("compiled {} nodes at {now:.3}s", graph.len());
        self.engine.apply(&graph)
    }
}
