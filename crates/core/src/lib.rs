pub mod automation;
pub mod compile;
pub mod curve;
pub mod play_state;
pub mod session;
pub mod tempo;
pub mod time;
pub mod tree;

pub use automation::{ChainSettings, ControlKind, ControlTypeError, FxChain, PitchTrack, build_chain};
pub use compile::{Compiler, compile};
pub use curve::{Curve, TICKS_PER_BEAT, sample_curve, sample_window, tick_count};
pub use play_state::{PlayState, PlayStatus, Timeline};
pub use session::Session;
pub use tempo::{ClipSpan, clip_tempo_scale, tempo_ratio};
pub use time::{DEFAULT_TEMPO, Interpolation, Scale, TempoChange, TimeScale};
pub use tree::{
    AutomationClip, Channel, ChannelKind, Clip, ClipContent, ControlPoint, MixTree, SampleClip,
    TreeError,
};

pub use beatgraph_engine::{EngineConfig, SignalsmithStretch};
pub use beatgraph_transport::{
    AudioArc, AudioGraph, ChannelId, ClipId, EngineEvent, NodeKey, NodeKind, Output, Sample,
    SampleId, SampleRef,
};
