mod audio;
mod event;
mod graph;
mod ids;

pub use audio::{AudioArc, Sample, SampleRef, resample_audio_arc};
pub use event::EngineEvent;
pub use graph::{
    AudioGraph, BiquadNode, DelayNode, FilterKind, FxStage, NodeDescriptor, NodeKey, NodeKind,
    Output, ParamEvent, ParamSchedule, StretchSourceNode, ValueCurve,
};
pub use ids::{ChannelId, ClipId, SampleId};
