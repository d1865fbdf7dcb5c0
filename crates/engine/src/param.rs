//! Evaluation of scheduled parameters on the audio thread.

use beatgraph_transport::{ParamEvent, ParamSchedule};

/// Parameters are read once per sub-block of this many frames.
pub const SUB_BLOCK_FRAMES: usize = 128;

/// Timing of the block being rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    /// Clock time of the first frame, seconds.
    pub start_time: f64,
    pub frames: usize,
    pub sample_rate: u32,
}

impl Block {
    pub fn frame_time(&self, frame: usize) -> f64 {
        self.start_time + frame as f64 / self.sample_rate as f64
    }

    /// Clock time just past the last frame.
    pub fn end_time(&self) -> f64 {
        self.frame_time(self.frames)
    }

    /// Start frame and length of each sub-block.
    pub fn sub_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.frames)
            .step_by(SUB_BLOCK_FRAMES)
            .map(|start| (start, SUB_BLOCK_FRAMES.min(self.frames - start)))
    }
}

/// A [`ParamSchedule`] evaluated like a Web Audio `AudioParam`.
#[derive(Debug, Clone)]
pub struct AutomatedParam {
    schedule: ParamSchedule,
    default: f64,
}

impl AutomatedParam {
    pub fn new(schedule: ParamSchedule, default: f64) -> Self {
        Self { schedule, default }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(ParamSchedule::constant(value), value)
    }

    /// Value at clock time `time`. The latest event at or before `time` decides; a value curve
    /// is spread evenly over its duration and holds its last value afterwards.
    pub fn value_at(&self, time: f64) -> f64 {
        let events = self.schedule.events();
        let count = events.partition_point(|event| event.time() <= time);
        let Some(event) = count.checked_sub(1).map(|i| &events[i]) else {
            return self.default;
        };
        match event {
            ParamEvent::SetValueAtTime { value, .. } => *value,
            ParamEvent::SetValueCurveAtTime {
                curve,
                start_time,
                duration,
            } => {
                let values = curve.as_slice();
                let last = values.len().saturating_sub(1);
                let Some(&tail) = values.last() else {
                    return self.default;
                };
                let progress = (time - start_time) / duration;
                if !(progress < 1.0) || last == 0 {
                    return tail as f64;
                }
                let position = progress.max(0.0) * last as f64;
                let k = (position.floor() as usize).min(last - 1);
                let frac = position - k as f64;
                let (v0, v1) = (values[k] as f64, values[k + 1] as f64);
                v0 + (v1 - v0) * frac
            }
        }
    }

    /// Mean of the sub-block values across `block`.
    pub fn block_average(&self, block: &Block) -> f64 {
        if block.frames == 0 {
            return self.value_at(block.start_time);
        }
        let mut sum = 0.0;
        for (start, len) in block.sub_blocks() {
            sum += self.value_at(block.frame_time(start)) * len as f64;
        }
        sum / block.frames as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatgraph_transport::ValueCurve;

    #[test]
    fn test_set_value_steps() {
        let mut schedule = ParamSchedule::constant(1.0);
        schedule.set_value_at_time(0.25, 2.0);
        let param = AutomatedParam::new(schedule, 1.0);
        assert_eq!(param.value_at(-1.0), 1.0);
        assert_eq!(param.value_at(1.999), 1.0);
        assert_eq!(param.value_at(2.0), 0.25);
        assert_eq!(param.value_at(100.0), 0.25);
    }

    #[test]
    fn test_curve_interpolates_then_holds() {
        let mut schedule = ParamSchedule::constant(0.0);
        schedule.set_value_curve_at_time(ValueCurve::from(vec![0.0, 1.0, 3.0]), 1.0, 2.0);
        let param = AutomatedParam::new(schedule, 0.0);

        assert_eq!(param.value_at(0.5), 0.0);
        assert_eq!(param.value_at(1.0), 0.0);
        assert!((param.value_at(1.5) - 0.5).abs() < 1e-12);
        assert!((param.value_at(2.5) - 2.0).abs() < 1e-12);
        assert_eq!(param.value_at(3.0), 3.0);
        assert_eq!(param.value_at(10.0), 3.0);
    }

    #[test]
    fn test_block_average_weights_sub_blocks() {
        let mut schedule = ParamSchedule::constant(0.0);
        // flips to 1.0 exactly at the second sub-block of a 256-frame block
        schedule.set_value_at_time(1.0, 128.0 / 1000.0);
        let param = AutomatedParam::new(schedule, 0.0);
        let block = Block {
            start_time: 0.0,
            frames: 256,
            sample_rate: 1000,
        };
        assert_eq!(param.block_average(&block), 0.5);
    }

    #[test]
    fn test_sub_blocks_cover_ragged_block() {
        let block = Block {
            start_time: 0.0,
            frames: 300,
            sample_rate: 48000,
        };
        let sub: Vec<_> = block.sub_blocks().collect();
        assert_eq!(sub, vec![(0, 128), (128, 128), (256, 44)]);
    }
}
