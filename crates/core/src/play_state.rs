use crate::time::{TimeScale, finite_or_zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayStatus {
    Playing,
    #[default]
    Paused,
}

impl PlayStatus {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayStatus::Playing)
    }
}

/// Transport position: the beat playback was last (re)started from and the clock time at which
/// that happened.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayState {
    pub status: PlayStatus,
    pub seek_beat: f64,
    pub abs_seek_time: f64,
}

impl PlayState {
    pub fn current_beat(&self, scale: &TimeScale, now: f64) -> f64 {
        match self.status {
            PlayStatus::Paused => self.seek_beat,
            PlayStatus::Playing => {
                let elapsed = finite_or_zero(now - self.abs_seek_time);
                scale.beat_at(scale.time_at(self.seek_beat) + elapsed)
            }
        }
    }

    /// # Panics
    ///
    /// Panics if already playing.
    pub fn play(&mut self, now: f64) {
        assert!(!self.status.is_playing(), "transport is already playing");
        self.status = PlayStatus::Playing;
        self.abs_seek_time = now;
    }

    /// Freeze the transport at the beat reached at `now`.
    ///
    /// # Panics
    ///
    /// Panics if not playing.
    pub fn pause(&mut self, scale: &TimeScale, now: f64) {
        assert!(self.status.is_playing(), "transport is not playing");
        self.seek_beat = self.current_beat(scale, now);
        self.abs_seek_time = now;
        self.status = PlayStatus::Paused;
    }

    pub fn seek(&mut self, beat: f64, now: f64) {
        self.seek_beat = finite_or_zero(beat).max(0.0);
        self.abs_seek_time = now;
    }
}

/// A [`PlayState`] resolved against a time scale at one instant; maps beats to clock time.
#[derive(Debug, Clone, Copy)]
pub struct Timeline<'a> {
    pub scale: &'a TimeScale,
    pub current_beat: f64,
    wall_offset: f64,
}

impl<'a> Timeline<'a> {
    pub fn new(scale: &'a TimeScale, play_state: &PlayState, now: f64) -> Self {
        Self {
            scale,
            current_beat: play_state.current_beat(scale, now),
            wall_offset: play_state.abs_seek_time - scale.time_at(play_state.seek_beat),
        }
    }

    /// Clock time at which `beat` plays.
    pub fn wall_time(&self, beat: f64) -> f64 {
        self.scale.time_at(beat) + self.wall_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_beat_advances_while_playing() {
        let scale = TimeScale::new(64.0, 120.0);
        let mut state = PlayState::default();
        state.seek(4.0, 10.0);
        assert_eq!(state.current_beat(&scale, 50.0), 4.0);

        state.play(12.0);
        // 1.5 s at 120 bpm is three beats
        assert!((state.current_beat(&scale, 13.5) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_freezes_position() {
        let scale = TimeScale::new(64.0, 120.0);
        let mut state = PlayState::default();
        state.play(0.0);
        state.pause(&scale, 2.0);
        assert_eq!(state.status, PlayStatus::Paused);
        assert!((state.seek_beat - 4.0).abs() < 1e-9);
        assert!((state.current_beat(&scale, 100.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "transport is already playing")]
    fn test_play_twice_panics() {
        let mut state = PlayState::default();
        state.play(0.0);
        state.play(1.0);
    }

    #[test]
    #[should_panic(expected = "transport is not playing")]
    fn test_pause_while_paused_panics() {
        let scale = TimeScale::new(8.0, 120.0);
        PlayState::default().pause(&scale, 0.0);
    }

    #[test]
    fn test_wall_time_is_relative_to_seek() {
        let scale = TimeScale::new(64.0, 120.0);
        let mut state = PlayState::default();
        state.seek(8.0, 100.0);
        state.play(100.0);
        let timeline = Timeline::new(&scale, &state, 100.0);
        assert!((timeline.wall_time(8.0) - 100.0).abs() < 1e-9);
        assert!((timeline.wall_time(10.0) - 101.0).abs() < 1e-9);
        assert!((timeline.current_beat - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_sanitises_beat() {
        let mut state = PlayState::default();
        state.seek(f64::NAN, 1.0);
        assert_eq!(state.seek_beat, 0.0);
        state.seek(-3.0, 1.0);
        assert_eq!(state.seek_beat, 0.0);
    }
}
