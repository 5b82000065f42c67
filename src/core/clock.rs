//! Frame-accurate playback clock
//!
//! Advances the current frame index by accumulating elapsed wall time
//! against per-frame durations - no dropped ticks from timer jitter, and a
//! long stall simply advances several frames at once. Looping follows the
//! animation's loop count.

use std::time::{Duration, Instant};

use log::trace;

use crate::entities::renderer::AnimationInfo;

/// Frames declaring a zero delay still get a minimal tick so the clock
/// cannot spin in place
const MIN_FRAME_DURATION_MS: u32 = 1;

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    info: AnimationInfo,
    playing: bool,
    current: usize,
    loops_done: u32,
    last_tick: Option<Instant>,
    /// Elapsed time not yet spent on frame advances
    carry: Duration,
}

impl PlaybackClock {
    pub fn new(info: AnimationInfo) -> Self {
        Self {
            info,
            playing: false,
            current: 0,
            loops_done: 0,
            last_tick: None,
            carry: Duration::ZERO,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.last_tick = None;
    }

    pub fn pause(&mut self) {
        if self.playing {
            self.playing = false;
            self.last_tick = None;
            trace!("playback paused at frame {}", self.current);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Jump to a frame, clamped to the timeline; resets loop accounting
    pub fn seek(&mut self, index: usize) {
        let count = self.info.frame_count();
        self.current = if count == 0 { 0 } else { index.min(count - 1) };
        self.carry = Duration::ZERO;
        self.last_tick = None;
    }

    /// Advance by elapsed time. Returns the new frame index when the
    /// position changed, None otherwise.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        if !self.playing || self.info.frame_count() == 0 {
            return None;
        }

        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return None;
        };
        self.carry += now.saturating_duration_since(last);
        self.last_tick = Some(now);

        let count = self.info.frame_count();
        let mut advanced = false;

        loop {
            let duration_ms = self
                .info
                .frame_duration_ms(self.current)
                .unwrap_or(MIN_FRAME_DURATION_MS)
                .max(MIN_FRAME_DURATION_MS);
            let frame_duration = Duration::from_millis(duration_ms as u64);
            if self.carry < frame_duration {
                break;
            }
            self.carry -= frame_duration;

            if self.current + 1 >= count {
                self.loops_done += 1;
                let loop_count = self.info.loop_count;
                if loop_count != 0 && self.loops_done >= loop_count {
                    trace!("reached final loop, stopping at last frame");
                    self.playing = false;
                    self.carry = Duration::ZERO;
                    break;
                }
                self.current = 0;
            } else {
                self.current += 1;
            }
            advanced = true;
        }

        advanced.then_some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::frame::PixelFormat;

    fn info(durations: Vec<u32>, loop_count: u32) -> AnimationInfo {
        AnimationInfo {
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8888,
            frame_durations_ms: durations,
            loop_count,
        }
    }

    #[test]
    fn test_advances_by_frame_duration() {
        let mut clock = PlaybackClock::new(info(vec![100, 50, 100], 0));
        clock.play();

        let t0 = Instant::now();
        assert_eq!(clock.tick(t0), None); // first tick only arms the clock
        assert_eq!(clock.tick(t0 + Duration::from_millis(99)), None);
        assert_eq!(clock.tick(t0 + Duration::from_millis(101)), Some(1));
        // frame 1 lasts 50ms
        assert_eq!(clock.tick(t0 + Duration::from_millis(151)), Some(2));
    }

    /// Test: a long stall advances several frames at once
    #[test]
    fn test_catches_up_after_stall() {
        let mut clock = PlaybackClock::new(info(vec![100; 10], 0));
        clock.play();

        let t0 = Instant::now();
        clock.tick(t0);
        assert_eq!(clock.tick(t0 + Duration::from_millis(350)), Some(3));
    }

    #[test]
    fn test_infinite_loop_wraps() {
        let mut clock = PlaybackClock::new(info(vec![100, 100], 0));
        clock.play();

        let t0 = Instant::now();
        clock.tick(t0);
        assert_eq!(clock.tick(t0 + Duration::from_millis(200)), Some(0));
        assert!(clock.is_playing());
    }

    /// Test: a finite loop count stops playback on the last frame
    #[test]
    fn test_finite_loops_stop() {
        let mut clock = PlaybackClock::new(info(vec![100, 100], 1));
        clock.play();

        let t0 = Instant::now();
        clock.tick(t0);
        let _ = clock.tick(t0 + Duration::from_millis(100));
        assert_eq!(clock.current_frame(), 1);

        let _ = clock.tick(t0 + Duration::from_millis(200));
        assert!(!clock.is_playing());
        assert_eq!(clock.current_frame(), 1);
    }

    #[test]
    fn test_seek_clamps() {
        let mut clock = PlaybackClock::new(info(vec![100; 4], 0));
        clock.seek(99);
        assert_eq!(clock.current_frame(), 3);
        clock.seek(1);
        assert_eq!(clock.current_frame(), 1);
    }

    #[test]
    fn test_paused_clock_never_advances() {
        let mut clock = PlaybackClock::new(info(vec![10; 4], 0));
        let t0 = Instant::now();
        assert_eq!(clock.tick(t0), None);
        assert_eq!(clock.tick(t0 + Duration::from_millis(500)), None);
        assert_eq!(clock.current_frame(), 0);
    }

    #[test]
    fn test_zero_delay_frames_guarded() {
        let mut clock = PlaybackClock::new(info(vec![0, 0, 0], 0));
        clock.play();
        let t0 = Instant::now();
        clock.tick(t0);
        // zero-delay frames advance at the guard rate instead of spinning
        assert!(clock.tick(t0 + Duration::from_millis(2)).is_some());
    }
}
