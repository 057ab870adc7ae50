use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(250);
pub const DEFAULT_FADE_TICK: Duration = Duration::from_millis(10);

/// Time source for animations.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
}

/// Result of one animation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeFrame {
    pub opacity: f32,
    /// Set to the target opacity on the tick that completes an animation.
    pub finished: Option<f32>,
}

/// Interpolates window opacity towards a target.
///
/// Nothing here sleeps: the owner calls [`FadeAnimator::tick`] from its frame
/// loop and the animator samples the clock. Progress advances in whole tick
/// intervals, so the produced samples step from the start value to the
/// target without overshooting.
pub struct FadeAnimator {
    clock: Arc<dyn Clock>,
    tick: Duration,
    opacity: f32,
    active: Option<Fade>,
}

impl FadeAnimator {
    pub fn new(clock: Arc<dyn Clock>, tick: Duration) -> Self {
        Self {
            clock,
            tick: if tick.is_zero() { DEFAULT_FADE_TICK } else { tick },
            opacity: 0.0,
            active: None,
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    pub fn target(&self) -> Option<f32> {
        self.active.map(|f| f.to)
    }

    /// Start animating from the current opacity to `target`. Any animation
    /// already running is replaced.
    pub fn animate_to(&mut self, target: f32, duration: Duration) {
        let to = target.clamp(0.0, 1.0);
        if let Some(old) = self.active {
            tracing::trace!(from = old.to, to, "fade retargeted");
        }
        self.active = Some(Fade {
            from: self.opacity,
            to,
            start: self.clock.now(),
            duration,
        });
    }

    pub fn tick(&mut self) -> FadeFrame {
        let Some(fade) = self.active else {
            return FadeFrame {
                opacity: self.opacity,
                finished: None,
            };
        };

        let progress = if fade.duration.is_zero() {
            1.0
        } else {
            let elapsed = self.clock.now().saturating_duration_since(fade.start);
            let steps = elapsed.as_nanos() / self.tick.as_nanos();
            let stepped = steps as f64 * self.tick.as_secs_f64();
            (stepped / fade.duration.as_secs_f64()).min(1.0)
        };

        if progress >= 1.0 {
            self.opacity = fade.to;
            self.active = None;
            return FadeFrame {
                opacity: self.opacity,
                finished: Some(fade.to),
            };
        }

        self.opacity = fade.from + (fade.to - fade.from) * progress as f32;
        FadeFrame {
            opacity: self.opacity,
            finished: None,
        }
    }
}
