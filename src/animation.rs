//! Fire-and-forget property tweens.
//!
//! A tween writes nothing until its start time, then writes the eased value
//! every time the animator is sampled, and writes its final value exactly once
//! when it completes. Tweens are independent of each other: a reveal sequence
//! is just several tweens scheduled with different delays from the same
//! moment.

use std::time::Duration;

use crate::config::RevealStep;

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    #[allow(dead_code)]
    Linear,
    /// CSS-style cubic bezier through (0, 0), (x1, y1), (x2, y2), (1, 1).
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    pub const EASE: Easing = Easing::CubicBezier(0.25, 0.1, 0.25, 1.0);

    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match *self {
            Easing::Linear => t,
            Easing::CubicBezier(x1, y1, x2, y2) => {
                if t == 0.0 || t == 1.0 {
                    return t;
                }
                let s = solve_bezier_x(x1, x2, t);
                bezier(y1, y2, s)
            }
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Easing::EASE
    }
}

// One axis of a cubic bezier with fixed endpoints 0 and 1.
fn bezier(p1: f32, p2: f32, s: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
}

fn bezier_slope(p1: f32, p2: f32, s: f32) -> f32 {
    let inv = 1.0 - s;
    3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
}

// Finds the curve parameter whose x equals `x`.
fn solve_bezier_x(x1: f32, x2: f32, x: f32) -> f32 {
    const EPSILON: f32 = 1e-6;

    let mut s = x;
    for _ in 0..8 {
        let error = bezier(x1, x2, s) - x;
        if error.abs() < EPSILON {
            return s;
        }
        let slope = bezier_slope(x1, x2, s);
        if slope.abs() < EPSILON {
            break;
        }
        s -= error / slope;
    }

    // Newton stalled on a flat section, fall back to bisection.
    let (mut low, mut high) = (0.0f32, 1.0f32);
    s = x;
    for _ in 0..32 {
        let value = bezier(x1, x2, s);
        if (value - x).abs() < EPSILON {
            break;
        }
        if value < x {
            low = s;
        } else {
            high = s;
        }
        s = (low + high) * 0.5;
    }
    s
}

#[derive(Debug, Clone)]
pub struct Tween<C> {
    pub channel: C,
    pub from: f32,
    pub to: f32,
    pub start_at: Duration,
    pub duration: Duration,
    pub easing: Easing,
}

impl<C> Tween<C> {
    pub fn new(channel: C, from: f32, to: f32) -> Self {
        Self {
            channel,
            from,
            to,
            start_at: Duration::ZERO,
            duration: Duration::ZERO,
            easing: Easing::default(),
        }
    }

    /// Schedules the tween relative to `origin`.
    pub fn scheduled(mut self, origin: Duration, step: RevealStep) -> Self {
        self.start_at = origin + step.delay;
        self.duration = step.duration;
        self
    }

    #[allow(dead_code)]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn end_at(&self) -> Duration {
        self.start_at + self.duration
    }

    /// Value at `now`, or `None` if the tween has not started yet.
    pub fn sample(&self, now: Duration) -> Option<f32> {
        if now < self.start_at {
            return None;
        }

        if self.duration.is_zero() || now >= self.end_at() {
            return Some(self.to);
        }

        let progress = (now - self.start_at).as_secs_f32() / self.duration.as_secs_f32();
        Some(lerp(self.from, self.to, self.easing.apply(progress)))
    }
}

pub struct Animator<C> {
    tweens: Vec<Tween<C>>,
}

impl<C: Copy> Animator<C> {
    pub fn new() -> Self {
        Self { tweens: Vec::new() }
    }

    pub fn add(&mut self, tween: Tween<C>) {
        self.tweens.push(tween);
    }

    /// Samples every started tween, passing each value to `apply`, and drops
    /// the ones that have finished.
    pub fn update(&mut self, now: Duration, mut apply: impl FnMut(C, f32)) {
        self.tweens.retain(|tween| match tween.sample(now) {
            Some(value) => {
                apply(tween.channel, value);
                now < tween.end_at()
            }
            None => true,
        });
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.tweens.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tweens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Channel {
        A,
        B,
    }

    fn secs(value: f32) -> Duration {
        Duration::from_secs_f32(value)
    }

    fn step(delay: f32, duration: f32) -> RevealStep {
        RevealStep {
            delay: secs(delay),
            duration: secs(duration),
        }
    }

    #[test]
    fn easing_endpoints_are_fixed() {
        for easing in [Easing::Linear, Easing::EASE, Easing::CubicBezier(0.0, 0.0, 0.58, 1.0)] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            assert_eq!(easing.apply(-1.0), 0.0);
            assert_eq!(easing.apply(2.0), 1.0);
        }
    }

    #[test]
    fn linear_bezier_is_identity() {
        let easing = Easing::CubicBezier(1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0);
        for i in 1..10 {
            let t = i as f32 / 10.0;
            assert!((easing.apply(t) - t).abs() < 1e-4);
        }
    }

    #[test]
    fn ease_is_monotonic_and_front_loaded() {
        let mut previous = 0.0;
        for i in 1..=100 {
            let value = Easing::EASE.apply(i as f32 / 100.0);
            assert!(value >= previous);
            previous = value;
        }
        // CSS `ease` is well past the halfway point at half time.
        assert!(Easing::EASE.apply(0.5) > 0.75);
    }

    #[test]
    fn tween_is_silent_before_its_delay() {
        let tween = Tween::new(Channel::A, -10.0, 0.0)
            .scheduled(secs(5.0), step(1.0, 2.0))
            .with_easing(Easing::Linear);

        assert_eq!(tween.sample(secs(5.5)), None);
        assert_eq!(tween.sample(secs(6.0)), Some(-10.0));
        assert!((tween.sample(secs(7.0)).unwrap() + 5.0).abs() < 1e-4);
        assert_eq!(tween.sample(secs(8.0)), Some(0.0));
        assert_eq!(tween.sample(secs(100.0)), Some(0.0));
    }

    #[test]
    fn animator_writes_final_value_and_retires_tween() {
        let mut animator = Animator::new();
        animator.add(Tween::new(Channel::A, 0.0, 1.0).scheduled(Duration::ZERO, step(0.0, 1.0)));
        animator.add(Tween::new(Channel::B, 0.0, 1.0).scheduled(Duration::ZERO, step(2.0, 1.0)));

        let mut writes = Vec::new();
        animator.update(secs(1.5), |channel, value| writes.push((channel, value)));

        assert_eq!(writes, vec![(Channel::A, 1.0)]);
        assert_eq!(animator.len(), 1);

        writes.clear();
        animator.update(secs(1.6), |channel, value| writes.push((channel, value)));
        assert!(writes.is_empty());

        animator.update(secs(3.0), |channel, value| writes.push((channel, value)));
        assert_eq!(writes, vec![(Channel::B, 1.0)]);
        assert!(animator.is_idle());
    }

    #[test]
    fn independent_tweens_do_not_wait_for_each_other() {
        let mut animator = Animator::new();
        animator.add(Tween::new(Channel::A, 0.0, 1.0).scheduled(Duration::ZERO, step(1.0, 10.0)));
        animator.add(Tween::new(Channel::B, 0.0, 1.0).scheduled(Duration::ZERO, step(2.0, 1.0)));

        let mut b_value = None;
        animator.update(secs(3.0), |channel, value| {
            if channel == Channel::B {
                b_value = Some(value);
            }
        });

        // B finished while A is still running.
        assert_eq!(b_value, Some(1.0));
        assert_eq!(animator.len(), 1);
    }
}
