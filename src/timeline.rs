use std::f64::consts::PI;

use crate::{
    core::{Color, Vec2},
    ease::Ease,
};

/// Interpolation contract for attribute value types.
pub trait Lerp: Sized {
    /// Interpolate from `a` to `b` with normalized factor `t` in `[0, 1]`.
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

impl Lerp for Color {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Color {
            r: a.r + (b.r - a.r) * t,
            g: a.g + (b.g - a.g) * t,
            b: a.b + (b.b - a.b) * t,
        }
    }
}

/// Angle in radians. Interpolates along the shortest arc; stored values are
/// unbounded.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Angle(pub f64);

impl Lerp for Angle {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        let mut delta = (b.0 - a.0).rem_euclid(2.0 * PI);
        if delta > PI {
            delta -= 2.0 * PI;
        }
        Angle(a.0 + delta * t)
    }
}

impl Lerp for bool {
    // Step: hold the left value until the next keyframe.
    fn lerp(a: &Self, _b: &Self, _t: f64) -> Self {
        *a
    }
}

/// One `(time, value, ease)` sample inside a [`Timeline`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe<T> {
    /// Time in milliseconds.
    pub time: f64,
    pub value: T,
    /// Ease applied when interpolating *into* this keyframe.
    pub ease: Ease,
}

impl<T: Clone> Keyframe<T> {
    pub fn new(time: f64, value: T, ease: Ease) -> Self {
        Self { time, value, ease }
    }

    /// Same value and ease at a different time.
    pub fn at_time(&self, time: f64) -> Self {
        Self {
            time,
            value: self.value.clone(),
            ease: self.ease,
        }
    }
}

/// Where a keyframe lands relative to existing keyframes at the same time.
///
/// `Before` seeds a value immediately preceding an existing one (used when a
/// segment opens and the prior sample is backfilled); `After` is the ordinary
/// append and places trailing values such as a synthetic fade-out behind the
/// committed curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyframePlacement {
    Before,
    After,
}

/// Ordered keyframes for one attribute, with a default value returned while
/// empty.
///
/// A timeline is owned by exactly one aggregator or element at a time and is
/// moved, not copied, between its working and final slots.
#[derive(Clone, Debug)]
pub struct Timeline<T> {
    keyframes: Vec<Keyframe<T>>,
    default: T,
}

impl<T: Lerp + Clone + PartialEq> Timeline<T> {
    pub fn new(default: T) -> Self {
        Self {
            keyframes: Vec::new(),
            default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn start_time(&self) -> Option<f64> {
        self.keyframes.first().map(|k| k.time)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.keyframes.last().map(|k| k.time)
    }

    pub fn end_value(&self) -> Option<&T> {
        self.keyframes.last().map(|k| &k.value)
    }

    /// Insert a keyframe, keeping time order. Duplicate times are resolved by
    /// `placement`.
    pub fn add(&mut self, time: f64, value: T, ease: Ease, placement: KeyframePlacement) {
        let index = match placement {
            KeyframePlacement::Before => self.keyframes.partition_point(|k| k.time < time),
            KeyframePlacement::After => self.keyframes.partition_point(|k| k.time <= time),
        };
        self.keyframes.insert(index, Keyframe::new(time, value, ease));
    }

    /// Value at `time`: the default while empty, clamped outside the keyframe
    /// range, otherwise interpolated between the bracketing pair using the
    /// second keyframe's ease.
    pub fn value_at(&self, time: f64) -> T {
        if self.keyframes.is_empty() {
            return self.default.clone();
        }
        let index = self.keyframes.partition_point(|k| k.time <= time);
        if index == 0 {
            return self.keyframes[0].value.clone();
        }
        if index == self.keyframes.len() {
            return self.keyframes[index - 1].value.clone();
        }
        let from = &self.keyframes[index - 1];
        let to = &self.keyframes[index];
        let progress = (time - from.time) / (to.time - from.time);
        T::lerp(&from.value, &to.value, to.ease.apply(progress))
    }

    /// Move every keyframe onto the back of `other`, leaving `self` empty.
    pub fn transfer_to(&mut self, other: &mut Timeline<T>) {
        other.keyframes.append(&mut self.keyframes);
    }

    pub fn clear(&mut self) {
        self.keyframes.clear();
    }

    /// Tolerance-based reduction.
    ///
    /// `projector` maps values into a metric space (unused axes zero). The
    /// first and last keyframes of the segment are always retained, and
    /// every dropped keyframe stays within `tolerance` of the retained
    /// polyline evaluated at its own time. A constant run between the
    /// endpoints reduces to just the endpoints; the emission pass skips the
    /// resulting flat pair, so no no-op instruction ever comes out of it.
    ///
    /// Runs as endpoint-anchored farthest-point refinement over the indexed
    /// keyframe array with an explicit work stack.
    pub fn simplify(&mut self, tolerance: f64, projector: impl Fn(&T) -> [f64; 3]) {
        let n = self.keyframes.len();
        if n < 3 {
            return;
        }

        let points: Vec<[f64; 3]> = self.keyframes.iter().map(|k| projector(&k.value)).collect();
        let times: Vec<f64> = self.keyframes.iter().map(|k| k.time).collect();
        let mut keep = vec![false; n];
        keep[0] = true;
        keep[n - 1] = true;

        let mut stack = vec![(0usize, n - 1)];
        while let Some((a, b)) = stack.pop() {
            if b - a < 2 {
                continue;
            }
            let mut worst = tolerance;
            let mut split = None;
            for i in (a + 1)..b {
                let d = deviation(&points, &times, a, i, b);
                if d > worst {
                    worst = d;
                    split = Some(i);
                }
            }
            if let Some(i) = split {
                keep[i] = true;
                stack.push((a, i));
                stack.push((i, b));
            }
        }

        let mut index = 0;
        self.keyframes.retain(|_| {
            let kept = keep[index];
            index += 1;
            kept
        });
    }

    /// Walk consecutive keyframes and call `emit` for each pair that changes
    /// value. Values are passed through `round` first; flat pairs are
    /// skipped; same-time pairs come out as zero-duration steps.
    ///
    /// A constant timeline emits one zero-duration hold unless its value
    /// equals `default_value`. `explicit_start` extends the first pose back
    /// to an outer window start, and `loopable` pads the final pose to
    /// `explicit_end` so a group's duration stays intact.
    pub fn for_each_pair(
        &self,
        default_value: &T,
        round: impl Fn(&T) -> T,
        explicit_start: Option<f64>,
        explicit_end: Option<f64>,
        loopable: bool,
        mut emit: impl FnMut(&Keyframe<T>, &Keyframe<T>),
    ) {
        let Some(first) = self.keyframes.first() else {
            return;
        };
        let start_time = explicit_start.unwrap_or(first.time);
        let end_time = explicit_end.unwrap_or_else(|| self.keyframes[self.keyframes.len() - 1].time);

        let mut previous: Option<Keyframe<T>> = None;
        let mut step_start: Option<Keyframe<T>> = None;
        let mut last_end: Option<Keyframe<T>> = None;
        let mut has_pair = false;

        for keyframe in &self.keyframes {
            let current = Keyframe::new(keyframe.time, round(&keyframe.value), keyframe.ease);
            if let Some(prev) = previous.take() {
                let is_flat = prev.value == current.value;
                let is_step = !is_flat && prev.time == current.time;

                if is_step {
                    step_start.get_or_insert(prev.clone());
                } else {
                    if let Some(step) = step_start.take() {
                        if !has_pair && step.time > start_time {
                            emit(&step.at_time(start_time), &step);
                        }
                        emit(&step, &prev);
                        last_end = Some(prev.clone());
                        has_pair = true;
                    }
                    if !is_flat {
                        if !has_pair && prev.time > start_time {
                            emit(&prev.at_time(start_time), &prev);
                        }
                        emit(&prev, &current);
                        last_end = Some(current.clone());
                        has_pair = true;
                    }
                }
            }
            previous = Some(current);
        }

        if let (Some(step), Some(prev)) = (step_start.take(), previous.as_ref()) {
            if !has_pair && step.time > start_time {
                emit(&step.at_time(start_time), &step);
            }
            emit(&step, prev);
            last_end = Some(prev.clone());
            has_pair = true;
        }

        if !has_pair {
            let value = round(&first.value);
            if value != *default_value {
                let hold = Keyframe::new(start_time, value, first.ease);
                emit(&hold, &hold);
                last_end = Some(hold);
                has_pair = true;
            }
        }

        if loopable && has_pair {
            if let Some(last) = last_end {
                if last.time < end_time {
                    emit(&last, &last.at_time(end_time));
                }
            }
        }
    }
}

impl Timeline<bool> {
    /// Call `emit(start, end)` for every span where the flag is raised. A
    /// flag still raised at the last keyframe closes there.
    pub fn for_each_flag(&self, mut emit: impl FnMut(f64, f64)) {
        let mut raised_at: Option<f64> = None;
        for keyframe in &self.keyframes {
            match (raised_at, keyframe.value) {
                (None, true) => raised_at = Some(keyframe.time),
                (Some(start), false) => {
                    emit(start, keyframe.time);
                    raised_at = None;
                }
                _ => {}
            }
        }
        if let (Some(start), Some(last)) = (raised_at, self.keyframes.last()) {
            emit(start, last.time);
        }
    }
}

// Distance from the i-th projected keyframe to the a..b chord evaluated at
// the i-th keyframe's own time.
fn deviation(points: &[[f64; 3]], times: &[f64], a: usize, i: usize, b: usize) -> f64 {
    let span = times[b] - times[a];
    let t = if span > 0.0 {
        ((times[i] - times[a]) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut sum = 0.0;
    for axis in 0..3 {
        let interp = points[a][axis] + (points[b][axis] - points[a][axis]) * t;
        let d = points[i][axis] - interp;
        sum += d * d;
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(pairs: &[(f64, f64)]) -> Timeline<f64> {
        let mut timeline = Timeline::new(0.0);
        for &(time, value) in pairs {
            timeline.add(time, value, Ease::Linear, KeyframePlacement::After);
        }
        timeline
    }

    #[test]
    fn value_at_clamps_and_interpolates() {
        let timeline = scalar(&[(1000.0, 0.0), (2000.0, 10.0)]);
        assert_eq!(timeline.value_at(0.0), 0.0);
        assert_eq!(timeline.value_at(1500.0), 5.0);
        assert_eq!(timeline.value_at(3000.0), 10.0);
    }

    #[test]
    fn value_at_uses_second_keyframe_ease() {
        let mut timeline = Timeline::new(0.0);
        timeline.add(0.0, 0.0, Ease::Linear, KeyframePlacement::After);
        timeline.add(1000.0, 1.0, Ease::InQuad, KeyframePlacement::After);
        assert_eq!(timeline.value_at(500.0), 0.25);
    }

    #[test]
    fn empty_returns_default() {
        let timeline: Timeline<f64> = Timeline::new(7.0);
        assert_eq!(timeline.value_at(123.0), 7.0);
    }

    #[test]
    fn duplicate_time_placement() {
        let mut timeline = Timeline::new(0.0);
        timeline.add(100.0, 1.0, Ease::Linear, KeyframePlacement::After);
        timeline.add(100.0, 2.0, Ease::Linear, KeyframePlacement::After);
        timeline.add(100.0, 3.0, Ease::Linear, KeyframePlacement::Before);
        let values: Vec<f64> = timeline.keyframes().iter().map(|k| k.value).collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
        // An exact-time query lands after the whole step run.
        assert_eq!(timeline.value_at(100.0), 2.0);
    }

    #[test]
    fn constant_run_reduces_to_endpoints_and_emits_nothing() {
        let mut timeline = scalar(&[(0.0, 1.0), (250.0, 1.0), (700.0, 1.0), (1000.0, 1.0)]);
        timeline.simplify(0.0, |v| [*v, 0.0, 0.0]);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.start_time(), Some(0.0));
        assert_eq!(timeline.end_time(), Some(1000.0));

        // The surviving flat pair never becomes an instruction.
        let mut count = 0;
        timeline.for_each_pair(&1.0, |v| *v, None, None, false, |_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn simplify_keeps_endpoints_and_fidelity() {
        let mut timeline = Timeline::new(0.0);
        let original: Vec<(f64, f64)> = (0..=100)
            .map(|i| {
                let time = f64::from(i) * 10.0;
                (time, (f64::from(i) * 0.13).sin())
            })
            .collect();
        for &(time, value) in &original {
            timeline.add(time, value, Ease::Linear, KeyframePlacement::After);
        }

        let tolerance = 0.05;
        timeline.simplify(tolerance, |v| [*v, 0.0, 0.0]);

        assert!(timeline.len() < original.len());
        assert_eq!(timeline.start_time(), Some(0.0));
        assert_eq!(timeline.end_time(), Some(1000.0));
        for &(time, value) in &original {
            assert!(
                (timeline.value_at(time) - value).abs() <= tolerance + 1e-9,
                "deviation at t={time}"
            );
        }
    }

    #[test]
    fn transfer_moves_keyframes() {
        let mut working = scalar(&[(0.0, 1.0), (500.0, 2.0)]);
        let mut committed = Timeline::new(0.0);
        working.transfer_to(&mut committed);
        assert!(working.is_empty());
        assert_eq!(committed.len(), 2);
    }

    #[test]
    fn for_each_pair_skips_flat_and_emits_changes() {
        let timeline = scalar(&[(0.0, 1.0), (100.0, 1.0), (200.0, 3.0)]);
        let mut pairs = Vec::new();
        timeline.for_each_pair(&0.0, |v| *v, None, None, false, |a, b| {
            pairs.push((a.time, a.value, b.time, b.value));
        });
        assert_eq!(pairs, vec![(100.0, 1.0, 200.0, 3.0)]);
    }

    #[test]
    fn for_each_pair_constant_default_is_suppressed() {
        let timeline = scalar(&[(0.0, 5.0), (100.0, 5.0)]);

        let mut count = 0;
        timeline.for_each_pair(&5.0, |v| *v, None, None, false, |_, _| count += 1);
        assert_eq!(count, 0);

        let mut holds = Vec::new();
        timeline.for_each_pair(&0.0, |v| *v, None, None, false, |a, b| {
            holds.push((a.time, a.value, b.time, b.value));
        });
        assert_eq!(holds, vec![(0.0, 5.0, 0.0, 5.0)]);
    }

    #[test]
    fn for_each_pair_emits_steps_at_same_time() {
        let mut timeline = Timeline::new(0.0);
        timeline.add(100.0, 1.0, Ease::Linear, KeyframePlacement::After);
        timeline.add(100.0, 2.0, Ease::Linear, KeyframePlacement::After);
        timeline.add(300.0, 4.0, Ease::Linear, KeyframePlacement::After);
        let mut pairs = Vec::new();
        timeline.for_each_pair(&0.0, |v| *v, None, None, false, |a, b| {
            pairs.push((a.time, a.value, b.time, b.value));
        });
        assert_eq!(
            pairs,
            vec![(100.0, 1.0, 100.0, 2.0), (100.0, 2.0, 300.0, 4.0)]
        );
    }

    #[test]
    fn for_each_pair_extends_initial_pose_to_window_start() {
        let timeline = scalar(&[(500.0, 2.0), (800.0, 4.0)]);
        let mut pairs = Vec::new();
        timeline.for_each_pair(&0.0, |v| *v, Some(0.0), None, false, |a, b| {
            pairs.push((a.time, b.time));
        });
        assert_eq!(pairs, vec![(0.0, 500.0), (500.0, 800.0)]);
    }

    #[test]
    fn for_each_pair_loopable_pads_to_window_end() {
        let timeline = scalar(&[(0.0, 1.0), (200.0, 2.0)]);
        let mut pairs = Vec::new();
        timeline.for_each_pair(&0.0, |v| *v, Some(0.0), Some(1000.0), true, |a, b| {
            pairs.push((a.time, b.time, b.value));
        });
        assert_eq!(pairs, vec![(0.0, 200.0, 2.0), (200.0, 1000.0, 2.0)]);
    }

    #[test]
    fn angle_lerp_takes_shortest_arc() {
        let a = Angle(0.1);
        let b = Angle(2.0 * PI - 0.1);
        let mid = Angle::lerp(&a, &b, 0.5);
        assert!((mid.0 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn bool_flags_span_raised_intervals() {
        let mut timeline = Timeline::new(false);
        timeline.add(0.0, false, Ease::Linear, KeyframePlacement::After);
        timeline.add(100.0, true, Ease::Linear, KeyframePlacement::After);
        timeline.add(400.0, false, Ease::Linear, KeyframePlacement::After);
        timeline.add(600.0, true, Ease::Linear, KeyframePlacement::After);
        timeline.add(900.0, true, Ease::Linear, KeyframePlacement::After);
        let mut spans = Vec::new();
        timeline.for_each_flag(|start, end| spans.push((start, end)));
        assert_eq!(spans, vec![(100.0, 400.0), (600.0, 900.0)]);
    }
}
