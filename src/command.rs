use std::collections::BTreeSet;

use crate::{
    core::{Color, ParameterKind, Vec2},
    ease::Ease,
    timeline::Lerp,
};

/// Interpolated time span for one attribute. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct Span<T> {
    pub ease: Ease,
    pub start_time: f64,
    pub end_time: f64,
    pub from: T,
    pub to: T,
}

impl<T: Lerp + Clone> Span<T> {
    pub fn new(ease: Ease, start_time: f64, end_time: f64, from: T, to: T) -> Self {
        Self {
            ease,
            start_time,
            end_time,
            from,
            to,
        }
    }

    /// Eased value at `time`, clamped to the span. A zero-duration span
    /// reads as its final value.
    pub fn value_at(&self, time: f64) -> T {
        if self.end_time <= self.start_time {
            return self.to.clone();
        }
        let progress = ((time - self.start_time) / (self.end_time - self.start_time)).clamp(0.0, 1.0);
        T::lerp(&self.from, &self.to, self.ease.apply(progress))
    }

    fn slice(&self, start: f64, end: f64) -> Self {
        let start = start.max(self.start_time);
        let end = end.min(self.end_time);
        Self {
            ease: self.ease,
            start_time: start,
            end_time: end,
            from: self.value_at(start),
            to: self.value_at(end),
        }
    }
}

/// Discrete render-state toggle over a time span.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpan {
    pub kind: ParameterKind,
    pub start_time: f64,
    pub end_time: f64,
}

/// Repeating block of nested instructions. Nested times are relative to
/// `start_time`; each iteration replays them after one body duration.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopGroup {
    pub start_time: f64,
    pub count: u32,
    pub commands: Vec<Command>,
}

impl LoopGroup {
    /// Duration of a single iteration: the furthest nested end time.
    pub fn body_duration(&self) -> f64 {
        self.commands
            .iter()
            .map(Command::end_time)
            .fold(0.0, f64::max)
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + f64::from(self.count) * self.body_duration()
    }
}

/// Conditionally played block, activated externally by `trigger_name`.
/// Playback timing is not known ahead of time, which is why triggers block
/// fragmentation.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerGroup {
    pub trigger_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub group: Option<i32>,
    pub commands: Vec<Command>,
}

/// Attribute family an instruction animates. Used for overlap detection,
/// axis bookkeeping, and boundary hold synthesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Move,
    MoveX,
    MoveY,
    Scale,
    VectorScale,
    Rotate,
    Fade,
    Color,
    Parameter(ParameterKind),
}

/// One interpolation instruction. The set of kinds is closed; every consumer
/// matches exhaustively.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Move(Span<Vec2>),
    MoveX(Span<f64>),
    MoveY(Span<f64>),
    Scale(Span<f64>),
    VectorScale(Span<Vec2>),
    Rotate(Span<f64>),
    Fade(Span<f64>),
    Color(Span<Color>),
    Parameter(ParamSpan),
    Loop(LoopGroup),
    Trigger(TriggerGroup),
}

impl Command {
    pub fn start_time(&self) -> f64 {
        match self {
            Self::Move(s) => s.start_time,
            Self::MoveX(s) => s.start_time,
            Self::MoveY(s) => s.start_time,
            Self::Scale(s) => s.start_time,
            Self::VectorScale(s) => s.start_time,
            Self::Rotate(s) => s.start_time,
            Self::Fade(s) => s.start_time,
            Self::Color(s) => s.start_time,
            Self::Parameter(p) => p.start_time,
            Self::Loop(l) => l.start_time,
            Self::Trigger(t) => t.start_time,
        }
    }

    pub fn end_time(&self) -> f64 {
        match self {
            Self::Move(s) => s.end_time,
            Self::MoveX(s) => s.end_time,
            Self::MoveY(s) => s.end_time,
            Self::Scale(s) => s.end_time,
            Self::VectorScale(s) => s.end_time,
            Self::Rotate(s) => s.end_time,
            Self::Fade(s) => s.end_time,
            Self::Color(s) => s.end_time,
            Self::Parameter(p) => p.end_time,
            Self::Loop(l) => l.end_time(),
            Self::Trigger(t) => t.end_time,
        }
    }

    /// Attribute family, `None` for groups.
    pub fn target(&self) -> Option<Target> {
        Some(match self {
            Self::Move(_) => Target::Move,
            Self::MoveX(_) => Target::MoveX,
            Self::MoveY(_) => Target::MoveY,
            Self::Scale(_) => Target::Scale,
            Self::VectorScale(_) => Target::VectorScale,
            Self::Rotate(_) => Target::Rotate,
            Self::Fade(_) => Target::Fade,
            Self::Color(_) => Target::Color,
            Self::Parameter(p) => Target::Parameter(p.kind),
            Self::Loop(_) | Self::Trigger(_) => return None,
        })
    }

    /// Whether this instruction may be cut at an interior time without
    /// changing the curve it plays. Eased spans and groups may not; linear
    /// and zero-duration spans and parameter toggles may.
    pub fn is_fragmentable(&self) -> bool {
        fn span_ok<T>(s: &Span<T>) -> bool {
            s.end_time <= s.start_time || s.ease == Ease::Linear
        }
        match self {
            Self::Move(s) => span_ok(s),
            Self::MoveX(s) => span_ok(s),
            Self::MoveY(s) => span_ok(s),
            Self::Scale(s) => span_ok(s),
            Self::VectorScale(s) => span_ok(s),
            Self::Rotate(s) => span_ok(s),
            Self::Fade(s) => span_ok(s),
            Self::Color(s) => span_ok(s),
            Self::Parameter(_) => true,
            Self::Loop(_) | Self::Trigger(_) => false,
        }
    }

    /// Add every integer time strictly inside this instruction's span that
    /// must not become a fragment boundary.
    pub fn collect_forbidden_times(&self, out: &mut BTreeSet<i64>) {
        if self.is_fragmentable() {
            return;
        }
        let first = self.start_time().floor() as i64 + 1;
        let last = self.end_time().ceil() as i64 - 1;
        for time in first..=last {
            out.insert(time);
        }
    }

    /// Re-express the instruction restricted to `[start, end]`. Callers only
    /// pass boundaries outside every forbidden interior, so groups and eased
    /// spans are always covered whole and return unchanged.
    pub fn fragment(&self, start: f64, end: f64) -> Command {
        if start <= self.start_time() && self.end_time() <= end {
            return self.clone();
        }
        match self {
            Self::Move(s) => Self::Move(s.slice(start, end)),
            Self::MoveX(s) => Self::MoveX(s.slice(start, end)),
            Self::MoveY(s) => Self::MoveY(s.slice(start, end)),
            Self::Scale(s) => Self::Scale(s.slice(start, end)),
            Self::VectorScale(s) => Self::VectorScale(s.slice(start, end)),
            Self::Rotate(s) => Self::Rotate(s.slice(start, end)),
            Self::Fade(s) => Self::Fade(s.slice(start, end)),
            Self::Color(s) => Self::Color(s.slice(start, end)),
            Self::Parameter(p) => Self::Parameter(ParamSpan {
                kind: p.kind,
                start_time: start.max(p.start_time),
                end_time: end.min(p.end_time),
            }),
            Self::Loop(_) | Self::Trigger(_) => self.clone(),
        }
    }
}
