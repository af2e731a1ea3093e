use std::cell::Cell;

use crate::{
    command::{Command, LoopGroup, Span, Target, TriggerGroup},
    core::{Color, Layer, LoopKind, Origin, Vec2},
    ease::Ease,
    error::{OsbError, OsbResult},
    timeline::Lerp,
};

/// Declaration kind of an element.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementKind {
    Sprite,
    /// Frame-cycled image sequence. `frame_delay` is in milliseconds.
    Animation {
        frame_count: u32,
        frame_delay: f64,
        loop_kind: LoopKind,
    },
}

/// One declared visual element and its ordered instruction list.
///
/// Instructions are append-only; time bounds are derived lazily and
/// invalidated whenever the list changes.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub kind: ElementKind,
    pub layer: Layer,
    pub origin: Origin,
    pub path: String,
    pub initial_position: Vec2,
    /// Instruction budget above which the writer splits the element into
    /// multiple declarations. Zero disables splitting.
    pub split_threshold: usize,
    commands: Vec<Command>,
    open_group: Option<OpenGroup>,
    cached_bounds: Cell<Option<(f64, f64)>>,
}

#[derive(Clone, Debug)]
enum OpenGroup {
    Loop(LoopGroup),
    Trigger(TriggerGroup),
}

impl Sprite {
    pub fn new(layer: Layer, origin: Origin, path: impl Into<String>, initial_position: Vec2) -> Self {
        Self {
            kind: ElementKind::Sprite,
            layer,
            origin,
            path: path.into(),
            initial_position,
            split_threshold: 0,
            commands: Vec::new(),
            open_group: None,
            cached_bounds: Cell::new(None),
        }
    }

    pub fn new_animation(
        layer: Layer,
        origin: Origin,
        path: impl Into<String>,
        initial_position: Vec2,
        frame_count: u32,
        frame_delay: f64,
        loop_kind: LoopKind,
    ) -> Self {
        let mut sprite = Self::new(layer, origin, path, initial_position);
        sprite.kind = ElementKind::Animation {
            frame_count,
            frame_delay,
            loop_kind,
        };
        sprite
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Top-level instruction count; a group counts as one.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Append an instruction, or route it into the currently open group.
    pub fn add_command(&mut self, command: Command) -> OsbResult<()> {
        if let Some(group) = self.open_group.as_mut() {
            if matches!(command, Command::Loop(_) | Command::Trigger(_)) {
                return Err(OsbError::unsupported(
                    "instruction groups cannot nest inside another group",
                ));
            }
            if command.start_time() < 0.0 {
                return Err(OsbError::validation(
                    "nested instruction starts before its group",
                ));
            }
            match group {
                OpenGroup::Loop(l) => l.commands.push(command),
                OpenGroup::Trigger(t) => t.commands.push(command),
            }
        } else {
            self.commands.push(command);
        }
        self.cached_bounds.set(None);
        Ok(())
    }

    /// Open a loop group; subsequent [`Sprite::add_command`] calls land in it
    /// until [`Sprite::end_group`].
    pub fn start_loop_group(&mut self, start_time: f64, count: u32) -> OsbResult<()> {
        self.ensure_no_open_group()?;
        self.open_group = Some(OpenGroup::Loop(LoopGroup {
            start_time,
            count,
            commands: Vec::new(),
        }));
        Ok(())
    }

    /// Open a trigger group activated externally by `trigger_name`.
    pub fn start_trigger_group(
        &mut self,
        trigger_name: impl Into<String>,
        start_time: f64,
        end_time: f64,
        group: Option<i32>,
    ) -> OsbResult<()> {
        self.ensure_no_open_group()?;
        self.open_group = Some(OpenGroup::Trigger(TriggerGroup {
            trigger_name: trigger_name.into(),
            start_time,
            end_time,
            group,
            commands: Vec::new(),
        }));
        Ok(())
    }

    /// Close the open group and append it to the instruction list.
    pub fn end_group(&mut self) -> OsbResult<()> {
        let Some(group) = self.open_group.take() else {
            return Err(OsbError::unsupported("no open group to close"));
        };
        match group {
            OpenGroup::Loop(l) => self.commands.push(Command::Loop(l)),
            OpenGroup::Trigger(t) => {
                let duration = t.end_time - t.start_time;
                if t.commands.iter().any(|c| c.end_time() > duration) {
                    return Err(OsbError::validation(
                        "nested instruction outruns its trigger group",
                    ));
                }
                self.commands.push(Command::Trigger(t));
            }
        }
        self.cached_bounds.set(None);
        Ok(())
    }

    /// `(start, end)` over all instructions, `(0, 0)` when there are none.
    pub fn time_bounds(&self) -> (f64, f64) {
        if let Some(bounds) = self.cached_bounds.get() {
            return bounds;
        }
        let bounds = if self.commands.is_empty() {
            (0.0, 0.0)
        } else {
            let start = self
                .commands
                .iter()
                .map(Command::start_time)
                .fold(f64::INFINITY, f64::min);
            let end = self
                .commands
                .iter()
                .map(Command::end_time)
                .fold(f64::NEG_INFINITY, f64::max);
            (start, end)
        };
        self.cached_bounds.set(Some(bounds));
        bounds
    }

    pub fn start_time(&self) -> f64 {
        self.time_bounds().0
    }

    pub fn end_time(&self) -> f64 {
        self.time_bounds().1
    }

    /// Whether any instruction (including nested ones) animates `target`.
    pub fn has_target(&self, target: Target) -> bool {
        let mut found = false;
        self.for_each_leaf(|command, _| {
            found |= command.target() == Some(target);
        });
        found
    }

    /// Combined-axis and separate-axis instructions for the same attribute
    /// are mutually exclusive; this reports a violation without correcting
    /// it.
    pub fn has_incompatible_commands(&self) -> bool {
        let move_conflict = self.has_target(Target::Move)
            && (self.has_target(Target::MoveX) || self.has_target(Target::MoveY));
        let scale_conflict = self.has_target(Target::Scale) && self.has_target(Target::VectorScale);
        move_conflict || scale_conflict
    }

    /// Whether two instructions of the same attribute overlap in time.
    pub fn has_overlapped_commands(&self) -> bool {
        let mut spans: Vec<(Target, f64, f64)> = Vec::new();
        self.for_each_leaf(|command, offset| {
            if let Some(target) = command.target() {
                spans.push((
                    target,
                    command.start_time() + offset,
                    command.end_time() + offset,
                ));
            }
        });
        spans.sort_by(|a, b| a.1.total_cmp(&b.1));

        // Sorted by start, so per attribute it suffices to track the
        // furthest end seen so far.
        let mut furthest: Vec<(Target, f64)> = Vec::new();
        for (target, start, end) in spans {
            match furthest.iter_mut().find(|(t, _)| *t == target) {
                Some((_, seen)) => {
                    if start < *seen {
                        return true;
                    }
                    *seen = seen.max(end);
                }
                None => furthest.push((target, end)),
            }
        }
        false
    }

    /// Fragmentation preconditions: no externally triggered groups and no
    /// same-attribute overlap.
    pub fn is_fragmentable(&self) -> bool {
        !self
            .commands
            .iter()
            .any(|c| matches!(c, Command::Trigger(_)))
            && !self.has_overlapped_commands()
    }

    /// Zero-duration instruction holding `target`'s value at `time`, used to
    /// seed continuity at fragment boundaries. `None` when the attribute has
    /// no instructions or is a parameter toggle.
    pub fn hold_command_at(&self, target: Target, time: f64) -> Option<Command> {
        match target {
            Target::Move => self
                .eval_target(time, |c| match c {
                    Command::Move(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v: Vec2| Command::Move(hold(time, v))),
            Target::MoveX => self
                .eval_target(time, |c| match c {
                    Command::MoveX(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v| Command::MoveX(hold(time, v))),
            Target::MoveY => self
                .eval_target(time, |c| match c {
                    Command::MoveY(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v| Command::MoveY(hold(time, v))),
            Target::Scale => self
                .eval_target(time, |c| match c {
                    Command::Scale(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v| Command::Scale(hold(time, v))),
            Target::VectorScale => self
                .eval_target(time, |c| match c {
                    Command::VectorScale(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v| Command::VectorScale(hold(time, v))),
            Target::Rotate => self
                .eval_target(time, |c| match c {
                    Command::Rotate(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v| Command::Rotate(hold(time, v))),
            Target::Fade => self
                .eval_target(time, |c| match c {
                    Command::Fade(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v| Command::Fade(hold(time, v))),
            Target::Color => self
                .eval_target(time, |c| match c {
                    Command::Color(s) => Some(s.clone()),
                    _ => None,
                })
                .map(|v: Color| Command::Color(hold(time, v))),
            Target::Parameter(_) => None,
        }
    }

    fn ensure_no_open_group(&self) -> OsbResult<()> {
        if self.open_group.is_some() {
            return Err(OsbError::unsupported(
                "instruction groups cannot nest inside another group",
            ));
        }
        Ok(())
    }

    // Visit every leaf instruction with the absolute-time offset of its
    // enclosing group (loops contribute their first iteration).
    fn for_each_leaf(&self, mut visit: impl FnMut(&Command, f64)) {
        for command in &self.commands {
            match command {
                Command::Loop(l) => {
                    for nested in &l.commands {
                        visit(nested, l.start_time);
                    }
                }
                Command::Trigger(t) => {
                    for nested in &t.commands {
                        visit(nested, t.start_time);
                    }
                }
                other => visit(other, 0.0),
            }
        }
    }

    fn eval_target<T: Lerp + Clone>(
        &self,
        time: f64,
        extract: impl Fn(&Command) -> Option<Span<T>>,
    ) -> Option<T> {
        let mut spans: Vec<Span<T>> = Vec::new();
        self.for_each_leaf(|command, offset| {
            if let Some(mut span) = extract(command) {
                span.start_time += offset;
                span.end_time += offset;
                spans.push(span);
            }
        });
        spans.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let first = spans.first()?;
        if time < first.start_time {
            return Some(first.from.clone());
        }
        let mut value = None;
        for span in &spans {
            if span.start_time > time {
                break;
            }
            if time <= span.end_time {
                return Some(span.value_at(time));
            }
            value = Some(span.to.clone());
        }
        value
    }
}

fn hold<T: Clone>(time: f64, value: T) -> Span<T> {
    Span {
        ease: Ease::Linear,
        start_time: time,
        end_time: time,
        from: value.clone(),
        to: value,
    }
}

/// One-line audio sample declaration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    /// Time in milliseconds.
    pub time: f64,
    pub layer: Layer,
    pub path: String,
    /// Volume in `[0, 100]`.
    pub volume: f64,
}
