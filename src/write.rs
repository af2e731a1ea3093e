use std::collections::BTreeSet;
use std::io::Write;

use crate::{
    command::{Command, Target},
    core::{LoopKind, Vec2},
    error::OsbResult,
    sprite::{ElementKind, Sample, Sprite},
    transform::Placement,
};

/// Output formatting knobs. The grammar itself is fixed; these only control
/// numeric rendering.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Write times with up to three decimal places instead of rounding to
    /// whole milliseconds.
    pub float_times: bool,
    /// Maximum decimal places for value arguments.
    pub value_decimals: u8,
    pub trim_trailing_zeros: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            float_times: false,
            value_decimals: 6,
            trim_trailing_zeros: true,
        }
    }
}

impl ExportSettings {
    fn time(&self, time: f64) -> String {
        if self.float_times {
            format_decimal(time, 3, self.trim_trailing_zeros)
        } else {
            format!("{}", time.round() as i64)
        }
    }

    fn value(&self, value: f64) -> String {
        format_decimal(value, self.value_decimals, self.trim_trailing_zeros)
    }
}

/// Culture-invariant fixed-point rendering with an optional trailing-zero
/// trim.
fn format_decimal(value: f64, decimals: u8, trim: bool) -> String {
    let mut s = format!("{:.*}", usize::from(decimals), value);
    if trim && s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

/// Serializes elements to the legacy text grammar over any `io::Write`,
/// splitting oversized fragmentable elements into multiple cooperating
/// declarations.
pub struct StoryboardWriter<'w, W: Write> {
    out: &'w mut W,
    settings: ExportSettings,
}

impl<'w, W: Write> StoryboardWriter<'w, W> {
    pub fn new(out: &'w mut W, settings: ExportSettings) -> Self {
        Self { out, settings }
    }

    /// Write one element, fragmenting when its instruction count exceeds the
    /// split threshold and the fragmentation preconditions hold.
    pub fn write_sprite(&mut self, sprite: &Sprite, placement: &Placement) -> OsbResult<()> {
        let count = sprite.command_count();
        if sprite.split_threshold == 0 || count <= sprite.split_threshold {
            return self.write_declaration(sprite, placement, sprite.commands());
        }
        if !sprite.is_fragmentable() {
            tracing::debug!(
                path = %sprite.path,
                count,
                "oversized element is not fragmentable, writing one declaration"
            );
            return self.write_declaration(sprite, placement, sprite.commands());
        }
        self.write_fragmented(sprite, placement)
    }

    /// Write a one-line audio sample declaration.
    pub fn write_sample(&mut self, sample: &Sample) -> OsbResult<()> {
        writeln!(
            self.out,
            "Sample,{},{},\"{}\",{}",
            self.settings.time(sample.time),
            sample.layer,
            sample.path,
            self.settings.value(sample.volume),
        )?;
        Ok(())
    }

    fn write_fragmented(&mut self, sprite: &Sprite, placement: &Placement) -> OsbResult<()> {
        let threshold = sprite.split_threshold;
        let mut remaining: Vec<Command> = sprite.commands().to_vec();
        remaining.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        let mut times = fragmentation_times(sprite);
        let sprite_end = sprite.end_time().ceil() as i64;

        tracing::debug!(
            path = %sprite.path,
            count = remaining.len(),
            safe_times = times.len(),
            threshold,
            "fragmenting element"
        );

        let holdable = [
            Target::Move,
            Target::MoveX,
            Target::MoveY,
            Target::Scale,
            Target::VectorScale,
            Target::Rotate,
            Target::Fade,
            Target::Color,
        ];
        let targets: Vec<Target> = holdable
            .into_iter()
            .filter(|t| sprite.has_target(*t))
            .collect();

        while !remaining.is_empty() {
            let Some(&segment_start) = times.first() else {
                // No safe boundary left: the remainder rides in one final
                // declaration.
                tracing::debug!("no safe boundary left, writing remainder whole");
                let segment = std::mem::take(&mut remaining);
                self.write_declaration(sprite, placement, &segment)?;
                break;
            };
            let segment_end =
                segment_end_time(&times, segment_start, &remaining, threshold, sprite_end);

            // Clip every touched instruction to the window; fully covered
            // ones come back unchanged.
            let mut segment: Vec<Command> = remaining
                .iter()
                .filter(|c| c.start_time() < segment_end as f64)
                .map(|c| c.fragment(segment_start as f64, segment_end as f64))
                .collect();

            if segment.is_empty() {
                // Stale boundaries before the next instruction; skip ahead.
                times.retain(|&t| t >= segment_end);
                continue;
            }

            for &target in &targets {
                let present = segment
                    .iter()
                    .any(|c| c.target() == Some(target) && c.start_time() == segment_start as f64);
                if !present {
                    if let Some(hold) = sprite.hold_command_at(target, segment_start as f64) {
                        segment.push(hold);
                    }
                }
            }
            segment.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));

            self.write_declaration(sprite, placement, &segment)?;

            // A zero-duration step sitting exactly on the boundary belongs
            // to the next fragment and must not be dropped here.
            remaining.retain(|c| {
                c.end_time() > segment_end as f64 || c.start_time() >= segment_end as f64
            });
            times.retain(|&t| t >= segment_end);
        }
        Ok(())
    }

    fn write_declaration(
        &mut self,
        sprite: &Sprite,
        placement: &Placement,
        commands: &[Command],
    ) -> OsbResult<()> {
        let (has_x, has_y) = commands_affect_axes(commands);
        let placed = placement.position(sprite.initial_position);
        let x = if has_x {
            "0".to_string()
        } else if has_y {
            self.settings.value(placement.position_x(sprite.initial_position.x))
        } else {
            self.settings.value(placed.x)
        };
        let y = if has_y {
            "0".to_string()
        } else if has_x {
            self.settings.value(placement.position_y(sprite.initial_position.y))
        } else {
            self.settings.value(placed.y)
        };

        match sprite.kind {
            ElementKind::Sprite => writeln!(
                self.out,
                "Sprite,{},{},\"{}\",{},{}",
                sprite.layer, sprite.origin, sprite.path, x, y
            )?,
            ElementKind::Animation {
                frame_count,
                frame_delay,
                loop_kind,
            } => writeln!(
                self.out,
                "Animation,{},{},\"{}\",{},{},{},{},{}",
                sprite.layer,
                sprite.origin,
                sprite.path,
                x,
                y,
                frame_count,
                self.settings.time(frame_delay),
                loop_kind
            )?,
        }

        for command in commands {
            self.write_command(command, 1, placement)?;
        }
        Ok(())
    }

    fn write_command(
        &mut self,
        command: &Command,
        indent: usize,
        placement: &Placement,
    ) -> OsbResult<()> {
        let pad = " ".repeat(indent);
        match command {
            Command::Move(s) => {
                let from = placement.position(s.from);
                let to = placement.position(s.to);
                self.span_line(&pad, "M", s.ease.code(), s.start_time, s.end_time, &self.vec_args(from), &self.vec_args(to))?;
            }
            Command::MoveX(s) => {
                let from = self.settings.value(placement.position_x(s.from));
                let to = self.settings.value(placement.position_x(s.to));
                self.span_line(&pad, "MX", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::MoveY(s) => {
                let from = self.settings.value(placement.position_y(s.from));
                let to = self.settings.value(placement.position_y(s.to));
                self.span_line(&pad, "MY", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::Scale(s) => {
                let from = self.settings.value(placement.scale(s.from));
                let to = self.settings.value(placement.scale(s.to));
                self.span_line(&pad, "S", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::VectorScale(s) => {
                let from = self.vec_args(placement.scale_vec(s.from));
                let to = self.vec_args(placement.scale_vec(s.to));
                self.span_line(&pad, "V", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::Rotate(s) => {
                let from = self.settings.value(placement.rotation(s.from));
                let to = self.settings.value(placement.rotation(s.to));
                self.span_line(&pad, "R", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::Fade(s) => {
                let from = self.settings.value(s.from);
                let to = self.settings.value(s.to);
                self.span_line(&pad, "F", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::Color(s) => {
                let (r0, g0, b0) = s.from.to_wire();
                let (r1, g1, b1) = s.to.to_wire();
                let from = format!("{r0},{g0},{b0}");
                let to = format!("{r1},{g1},{b1}");
                self.span_line(&pad, "C", s.ease.code(), s.start_time, s.end_time, &from, &to)?;
            }
            Command::Parameter(p) => {
                let end = self.end_field(p.start_time, p.end_time);
                writeln!(
                    self.out,
                    "{pad}P,0,{},{},{}",
                    self.settings.time(p.start_time),
                    end,
                    p.kind.code()
                )?;
            }
            Command::Loop(l) => {
                writeln!(
                    self.out,
                    "{pad}L,{},{}",
                    self.settings.time(l.start_time),
                    l.count
                )?;
                for nested in &l.commands {
                    self.write_command(nested, indent + 1, placement)?;
                }
            }
            Command::Trigger(t) => {
                let group = t
                    .group
                    .map(|g| format!(",{g}"))
                    .unwrap_or_default();
                writeln!(
                    self.out,
                    "{pad}T,{},{},{}{}",
                    t.trigger_name,
                    self.settings.time(t.start_time),
                    self.settings.time(t.end_time),
                    group
                )?;
                for nested in &t.commands {
                    self.write_command(nested, indent + 1, placement)?;
                }
            }
        }
        Ok(())
    }

    fn vec_args(&self, v: Vec2) -> String {
        format!("{},{}", self.settings.value(v.x), self.settings.value(v.y))
    }

    fn end_field(&self, start: f64, end: f64) -> String {
        let start = self.settings.time(start);
        let end = self.settings.time(end);
        if end == start { String::new() } else { end }
    }

    fn span_line(
        &mut self,
        pad: &str,
        code: &str,
        ease: u8,
        start: f64,
        end: f64,
        from: &str,
        to: &str,
    ) -> OsbResult<()> {
        let end = self.end_field(start, end);
        if from == to {
            writeln!(
                self.out,
                "{pad}{code},{ease},{},{end},{from}",
                self.settings.time(start)
            )?;
        } else {
            writeln!(
                self.out,
                "{pad}{code},{ease},{},{end},{from},{to}",
                self.settings.time(start)
            )?;
        }
        Ok(())
    }
}

/// Integer times in the element's span where a cut keeps every instruction's
/// curve intact.
fn fragmentation_times(sprite: &Sprite) -> BTreeSet<i64> {
    let (start, end) = sprite.time_bounds();
    let anchor = start.floor() as i64;
    let mut times: BTreeSet<i64> = (anchor..=end.ceil() as i64).collect();

    let mut forbidden = BTreeSet::new();
    for command in sprite.commands() {
        command.collect_forbidden_times(&mut forbidden);
    }
    for time in forbidden {
        times.remove(&time);
    }

    // A forever-looping frame animation may only be cut between frame
    // cycles, or every fragment would restart its frames mid-cycle.
    if let ElementKind::Animation {
        frame_count,
        frame_delay,
        loop_kind: LoopKind::LoopForever,
    } = sprite.kind
    {
        let cycle = (f64::from(frame_count) * frame_delay).round() as i64;
        if cycle > 0 {
            times.retain(|&t| (t - anchor) % cycle == 0);
        }
    }
    times
}

// Smallest safe time such that the instructions starting before it stay
// within the budget; the tail between one and two budgets is split evenly so
// the final declaration is not a stub.
fn segment_end_time(
    times: &BTreeSet<i64>,
    segment_start: i64,
    remaining: &[Command],
    threshold: usize,
    sprite_end: i64,
) -> i64 {
    let last_safe = times.last().copied().unwrap_or(segment_start);
    let past_the_end = last_safe.max(sprite_end) + 1;

    let mut max_count = threshold;
    if remaining.len() > threshold && remaining.len() < threshold * 2 {
        max_count = remaining.len().div_ceil(2);
    }
    if remaining.len() <= max_count {
        return past_the_end;
    }

    let boundary = remaining[max_count].start_time().floor() as i64;
    if let Some(&t) = times.range(..=boundary).next_back() {
        if t > segment_start {
            return t;
        }
    }
    if let Some(&t) = times.range(segment_start + 1..).next() {
        return t;
    }
    past_the_end
}

// Whether any command, including nested ones, animates the x or y axis.
fn commands_affect_axes(commands: &[Command]) -> (bool, bool) {
    let (mut x, mut y) = (false, false);
    visit_axes(commands, &mut x, &mut y);
    (x, y)
}

fn visit_axes(commands: &[Command], x: &mut bool, y: &mut bool) {
    for command in commands {
        match command {
            Command::Move(_) => {
                *x = true;
                *y = true;
            }
            Command::MoveX(_) => *x = true,
            Command::MoveY(_) => *y = true,
            Command::Loop(l) => visit_axes(&l.commands, x, y),
            Command::Trigger(t) => visit_axes(&t.commands, x, y),
            _ => {}
        }
    }
}
