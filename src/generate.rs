use crate::{
    command::{Command, ParamSpan, Span},
    core::{Color, ParameterKind, Rect, Vec2, round_to},
    ease::Ease,
    error::OsbResult,
    sprite::Sprite,
    state::State,
    timeline::{Angle, KeyframePlacement, Timeline},
};

/// Per-attribute tolerances and rounding used while reducing sampled curves
/// to instructions. All external, nothing is hardcoded in the aggregator.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub position_tolerance: f64,
    pub scale_tolerance: f64,
    /// Radians.
    pub rotation_tolerance: f64,
    /// Measured in 0-255 wire channel space.
    pub color_tolerance: f64,
    pub opacity_tolerance: f64,
    pub position_decimals: u8,
    pub scale_decimals: u8,
    pub rotation_decimals: u8,
    pub opacity_decimals: u8,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            position_tolerance: 1.0,
            scale_tolerance: 0.01,
            rotation_tolerance: 0.005,
            color_tolerance: 2.0,
            opacity_tolerance: 0.01,
            position_decimals: 1,
            scale_decimals: 3,
            rotation_decimals: 5,
            opacity_decimals: 2,
        }
    }
}

/// Emission window controls, used when generating into a group.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenerateOptions {
    /// Extend the first pose back to this time.
    pub start_time: Option<f64>,
    /// Window end, only meaningful together with `loopable`.
    pub end_time: Option<f64>,
    /// Subtracted from every emitted instruction time; set to the group
    /// start when emitting into a loop group.
    pub time_offset: f64,
    /// Pad the final pose to `end_time` so a loop iteration keeps its
    /// duration.
    pub loopable: bool,
}

// Working/final slots for every animatable attribute. Timelines move
// between slots on commit and are reused across segments.
#[derive(Debug)]
struct AttributeTimelines {
    positions: Timeline<Vec2>,
    scales: Timeline<Vec2>,
    rotations: Timeline<Angle>,
    colors: Timeline<Color>,
    opacities: Timeline<f64>,
    flips_h: Timeline<bool>,
    flips_v: Timeline<bool>,
    additives: Timeline<bool>,
}

impl AttributeTimelines {
    fn new() -> Self {
        Self {
            positions: Timeline::new(Vec2::new(320.0, 240.0)),
            scales: Timeline::new(Vec2::new(1.0, 1.0)),
            rotations: Timeline::new(Angle(0.0)),
            colors: Timeline::new(Color::WHITE),
            opacities: Timeline::new(1.0),
            flips_h: Timeline::new(false),
            flips_v: Timeline::new(false),
            additives: Timeline::new(false),
        }
    }

    fn is_empty(&self) -> bool {
        self.positions.is_empty()
            && self.scales.is_empty()
            && self.rotations.is_empty()
            && self.colors.is_empty()
            && self.opacities.is_empty()
            && self.flips_h.is_empty()
            && self.flips_v.is_empty()
            && self.additives.is_empty()
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.scales.clear();
        self.rotations.clear();
        self.colors.clear();
        self.opacities.clear();
        self.flips_h.clear();
        self.flips_v.clear();
        self.additives.clear();
    }

    fn add(&mut self, state: &State, time: f64, placement: KeyframePlacement) {
        let ease = Ease::Linear;
        self.positions.add(time, state.position, ease, placement);
        self.scales.add(time, state.scale, ease, placement);
        self.rotations.add(time, Angle(state.rotation), ease, placement);
        self.colors.add(time, state.color, ease, placement);
        self.opacities.add(time, state.opacity, ease, placement);
        self.flips_h.add(time, state.flip_h, ease, placement);
        self.flips_v.add(time, state.flip_v, ease, placement);
        self.additives.add(time, state.additive, ease, placement);
    }
}

/// Visibility-driven state aggregator.
///
/// Buffers timed snapshots into per-attribute working timelines while the
/// element is on screen, commits (simplifies and transfers) them when it
/// leaves, and finally writes the committed curves onto a [`Sprite`] as
/// instructions. Single-owner; independent elements get independent
/// generators.
#[derive(Debug)]
pub struct CommandGenerator {
    config: GeneratorConfig,
    states: Vec<State>,
    working: AttributeTimelines,
    committed: AttributeTimelines,
}

impl CommandGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            states: Vec::new(),
            working: AttributeTimelines::new(),
            committed: AttributeTimelines::new(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Buffer a snapshot, keeping the stream sorted by time.
    pub fn add_state(&mut self, state: State) {
        let index = self.states.partition_point(|s| s.time <= state.time);
        self.states.insert(index, state);
    }

    pub fn clear_states(&mut self) {
        self.states.clear();
    }

    /// Run the sampling state machine over the buffered snapshots and write
    /// the resulting instructions onto `sprite`.
    ///
    /// Returns `false` when the element is never visible, in which case no
    /// instructions are produced and the caller can skip the element
    /// entirely.
    #[tracing::instrument(skip(self, sprite), fields(path = %sprite.path, states = self.states.len()))]
    pub fn generate(
        &mut self,
        sprite: &mut Sprite,
        image_size: Vec2,
        screen_bounds: Rect,
    ) -> OsbResult<bool> {
        self.generate_with(sprite, image_size, screen_bounds, GenerateOptions::default())
    }

    /// [`CommandGenerator::generate`] with an explicit emission window, used
    /// when the instructions land inside a loop group.
    pub fn generate_with(
        &mut self,
        sprite: &mut Sprite,
        image_size: Vec2,
        screen_bounds: Rect,
        options: GenerateOptions,
    ) -> OsbResult<bool> {
        let states = std::mem::take(&mut self.states);
        let mut visible = false;
        let mut ever_visible = false;
        let mut previous: Option<&State> = None;

        for state in &states {
            let now_visible = state.is_visible(image_size, sprite.origin, &screen_bounds);
            match (visible, now_visible) {
                (false, true) => {
                    // Seed the previous sample at the transition time so
                    // interpolation starts from where the element was.
                    if let Some(prev) = previous {
                        self.working.add(prev, state.time, KeyframePlacement::Before);
                    }
                    self.working.add(state, state.time, KeyframePlacement::After);
                }
                (true, true) => self.working.add(state, state.time, KeyframePlacement::After),
                (true, false) => {
                    self.working.add(state, state.time, KeyframePlacement::After);
                    self.commit();
                }
                (false, false) => {}
            }
            ever_visible |= now_visible;
            visible = now_visible;
            previous = Some(state);
        }
        if visible {
            self.commit();
        }
        self.states = states;

        if !ever_visible {
            tracing::debug!("element never visible, no instructions generated");
            return Ok(false);
        }

        self.emit(sprite, options)?;
        self.committed.clear();
        Ok(true)
    }

    /// Simplify every working timeline and move it into its final slot.
    /// A commit with nothing buffered is a no-op.
    fn commit(&mut self) {
        if self.working.is_empty() {
            return;
        }
        let config = &self.config;
        let working = &mut self.working;

        working
            .positions
            .simplify(config.position_tolerance, |v| [v.x, v.y, 0.0]);
        working
            .scales
            .simplify(config.scale_tolerance, |v| [v.x, v.y, 0.0]);
        working
            .rotations
            .simplify(config.rotation_tolerance, |a| [a.0, 0.0, 0.0]);
        working.colors.simplify(config.color_tolerance, |c| {
            [c.r * 255.0, c.g * 255.0, c.b * 255.0]
        });
        working
            .opacities
            .simplify(config.opacity_tolerance, |v| [*v, 0.0, 0.0]);

        // Guarantee the segment fades out instead of vanishing.
        let end_time = working.opacities.end_time();
        let end_value = working.opacities.end_value().copied();
        if let (Some(time), Some(value)) = (end_time, end_value) {
            if value > 0.0 {
                working
                    .opacities
                    .add(time, 0.0, Ease::Linear, KeyframePlacement::After);
            }
        }

        self.working.positions.transfer_to(&mut self.committed.positions);
        self.working.scales.transfer_to(&mut self.committed.scales);
        self.working.rotations.transfer_to(&mut self.committed.rotations);
        self.working.colors.transfer_to(&mut self.committed.colors);
        self.working.opacities.transfer_to(&mut self.committed.opacities);
        self.working.flips_h.transfer_to(&mut self.committed.flips_h);
        self.working.flips_v.transfer_to(&mut self.committed.flips_v);
        self.working.additives.transfer_to(&mut self.committed.additives);
    }

    // Turn the committed timelines into instructions on `sprite`.
    fn emit(&mut self, sprite: &mut Sprite, options: GenerateOptions) -> OsbResult<()> {
        let config = self.config.clone();
        let offset = options.time_offset;
        let (element_start, element_end) = self.committed_bounds();
        let mut commands: Vec<Command> = Vec::new();

        self.emit_positions(sprite, &config, options, &mut commands);
        self.emit_scales(&config, options, &mut commands);

        self.committed.rotations.for_each_pair(
            &Angle(0.0),
            |a| Angle(round_to(a.0, config.rotation_decimals)),
            options.start_time,
            options.end_time,
            options.loopable,
            |a, b| {
                commands.push(Command::Rotate(Span::new(
                    b.ease,
                    a.time - offset,
                    b.time - offset,
                    a.value.0,
                    b.value.0,
                )));
            },
        );

        self.committed.colors.for_each_pair(
            &Color::WHITE,
            |c| {
                let (r, g, b) = c.to_wire();
                Color::from_wire(r, g, b)
            },
            options.start_time,
            options.end_time,
            options.loopable,
            |a, b| {
                commands.push(Command::Color(Span::new(
                    b.ease,
                    a.time - offset,
                    b.time - offset,
                    a.value,
                    b.value,
                )));
            },
        );

        self.committed.opacities.for_each_pair(
            &1.0,
            |v| round_to(*v, config.opacity_decimals),
            options.start_time,
            options.end_time,
            options.loopable,
            |a, b| {
                // Zero-duration no-op fades at the element's own edges are
                // redundant with implicit defaults.
                let degenerate = a.time == b.time && a.value == b.value;
                if degenerate
                    && ((a.value == 1.0 && a.time == element_start)
                        || (a.value == 0.0 && a.time == element_end))
                {
                    return;
                }
                commands.push(Command::Fade(Span::new(
                    b.ease,
                    a.time - offset,
                    b.time - offset,
                    a.value,
                    b.value,
                )));
            },
        );

        for (timeline, kind) in [
            (&self.committed.flips_h, ParameterKind::FlipH),
            (&self.committed.flips_v, ParameterKind::FlipV),
            (&self.committed.additives, ParameterKind::Additive),
        ] {
            timeline.for_each_flag(|start, end| {
                commands.push(Command::Parameter(ParamSpan {
                    kind,
                    start_time: start - offset,
                    end_time: end - offset,
                }));
            });
        }

        for command in commands {
            sprite.add_command(command)?;
        }
        Ok(())
    }

    fn emit_positions(
        &self,
        sprite: &mut Sprite,
        config: &GeneratorConfig,
        options: GenerateOptions,
        commands: &mut Vec<Command>,
    ) {
        let positions = &self.committed.positions;
        let Some(first) = positions.keyframes().first() else {
            return;
        };
        let decimals = config.position_decimals;
        let first_x = round_to(first.value.x, decimals);
        let first_y = round_to(first.value.y, decimals);
        let x_static = positions
            .keyframes()
            .iter()
            .all(|k| round_to(k.value.x, decimals) == first_x);
        let y_static = positions
            .keyframes()
            .iter()
            .all(|k| round_to(k.value.y, decimals) == first_y);
        let offset = options.time_offset;

        if x_static && y_static {
            // Both axes constant: carried entirely by the header placement.
            sprite.initial_position = Vec2::new(first_x, first_y);
        } else if y_static {
            sprite.initial_position = Vec2::new(first_x, first_y);
            let mut xs = Timeline::new(320.0);
            for k in positions.keyframes() {
                xs.add(k.time, k.value.x, k.ease, KeyframePlacement::After);
            }
            xs.for_each_pair(
                &320.0,
                |v| round_to(*v, decimals),
                options.start_time,
                options.end_time,
                options.loopable,
                |a, b| {
                    commands.push(Command::MoveX(Span::new(
                        b.ease,
                        a.time - offset,
                        b.time - offset,
                        a.value,
                        b.value,
                    )));
                },
            );
        } else if x_static {
            sprite.initial_position = Vec2::new(first_x, first_y);
            let mut ys = Timeline::new(240.0);
            for k in positions.keyframes() {
                ys.add(k.time, k.value.y, k.ease, KeyframePlacement::After);
            }
            ys.for_each_pair(
                &240.0,
                |v| round_to(*v, decimals),
                options.start_time,
                options.end_time,
                options.loopable,
                |a, b| {
                    commands.push(Command::MoveY(Span::new(
                        b.ease,
                        a.time - offset,
                        b.time - offset,
                        a.value,
                        b.value,
                    )));
                },
            );
        } else {
            positions.for_each_pair(
                &Vec2::new(320.0, 240.0),
                |v| Vec2::new(round_to(v.x, decimals), round_to(v.y, decimals)),
                options.start_time,
                options.end_time,
                options.loopable,
                |a, b| {
                    commands.push(Command::Move(Span::new(
                        b.ease,
                        a.time - offset,
                        b.time - offset,
                        a.value,
                        b.value,
                    )));
                },
            );
        }
    }

    fn emit_scales(
        &self,
        config: &GeneratorConfig,
        options: GenerateOptions,
        commands: &mut Vec<Command>,
    ) {
        let scales = &self.committed.scales;
        if scales.is_empty() {
            return;
        }
        let decimals = config.scale_decimals;
        let offset = options.time_offset;
        let uniform = scales
            .keyframes()
            .iter()
            .all(|k| round_to(k.value.x, decimals) == round_to(k.value.y, decimals));

        if uniform {
            let mut factors = Timeline::new(1.0);
            for k in scales.keyframes() {
                factors.add(k.time, k.value.x, k.ease, KeyframePlacement::After);
            }
            factors.for_each_pair(
                &1.0,
                |v| round_to(*v, decimals),
                options.start_time,
                options.end_time,
                options.loopable,
                |a, b| {
                    commands.push(Command::Scale(Span::new(
                        b.ease,
                        a.time - offset,
                        b.time - offset,
                        a.value,
                        b.value,
                    )));
                },
            );
        } else {
            scales.for_each_pair(
                &Vec2::new(1.0, 1.0),
                |v| Vec2::new(round_to(v.x, decimals), round_to(v.y, decimals)),
                options.start_time,
                options.end_time,
                options.loopable,
                |a, b| {
                    commands.push(Command::VectorScale(Span::new(
                        b.ease,
                        a.time - offset,
                        b.time - offset,
                        a.value,
                        b.value,
                    )));
                },
            );
        }
    }

    fn committed_bounds(&self) -> (f64, f64) {
        let c = &self.committed;
        let starts = [
            c.positions.start_time(),
            c.scales.start_time(),
            c.rotations.start_time(),
            c.colors.start_time(),
            c.opacities.start_time(),
            c.flips_h.start_time(),
            c.flips_v.start_time(),
            c.additives.start_time(),
        ];
        let ends = [
            c.positions.end_time(),
            c.scales.end_time(),
            c.rotations.end_time(),
            c.colors.end_time(),
            c.opacities.end_time(),
            c.flips_h.end_time(),
            c.flips_v.end_time(),
            c.additives.end_time(),
        ];
        let start = starts.into_iter().flatten().fold(f64::INFINITY, f64::min);
        let end = ends.into_iter().flatten().fold(f64::NEG_INFINITY, f64::max);
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Layer, Origin, widescreen_bounds};
    use crate::sprite::Sprite;

    fn sprite() -> Sprite {
        Sprite::new(
            Layer::Background,
            Origin::Centre,
            "sb/dot.png",
            Vec2::new(320.0, 240.0),
        )
    }

    fn image() -> Vec2 {
        Vec2::new(100.0, 100.0)
    }

    fn state(time: f64, opacity: f64) -> State {
        State {
            time,
            opacity,
            ..State::default()
        }
    }

    #[test]
    fn never_visible_produces_nothing() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        generator.add_state(state(0.0, 0.0));
        generator.add_state(state(1000.0, 0.0));
        let mut s = sprite();
        let generated = generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();
        assert!(!generated);
        assert_eq!(s.command_count(), 0);
    }

    #[test]
    fn empty_stream_is_a_no_op() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        let mut s = sprite();
        let generated = generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();
        assert!(!generated);
        assert_eq!(s.command_count(), 0);
    }

    #[test]
    fn states_are_kept_sorted() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        generator.add_state(state(500.0, 1.0));
        generator.add_state(state(100.0, 1.0));
        generator.add_state(state(300.0, 1.0));
        let times: Vec<f64> = generator.states().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![100.0, 300.0, 500.0]);
    }

    #[test]
    fn opacity_pulse_emits_two_fades_and_no_moves() {
        let config = GeneratorConfig {
            // Wider than the 0.02 sampling step so the ramp reduces to its
            // corners.
            opacity_tolerance: 0.05,
            ..GeneratorConfig::default()
        };
        let mut generator = CommandGenerator::new(config);
        for i in 0..=100 {
            let time = f64::from(i) * 20.0;
            // 0 -> 1 -> 0 triangle over two seconds.
            let opacity = 1.0 - (f64::from(i) / 50.0 - 1.0).abs();
            generator.add_state(state(time, opacity));
        }
        let mut s = sprite();
        let generated = generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();
        assert!(generated);

        let fades: Vec<_> = s
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Fade(_)))
            .collect();
        assert_eq!(fades.len(), 2);
        assert!(
            !s.commands()
                .iter()
                .any(|c| matches!(c, Command::Move(_) | Command::MoveX(_) | Command::MoveY(_)))
        );
        // Constant position became the header placement.
        assert_eq!(s.initial_position, Vec2::new(320.0, 240.0));
    }

    #[test]
    fn hiding_appends_synthetic_fade_out() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        generator.add_state(state(0.0, 1.0));
        generator.add_state(state(1000.0, 1.0));
        let mut s = sprite();
        generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();

        let fades: Vec<_> = s
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Fade(span) => Some(span.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(fades.len(), 1);
        assert_eq!(fades[0].start_time, 1000.0);
        assert_eq!(fades[0].end_time, 1000.0);
        assert_eq!(fades[0].from, 1.0);
        assert_eq!(fades[0].to, 0.0);
    }

    #[test]
    fn show_transition_backfills_previous_sample() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        generator.add_state(state(0.0, 0.0));
        generator.add_state(state(500.0, 0.6));
        generator.add_state(state(1000.0, 0.6));
        let mut s = sprite();
        generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();

        let fades: Vec<_> = s
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Fade(span) => Some(span.clone()),
                _ => None,
            })
            .collect();
        // Step from the backfilled invisible sample, then the forced
        // fade-out at the segment boundary.
        assert_eq!(fades[0].start_time, 500.0);
        assert_eq!(fades[0].end_time, 500.0);
        assert_eq!(fades[0].from, 0.0);
        assert_eq!(fades[0].to, 0.6);
        assert_eq!(fades.last().unwrap().to, 0.0);
    }

    #[test]
    fn uniform_and_vector_scale_are_distinguished() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        let mut uniform_state = state(0.0, 1.0);
        uniform_state.scale = Vec2::new(0.5, 0.5);
        let mut grown = state(1000.0, 1.0);
        grown.scale = Vec2::new(2.0, 2.0);
        generator.add_state(uniform_state);
        generator.add_state(grown);
        let mut s = sprite();
        generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();
        assert!(s.commands().iter().any(|c| matches!(c, Command::Scale(_))));
        assert!(
            !s.commands()
                .iter()
                .any(|c| matches!(c, Command::VectorScale(_)))
        );

        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        let mut squash = state(0.0, 1.0);
        squash.scale = Vec2::new(1.0, 1.0);
        let mut squashed = state(1000.0, 1.0);
        squashed.scale = Vec2::new(2.0, 0.5);
        generator.add_state(squash);
        generator.add_state(squashed);
        let mut s = sprite();
        generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();
        assert!(
            s.commands()
                .iter()
                .any(|c| matches!(c, Command::VectorScale(_)))
        );
    }

    #[test]
    fn additive_flag_becomes_parameter_span() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        let mut on = state(0.0, 1.0);
        on.additive = true;
        let mut still_on = state(400.0, 1.0);
        still_on.additive = true;
        let mut off = state(800.0, 1.0);
        off.additive = false;
        generator.add_state(on);
        generator.add_state(still_on);
        generator.add_state(off);
        let mut s = sprite();
        generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();

        let params: Vec<_> = s
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Parameter(p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].kind, ParameterKind::Additive);
        assert_eq!(params[0].start_time, 0.0);
        assert_eq!(params[0].end_time, 800.0);
    }

    #[test]
    fn loopable_generation_lands_relative_times_in_a_group() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        generator.add_state(state(1000.0, 0.2));
        generator.add_state(state(1200.0, 1.0));

        let mut s = sprite();
        s.start_loop_group(1000.0, 3).unwrap();
        let options = GenerateOptions {
            start_time: Some(1000.0),
            end_time: Some(1200.0),
            time_offset: 1000.0,
            loopable: true,
        };
        generator
            .generate_with(&mut s, image(), widescreen_bounds(), options)
            .unwrap();
        s.end_group().unwrap();

        assert_eq!(s.command_count(), 1);
        let Command::Loop(group) = &s.commands()[0] else {
            panic!("expected a loop group");
        };
        assert_eq!(group.start_time, 1000.0);
        assert_eq!(group.count, 3);
        let Command::Fade(first) = &group.commands[0] else {
            panic!("expected a nested fade");
        };
        assert_eq!(first.start_time, 0.0);
        assert_eq!(first.end_time, 200.0);
        assert_eq!(first.from, 0.2);
        assert_eq!(first.to, 1.0);
    }

    #[test]
    fn moving_one_axis_emits_single_axis_commands() {
        let mut generator = CommandGenerator::new(GeneratorConfig::default());
        let mut a = state(0.0, 1.0);
        a.position = Vec2::new(100.0, 240.0);
        let mut b = state(1000.0, 1.0);
        b.position = Vec2::new(500.0, 240.0);
        generator.add_state(a);
        generator.add_state(b);
        let mut s = sprite();
        generator
            .generate(&mut s, image(), widescreen_bounds())
            .unwrap();

        assert!(s.commands().iter().any(|c| matches!(c, Command::MoveX(_))));
        assert!(!s.commands().iter().any(|c| matches!(c, Command::Move(_))));
        assert_eq!(s.initial_position.y, 240.0);
    }
}
