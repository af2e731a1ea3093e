use osbforge::{
    Command, Ease, ExportSettings, Layer, LoopKind, Origin, Placement, Span, Sprite,
    StoryboardWriter, Vec2,
};

fn render(sprite: &Sprite) -> String {
    let mut out = Vec::new();
    let mut writer = StoryboardWriter::new(&mut out, ExportSettings::default());
    writer.write_sprite(sprite, &Placement::identity()).unwrap();
    String::from_utf8(out).unwrap()
}

// Minimal reader for the command grammar: code -> list of (start, end,
// from-args, to-args).
#[derive(Debug, Default)]
struct ParsedCurves {
    spans: Vec<(String, f64, f64, Vec<f64>, Vec<f64>)>,
}

impl ParsedCurves {
    fn parse(text: &str) -> Self {
        let mut curves = Self::default();
        for line in text.lines() {
            let trimmed = line.trim_start();
            let indent = line.len() - trimmed.len();
            if indent != 1 {
                continue;
            }
            let parts: Vec<&str> = trimmed.split(',').collect();
            let code = parts[0];
            let arity = match code {
                "F" | "S" | "R" | "MX" | "MY" => 1,
                "M" | "V" => 2,
                _ => continue,
            };
            let start: f64 = parts[2].parse().unwrap();
            let end: f64 = if parts[3].is_empty() {
                start
            } else {
                parts[3].parse().unwrap()
            };
            let args: Vec<f64> = parts[4..].iter().map(|v| v.parse().unwrap()).collect();
            let (from, to) = if args.len() == arity * 2 {
                (args[..arity].to_vec(), args[arity..].to_vec())
            } else {
                assert_eq!(args.len(), arity, "line: {line}");
                (args.clone(), args)
            };
            curves.spans.push((code.to_string(), start, end, from, to));
        }
        curves
            .spans
            .sort_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)));
        curves
    }

    fn eval(&self, code: &str, time: f64) -> Option<Vec<f64>> {
        let spans: Vec<_> = self.spans.iter().filter(|s| s.0 == code).collect();
        let first = spans.first()?;
        if time < first.1 {
            return Some(first.3.clone());
        }
        let mut value = None;
        for (_, start, end, from, to) in spans {
            if *start > time {
                break;
            }
            if time <= *end && end > start {
                let t = (time - start) / (end - start);
                return Some(
                    from.iter()
                        .zip(to)
                        .map(|(a, b)| a + (b - a) * t)
                        .collect(),
                );
            }
            value = Some(to.clone());
        }
        value
    }
}

fn multi_attribute_sprite(split_threshold: usize) -> Sprite {
    let mut s = Sprite::new(
        Layer::Background,
        Origin::Centre,
        "sb/dot.png",
        Vec2::new(320.0, 240.0),
    );
    s.split_threshold = split_threshold;
    for i in 0..9 {
        let t = f64::from(i) * 100.0;
        s.add_command(Command::Move(Span::new(
            Ease::Linear,
            t,
            t + 100.0,
            Vec2::new(100.0 + t * 0.5, 240.0 - t * 0.1),
            Vec2::new(100.0 + (t + 100.0) * 0.5, 240.0 - (t + 100.0) * 0.1),
        )))
        .unwrap();
    }
    s.add_command(Command::Scale(Span::new(Ease::Linear, 0.0, 450.0, 1.0, 2.0)))
        .unwrap();
    s.add_command(Command::Scale(Span::new(Ease::Linear, 450.0, 900.0, 2.0, 0.5)))
        .unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 0.0, 200.0, 0.0, 1.0)))
        .unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 200.0, 700.0, 1.0, 0.4)))
        .unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 700.0, 900.0, 0.4, 0.0)))
        .unwrap();
    s.add_command(Command::Rotate(Span::new(Ease::Linear, 300.0, 600.0, 0.0, 1.5)))
        .unwrap();
    s
}

#[test]
fn fragmented_output_is_equivalent_to_whole_output() {
    let whole = render(&multi_attribute_sprite(0));
    let fragmented = render(&multi_attribute_sprite(5));

    let whole_headers = whole.lines().filter(|l| l.starts_with("Sprite,")).count();
    let frag_headers = fragmented
        .lines()
        .filter(|l| l.starts_with("Sprite,"))
        .count();
    assert_eq!(whole_headers, 1);
    assert!(frag_headers > 1, "expected a split, got: {fragmented}");

    let reference = ParsedCurves::parse(&whole);
    let stitched = ParsedCurves::parse(&fragmented);

    for code in ["M", "S", "F", "R"] {
        for time in 0..=900 {
            let time = f64::from(time);
            let expected = reference.eval(code, time);
            let actual = stitched.eval(code, time);
            match (expected, actual) {
                (Some(a), Some(b)) => {
                    for (x, y) in a.iter().zip(&b) {
                        assert!(
                            (x - y).abs() < 1e-4,
                            "{code} at t={time}: {a:?} vs {b:?}"
                        );
                    }
                }
                (a, b) => panic!("{code} at t={time}: {a:?} vs {b:?}"),
            }
        }
    }
}

#[test]
fn every_fragment_seeds_each_attribute_at_its_boundary() {
    let fragmented = render(&multi_attribute_sprite(5));

    let mut declarations: Vec<Vec<&str>> = Vec::new();
    for line in fragmented.lines() {
        if line.starts_with("Sprite,") {
            declarations.push(Vec::new());
        } else if let Some(current) = declarations.last_mut() {
            current.push(line);
        }
    }

    for (i, declaration) in declarations.iter().enumerate() {
        let segment_start: f64 = declaration
            .iter()
            .map(|l| l.trim_start().split(',').nth(2).unwrap().parse::<f64>().unwrap())
            .fold(f64::INFINITY, f64::min);
        for code in ["M,", "S,", "F,", "R,"] {
            let starts_here = declaration.iter().any(|l| {
                let t = l.trim_start();
                t.starts_with(code)
                    && t.split(',').nth(2).unwrap().parse::<f64>().unwrap() == segment_start
            });
            assert!(
                starts_here,
                "declaration {i} misses {code} at {segment_start}: {declaration:#?}"
            );
        }
    }
}

#[test]
fn loop_groups_travel_whole_and_keep_their_body() {
    let mut s = Sprite::new(
        Layer::Background,
        Origin::Centre,
        "sb/dot.png",
        Vec2::new(320.0, 240.0),
    );
    s.split_threshold = 2;
    s.add_command(Command::Fade(Span::new(Ease::Linear, 0.0, 500.0, 0.0, 1.0)))
        .unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 500.0, 1000.0, 1.0, 0.5)))
        .unwrap();
    s.start_loop_group(1000.0, 3).unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 0.0, 100.0, 0.5, 1.0)))
        .unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 100.0, 200.0, 1.0, 0.5)))
        .unwrap();
    s.end_group().unwrap();
    s.add_command(Command::Fade(Span::new(Ease::Linear, 1600.0, 2000.0, 0.5, 0.0)))
        .unwrap();

    let text = render(&s);
    let headers = text.lines().filter(|l| l.starts_with("Sprite,")).count();
    assert!(headers > 1, "expected a split, got: {text}");

    let loop_lines: Vec<&str> = text.lines().filter(|l| l.starts_with(" L,")).collect();
    assert_eq!(loop_lines, vec![" L,1000,3"], "got: {text}");
    let nested: Vec<&str> = text.lines().filter(|l| l.starts_with("  F,")).collect();
    assert_eq!(nested, vec!["  F,0,0,100,0.5,1", "  F,0,100,200,1,0.5"]);
}

#[test]
fn animation_fragments_cut_only_at_frame_cycles() {
    let mut s = Sprite::new_animation(
        Layer::Background,
        Origin::Centre,
        "sb/flip.png",
        Vec2::new(320.0, 240.0),
        2,
        50.0,
        LoopKind::LoopForever,
    );
    s.split_threshold = 2;
    for i in 0..10 {
        let t = f64::from(i) * 30.0;
        let v = 0.5 + 0.05 * f64::from(i);
        s.add_command(Command::Fade(Span::new(Ease::Linear, t, t + 30.0, v, v + 0.05)))
            .unwrap();
    }

    let text = render(&s);
    let mut declaration_starts: Vec<f64> = Vec::new();
    let mut current_min: Option<f64> = None;
    for line in text.lines() {
        if line.starts_with("Animation,") {
            if let Some(min) = current_min.take() {
                declaration_starts.push(min);
            }
            current_min = Some(f64::INFINITY);
        } else if let Some(min) = current_min.as_mut() {
            let start: f64 = line
                .trim_start()
                .split(',')
                .nth(2)
                .unwrap()
                .parse()
                .unwrap();
            *min = min.min(start);
        }
    }
    if let Some(min) = current_min {
        declaration_starts.push(min);
    }

    assert!(declaration_starts.len() > 1, "expected a split, got: {text}");
    // Frame cycle is frame_count * frame_delay = 100ms.
    for start in declaration_starts {
        assert_eq!(start % 100.0, 0.0, "got: {text}");
    }
}
