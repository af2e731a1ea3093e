use osbforge::{Scene, SceneStats};

#[test]
fn scene_fixture_renders_deterministically() {
    let s = include_str!("data/scene.json");
    let scene: Scene = serde_json::from_str(s).unwrap();

    let mut out = Vec::new();
    let stats = scene.write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    // The second element is never visible and produces nothing.
    assert_eq!(
        stats,
        SceneStats {
            written: 1,
            skipped: 1
        }
    );

    let expected = "\
Sprite,Foreground,Centre,\"sb/glow.png\",320,240
 F,0,500,,0,1
 F,0,500,1000,1,0
Sample,1500,Fail,\"sfx/clap.wav\",70
";
    assert_eq!(text, expected);
}

#[test]
fn scene_round_trips_through_serde() {
    let s = include_str!("data/scene.json");
    let scene: Scene = serde_json::from_str(s).unwrap();
    let json = serde_json::to_string(&scene).unwrap();
    let reparsed: Scene = serde_json::from_str(&json).unwrap();
    assert_eq!(reparsed.elements.len(), scene.elements.len());
    assert_eq!(reparsed.samples, scene.samples);
}
