use std::io::Write;

use crate::{
    core::{Layer, LoopKind, Origin, Rect, Vec2, widescreen_bounds},
    error::OsbResult,
    generate::{CommandGenerator, GeneratorConfig},
    sprite::{Sample, Sprite},
    transform::Placement,
    write::{ExportSettings, StoryboardWriter},
};

/// Boundary document: sampled element streams plus generation and export
/// settings, typically loaded from JSON by the CLI.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub config: GeneratorConfig,
    #[serde(default)]
    pub export: ExportSettings,
    /// `[x0, y0, x1, y1]`; defaults to the widescreen storyboard bounds.
    #[serde(default)]
    pub screen_bounds: Option<[f64; 4]>,
    #[serde(default)]
    pub elements: Vec<SceneElement>,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

/// One element's sampled state stream.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneElement {
    pub path: String,
    #[serde(default = "default_layer")]
    pub layer: Layer,
    #[serde(default = "default_origin")]
    pub origin: Origin,
    /// `[width, height]` of the source image in pixels.
    pub image_size: [f64; 2],
    #[serde(default)]
    pub animation: Option<SceneAnimation>,
    #[serde(default)]
    pub split_threshold: usize,
    pub states: Vec<crate::state::State>,
}

/// Frame-cycle settings for `Animation` elements.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneAnimation {
    pub frame_count: u32,
    pub frame_delay: f64,
    #[serde(default)]
    pub loop_once: bool,
}

fn default_layer() -> Layer {
    Layer::Background
}

fn default_origin() -> Origin {
    Origin::Centre
}

/// Totals reported by [`Scene::write_to`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneStats {
    /// Elements that produced a declaration.
    pub written: usize,
    /// Elements skipped because they were never visible.
    pub skipped: usize,
}

impl Scene {
    pub fn screen_rect(&self) -> Rect {
        match self.screen_bounds {
            Some([x0, y0, x1, y1]) => Rect::new(x0, y0, x1, y1),
            None => widescreen_bounds(),
        }
    }

    /// Run the full pipeline for every element and serialize the script to
    /// `out`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> OsbResult<SceneStats> {
        let screen = self.screen_rect();
        let mut writer = StoryboardWriter::new(out, self.export.clone());
        let mut stats = SceneStats::default();

        for element in &self.elements {
            let initial = element
                .states
                .first()
                .map(|s| s.position)
                .unwrap_or_else(|| Vec2::new(320.0, 240.0));
            let mut sprite = match &element.animation {
                Some(animation) => Sprite::new_animation(
                    element.layer,
                    element.origin,
                    &element.path,
                    initial,
                    animation.frame_count,
                    animation.frame_delay,
                    if animation.loop_once {
                        LoopKind::LoopOnce
                    } else {
                        LoopKind::LoopForever
                    },
                ),
                None => Sprite::new(element.layer, element.origin, &element.path, initial),
            };
            sprite.split_threshold = element.split_threshold;

            let mut generator = CommandGenerator::new(self.config.clone());
            for state in &element.states {
                generator.add_state(state.clone());
            }

            let image_size = Vec2::new(element.image_size[0], element.image_size[1]);
            if generator.generate(&mut sprite, image_size, screen)? {
                writer.write_sprite(&sprite, &Placement::identity())?;
                stats.written += 1;
            } else {
                stats.skipped += 1;
            }
        }

        for sample in &self.samples {
            writer.write_sample(sample)?;
        }
        Ok(stats)
    }
}
