//! Osbforge turns dense streams of sampled element states into minimal
//! declarative storyboard scripts.
//!
//! The pipeline: buffer timed [`State`] snapshots into a
//! [`CommandGenerator`], which gates on-screen visibility, reduces each
//! attribute curve to the fewest keyframes within configured tolerances, and
//! writes interpolation instructions onto a [`Sprite`]. A
//! [`StoryboardWriter`] then serializes elements to the fixed legacy text
//! grammar, splitting oversized elements into cooperating declarations.
#![forbid(unsafe_code)]

pub mod command;
pub mod core;
pub mod ease;
pub mod error;
pub mod generate;
pub mod scene;
pub mod sprite;
pub mod state;
pub mod timeline;
pub mod transform;
pub mod write;

pub use command::{Command, LoopGroup, ParamSpan, Span, Target, TriggerGroup};
pub use core::{
    Color, Layer, LoopKind, Origin, ParameterKind, Rect, Vec2, standard_bounds, widescreen_bounds,
};
pub use ease::Ease;
pub use error::{OsbError, OsbResult};
pub use generate::{CommandGenerator, GenerateOptions, GeneratorConfig};
pub use scene::{Scene, SceneAnimation, SceneElement, SceneStats};
pub use sprite::{ElementKind, Sample, Sprite};
pub use state::State;
pub use timeline::{Angle, Keyframe, KeyframePlacement, Lerp, Timeline};
pub use transform::Placement;
pub use write::{ExportSettings, StoryboardWriter};
