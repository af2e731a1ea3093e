use std::fmt;

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Storyboard space is a fixed 640x480 playfield; widescreen content may
/// extend horizontally into `[-107, 747]`.
pub fn widescreen_bounds() -> Rect {
    Rect::new(-107.0, 0.0, 747.0, 480.0)
}

/// The 4:3 subset of [`widescreen_bounds`].
pub fn standard_bounds() -> Rect {
    Rect::new(0.0, 0.0, 640.0, 480.0)
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: u8) -> f64 {
    let factor = 10f64.powi(i32::from(decimals));
    (value * factor).round() / factor
}

/// RGB color with channels in `[0, 1]`.
///
/// The wire format carries 0-255 integer channels; conversion happens at
/// write time only.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red channel in `[0, 1]`.
    pub r: f64,
    /// Green channel in `[0, 1]`.
    pub g: f64,
    /// Blue channel in `[0, 1]`.
    pub b: f64,
}

impl Color {
    /// Opaque white, the implicit default tint of every element.
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    /// Create a color from `[0, 1]` channels.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Create a color from 0-255 wire channels.
    pub fn from_wire(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f64::from(r) / 255.0,
            g: f64::from(g) / 255.0,
            b: f64::from(b) / 255.0,
        }
    }

    /// Convert to 0-255 wire channels, rounding to nearest.
    pub fn to_wire(self) -> (u8, u8, u8) {
        fn channel(v: f64) -> u8 {
            (v * 255.0).round().clamp(0.0, 255.0) as u8
        }
        (channel(self.r), channel(self.g), channel(self.b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Anchor point used for placement and rotation of an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Origin {
    TopLeft,
    TopCentre,
    TopRight,
    CentreLeft,
    Centre,
    CentreRight,
    BottomLeft,
    BottomCentre,
    BottomRight,
}

impl Origin {
    /// Fractional anchor position within the image, `(0,0)` top-left to
    /// `(1,1)` bottom-right.
    pub fn anchor_factor(self) -> Vec2 {
        let x = match self {
            Self::TopLeft | Self::CentreLeft | Self::BottomLeft => 0.0,
            Self::TopCentre | Self::Centre | Self::BottomCentre => 0.5,
            Self::TopRight | Self::CentreRight | Self::BottomRight => 1.0,
        };
        let y = match self {
            Self::TopLeft | Self::TopCentre | Self::TopRight => 0.0,
            Self::CentreLeft | Self::Centre | Self::CentreRight => 0.5,
            Self::BottomLeft | Self::BottomCentre | Self::BottomRight => 1.0,
        };
        Vec2::new(x, y)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TopLeft => "TopLeft",
            Self::TopCentre => "TopCentre",
            Self::TopRight => "TopRight",
            Self::CentreLeft => "CentreLeft",
            Self::Centre => "Centre",
            Self::CentreRight => "CentreRight",
            Self::BottomLeft => "BottomLeft",
            Self::BottomCentre => "BottomCentre",
            Self::BottomRight => "BottomRight",
        })
    }
}

/// Declaration layer, back to front.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum Layer {
    Background,
    Fail,
    Pass,
    Foreground,
    Overlay,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Background => "Background",
            Self::Fail => "Fail",
            Self::Pass => "Pass",
            Self::Foreground => "Foreground",
            Self::Overlay => "Overlay",
        })
    }
}

/// Frame-cycle behavior of an `Animation` element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LoopKind {
    LoopForever,
    LoopOnce,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoopForever => "LoopForever",
            Self::LoopOnce => "LoopOnce",
        })
    }
}

/// Discrete render-state toggles carried by `P` instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ParameterKind {
    /// `H`: mirror horizontally.
    FlipH,
    /// `V`: mirror vertically.
    FlipV,
    /// `A`: additive blending.
    Additive,
}

impl ParameterKind {
    /// Single-letter wire code.
    pub fn code(self) -> char {
        match self {
            Self::FlipH => 'H',
            Self::FlipV => 'V',
            Self::Additive => 'A',
        }
    }
}
