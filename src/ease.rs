use std::f64::consts::PI;

/// Easing applied to an instruction's progress, matching the legacy numeric
/// code table (0-34).
///
/// Codes 1 and 2 are the historical shorthand `Out`/`In` (quadratic).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    Out,
    In,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
    InQuint,
    OutQuint,
    InOutQuint,
    InSine,
    OutSine,
    InOutSine,
    InExpo,
    OutExpo,
    InOutExpo,
    InCirc,
    OutCirc,
    InOutCirc,
    InElastic,
    OutElastic,
    OutElasticHalf,
    OutElasticQuarter,
    InOutElastic,
    InBack,
    OutBack,
    InOutBack,
    InBounce,
    OutBounce,
    InOutBounce,
}

fn quad(t: f64) -> f64 {
    t * t
}

fn cubic(t: f64) -> f64 {
    t * t * t
}

fn quart(t: f64) -> f64 {
    t * t * t * t
}

fn quint(t: f64) -> f64 {
    t * t * t * t * t
}

fn sine(t: f64) -> f64 {
    1.0 - (t * PI / 2.0).cos()
}

fn expo(t: f64) -> f64 {
    if t <= 0.0 { 0.0 } else { 2f64.powf(10.0 * t - 10.0) }
}

fn circ(t: f64) -> f64 {
    1.0 - (1.0 - t * t).max(0.0).sqrt()
}

fn back(t: f64) -> f64 {
    let c1 = 1.70158;
    let c3 = c1 + 1.0;
    c3 * t * t * t - c1 * t * t
}

fn elastic(t: f64) -> f64 {
    elastic_scaled(t, 1.0)
}

// Frequency-scaled elastic release; `scale` 1.0 is the full oscillation,
// 0.5 and 0.25 settle after half and a quarter of the swings.
fn elastic_scaled(t: f64, scale: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let c4 = (2.0 * PI) / 3.0;
    2f64.powf(-10.0 * t) * ((t * scale * 10.0 - 0.75) * c4).sin() + 1.0
}

fn bounce(t: f64) -> f64 {
    let (n1, d1) = (7.5625, 2.75);
    if t < 1.0 / d1 {
        n1 * t * t
    } else if t < 2.0 / d1 {
        let t = t - 1.5 / d1;
        n1 * t * t + 0.75
    } else if t < 2.5 / d1 {
        let t = t - 2.25 / d1;
        n1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / d1;
        n1 * t * t + 0.984375
    }
}

fn reverse(f: fn(f64) -> f64, t: f64) -> f64 {
    1.0 - f(1.0 - t)
}

fn in_out(f: fn(f64) -> f64, t: f64) -> f64 {
    if t < 0.5 {
        f(2.0 * t) / 2.0
    } else {
        1.0 - f(2.0 - 2.0 * t) / 2.0
    }
}

impl Ease {
    /// Map normalized progress `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::In | Self::InQuad => quad(t),
            Self::Out | Self::OutQuad => reverse(quad, t),
            Self::InOutQuad => in_out(quad, t),
            Self::InCubic => cubic(t),
            Self::OutCubic => reverse(cubic, t),
            Self::InOutCubic => in_out(cubic, t),
            Self::InQuart => quart(t),
            Self::OutQuart => reverse(quart, t),
            Self::InOutQuart => in_out(quart, t),
            Self::InQuint => quint(t),
            Self::OutQuint => reverse(quint, t),
            Self::InOutQuint => in_out(quint, t),
            Self::InSine => sine(t),
            Self::OutSine => reverse(sine, t),
            Self::InOutSine => in_out(sine, t),
            Self::InExpo => expo(t),
            Self::OutExpo => reverse(expo, t),
            Self::InOutExpo => in_out(expo, t),
            Self::InCirc => circ(t),
            Self::OutCirc => reverse(circ, t),
            Self::InOutCirc => in_out(circ, t),
            Self::InElastic => reverse(elastic, t),
            Self::OutElastic => elastic(t),
            Self::OutElasticHalf => elastic_scaled(t, 0.5),
            Self::OutElasticQuarter => elastic_scaled(t, 0.25),
            Self::InOutElastic => in_out(elastic, t),
            Self::InBack => back(t),
            Self::OutBack => reverse(back, t),
            Self::InOutBack => in_out(back, t),
            Self::InBounce => reverse(bounce, t),
            Self::OutBounce => bounce(t),
            Self::InOutBounce => in_out(bounce, t),
        }
    }

    /// Numeric wire code.
    pub fn code(self) -> u8 {
        match self {
            Self::Linear => 0,
            Self::Out => 1,
            Self::In => 2,
            Self::InQuad => 3,
            Self::OutQuad => 4,
            Self::InOutQuad => 5,
            Self::InCubic => 6,
            Self::OutCubic => 7,
            Self::InOutCubic => 8,
            Self::InQuart => 9,
            Self::OutQuart => 10,
            Self::InOutQuart => 11,
            Self::InQuint => 12,
            Self::OutQuint => 13,
            Self::InOutQuint => 14,
            Self::InSine => 15,
            Self::OutSine => 16,
            Self::InOutSine => 17,
            Self::InExpo => 18,
            Self::OutExpo => 19,
            Self::InOutExpo => 20,
            Self::InCirc => 21,
            Self::OutCirc => 22,
            Self::InOutCirc => 23,
            Self::InElastic => 24,
            Self::OutElastic => 25,
            Self::OutElasticHalf => 26,
            Self::OutElasticQuarter => 27,
            Self::InOutElastic => 28,
            Self::InBack => 29,
            Self::OutBack => 30,
            Self::InOutBack => 31,
            Self::InBounce => 32,
            Self::OutBounce => 33,
            Self::InOutBounce => 34,
        }
    }

    /// Inverse of [`Ease::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Linear,
            1 => Self::Out,
            2 => Self::In,
            3 => Self::InQuad,
            4 => Self::OutQuad,
            5 => Self::InOutQuad,
            6 => Self::InCubic,
            7 => Self::OutCubic,
            8 => Self::InOutCubic,
            9 => Self::InQuart,
            10 => Self::OutQuart,
            11 => Self::InOutQuart,
            12 => Self::InQuint,
            13 => Self::OutQuint,
            14 => Self::InOutQuint,
            15 => Self::InSine,
            16 => Self::OutSine,
            17 => Self::InOutSine,
            18 => Self::InExpo,
            19 => Self::OutExpo,
            20 => Self::InOutExpo,
            21 => Self::InCirc,
            22 => Self::OutCirc,
            23 => Self::InOutCirc,
            24 => Self::InElastic,
            25 => Self::OutElastic,
            26 => Self::OutElasticHalf,
            27 => Self::OutElasticQuarter,
            28 => Self::InOutElastic,
            29 => Self::InBack,
            30 => Self::OutBack,
            31 => Self::InOutBack,
            32 => Self::InBounce,
            33 => Self::OutBounce,
            34 => Self::InOutBounce,
            _ => return None,
        })
    }

    const ALL: [Ease; 35] = [
        Ease::Linear,
        Ease::Out,
        Ease::In,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::InQuart,
        Ease::OutQuart,
        Ease::InOutQuart,
        Ease::InQuint,
        Ease::OutQuint,
        Ease::InOutQuint,
        Ease::InSine,
        Ease::OutSine,
        Ease::InOutSine,
        Ease::InExpo,
        Ease::OutExpo,
        Ease::InOutExpo,
        Ease::InCirc,
        Ease::OutCirc,
        Ease::InOutCirc,
        Ease::InElastic,
        Ease::OutElastic,
        Ease::OutElasticHalf,
        Ease::OutElasticQuarter,
        Ease::InOutElastic,
        Ease::InBack,
        Ease::OutBack,
        Ease::InOutBack,
        Ease::InBounce,
        Ease::OutBounce,
        Ease::InOutBounce,
    ];
}
