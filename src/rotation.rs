//! Screen rotation
//!
//! Derives the screen rotation from an explicit setting or from the
//! connector's panel orientation, along with the logical screen size.

use serde::{Deserialize, Serialize};

use crate::framework::Dimension;

/// Rotation in 90 degree steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// True when width and height trade places
    pub fn is_transposed(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("invalid rotation {} (expected 0, 90, 180 or 270)", degrees))
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> u32 {
        rotation.degrees()
    }
}

/// Values of the KMS "panel orientation" connector property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelOrientation {
    Normal,
    UpsideDown,
    LeftSideUp,
    RightSideUp,
}

impl PanelOrientation {
    /// Parse the property's enum name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Normal" => Some(PanelOrientation::Normal),
            "Upside Down" => Some(PanelOrientation::UpsideDown),
            "Left Side Up" => Some(PanelOrientation::LeftSideUp),
            "Right Side Up" => Some(PanelOrientation::RightSideUp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PanelOrientation::Normal => "Normal",
            PanelOrientation::UpsideDown => "Upside Down",
            PanelOrientation::LeftSideUp => "Left Side Up",
            PanelOrientation::RightSideUp => "Right Side Up",
        }
    }

    pub fn rotation(self) -> Rotation {
        match self {
            PanelOrientation::Normal => Rotation::Deg0,
            PanelOrientation::UpsideDown => Rotation::Deg180,
            PanelOrientation::LeftSideUp => Rotation::Deg270,
            PanelOrientation::RightSideUp => Rotation::Deg90,
        }
    }
}

/// Resolved rotation with the logical screen size it implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationState {
    pub rotation: Rotation,
    pub size: Dimension,
}

impl Default for RotationState {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg0,
            size: Dimension::default(),
        }
    }
}

/// Resolve rotation and logical size.
///
/// `explicit` wins over `orientation`; neither yields no rotation. For 90
/// and 270 degrees the larger dimension becomes the logical width and the
/// smaller one is scaled down by the panel's aspect ratio.
pub fn resolve(
    explicit: Option<Rotation>,
    orientation: Option<PanelOrientation>,
    size: Dimension,
) -> RotationState {
    let rotation = explicit
        .or_else(|| orientation.map(PanelOrientation::rotation))
        .unwrap_or_default();

    let size = if rotation.is_transposed() {
        let long = size.w.max(size.h).max(1);
        let short = size.w.min(size.h).max(1);
        let scaled = (i64::from(short) * i64::from(short) / i64::from(long)) as i32;
        Dimension::new(long, scaled.max(1))
    } else {
        size
    };

    RotationState { rotation, size }
}
