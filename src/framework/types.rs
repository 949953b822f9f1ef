//! Value types exchanged with the display framework

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::modes::Resolution;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Dimension {
    pub w: i32,
    pub h: i32,
}

impl Dimension {
    pub const fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }
}

/// Inclusive rectangle given by its corner coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Region {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Region covering a surface of the given size, origin at (0, 0)
    pub const fn from_dimension(size: Dimension) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: size.w - 1,
            y2: size.h - 1,
        }
    }

    /// Clip `self` to `other`.
    ///
    /// Returns false (leaving `self` untouched) when the two do not overlap.
    pub fn intersect(&mut self, other: &Region) -> bool {
        if self.x2 < other.x1 || self.y2 < other.y1 || self.x1 > other.x2 || self.y1 > other.y2 {
            return false;
        }

        self.x1 = self.x1.max(other.x1);
        self.y1 = self.y1.max(other.y1);
        self.x2 = self.x2.min(other.x2);
        self.y2 = self.y2.min(other.y2);

        self.x1 <= self.x2 && self.y1 <= self.y2
    }
}

/// Pixel formats known to the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Argb,
    Rgb16,
    Rgb24,
    Rgb32,
    Argb1555,
    Argb4444,
    Yuy2,
    Nv12,
}

impl PixelFormat {
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Argb => "ARGB",
            PixelFormat::Rgb16 => "RGB16",
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Rgb32 => "RGB32",
            PixelFormat::Argb1555 => "ARGB1555",
            PixelFormat::Argb4444 => "ARGB4444",
            PixelFormat::Yuy2 => "YUY2",
            PixelFormat::Nv12 => "NV12",
        }
    }
}

/// Layer buffering strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferMode {
    FrontOnly,
    BackVideo,
    BackSystem,
    Triple,
    Windows,
}

bitflags! {
    /// Fields of a [`RegionConfig`]; also used as the per-field failure mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RegionConfigFlags: u32 {
        const WIDTH      = 1 << 0;
        const HEIGHT     = 1 << 1;
        const FORMAT     = 1 << 2;
        const SURFACE_CAPS = 1 << 3;
        const BUFFERMODE = 1 << 4;
        const OPTIONS    = 1 << 5;
        const SOURCE     = 1 << 6;
        const DEST       = 1 << 7;
        const OPACITY    = 1 << 8;
    }
}

bitflags! {
    /// Optional layer features requested by a region configuration
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct LayerOptions: u32 {
        const ALPHACHANNEL      = 1 << 0;
        const FLICKER_FILTERING = 1 << 1;
        const DEINTERLACING     = 1 << 2;
        const SRC_COLORKEY      = 1 << 3;
        const DST_COLORKEY      = 1 << 4;
        const OPACITY           = 1 << 5;
        const FIELD_PARITY      = 1 << 6;
    }
}

/// Region configuration proposed by the framework for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConfig {
    pub width: i32,
    pub height: i32,
    pub format: PixelFormat,
    pub buffermode: BufferMode,
    pub options: LayerOptions,
    pub source: Region,
    pub dest: Region,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerConfigFlags: u32 {
        const WIDTH       = 1 << 0;
        const HEIGHT      = 1 << 1;
        const PIXELFORMAT = 1 << 2;
        const BUFFERMODE  = 1 << 3;
    }
}

/// Default layer configuration reported by `init_layer`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerConfig {
    pub flags: LayerConfigFlags,
    pub width: i32,
    pub height: i32,
    pub pixelformat: PixelFormat,
    pub buffermode: BufferMode,
}

impl LayerConfig {
    /// Region configuration covering the whole layer
    pub fn region_config(&self) -> RegionConfig {
        let area = Region::from_dimension(Dimension::new(self.width, self.height));
        RegionConfig {
            width: self.width,
            height: self.height,
            format: self.pixelformat,
            buffermode: self.buffermode,
            options: LayerOptions::empty(),
            source: area,
            dest: area,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerCaps: u32 {
        const SURFACE = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerTypes: u32 {
        const GRAPHICS = 1 << 0;
        const VIDEO    = 1 << 1;
        const STILL    = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescription {
    pub caps: LayerCaps,
    pub types: LayerTypes,
    pub name: String,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScreenCaps: u32 {
        const OUTPUTS = 1 << 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenDescription {
    pub caps: ScreenCaps,
    pub outputs: usize,
    pub name: String,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputCaps: u32 {
        const RESOLUTION = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputConfigFlags: u32 {
        const ENCODER    = 1 << 0;
        const SIGNALS    = 1 << 1;
        const CONNECTORS = 1 << 2;
        const RESOLUTION = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescription {
    pub caps: OutputCaps,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub flags: OutputConfigFlags,
    pub resolution: Resolution,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SystemCaps: u32 {
        const ACCELERATION    = 1 << 0;
        const ALWAYS_INDIRECT = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub version: (u32, u32),
    pub caps: SystemCaps,
    pub name: String,
    pub vendor: String,
}

/// Handle of a surface pool registered with the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(pub u32);
