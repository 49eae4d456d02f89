//! Display rotation lookup.
//!
//! Platforms that report a rotation index directly use it as-is. Others only
//! report an orientation, which may be undefined; in that case the display's
//! width and height decide between portrait and landscape.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Rotation of the display, in quarter turns clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
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

    /// Platform rotation index (0..=3). Unknown indices mean no rotation.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            3 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn index(self) -> u8 {
        (self.degrees() / 90) as u8
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(Rotation::from_degrees)
            .ok_or_else(|| format!("rotation must be 0, 90, 180 or 270 (got '{}')", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Undefined,
    Portrait,
    Landscape,
    Square,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "undefined" => Ok(Orientation::Undefined),
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            "square" => Ok(Orientation::Square),
            other => Err(format!("unknown orientation '{}'", other)),
        }
    }
}

/// What the platform can tell us about the display.
pub trait DisplayInfo: Send + Sync {
    /// Rotation index, or `None` when the platform cannot report one.
    fn rotation_index(&self) -> Option<u8>;

    /// Orientation reported by the display itself.
    fn orientation(&self) -> Orientation;

    /// Orientation from the current configuration, consulted when the
    /// display reports `Undefined`.
    fn configured_orientation(&self) -> Orientation {
        Orientation::Undefined
    }

    /// Display size in pixels (width, height).
    fn size(&self) -> (u32, u32);
}

/// How the current rotation is obtained. Chosen once, at startup.
#[derive(Clone)]
pub enum RotationSource {
    Direct(Arc<dyn DisplayInfo>),
    OrientationHeuristic(Arc<dyn DisplayInfo>),
}

impl RotationSource {
    /// Use the direct rotation query when the display supports it.
    pub fn select(display: Arc<dyn DisplayInfo>) -> Self {
        let source = if display.rotation_index().is_some() {
            RotationSource::Direct(display)
        } else {
            RotationSource::OrientationHeuristic(display)
        };
        info!(source = source.name(), "Rotation source selected");
        source
    }

    pub fn name(&self) -> &'static str {
        match self {
            RotationSource::Direct(_) => "direct",
            RotationSource::OrientationHeuristic(_) => "orientation-heuristic",
        }
    }

    pub fn current(&self) -> Rotation {
        match self {
            RotationSource::Direct(display) => display
                .rotation_index()
                .map(Rotation::from_index)
                .unwrap_or_default(),
            RotationSource::OrientationHeuristic(display) => {
                rotation_for(resolve_orientation(display.as_ref()))
            }
        }
    }
}

impl fmt::Debug for RotationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RotationSource").field(&self.name()).finish()
    }
}

fn resolve_orientation(display: &dyn DisplayInfo) -> Orientation {
    let mut orientation = display.orientation();
    if orientation == Orientation::Undefined {
        orientation = display.configured_orientation();
    }
    if orientation == Orientation::Undefined {
        let (width, height) = display.size();
        orientation = if width == height {
            Orientation::Square
        } else if width < height {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        };
    }
    orientation
}

/// Landscape means a quarter turn; anything ambiguous means none.
pub fn rotation_for(orientation: Orientation) -> Rotation {
    match orientation {
        Orientation::Landscape => Rotation::Deg90,
        Orientation::Portrait | Orientation::Square | Orientation::Undefined => Rotation::Deg0,
    }
}

/// Display description fixed at startup (from flags or environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StaticDisplay {
    pub rotation: Option<Rotation>,
    pub orientation: Orientation,
    pub size: (u32, u32),
}

impl DisplayInfo for StaticDisplay {
    fn rotation_index(&self) -> Option<u8> {
        self.rotation.map(Rotation::index)
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}
