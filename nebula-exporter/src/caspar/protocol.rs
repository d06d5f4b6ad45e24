//! Protocol version negotiation and video mode tables.

use std::fmt;

/// AMCP protocol generations the exporter knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V2_0_6,
    V2_0_7,
    V2_1,
    V2_2,
}

/// Ordered `VERSION` prefix table. First matching prefix wins.
const VERSION_PREFIXES: &[(&str, ProtocolVersion)] = &[
    ("2.3", ProtocolVersion::V2_2),
    ("2.2", ProtocolVersion::V2_2),
    ("2.1", ProtocolVersion::V2_1),
    ("2.0.7", ProtocolVersion::V2_0_7),
    ("2.0.6", ProtocolVersion::V2_0_6),
];

impl ProtocolVersion {
    /// Used when the server reports a version no prefix matches.
    pub const FALLBACK: Self = Self::V2_2;

    /// Match a `VERSION` payload against the prefix table.
    pub fn from_version_string(version: &str) -> Option<Self> {
        let version = version.trim();
        VERSION_PREFIXES
            .iter()
            .find(|(prefix, _)| version.starts_with(prefix))
            .map(|(_, protocol)| *protocol)
    }

    /// Like [`Self::from_version_string`], falling back to [`Self::FALLBACK`].
    pub fn resolve(version: &str) -> Self {
        Self::from_version_string(version).unwrap_or(Self::FALLBACK)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::V2_0_6 => "2.06",
            Self::V2_0_7 => "2.07",
            Self::V2_1 => "2.1",
            Self::V2_2 => "2.2",
        };
        f.write_str(label)
    }
}

/// A frame rate as an exact fraction.
///
/// Kept rational so that threshold comparisons against 1/fps do not drift
/// for NTSC-family rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    /// Used for channels whose rate was never discovered.
    pub const DEFAULT: Self = Self { num: 25, den: 1 };

    /// Both parts must be non-zero.
    pub const fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            None
        } else {
            Some(Self { num, den })
        }
    }

    pub const fn num(&self) -> u32 {
        self.num
    }

    pub const fn den(&self) -> u32 {
        self.den
    }

    /// Duration of one frame in seconds (`den / num`).
    pub fn frame_duration(&self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Whether `seconds` is longer than one frame.
    ///
    /// Compares `seconds * num > den` so the fraction is never rounded.
    pub fn exceeds_frame(&self, seconds: f64) -> bool {
        seconds * f64::from(self.num) > f64::from(self.den)
    }

    /// Whole frames in `seconds`, truncated. Negative or NaN input yields 0.
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        let frames = (seconds * f64::from(self.num) / f64::from(self.den)).floor();
        if frames.is_finite() && frames > 0.0 {
            frames as u64
        } else {
            0
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// CasparCG video modes and their frame (not field) rates.
const VIDEO_MODES: &[(&str, u32, u32)] = &[
    ("PAL", 25, 1),
    ("NTSC", 30000, 1001),
    ("576p2500", 25, 1),
    ("720p2398", 24000, 1001),
    ("720p2400", 24, 1),
    ("720p2500", 25, 1),
    ("720p2997", 30000, 1001),
    ("720p3000", 30, 1),
    ("720p5000", 50, 1),
    ("720p5994", 60000, 1001),
    ("720p6000", 60, 1),
    ("1080i5000", 25, 1),
    ("1080i5994", 30000, 1001),
    ("1080i6000", 30, 1),
    ("1080p2398", 24000, 1001),
    ("1080p2400", 24, 1),
    ("1080p2500", 25, 1),
    ("1080p2997", 30000, 1001),
    ("1080p3000", 30, 1),
    ("1080p5000", 50, 1),
    ("1080p5994", 60000, 1001),
    ("1080p6000", 60, 1),
    ("2160p2398", 24000, 1001),
    ("2160p2400", 24, 1),
    ("2160p2500", 25, 1),
    ("2160p2997", 30000, 1001),
    ("2160p3000", 30, 1),
    ("2160p5000", 50, 1),
    ("2160p5994", 60000, 1001),
    ("2160p6000", 60, 1),
];

/// Look up the frame rate of a video mode name.
pub fn frame_rate_for_mode(mode: &str) -> Option<FrameRate> {
    let mode = mode.trim();
    VIDEO_MODES
        .iter()
        .find(|(name, _, _)| *name == mode)
        .and_then(|(_, num, den)| FrameRate::new(*num, *den))
}
