//! Sample types and small conversion helpers

/// Type alias for audio samples.
///
/// The effect chain runs in 32-bit float; the host converts 16-bit PCM at
/// the edges.
pub type Sample = f32;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    #[inline]
    pub fn to_mid_side(self) -> MidSideSample {
        MidSideSample {
            mid: (self.left + self.right) * 0.5,
            side: (self.left - self.right) * 0.5,
        }
    }
}

/// Mid/Side sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct MidSideSample {
    pub mid: Sample,
    pub side: Sample,
}

impl MidSideSample {
    #[inline]
    pub fn to_stereo(self) -> StereoSample {
        StereoSample {
            left: self.mid + self.side,
            right: self.mid - self.side,
        }
    }
}

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_linear(db: Sample) -> Sample {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear gain factor to decibels
#[inline]
pub fn linear_to_db(linear: Sample) -> Sample {
    20.0 * linear.max(1e-10).log10()
}
