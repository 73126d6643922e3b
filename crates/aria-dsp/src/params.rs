//! Serializable parameter snapshots
//!
//! The host player persists effect settings between sessions; these structs
//! are the serde surface for that. Applying a snapshot is just the plain
//! setters, so it is as cheap and race-tolerant as they are.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use aria_core::Sample;

/// Center-channel canceller/extractor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterCancelParams {
    /// Effect strength in [-1, 1]: > 0 cancel, < 0 extract, 0 passthrough
    pub amount: Sample,
}

impl Default for CenterCancelParams {
    fn default() -> Self {
        Self { amount: 0.0 }
    }
}

/// Convolution reverb settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    /// Wet mix in percent, 0..100
    pub mix: Sample,
    /// Wet gain in dB
    pub gain_db: Sample,
    /// Impulse response file, if one has been chosen
    pub ir_path: Option<PathBuf>,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            mix: 50.0,
            gain_db: 0.0,
            ir_path: None,
        }
    }
}
