//! aria-file: Audio file decoding for the Aria DSP engine
//!
//! Decodes impulse-response files fully into memory:
//! - WAV (8/16/24/32-bit int, 32-bit float) via hound
//! - FLAC, MP3, OGG Vorbis, AAC/M4A, ALAC via symphonia
//!
//! The DSP crates never touch the filesystem themselves; they receive a
//! decoded [`AudioData`] and the declared sample rate.

mod audio_file;
mod error;

pub use audio_file::*;
pub use error::*;
