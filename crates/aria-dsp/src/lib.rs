//! aria-dsp: Real-time effect processors for the Aria player
//!
//! Block-based FFT/spectral processors that run inside the live audio
//! callback path.
//!
//! ## Modules
//! - `fft` - Shared in-place radix-2 complex FFT/IFFT kernel
//! - `center` - Center-channel canceller/extractor (STFT mid/side)
//! - `convolution` - Partitioned convolution reverb (frequency delay line)
//! - `params` - Serializable parameter snapshots for settings persistence
//!
//! Both processors are pure, stateful, single-threaded transforms: the host
//! pipeline calls them synchronously from its audio callback, one buffer at
//! a time, and gets equal-length output back. No locks, no allocation, and
//! no I/O on the steady-state path.

pub mod center;
pub mod convolution;
pub mod fft;
pub mod params;

use aria_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state (discards in-flight audio, keeps configuration)
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Stereo processor trait
///
/// The narrow surface the host's effect chain drives: one stereo frame in,
/// one stereo frame out, strictly in submission order.
pub trait StereoProcessor: Processor {
    /// Process a stereo sample pair
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    /// Process split stereo blocks
    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }

    /// Process an interleaved stereo buffer `[L0,R0,L1,R1,...]` in place
    fn process_interleaved(&mut self, buffer: &mut [Sample]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_sample(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }
}
