//! Center-channel canceller/extractor
//!
//! STFT processor that removes or isolates center-panned (vocal) content:
//! - Cancel (`amount > 0`): overlap-add STFT with per-bin mid/side gain,
//!   weighted by a phase-correlation "centerness" estimate
//! - Extract (`amount < 0`): per-sample time-domain mid/side blend, no STFT
//!
//! One instance per playback session; re-created on sample rate change.

use rustfft::num_complex::Complex;

use aria_core::{Sample, StereoSample};

use crate::fft::fft;
use crate::params::CenterCancelParams;
use crate::{Processor, StereoProcessor};

/// Default STFT window length
pub const DEFAULT_FFT_SIZE: usize = 4096;

/// Bins quieter than this are left untouched to avoid division blowup
const SILENCE_EPSILON: Sample = 1e-10;

/// Center-channel canceller/extractor
///
/// Streaming contract: one output frame per input frame, always. The STFT
/// path pays its startup latency in silence, never in frame count.
pub struct CenterCancelProcessor {
    /// STFT window length (power of two, multiple of 4)
    fft_size: usize,
    /// STFT hop, fft_size/4 (75% overlap)
    hop_size: usize,
    sample_rate: u32,
    /// Effect strength/direction: 0 passthrough, >0 cancel, <0 extract
    amount: Sample,
    /// Hann window, shared between analysis and synthesis
    window: Vec<Sample>,

    // Input ring buffers, length fft_size
    input_l: Vec<Sample>,
    input_r: Vec<Sample>,
    /// Next write slot in the input buffers
    input_pos: usize,

    // Output ring buffers, length 2*fft_size, filled by overlap-add
    output_l: Vec<Sample>,
    output_r: Vec<Sample>,
    /// Circular read cursor
    output_read: usize,
    /// Overlap-add base for the next frame
    output_write: usize,
    /// Count of ready output samples
    output_avail: usize,

    // FFT work buffers, length fft_size
    spec_l: Vec<Complex<Sample>>,
    spec_r: Vec<Complex<Sample>>,

    // Reusable int16 conversion buffers
    scratch_in: Vec<Sample>,
    scratch_out: Vec<Sample>,

    initialized: bool,
}

impl Default for CenterCancelProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl CenterCancelProcessor {
    /// Create an uninitialized processor; `process_*` passes audio through
    /// until [`init`](Self::init) is called.
    pub fn new() -> Self {
        Self {
            fft_size: 0,
            hop_size: 0,
            sample_rate: 0,
            amount: 0.0,
            window: Vec::new(),
            input_l: Vec::new(),
            input_r: Vec::new(),
            input_pos: 0,
            output_l: Vec::new(),
            output_r: Vec::new(),
            output_read: 0,
            output_write: 0,
            output_avail: 0,
            spec_l: Vec::new(),
            spec_r: Vec::new(),
            scratch_in: Vec::new(),
            scratch_out: Vec::new(),
            initialized: false,
        }
    }

    /// Allocate buffers and precompute the Hann window. Always succeeds.
    ///
    /// `fft_size` must be a power of two and a multiple of 4.
    pub fn init(&mut self, sample_rate: u32, fft_size: usize) -> bool {
        debug_assert!(fft_size.is_power_of_two() && fft_size % 4 == 0);

        self.fft_size = fft_size;
        self.hop_size = fft_size / 4;
        self.sample_rate = sample_rate;

        self.window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as Sample / (fft_size - 1) as Sample).cos())
            })
            .collect();

        self.input_l = vec![0.0; fft_size];
        self.input_r = vec![0.0; fft_size];
        self.input_pos = 0;

        self.output_l = vec![0.0; fft_size * 2];
        self.output_r = vec![0.0; fft_size * 2];
        self.output_read = 0;
        self.output_write = 0;
        self.output_avail = 0;

        self.spec_l = vec![Complex::new(0.0, 0.0); fft_size];
        self.spec_r = vec![Complex::new(0.0, 0.0); fft_size];

        self.initialized = true;
        log::debug!("center cancel init: {sample_rate} Hz, fft {fft_size}, hop {}", self.hop_size);
        true
    }

    /// Zero all ring buffers and counters without reallocating.
    ///
    /// Used on seek/stream change so stale overlap content never bleeds into
    /// the new position. No-op when uninitialized.
    pub fn reset(&mut self) {
        if !self.initialized {
            return;
        }
        self.input_l.fill(0.0);
        self.input_r.fill(0.0);
        self.input_pos = 0;
        self.output_l.fill(0.0);
        self.output_r.fill(0.0);
        self.output_read = 0;
        self.output_write = 0;
        self.output_avail = 0;
    }

    /// Set effect strength, clamped to [-1, 1]: `> 0` cancels the center,
    /// `< 0` extracts it, `0` is passthrough.
    ///
    /// Single f32 write; safe to call from a UI thread while the audio
    /// thread is inside `process_*` (worst case is a one-frame-stale value).
    pub fn set_amount(&mut self, amount: Sample) {
        self.amount = amount.clamp(-1.0, 1.0);
    }

    pub fn amount(&self) -> Sample {
        self.amount
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sample rate the processor was initialized with
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn apply_params(&mut self, params: &CenterCancelParams) {
        self.set_amount(params.amount);
    }

    pub fn params(&self) -> CenterCancelParams {
        CenterCancelParams {
            amount: self.amount,
        }
    }

    /// Process interleaved stereo float samples. Returns the number of
    /// frames written to `output`, always equal to the input frame count.
    pub fn process_float(&mut self, input: &[Sample], output: &mut [Sample]) -> usize {
        let frames = input.len() / 2;
        debug_assert!(output.len() >= frames * 2);

        let amount = self.amount;

        // Passthrough fast path
        if !self.initialized || amount == 0.0 {
            output[..frames * 2].copy_from_slice(&input[..frames * 2]);
            return frames;
        }

        if amount < 0.0 {
            // Extraction: time-domain mid/side blend, sample for sample.
            // No frequency resolution needed, no STFT latency.
            let keep = 1.0 - amount.abs();
            for (out, frame) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
                let mut ms = StereoSample::new(frame[0], frame[1]).to_mid_side();
                ms.side *= keep;
                let s = ms.to_stereo();
                out[0] = s.left;
                out[1] = s.right;
            }
            return frames;
        }

        // Cancellation: block-based STFT
        for (out, frame) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
            let (l, r) = self.cancel_sample(frame[0], frame[1]);
            out[0] = l;
            out[1] = r;
        }
        frames
    }

    /// 16-bit PCM entry point: convert to float, delegate to
    /// [`process_float`](Self::process_float), convert back with hard
    /// clamping. One core algorithm, format adapters at the edges.
    pub fn process_int16(&mut self, input: &[i16], output: &mut [i16]) -> usize {
        let n = input.len();
        debug_assert!(output.len() >= n);

        // Reusable buffers; resize only grows on the first call at a size
        let mut input_f = std::mem::take(&mut self.scratch_in);
        let mut output_f = std::mem::take(&mut self.scratch_out);
        input_f.resize(n, 0.0);
        output_f.resize(n, 0.0);

        for (dst, &s) in input_f.iter_mut().zip(input) {
            *dst = s as Sample / 32768.0;
        }

        let frames = self.process_float(&input_f, &mut output_f);

        for (dst, &s) in output.iter_mut().zip(output_f.iter()) {
            *dst = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        }

        self.scratch_in = input_f;
        self.scratch_out = output_f;
        frames
    }

    /// One sample through the STFT cancellation pipeline: append to the
    /// input ring, run a frame when full, pop one overlap-add output sample
    /// (silence during the startup window).
    fn cancel_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        self.input_l[self.input_pos] = left;
        self.input_r[self.input_pos] = right;
        self.input_pos += 1;

        if self.input_pos == self.fft_size {
            self.process_frame();

            // Keep the most recent fft_size - hop samples for the next window
            let hop = self.hop_size;
            self.input_l.copy_within(hop.., 0);
            self.input_r.copy_within(hop.., 0);
            self.input_pos = self.fft_size - hop;
        }

        if self.output_avail > 0 {
            let idx = self.output_read;
            let out = (self.output_l[idx], self.output_r[idx]);
            // Zero the consumed slot so the next overlap-add starts clean
            self.output_l[idx] = 0.0;
            self.output_r[idx] = 0.0;
            self.output_read = (idx + 1) % self.output_l.len();
            self.output_avail -= 1;
            out
        } else {
            (0.0, 0.0)
        }
    }

    /// One STFT hop: window, forward FFT, per-bin mid/side gain, inverse
    /// FFT, overlap-add.
    fn process_frame(&mut self) {
        let n = self.fft_size;
        let half = n / 2;
        // Effective strength is latched here, at frame start
        let strength = self.amount.clamp(0.0, 1.0);

        for i in 0..n {
            let w = self.window[i];
            self.spec_l[i] = Complex::new(self.input_l[i] * w, 0.0);
            self.spec_r[i] = Complex::new(self.input_r[i] * w, 0.0);
        }

        fft(&mut self.spec_l, false);
        fft(&mut self.spec_r, false);

        for i in 0..=half {
            let l = self.spec_l[i];
            let r = self.spec_r[i];

            let mid = (l + r) * 0.5;
            let side = (l - r) * 0.5;

            let mid_mag = mid.norm();
            let side_mag = side.norm();
            if mid_mag + side_mag < SILENCE_EPSILON {
                continue;
            }

            // Magnitude-ratio centerness, blended 70/30 with inter-channel
            // phase correlation to reject loud-but-decorrelated bins
            let mag_ratio = mid_mag / (mid_mag + side_mag + SILENCE_EPSILON);
            let phase_corr = (l.arg() - r.arg()).cos() * 0.5 + 0.5;
            let centerness = mag_ratio * 0.7 + phase_corr * 0.3;

            let mid_gain = (1.0 - centerness * strength).max(0.0);

            let new_l = mid * mid_gain + side;
            let new_r = mid * mid_gain - side;
            self.spec_l[i] = new_l;
            self.spec_r[i] = new_r;

            // Conjugate mirror keeps the inverse transform real-valued;
            // DC and Nyquist are their own conjugates
            if i > 0 && i < half {
                self.spec_l[n - i] = new_l.conj();
                self.spec_r[n - i] = new_r.conj();
            }
        }

        fft(&mut self.spec_l, true);
        fft(&mut self.spec_r, true);

        // Compensate 75%-overlap energy summation of the squared Hann window
        let norm = 1.0 / ((n / self.hop_size) as Sample * 0.5);
        let ring_len = self.output_l.len();
        for i in 0..n {
            let idx = (self.output_write + i) % ring_len;
            let w = self.window[i] * norm;
            self.output_l[idx] += self.spec_l[i].re * w;
            self.output_r[idx] += self.spec_r[i].re * w;
        }

        self.output_write = (self.output_write + self.hop_size) % ring_len;
        self.output_avail += self.hop_size;
    }
}

impl Processor for CenterCancelProcessor {
    fn reset(&mut self) {
        CenterCancelProcessor::reset(self);
    }

    fn latency(&self) -> usize {
        if self.initialized {
            self.fft_size - self.hop_size
        } else {
            0
        }
    }
}

impl StereoProcessor for CenterCancelProcessor {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let amount = self.amount;
        if !self.initialized || amount == 0.0 {
            return (left, right);
        }
        if amount < 0.0 {
            let keep = 1.0 - amount.abs();
            let mut ms = StereoSample::new(left, right).to_mid_side();
            ms.side *= keep;
            let s = ms.to_stereo();
            return (s.left, s.right);
        }
        self.cancel_sample(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    fn sine_stereo(frames: usize, freq: f32, amp: f32) -> Vec<Sample> {
        let mut buf = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * amp;
            buf.push(s);
            buf.push(s);
        }
        buf
    }

    fn rms(interleaved: &[Sample]) -> f32 {
        let sum: f32 = interleaved.iter().map(|s| s * s).sum();
        (sum / interleaved.len() as f32).sqrt()
    }

    #[test]
    fn test_passthrough_at_zero_amount() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(0.0);

        let input = sine_stereo(1000, 440.0, 0.8);
        let mut output = vec![0.0; input.len()];
        let frames = proc.process_float(&input, &mut output);

        assert_eq!(frames, 1000);
        assert_eq!(output, input);
    }

    #[test]
    fn test_passthrough_when_uninitialized() {
        let mut proc = CenterCancelProcessor::new();
        proc.set_amount(1.0);

        let input = sine_stereo(333, 440.0, 0.8);
        let mut output = vec![0.0; input.len()];
        let frames = proc.process_float(&input, &mut output);

        assert_eq!(frames, 333);
        assert_eq!(output, input);
    }

    #[test]
    fn test_extraction_removes_pure_side() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(-1.0);

        // L = 1, R = -1: pure side, no center content at all
        let input: Vec<Sample> = [1.0, -1.0].repeat(256);
        let mut output = vec![9.0; input.len()];
        proc.process_float(&input, &mut output);

        for &s in &output {
            assert!(s.abs() < 1e-6);
        }
    }

    #[test]
    fn test_extraction_keeps_pure_center() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(-1.0);

        let input: Vec<Sample> = [0.7, 0.7].repeat(256);
        let mut output = vec![0.0; input.len()];
        proc.process_float(&input, &mut output);

        for &s in &output {
            assert!((s - 0.7).abs() < 1e-6);
        }
    }

    #[test]
    fn test_extraction_partial_strength_blend() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(-0.5);

        // L=0.8, R=0.2: center 0.5, side +/-0.3; keep = 0.5
        let input = [0.8, 0.2];
        let mut output = [0.0; 2];
        proc.process_float(&input, &mut output);

        assert!((output[0] - 0.65).abs() < 1e-6);
        assert!((output[1] - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_cancellation_silences_pure_center_sine() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(1.0);

        let frames = DEFAULT_FFT_SIZE * 8;
        let input = sine_stereo(frames, 440.0, 0.5);
        let mut output = vec![0.0; input.len()];
        let produced = proc.process_float(&input, &mut output);
        assert_eq!(produced, frames);

        // Skip the startup window, then the output should be near-silent
        let steady = &output[DEFAULT_FFT_SIZE * 4..];
        let out_rms = rms(steady);
        let in_rms = rms(&input);
        assert!(in_rms > 0.3);
        assert!(
            out_rms < 0.01,
            "center content not cancelled: rms {out_rms}"
        );
    }

    #[test]
    fn test_cancellation_preserves_side_content() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(1.0);

        // Anti-phase signal: all side, no center; must survive cancellation
        let frames = DEFAULT_FFT_SIZE * 8;
        let mut input = sine_stereo(frames, 440.0, 0.5);
        for frame in input.chunks_exact_mut(2) {
            frame[1] = -frame[1];
        }
        let mut output = vec![0.0; input.len()];
        proc.process_float(&input, &mut output);

        let steady = &output[DEFAULT_FFT_SIZE * 4..];
        let out_rms = rms(steady);
        assert!(out_rms > 0.1, "side content was wrongly removed: rms {out_rms}");
    }

    #[test]
    fn test_output_frame_count_matches_input() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(1.0);

        for &frames in &[1usize, 7, 256, 1024, 5000] {
            let input = sine_stereo(frames, 330.0, 0.4);
            let mut output = vec![0.0; input.len()];
            assert_eq!(proc.process_float(&input, &mut output), frames);
        }
    }

    #[test]
    fn test_int16_round_trip_passthrough() {
        let mut proc = CenterCancelProcessor::new();
        proc.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        proc.set_amount(0.0);

        let input: Vec<i16> = (0..512).map(|i| (i * 37 % 20000) as i16 - 10000).collect();
        let mut output = vec![0i16; input.len()];
        let frames = proc.process_int16(&input, &mut output);

        assert_eq!(frames, 256);
        for (a, b) in output.iter().zip(&input) {
            // One LSB of tolerance for the 32768/32767 scaling asymmetry
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_reset_matches_fresh_processor() {
        let mut dirty = CenterCancelProcessor::new();
        dirty.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        dirty.set_amount(1.0);

        // Pollute internal state, then reset
        let noise: Vec<Sample> = (0..8192_usize)
            .map(|i| (i.wrapping_mul(2654435761) % 1000) as f32 / 500.0 - 1.0)
            .collect();
        let mut sink = vec![0.0; noise.len()];
        dirty.process_float(&noise, &mut sink);
        dirty.reset();

        let mut fresh = CenterCancelProcessor::new();
        fresh.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        fresh.set_amount(1.0);

        let input = sine_stereo(DEFAULT_FFT_SIZE * 2, 440.0, 0.5);
        let mut out_a = vec![0.0; input.len()];
        let mut out_b = vec![0.0; input.len()];
        dirty.process_float(&input, &mut out_a);
        fresh.process_float(&input, &mut out_b);

        for (a, b) in out_a.iter().zip(&out_b) {
            assert!((a - b).abs() < 1e-7);
        }
    }

    #[test]
    fn test_reset_noop_when_uninitialized() {
        let mut proc = CenterCancelProcessor::new();
        proc.reset();
        assert!(!proc.is_initialized());
    }

    #[test]
    fn test_amount_is_clamped() {
        let mut proc = CenterCancelProcessor::new();
        proc.set_amount(3.5);
        assert_eq!(proc.amount(), 1.0);
        proc.set_amount(-2.0);
        assert_eq!(proc.amount(), -1.0);
    }

    #[test]
    fn test_trait_interleaved_matches_process_float() {
        let mut a = CenterCancelProcessor::new();
        a.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        a.set_amount(0.8);
        let mut b = CenterCancelProcessor::new();
        b.init(SAMPLE_RATE, DEFAULT_FFT_SIZE);
        b.set_amount(0.8);

        let input = sine_stereo(4096, 220.0, 0.5);
        let mut via_method = vec![0.0; input.len()];
        a.process_float(&input, &mut via_method);

        let mut via_trait = input.clone();
        b.process_interleaved(&mut via_trait);

        for (x, y) in via_method.iter().zip(&via_trait) {
            assert!((x - y).abs() < 1e-7);
        }
    }
}
