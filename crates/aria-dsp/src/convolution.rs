//! Convolution reverb
//!
//! Uniform partitioned convolution via a frequency delay line (FDL): the
//! impulse response is split into fixed-size blocks that are FFT'd once at
//! load time, and live input is convolved against all of them in the
//! frequency domain. Per-block cost is O(num_partitions * fft_size) and
//! added latency is one block, independent of IR length.

use std::path::{Path, PathBuf};

use rustfft::num_complex::Complex;

use aria_core::{db_to_linear, Sample};

use crate::fft::fft;
use crate::params::ReverbParams;
use crate::{Processor, StereoProcessor};

/// Partition length in samples; also the pipeline latency
pub const BLOCK_SIZE: usize = 1024;

/// FFT length: 2x block size, the zero-padding overlap-save requires
pub const FFT_SIZE: usize = BLOCK_SIZE * 2;

/// Convolution reverb processor
///
/// Lazily constructed once and reused across IR loads. `load_ir*` and
/// `init` are independent: the session sample rate can change without
/// reloading the IR, and vice versa. An IR load always forces a fresh
/// `init` before the processor becomes active again.
pub struct ConvolutionReverb {
    /// Per-partition IR spectra, computed once at load
    ir_spectrum_l: Vec<Vec<Complex<Sample>>>,
    ir_spectrum_r: Vec<Vec<Complex<Sample>>>,
    num_partitions: usize,

    /// Frequency delay line: spectra of the last `num_partitions` input blocks
    fdl_l: Vec<Vec<Complex<Sample>>>,
    fdl_r: Vec<Vec<Complex<Sample>>>,
    /// Current FDL write index
    fdl_pos: usize,

    // Input accumulation buffers, fills to BLOCK_SIZE
    input_l: Vec<Sample>,
    input_r: Vec<Sample>,
    input_pos: usize,

    // Output accumulator: [0..BLOCK_SIZE) readable wet samples,
    // [BLOCK_SIZE..FFT_SIZE) the tail carried into the next block
    output_l: Vec<Sample>,
    output_r: Vec<Sample>,

    // FFT work buffers
    scratch_l: Vec<Complex<Sample>>,
    scratch_r: Vec<Complex<Sample>>,
    accum_l: Vec<Complex<Sample>>,
    accum_r: Vec<Complex<Sample>>,

    /// Wet mix in percent, 0..100
    mix: Sample,
    /// Wet gain in dB
    gain_db: Sample,

    sample_rate: u32,
    ir_path: Option<PathBuf>,
    ir_sample_rate: u32,
    ir_channels: usize,
    /// IR length in samples before padding
    ir_samples: usize,

    ir_loaded: bool,
    initialized: bool,
}

impl Default for ConvolutionReverb {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvolutionReverb {
    pub fn new() -> Self {
        Self {
            ir_spectrum_l: Vec::new(),
            ir_spectrum_r: Vec::new(),
            num_partitions: 0,
            fdl_l: Vec::new(),
            fdl_r: Vec::new(),
            fdl_pos: 0,
            input_l: Vec::new(),
            input_r: Vec::new(),
            input_pos: 0,
            output_l: Vec::new(),
            output_r: Vec::new(),
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
            accum_l: Vec::new(),
            accum_r: Vec::new(),
            mix: 50.0,
            gain_db: 0.0,
            sample_rate: 0,
            ir_path: None,
            ir_sample_rate: 0,
            ir_channels: 0,
            ir_samples: 0,
            ir_loaded: false,
            initialized: false,
        }
    }

    /// Load a decoded impulse response from interleaved float samples.
    ///
    /// Mono IRs are duplicated to both channels. Returns false on zero
    /// length. Forces `initialized = false`; call [`init`](Self::init)
    /// before processing resumes.
    pub fn load_ir(&mut self, samples: &[Sample], channels: usize, sample_rate: u32) -> bool {
        if channels == 0 || samples.len() < channels {
            log::warn!("IR rejected: empty or channel-less data");
            return false;
        }

        let frames = samples.len() / channels;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in samples.chunks_exact(channels) {
            left.push(frame[0]);
            right.push(if channels > 1 { frame[1] } else { frame[0] });
        }

        self.ir_path = None;
        self.ir_channels = channels;
        self.partition_ir(&left, &right, sample_rate)
    }

    /// Decode an IR audio file and load it.
    ///
    /// Returns false if the file cannot be decoded or yields zero samples;
    /// the processor then stays inert until a valid IR is supplied.
    pub fn load_ir_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let path = path.as_ref();
        let data = match aria_file::read_audio(path) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("failed to load IR {}: {e}", path.display());
                return false;
            }
        };

        if data.num_frames() == 0 {
            log::warn!("IR {} decoded to zero samples", path.display());
            return false;
        }

        let (left, right) = data.to_stereo_pair();
        self.ir_channels = data.num_channels();
        let ok = self.partition_ir(&left, &right, data.sample_rate);
        if ok {
            self.ir_path = Some(path.to_path_buf());
            log::info!(
                "loaded IR {}: {} partitions, {:.0} ms",
                path.display(),
                self.num_partitions,
                self.ir_length_ms()
            );
        }
        ok
    }

    /// Split the IR into BLOCK_SIZE partitions, zero-pad each to FFT_SIZE
    /// and transform once. The spectra are immutable until the next load.
    fn partition_ir(&mut self, left: &[Sample], right: &[Sample], sample_rate: u32) -> bool {
        let ir_len = left.len().max(right.len());
        if ir_len == 0 {
            return false;
        }

        let num_partitions = ir_len.div_ceil(BLOCK_SIZE);

        self.ir_spectrum_l.clear();
        self.ir_spectrum_r.clear();

        for p in 0..num_partitions {
            let start = p * BLOCK_SIZE;

            let mut spec_l = vec![Complex::new(0.0, 0.0); FFT_SIZE];
            for (j, &s) in left.iter().skip(start).take(BLOCK_SIZE).enumerate() {
                spec_l[j] = Complex::new(s, 0.0);
            }
            fft(&mut spec_l, false);
            self.ir_spectrum_l.push(spec_l);

            let mut spec_r = vec![Complex::new(0.0, 0.0); FFT_SIZE];
            for (j, &s) in right.iter().skip(start).take(BLOCK_SIZE).enumerate() {
                spec_r[j] = Complex::new(s, 0.0);
            }
            fft(&mut spec_r, false);
            self.ir_spectrum_r.push(spec_r);
        }

        self.num_partitions = num_partitions;
        self.ir_samples = ir_len;
        self.ir_sample_rate = sample_rate;
        self.ir_loaded = true;
        // The FDL depth depends on the partition count, so any previous
        // init is stale now
        self.initialized = false;
        true
    }

    /// Allocate the FDL and streaming buffers for the current IR.
    /// Always succeeds; with no IR loaded the processor stays inert.
    pub fn init(&mut self, sample_rate: u32) -> bool {
        self.sample_rate = sample_rate;

        self.fdl_l = vec![vec![Complex::new(0.0, 0.0); FFT_SIZE]; self.num_partitions];
        self.fdl_r = vec![vec![Complex::new(0.0, 0.0); FFT_SIZE]; self.num_partitions];
        self.fdl_pos = 0;

        self.input_l = vec![0.0; FFT_SIZE];
        self.input_r = vec![0.0; FFT_SIZE];
        self.input_pos = 0;

        self.output_l = vec![0.0; FFT_SIZE];
        self.output_r = vec![0.0; FFT_SIZE];

        self.scratch_l = vec![Complex::new(0.0, 0.0); FFT_SIZE];
        self.scratch_r = vec![Complex::new(0.0, 0.0); FFT_SIZE];
        self.accum_l = vec![Complex::new(0.0, 0.0); FFT_SIZE];
        self.accum_r = vec![Complex::new(0.0, 0.0); FFT_SIZE];

        self.initialized = true;
        log::debug!(
            "convolution reverb init: {sample_rate} Hz, {} partitions",
            self.num_partitions
        );
        true
    }

    /// Zero streaming state without reallocating or touching the IR spectra.
    pub fn reset(&mut self) {
        for slot in self.fdl_l.iter_mut().chain(self.fdl_r.iter_mut()) {
            slot.fill(Complex::new(0.0, 0.0));
        }
        self.fdl_pos = 0;
        self.input_l.fill(0.0);
        self.input_r.fill(0.0);
        self.input_pos = 0;
        self.output_l.fill(0.0);
        self.output_r.fill(0.0);
    }

    /// Wet mix in percent, clamped to 0..100. Single f32 write, safe from a
    /// UI thread.
    pub fn set_mix(&mut self, percent: Sample) {
        self.mix = percent.clamp(0.0, 100.0);
    }

    pub fn mix(&self) -> Sample {
        self.mix
    }

    /// Wet gain in dB. Single f32 write, safe from a UI thread.
    pub fn set_gain(&mut self, db: Sample) {
        self.gain_db = db;
    }

    pub fn gain(&self) -> Sample {
        self.gain_db
    }

    pub fn is_loaded(&self) -> bool {
        self.ir_loaded
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn ir_path(&self) -> Option<&Path> {
        self.ir_path.as_deref()
    }

    /// Session sample rate from the last `init`
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn ir_sample_rate(&self) -> u32 {
        self.ir_sample_rate
    }

    pub fn ir_channels(&self) -> usize {
        self.ir_channels
    }

    /// IR length in milliseconds at its native sample rate
    pub fn ir_length_ms(&self) -> f32 {
        if self.ir_sample_rate == 0 {
            return 0.0;
        }
        self.ir_samples as f32 / self.ir_sample_rate as f32 * 1000.0
    }

    pub fn apply_params(&mut self, params: &ReverbParams) {
        self.set_mix(params.mix);
        self.set_gain(params.gain_db);
        if let Some(path) = &params.ir_path {
            if self.ir_path.as_deref() != Some(path.as_path()) {
                self.load_ir_file(path);
            }
        }
    }

    pub fn params(&self) -> ReverbParams {
        ReverbParams {
            mix: self.mix,
            gain_db: self.gain_db,
            ir_path: self.ir_path.clone(),
        }
    }

    fn is_active(&self) -> bool {
        self.initialized && self.ir_loaded && self.num_partitions > 0
    }

    /// Process an interleaved stereo buffer in place. Frames in equals
    /// frames out; block boundaries are invisible to the caller. No-op
    /// passthrough until an IR is loaded and `init` has been called.
    pub fn process(&mut self, buffer: &mut [Sample]) {
        if !self.is_active() {
            return;
        }

        // Parameters are read once per call; setters may race benignly
        let wet_mix = self.mix / 100.0;
        let dry_mix = 1.0 - wet_mix;
        let gain = db_to_linear(self.gain_db);

        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.step(frame[0], frame[1], gain, wet_mix, dry_mix);
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// One sample through the pipeline. The output accumulator already
    /// holds the previous block's convolution result while input for the
    /// current block is being collected, so the wet read is always valid.
    #[inline]
    fn step(
        &mut self,
        dry_l: Sample,
        dry_r: Sample,
        gain: Sample,
        wet_mix: Sample,
        dry_mix: Sample,
    ) -> (Sample, Sample) {
        let wet_l = self.output_l[self.input_pos] * gain;
        let wet_r = self.output_r[self.input_pos] * gain;

        self.input_l[self.input_pos] = dry_l;
        self.input_r[self.input_pos] = dry_r;
        self.input_pos += 1;

        if self.input_pos == BLOCK_SIZE {
            self.process_block();
            self.input_pos = 0;
        }

        (
            dry_l * dry_mix + wet_l * wet_mix,
            dry_r * dry_mix + wet_r * wet_mix,
        )
    }

    /// Convolve the just-filled input block against every IR partition via
    /// the FDL, then fold the result into the output accumulator.
    fn process_block(&mut self) {
        let partitions = self.num_partitions;

        // Zero-padded forward transform of the new input block
        for i in 0..BLOCK_SIZE {
            self.scratch_l[i] = Complex::new(self.input_l[i], 0.0);
            self.scratch_r[i] = Complex::new(self.input_r[i], 0.0);
        }
        for i in BLOCK_SIZE..FFT_SIZE {
            self.scratch_l[i] = Complex::new(0.0, 0.0);
            self.scratch_r[i] = Complex::new(0.0, 0.0);
        }
        fft(&mut self.scratch_l, false);
        fft(&mut self.scratch_r, false);

        // Overwrites the entry exactly num_partitions blocks old
        self.fdl_l[self.fdl_pos].copy_from_slice(&self.scratch_l);
        self.fdl_r[self.fdl_pos].copy_from_slice(&self.scratch_r);

        // Sum over partitions: IR partition p times the input block that is
        // p blocks old. This distributes one linear convolution across the
        // FDL history.
        self.accum_l.fill(Complex::new(0.0, 0.0));
        self.accum_r.fill(Complex::new(0.0, 0.0));

        for p in 0..partitions {
            let idx = (self.fdl_pos + partitions - p) % partitions;
            let ir_l = &self.ir_spectrum_l[p];
            let ir_r = &self.ir_spectrum_r[p];
            let in_l = &self.fdl_l[idx];
            let in_r = &self.fdl_r[idx];

            for i in 0..FFT_SIZE {
                self.accum_l[i] += in_l[i] * ir_l[i];
                self.accum_r[i] += in_r[i] * ir_r[i];
            }
        }

        fft(&mut self.accum_l, true);
        fft(&mut self.accum_r, true);

        // First half: new head plus the tail carried from the previous
        // block. Second half: this block's tail, next block's carry.
        for i in 0..BLOCK_SIZE {
            self.output_l[i] = self.output_l[BLOCK_SIZE + i] + self.accum_l[i].re;
            self.output_r[i] = self.output_r[BLOCK_SIZE + i] + self.accum_r[i].re;
        }
        for i in 0..BLOCK_SIZE {
            self.output_l[BLOCK_SIZE + i] = self.accum_l[BLOCK_SIZE + i].re;
            self.output_r[BLOCK_SIZE + i] = self.accum_r[BLOCK_SIZE + i].re;
        }

        self.fdl_pos = (self.fdl_pos + 1) % partitions;
    }
}

impl Processor for ConvolutionReverb {
    fn reset(&mut self) {
        ConvolutionReverb::reset(self);
    }

    fn latency(&self) -> usize {
        BLOCK_SIZE
    }
}

impl StereoProcessor for ConvolutionReverb {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        if !self.is_active() {
            return (left, right);
        }
        let wet_mix = self.mix / 100.0;
        let dry_mix = 1.0 - wet_mix;
        let gain = db_to_linear(self.gain_db);
        self.step(left, right, gain, wet_mix, dry_mix)
    }
}
