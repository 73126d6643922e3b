//! Audio file reading
//!
//! Decode-once, fully-into-memory reading for impulse responses. WAV goes
//! through hound; every other supported format goes through the symphonia
//! probe/decode loop.

use std::fs::File;
use std::path::Path;

use aria_core::Sample;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{FileError, FileResult};

// ============ Format detection ============

/// Audio file format, guessed from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Flac,
    Mp3,
    Ogg,
    Aac,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "wav" | "wave" => Self::Wav,
            "flac" => Self::Flac,
            "mp3" => Self::Mp3,
            "ogg" | "oga" => Self::Ogg,
            "aac" | "m4a" | "mp4" => Self::Aac,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }
}

/// Bit depth of the source file's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Int8,
    Int16,
    Int24,
    Int32,
    Float32,
}

// ============ Decoded audio container ============

/// Fully decoded audio data, one `Vec` per channel
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Deinterleaved samples
    pub channels: Vec<Vec<Sample>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bit depth of the source file
    pub bit_depth: BitDepth,
    /// Source format
    pub format: AudioFormat,
}

impl AudioData {
    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames
    pub fn num_frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Get as interleaved samples
    pub fn to_interleaved(&self) -> Vec<Sample> {
        let frames = self.num_frames();
        let channels = self.num_channels();
        let mut interleaved = Vec::with_capacity(frames * channels);

        for i in 0..frames {
            for ch in &self.channels {
                interleaved.push(ch[i]);
            }
        }

        interleaved
    }

    /// Create from interleaved samples
    pub fn from_interleaved(samples: &[Sample], num_channels: usize, sample_rate: u32) -> Self {
        let num_frames = if num_channels == 0 {
            0
        } else {
            samples.len() / num_channels
        };
        let mut channels = vec![vec![0.0; num_frames]; num_channels];

        for (i, chunk) in samples.chunks(num_channels.max(1)).enumerate() {
            for (ch, &sample) in chunk.iter().enumerate() {
                channels[ch][i] = sample;
            }
        }

        Self {
            channels,
            sample_rate,
            bit_depth: BitDepth::Float32,
            format: AudioFormat::Unknown,
        }
    }

    /// Left/right channel pair; a mono file is duplicated to both sides
    pub fn to_stereo_pair(&self) -> (Vec<Sample>, Vec<Sample>) {
        match self.channels.len() {
            0 => (Vec::new(), Vec::new()),
            1 => (self.channels[0].clone(), self.channels[0].clone()),
            _ => (self.channels[0].clone(), self.channels[1].clone()),
        }
    }
}

// ============ WAV reading (hound) ============

/// Read a WAV file using hound
pub fn read_wav<P: AsRef<Path>>(path: P) -> FileResult<AudioData> {
    let reader = hound::WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let num_channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;
    let bit_depth = match (spec.bits_per_sample, spec.sample_format) {
        (8, _) => BitDepth::Int8,
        (16, _) => BitDepth::Int16,
        (24, _) => BitDepth::Int24,
        (32, hound::SampleFormat::Int) => BitDepth::Int32,
        (32, hound::SampleFormat::Float) => BitDepth::Float32,
        _ => BitDepth::Int16,
    };

    // Read all samples as f32
    let samples: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.unwrap_or(0.0))
            .collect(),
        hound::SampleFormat::Int => {
            let max_value = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.unwrap_or(0) as f32 / max_value)
                .collect()
        }
    };

    if num_channels == 0 || samples.is_empty() {
        return Err(FileError::InvalidFile(
            path.as_ref().display().to_string(),
        ));
    }

    let mut data = AudioData::from_interleaved(&samples, num_channels, sample_rate);
    data.bit_depth = bit_depth;
    data.format = AudioFormat::Wav;
    Ok(data)
}

// ============ Symphonia reading (FLAC, MP3, OGG, AAC) ============

/// Read an audio file, dispatching on format
///
/// WAV goes through hound (faster); everything else through symphonia.
pub fn read_audio<P: AsRef<Path>>(path: P) -> FileResult<AudioData> {
    let path = path.as_ref();
    let format = AudioFormat::from_path(path);

    if format == AudioFormat::Wav {
        return read_wav(path);
    }

    let file =
        File::open(path).map_err(|_| FileError::NotFound(path.display().to_string()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| FileError::DecodeError(e.to_string()))?;

    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| FileError::InvalidFile("no audio track found".to_string()))?;

    let track_id = track.id;
    let num_channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| FileError::DecodeError(e.to_string()))?;

    let mut channels: Vec<Vec<Sample>> = vec![Vec::new(); num_channels];

    loop {
        match format_reader.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }

                match decoder.decode(&packet) {
                    Ok(decoded) => copy_audio_buffer(&decoded, &mut channels),
                    // Recoverable per-packet corruption: skip the packet
                    Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                    Err(e) => return Err(FileError::DecodeError(e.to_string())),
                }
            }
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(FileError::DecodeError(e.to_string())),
        }
    }

    if channels.iter().all(|c| c.is_empty()) {
        return Err(FileError::InvalidFile(path.display().to_string()));
    }

    log::debug!(
        "decoded {}: {} ch, {} Hz, {} frames",
        path.display(),
        channels.len(),
        sample_rate,
        channels.first().map(|c| c.len()).unwrap_or(0)
    );

    Ok(AudioData {
        channels,
        sample_rate,
        bit_depth: BitDepth::Float32,
        format,
    })
}

/// Copy samples from a symphonia buffer, converting to f32
fn copy_audio_buffer(buffer: &AudioBufferRef, output: &mut [Vec<Sample>]) {
    macro_rules! copy_planes {
        ($buf:expr, $convert:expr) => {
            for (ch, out_ch) in output.iter_mut().enumerate() {
                if ch < $buf.spec().channels.count() {
                    out_ch.extend($buf.chan(ch).iter().map($convert));
                }
            }
        };
    }

    match buffer {
        AudioBufferRef::F32(buf) => copy_planes!(buf, |&s| s),
        AudioBufferRef::F64(buf) => copy_planes!(buf, |&s| s as f32),
        AudioBufferRef::S8(buf) => copy_planes!(buf, |&s| s as f32 / 128.0),
        AudioBufferRef::S16(buf) => copy_planes!(buf, |&s| s as f32 / 32768.0),
        AudioBufferRef::S24(buf) => copy_planes!(buf, |s| s.0 as f32 / 8388608.0),
        AudioBufferRef::S32(buf) => copy_planes!(buf, |&s| s as f32 / 2147483648.0),
        AudioBufferRef::U8(buf) => copy_planes!(buf, |&s| (s as f32 - 128.0) / 128.0),
        AudioBufferRef::U16(buf) => copy_planes!(buf, |&s| (s as f32 - 32768.0) / 32768.0),
        AudioBufferRef::U24(buf) => {
            copy_planes!(buf, |s| (s.0 as f32 - 8388608.0) / 8388608.0)
        }
        AudioBufferRef::U32(buf) => {
            copy_planes!(buf, |&s| (s as f32 - 2147483648.0) / 2147483648.0)
        }
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("wav"), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_extension("FLAC"), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_extension("mp3"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_extension("ogg"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_extension("m4a"), AudioFormat::Aac);
        assert_eq!(AudioFormat::from_extension("xyz"), AudioFormat::Unknown);
    }

    #[test]
    fn test_interleave_deinterleave() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let data = AudioData::from_interleaved(&interleaved, 2, 48000);

        assert_eq!(data.num_channels(), 2);
        assert_eq!(data.num_frames(), 3);
        assert_eq!(data.channels[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(data.channels[1], vec![2.0, 4.0, 6.0]);

        let back = data.to_interleaved();
        assert_eq!(back, interleaved);
    }

    #[test]
    fn test_mono_duplicated_to_stereo_pair() {
        let data = AudioData::from_interleaved(&[0.1, 0.2, 0.3], 1, 44100);
        let (l, r) = data.to_stereo_pair();
        assert_eq!(l, vec![0.1, 0.2, 0.3]);
        assert_eq!(l, r);
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ir.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let samples = [0.5_f32, -0.5, 0.25, -0.25, 1.0, -1.0];
        for &s in &samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let data = read_audio(&path).unwrap();
        assert_eq!(data.sample_rate, 48000);
        assert_eq!(data.num_channels(), 2);
        assert_eq!(data.num_frames(), 3);
        assert_eq!(data.format, AudioFormat::Wav);

        let back = data.to_interleaved();
        for (a, b) in back.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_wav_int16_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ir16.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384_i16).unwrap();
        writer.write_sample(-32768_i16).unwrap();
        writer.finalize().unwrap();

        let data = read_wav(&path).unwrap();
        assert_eq!(data.bit_depth, BitDepth::Int16);
        assert!((data.channels[0][0] - 0.5).abs() < 1e-4);
        assert!((data.channels[0][1] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_file() {
        let err = read_audio("/nonexistent/ir.flac").unwrap_err();
        assert!(matches!(err, FileError::NotFound(_)));
    }
}
