//! Shared FFT kernel
//!
//! In-place iterative radix-2 Cooley-Tukey complex FFT/IFFT, used by both
//! the center-channel processor and the convolution reverb. Stateless; the
//! caller guarantees the buffer length is an exact power of two.

use rustfft::num_complex::Complex;

use aria_core::Sample;

/// In-place FFT (`inverse = false`) or IFFT (`inverse = true`).
///
/// Forward twiddle angle is `-2*pi/len`, inverse is `+2*pi/len`; the sign
/// convention must match between analysis and synthesis. The inverse
/// transform scales every sample by `1/n`.
pub fn fft(data: &mut [Complex<Sample>], inverse: bool) {
    let n = data.len();
    debug_assert!(n.is_power_of_two(), "FFT size must be a power of two");
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            data.swap(i, j);
        }
    }

    // Butterfly passes, len doubling from 2 to n
    let mut len = 2;
    while len <= n {
        let angle = if inverse {
            2.0 * std::f32::consts::PI / len as Sample
        } else {
            -2.0 * std::f32::consts::PI / len as Sample
        };
        let w_len = Complex::new(angle.cos(), angle.sin());

        for start in (0..n).step_by(len) {
            let mut w = Complex::new(1.0, 0.0);
            for k in 0..len / 2 {
                let u = data[start + k];
                let v = data[start + k + len / 2] * w;
                data[start + k] = u + v;
                data[start + k + len / 2] = u - v;
                w *= w_len;
            }
        }
        len <<= 1;
    }

    if inverse {
        let scale = 1.0 / n as Sample;
        for x in data.iter_mut() {
            *x *= scale;
        }
    }
}
