//! FFT helpers built on rustfft
//!
//! Forward transforms are unnormalized, inverse transforms divide by the
//! transform length so that `ifft(fft(x)) == x`.

use num_complex::Complex64;
use rustfft::FftPlanner;

/// In-place forward FFT
pub fn fft_in_place(buffer: &mut [Complex64]) {
    if buffer.is_empty() {
        return;
    }
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(buffer);
}

/// In-place normalized inverse FFT
pub fn ifft_in_place(buffer: &mut [Complex64]) {
    if buffer.is_empty() {
        return;
    }
    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(buffer.len());
    ifft.process(buffer);

    let scale = 1.0 / buffer.len() as f64;
    for x in buffer.iter_mut() {
        *x *= scale;
    }
}

/// Cross-correlation in `valid` mode computed through the frequency domain
///
/// Returns `z[k] = sum_n signal[n + k] * conj(template[n])` for
/// `k = 0..=signal.len() - template.len()`. An empty vector is returned
/// when the template is longer than the signal or either input is empty.
pub fn correlate_valid(signal: &[Complex64], template: &[Complex64]) -> Vec<Complex64> {
    if signal.is_empty() || template.is_empty() || template.len() > signal.len() {
        return Vec::new();
    }

    let full_len = signal.len() + template.len() - 1;

    let mut a = vec![Complex64::new(0.0, 0.0); full_len];
    a[..signal.len()].copy_from_slice(signal);

    // Time-reversed conjugate turns convolution into correlation
    let mut b = vec![Complex64::new(0.0, 0.0); full_len];
    for (dst, src) in b.iter_mut().zip(template.iter().rev()) {
        *dst = src.conj();
    }

    fft_in_place(&mut a);
    fft_in_place(&mut b);
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x *= y;
    }
    ifft_in_place(&mut a);

    a[template.len() - 1..signal.len()].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn direct_correlation(signal: &[Complex64], template: &[Complex64]) -> Vec<Complex64> {
        (0..=signal.len() - template.len())
            .map(|k| {
                template
                    .iter()
                    .enumerate()
                    .map(|(n, t)| signal[n + k] * t.conj())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_fft_roundtrip() {
        let original: Vec<Complex64> = (0..37)
            .map(|i| Complex64::new((i as f64 * 0.3).sin(), (i as f64 * 0.7).cos()))
            .collect();
        let mut buffer = original.clone();
        fft_in_place(&mut buffer);
        ifft_in_place(&mut buffer);

        for (a, b) in buffer.iter().zip(original.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-12);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_correlation_matches_direct_sum() {
        let signal: Vec<Complex64> = (0..64)
            .map(|i| Complex64::new((i as f64 * 0.17).cos(), (i as f64 * 0.41).sin()))
            .collect();
        let template: Vec<Complex64> = signal[10..26].to_vec();

        let fast = correlate_valid(&signal, &template);
        let slow = direct_correlation(&signal, &template);

        assert_eq!(fast.len(), 64 - 16 + 1);
        for (k, (f, s)) in fast.iter().zip(slow.iter()).enumerate() {
            assert!((f - s).norm() < 1e-9, "Lag {} differs: {} vs {}", k, f, s);
        }
    }

    #[test]
    fn test_correlation_peak_at_offset() {
        let template: Vec<Complex64> = (0..8)
            .map(|i| Complex64::from_polar(1.0, i as f64 * i as f64 * 0.5))
            .collect();
        let mut signal = vec![Complex64::new(0.0, 0.0); 40];
        signal[13..21].copy_from_slice(&template);

        let correlation = correlate_valid(&signal, &template);
        let peak = correlation
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(idx, _)| idx);

        assert_eq!(peak, Some(13), "Correlation peak should sit at the embedding offset");
    }

    #[test]
    fn test_correlation_template_too_long() {
        let signal = vec![Complex64::new(1.0, 0.0); 4];
        let template = vec![Complex64::new(1.0, 0.0); 5];
        assert!(correlate_valid(&signal, &template).is_empty());
    }
}
