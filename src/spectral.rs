//! Time-frequency tools: Morlet continuous wavelet transform, frequency band lookup and spectral kernels.
use nalgebra::DMatrix;
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::FftPlanner;
use std::f64::consts::PI;

use crate::error::AnalysisError;

/// Tolerance used to pick the lower edge of a frequency band.
const LOWER_EDGE_TOL: f64 = 0.01;

/// Returns `num` evenly spaced values over the closed interval [start, stop].
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let delta = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| match i == num - 1 {
                    true => stop,
                    false => start + i as f64 * delta,
                })
                .collect()
        }
    }
}

fn morlet_samples(len: usize, center: f64, s: f64, w: f64) -> Vec<Complex<f64>> {
    let scale = PI.powf(-0.25) * (1.0 / s).sqrt();
    (0..len)
        .map(|i| {
            let x = (i as f64 - center) / s;
            Complex::from_polar(scale * (-0.5 * x * x).exp(), w * x)
        })
        .collect()
}

/// Complex Morlet wavelet with `m` samples, width `s` and omega0 `w`, centered on the middle sample.
pub fn morlet2(m: usize, s: f64, w: f64) -> Vec<Complex<f64>> {
    morlet_samples(m, (m as f64 - 1.0) / 2.0, s, w)
}

/// Returns the scale of the Morlet wavelet whose center frequency is `freq` (Hz), for a signal sampled at `fs` (Hz).
pub fn morlet_width(freq: f64, fs: f64, w: f64) -> f64 {
    w * fs / (2.0 * freq * PI)
}

fn check_cwt_inputs(data: &[f64], widths: &[f64]) -> Result<(), AnalysisError> {
    if data.is_empty() {
        return Err(AnalysisError::InvalidParameter(
            "Cannot transform an empty signal.".to_string(),
        ));
    }
    if let Some(width) = widths.iter().find(|width| !(**width > 0.0)) {
        return Err(AnalysisError::InvalidParameter(format!(
            "Wavelet widths must be positive, got {}.",
            width
        )));
    }
    Ok(())
}

/// Convolve the signal with the (conjugated, time-reversed) Morlet wavelet of every width.
/// The wavelet of width `s` spans `min(10 s, n)` samples and the output keeps the `n` central samples of the full convolution.
fn morlet_convolutions(data: &[f64], widths: &[f64], w: f64) -> Vec<Vec<Complex<f64>>> {
    let n = data.len();
    let points = |width: f64| (10.0 * width).min(n as f64);
    let max_len = widths
        .iter()
        .map(|width| points(*width).ceil() as usize)
        .max()
        .unwrap_or(1);
    let fft_len = (n + max_len - 1).next_power_of_two();

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);

    let mut data_fft: Vec<Complex<f64>> = data
        .iter()
        .map(|x| Complex::new(*x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();
    forward.process(&mut data_fft);

    widths
        .par_iter()
        .map(|width| {
            let m = points(*width);
            let len = m.ceil() as usize;
            let wavelet = morlet_samples(len, (m - 1.0) / 2.0, *width, w);

            let mut buffer: Vec<Complex<f64>> = wavelet
                .iter()
                .rev()
                .map(|value| value.conj())
                .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
                .take(fft_len)
                .collect();
            forward.process(&mut buffer);
            buffer
                .iter_mut()
                .zip(data_fft.iter())
                .for_each(|(value, x)| *value *= *x);
            inverse.process(&mut buffer);

            let offset = (len - 1) / 2;
            buffer[offset..offset + n]
                .iter()
                .map(|value| *value / fft_len as f64)
                .collect()
        })
        .collect()
}

/// Continuous wavelet transform of the signal with the complex Morlet wavelet.
/// Returns a matrix with one row per width and one column per sample.
pub fn cwt(data: &[f64], widths: &[f64], w: f64) -> Result<DMatrix<Complex<f64>>, AnalysisError> {
    check_cwt_inputs(data, widths)?;
    let rows = morlet_convolutions(data, widths, w);
    Ok(DMatrix::from_fn(widths.len(), data.len(), |i, j| rows[i][j]))
}

/// Sum over time of the magnitude of the Morlet wavelet transform, for every width.
pub fn cwt_power(data: &[f64], widths: &[f64], w: f64) -> Result<Vec<f64>, AnalysisError> {
    check_cwt_inputs(data, widths)?;
    Ok(morlet_convolutions(data, widths, w)
        .into_iter()
        .map(|row| row.iter().map(|value| value.norm()).sum())
        .collect())
}

/// Returns the index range `[lower, upper)` of the frequencies covering the band.
/// The lower edge is the first frequency (almost) closest to the band start, the upper one the first frequency closest to the band end.
pub fn band_indices(freqs: &[f64], band: (f64, f64)) -> Result<(usize, usize), AnalysisError> {
    let closest = |target: f64, tol: f64| -> Option<usize> {
        let distances: Vec<f64> = freqs.iter().map(|f| (f - target).abs()).collect();
        let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
        distances.iter().position(|d| *d <= min + tol)
    };

    match (closest(band.0, LOWER_EDGE_TOL), closest(band.1, 0.0)) {
        (Some(lower), Some(upper)) if lower <= upper => Ok((lower, upper + 1)),
        _ => Err(AnalysisError::InvalidParameter(format!(
            "The band [{}, {}] selects no frequency.",
            band.0, band.1
        ))),
    }
}

/// Gaussian with mean `mu` and standard deviation `sig` evaluated at `x`, normalized to sum to one.
pub fn gaussian(x: &[f64], mu: f64, sig: f64) -> Result<Vec<f64>, AnalysisError> {
    if !(sig > 0.0) {
        return Err(AnalysisError::InvalidParameter(format!(
            "The standard deviation must be positive, got {}.",
            sig
        )));
    }
    let g: Vec<f64> = x
        .iter()
        .map(|xi| 1.0 / ((2.0 * PI).sqrt() * sig) * (-((xi - mu) / sig).powi(2) / 2.0).exp())
        .collect();
    normalize(g)
}

/// Rectangular window of the given width centered at `center`, evaluated at `x`, normalized to sum to one.
pub fn rectangular(x: &[f64], center: f64, width: f64) -> Result<Vec<f64>, AnalysisError> {
    let y: Vec<f64> = x
        .iter()
        .map(|xi| {
            if *xi < center - width / 2.0 || *xi > center + width / 2.0 {
                0.0
            } else {
                1.0
            }
        })
        .collect();
    normalize(y)
}

fn normalize(values: Vec<f64>) -> Result<Vec<f64>, AnalysisError> {
    let sum: f64 = values.iter().sum();
    if !(sum > 0.0) {
        return Err(AnalysisError::EmptyWindow(
            "The kernel vanishes on every sample.".to_string(),
        ));
    }
    Ok(values.into_iter().map(|value| value / sum).collect())
}

/// For every channel (column) of the spectra, the minimum within the band multiplied by the frequency where it is reached.
pub fn hyperbolic_interpolation(
    spectra: &DMatrix<f64>,
    freqs: &[f64],
    band: (f64, f64),
) -> Result<Vec<f64>, AnalysisError> {
    if spectra.nrows() != freqs.len() {
        return Err(AnalysisError::IncompatibleShapes(format!(
            "Got {} frequencies for spectra with {} rows.",
            freqs.len(),
            spectra.nrows()
        )));
    }
    let (lower, upper) = band_indices(freqs, band)?;

    Ok(spectra
        .column_iter()
        .map(|column| {
            let (pos, min) = (lower..upper)
                .map(|i| (i, column[i]))
                .fold((lower, f64::INFINITY), |acc, (i, value)| match value < acc.1 {
                    true => (i, value),
                    false => acc,
                });
            min * freqs[pos]
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Direct evaluation of the "same" convolution with the conjugated, reversed wavelet.
    fn direct_cwt_row(data: &[f64], width: f64, w: f64) -> Vec<Complex<f64>> {
        let n = data.len();
        let m = (10.0 * width).min(n as f64);
        let len = m.ceil() as usize;
        let wavelet = morlet_samples(len, (m - 1.0) / 2.0, width, w);
        let kernel: Vec<Complex<f64>> = wavelet.iter().rev().map(|v| v.conj()).collect();
        let offset = (len - 1) / 2;
        (0..n)
            .map(|i| {
                let full_index = i + offset;
                (0..n)
                    .filter(|j| full_index >= *j && full_index - j < len)
                    .map(|j| kernel[full_index - j] * data[j])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(2.0, 3.0, 0).is_empty());
        let freqs = linspace(17.0, 500.0, 968);
        assert_eq!(freqs.len(), 968);
        assert_eq!(freqs[967], 500.0);
    }

    #[test]
    fn test_morlet2() {
        let wavelet = morlet2(11, 2.0, 5.0);
        assert_eq!(wavelet.len(), 11);
        // real and peaked at the center
        assert_relative_eq!(wavelet[5].im, 0.0);
        assert_relative_eq!(wavelet[5].re, PI.powf(-0.25) * 0.5_f64.sqrt());
        // symmetric magnitude, conjugate phase
        assert_relative_eq!(wavelet[2].re, wavelet[8].re, epsilon = 1e-12);
        assert_relative_eq!(wavelet[2].im, -wavelet[8].im, epsilon = 1e-12);
    }

    #[test]
    fn test_cwt_matches_direct_convolution() {
        let data: Vec<f64> = (0..60)
            .map(|i| (i as f64 * 0.3).sin() + 0.1 * (i % 7) as f64)
            .collect();
        let widths = [0.8, 1.0, 2.5, 7.3];
        let coefs = cwt(&data, &widths, 6.0).unwrap();
        assert_eq!(coefs.shape(), (4, 60));

        for (row, width) in widths.iter().enumerate() {
            let expected = direct_cwt_row(&data, *width, 6.0);
            for (col, value) in expected.iter().enumerate() {
                assert_relative_eq!(coefs[(row, col)].re, value.re, epsilon = 1e-9);
                assert_relative_eq!(coefs[(row, col)].im, value.im, epsilon = 1e-9);
            }
        }

        let power = cwt_power(&data, &widths, 6.0).unwrap();
        for (row, value) in power.iter().enumerate() {
            assert_relative_eq!(
                *value,
                coefs.row(row).iter().map(|c| c.norm()).sum::<f64>(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_cwt_tone() {
        let fs = 1000.0;
        let data: Vec<f64> = (0..1000)
            .map(|i| (2.0 * PI * 40.0 * i as f64 / fs).sin())
            .collect();
        let freqs = linspace(17.0, 500.0, 968);
        let widths: Vec<f64> = freqs.iter().map(|f| morlet_width(*f, fs, 15.0)).collect();
        let power = cwt_power(&data, &widths, 15.0).unwrap();

        let (argmax, _) = power
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, p)| match *p > acc.1 {
                true => (i, *p),
                false => acc,
            });
        assert!((freqs[argmax] - 40.0).abs() < 2.0);
    }

    #[test]
    fn test_cwt_invalid_inputs() {
        assert!(cwt(&[], &[1.0], 6.0).is_err());
        assert!(cwt_power(&[1.0, 2.0], &[0.0], 6.0).is_err());
        assert!(cwt_power(&[1.0, 2.0], &[f64::NAN], 6.0).is_err());
    }

    #[test]
    fn test_band_indices() {
        let freqs = linspace(17.0, 27.0, 21);
        // freqs are 17.0, 17.5, ..., 27.0
        assert_eq!(band_indices(&freqs, (20.0, 22.0)).unwrap(), (6, 11));
        assert_eq!(band_indices(&freqs, (20.2, 21.9)).unwrap(), (6, 11));
        assert_eq!(band_indices(&freqs, (0.0, 100.0)).unwrap(), (0, 21));
        assert!(band_indices(&freqs, (25.0, 20.0)).is_err());
        assert!(band_indices(&[], (20.0, 22.0)).is_err());
    }

    #[test]
    fn test_kernels() {
        let x = linspace(-10.0, 10.0, 21);
        let kernel = gaussian(&x, 0.0, 2.0).unwrap();
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(kernel[8], kernel[12], epsilon = 1e-15);
        assert!(kernel[10] > kernel[11]);
        assert!(gaussian(&x, 0.0, 0.0).is_err());

        let rect = rectangular(&x, 2.0, 4.0).unwrap();
        assert_eq!(rect.iter().filter(|v| **v > 0.0).count(), 5);
        assert_relative_eq!(rect[12], 0.2);
        assert!(rectangular(&x, 100.0, 1.0).is_err());
    }

    #[test]
    fn test_hyperbolic_interpolation() {
        let freqs = vec![10.0, 20.0, 30.0, 40.0];
        let spectra = DMatrix::from_row_slice(4, 2, &[1.0, 9.0, 4.0, 3.0, 2.0, 5.0, 0.5, 6.0]);
        let values = hyperbolic_interpolation(&spectra, &freqs, (20.0, 40.0)).unwrap();
        assert_relative_eq!(values[0], 0.5 * 40.0);
        assert_relative_eq!(values[1], 3.0 * 20.0);

        assert!(hyperbolic_interpolation(&spectra, &freqs[..3], (20.0, 40.0)).is_err());
    }
}
