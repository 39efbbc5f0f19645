//! Post-processing of averaged magnitude spectra: amplitude rescale, peak
//! search, sub-range analysis and bin/frequency mapping.

use super::ProcessingError;
use crate::types::{DcBinPolicy, SpectralPeak};

/// Convert an averaged raw FFT magnitude into engineering units in place.
///
/// `mag_size` is the full one-sided length (`fft_size / 2`) and stays the
/// divisor even when only the usable-bandwidth prefix is passed in `bins`.
pub fn rescale(bins: &mut [f32], mag_size: usize, window_scale: f32, policy: DcBinPolicy) {
    let Some((dc, rest)) = bins.split_first_mut() else {
        return;
    };
    let size = mag_size as f32;
    *dc = match policy {
        DcBinPolicy::Halved => *dc / (2.0 * size) * window_scale,
        DcBinPolicy::Zeroed => 0.0,
    };
    for m in rest {
        *m = *m * window_scale / size;
    }
}

/// Global maximum; ties resolve to the lowest bin.
pub fn find_peak(bins: &[f32]) -> Option<SpectralPeak> {
    let (&first, rest) = bins.split_first()?;
    let mut peak = SpectralPeak {
        value: first,
        bin: 0,
    };
    for (i, &v) in rest.iter().enumerate() {
        if v > peak.value {
            peak = SpectralPeak { value: v, bin: i + 1 };
        }
    }
    Some(peak)
}

/// Split `bins` into `count` equal-width contiguous ranges and return the
/// maximum of each, with absolute bin indices.
///
/// Trailing bins that do not fill a whole range are not searched.
pub fn subrange_peaks(bins: &[f32], count: usize) -> Result<Vec<SpectralPeak>, ProcessingError> {
    let width = if count == 0 { 0 } else { bins.len() / count };
    if width == 0 {
        return Err(ProcessingError::InvalidSubrangeCount {
            count,
            bins: bins.len(),
        });
    }

    Ok(bins
        .chunks_exact(width)
        .take(count)
        .enumerate()
        .filter_map(|(k, chunk)| {
            find_peak(chunk).map(|p| SpectralPeak {
                value: p.value,
                bin: k * width + p.bin,
            })
        })
        .collect())
}

/// Centre frequency of `bin` (Hz).
pub fn bin_frequency(bin: usize, odr_hz: f32, fft_size: usize) -> f32 {
    bin as f32 * odr_hz / fft_size as f32
}

/// Number of leading bins inside the usable bandwidth.
///
/// Without a bandwidth limit this is the whole one-sided spectrum.
pub fn usable_bins(bandwidth_hz: Option<f32>, odr_hz: f32, fft_size: usize) -> usize {
    let mag_size = fft_size / 2;
    match bandwidth_hz {
        Some(bw) if bw.is_finite() && bw > 0.0 && odr_hz > 0.0 => {
            let bin_width = odr_hz / fft_size as f32;
            ((bw / bin_width).ceil() as usize).clamp(1, mag_size.max(1))
        }
        _ => mag_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_halved_dc() {
        let mut bins = [512.0, 256.0, 0.0, 128.0];
        rescale(&mut bins, 256, 2.0, DcBinPolicy::Halved);
        assert!((bins[0] - 2.0).abs() < 1e-6);
        assert!((bins[1] - 2.0).abs() < 1e-6);
        assert_eq!(bins[2], 0.0);
        assert!((bins[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rescale_zeroed_dc() {
        let mut bins = [512.0, 256.0];
        rescale(&mut bins, 256, 2.0, DcBinPolicy::Zeroed);
        assert_eq!(bins[0], 0.0);
        assert!((bins[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rescale_prefix_keeps_full_divisor() {
        let mut bins = [0.0, 100.0, 100.0, 100.0];
        rescale(&mut bins[..2], 4, 1.0, DcBinPolicy::Halved);
        assert_eq!(bins, [0.0, 25.0, 100.0, 100.0]);
    }

    #[test]
    fn test_find_peak_first_occurrence() {
        let peak = find_peak(&[1.0, 5.0, 3.0, 5.0]).unwrap();
        assert_eq!(peak, SpectralPeak { value: 5.0, bin: 1 });
        assert!(find_peak(&[]).is_none());
        assert_eq!(find_peak(&[0.0, 0.0]).unwrap().bin, 0);
    }

    #[test]
    fn test_subrange_peaks_absolute_bins() {
        let bins = [0.0, 9.0, 1.0, 2.0, 7.0, 3.0, 4.0, 8.0, 0.5];
        let peaks = subrange_peaks(&bins, 4).unwrap();
        assert_eq!(
            peaks,
            vec![
                SpectralPeak { value: 9.0, bin: 1 },
                SpectralPeak { value: 2.0, bin: 3 },
                SpectralPeak { value: 7.0, bin: 4 },
                SpectralPeak { value: 8.0, bin: 7 },
            ]
        );
    }

    #[test]
    fn test_subrange_count_validation() {
        assert!(subrange_peaks(&[1.0, 2.0], 0).is_err());
        assert!(subrange_peaks(&[1.0, 2.0], 3).is_err());
        assert_eq!(subrange_peaks(&[1.0, 2.0], 2).unwrap().len(), 2);
    }

    #[test]
    fn test_bin_frequency_mapping() {
        assert!((bin_frequency(61, 417.0, 512) - 49.68).abs() < 0.01);
        assert_eq!(bin_frequency(0, 417.0, 512), 0.0);
    }

    #[test]
    fn test_usable_bins() {
        assert_eq!(usable_bins(None, 1000.0, 1024), 512);
        // bin width ~0.977 Hz -> 100 Hz needs 103 bins
        assert_eq!(usable_bins(Some(100.0), 1000.0, 1024), 103);
        assert_eq!(usable_bins(Some(1e6), 1000.0, 1024), 512);
        assert_eq!(usable_bins(Some(0.0), 1000.0, 1024), 512);
    }
}
