//! Frequency-domain pipeline
//!
//! Per FFT cycle and per axis: extract the latest `fft_size` samples,
//! window them, take the one-sided FFT magnitude and feed the averaging
//! accumulator. Once all three axes complete the same averaging window the
//! averages are rescaled to engineering units and searched for peaks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::averaging::SpectrumAccumulator;
use super::fft::SpectrumCalculator;
use super::spectrum::{find_peak, rescale, subrange_peaks, usable_bins};
use super::window::WindowTable;
use super::ProcessingError;
use crate::acquisition::CircularBuffer;
use crate::config::defaults::{FFT_SIZE_DEFAULT, SUBRANGE_MAX};
use crate::types::{AveragingPolicy, Axis, DcBinPolicy, SpectralPeak, Triaxial, WindowType};

/// Static parameters of the frequency-domain pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencySettings {
    pub fft_size: usize,
    pub window: WindowType,
    pub averaging: AveragingPolicy,
    pub dc_bin: DcBinPolicy,
    /// Number of equal-width sub-ranges to analyze, if any
    pub subranges: Option<usize>,
    /// Usable bandwidth limit (Hz); `None` keeps all bins
    pub bandwidth_hz: Option<f32>,
}

impl Default for FrequencySettings {
    fn default() -> Self {
        Self {
            fft_size: FFT_SIZE_DEFAULT,
            window: WindowType::default(),
            averaging: AveragingPolicy::default(),
            dc_bin: DcBinPolicy::default(),
            subranges: None,
            bandwidth_hz: None,
        }
    }
}

/// One completed, rescaled spectrum average.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumResult {
    /// Averaged magnitudes (engineering units), usable bins only
    pub magnitudes: Triaxial<Vec<f32>>,
    pub peaks: Triaxial<SpectralPeak>,
    pub spectra_averaged: Triaxial<u16>,
    pub subranges: Option<Triaxial<Vec<SpectralPeak>>>,
}

pub struct FrequencyAnalyzer {
    settings: FrequencySettings,
    window: WindowTable,
    calculator: SpectrumCalculator,
    accumulators: Triaxial<SpectrumAccumulator>,
    /// Per-axis rendezvous: spectra count of a completed, not yet collected average
    ready: Triaxial<Option<u16>>,
    used_bins: usize,
    input: Vec<f32>,
    windowed: Vec<f32>,
    magnitudes: Vec<f32>,
    cycles: u64,
}

impl std::fmt::Debug for FrequencyAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyAnalyzer")
            .field("settings", &self.settings)
            .field("used_bins", &self.used_bins)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl FrequencyAnalyzer {
    pub fn new(settings: FrequencySettings, odr_hz: f32) -> Result<Self, ProcessingError> {
        let calculator = SpectrumCalculator::new(settings.fft_size)?;
        let window = WindowTable::new(settings.window, settings.fft_size)?;
        if let AveragingPolicy::Count { spectra: 0 } = settings.averaging {
            return Err(ProcessingError::InvalidAveragingCount(0));
        }
        let mag_size = calculator.magnitude_len();
        let used_bins = usable_bins(settings.bandwidth_hz, odr_hz, settings.fft_size);
        check_subranges(settings.subranges, used_bins)?;

        Ok(Self {
            settings,
            window,
            calculator,
            accumulators: Triaxial::from_fn(|_| SpectrumAccumulator::new(mag_size)),
            ready: Triaxial::default(),
            used_bins,
            input: vec![0.0; settings.fft_size],
            windowed: vec![0.0; settings.fft_size],
            magnitudes: vec![0.0; mag_size],
            cycles: 0,
        })
    }

    pub const fn settings(&self) -> &FrequencySettings {
        &self.settings
    }

    pub const fn window(&self) -> &WindowTable {
        &self.window
    }

    /// Leading bins inside the usable bandwidth.
    pub const fn used_bins(&self) -> usize {
        self.used_bins
    }

    /// FFT cycles executed since creation.
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Spectra summed so far in the in-flight average.
    pub fn pending_spectra(&self) -> u16 {
        self.accumulators.x.count()
    }

    /// Recompute the usable-bandwidth bin count for a new ODR.
    pub fn set_odr(&mut self, odr_hz: f32) -> Result<(), ProcessingError> {
        let used_bins = usable_bins(self.settings.bandwidth_hz, odr_hz, self.settings.fft_size);
        check_subranges(self.settings.subranges, used_bins)?;
        self.used_bins = used_bins;
        Ok(())
    }

    /// Drop any in-flight average.
    pub fn reset(&mut self) {
        for (_, acc) in self.accumulators.iter_mut() {
            acc.reset();
        }
        self.ready = Triaxial::default();
    }

    /// Run one FFT cycle on the window ending at `end_index`.
    ///
    /// Returns the rescaled result when every axis completed its average in
    /// this cycle. Fails with `InsufficientData` (and leaves all axes
    /// untouched) when the buffer does not yet hold a full window.
    pub fn process(
        &mut self,
        buffer: &CircularBuffer,
        end_index: usize,
        finish: bool,
    ) -> Result<Option<SpectrumResult>, ProcessingError> {
        let needed = self.settings.fft_size;
        if needed > buffer.capacity() {
            return Err(ProcessingError::WindowExceedsCapacity {
                requested: needed,
                capacity: buffer.capacity(),
            });
        }
        let available = buffer.available_ending_at(end_index);
        if available < needed {
            return Err(ProcessingError::InsufficientData { needed, available });
        }

        for axis in Axis::ALL {
            buffer.extract_axis(axis, end_index, &mut self.input)?;
            self.window.apply(&self.input, &mut self.windowed)?;
            self.calculator
                .magnitude_spectrum(&self.windowed, &mut self.magnitudes)?;
            let status = self.accumulators[axis].accumulate(
                &self.magnitudes,
                self.settings.averaging,
                finish,
            )?;
            if let super::AccumulationStatus::Complete { spectra } = status {
                self.ready[axis] = Some(spectra);
            }
        }
        self.cycles += 1;

        let (Some(x), Some(y), Some(z)) = (self.ready.x, self.ready.y, self.ready.z) else {
            debug!(
                cycle = self.cycles,
                pending = self.pending_spectra(),
                "FFT cycle accumulated"
            );
            return Ok(None);
        };
        self.ready = Triaxial::default();
        let spectra_averaged = Triaxial::new(x, y, z);

        let result = self.collect(spectra_averaged)?;
        debug!(
            cycle = self.cycles,
            spectra = x,
            peak_bin_x = result.peaks.x.bin,
            "Spectrum average complete"
        );
        Ok(Some(result))
    }

    fn collect(&mut self, spectra_averaged: Triaxial<u16>) -> Result<SpectrumResult, ProcessingError> {
        let mag_size = self.calculator.magnitude_len();
        let used = self.used_bins;
        let scale = self.window.scale_factor();
        let policy = self.settings.dc_bin;

        let magnitudes = Triaxial::from_fn(|axis| {
            let averaged = &mut self.accumulators[axis].values_mut()[..used];
            rescale(averaged, mag_size, scale, policy);
            averaged.to_vec()
        });
        let peaks = magnitudes
            .as_ref()
            .map(|m| find_peak(m).unwrap_or_default());
        let subranges = match self.settings.subranges {
            Some(count) => Some(Triaxial::new(
                subrange_peaks(&magnitudes.x, count)?,
                subrange_peaks(&magnitudes.y, count)?,
                subrange_peaks(&magnitudes.z, count)?,
            )),
            None => None,
        };

        Ok(SpectrumResult {
            magnitudes,
            peaks,
            spectra_averaged,
            subranges,
        })
    }
}

fn check_subranges(subranges: Option<usize>, used_bins: usize) -> Result<(), ProcessingError> {
    match subranges {
        Some(count) if count == 0 || count > SUBRANGE_MAX || count > used_bins => {
            Err(ProcessingError::InvalidSubrangeCount {
                count,
                bins: used_bins,
            })
        }
        _ => Ok(()),
    }
}
