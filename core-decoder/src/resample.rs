//! # Mono Resampler
//!
//! Sample-rate conversion for the in-process backend. Input is already
//! downmixed to mono; output is at [`TARGET_SAMPLE_RATE`].
//!
//! Wraps rubato's FFT resampler, which works on fixed input blocks. Input is
//! buffered until a full block is available, the filter's start-up delay is
//! trimmed from the front, and [`MonoResampler::flush`] pads the tail so the
//! total output length matches `ceil(input * out_rate / in_rate)`.
//!
//! Sources already at the target rate pass through untouched.

use crate::config::TARGET_SAMPLE_RATE;
use crate::error::{DecoderError, Result};
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, trace};

/// Sub-chunks per FFT block; rubato's recommended default.
const SUB_CHUNKS: usize = 2;

/// Upper bound on zero blocks pushed through while flushing.
const MAX_FLUSH_BLOCKS: usize = 8;

pub struct MonoResampler {
    input_rate: u32,
    chunk_frames: usize,
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    delay_remaining: usize,
    input_total: u64,
    output_total: u64,
}

impl MonoResampler {
    /// Resampler from `input_rate` to 22050 Hz, fed in blocks of
    /// `chunk_frames` input samples.
    pub fn new(input_rate: u32, chunk_frames: usize) -> Result<Self> {
        if input_rate == 0 {
            return Err(DecoderError::Resampler("Input sample rate is zero".to_string()));
        }

        let mut resampler = Self {
            input_rate,
            chunk_frames,
            inner: None,
            pending: Vec::new(),
            delay_remaining: 0,
            input_total: 0,
            output_total: 0,
        };
        resampler.reset()?;
        Ok(resampler)
    }

    /// Whether input passes through without conversion.
    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Drop all buffered state, as after a seek.
    pub fn reset(&mut self) -> Result<()> {
        self.pending.clear();
        self.input_total = 0;
        self.output_total = 0;

        if self.input_rate == TARGET_SAMPLE_RATE {
            self.inner = None;
            self.delay_remaining = 0;
            return Ok(());
        }

        let inner = FftFixedIn::<f32>::new(
            self.input_rate as usize,
            TARGET_SAMPLE_RATE as usize,
            self.chunk_frames,
            SUB_CHUNKS,
            1,
        )
        .map_err(|e| DecoderError::Resampler(format!("Failed to create resampler: {}", e)))?;

        self.delay_remaining = inner.output_delay();
        debug!(
            input_rate = self.input_rate,
            output_rate = TARGET_SAMPLE_RATE,
            delay = self.delay_remaining,
            "Created resampler"
        );
        self.inner = Some(inner);
        Ok(())
    }

    /// Convert `input` and append whatever output is ready to `output`.
    ///
    /// Output lags input by up to one block.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        self.input_total += input.len() as u64;

        let Some(inner) = self.inner.as_mut() else {
            output.extend_from_slice(input);
            self.output_total += input.len() as u64;
            return Ok(());
        };

        self.pending.extend_from_slice(input);

        let mut consumed = 0;
        loop {
            let needed = inner.input_frames_next();
            if self.pending.len() - consumed < needed {
                break;
            }

            let block = &self.pending[consumed..consumed + needed];
            let frames = inner
                .process(&[block], None)
                .map_err(|e| DecoderError::Resampler(e.to_string()))?;
            consumed += needed;

            if let Some(channel) = frames.first() {
                Self::emit(&mut self.delay_remaining, &mut self.output_total, channel, output, None);
            }
        }

        self.pending.drain(..consumed);
        Ok(())
    }

    /// Push out everything still buffered at end of input.
    ///
    /// After a flush the resampler has produced exactly the output length
    /// matching all input seen since the last reset.
    pub fn flush(&mut self, output: &mut Vec<f32>) -> Result<()> {
        let expected = self.expected_output();
        let Some(inner) = self.inner.as_mut() else {
            return Ok(());
        };

        if !self.pending.is_empty() {
            let frames = inner
                .process_partial(Some(&[self.pending.as_slice()]), None)
                .map_err(|e| DecoderError::Resampler(e.to_string()))?;
            self.pending.clear();
            if let Some(channel) = frames.first() {
                Self::emit(
                    &mut self.delay_remaining,
                    &mut self.output_total,
                    channel,
                    output,
                    Some(expected),
                );
            }
        }

        let mut blocks = 0;
        while self.output_total < expected && blocks < MAX_FLUSH_BLOCKS {
            let frames = inner
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| DecoderError::Resampler(e.to_string()))?;
            if let Some(channel) = frames.first() {
                Self::emit(
                    &mut self.delay_remaining,
                    &mut self.output_total,
                    channel,
                    output,
                    Some(expected),
                );
            }
            blocks += 1;
        }

        trace!(
            input = self.input_total,
            output = self.output_total,
            "Flushed resampler"
        );
        Ok(())
    }

    /// Output length matching all input since the last reset.
    fn expected_output(&self) -> u64 {
        let scaled = u128::from(self.input_total) * u128::from(TARGET_SAMPLE_RATE);
        let rate = u128::from(self.input_rate);
        scaled.div_ceil(rate) as u64
    }

    fn emit(
        delay_remaining: &mut usize,
        output_total: &mut u64,
        samples: &[f32],
        output: &mut Vec<f32>,
        cap: Option<u64>,
    ) {
        let skip = (*delay_remaining).min(samples.len());
        *delay_remaining -= skip;

        let mut ready = &samples[skip..];
        if let Some(cap) = cap {
            let room = cap.saturating_sub(*output_total) as usize;
            ready = &ready[..ready.len().min(room)];
        }

        output.extend_from_slice(ready);
        *output_total += ready.len() as u64;
    }
}
