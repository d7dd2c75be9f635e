//! # Sample Converter
//!
//! Collapses Symphonia's planar buffers of any sample format into mono f32.
//!
//! Fixed-point samples are divided by the type's maximum positive value
//! (`i16::MAX` for 16-bit) rather than `2^(bits-1)`, so a full-scale
//! positive sample maps to exactly `1.0`. Unsigned formats are re-centered
//! on their midpoint first. Channels are averaged with equal weight.

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::sample::{i24, u24, Sample};

/// Conversion of one sample to a normalized float.
pub trait NormalizedSample: Sample {
    fn to_normalized(self) -> f32;
}

impl NormalizedSample for f32 {
    fn to_normalized(self) -> f32 {
        self
    }
}

impl NormalizedSample for f64 {
    fn to_normalized(self) -> f32 {
        self as f32
    }
}

impl NormalizedSample for i8 {
    fn to_normalized(self) -> f32 {
        f32::from(self) / f32::from(i8::MAX)
    }
}

impl NormalizedSample for i16 {
    fn to_normalized(self) -> f32 {
        f32::from(self) / f32::from(i16::MAX)
    }
}

impl NormalizedSample for i24 {
    fn to_normalized(self) -> f32 {
        (f64::from(self.inner()) / f64::from(I24_MAX)) as f32
    }
}

impl NormalizedSample for i32 {
    fn to_normalized(self) -> f32 {
        (f64::from(self) / f64::from(i32::MAX)) as f32
    }
}

impl NormalizedSample for u8 {
    fn to_normalized(self) -> f32 {
        (f32::from(self) - 128.0) / f32::from(i8::MAX)
    }
}

impl NormalizedSample for u16 {
    fn to_normalized(self) -> f32 {
        (f32::from(self) - 32_768.0) / f32::from(i16::MAX)
    }
}

impl NormalizedSample for u24 {
    fn to_normalized(self) -> f32 {
        ((f64::from(self.inner()) - 8_388_608.0) / f64::from(I24_MAX)) as f32
    }
}

impl NormalizedSample for u32 {
    fn to_normalized(self) -> f32 {
        ((f64::from(self) - 2_147_483_648.0) / f64::from(i32::MAX)) as f32
    }
}

const I24_MAX: i32 = (1 << 23) - 1;

pub struct SampleConverter;

impl SampleConverter {
    /// Append the mono mix of `buffer` to `output`.
    ///
    /// Returns the number of frames appended.
    pub fn downmix_into(buffer: &AudioBufferRef<'_>, output: &mut Vec<f32>) -> usize {
        match buffer {
            AudioBufferRef::F32(buf) => Self::mix(buf, output),
            AudioBufferRef::F64(buf) => Self::mix(buf, output),
            AudioBufferRef::S8(buf) => Self::mix(buf, output),
            AudioBufferRef::S16(buf) => Self::mix(buf, output),
            AudioBufferRef::S24(buf) => Self::mix(buf, output),
            AudioBufferRef::S32(buf) => Self::mix(buf, output),
            AudioBufferRef::U8(buf) => Self::mix(buf, output),
            AudioBufferRef::U16(buf) => Self::mix(buf, output),
            AudioBufferRef::U24(buf) => Self::mix(buf, output),
            AudioBufferRef::U32(buf) => Self::mix(buf, output),
        }
    }

    fn mix<T: NormalizedSample>(buf: &AudioBuffer<T>, output: &mut Vec<f32>) -> usize {
        let channels = buf.spec().channels.count();
        let frames = buf.frames();
        if channels == 0 || frames == 0 {
            return 0;
        }

        let start = output.len();
        output.extend(buf.chan(0).iter().map(|&s| s.to_normalized()));

        for channel in 1..channels {
            for (mixed, &sample) in output[start..].iter_mut().zip(buf.chan(channel)) {
                *mixed += sample.to_normalized();
            }
        }

        if channels > 1 {
            let scale = 1.0 / channels as f32;
            for mixed in &mut output[start..] {
                *mixed *= scale;
            }
        }

        frames
    }
}
