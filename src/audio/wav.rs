/*!
 * WAV artifact I/O.
 *
 * Writes the final mix as 16/24-bit integer or 32-bit float PCM and reads
 * library sounds of any of those formats back into `AudioBuffer`s.
 */

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use std::path::Path;

use super::buffer::AudioBuffer;

fn spec_for(buffer: &AudioBuffer, bit_depth: u16) -> Result<WavSpec> {
    let sample_format = match bit_depth {
        16 | 24 => SampleFormat::Int,
        32 => SampleFormat::Float,
        other => return Err(anyhow!("Unsupported bit depth: {}", other)),
    };
    Ok(WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format,
    })
}

/// Write `buffer` to `path` at the given bit depth
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer, bit_depth: u16) -> Result<()> {
    let path = path.as_ref();
    let spec = spec_for(buffer, bit_depth)?;
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

    match bit_depth {
        16 => {
            for sample in buffer.samples() {
                writer.write_sample(quantize(*sample, 16) as i16)?;
            }
        }
        24 => {
            for sample in buffer.samples() {
                writer.write_sample(quantize(*sample, 24))?;
            }
        }
        _ => {
            for sample in buffer.samples() {
                writer.write_sample(*sample)?;
            }
        }
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file: {:?}", path))?;

    debug!(
        "Wrote {:.2}s of audio to {:?} ({} Hz, {}-bit, {} ch)",
        buffer.duration_secs(),
        path,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.channels
    );
    Ok(())
}

/// Read a WAV file into a float buffer
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let mut reader =
        WavReader::open(path).with_context(|| format!("Failed to open WAV file: {:?}", path))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Failed to decode WAV file: {:?}", path))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Failed to decode WAV file: {:?}", path))?
        }
    };

    Ok(AudioBuffer::from_samples(spec.sample_rate, spec.channels, samples))
}

fn quantize(sample: f32, bits: u16) -> i32 {
    let max = ((1i64 << (bits - 1)) - 1) as f32;
    (sample.clamp(-1.0, 1.0) * max).round() as i32
}
