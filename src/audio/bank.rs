// Sample bank: decoded mono f32 buffers keyed by sound id, all at the
// output device's sample rate. Decoding happens up front at startup; a
// sound whose file is missing or unreadable simply stays out of the bank
// and its triggers are skipped later.

use anyhow::Result;
use hound::{SampleFormat, WavReader};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::studio::catalog::SoundLibrary;

pub struct SampleBank {
    sample_rate: u32,
    buffers: HashMap<u32, Arc<Vec<f32>>>,
}

impl SampleBank {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffers: HashMap::new(),
        }
    }

    /// Decode every catalog entry found on disk, resolving relative paths
    /// against `base_dir`. Returns (loaded, failed) counts; failures are
    /// reported through `on_error` and do not abort the rest of the load.
    pub fn load_library(
        &mut self,
        library: &SoundLibrary,
        base_dir: &Path,
        mut on_error: impl FnMut(&str),
    ) -> (usize, usize) {
        let mut loaded = 0;
        let mut failed = 0;
        for sound in library.all_sounds() {
            let path = base_dir.join(&sound.path);
            match import_wav(&path, self.sample_rate) {
                Ok(samples) => {
                    self.buffers.insert(sound.id, Arc::new(samples));
                    loaded += 1;
                }
                Err(e) => {
                    failed += 1;
                    on_error(&format!(
                        "could not load \"{}\" from {}: {}",
                        sound.name,
                        path.display(),
                        e
                    ));
                }
            }
        }
        (loaded, failed)
    }

    pub fn insert(&mut self, id: u32, samples: Vec<f32>) {
        self.buffers.insert(id, Arc::new(samples));
    }

    pub fn get(&self, id: u32) -> Option<Arc<Vec<f32>>> {
        self.buffers.get(&id).cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.buffers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Read a WAV file as mono f32 at `target_sample_rate`. Multi-channel
/// sources are downmixed by averaging; rate conversion goes through a sinc
/// resampler.
pub fn import_wav<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<Vec<f32>> {
    let mut reader = WavReader::open(&path)?;
    let spec = reader.spec();

    let raw_samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_value = 2_i32.pow((spec.bits_per_sample - 1) as u32) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.unwrap_or(0) as f32 / max_value)
                .collect()
        }
    };

    let mono_samples: Vec<f32> = if spec.channels > 1 {
        let ch = spec.channels as usize;
        raw_samples
            .chunks(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    } else {
        raw_samples
    };

    if spec.sample_rate == target_sample_rate {
        return Ok(mono_samples);
    }

    resample_audio(&mono_samples, spec.sample_rate, target_sample_rate)
}

fn resample_audio(samples: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        2.0,
        params,
        samples.len(),
        1,
    )?;

    let input = vec![samples];
    let output = resampler.process(&input, None)?;

    Ok(output.into_iter().flatten().collect())
}
