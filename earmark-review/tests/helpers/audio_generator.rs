//! Audio test fixture generator

use std::path::Path;

/// Mono 16-bit sine tone
pub fn generate_tone(path: &Path, freq: f32, seconds: f32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    let total = (seconds * sample_rate as f32) as usize;
    for i in 0..total {
        let t = i as f32 / sample_rate as f32;
        let value = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
        writer
            .write_sample((value * i16::MAX as f32) as i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

/// Short tone per name in `dir`, named `<name>.wav`
pub fn generate_tones(dir: &Path, names: &[&str]) {
    for (i, name) in names.iter().enumerate() {
        generate_tone(&dir.join(format!("{name}.wav")), 220.0 * (i + 1) as f32, 0.25, 8000);
    }
}
