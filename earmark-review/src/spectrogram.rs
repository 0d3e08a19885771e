//! Spectrogram frames and the latest-wins scheduler that computes them
//!
//! Only one computation runs at a time. A request arriving while one is in
//! flight takes the single pending slot, replacing whatever was waiting there.

use crate::decode::Track;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrogramSettings {
    /// Frame length in seconds
    pub window_duration: f64,
    /// Pre-emphasis coefficient; `None` disables the filter
    pub pre_emphasis: Option<f32>,
    /// FFT length; defaults to the next power of two above the frame length
    pub nfft: Option<usize>,
}

impl Default for SpectrogramSettings {
    fn default() -> Self {
        Self {
            window_duration: 0.01,
            pre_emphasis: Some(0.97),
            nfft: None,
        }
    }
}

/// One computed spectrogram
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Caller's request number, echoed back
    pub generation: u64,
    /// One magnitude row per requested centre time, `1 + 20*log10(|X|)`
    pub frames: Vec<Vec<f32>>,
    /// Bin centre frequencies in Hz
    pub frequencies: Vec<f32>,
}

/// Work item for the scheduler
#[derive(Debug, Clone)]
pub struct SpectrogramRequest {
    pub generation: u64,
    pub track: Arc<Track>,
    /// Frame centres in seconds
    pub centres: Vec<f64>,
    pub settings: SpectrogramSettings,
}

impl SpectrogramRequest {
    pub fn compute(self) -> Spectrogram {
        let (frames, frequencies) = compute(&self.track, &self.centres, &self.settings);
        Spectrogram {
            generation: self.generation,
            frames,
            frequencies,
        }
    }
}

/// Symmetric Hann window
pub fn hann_window(length: usize) -> Vec<f32> {
    if length == 1 {
        return vec![1.0];
    }
    let denom = (length - 1) as f32;
    (0..length)
        .map(|i| 0.5 - 0.5 * ((2.0 * PI * i as f32) / denom).cos())
        .collect()
}

/// Frames of `signal` of width `width` centred on each sample index;
/// out-of-range samples are zero
fn frame_centred(signal: &[f32], centres: &[usize], width: usize) -> Vec<Vec<f32>> {
    let half = width / 2;
    centres
        .iter()
        .map(|&centre| {
            (0..width)
                .map(|i| {
                    (centre + i)
                        .checked_sub(half)
                        .and_then(|index| signal.get(index))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .collect()
}

/// Log-magnitude spectra of the mono mix around each centre time
pub fn compute(
    track: &Track,
    centres: &[f64],
    settings: &SpectrogramSettings,
) -> (Vec<Vec<f32>>, Vec<f32>) {
    let fs = track.sample_rate as f64;
    let width = ((settings.window_duration * fs).round() as usize).max(1);
    let nfft = settings.nfft.unwrap_or_else(|| width.next_power_of_two()).max(1);
    let bins = nfft / 2 + 1;

    let mono = track.mono();
    let centre_samples: Vec<usize> = centres
        .iter()
        .map(|t| (t.max(0.0) * fs).round() as usize)
        .collect();
    let window = hann_window(width);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(nfft);

    let frames = frame_centred(&mono, &centre_samples, width)
        .into_iter()
        .map(|mut frame| {
            for (sample, w) in frame.iter_mut().zip(&window) {
                *sample *= w;
            }
            if let Some(coefficient) = settings.pre_emphasis {
                let original = frame.clone();
                for i in 1..width.saturating_sub(1) {
                    frame[i] -= coefficient * original[i + 1];
                }
            }

            let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); nfft];
            for (slot, &sample) in buffer.iter_mut().zip(&frame) {
                *slot = Complex::new(sample, 0.0);
            }
            fft.process(&mut buffer);

            buffer[..bins]
                .iter()
                .map(|x| 1.0 + 20.0 * x.norm().max(f32::EPSILON).log10())
                .collect()
        })
        .collect();

    let frequencies = (0..bins)
        .map(|k| (k as f64 * fs / nfft as f64) as f32)
        .collect();
    (frames, frequencies)
}

/// What happened to a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Nothing was running; the job started immediately
    Started,
    /// Took the empty pending slot
    Queued,
    /// Replaced a job that had not started yet
    Replaced,
}

#[derive(Debug)]
struct Slot<J> {
    running: bool,
    pending: Option<J>,
}

/// Depth-one work queue: at most one job running and one waiting
pub struct LatestWins<J, R, M> {
    slot: Arc<Mutex<Slot<J>>>,
    work: Arc<dyn Fn(J) -> R + Send + Sync>,
    reply: mpsc::UnboundedSender<M>,
}

impl<J, R, M> LatestWins<J, R, M>
where
    J: Send + 'static,
    R: Send + 'static,
    M: From<R> + Send + 'static,
{
    /// `work` runs on the blocking pool; results are sent on `reply`
    pub fn new<F>(work: F, reply: mpsc::UnboundedSender<M>) -> Self
    where
        F: Fn(J) -> R + Send + Sync + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                running: false,
                pending: None,
            })),
            work: Arc::new(work),
            reply,
        }
    }

    pub fn submit(&self, job: J) -> Submission {
        {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.running {
                return match slot.pending.replace(job) {
                    Some(_) => {
                        debug!("Superseded pending job");
                        Submission::Replaced
                    }
                    None => Submission::Queued,
                };
            }
            slot.running = true;
        }
        self.run_chain(job);
        Submission::Started
    }

    pub fn is_busy(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .running
    }

    fn run_chain(&self, first: J) {
        let slot = Arc::clone(&self.slot);
        let work = Arc::clone(&self.work);
        let reply = self.reply.clone();

        tokio::spawn(async move {
            let mut job = first;
            loop {
                let run = Arc::clone(&work);
                match tokio::task::spawn_blocking(move || run(job)).await {
                    Ok(result) => {
                        if reply.send(M::from(result)).is_err() {
                            debug!("Result dropped, receiver gone");
                        }
                    }
                    Err(e) => error!("Background job failed: {}", e),
                }

                // swap in the next job under the same lock `submit` uses
                let next = {
                    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                    match slot.pending.take() {
                        Some(next) => next,
                        None => {
                            slot.running = false;
                            break;
                        }
                    }
                };
                job = next;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Track {
        let n = (sample_rate as f32 * seconds) as usize;
        Track {
            samples: (0..n)
                .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
                .collect(),
            sample_rate,
            channels: 1,
        }
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(5);
        assert!(w[0].abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!(w[4].abs() < 1e-6);
        assert_eq!(hann_window(1), vec![1.0]);
    }

    #[test]
    fn test_sine_peak_lands_in_right_bin() {
        let track = sine(1000.0, 8000, 0.5);
        let settings = SpectrogramSettings {
            window_duration: 0.032,
            pre_emphasis: None,
            nfft: None,
        };
        let (frames, freqs) = compute(&track, &[0.25], &settings);
        assert_eq!(frames.len(), 1);
        assert_eq!(freqs.len(), 129);

        let peak = frames[0]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert!((freqs[peak] - 1000.0).abs() <= 31.25 + 1e-3);
    }

    #[test]
    fn test_frames_past_the_end_are_silent_floor() {
        let track = sine(440.0, 8000, 0.1);
        let (frames, _) = compute(&track, &[10.0], &SpectrogramSettings::default());
        let floor = 1.0 + 20.0 * f32::EPSILON.log10();
        assert!(frames[0].iter().all(|&v| (v - floor).abs() < 1e-3));
    }

    #[tokio::test]
    async fn test_latest_request_wins() {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let gate_rx = Mutex::new(gate_rx);
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();

        let scheduler = LatestWins::new(
            move |job: u32| {
                if job == 1 {
                    let _ = gate_rx.lock().unwrap().recv();
                }
                job
            },
            tx,
        );

        assert_eq!(scheduler.submit(1), Submission::Started);
        assert_eq!(scheduler.submit(2), Submission::Queued);
        assert_eq!(scheduler.submit(3), Submission::Replaced);
        assert_eq!(scheduler.submit(4), Submission::Replaced);
        gate_tx.send(()).unwrap();

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(4));
        let nothing = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(nothing.is_err());
        assert!(!scheduler.is_busy());
    }
}
