//! Decode cache against real WAV files

mod helpers;

use earmark_review::decode::{AudioLoader, CacheOutcome, DecodeCache, SymphoniaLoader};
use helpers::audio_generator::generate_tone;
use std::sync::Arc;

#[test]
fn test_symphonia_decodes_generated_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    generate_tone(&path, 440.0, 0.5, 8000);

    let track = SymphoniaLoader.load(&path).unwrap();
    assert_eq!(track.sample_rate, 8000);
    assert_eq!(track.channels, 1);
    assert_eq!(track.frames(), 4000);
    let peak = track.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.4 && peak <= 0.51, "peak {peak}");
}

#[test]
fn test_missing_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SymphoniaLoader.load(&dir.path().join("missing.wav"));
    assert!(matches!(result, Err(earmark_review::Error::Decode(_))));
}

#[test]
fn test_denylist_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p.wav");
    generate_tone(&path, 440.0, 0.25, 8000);
    let cache = DecodeCache::new(SymphoniaLoader, 4);

    let (first, outcome) = cache.decode(&path).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    let (second, outcome) = cache.decode(&path).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
    assert!(Arc::ptr_eq(&first, &second));

    cache.deny(&path);
    let (fresh, outcome) = cache.decode(&path).unwrap();
    assert_eq!(outcome, CacheOutcome::Bypassed);
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(*first, *fresh);

    cache.allow(&path);
    let (after_allow, outcome) = cache.decode(&path).unwrap();
    assert_eq!(outcome, CacheOutcome::Miss);
    assert!(!Arc::ptr_eq(&first, &after_allow));
    let (cached, outcome) = cache.decode(&path).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
    assert!(Arc::ptr_eq(&after_allow, &cached));
}

#[test]
fn test_allow_invalidates_only_that_path() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.wav");
    let b = dir.path().join("b.wav");
    generate_tone(&a, 440.0, 0.1, 8000);
    generate_tone(&b, 660.0, 0.1, 8000);
    let cache = DecodeCache::new(SymphoniaLoader, 4);

    cache.decode(&a).unwrap();
    cache.decode(&b).unwrap();
    cache.allow(&a);

    assert!(!cache.is_cached(&a));
    assert!(cache.is_cached(&b));
}
