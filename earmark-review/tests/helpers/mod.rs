//! Shared fixtures for earmark-review integration tests

#![allow(dead_code)]

pub mod audio_generator;

use earmark_common::config::ReviewConfig;
use std::path::Path;

/// Config whose home prefix is `dir`, so fixture paths stay untouched
pub fn test_config(dir: &Path) -> ReviewConfig {
    let mut config = ReviewConfig::default();
    config.paths.home_prefix = Some(dir.to_path_buf());
    config.tags.tagger = Some("tester".to_string());
    config.table.page_size = 2;
    config.cache.capacity = 8;
    config
}

/// Database with one relative entry per name, keyed by the name
pub fn write_database(path: &Path, names: &[&str]) {
    let mut content = String::from("# generated\n");
    for name in names {
        content.push_str(&format!("filename = {name}.wav\nkey = {name}\nspeaker = spk{name}\n.\n"));
    }
    std::fs::write(path, content).expect("Failed to write database");
}
