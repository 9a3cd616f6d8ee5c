//! End-to-end scenarios and universal-invariant checks, run against
//! synthetic sine-wave fixtures rather than shipped audio files.
//! Durations are kept short to keep the suite fast; every assertion shape
//! (ranking, confidence thresholds, deletion completeness, offset
//! recovery) still exercises the real pipeline end to end.

use rand::Rng;
use sivana::{fingerprint_samples, match_query, Config, FingerprintIndex, MemoryIndex, TrackId, TrackMetadata};

fn sine(freq: f32, duration_sec: f32, sr: u32) -> Vec<f32> {
    let n = (duration_sec * sr as f32) as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
        .collect()
}

fn index_track(index: &dyn FingerprintIndex, config: &Config, id: &str, samples: &[f32]) {
    let hashes = fingerprint_samples(config, samples);
    let track_id = TrackId::from(id);
    let mut meta = TrackMetadata::new(track_id.clone(), format!("{id}.wav"));
    meta.num_hashes = hashes.len();
    index.store(&track_id, meta, &hashes).unwrap();
}

#[test]
fn full_clip_query_matches_exactly_with_high_confidence() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let samples = sine(440.0, 12.0, config.sample_rate);
    index_track(&index, &config, "sine440", &samples);

    let query_hashes = fingerprint_samples(&config, &samples);
    let results = match_query(&index, &query_hashes, 5).unwrap();

    assert_eq!(results[0].track_id, TrackId::from("sine440"));
    assert!(results[0].confidence >= 0.9, "confidence was {}", results[0].confidence);
}

#[test]
fn short_excerpt_query_still_matches_source_track() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let samples = sine(440.0, 12.0, config.sample_rate);
    index_track(&index, &config, "sine440", &samples);

    let sr = config.sample_rate as usize;
    let excerpt = &samples[5 * sr..10 * sr];
    let query_hashes = fingerprint_samples(&config, excerpt);
    let results = match_query(&index, &query_hashes, 5).unwrap();

    assert_eq!(results[0].track_id, TrackId::from("sine440"));
    assert!(results[0].confidence >= 0.3, "confidence was {}", results[0].confidence);
}

#[test]
fn empty_index_yields_no_match() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let samples = sine(440.0, 6.0, config.sample_rate);
    let query_hashes = fingerprint_samples(&config, &samples);
    let results = match_query(&index, &query_hashes, 5).unwrap();
    assert!(results.is_empty());
}

#[test]
fn noisy_query_still_matches_source_track() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let samples = sine(440.0, 8.0, config.sample_rate);
    index_track(&index, &config, "clip-c", &samples);

    let mut rng = rand::thread_rng();
    let noisy: Vec<f32> = samples.iter().map(|&s| s + rng.gen_range(-0.1..0.1)).collect();
    let query_hashes = fingerprint_samples(&config, &noisy);
    let results = match_query(&index, &query_hashes, 5).unwrap();

    assert_eq!(results[0].track_id, TrackId::from("clip-c"));
}

#[test]
fn deletion_removes_track_from_match_results() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let samples = sine(523.25, 8.0, config.sample_rate);
    index_track(&index, &config, "A", &samples);
    index_track(&index, &config, "B", &samples);

    index.delete(&TrackId::from("A")).unwrap();

    let query_hashes = fingerprint_samples(&config, &samples);
    let results = match_query(&index, &query_hashes, 5).unwrap();

    assert!(results.iter().all(|r| r.track_id != TrackId::from("A")));
    assert_eq!(results[0].track_id, TrackId::from("B"));
    assert!(index.metadata(&TrackId::from("A")).unwrap().is_none());
}

#[test]
fn hash_packing_matches_bit_layout_formula() {
    use sivana::{create_hashes, Peak};
    let peaks = [Peak { t: 0, f: 100, a: 1.0 }, Peak { t: 5, f: 150, a: 1.0 }];
    let hashes = create_hashes(&peaks, 1);
    assert_eq!(hashes.len(), 1);
    assert_eq!(hashes[0].hash, (100u32 << 20) | (150u32 << 10) | 5);
    assert_eq!(hashes[0].t_anchor, 0);
}

#[test]
fn invariant_disjointness_ranks_matching_track_above_unrelated() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let x = sine(440.0, 8.0, config.sample_rate);
    let y = sine(880.0, 8.0, config.sample_rate);
    index_track(&index, &config, "X", &x);
    index_track(&index, &config, "Y", &y);

    let query_hashes = fingerprint_samples(&config, &x);
    let results = match_query(&index, &query_hashes, 5).unwrap();

    let rank_of = |id: &str| results.iter().position(|r| r.track_id == TrackId::from(id));
    let x_rank = rank_of("X").expect("X must appear in results");
    let y_rank = rank_of("Y");
    assert!(y_rank.is_none() || x_rank < y_rank.unwrap());
}

#[test]
fn invariant_hash_determinism_yields_identical_multisets() {
    let config = Config::default();
    let samples = sine(330.0, 6.0, config.sample_rate);

    let mut a: Vec<u32> = fingerprint_samples(&config, &samples).into_iter().map(|f| f.hash).collect();
    let mut b: Vec<u32> = fingerprint_samples(&config, &samples).into_iter().map(|f| f.hash).collect();
    a.sort_unstable();
    b.sort_unstable();

    assert_eq!(a, b);
}

#[test]
fn invariant_time_shift_recovers_modal_offset() {
    let config = Config::default();
    let index = MemoryIndex::new();
    let samples = sine(440.0, 8.0, config.sample_rate);
    index_track(&index, &config, "base", &samples);

    let shift_frames: i64 = 20;
    let silence = vec![0.0_f32; shift_frames as usize * config.hop_length];
    let mut shifted = silence;
    shifted.extend_from_slice(&samples);

    let query_hashes = fingerprint_samples(&config, &shifted);
    let results = match_query(&index, &query_hashes, 5).unwrap();

    assert_eq!(results[0].track_id, TrackId::from("base"));
    assert!((results[0].offset - (-shift_frames)).abs() <= 1, "offset was {}", results[0].offset);
}
