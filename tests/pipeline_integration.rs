//! Integration tests for the detector pipeline
//!
//! These tests drive the public `KeyDetector` API from a simulated audio
//! thread with stub classifiers, covering:
//! - End-to-end detection and the displayed key string
//! - Silence handling and reconfiguration resets
//! - Producer progress while the analysis thread is stalled
//! - Handoff integrity under randomized block sizes
//! - Teardown joining the analysis thread

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use keydetect::{
    Classification, DetectorConfig, ErrorCode, Key, KeyClassifier, KeyDetectError, KeyDetector,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

fn test_config(window_seconds: f32) -> DetectorConfig {
    DetectorConfig {
        window_seconds,
        poll_interval_ms: 2,
        lower_worker_priority: false,
        ..DetectorConfig::default()
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < WAIT_TIMEOUT {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Feed `frames` stereo frames of a constant value in fixed-size blocks
fn feed_frames(detector: &mut KeyDetector, frames: usize, block_frames: usize, value: i16) {
    let block = vec![value; block_frames * 2];
    let mut remaining = frames;
    while remaining > 0 {
        let n = remaining.min(block_frames);
        detector.feed(&block[..n * 2]);
        remaining -= n;
    }
}

/// Feed frames, waiting for the analysis thread between blocks so no
/// window is dropped
fn feed_lossless(detector: &mut KeyDetector, frames: usize, block_frames: usize) {
    let block = vec![1_000i16; block_frames * 2];
    let mut remaining = frames;
    while remaining > 0 {
        let n = remaining.min(block_frames);
        detector.feed(&block[..n * 2]);
        assert!(wait_until(|| !detector.has_pending_work()));
        remaining -= n;
    }
}

/// Always reports C major (enumerant 6)
fn c_major(_: &[f32], _: u32) -> Classification {
    Classification::Key(Key::CMajor)
}

#[test]
fn test_end_to_end_displays_detected_key() {
    let mut detector = KeyDetector::with_config(44_100, c_major, &test_config(2.0)).unwrap();
    let reader = detector.reader();
    let mut updates = detector.subscribe();
    assert_eq!(reader.current_key_display(), "---");

    // Five default 2 s windows at 44.1 kHz in 128-frame callbacks
    feed_frames(&mut detector, 5 * 88_200, 128, 1_000);

    let ui = thread::spawn(move || wait_until(|| reader.current_key_display() == "C maj"));
    assert!(ui.join().unwrap(), "key never reached the reader thread");

    assert_eq!(Key::CMajor.index(), 6);
    assert_eq!(detector.current_key(), Some(Key::CMajor));

    let mut received = None;
    assert!(wait_until(|| {
        if let Ok(update) = updates.try_recv() {
            received = Some(update);
        }
        received.is_some()
    }));
    let update = received.unwrap();
    assert_eq!(update.raw, Key::CMajor);
    assert_eq!(update.displayed, Key::CMajor);

    let stats = detector.stats();
    assert!(stats.windows_published >= 1);
    assert_eq!(stats.windows_published + stats.windows_dropped, 5);
}

#[test]
fn test_silence_does_not_disturb_displayed_key() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier_calls = Arc::clone(&calls);
    let classifier = move |_: &[f32], _: u32| {
        if classifier_calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Classification::Key(Key::EFlatMajor)
        } else {
            Classification::Silence
        }
    };
    let mut detector = KeyDetector::with_config(8_000, classifier, &test_config(1.0)).unwrap();

    // Four 1 s windows at 8 kHz, none dropped
    feed_lossless(&mut detector, 32_000, 500);

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(detector.current_key(), Some(Key::EFlatMajor));
    let stats = detector.stats();
    assert_eq!(stats.windows_classified, 4);
    assert_eq!(stats.silent_windows, 3);
}

#[test]
fn test_votes_smooth_out_a_single_outlier() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier_calls = Arc::clone(&calls);
    let classifier = move |_: &[f32], _: u32| {
        let key = match classifier_calls.fetch_add(1, Ordering::SeqCst) {
            3 => Key::GFlatMinor,
            _ => Key::GMajor,
        };
        Classification::Key(key)
    };
    let mut detector = KeyDetector::with_config(8_000, classifier, &test_config(1.0)).unwrap();

    feed_lossless(&mut detector, 6 * 8_000, 1_000);

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(detector.current_key_display(), "G maj");
}

#[test]
fn test_set_window_resets_displayed_key() {
    let mut detector = KeyDetector::with_config(8_000, c_major, &test_config(1.0)).unwrap();

    feed_lossless(&mut detector, 8_000, 256);
    assert_eq!(detector.current_key_display(), "C maj");

    assert_eq!(detector.set_window(2.0), 2.0);
    assert_eq!(detector.current_key_display(), "---");
    assert_eq!(detector.get_param("detected_key").as_deref(), Some("---"));

    // 1.5 s is no longer a full window
    feed_lossless(&mut detector, 12_000, 256);
    assert_eq!(detector.current_key_display(), "---");

    feed_lossless(&mut detector, 4_000, 256);
    assert_eq!(detector.current_key_display(), "C maj");
}

#[test]
fn test_producer_never_blocks_on_stalled_consumer() {
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered = Arc::new(AtomicBool::new(false));
    let classifier_entered = Arc::clone(&entered);
    let classifier = move |_: &[f32], _: u32| {
        classifier_entered.store(true, Ordering::SeqCst);
        let _ = release_rx.recv_timeout(WAIT_TIMEOUT);
        Classification::Key(Key::DMajor)
    };
    let mut detector = KeyDetector::with_config(8_000, classifier, &test_config(1.0)).unwrap();

    feed_frames(&mut detector, 8_000, 128, 500);
    assert!(wait_until(|| entered.load(Ordering::SeqCst)));

    // Twenty more windows while the classifier is stuck
    let started = Instant::now();
    feed_frames(&mut detector, 20 * 8_000, 128, 500);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "feed stalled behind the analysis thread"
    );

    let stats = detector.stats();
    assert_eq!(stats.windows_published, 1);
    assert_eq!(stats.windows_dropped, 20);
    assert!(detector.has_pending_work());

    drop(release_tx);
    assert!(wait_until(|| detector.current_key() == Some(Key::DMajor)));
}

/// Checks that every window holds a single value
struct IntegrityCheck {
    expected_len: usize,
    windows: Arc<AtomicUsize>,
    torn: Arc<AtomicUsize>,
    rng: StdRng,
}

impl KeyClassifier for IntegrityCheck {
    fn classify(&mut self, samples: &[f32], _sample_rate: u32) -> Classification {
        self.windows.fetch_add(1, Ordering::SeqCst);
        let first = samples[0];
        // Stretch the read so the producer laps us
        if self.rng.gen_bool(0.3) {
            thread::sleep(Duration::from_micros(self.rng.gen_range(50..2_000)));
        }
        let consistent = samples.iter().all(|&s| s == first);
        if samples.len() != self.expected_len || !consistent {
            self.torn.fetch_add(1, Ordering::SeqCst);
        }
        Classification::Key(Key::AMinor)
    }
}

#[test]
fn test_handoff_never_tears_windows() {
    const WINDOW_FRAMES: usize = 8_000;
    const WINDOWS: usize = 300;

    let windows = Arc::new(AtomicUsize::new(0));
    let torn = Arc::new(AtomicUsize::new(0));
    let classifier = IntegrityCheck {
        expected_len: WINDOW_FRAMES / 4,
        windows: Arc::clone(&windows),
        torn: Arc::clone(&torn),
        rng: StdRng::seed_from_u64(7),
    };
    let mut detector = KeyDetector::with_config(8_000, classifier, &test_config(1.0)).unwrap();

    // Each window carries its own constant value; block sizes are random so
    // window boundaries fall mid-block
    let mut rng = StdRng::seed_from_u64(42);
    let total_frames = WINDOW_FRAMES * WINDOWS;
    let mut frame = 0;
    let mut block = Vec::with_capacity(2 * 1_024);
    while frame < total_frames {
        let n = rng.gen_range(1..=1_024).min(total_frames - frame);
        block.clear();
        for i in frame..frame + n {
            let value = ((i / WINDOW_FRAMES) % 1_000) as i16 * 16 + 16;
            block.extend_from_slice(&[value, value]);
        }
        detector.feed(&block);
        frame += n;
        if rng.gen_bool(0.05) {
            thread::yield_now();
        }
    }

    assert!(wait_until(|| !detector.has_pending_work()));
    let stats = detector.stats();
    assert_eq!(torn.load(Ordering::SeqCst), 0, "torn windows observed");
    assert!(windows.load(Ordering::SeqCst) > 0);
    assert_eq!(
        stats.windows_published + stats.windows_dropped,
        WINDOWS as u64
    );
    assert_eq!(stats.windows_classified, stats.windows_published);
}

/// Sets a flag when the classifier is dropped with its thread
struct DropProbe {
    dropped: Arc<AtomicBool>,
}

impl KeyClassifier for DropProbe {
    fn classify(&mut self, _samples: &[f32], _sample_rate: u32) -> Classification {
        Classification::Silence
    }
}

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_drop_joins_analysis_thread() {
    let dropped = Arc::new(AtomicBool::new(false));
    let probe = DropProbe {
        dropped: Arc::clone(&dropped),
    };
    let mut detector = KeyDetector::with_config(16_000, probe, &test_config(1.0)).unwrap();
    feed_frames(&mut detector, 20_000, 160, 0);

    drop(detector);
    assert!(
        dropped.load(Ordering::SeqCst),
        "classifier outlived the detector"
    );
}

#[test]
fn test_create_reports_error_codes() {
    let err = KeyDetector::new(4_000, c_major).err().unwrap();
    assert!(matches!(
        err,
        KeyDetectError::InvalidSampleRate { sample_rate: 4_000 }
    ));
    assert_eq!(err.code(), 1001);
    assert!(err.message().contains("4000"));
}
