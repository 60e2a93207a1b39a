use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use approx::assert_abs_diff_eq;
use rust_sinewave::waveform::buffer::samples_from_le_bytes;
use rust_sinewave::waveform::coordinator::CoordinatorSettings;
use rust_sinewave::waveform::{
    ChangeStatus, LifecycleState, ManualClock, OutputSink, ParameterId, ParameterSnapshot,
    TickCoordinator,
};
use rust_sinewave::WaveformError;

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<(u64, Vec<u8>)>>,
}

impl OutputSink for RecordingSink {
    fn push(&self, payload: &[u8], sequence: u64) {
        self.records
            .lock()
            .unwrap()
            .push((sequence, payload.to_vec()));
    }
}

fn pure_sine(sample_count: usize) -> CoordinatorSettings {
    CoordinatorSettings {
        initial: ParameterSnapshot {
            sample_count,
            gain: 1.0,
            noise_gain: 0.0,
            ..Default::default()
        },
        max_sample_count: 1024,
        seed: Some(1),
        ..Default::default()
    }
}

fn assert_pure_sine(payload: &[u8]) {
    let samples = samples_from_le_bytes(payload);
    let n = samples.len();
    assert_eq!(payload.len(), n * 8);
    for (i, sample) in samples.iter().enumerate() {
        let expected = (i as f64 * 2.0 * PI / n as f64).sin();
        assert_abs_diff_eq!(*sample, expected, epsilon = 1e-9);
    }
}

#[test]
fn test_four_point_sine_end_to_end() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(RecordingSink::default());
    let coordinator = TickCoordinator::new(pure_sine(4), clock.clone(), sink.clone());

    let outcome = coordinator.on_tick();
    assert_eq!(outcome.sequence, 1);

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    let samples = samples_from_le_bytes(&records[0].1);
    for (sample, expected) in samples.iter().zip([0.0, 1.0, 0.0, -1.0]) {
        assert_abs_diff_eq!(*sample, expected, epsilon = 1e-12);
    }
}

#[test]
fn test_default_unit_publishes_noisy_wave() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(RecordingSink::default());
    let coordinator = TickCoordinator::new(
        CoordinatorSettings {
            seed: Some(3),
            ..Default::default()
        },
        clock,
        sink.clone(),
    );

    coordinator.on_tick();
    let records = sink.records.lock().unwrap();
    let samples = samples_from_le_bytes(&records[0].1);
    assert_eq!(samples.len(), 30);
    for (i, sample) in samples.iter().enumerate() {
        let clean = 5.0 * (i as f64 * 2.0 * PI / 30.0).sin();
        // Noise is bounded by noise_gain
        assert!((sample - clean).abs() <= 0.5 + 1e-12);
    }
}

#[test]
fn test_shrinking_to_zero_stops_publication() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(RecordingSink::default());
    let coordinator = TickCoordinator::new(pure_sine(30), clock.clone(), sink.clone());

    coordinator.on_tick();
    coordinator.set_sample_count(0);
    for _ in 0..3 {
        clock.advance(101);
        coordinator.on_tick();
    }

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(coordinator.sequence(), 4);
    assert_eq!(
        coordinator.parameters().status(ParameterId::SampleCount),
        ChangeStatus::Completed
    );
}

#[test]
fn test_unknown_parameter_is_rejected() {
    let clock = Arc::new(ManualClock::new(0));
    let coordinator = TickCoordinator::new(
        pure_sine(4),
        clock,
        Arc::new(RecordingSink::default()),
    );

    let err = coordinator.set_parameter("amplitude", 1.0).unwrap_err();
    assert_eq!(
        err,
        WaveformError::UnknownParameter {
            name: "amplitude".to_string()
        }
    );
    assert!(!coordinator.parameters().has_pending_changes());
}

#[test]
fn test_quit_suspends_publication_until_reinitialized() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(RecordingSink::default());
    let coordinator = TickCoordinator::new(pure_sine(8), clock.clone(), sink.clone());

    clock.advance(10_001);
    coordinator.on_tick();
    assert_eq!(coordinator.lifecycle_state(), LifecycleState::Stack);

    coordinator.request_quit();
    clock.advance(1);
    coordinator.on_tick();
    assert_eq!(coordinator.lifecycle_state(), LifecycleState::End);
    let sequence = coordinator.sequence();

    for _ in 0..10 {
        clock.advance(50_000);
        assert!(coordinator.on_tick().suspended);
    }
    assert_eq!(coordinator.lifecycle_state(), LifecycleState::End);
    assert_eq!(coordinator.sequence(), sequence);
    assert_eq!(sink.records.lock().unwrap().len(), 2);

    coordinator.reinitialize().unwrap();
    let outcome = coordinator.on_tick();
    assert_eq!(outcome.sequence, sequence + 1);
    assert!(outcome.published());
}

#[test]
fn test_concurrent_resizes_never_tear_a_payload() {
    let clock = Arc::new(ManualClock::new(0));
    let sink = Arc::new(RecordingSink::default());
    let coordinator = Arc::new(TickCoordinator::new(
        pure_sine(16),
        clock.clone(),
        sink.clone(),
    ));
    let stop = Arc::new(AtomicBool::new(false));

    let mut writers = Vec::new();
    for writer in 0..4i64 {
        let coordinator = coordinator.clone();
        let stop = stop.clone();
        writers.push(thread::spawn(move || {
            let mut count = writer;
            while !stop.load(Ordering::Relaxed) {
                count = (count * 31 + 7) % 300 - 20;
                if writer % 2 == 0 {
                    coordinator.set_sample_count(count);
                } else {
                    let _ = coordinator.resize_now(count);
                }
                thread::yield_now();
            }
        }));
    }

    for _ in 0..2_000 {
        clock.advance(101);
        let outcome = coordinator.on_tick();
        assert!(outcome.failed.is_empty());
    }
    stop.store(true, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }

    let records = sink.records.lock().unwrap();
    assert!(!records.is_empty());
    let mut last_sequence = 0;
    for (sequence, payload) in records.iter() {
        assert!(*sequence > last_sequence);
        last_sequence = *sequence;
        assert_pure_sine(payload);
    }
    assert_eq!(coordinator.sequence(), 2_000);
}

#[test]
fn test_stored_count_matches_buffer_once_quiet() {
    let clock = Arc::new(ManualClock::new(0));
    let coordinator = Arc::new(TickCoordinator::new(
        CoordinatorSettings {
            max_sample_count: 4096,
            ..pure_sine(16)
        },
        clock.clone(),
        Arc::new(RecordingSink::default()),
    ));
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let coordinator = coordinator.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut count = 0i64;
            while !stop.load(Ordering::Relaxed) {
                count = (count + 61) % 700;
                coordinator.resize_now(count).unwrap();
            }
        })
    };

    for k in 0..1_000 {
        coordinator.set_sample_count(1_000 + k % 100);
        clock.advance(101);
        coordinator.on_tick();
    }
    stop.store(true, Ordering::Relaxed);
    writer.join().unwrap();

    // One more poll with nothing left to apply
    clock.advance(101);
    coordinator.on_tick();
    assert!(!coordinator.parameters().has_pending_changes());
    assert_eq!(
        coordinator.parameters().sample_count(),
        coordinator.engine().len()
    );
    assert_eq!(
        coordinator.parameters().status(ParameterId::SampleCount),
        ChangeStatus::Completed
    );
}
