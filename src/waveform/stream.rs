// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sample streaming module
//!
//! This module provides a shared broadcast stream carrying the sample buffers
//! published by the tick coordinator to any number of consumers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::waveform::buffer::samples_from_le_bytes;
use crate::waveform::OutputSink;

/// One published sample buffer with its metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleRecord {
    /// Sequence number of the tick that produced the buffer
    pub sequence: u64,
    /// Publication time in milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Packed little-endian `f64` samples
    pub payload: Vec<u8>,
}

impl SampleRecord {
    pub fn new(sequence: u64, payload: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp: current_timestamp_ms(),
            payload,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.payload.len() / std::mem::size_of::<f64>()
    }

    /// Decoded samples
    pub fn samples(&self) -> Vec<f64> {
        samples_from_le_bytes(&self.payload)
    }
}

/// Statistics about the sample stream
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamStats {
    /// Total number of records published
    pub total_records: u64,
    /// Total payload bytes published
    pub total_bytes: u64,
    /// Records published while nobody was subscribed
    pub unobserved_records: u64,
    /// Number of active subscribers
    pub active_subscribers: usize,
    /// Sequence number of the latest record
    pub last_sequence: u64,
    /// Sample count of the latest record
    pub last_sample_count: usize,
}

/// Shared sample stream for broadcasting records to multiple consumers
#[derive(Clone, Debug)]
pub struct SharedSampleStream {
    sender: broadcast::Sender<SampleRecord>,
    latest_record: Arc<Mutex<Option<SampleRecord>>>,
    stats: Arc<Mutex<StreamStats>>,
}

impl SharedSampleStream {
    /// Create a new shared sample stream
    ///
    /// ### Parameters
    /// * `buffer_size` - Size of the broadcast channel buffer
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));

        Self {
            sender,
            latest_record: Arc::new(Mutex::new(None)),
            stats: Arc::new(Mutex::new(StreamStats::default())),
        }
    }

    fn stats_guard(&self) -> MutexGuard<'_, StreamStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a receiver for subscribing to the stream
    pub fn subscribe(&self) -> broadcast::Receiver<SampleRecord> {
        self.sender.subscribe()
    }

    /// Publish a record to all subscribers
    pub fn publish(&self, record: SampleRecord) {
        *self
            .latest_record
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(record.clone());

        let observed = {
            let mut stats = self.stats_guard();
            stats.total_records += 1;
            stats.total_bytes += record.payload.len() as u64;
            stats.last_sequence = record.sequence;
            stats.last_sample_count = record.sample_count();
            stats.active_subscribers = self.sender.receiver_count();
            stats.active_subscribers > 0
        };

        if !observed {
            self.stats_guard().unobserved_records += 1;
            return;
        }

        if let Err(broadcast::error::SendError(record)) = self.sender.send(record) {
            // Every receiver went away since the count above
            debug!("Sample record #{} had no receiver", record.sequence);
        }
    }

    /// Get the latest record (for new subscribers)
    pub fn get_latest_record(&self) -> Option<SampleRecord> {
        self.latest_record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get current stream statistics
    pub fn get_stats(&self) -> StreamStats {
        let mut stats = self.stats_guard().clone();
        stats.active_subscribers = self.sender.receiver_count();
        stats
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl OutputSink for SharedSampleStream {
    fn push(&self, payload: &[u8], sequence: u64) {
        self.publish(SampleRecord::new(sequence, payload.to_vec()));
    }
}

/// Consumer interface for reading from the shared stream
pub struct SampleStreamConsumer {
    receiver: broadcast::Receiver<SampleRecord>,
}

impl SampleStreamConsumer {
    /// Create a new consumer from a shared stream
    pub fn new(stream: &SharedSampleStream) -> Self {
        Self {
            receiver: stream.subscribe(),
        }
    }

    /// Get the next record from the stream
    /// Returns None once the stream is closed
    pub async fn next_record(&mut self) -> Option<SampleRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "Sample stream consumer lagged behind, skipped {} records",
                        skipped
                    );
                }
            }
        }
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscriber() {
        let stream = SharedSampleStream::new(8);
        stream.push(&[0u8; 16], 1);

        let stats = stream.get_stats();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.total_bytes, 16);
        assert_eq!(stats.unobserved_records, 1);
        assert_eq!(stats.last_sample_count, 2);
        assert_eq!(stream.get_latest_record().unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_consumer_receives_records_in_order() {
        let stream = SharedSampleStream::new(8);
        let mut consumer = SampleStreamConsumer::new(&stream);

        stream.push(&1.5f64.to_le_bytes(), 7);
        stream.push(&(-2.0f64).to_le_bytes(), 8);

        let first = consumer.next_record().await.unwrap();
        assert_eq!(first.sequence, 7);
        assert_eq!(first.samples(), vec![1.5]);
        let second = consumer.next_record().await.unwrap();
        assert_eq!(second.sequence, 8);
        assert_eq!(stream.get_stats().unobserved_records, 0);
    }

    #[tokio::test]
    async fn test_lagging_consumer_skips_to_newest() {
        let stream = SharedSampleStream::new(2);
        let mut consumer = SampleStreamConsumer::new(&stream);
        for sequence in 1..=5 {
            stream.push(&[0u8; 8], sequence);
        }
        let record = consumer.next_record().await.unwrap();
        assert_eq!(record.sequence, 4);
    }
}
