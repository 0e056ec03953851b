use super::mapper::KeyframeRecord;

/// Persistence seam: the run hands each captured keyframe to the host
/// exactly once, in stream order. The core stores nothing itself.
pub trait KeyframeSink {
    fn accept(&mut self, record: KeyframeRecord);
}

/// Collecting sink for callers that want an owned sequence.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<KeyframeRecord>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_records(self) -> Vec<KeyframeRecord> {
        self.records
    }
}

impl KeyframeSink for VecSink {
    fn accept(&mut self, record: KeyframeRecord) {
        self.records.push(record);
    }
}

/// Stateless pass-through that defines the output contract: strictly
/// increasing frame indices, deduplicated by construction upstream.
#[derive(Debug, Default)]
pub struct KeyframeEmitter {
    last_index: Option<u64>,
    emitted: usize,
}

impl KeyframeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, record: KeyframeRecord, sink: &mut dyn KeyframeSink) {
        if let Some(last) = self.last_index {
            debug_assert!(
                record.frame_index > last,
                "keyframe order violated: {} after {}",
                record.frame_index,
                last
            );
        }
        self.last_index = Some(record.frame_index);
        self.emitted += 1;
        sink.accept(record);
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::frame::Frame;

    fn record(frame_index: u64) -> KeyframeRecord {
        KeyframeRecord {
            frame_index,
            timestamp_seconds: frame_index as f64 / 10.0,
            image: Frame::filled(4, 4, [0, 0, 0]),
        }
    }

    #[test]
    fn test_emitter_preserves_order_and_count() {
        let mut emitter = KeyframeEmitter::new();
        let mut sink = VecSink::new();

        for i in [0u64, 10, 25] {
            emitter.emit(record(i), &mut sink);
        }

        assert_eq!(emitter.emitted(), 3);
        let indices: Vec<u64> = sink.records.iter().map(|r| r.frame_index).collect();
        assert_eq!(indices, vec![0, 10, 25]);
    }

    #[test]
    #[should_panic(expected = "keyframe order violated")]
    fn test_emitter_rejects_out_of_order() {
        let mut emitter = KeyframeEmitter::new();
        let mut sink = VecSink::new();
        emitter.emit(record(10), &mut sink);
        emitter.emit(record(5), &mut sink);
    }
}
