//! PCM16 audio buffering and backpressure (`§4.1` "Buffer and backpressure").

use std::collections::VecDeque;
use std::time::Duration;

/// Always mono 16-bit PCM at a provider-determined sample rate (16 kHz
/// Gemini, 24 kHz OpenAI transcribe; `§6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
}

impl AudioFormat {
    pub const fn new(sample_rate_hz: u32) -> Self {
        Self { sample_rate_hz }
    }

    /// Bytes per millisecond of mono 16-bit PCM at this sample rate.
    pub fn bytes_per_ms(&self) -> f64 {
        (self.sample_rate_hz as f64 * 2.0) / 1000.0
    }

    pub fn duration_of(&self, byte_len: usize) -> Duration {
        Duration::from_secs_f64(byte_len as f64 / (self.sample_rate_hz as f64 * 2.0))
    }
}

/// One frame of inbound PCM16 audio, still owned by the session until
/// the adapter accepts it.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
}

impl AudioChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn duration(&self, format: AudioFormat) -> Duration {
        format.duration_of(self.bytes.len())
    }
}

/// Outcome of enqueueing a chunk, telling the session which backpressure
/// events (if any) to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressureTransition {
    None,
    Paused,
    Resumed,
}

/// Bounded FIFO of not-yet-forwarded audio frames. Tracks enqueued
/// duration against `max_buffer_ms`; a drain loop pulls from the front
/// while the adapter keeps accepting.
pub struct SmartAudioBuffer {
    format: AudioFormat,
    max_buffer_ms: u32,
    queue: VecDeque<AudioChunk>,
    enqueued: Duration,
    paused: bool,
}

impl SmartAudioBuffer {
    pub fn new(format: AudioFormat, max_buffer_ms: u32) -> Self {
        Self { format, max_buffer_ms, queue: VecDeque::new(), enqueued: Duration::ZERO, paused: false }
    }

    fn high_water_mark(&self) -> Duration {
        Duration::from_millis(self.max_buffer_ms as u64 / 2)
    }

    fn low_water_mark(&self) -> Duration {
        self.high_water_mark() / 2
    }

    /// Enqueue a frame the adapter couldn't accept yet. Returns whether
    /// the transport read side should transition to paused.
    pub fn enqueue(&mut self, chunk: AudioChunk) -> BackpressureTransition {
        self.enqueued += chunk.duration(self.format);
        self.queue.push_back(chunk);
        if !self.paused && self.enqueued > self.high_water_mark() {
            self.paused = true;
            return BackpressureTransition::Paused;
        }
        BackpressureTransition::None
    }

    /// Pop the next buffered frame for a drain-loop retry, returning
    /// whether the transport should resume.
    pub fn dequeue(&mut self) -> (Option<AudioChunk>, BackpressureTransition) {
        let Some(chunk) = self.queue.pop_front() else { return (None, BackpressureTransition::None) };
        self.enqueued = self.enqueued.saturating_sub(chunk.duration(self.format));
        if self.paused && self.enqueued < self.low_water_mark() {
            self.paused = false;
            return (Some(chunk), BackpressureTransition::Resumed);
        }
        (Some(chunk), BackpressureTransition::None)
    }

    /// Put a frame the adapter still couldn't accept back at the front
    /// of the queue, undoing the `dequeue` that pulled it out. The drain
    /// loop uses this to retry the same frame next tick without
    /// reordering the rest of the buffer.
    pub fn requeue_front(&mut self, chunk: AudioChunk) {
        self.enqueued += chunk.duration(self.format);
        if !self.paused && self.enqueued > self.high_water_mark() {
            self.paused = true;
        }
        self.queue.push_front(chunk);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn enqueued_duration(&self) -> Duration {
        self.enqueued
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.enqueued = Duration::ZERO;
        self.paused = false;
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI_FORMAT: AudioFormat = AudioFormat::new(24_000);

    fn chunk_of_ms(ms: u64) -> AudioChunk {
        let bytes = (OPENAI_FORMAT.bytes_per_ms() * ms as f64) as usize;
        AudioChunk::new(vec![0u8; bytes])
    }

    #[test]
    fn pauses_past_the_high_water_mark() {
        let mut buffer = SmartAudioBuffer::new(OPENAI_FORMAT, 1000);
        let transition = buffer.enqueue(chunk_of_ms(600));
        assert_eq!(transition, BackpressureTransition::Paused);
        assert!(buffer.is_paused());
    }

    #[test]
    fn resumes_below_the_low_water_mark() {
        let mut buffer = SmartAudioBuffer::new(OPENAI_FORMAT, 1000);
        buffer.enqueue(chunk_of_ms(600));
        let (_, transition) = buffer.dequeue();
        assert_eq!(transition, BackpressureTransition::Resumed);
        assert!(!buffer.is_paused());
    }

    #[test]
    fn clear_drops_everything_buffered() {
        let mut buffer = SmartAudioBuffer::new(OPENAI_FORMAT, 1000);
        buffer.enqueue(chunk_of_ms(100));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.enqueued_duration(), Duration::ZERO);
    }

    #[test]
    fn duration_of_matches_sample_rate() {
        let chunk = chunk_of_ms(1000);
        assert!((chunk.duration(OPENAI_FORMAT).as_secs_f64() - 1.0).abs() < 0.001);
    }

    #[test]
    fn requeue_front_restores_dequeued_chunk_without_reordering() {
        let mut buffer = SmartAudioBuffer::new(OPENAI_FORMAT, 1000);
        buffer.enqueue(chunk_of_ms(100));
        buffer.enqueue(chunk_of_ms(200));
        let before = buffer.enqueued_duration();

        let (chunk, _) = buffer.dequeue();
        let chunk = chunk.expect("first chunk should dequeue");
        buffer.requeue_front(chunk);

        assert_eq!(buffer.enqueued_duration(), before);
        let (next, _) = buffer.dequeue();
        assert_eq!(next.expect("requeued chunk should dequeue first").bytes.len(), chunk_of_ms(100).bytes.len());
    }

    #[test]
    fn requeue_front_can_repause_the_transport() {
        let mut buffer = SmartAudioBuffer::new(OPENAI_FORMAT, 1000);
        buffer.enqueue(chunk_of_ms(600));
        let (chunk, transition) = buffer.dequeue();
        assert_eq!(transition, BackpressureTransition::Resumed);
        assert!(!buffer.is_paused());

        buffer.requeue_front(chunk.unwrap());
        assert!(buffer.is_paused());
    }
}
