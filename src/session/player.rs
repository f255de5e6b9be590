//! Player session and tick driver.
//!
//! The player thread owns one [`PlayerSession`] and drives it from a
//! `tokio::time::interval` loop (§2/§4.4). Queue items are held in a
//! `VecDeque` rather than the original's doubly linked list — the §9
//! design note's "slab for the player-source list" translated to an
//! index-free, drain-from-the-head queue, which is the natural Rust
//! shape for "free one item at a time from the head".

use std::collections::VecDeque;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;
use crate::quality::MediaQuality;

/// One item materialised from the queue, with the timing fields the
/// tick driver needs to schedule reads and track transitions.
#[derive(Debug, Clone)]
pub struct PlayerSource {
    /// Queue item id (stable across the track's lifetime).
    pub queue_item_id: u64,
    /// Library file id.
    pub file_id: u64,
    /// Path or URI the input module opens to read samples.
    pub path: String,
    /// Track length, in milliseconds.
    pub length_ms: u32,
    /// Quality this source was opened at.
    pub quality: MediaQuality,
    /// First sample index the input module will read for this track.
    pub read_start: u64,
    /// Last sample index the input module will read for this track.
    pub read_end: u64,
    /// First sample index considered "now playing" for this track.
    pub play_start: u64,
    /// Last sample index considered "now playing"; `read_end +
    /// output_buffer_samples`.
    pub play_end: u64,
    /// User-requested seek offset, in milliseconds, applied when this
    /// source was opened.
    pub seek_ms: u32,
    /// Output-buffer depth, in samples, for this source's quality.
    pub output_buffer_samples: u32,
}

impl PlayerSource {
    /// Position, in milliseconds, for an absolute sample position
    /// `pos` that has advanced past [`Self::play_start`].
    #[must_use]
    pub fn pos_ms(&self, pos: u64, sample_rate: u32) -> u32 {
        let played = pos.saturating_sub(self.play_start);
        self.seek_ms + ((played * 1000) / u64::from(sample_rate)) as u32
    }
}

/// Repeat behaviour at queue-item advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop at queue end.
    #[default]
    Off,
    /// Re-fetch the same item as "next".
    Song,
    /// Wrap to position 0 at queue end, reshuffling if shuffle is on.
    All,
}

/// Queue traversal order; a property of traversal only, not of the
/// items themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMode {
    /// Sequential order.
    #[default]
    Off,
    /// Shuffled order, pivoted on the currently playing item.
    On,
}

/// Absolute vs. relative seek target.
#[derive(Debug, Clone, Copy)]
pub enum SeekMode {
    /// Seek to an absolute position within the current track.
    Position(u32),
    /// Seek by a signed delta from the current position.
    Relative(i32),
}

/// Bits an `InputSource::read` call reports alongside the bytes it
/// wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadFlags {
    /// The input module has moved on to the next queue item.
    pub start_next: bool,
    /// End of input reached on the last source.
    pub eof: bool,
    /// A read error occurred; the tick driver should suspend.
    pub error: bool,
    /// New metadata is available for the current source.
    pub metadata: bool,
    /// The active source's quality changed.
    pub quality: bool,
}

/// External collaborator the input module exposes to the player
/// thread: a nonblocking byte source plus the out-of-band flags that
/// drive track-boundary handling.
pub trait InputSource: Send {
    /// Attempt to fill `buf` without blocking. Returns the number of
    /// bytes written and any flags raised by this read.
    fn read(&mut self, buf: &mut [u8]) -> Result<(usize, ReadFlags), CoreError>;
}

/// Player-thread-owned playback state (§3 `PlayerSession`).
pub struct PlayerSession {
    /// Scratch buffer sized to one tick's worth of samples.
    pub buffer: Vec<u8>,
    /// Absolute sample position; monotone non-decreasing while
    /// playing.
    pub pos: u64,
    /// Active quality.
    pub quality: MediaQuality,
    /// Accumulated short-read deficit, in samples.
    pub read_deficit: u32,
    /// Deficit at which the player suspends (`PLAYER_READ_BEHIND_MAX`
    /// expressed in samples for the active quality).
    pub read_deficit_cap: u32,
    /// Queue items, head-first; the head is freed once `playing_now`
    /// advances past it.
    queue: VecDeque<PlayerSource>,
    /// Id of the source currently being read from the input module.
    pub reading_now: Option<u64>,
    /// Id of the source currently audible.
    pub playing_now: Option<u64>,
    /// Repeat behaviour.
    pub repeat: RepeatMode,
    /// Shuffle behaviour.
    pub shuffle: ShuffleMode,
    /// Consecutive write-overrun recovery cycles (§5 watchdog).
    overrun_cycles: u8,
    /// Suspended pending a "buffer full -> resume" callback from the
    /// input module.
    pub suspended: bool,
}

/// Outcome of one [`PlayerSession::tick`] call, for the caller (the
/// tick driver loop) to act on.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// A track reached its play-end boundary this tick.
    pub track_ended: Option<u64>,
    /// Playback reached the first sample of a new track.
    pub track_started: Option<u64>,
    /// The player suspended due to read deficit or write overrun.
    pub suspended: bool,
    /// Playback ended: no more queue items.
    pub playback_ended: bool,
    /// Number of frames read this tick, for the caller to hand to
    /// every output backend.
    pub frames_read: u32,
}

impl PlayerSession {
    /// Maximum consecutive write-overrun recovery cycles before
    /// aborting playback (§5).
    pub const MAX_OVERRUN_CYCLES: u8 = 2;

    /// Create an empty, stopped session sized for `quality` with the
    /// given read-behind cap (milliseconds, converted to samples).
    #[must_use]
    pub fn new(quality: MediaQuality, read_behind_max_ms: u32) -> Self {
        let bytes_per_tick = quality.bytes_for_frames(quality.frames_for_millis(10)) as usize;
        Self {
            buffer: vec![0u8; bytes_per_tick.max(1)],
            pos: 0,
            quality,
            read_deficit: 0,
            read_deficit_cap: quality.frames_for_millis(read_behind_max_ms),
            queue: VecDeque::new(),
            reading_now: None,
            playing_now: None,
            repeat: RepeatMode::Off,
            shuffle: ShuffleMode::Off,
            overrun_cycles: 0,
            suspended: false,
        }
    }

    /// Enqueue a source at the tail of the queue.
    pub fn enqueue(&mut self, source: PlayerSource) {
        if self.reading_now.is_none() {
            self.reading_now = Some(source.queue_item_id);
        }
        if self.playing_now.is_none() {
            self.playing_now = Some(source.queue_item_id);
        }
        self.queue.push_back(source);
    }

    /// Look up a source by queue item id.
    #[must_use]
    pub fn source(&self, id: u64) -> Option<&PlayerSource> {
        self.queue.iter().find(|s| s.queue_item_id == id)
    }

    /// Whether the queue holds any sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drive one tick: read one tick's worth of bytes from `input`,
    /// react to its flags, advance playback position, and report what
    /// happened (§4.4 steps 1-6).
    pub fn tick(&mut self, input: &mut dyn InputSource, late_ticks: u32) -> Result<TickOutcome, CoreError> {
        let mut outcome = TickOutcome::default();

        if late_ticks > self.write_behind_cap_ticks() {
            self.overrun_cycles += 1;
            outcome.suspended = true;
            self.suspended = true;
            if self.overrun_cycles > Self::MAX_OVERRUN_CYCLES {
                outcome.playback_ended = true;
            }
            return Ok(outcome);
        }
        self.overrun_cycles = 0;

        let (n, flags) = input.read(&mut self.buffer)?;

        if flags.error {
            outcome.suspended = true;
            self.suspended = true;
            return Ok(outcome);
        }

        let bytes_per_frame = self.quality.bytes_per_frame().max(1);
        let frames_read = (n as u32) / bytes_per_frame;
        outcome.frames_read = frames_read;

        let expected_frames = (self.buffer.len() as u32) / bytes_per_frame;
        if frames_read < expected_frames {
            self.read_deficit += expected_frames - frames_read;
            if self.read_deficit > self.read_deficit_cap {
                outcome.suspended = true;
                self.suspended = true;
                return Ok(outcome);
            }
        } else {
            self.read_deficit = self.read_deficit.saturating_sub(frames_read.saturating_sub(expected_frames));
        }

        if flags.start_next {
            self.advance_reading_now();
        }

        self.pos += u64::from(frames_read);

        if let Some(playing_id) = self.playing_now {
            if let Some(source) = self.source(playing_id) {
                if self.pos >= source.play_end {
                    outcome.track_ended = Some(playing_id);
                    self.advance_playing_now();
                    if self.playing_now.is_none() {
                        outcome.playback_ended = true;
                    } else {
                        outcome.track_started = self.playing_now;
                    }
                }
            }
        }

        if flags.eof && self.reading_now.is_none() && self.playing_now.is_none() {
            outcome.playback_ended = true;
        }

        Ok(outcome)
    }

    fn write_behind_cap_ticks(&self) -> u32 {
        // PLAYER_WRITE_BEHIND_MAX expressed in 10ms ticks (default
        // 1500ms -> 150 ticks).
        150
    }

    fn advance_reading_now(&mut self) {
        let Some(current) = self.reading_now else { return };
        let next_id = self
            .queue
            .iter()
            .skip_while(|s| s.queue_item_id != current)
            .nth(1)
            .map(|s| s.queue_item_id);
        self.reading_now = next_id.or(match self.repeat {
            RepeatMode::Song => Some(current),
            RepeatMode::All => self.queue.front().map(|s| s.queue_item_id),
            RepeatMode::Off => None,
        });
    }

    fn advance_playing_now(&mut self) {
        let Some(current) = self.playing_now else { return };

        // Free the consumed item from the head of the queue.
        while self.queue.front().is_some_and(|s| s.queue_item_id == current) {
            self.queue.pop_front();
        }

        self.playing_now = match self.repeat {
            RepeatMode::Song => Some(current),
            RepeatMode::All if self.queue.is_empty() => None,
            RepeatMode::All => self.queue.front().map(|s| s.queue_item_id),
            RepeatMode::Off => self.queue.front().map(|s| s.queue_item_id),
        };

        if self.shuffle == ShuffleMode::On && self.repeat == RepeatMode::All {
            self.reshuffle();
        }
    }

    /// Reshuffle the remaining queue in place, keeping the currently
    /// playing item pinned as the pivot.
    pub fn reshuffle(&mut self) {
        let pivot = self.playing_now;
        let mut rest: Vec<PlayerSource> = self
            .queue
            .iter()
            .filter(|s| Some(s.queue_item_id) != pivot)
            .cloned()
            .collect();
        rest.shuffle(&mut rand::thread_rng());

        let mut new_queue = VecDeque::with_capacity(self.queue.len());
        if let Some(pivot_id) = pivot {
            if let Some(p) = self.queue.iter().find(|s| s.queue_item_id == pivot_id).cloned() {
                new_queue.push_back(p);
            }
        }
        new_queue.extend(rest);
        self.queue = new_queue;
    }

    /// Resolve a seek request against the current and adjacent tracks
    /// per §4.4's `SeekMode` semantics.
    #[must_use]
    pub fn resolve_seek(&self, mode: SeekMode, current_pos_ms: u32) -> Option<(u64, u32)> {
        let playing_id = self.playing_now?;
        let playing = self.source(playing_id)?;

        match mode {
            SeekMode::Position(target_ms) => {
                if target_ms >= playing.length_ms {
                    self.next_track_id(playing_id).map(|id| (id, 0))
                } else {
                    Some((playing_id, target_ms))
                }
            }
            SeekMode::Relative(delta_ms) => {
                let new_pos = i64::from(current_pos_ms) + i64::from(delta_ms);
                if new_pos < 0 && current_pos_ms < 3000 {
                    let prev = self.prev_track_id(playing_id)?;
                    let prev_source = self.source(prev)?;
                    let at = (i64::from(prev_source.length_ms) + i64::from(delta_ms)).max(0) as u32;
                    Some((prev, at))
                } else if new_pos < 0 {
                    Some((playing_id, 0))
                } else if new_pos as u32 >= playing.length_ms {
                    self.next_track_id(playing_id).map(|id| (id, 0))
                } else {
                    Some((playing_id, new_pos as u32))
                }
            }
        }
    }

    fn next_track_id(&self, id: u64) -> Option<u64> {
        self.queue
            .iter()
            .skip_while(|s| s.queue_item_id != id)
            .nth(1)
            .map(|s| s.queue_item_id)
    }

    fn prev_track_id(&self, id: u64) -> Option<u64> {
        let pos = self.queue.iter().position(|s| s.queue_item_id == id)?;
        pos.checked_sub(1).and_then(|p| self.queue.get(p)).map(|s| s.queue_item_id)
    }
}

/// Commands submitted to the player thread via the mailbox (§4.9).
/// Each carries an optional bottom-half continuation that runs once
/// any async work the command triggers completes.
#[derive(Debug)]
pub enum PlayerCommand {
    /// Resume or start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Seek within or across tracks.
    Seek(SeekMode),
    /// Set master volume (0-100).
    Volume(u8),
    /// Select or deselect an output device.
    SpeakerSelect {
        /// Device id.
        device_id: u64,
        /// Whether the device should be selected.
        selected: bool,
    },
    /// Set shuffle mode.
    Shuffle(ShuffleMode),
    /// Set repeat mode.
    Repeat(RepeatMode),
    /// Stop the player task.
    Quit,
}

/// One mailbox entry: a command plus its optional completion
/// continuation.
pub struct Mailed {
    /// The command itself.
    pub command: PlayerCommand,
    /// Bottom-half continuation, signalled once the command has been
    /// fully handled.
    pub completion: Option<oneshot::Sender<Result<(), CoreError>>>,
}

/// Producer handle for the player command mailbox.
#[derive(Clone)]
pub struct MailboxSender {
    tx: mpsc::UnboundedSender<Mailed>,
}

impl MailboxSender {
    /// Submit a command without waiting for its completion.
    pub fn post(&self, command: PlayerCommand) {
        let _ = self.tx.send(Mailed { command, completion: None });
    }

    /// Submit a command and await its completion.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DeviceBusy`] if the player task has
    /// already shut down.
    pub async fn post_and_wait(&self, command: PlayerCommand) -> Result<(), CoreError> {
        let (completion, rx) = oneshot::channel();
        self.tx
            .send(Mailed { command, completion: Some(completion) })
            .map_err(|_| CoreError::DeviceBusy)?;
        rx.await.map_err(|_| CoreError::DeviceBusy)?
    }
}

/// Create a new command mailbox; returns the producer handle and the
/// consumer the player task drains in FIFO order.
#[must_use]
pub fn mailbox() -> (MailboxSender, mpsc::UnboundedReceiver<Mailed>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MailboxSender { tx }, rx)
}

/// Player tick interval default (§4.4).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);
