//! The audio mixing and ringing engine
//!
//! [`AudioEngine`] owns a small processing graph built on an [`AudioContext`]:
//!
//! ```text
//! ring oscillators ─► envelope ─► ringer gain ─► ringer sink
//! tone buffers ──────────────────► tones gain ──► tones sink
//! remote stream ─────────────────► remote gain ─► remote sink
//! preview osc / mic ─► delay ────► preview gain ─► master gain ─► master sink
//! ```
//!
//! Every channel has its own gain node, and every channel except preview has
//! its own destination sink so that output devices can be switched per
//! channel. Graph mutations happen inside one short critical section; events
//! are published after the lock is released.
//!
//! Timers (ring duty cycle, tone teardown) are tokio tasks holding a weak
//! reference to the engine. A ring timer runs only while the ring set is
//! non-empty and is aborted the moment it empties.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use phonekit_infra_common::events::EventBus;

use crate::channel::{AudioChannel, ChannelKind, ChannelSnapshot, volume_to_gain};
use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};
use crate::events::AudioEngineEvent;
use crate::graph::{AudioContext, NodeId};
use crate::tones::{dtmf_frequencies, synthesize};
use crate::track::{MediaTrack, TrackKind};

/// Key of a ring request: a call id, or `None` for ringing not tied to a call
pub type RingKey = Option<Uuid>;

/// Fraction of each ring phase spent ramping
const RING_RAMP_FRACTION: f64 = 0.2;

/// Outcome of [`AudioEngine::set_output_device`]
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDeviceReport {
    pub device_id: String,
    /// Channels now routed to the device
    pub updated: Vec<ChannelKind>,
    /// Channels whose sink rejected the device; they keep their old sink
    pub failed: Vec<ChannelKind>,
}

impl OutputDeviceReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Channels {
    ringer: AudioChannel,
    tones: AudioChannel,
    remote: AudioChannel,
    preview: AudioChannel,
    master: AudioChannel,
}

impl Channels {
    fn get(&self, kind: ChannelKind) -> &AudioChannel {
        match kind {
            ChannelKind::Ringer => &self.ringer,
            ChannelKind::Tones => &self.tones,
            ChannelKind::Remote => &self.remote,
            ChannelKind::Preview => &self.preview,
            ChannelKind::Master => &self.master,
        }
    }

    fn get_mut(&mut self, kind: ChannelKind) -> &mut AudioChannel {
        match kind {
            ChannelKind::Ringer => &mut self.ringer,
            ChannelKind::Tones => &mut self.tones,
            ChannelKind::Remote => &mut self.remote,
            ChannelKind::Preview => &mut self.preview,
            ChannelKind::Master => &mut self.master,
        }
    }
}

#[derive(Default)]
struct RingerState {
    requests: HashSet<RingKey>,
    oscillators: Vec<NodeId>,
    envelope: Option<NodeId>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every teardown so a stale timer never touches new nodes
    generation: u64,
}

struct PendingTone {
    source: NodeId,
    frequencies: Vec<f32>,
    task: Option<JoinHandle<()>>,
}

struct RemoteSource {
    owner: Uuid,
    track_id: String,
    node: NodeId,
}

struct LoopbackSource {
    source: NodeId,
    delay: NodeId,
}

struct EngineState {
    channels: Channels,
    ringer: RingerState,
    tones: HashMap<u64, PendingTone>,
    next_tone_id: u64,
    remote: Option<RemoteSource>,
    preview_tone: Option<NodeId>,
    loopback: Option<LoopbackSource>,
    shut_down: bool,
}

struct EngineInner {
    ctx: Arc<dyn AudioContext>,
    config: AudioConfig,
    state: Mutex<EngineState>,
    events: EventBus<AudioEngineEvent>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(timer) = state.ringer.timer.take() {
            timer.abort();
        }
        for tone in state.tones.values_mut() {
            if let Some(task) = tone.task.take() {
                task.abort();
            }
        }
    }
}

/// Audio mixing and ringing engine
///
/// Cheap to clone; clones share the same graph.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Build the channel graph on `ctx`
    pub fn new(ctx: Arc<dyn AudioContext>, config: AudioConfig) -> AudioResult<Self> {
        config.check()?;

        let gain_of = |kind: ChannelKind| {
            let volume = config.channel_volume(kind);
            (volume, volume_to_gain(volume, config.volume_max, config.min_gain))
        };

        let sink_channel = |kind: ChannelKind| {
            let (volume, gain) = gain_of(kind);
            let gain_node = ctx.create_gain(gain);
            let destination = ctx.create_destination();
            ctx.connect(gain_node, destination);
            AudioChannel::new(kind, volume, gain, gain_node, Some(destination))
        };

        let ringer = sink_channel(ChannelKind::Ringer);
        let tones = sink_channel(ChannelKind::Tones);
        let remote = sink_channel(ChannelKind::Remote);
        let master = sink_channel(ChannelKind::Master);

        let (preview_volume, preview_gain) = gain_of(ChannelKind::Preview);
        let preview_node = ctx.create_gain(preview_gain);
        ctx.connect(preview_node, master.gain_node);
        let preview = AudioChannel::new(ChannelKind::Preview, preview_volume, preview_gain, preview_node, None);

        info!("Audio engine created (volume_max={}, ring {}s/{}s)",
              config.volume_max, config.ring_on_secs, config.ring_off_secs);

        Ok(Self {
            inner: Arc::new(EngineInner {
                ctx,
                config,
                state: Mutex::new(EngineState {
                    channels: Channels { ringer, tones, remote, preview, master },
                    ringer: RingerState::default(),
                    tones: HashMap::new(),
                    next_tone_id: 0,
                    remote: None,
                    preview_tone: None,
                    loopback: None,
                    shut_down: false,
                }),
                events: EventBus::new(),
            }),
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.inner.config
    }

    /// Event bus carrying [`AudioEngineEvent`]s
    pub fn events(&self) -> &EventBus<AudioEngineEvent> {
        &self.inner.events
    }

    fn publish(&self, events: Vec<AudioEngineEvent>) {
        self.inner.events.publish_all(events);
    }

    // ===== CHANNELS =====

    /// Set a channel's volume on the external scale; returns the applied gain
    pub fn change_volume(&self, kind: ChannelKind, volume: f32) -> f32 {
        let config = &self.inner.config;
        let gain = volume_to_gain(volume, config.volume_max, config.min_gain);
        {
            let mut state = self.inner.state.lock();
            let channel = state.channels.get_mut(kind);
            channel.volume = volume;
            channel.gain = gain;
            let now = self.inner.ctx.current_time();
            self.inner.ctx.cancel_scheduled_values(channel.gain_node, now);
            self.inner.ctx.set_value_at(channel.gain_node, gain, now);
        }
        debug!("Channel {} volume set to {} (gain {})", kind, volume, gain);
        self.publish(vec![AudioEngineEvent::VolumeChanged { channel: kind, volume, gain }]);
        gain
    }

    pub fn channel(&self, kind: ChannelKind) -> ChannelSnapshot {
        self.inner.state.lock().channels.get(kind).snapshot()
    }

    pub fn channels(&self) -> Vec<ChannelSnapshot> {
        let state = self.inner.state.lock();
        ChannelKind::ALL.iter().map(|k| state.channels.get(*k).snapshot()).collect()
    }

    /// Re-point every channel sink at `device_id`.
    ///
    /// Channels are updated independently; a failing sink keeps its previous
    /// device and is listed in [`OutputDeviceReport::failed`].
    pub fn set_output_device(&self, device_id: &str) -> OutputDeviceReport {
        let mut report = OutputDeviceReport {
            device_id: device_id.to_string(),
            updated: Vec::new(),
            failed: Vec::new(),
        };
        {
            let mut state = self.inner.state.lock();
            for kind in ChannelKind::ALL {
                let channel = state.channels.get_mut(kind);
                let Some(destination) = channel.destination else { continue };
                match self.inner.ctx.set_sink(destination, device_id) {
                    Ok(()) => {
                        channel.sink_id = Some(device_id.to_string());
                        report.updated.push(kind);
                    }
                    Err(e) => {
                        warn!("Failed to switch {} channel to output {}: {}", kind, device_id, e);
                        report.failed.push(kind);
                    }
                }
            }
        }
        info!("Output device {} applied: {} updated, {} failed",
              device_id, report.updated.len(), report.failed.len());
        self.publish(vec![AudioEngineEvent::OutputDeviceChanged {
            device_id: report.device_id.clone(),
            updated: report.updated.clone(),
            failed: report.failed.clone(),
        }]);
        report
    }

    // ===== RINGER =====

    /// Add a ring request. The ringer starts with the first request.
    pub fn start_ringing(&self, key: RingKey) {
        let mut events = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return;
            }
            let was_idle = state.ringer.requests.is_empty();
            if !state.ringer.requests.insert(key) {
                debug!("Ring request {:?} already active", key);
                return;
            }

            if !state.channels.ringer.connected {
                self.wire_ringer(&mut state);
            }
            if state.ringer.timer.is_none() {
                self.start_ring_timer(&mut state);
            }
            if was_idle {
                info!("Ringer started by request {:?}", key);
                events.push(AudioEngineEvent::RingerStarted { key });
            } else {
                debug!("Ring request {:?} added ({} active)", key, state.ringer.requests.len());
            }
        }
        self.publish(events);
    }

    /// Remove a ring request. The ringer is cut off when the last one goes.
    pub fn stop_ringing(&self, key: RingKey) {
        let mut events = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if !state.ringer.requests.remove(&key) {
                return;
            }
            if state.ringer.requests.is_empty() {
                self.teardown_ringer(&mut state);
                info!("Ringer stopped, last request {:?} removed", key);
                events.push(AudioEngineEvent::RingerStopped);
            } else {
                debug!("Ring request {:?} removed ({} remain)", key, state.ringer.requests.len());
            }
        }
        self.publish(events);
    }

    /// Drop every ring request
    pub fn stop_all_ringing(&self) {
        let stopped = {
            let mut state = self.inner.state.lock();
            if state.ringer.requests.is_empty() {
                false
            } else {
                state.ringer.requests.clear();
                self.teardown_ringer(&mut state);
                true
            }
        };
        if stopped {
            info!("Ringer stopped, all requests cleared");
            self.publish(vec![AudioEngineEvent::RingerStopped]);
        }
    }

    pub fn is_ringing(&self) -> bool {
        !self.inner.state.lock().ringer.requests.is_empty()
    }

    pub fn is_ringing_for(&self, key: RingKey) -> bool {
        self.inner.state.lock().ringer.requests.contains(&key)
    }

    /// Whether a duty-cycle timer is currently scheduled
    pub fn ring_timer_active(&self) -> bool {
        self.inner.state.lock().ringer.timer.is_some()
    }

    fn wire_ringer(&self, state: &mut EngineState) {
        let ctx = &self.inner.ctx;
        let config = &self.inner.config;
        let now = ctx.current_time();

        let envelope = ctx.create_gain(config.ring_envelope_floor);
        ctx.connect(envelope, state.channels.ringer.gain_node);

        let oscillators: Vec<NodeId> = config
            .ring_frequencies
            .iter()
            .map(|&frequency| {
                let osc = ctx.create_oscillator(frequency);
                ctx.connect(osc, envelope);
                ctx.start(osc, now);
                osc
            })
            .collect();

        debug!("Ringer wired with {} oscillators", oscillators.len());
        state.ringer.oscillators = oscillators;
        state.ringer.envelope = Some(envelope);
        state.channels.ringer.connected = true;
    }

    fn start_ring_timer(&self, state: &mut EngineState) {
        let Some(envelope) = state.ringer.envelope else { return };
        let ctx = &self.inner.ctx;
        let config = &self.inner.config;

        match Handle::try_current() {
            Ok(handle) => {
                // First on-phase is scheduled synchronously; the task drives the rest
                schedule_ring_ramp(ctx.as_ref(), envelope, config, RingPhase::On);
                let generation = state.ringer.generation;
                let engine = Arc::downgrade(&self.inner);
                let on = config.ring_on();
                let off = config.ring_off();
                state.ringer.timer = Some(handle.spawn(run_ring_cycle(engine, generation, on, off)));
            }
            Err(_) => {
                warn!("No tokio runtime, ringing without cadence");
                let now = ctx.current_time();
                ctx.cancel_scheduled_values(envelope, now);
                ctx.set_value_at(envelope, 1.0, now);
            }
        }
    }

    fn teardown_ringer(&self, state: &mut EngineState) {
        let ctx = &self.inner.ctx;
        let now = ctx.current_time();

        if let Some(timer) = state.ringer.timer.take() {
            timer.abort();
        }
        state.ringer.generation += 1;

        for osc in state.ringer.oscillators.drain(..) {
            ctx.stop(osc, now);
            ctx.disconnect(osc);
            ctx.release(osc);
        }
        if let Some(envelope) = state.ringer.envelope.take() {
            ctx.cancel_scheduled_values(envelope, now);
            ctx.set_value_at(envelope, self.inner.config.ring_envelope_floor, now);
            ctx.disconnect(envelope);
            ctx.release(envelope);
        }
        state.channels.ringer.connected = false;
    }

    // ===== TONES =====

    /// Play `frequencies` once through the tones channel for `duration_secs`.
    ///
    /// The source is stopped at the end of the tone and disconnected after
    /// the configured latency margin. Requires a tokio runtime.
    pub fn play_tones(&self, frequencies: &[f32], duration_secs: f64) -> AudioResult<()> {
        let handle = Handle::try_current().map_err(|_| AudioError::NoRuntime {
            operation: "tone playback".to_string(),
        })?;
        let buffer = synthesize(frequencies, duration_secs, self.inner.config.tone_sample_rate)?;
        let teardown_after = self.inner.config.tone_teardown_after(duration_secs);
        let ctx = &self.inner.ctx;

        {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                debug!("Ignoring tone request on a shut down engine");
                return Ok(());
            }

            let source = ctx.create_buffer_source(buffer);
            ctx.connect(source, state.channels.tones.gain_node);
            let now = ctx.current_time();
            ctx.start(source, now);
            ctx.stop(source, now + duration_secs);
            state.channels.tones.connected = true;

            let id = state.next_tone_id;
            state.next_tone_id += 1;
            let task = handle.spawn(finish_tone(Arc::downgrade(&self.inner), id, teardown_after));
            state.tones.insert(id, PendingTone {
                source,
                frequencies: frequencies.to_vec(),
                task: Some(task),
            });
        }

        debug!("Playing tones {:?} for {}s", frequencies, duration_secs);
        self.publish(vec![AudioEngineEvent::TonesStarted {
            frequencies: frequencies.to_vec(),
            duration_secs,
        }]);
        Ok(())
    }

    /// Play one DTMF key with the configured tone duration
    pub fn play_dtmf(&self, tone: char) -> AudioResult<()> {
        let frequencies = dtmf_frequencies(tone)?;
        self.play_tones(&frequencies, self.inner.config.tone_duration_secs)
    }

    /// Number of tone sources not yet torn down
    pub fn pending_tones(&self) -> usize {
        self.inner.state.lock().tones.len()
    }

    // ===== REMOTE =====

    /// Wire `track` as the remote channel source on behalf of call `owner`.
    ///
    /// Returns `false` when the same owner and track are already connected.
    /// Any other current source is replaced.
    pub fn connect_remote(&self, owner: Uuid, track: &MediaTrack) -> AudioResult<bool> {
        if track.kind() != TrackKind::Audio {
            return Err(AudioError::InvalidTrack {
                track_id: track.id().to_string(),
                reason: format!("{} track cannot feed the remote channel", track.kind()),
            });
        }
        if !track.is_live() {
            return Err(AudioError::InvalidTrack {
                track_id: track.id().to_string(),
                reason: "track has ended".to_string(),
            });
        }

        let mut events = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return Ok(false);
            }
            if let Some(current) = &state.remote {
                if current.owner == owner && current.track_id == track.id() {
                    return Ok(false);
                }
            }

            let ctx = &self.inner.ctx;
            let node = ctx.create_stream_source(track)?;
            if let Some(previous) = state.remote.take() {
                ctx.disconnect(previous.node);
                ctx.release(previous.node);
                debug!("Remote source of call {} replaced", previous.owner);
                events.push(AudioEngineEvent::RemoteDisconnected { owner: previous.owner });
            }
            ctx.connect(node, state.channels.remote.gain_node);
            state.channels.remote.connected = true;
            state.remote = Some(RemoteSource {
                owner,
                track_id: track.id().to_string(),
                node,
            });
        }

        info!("Remote audio of call {} connected (track {})", owner, track.id());
        events.push(AudioEngineEvent::RemoteConnected {
            owner,
            track_id: track.id().to_string(),
        });
        self.publish(events);
        Ok(true)
    }

    /// Remove the remote source if `owner` holds it
    pub fn disconnect_remote(&self, owner: Uuid) -> bool {
        {
            let mut state = self.inner.state.lock();
            match &state.remote {
                Some(current) if current.owner == owner => {}
                _ => return false,
            }
            self.teardown_remote(&mut state);
        }
        info!("Remote audio of call {} disconnected", owner);
        self.publish(vec![AudioEngineEvent::RemoteDisconnected { owner }]);
        true
    }

    /// Call currently wired to the remote channel
    pub fn remote_owner(&self) -> Option<Uuid> {
        self.inner.state.lock().remote.as_ref().map(|r| r.owner)
    }

    fn teardown_remote(&self, state: &mut EngineState) -> Option<Uuid> {
        let remote = state.remote.take()?;
        self.inner.ctx.disconnect(remote.node);
        self.inner.ctx.release(remote.node);
        state.channels.remote.connected = false;
        Some(remote.owner)
    }

    // ===== PREVIEW =====

    /// Start the preview tone; returns `false` if it was already playing
    pub fn start_preview_tone(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.shut_down || state.preview_tone.is_some() {
                return false;
            }
            let ctx = &self.inner.ctx;
            let osc = ctx.create_oscillator(self.inner.config.preview_tone_frequency);
            ctx.connect(osc, state.channels.preview.gain_node);
            ctx.start(osc, ctx.current_time());
            state.preview_tone = Some(osc);
            state.channels.preview.connected = true;
        }
        info!("Preview tone started");
        self.publish(vec![AudioEngineEvent::PreviewToneChanged { active: true }]);
        true
    }

    /// Stop the preview tone; returns `false` if it was not playing
    pub fn stop_preview_tone(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            let Some(osc) = state.preview_tone.take() else { return false };
            let ctx = &self.inner.ctx;
            ctx.stop(osc, ctx.current_time());
            ctx.disconnect(osc);
            ctx.release(osc);
            state.channels.preview.connected = state.loopback.is_some();
        }
        info!("Preview tone stopped");
        self.publish(vec![AudioEngineEvent::PreviewToneChanged { active: false }]);
        true
    }

    /// Flip the preview tone; returns the new state
    pub fn toggle_preview_tone(&self) -> bool {
        if self.is_preview_tone_active() {
            self.stop_preview_tone();
            false
        } else {
            self.start_preview_tone()
        }
    }

    pub fn is_preview_tone_active(&self) -> bool {
        self.inner.state.lock().preview_tone.is_some()
    }

    /// Route `microphone` through a delay line into the preview channel
    pub fn start_loopback(&self, microphone: &MediaTrack) -> AudioResult<bool> {
        if microphone.kind() != TrackKind::Audio {
            return Err(AudioError::InvalidTrack {
                track_id: microphone.id().to_string(),
                reason: "loopback needs an audio track".to_string(),
            });
        }
        {
            let mut state = self.inner.state.lock();
            if state.shut_down || state.loopback.is_some() {
                return Ok(false);
            }
            let ctx = &self.inner.ctx;
            let source = ctx.create_stream_source(microphone)?;
            let delay = ctx.create_delay(self.inner.config.loopback_delay_secs);
            ctx.connect(source, delay);
            ctx.connect(delay, state.channels.preview.gain_node);
            state.loopback = Some(LoopbackSource { source, delay });
            state.channels.preview.connected = true;
        }
        info!("Microphone loopback started (track {})", microphone.id());
        self.publish(vec![AudioEngineEvent::LoopbackChanged { active: true }]);
        Ok(true)
    }

    /// Stop the microphone loopback; returns `false` if it was not running
    pub fn stop_loopback(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            let Some(loopback) = state.loopback.take() else { return false };
            let ctx = &self.inner.ctx;
            ctx.disconnect(loopback.source);
            ctx.disconnect(loopback.delay);
            ctx.release(loopback.source);
            ctx.release(loopback.delay);
            state.channels.preview.connected = state.preview_tone.is_some();
        }
        info!("Microphone loopback stopped");
        self.publish(vec![AudioEngineEvent::LoopbackChanged { active: false }]);
        true
    }

    /// Flip the loopback; returns the new state
    pub fn toggle_loopback(&self, microphone: &MediaTrack) -> AudioResult<bool> {
        if self.is_loopback_active() {
            self.stop_loopback();
            Ok(false)
        } else {
            self.start_loopback(microphone)
        }
    }

    pub fn is_loopback_active(&self) -> bool {
        self.inner.state.lock().loopback.is_some()
    }

    // ===== LIFECYCLE =====

    /// Stop every source and timer. Further start requests are ignored.
    pub fn shutdown(&self) {
        let mut events = Vec::new();
        {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            let ctx = &self.inner.ctx;

            if !state.ringer.requests.is_empty() {
                state.ringer.requests.clear();
                events.push(AudioEngineEvent::RingerStopped);
            }
            self.teardown_ringer(&mut state);

            for (_, mut tone) in state.tones.drain() {
                if let Some(task) = tone.task.take() {
                    task.abort();
                }
                ctx.disconnect(tone.source);
                ctx.release(tone.source);
            }
            state.channels.tones.connected = false;

            if let Some(owner) = self.teardown_remote(&mut state) {
                events.push(AudioEngineEvent::RemoteDisconnected { owner });
            }
        }
        self.stop_preview_tone();
        self.stop_loopback();
        info!("Audio engine shut down");
        self.publish(events);
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("AudioEngine")
            .field("ring_requests", &state.ringer.requests.len())
            .field("pending_tones", &state.tones.len())
            .field("remote_owner", &state.remote.as_ref().map(|r| r.owner))
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum RingPhase {
    On,
    Off,
}

fn schedule_ring_ramp(ctx: &dyn AudioContext, envelope: NodeId, config: &AudioConfig, phase: RingPhase) {
    let now = ctx.current_time();
    let floor = config.ring_envelope_floor;
    ctx.cancel_scheduled_values(envelope, now);
    match phase {
        RingPhase::On => {
            ctx.set_value_at(envelope, floor, now);
            ctx.exponential_ramp_to(envelope, 1.0, now + config.ring_on_secs * RING_RAMP_FRACTION);
        }
        RingPhase::Off => {
            ctx.set_value_at(envelope, 1.0, now);
            ctx.exponential_ramp_to(envelope, floor, now + config.ring_off_secs * RING_RAMP_FRACTION);
        }
    }
}

/// Schedule one ramp if the ringer generation is still current
fn ring_step(engine: &Weak<EngineInner>, generation: u64, phase: RingPhase) -> bool {
    let Some(inner) = engine.upgrade() else { return false };
    let state = inner.state.lock();
    if state.ringer.generation != generation {
        return false;
    }
    let Some(envelope) = state.ringer.envelope else { return false };
    schedule_ring_ramp(inner.ctx.as_ref(), envelope, &inner.config, phase);
    true
}

async fn run_ring_cycle(engine: Weak<EngineInner>, generation: u64, on: Duration, off: Duration) {
    loop {
        tokio::time::sleep(on).await;
        if !ring_step(&engine, generation, RingPhase::Off) {
            break;
        }
        tokio::time::sleep(off).await;
        if !ring_step(&engine, generation, RingPhase::On) {
            break;
        }
    }
}

async fn finish_tone(engine: Weak<EngineInner>, id: u64, after: Duration) {
    tokio::time::sleep(after).await;
    let Some(inner) = engine.upgrade() else { return };

    let finished = {
        let mut state = inner.state.lock();
        let Some(tone) = state.tones.remove(&id) else { return };
        let ctx = &inner.ctx;
        ctx.stop(tone.source, ctx.current_time());
        ctx.disconnect(tone.source);
        ctx.release(tone.source);
        if state.tones.is_empty() {
            state.channels.tones.connected = false;
        }
        tone.frequencies
    };

    debug!("Tone {:?} finished", finished);
    inner.events.publish(&AudioEngineEvent::TonesFinished { frequencies: finished });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestAudioContext;
    use tracing_test::traced_test;

    fn engine() -> (Arc<TestAudioContext>, AudioEngine) {
        let ctx = Arc::new(TestAudioContext::new());
        let engine = AudioEngine::new(ctx.clone(), AudioConfig::default()).unwrap();
        (ctx, engine)
    }

    #[test]
    fn test_graph_layout() {
        let (ctx, engine) = engine();
        let preview = engine.channel(ChannelKind::Preview);
        assert!(preview.sink_id.is_none());
        assert_eq!(ctx.destination_count(), 4);
        assert!(!engine.channel(ChannelKind::Ringer).connected);
    }

    #[test]
    fn test_change_volume_applies_gain() {
        let (_ctx, engine) = engine();
        assert_eq!(engine.change_volume(ChannelKind::Ringer, 25.0), 0.25);
        assert_eq!(engine.channel(ChannelKind::Ringer).gain, 0.25);
        assert_eq!(engine.change_volume(ChannelKind::Ringer, -10.0), 0.0);
    }

    #[test]
    fn test_ringing_without_runtime_is_steady() {
        let (ctx, engine) = engine();
        engine.start_ringing(None);
        assert!(engine.is_ringing());
        assert!(!engine.ring_timer_active());
        assert_eq!(ctx.started_oscillators().len(), 2);

        engine.stop_ringing(None);
        assert!(!engine.is_ringing());
        assert!(!engine.channel(ChannelKind::Ringer).connected);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_shutdown_is_logged_once() {
        let (_ctx, engine) = engine();
        engine.start_ringing(None);
        engine.shutdown();
        engine.shutdown();
        assert!(logs_contain("Ringer started by request None"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Audio engine shut down")).count() {
                1 => Ok(()),
                n => Err(format!("expected one shutdown line, saw {}", n)),
            }
        });
        engine.start_ringing(None);
        assert!(!engine.is_ringing());
    }

    #[test]
    fn test_tones_need_runtime() {
        let (_ctx, engine) = engine();
        assert!(matches!(engine.play_tones(&[440.0], 0.1), Err(AudioError::NoRuntime { .. })));
    }

    #[test]
    fn test_remote_requires_live_audio() {
        let (_ctx, engine) = engine();
        let owner = Uuid::new_v4();
        assert!(engine.connect_remote(owner, &MediaTrack::video("v1")).is_err());

        let ended = MediaTrack::audio("a1");
        ended.stop();
        assert!(engine.connect_remote(owner, &ended).is_err());
        assert_eq!(engine.remote_owner(), None);
    }
}
