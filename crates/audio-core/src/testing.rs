//! In-memory audio backend for tests
//!
//! [`TestAudioContext`] implements [`AudioContext`] without any hardware. It
//! records every node, connection, automation event and sink change so tests
//! can assert on the shape of the graph. Its clock follows
//! `tokio::time::Instant`, so paused-time tests see timers and graph times
//! advance together.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{AudioError, AudioResult};
use crate::graph::{AudioContext, NodeId};
use crate::tones::ToneBuffer;
use crate::track::MediaTrack;

/// What kind of node a [`NodeId`] refers to
#[derive(Debug, Clone, PartialEq)]
pub enum TestNodeKind {
    Gain,
    Oscillator { frequency: f32 },
    Delay { delay_secs: f64 },
    BufferSource { channels: usize, frames: usize },
    StreamSource { track_id: String },
    Destination,
}

/// Recorded state of one node
#[derive(Debug, Clone)]
pub struct TestNode {
    pub kind: TestNodeKind,
    pub value: f32,
    pub started_at: Option<f64>,
    pub stopped_at: Option<f64>,
    pub disconnected_at: Option<f64>,
    pub sink: Option<String>,
    pub released: bool,
}

/// Gain automation recorded on a node
#[derive(Debug, Clone, PartialEq)]
pub enum Automation {
    Set { value: f32, at: f64 },
    Ramp { value: f32, end: f64 },
    Cancel { from: f64 },
}

#[derive(Default)]
struct Graph {
    next_id: u64,
    nodes: HashMap<NodeId, TestNode>,
    order: Vec<NodeId>,
    connections: Vec<(NodeId, NodeId)>,
    automation: Vec<(NodeId, Automation)>,
    failing_sinks: HashSet<NodeId>,
    fail_stream_sources: bool,
}

/// Recording audio backend
pub struct TestAudioContext {
    origin: Instant,
    graph: Mutex<Graph>,
}

impl TestAudioContext {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            graph: Mutex::new(Graph::default()),
        }
    }

    /// Make `set_sink` fail for one destination node
    pub fn fail_sink(&self, destination: NodeId) {
        self.graph.lock().failing_sinks.insert(destination);
    }

    /// Make `create_stream_source` fail
    pub fn fail_stream_sources(&self, fail: bool) {
        self.graph.lock().fail_stream_sources = fail;
    }

    pub fn node(&self, id: NodeId) -> Option<TestNode> {
        self.graph.lock().nodes.get(&id).cloned()
    }

    /// Ids of every node of a kind matching `predicate`, in creation order
    pub fn nodes_where(&self, predicate: impl Fn(&TestNodeKind) -> bool) -> Vec<NodeId> {
        let graph = self.graph.lock();
        graph
            .order
            .iter()
            .filter(|id| graph.nodes.get(id).is_some_and(|n| predicate(&n.kind)))
            .copied()
            .collect()
    }

    /// Destination nodes in creation order (ringer, tones, remote, master)
    pub fn destinations(&self) -> Vec<NodeId> {
        self.nodes_where(|k| matches!(k, TestNodeKind::Destination))
    }

    pub fn destination_count(&self) -> usize {
        self.destinations().len()
    }

    /// Oscillators that were started and are not yet stopped
    pub fn started_oscillators(&self) -> Vec<NodeId> {
        let graph = self.graph.lock();
        graph
            .order
            .iter()
            .filter(|id| {
                graph.nodes.get(id).is_some_and(|n| {
                    matches!(n.kind, TestNodeKind::Oscillator { .. })
                        && n.started_at.is_some()
                        && n.stopped_at.is_none()
                })
            })
            .copied()
            .collect()
    }

    /// Every buffer source created so far
    pub fn buffer_sources(&self) -> Vec<NodeId> {
        self.nodes_where(|k| matches!(k, TestNodeKind::BufferSource { .. }))
    }

    /// Every stream source created so far
    pub fn stream_sources(&self) -> Vec<NodeId> {
        self.nodes_where(|k| matches!(k, TestNodeKind::StreamSource { .. }))
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.lock().connections.contains(&(from, to))
    }

    /// Nodes `from` currently feeds
    pub fn outputs_of(&self, from: NodeId) -> Vec<NodeId> {
        self.graph
            .lock()
            .connections
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, t)| *t)
            .collect()
    }

    /// Automation recorded for one node, in call order
    pub fn automation(&self, node: NodeId) -> Vec<Automation> {
        self.graph
            .lock()
            .automation
            .iter()
            .filter(|(n, _)| *n == node)
            .map(|(_, a)| a.clone())
            .collect()
    }

    /// Exponential ramps recorded for one node
    pub fn ramps(&self, node: NodeId) -> Vec<(f32, f64)> {
        self.automation(node)
            .into_iter()
            .filter_map(|a| match a {
                Automation::Ramp { value, end } => Some((value, end)),
                _ => None,
            })
            .collect()
    }

    fn with_node(&self, id: NodeId, f: impl FnOnce(&mut TestNode)) {
        if let Some(node) = self.graph.lock().nodes.get_mut(&id) {
            f(node);
        }
    }

    fn add_node(&self, kind: TestNodeKind, value: f32) -> NodeId {
        let mut graph = self.graph.lock();
        graph.next_id += 1;
        let id = NodeId(graph.next_id);
        graph.nodes.insert(id, TestNode {
            kind,
            value,
            started_at: None,
            stopped_at: None,
            disconnected_at: None,
            sink: None,
            released: false,
        });
        graph.order.push(id);
        id
    }
}

impl Default for TestAudioContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioContext for TestAudioContext {
    fn current_time(&self) -> f64 {
        Instant::now().duration_since(self.origin).as_secs_f64()
    }

    fn create_gain(&self, gain: f32) -> NodeId {
        self.add_node(TestNodeKind::Gain, gain)
    }

    fn create_oscillator(&self, frequency: f32) -> NodeId {
        self.add_node(TestNodeKind::Oscillator { frequency }, 1.0)
    }

    fn create_delay(&self, delay_secs: f64) -> NodeId {
        self.add_node(TestNodeKind::Delay { delay_secs }, 1.0)
    }

    fn create_buffer_source(&self, buffer: ToneBuffer) -> NodeId {
        let kind = TestNodeKind::BufferSource {
            channels: buffer.channel_count(),
            frames: buffer.len(),
        };
        self.add_node(kind, 1.0)
    }

    fn create_stream_source(&self, track: &MediaTrack) -> AudioResult<NodeId> {
        if self.graph.lock().fail_stream_sources {
            return Err(AudioError::backend("create_stream_source", "stream sources disabled"));
        }
        Ok(self.add_node(TestNodeKind::StreamSource { track_id: track.id().to_string() }, 1.0))
    }

    fn create_destination(&self) -> NodeId {
        self.add_node(TestNodeKind::Destination, 1.0)
    }

    fn connect(&self, from: NodeId, to: NodeId) {
        let mut graph = self.graph.lock();
        if !graph.connections.contains(&(from, to)) {
            graph.connections.push((from, to));
        }
    }

    fn disconnect(&self, from: NodeId) {
        let now = self.current_time();
        let mut graph = self.graph.lock();
        graph.connections.retain(|(f, _)| *f != from);
        if let Some(node) = graph.nodes.get_mut(&from) {
            node.disconnected_at = Some(now);
        }
    }

    fn set_value_at(&self, node: NodeId, value: f32, at: f64) {
        self.with_node(node, |n| n.value = value);
        self.graph.lock().automation.push((node, Automation::Set { value, at }));
    }

    fn exponential_ramp_to(&self, node: NodeId, value: f32, end: f64) {
        self.graph.lock().automation.push((node, Automation::Ramp { value, end }));
    }

    fn cancel_scheduled_values(&self, node: NodeId, from: f64) {
        self.graph.lock().automation.push((node, Automation::Cancel { from }));
    }

    fn start(&self, node: NodeId, at: f64) {
        self.with_node(node, |n| n.started_at = Some(at));
    }

    fn stop(&self, node: NodeId, at: f64) {
        // The earliest scheduled stop wins
        self.with_node(node, |n| {
            n.stopped_at = Some(n.stopped_at.map_or(at, |prev| prev.min(at)));
        });
    }

    fn set_sink(&self, destination: NodeId, device_id: &str) -> AudioResult<()> {
        if self.graph.lock().failing_sinks.contains(&destination) {
            return Err(AudioError::backend("set_sink", format!("{} rejected {}", destination, device_id)));
        }
        self.with_node(destination, |n| n.sink = Some(device_id.to_string()));
        Ok(())
    }

    fn release(&self, node: NodeId) {
        self.with_node(node, |n| n.released = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_connections() {
        let ctx = TestAudioContext::new();
        let gain = ctx.create_gain(0.5);
        let dest = ctx.create_destination();
        ctx.connect(gain, dest);
        assert!(ctx.is_connected(gain, dest));

        ctx.disconnect(gain);
        assert!(!ctx.is_connected(gain, dest));
        assert!(ctx.node(gain).unwrap().disconnected_at.is_some());
    }

    #[test]
    fn test_failing_sink() {
        let ctx = TestAudioContext::new();
        let dest = ctx.create_destination();
        ctx.fail_sink(dest);
        assert!(ctx.set_sink(dest, "usb").is_err());
        assert!(ctx.node(dest).unwrap().sink.is_none());
    }
}
