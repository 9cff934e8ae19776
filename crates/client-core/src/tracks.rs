//! Track bookkeeping for one direction of a call

use std::collections::HashSet;

use phonekit_audio_core::{MediaTrack, TrackKind};

/// Outcome of [`TrackBucket::sync`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackDiff {
    pub added: Vec<MediaTrack>,
    pub removed: Vec<MediaTrack>,
}

impl TrackDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Ordered set of tracks, unique by id
#[derive(Debug, Clone, Default)]
pub struct TrackBucket {
    tracks: Vec<MediaTrack>,
}

impl TrackBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id() == track_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id().to_string()).collect()
    }

    /// First track of `kind`
    pub fn first_of_kind(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// First audio track that has not ended
    pub fn live_audio(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind() == TrackKind::Audio && t.is_live())
    }

    /// Add a track unless one with the same id is present
    pub fn insert(&mut self, track: MediaTrack) -> bool {
        if self.contains(track.id()) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn remove(&mut self, track_id: &str) -> Option<MediaTrack> {
        let index = self.tracks.iter().position(|t| t.id() == track_id)?;
        Some(self.tracks.remove(index))
    }

    /// Reconcile with the tracks the peer connection currently reports.
    ///
    /// Tracks missing from `peer` are removed first, then tracks new in
    /// `peer` are appended in peer order. Calling it again with the same
    /// peer set changes nothing.
    pub fn sync(&mut self, peer: &[MediaTrack]) -> TrackDiff {
        let peer_ids: HashSet<&str> = peer.iter().map(|t| t.id()).collect();

        let mut diff = TrackDiff::default();
        let (kept, removed): (Vec<MediaTrack>, Vec<MediaTrack>) = std::mem::take(&mut self.tracks)
            .into_iter()
            .partition(|t| peer_ids.contains(t.id()));
        self.tracks = kept;
        diff.removed = removed;

        for track in peer {
            if self.insert(track.clone()) {
                diff.added.push(track.clone());
            }
        }
        diff
    }

    /// Enable or disable playback of every track
    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// Forget every track without stopping it
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Stop and forget every track
    pub fn stop_all(&mut self) {
        for track in self.tracks.drain(..) {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_adds_and_removes() {
        let mut bucket = TrackBucket::new();
        let a = MediaTrack::audio("a");
        let v = MediaTrack::video("v");

        let diff = bucket.sync(&[a.clone(), v.clone()]);
        assert_eq!(diff.added.len(), 2);
        assert!(diff.removed.is_empty());

        let b = MediaTrack::audio("b");
        let diff = bucket.sync(&[b.clone(), v.clone()]);
        assert_eq!(diff.removed, vec![a]);
        assert_eq!(diff.added, vec![b]);
        assert_eq!(bucket.ids(), vec!["v".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut bucket = TrackBucket::new();
        let peer = vec![MediaTrack::audio("a"), MediaTrack::video("v")];
        bucket.sync(&peer);
        assert!(bucket.sync(&peer).is_empty());
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn test_live_audio_skips_ended() {
        let mut bucket = TrackBucket::new();
        let ended = MediaTrack::audio("old");
        ended.stop();
        bucket.insert(ended);
        bucket.insert(MediaTrack::audio("new"));
        assert_eq!(bucket.live_audio().map(|t| t.id()), Some("new"));

        bucket.stop_all();
        assert!(bucket.is_empty());
    }
}
