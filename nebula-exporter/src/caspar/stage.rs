//! Per-layer playback state fed by the OSC stream.

use std::collections::HashMap;

use dashmap::DashMap;
use osc::OscValue;

use super::protocol::FrameRate;

/// Producer name of live SDI inputs.
const LIVE_PRODUCER: &str = "decklink";
/// Producer name reported for an unoccupied background slot.
const EMPTY_PRODUCER: &str = "empty";

/// Stage keys with a dedicated field in [`LayerState`].
pub mod keys {
    pub const FOREGROUND_FILE_NAME: &str = "foreground/file/name";
    pub const BACKGROUND_FILE_NAME: &str = "background/file/name";
    pub const FOREGROUND_PRODUCER: &str = "foreground/producer";
    pub const BACKGROUND_PRODUCER: &str = "background/producer";
    pub const FOREGROUND_PAUSED: &str = "foreground/paused";
    pub const FOREGROUND_FILE_TIME: &str = "foreground/file/time";
    pub const PROFILER_TIME: &str = "profiler/time";
}

/// Most recent values observed for one (channel, layer).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerState {
    pub foreground_file: Option<String>,
    pub background_file: Option<String>,
    pub foreground_producer: Option<String>,
    pub background_producer: Option<String>,
    pub paused: Option<bool>,
    /// (position, duration) in seconds
    pub file_time: Option<(f64, f64)>,
    /// Last reported frame processing time in seconds
    pub profiler_time: Option<f64>,
    /// Raw arguments of every key without a dedicated field
    pub extra: HashMap<String, Vec<OscValue>>,
}

impl LayerState {
    /// Merge one stage message into the record.
    ///
    /// Arguments of the wrong type leave the field untouched.
    pub fn apply(&mut self, key: &str, args: &[OscValue]) {
        let first = args.first();
        match key {
            keys::FOREGROUND_FILE_NAME => {
                if let Some(name) = first.and_then(OscValue::as_str) {
                    self.foreground_file = Some(name.to_string());
                }
            }
            keys::BACKGROUND_FILE_NAME => {
                if let Some(name) = first.and_then(OscValue::as_str) {
                    self.background_file = Some(name.to_string());
                }
            }
            keys::FOREGROUND_PRODUCER => {
                if let Some(name) = first.and_then(OscValue::as_str) {
                    self.foreground_producer = Some(name.to_string());
                }
            }
            keys::BACKGROUND_PRODUCER => {
                if let Some(name) = first.and_then(OscValue::as_str) {
                    self.background_producer = Some(name.to_string());
                }
            }
            keys::FOREGROUND_PAUSED => {
                if let Some(paused) = first.and_then(OscValue::as_bool) {
                    self.paused = Some(paused);
                }
            }
            keys::FOREGROUND_FILE_TIME => {
                if let [position, duration, ..] = args
                    && let (Some(position), Some(duration)) = (position.as_f64(), duration.as_f64())
                {
                    self.file_time = Some((position, duration));
                }
            }
            keys::PROFILER_TIME => {
                if let Some(actual) = first.and_then(OscValue::as_f64) {
                    self.profiler_time = Some(actual);
                }
            }
            _ => {
                self.extra.insert(key.to_string(), args.to_vec());
            }
        }
    }

    fn is_live(&self) -> bool {
        self.foreground_producer.as_deref() == Some(LIVE_PRODUCER)
    }

    /// Whether the background slot holds something to cue.
    fn has_background(&self) -> bool {
        self.background_producer
            .as_deref()
            .is_some_and(|producer| !producer.is_empty() && producer != EMPTY_PRODUCER)
    }
}

/// Display view of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerSnapshot {
    /// Foreground clip without extension
    pub current: Option<String>,
    /// Background clip without extension
    pub cued: Option<String>,
    pub paused: bool,
    /// Foreground is a live input
    pub live: bool,
    /// Playback position in frames; zero for live inputs
    pub position: u64,
    /// Clip duration in frames; zero for live inputs
    pub duration: u64,
}

/// Strip the last extension from a file name.
///
/// Leading dots of hidden files are not an extension, and dots in directory
/// components are ignored.
pub fn strip_extension(name: &str) -> &str {
    let base_start = name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let base = &name[base_start..];
    let stem_start = base.len() - base.trim_start_matches('.').len();

    match base.rfind('.') {
        Some(dot) if dot > stem_start => &name[..base_start + dot],
        _ => name,
    }
}

/// (channel, layer) → [`LayerState`].
///
/// Entries are created on first message and never removed.
#[derive(Debug, Default)]
pub struct StageStateTree {
    layers: DashMap<(u32, u32), LayerState>,
}

impl StageStateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, channel: u32, layer: u32, key: &str, args: &[OscValue]) {
        self.layers
            .entry((channel, layer))
            .or_default()
            .apply(key, args);
    }

    /// Copy of the stored record.
    pub fn get(&self, channel: u32, layer: u32) -> Option<LayerState> {
        self.layers.get(&(channel, layer)).map(|state| state.clone())
    }

    /// Derive the display snapshot of a layer.
    ///
    /// A missing or `empty` background producer invalidates the cached
    /// background clip, which is cleared from the record.
    pub fn snapshot(&self, channel: u32, layer: u32, frame_rate: FrameRate) -> LayerSnapshot {
        let Some(mut state) = self.layers.get_mut(&(channel, layer)) else {
            return LayerSnapshot::default();
        };

        if !state.has_background() {
            state.background_file = None;
        }

        let live = state.is_live();
        let (position, duration) = match state.file_time {
            Some((position, duration)) if !live => (
                frame_rate.seconds_to_frames(position),
                frame_rate.seconds_to_frames(duration),
            ),
            _ => (0, 0),
        };

        LayerSnapshot {
            current: state
                .foreground_file
                .as_deref()
                .map(|name| strip_extension(name).to_string()),
            cued: state
                .background_file
                .as_deref()
                .map(|name| strip_extension(name).to_string()),
            paused: state.paused.unwrap_or(false),
            live,
            position,
            duration,
        }
    }

    /// Known layer ids of a channel, ascending.
    pub fn layers_of(&self, channel: u32) -> Vec<u32> {
        let mut layers: Vec<u32> = self
            .layers
            .iter()
            .filter(|entry| entry.key().0 == channel)
            .map(|entry| entry.key().1)
            .collect();
        layers.sort_unstable();
        layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn text(s: &str) -> Vec<OscValue> {
        vec![OscValue::String(s.to_string())]
    }

    #[rstest]
    #[case("AMB.mp4", "AMB")]
    #[case("clips/intro.final.mov", "clips/intro.final")]
    #[case("no_extension", "no_extension")]
    #[case(".hidden", ".hidden")]
    #[case("folder.v2/clip", "folder.v2/clip")]
    #[case("C:\\media\\clip.mxf", "C:\\media\\clip")]
    #[case("", "")]
    fn test_strip_extension(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(strip_extension(name), expected);
    }

    #[test]
    fn test_unknown_layer_yields_default_snapshot() {
        let tree = StageStateTree::new();
        assert_eq!(tree.snapshot(1, 10, FrameRate::DEFAULT), LayerSnapshot::default());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_snapshot_of_playing_clip() {
        let tree = StageStateTree::new();
        tree.update(1, 10, keys::FOREGROUND_FILE_NAME, &text("AMB.mp4"));
        tree.update(1, 10, keys::FOREGROUND_PRODUCER, &text("ffmpeg"));
        tree.update(1, 10, keys::BACKGROUND_PRODUCER, &text("ffmpeg"));
        tree.update(1, 10, keys::BACKGROUND_FILE_NAME, &text("GO1080p25.mp4"));
        tree.update(1, 10, keys::FOREGROUND_PAUSED, &[OscValue::Bool(true)]);
        tree.update(
            1,
            10,
            keys::FOREGROUND_FILE_TIME,
            &[OscValue::Float(2.0), OscValue::Float(60.0)],
        );

        let snapshot = tree.snapshot(1, 10, FrameRate::new(25, 1).unwrap());
        assert_eq!(
            snapshot,
            LayerSnapshot {
                current: Some("AMB".into()),
                cued: Some("GO1080p25".into()),
                paused: true,
                live: false,
                position: 50,
                duration: 1500,
            }
        );
    }

    #[test]
    fn test_live_source_has_no_position() {
        let tree = StageStateTree::new();
        tree.update(2, 20, keys::FOREGROUND_PRODUCER, &text("decklink"));
        tree.update(
            2,
            20,
            keys::FOREGROUND_FILE_TIME,
            &[OscValue::Double(12.0), OscValue::Double(0.0)],
        );

        let snapshot = tree.snapshot(2, 20, FrameRate::DEFAULT);
        assert!(snapshot.live);
        assert_eq!((snapshot.position, snapshot.duration), (0, 0));
        assert_eq!(snapshot.current, None);
    }

    #[test]
    fn test_empty_background_producer_clears_cued_clip() {
        let tree = StageStateTree::new();
        tree.update(1, 10, keys::BACKGROUND_PRODUCER, &text("ffmpeg"));
        tree.update(1, 10, keys::BACKGROUND_FILE_NAME, &text("NEXT.mov"));
        assert_eq!(
            tree.snapshot(1, 10, FrameRate::DEFAULT).cued.as_deref(),
            Some("NEXT")
        );

        tree.update(1, 10, keys::BACKGROUND_PRODUCER, &text("empty"));
        assert_eq!(tree.snapshot(1, 10, FrameRate::DEFAULT).cued, None);
        assert_eq!(tree.get(1, 10).unwrap().background_file, None);
    }

    #[test]
    fn test_background_without_producer_is_not_cued() {
        let tree = StageStateTree::new();
        tree.update(1, 10, keys::BACKGROUND_FILE_NAME, &text("NEXT.mov"));
        assert_eq!(tree.snapshot(1, 10, FrameRate::DEFAULT).cued, None);
    }

    #[test]
    fn test_unrecognised_keys_land_in_extra() {
        let tree = StageStateTree::new();
        tree.update(1, 10, "foreground/file/fps", &[OscValue::Float(25.0)]);
        let state = tree.get(1, 10).unwrap();
        assert_eq!(
            state.extra.get("foreground/file/fps"),
            Some(&vec![OscValue::Float(25.0)])
        );
    }

    #[test]
    fn test_wrong_argument_types_are_ignored() {
        let tree = StageStateTree::new();
        tree.update(1, 10, keys::FOREGROUND_FILE_NAME, &[OscValue::Int(3)]);
        tree.update(1, 10, keys::FOREGROUND_FILE_TIME, &[OscValue::Float(1.0)]);
        let state = tree.get(1, 10).unwrap();
        assert_eq!(state.foreground_file, None);
        assert_eq!(state.file_time, None);
    }

    #[test]
    fn test_layers_of_channel_are_sorted() {
        let tree = StageStateTree::new();
        for layer in [20, 10, 15] {
            tree.update(1, layer, keys::FOREGROUND_PAUSED, &[OscValue::Bool(false)]);
        }
        tree.update(2, 5, keys::FOREGROUND_PAUSED, &[OscValue::Bool(false)]);
        assert_eq!(tree.layers_of(1), vec![10, 15, 20]);
        assert_eq!(tree.len(), 4);
    }
}
