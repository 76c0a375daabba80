//! Page frames and the renderer processes that hosted them over time.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Arena index of a [`PageFrame`] in its [`FrameTree`]
pub type FrameIndex = usize;

/// One hosting period of a frame. `process_id` is -1 until the browser
/// reports the real process for a pseudo id.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameProcess {
    pub time: f64,
    pub process_id: i64,
    pub process_pseudo_id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PageFrame {
    pub frame_id: String,
    pub url: String,
    pub name: Option<String>,
    pub parent: Option<FrameIndex>,
    pub children: Vec<FrameIndex>,
    pub processes: Vec<FrameProcess>,
    pub deleted_time: Option<f64>,
}

impl PageFrame {
    fn new(payload: &Map<String, Value>) -> Self {
        Self {
            frame_id: str_field(payload, "frame").unwrap_or_default(),
            url: str_field(payload, "url").unwrap_or_default(),
            name: str_field(payload, "name"),
            parent: None,
            children: Vec::new(),
            processes: Vec::new(),
            deleted_time: None,
        }
    }

    /// Record a new hosting period starting at `time`.
    pub fn update(&mut self, time: f64, payload: &Map<String, Value>) {
        self.url = str_field(payload, "url").unwrap_or_default();
        self.name = str_field(payload, "name");
        let process_id = payload.get("processId").and_then(Value::as_i64).filter(|&id| id != 0);
        self.processes.push(FrameProcess {
            time,
            process_id: process_id.unwrap_or(-1),
            process_pseudo_id: if process_id.is_some() {
                String::new()
            } else {
                str_field(payload, "processPseudoId").unwrap_or_default()
            },
            url: self.url.clone(),
        });
    }

    /// Resolve a pseudo id to the process that is now ready.
    pub fn process_ready(&mut self, pseudo_id: &str, process_id: i64) {
        for process in &mut self.processes {
            if process.process_pseudo_id == pseudo_id {
                process.process_pseudo_id.clear();
                process.process_id = process_id;
            }
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

fn str_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

/// All frames of a trace, indexed by frame id.
#[derive(Debug, Default)]
pub struct FrameTree {
    frames: Vec<PageFrame>,
    by_id: HashMap<String, FrameIndex>,
}

impl FrameTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, frame_id: &str) -> Option<&PageFrame> {
        self.index_of(frame_id).map(|index| &self.frames[index])
    }

    pub fn get_mut(&mut self, frame_id: &str) -> Option<&mut PageFrame> {
        self.index_of(frame_id).map(|index| &mut self.frames[index])
    }

    #[must_use]
    pub fn index_of(&self, frame_id: &str) -> Option<FrameIndex> {
        if frame_id.is_empty() {
            return None;
        }
        self.by_id.get(frame_id).copied()
    }

    #[must_use]
    pub fn frame(&self, index: FrameIndex) -> &PageFrame {
        &self.frames[index]
    }

    pub fn frame_mut(&mut self, index: FrameIndex) -> &mut PageFrame {
        &mut self.frames[index]
    }

    #[must_use]
    pub fn contains(&self, frame_id: &str) -> bool {
        self.index_of(frame_id).is_some()
    }

    /// Frames in creation order
    pub fn iter(&self) -> impl Iterator<Item = &PageFrame> {
        self.frames.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn root_frames(&self) -> impl Iterator<Item = &PageFrame> {
        self.frames.iter().filter(|frame| frame.is_root())
    }

    /// Create a frame from its payload, under `parent` when given.
    pub fn insert(&mut self, payload: &Map<String, Value>, parent: Option<FrameIndex>) -> FrameIndex {
        let index = self.frames.len();
        let mut frame = PageFrame::new(payload);
        frame.parent = parent;
        self.by_id.insert(frame.frame_id.clone(), index);
        self.frames.push(frame);
        if let Some(parent) = parent {
            self.frames[parent].children.push(index);
        }
        index
    }

    /// Add a frame seen in a page-level event. Fails when the payload names
    /// a parent that is not known.
    pub fn add_page_frame(&mut self, time: f64, payload: &Map<String, Value>) -> Option<FrameIndex> {
        let parent = match payload.get("parent").and_then(Value::as_str) {
            Some(parent_id) if !parent_id.is_empty() => Some(self.index_of(parent_id)?),
            _ => None,
        };
        let index = self.insert(payload, parent);
        self.frames[index].update(time, payload);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_child_requires_known_parent() {
        let mut tree = FrameTree::new();
        let root = tree.add_page_frame(1.0, &payload(json!({"frame": "A", "url": "https://a"})));
        assert!(root.is_some());
        let orphan = tree.add_page_frame(2.0, &payload(json!({"frame": "B", "parent": "Z"})));
        assert!(orphan.is_none());
        let child = tree
            .add_page_frame(2.0, &payload(json!({"frame": "C", "parent": "A"})))
            .unwrap();
        assert_eq!(tree.frame(child).parent, root);
        assert_eq!(tree.root_frames().count(), 1);
        assert_eq!(tree.get("A").unwrap().children, vec![child]);
    }

    #[test]
    fn test_process_ready_resolves_pseudo_id() {
        let mut tree = FrameTree::new();
        let index = tree.insert(&payload(json!({"frame": "A"})), None);
        let frame = tree.frame_mut(index);
        frame.update(1.0, &payload(json!({"processPseudoId": "p1", "url": "u"})));
        frame.update(2.0, &payload(json!({"processId": 42, "url": "v"})));
        assert_eq!(frame.processes[0].process_id, -1);
        frame.process_ready("p1", 7);
        assert_eq!(frame.processes[0].process_id, 7);
        assert_eq!(frame.processes[0].process_pseudo_id, "");
        assert_eq!(frame.processes[1].process_id, 42);
        assert_eq!(frame.url, "v");
    }
}
