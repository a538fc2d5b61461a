use std::path::PathBuf;
use std::sync::Arc;

use ms_base::document::Document;
use ms_base::lifecycle::{Lifecycle, RequestKind};
use ms_base::models::GeminiModel;
use ms_render::DisplayTree;

use crate::llms::Backend;
use crate::ui::answer::LineCache;

/// Everything the UI draws. Owned by the UI thread.
pub struct State {
    pub document: Arc<Document>,
    pub sample: Option<Arc<Document>>,
    pub backend: Backend,
    pub model: GeminiModel,
    pub lifecycle: Lifecycle,
    /// Latest rendering of the answer, possibly partial
    pub tree: DisplayTree,
    /// Bumped on every tree change; keys the UI line cache
    pub tree_version: u64,
    pub line_cache: Option<LineCache>,
    /// Full answer text of the last successful analysis
    pub answer: Option<String>,
    /// Last failure, shown verbatim
    pub error: Option<String>,
    /// One-line status message (saved files, exports)
    pub notice: Option<String>,
    pub image_path: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub scroll_offset: u16,
    /// Set by the answer panel on each draw
    pub max_scroll: u16,
    pub spinner_frame: usize,
    pub dirty: bool,
}

impl State {
    pub fn new(document: Document, sample: Option<Document>, backend: Backend, model: GeminiModel, out_dir: PathBuf) -> Self {
        Self {
            document: Arc::new(document),
            sample: sample.map(Arc::new),
            backend,
            model,
            lifecycle: Lifecycle::new(),
            tree: DisplayTree::default(),
            tree_version: 0,
            line_cache: None,
            answer: None,
            error: None,
            notice: None,
            image_path: None,
            out_dir,
            scroll_offset: 0,
            max_scroll: 0,
            spinner_frame: 0,
            dirty: true,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.lifecycle.is_in_flight(RequestKind::Primary)
    }

    pub fn is_busy(&self) -> bool {
        self.is_streaming() || self.lifecycle.is_in_flight(RequestKind::Secondary)
    }

    pub fn set_tree(&mut self, tree: DisplayTree) {
        self.tree = tree;
        self.tree_version += 1;
        self.dirty = true;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.dirty = true;
    }
}
