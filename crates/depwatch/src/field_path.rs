use std::sync::Arc;

use parking_lot::Mutex;
use prost_reflect::FieldDescriptor;

/// Path segment for one field, with the collection suffix baked in at plan
/// build time: `name[]` for lists, `name{}` for maps, bare `name` otherwise.
pub(crate) fn render_path_part(fd: &FieldDescriptor) -> Arc<str> {
    let name = fd.name();
    if fd.is_map() {
        Arc::from(format!("{name}{{}}"))
    } else if fd.is_list() {
        Arc::from(format!("{name}[]"))
    } else {
        Arc::from(name)
    }
}

// Free list of segment buffers shared by all top-level evaluations. Buffers
// are cleared before they return here; the list is capped so a burst of deep
// paths does not pin memory forever.
static PATH_POOL: Mutex<Vec<Vec<Arc<str>>>> = Mutex::new(Vec::new());

const POOL_KEEP: usize = 64;
const INITIAL_SEGMENTS: usize = 8;

/// Mutable dotted-path accumulator used during one plan evaluation.
///
/// Every `push` must be paired with a `pop` on all exit paths; the buffer is
/// recycled into the pool on drop.
pub(crate) struct FieldPath {
    parts: Vec<Arc<str>>,
}

impl FieldPath {
    pub(crate) fn acquire() -> Self {
        let parts = PATH_POOL
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_SEGMENTS));
        Self { parts }
    }

    pub(crate) fn push(&mut self, part: &Arc<str>) {
        self.parts.push(part.clone());
    }

    pub(crate) fn pop(&mut self) {
        self.parts.pop();
    }

    /// Joins the segments with `.`, reserving exact capacity.
    ///
    /// When the last segment carries a `[]`/`{}` suffix the suffix is
    /// stripped: the emitting node is then the collection holder itself, and
    /// holders report without the bracket. Segments the path continues
    /// through keep it.
    pub(crate) fn render(&self) -> String {
        if self.parts.is_empty() {
            return String::new();
        }
        let last = self.parts.len() - 1;
        let cut = {
            let part = &self.parts[last];
            part.ends_with(']') || part.ends_with('}')
        };
        let mut size = last;
        for part in &self.parts {
            size += part.len();
        }
        if cut {
            size -= 2;
        }
        let mut out = String::with_capacity(size);
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            if cut && i == last {
                out.push_str(&part[..part.len() - 2]);
            } else {
                out.push_str(part);
            }
        }
        out
    }
}

impl Drop for FieldPath {
    fn drop(&mut self) {
        self.parts.clear();
        let mut pool = PATH_POOL.lock();
        if pool.len() < POOL_KEEP {
            pool.push(std::mem::take(&mut self.parts));
        }
    }
}
