use crate::language::names::NameId;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{Heap, ObjId};
use rustc_hash::{FxHashMap, FxHashSet};

/// One frame of the scope stack. The tracked set holds every object the
/// frame owns; popping the frame destroys them all.
#[derive(Debug, Default)]
struct Frame {
    can_access_parent: bool,
    bindings: FxHashMap<NameId, ObjId>,
    args: Vec<ObjId>,
    tracked: FxHashSet<ObjId>,
}

impl Frame {
    fn new(can_access_parent: bool) -> Self {
        Self {
            can_access_parent,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn top(&self) -> &Frame {
        self.frames.last().expect("scope stack is never empty")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("scope stack is never empty")
    }

    /// Pushes a frame. A parent-accessing frame (loop body, branch, block)
    /// starts with copies of its parent's argument stack, so `arg` keeps
    /// working inside nested constructs of a function body.
    pub fn push(&mut self, can_access_parent: bool, heap: &mut Heap) -> RuntimeResult<()> {
        let mut frame = Frame::new(can_access_parent);
        if can_access_parent {
            if let Some(parent) = self.frames.last() {
                let parent_args = parent.args.clone();
                for arg in parent_args {
                    let copy = heap.copy(arg, true)?;
                    frame.tracked.insert(copy);
                    frame.args.push(copy);
                }
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the top frame and destroys everything it tracks.
    pub fn pop(&mut self, heap: &mut Heap) {
        if let Some(frame) = self.frames.pop() {
            for id in frame.tracked {
                heap.free(id);
            }
        }
    }

    /// Binds a name in the top frame and takes ownership of the object.
    pub fn add(&mut self, name: NameId, id: ObjId) {
        let top = self.top_mut();
        top.tracked.insert(id);
        top.bindings.insert(name, id);
    }

    pub fn track(&mut self, id: ObjId) {
        self.top_mut().tracked.insert(id);
    }

    /// Moves ownership of an object into the frame below the top one.
    pub fn track_in_parent(&mut self, id: ObjId) {
        let depth = self.frames.len();
        debug_assert!(depth >= 2, "no parent frame to track into");
        if depth >= 2 {
            self.frames[depth - 2].tracked.insert(id);
        }
    }

    pub fn untrack(&mut self, id: ObjId) {
        self.top_mut().tracked.remove(&id);
    }

    /// Name resolution: walk from the top frame towards the root while
    /// frames allow parent access, then fall back to the global frame.
    pub fn find(&self, name: NameId) -> Option<ObjId> {
        let mut index = self.frames.len().checked_sub(1)?;
        loop {
            let frame = &self.frames[index];
            if let Some(id) = frame.bindings.get(&name) {
                return Some(*id);
            }
            if frame.can_access_parent && index > 0 {
                index -= 1;
            } else {
                break;
            }
        }
        if index != 0 {
            return self.frames[0].bindings.get(&name).copied();
        }
        None
    }

    pub fn present(&self, name: NameId) -> bool {
        self.find(name).is_some()
    }

    /// Pushes onto the top frame's argument stack, taking ownership.
    pub fn push_arg(&mut self, id: ObjId) {
        let top = self.top_mut();
        top.args.push(id);
        top.tracked.insert(id);
    }

    pub fn pop_arg(&mut self) -> RuntimeResult<ObjId> {
        self.top_mut().args.pop().ok_or(RuntimeError::StackEmpty)
    }

    /// Indexes the top frame's argument stack from the most recently
    /// pushed entry down.
    pub fn arg(&self, pos: i64) -> RuntimeResult<ObjId> {
        let args = &self.top().args;
        if pos < 0 || pos as usize >= args.len() {
            return Err(RuntimeError::StackAccess { pos });
        }
        Ok(args[args.len() - 1 - pos as usize])
    }

    pub fn arg_count(&self) -> usize {
        self.top().args.len()
    }
}
