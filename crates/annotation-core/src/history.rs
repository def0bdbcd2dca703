/// Linear undo stack of whole-value snapshots with a bounded depth
#[derive(Clone, Debug)]
pub struct UndoHistory<T: Clone> {
    stack: Vec<T>,
    cursor: usize,
    limit: usize,
}

impl<T: Clone> UndoHistory<T> {
    pub const DEFAULT_LIMIT: usize = 64;

    pub fn new(initial: T) -> Self {
        Self::with_limit(initial, Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(initial: T, limit: usize) -> Self {
        Self {
            stack: vec![initial],
            cursor: 0,
            limit: limit.max(1),
        }
    }

    pub fn push_snapshot(&mut self, value: T) {
        if self.cursor + 1 < self.stack.len() {
            self.stack.truncate(self.cursor + 1);
        }
        self.stack.push(value);
        if self.stack.len() > self.limit {
            let overflow = self.stack.len() - self.limit;
            self.stack.drain(..overflow);
        }
        self.cursor = self.stack.len().saturating_sub(1);
    }

    /// Applies `f` to every stored entry, for edits that must survive undo
    pub fn for_each_mut(&mut self, f: impl FnMut(&mut T)) {
        self.stack.iter_mut().for_each(f);
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.stack.len()
    }

    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.stack[self.cursor].clone())
    }

    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.stack[self.cursor].clone())
    }
}
