// src/context.rs
//! Cancellation scopes.
//!
//! Scopes live in a per-thread arena and are addressed by index. A
//! [`Context`] is a counted handle: the slot is recycled once no handle and
//! no owning parent refers to it. Parents own their children (append-only),
//! children never point back at an owner, so there are no reference cycles
//! to leak through.
use std::{cell::RefCell, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

struct ScopeNode {
    disposed: bool,
    enclosed: bool,
    // lineage only: the enclosed scope this one was derived from
    parent: Option<ContextId>,
    children: Vec<ContextId>,
    refs: usize,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<Option<ScopeNode>>,
    free: Vec<usize>,
}

impl Arena {
    fn alloc(&mut self, parent: Option<ContextId>) -> ContextId {
        let node = ScopeNode {
            disposed: false,
            enclosed: false,
            parent,
            children: Vec::new(),
            refs: 1,
        };
        if let Some(p) = parent {
            self.retain(p);
        }
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                ContextId(idx)
            }
            None => {
                self.nodes.push(Some(node));
                ContextId(self.nodes.len() - 1)
            }
        }
    }

    #[inline]
    fn node(&self, id: ContextId) -> Option<&ScopeNode> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    #[inline]
    fn node_mut(&mut self, id: ContextId) -> Option<&mut ScopeNode> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    fn retain(&mut self, id: ContextId) {
        if let Some(n) = self.node_mut(id) {
            n.refs += 1;
        }
    }

    fn release(&mut self, id: ContextId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(n) = self.node_mut(id) else { continue };
            n.refs = n.refs.saturating_sub(1);
            if n.refs > 0 {
                continue;
            }
            if let Some(node) = self.nodes[id.0].take() {
                stack.extend(node.children);
                stack.extend(node.parent);
                self.free.push(id.0);
            }
        }
    }

    /// Depth-first; returns how many scopes flipped to disposed.
    fn dispose(&mut self, id: ContextId) -> usize {
        let mut flipped = 0;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(n) = self.node_mut(id) else { continue };
            if n.disposed {
                continue;
            }
            n.disposed = true;
            flipped += 1;
            // reversed so the first child is walked first
            stack.extend(n.children.iter().rev().copied());
        }
        flipped
    }
}

thread_local! {
    static ARENA: RefCell<Arena> = RefCell::new(Arena::default());
}

/// Handle to a cancellation scope.
pub struct Context {
    id: ContextId,
}

impl Context {
    /// A fresh root scope.
    pub fn new() -> Self {
        let id = ARENA.with(|a| a.borrow_mut().alloc(None));
        Self { id }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Marks this scope and every owned scope (present and future) disposed.
    pub fn dispose(&self) {
        let n = ARENA.with(|a| a.borrow_mut().dispose(self.id));
        if n > 0 {
            tracing::debug!(context = self.id.0, scopes = n, "context disposed");
        }
    }

    /// Disposes only the owned sub-scopes, leaving this one live.
    pub fn dispose_sub_contexts(&self) {
        let children = ARENA.with(|a| {
            a.borrow().node(self.id).map(|n| n.children.clone()).unwrap_or_default()
        });
        ARENA.with(|a| {
            let mut a = a.borrow_mut();
            for c in children {
                a.dispose(c);
            }
        });
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        ARENA.with(|a| a.borrow().node(self.id).map_or(true, |n| n.disposed))
    }

    /// New promises constructed with this scope as parent get a fresh scope
    /// instead, so break/goto signals stop at this boundary.
    pub fn enclose(&self) {
        ARENA.with(|a| {
            if let Some(n) = a.borrow_mut().node_mut(self.id) {
                n.enclosed = true;
            }
        });
    }

    #[inline]
    pub fn is_enclosed(&self) -> bool {
        ARENA.with(|a| a.borrow().node(self.id).map_or(false, |n| n.enclosed))
    }

    /// The enclosed scope this one was derived from, if any.
    pub fn parent(&self) -> Option<Context> {
        ARENA.with(|a| {
            let mut a = a.borrow_mut();
            let p = a.node(self.id)?.parent?;
            a.retain(p);
            Some(Context { id: p })
        })
    }

    pub fn child_count(&self) -> usize {
        ARENA.with(|a| a.borrow().node(self.id).map_or(0, |n| n.children.len()))
    }

    /// The scope a new promise inheriting from this one should own.
    pub(crate) fn derive(&self) -> Context {
        if !self.is_enclosed() {
            return self.clone();
        }
        let id = ARENA.with(|a| a.borrow_mut().alloc(Some(self.id)));
        Context { id }
    }

    /// Takes ownership of `child`. A disposed owner disposes it right away.
    pub(crate) fn add_child(&self, child: &Context) {
        if child.id == self.id {
            return;
        }
        let disposed = ARENA.with(|a| {
            let mut a = a.borrow_mut();
            let Some(n) = a.node_mut(self.id) else { return false };
            if n.children.contains(&child.id) {
                return n.disposed;
            }
            n.children.push(child.id);
            let disposed = n.disposed;
            a.retain(child.id);
            disposed
        });
        if disposed {
            child.dispose();
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        ARENA.with(|a| a.borrow_mut().retain(self.id));
        Self { id: self.id }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // the arena may already be gone during thread teardown
        let _ = ARENA.try_with(|a| {
            if let Ok(mut a) = a.try_borrow_mut() {
                a.release(self.id);
            }
        });
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id.0)
            .field("disposed", &self.is_disposed())
            .field("enclosed", &self.is_enclosed())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn live_scopes() -> usize {
    ARENA.with(|a| a.borrow().nodes.iter().filter(|n| n.is_some()).count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_cascades_and_is_idempotent() {
        let root = Context::new();
        let a = Context::new();
        let b = Context::new();
        root.add_child(&a);
        a.add_child(&b);

        root.dispose();
        root.dispose();
        assert!(root.is_disposed() && a.is_disposed() && b.is_disposed());
    }

    #[test]
    fn children_added_after_disposal_are_disposed() {
        let root = Context::new();
        root.dispose();
        let late = Context::new();
        root.add_child(&late);
        assert!(late.is_disposed());
    }

    #[test]
    fn sub_context_disposal_spares_the_owner() {
        let root = Context::new();
        let a = Context::new();
        root.add_child(&a);
        root.dispose_sub_contexts();
        assert!(a.is_disposed());
        assert!(!root.is_disposed());
    }

    #[test]
    fn enclosed_scope_derives_a_fresh_unowned_scope() {
        let outer = Context::new();
        assert_eq!(outer.derive(), outer);

        outer.enclose();
        let inner = outer.derive();
        assert_ne!(inner, outer);
        assert_eq!(inner.parent(), Some(outer.clone()));
        assert_eq!(outer.child_count(), 0);

        outer.dispose();
        assert!(!inner.is_disposed());
    }

    #[test]
    fn cyclic_ownership_still_terminates() {
        let a = Context::new();
        let b = Context::new();
        a.add_child(&b);
        b.add_child(&a);
        a.dispose();
        assert!(b.is_disposed());
    }

    #[test]
    fn slots_are_recycled_once_unreferenced() {
        let before = live_scopes();
        {
            let root = Context::new();
            let child = Context::new();
            root.add_child(&child);
            drop(child);
            assert_eq!(live_scopes(), before + 2);
        }
        assert_eq!(live_scopes(), before);
    }
}
