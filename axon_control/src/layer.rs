//! Uniform component lifecycle.
//!
//! Every component of the stack (axis routers, the controller cycle) speaks
//! the same six-operation lifecycle so the loop can drive heterogeneous
//! components uniformly. `LayerGroup` composes members in insertion order;
//! `read`/`write` run every member even after a failure so one degraded axis
//! does not starve the others, and report the conjunction.

/// Six-operation component lifecycle.
///
/// Per-tick `read`/`write` returning `false` means "not ready", not a fatal
/// fault; the loop keeps ticking.
pub trait Layer: Send {
    /// Component name for diagnostics.
    fn name(&self) -> &str;

    /// One-shot initialization after construction.
    fn init(&mut self) -> bool {
        true
    }

    /// Per-tick read phase.
    fn read(&mut self) -> bool;

    /// Per-tick write phase.
    fn write(&mut self) -> bool;

    /// Clear transient fault state.
    fn recover(&mut self) -> bool {
        true
    }

    /// Health report hook.
    fn report(&mut self) -> bool {
        true
    }

    /// Orderly teardown.
    fn shutdown(&mut self) -> bool {
        true
    }
}

impl Layer for Box<dyn Layer> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }
    fn init(&mut self) -> bool {
        self.as_mut().init()
    }
    fn read(&mut self) -> bool {
        self.as_mut().read()
    }
    fn write(&mut self) -> bool {
        self.as_mut().write()
    }
    fn recover(&mut self) -> bool {
        self.as_mut().recover()
    }
    fn report(&mut self) -> bool {
        self.as_mut().report()
    }
    fn shutdown(&mut self) -> bool {
        self.as_mut().shutdown()
    }
}

/// Ordered group of layers driven as one.
pub struct LayerGroup<L> {
    name: String,
    members: Vec<L>,
}

impl<L: Layer> LayerGroup<L> {
    /// Create an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Append a member; it runs after all existing members.
    pub fn add(&mut self, layer: L) {
        self.members.push(layer);
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member by index.
    pub fn get(&self, index: usize) -> Option<&L> {
        self.members.get(index)
    }

    /// Mutable member by index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut L> {
        self.members.get_mut(index)
    }

    /// Iterate members in run order.
    pub fn iter(&self) -> impl Iterator<Item = &L> {
        self.members.iter()
    }

    /// Iterate members mutably in run order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut L> {
        self.members.iter_mut()
    }

    /// Mutable view of all members.
    pub fn members_mut(&mut self) -> &mut [L] {
        &mut self.members
    }
}

impl<L: Layer> Layer for LayerGroup<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> bool {
        let mut ok = true;
        for l in &mut self.members {
            ok &= l.init();
        }
        ok
    }

    fn read(&mut self) -> bool {
        let mut ok = true;
        for l in &mut self.members {
            ok &= l.read();
        }
        ok
    }

    fn write(&mut self) -> bool {
        let mut ok = true;
        for l in &mut self.members {
            ok &= l.write();
        }
        ok
    }

    fn recover(&mut self) -> bool {
        let mut ok = true;
        for l in &mut self.members {
            ok &= l.recover();
        }
        ok
    }

    fn report(&mut self) -> bool {
        let mut ok = true;
        for l in &mut self.members {
            ok &= l.report();
        }
        ok
    }

    fn shutdown(&mut self) -> bool {
        // Teardown in reverse of init order.
        let mut ok = true;
        for l in self.members.iter_mut().rev() {
            ok &= l.shutdown();
        }
        ok
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
