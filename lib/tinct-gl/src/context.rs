use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    num::NonZeroU32,
    sync::Arc,
    thread::{self, ThreadId},
};

use crate::{
    backend::Backend,
    error::{Error, GlErrorKind, Result},
};

/// Number of live objects of each kind.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ResourceCounts {
    pub shaders: usize,
    pub programs: usize,
    pub textures: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.shaders + self.programs + self.textures
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ResourceKind {
    Shader,
    Program,
    Texture,
}

/// Driver-level state that OpenGL keeps per context, mirrored explicitly.
struct ContextState<B> {
    owner: ThreadId,
    backend: B,
    active_program: Cell<Option<NonZeroU32>>,
    active_unit: Cell<u32>,
    texture_units: RefCell<HashMap<u32, NonZeroU32>>,
    live: Cell<ResourceCounts>,
}

/// Handle to a graphics context and the state it carries.
///
/// Cloning is cheap; every resource keeps a clone so it can release its driver object on drop.
/// The context is pinned to the thread it was created on: handles may be moved to other threads,
/// but using them there panics.
pub struct Context<B: Backend>(Arc<ContextState<B>>);

// # Safety
// The state is only reached through `Context::state`, which panics off the owning thread.
unsafe impl<B> Send for ContextState<B> {}
unsafe impl<B> Sync for ContextState<B> {}

impl<B: Backend> Clone for Context<B> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<B: Backend> fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("Context");
        f.field("owner", &self.0.owner);
        if self.is_current_thread() {
            let state = self.state();
            f.field("active_program", &state.active_program.get())
                .field("active_unit", &state.active_unit.get())
                .field("live", &state.live.get());
        }
        f.finish_non_exhaustive()
    }
}

impl<B: Backend> Context<B> {
    pub fn new(backend: B) -> Self {
        Self(Arc::new(ContextState {
            owner: thread::current().id(),
            backend,
            active_program: Cell::new(None),
            active_unit: Cell::new(0),
            texture_units: RefCell::new(HashMap::new()),
            live: Cell::new(ResourceCounts::default()),
        }))
    }

    /// Whether the calling thread is the one this context belongs to.
    pub fn is_current_thread(&self) -> bool {
        self.0.owner == thread::current().id()
    }

    fn state(&self) -> &ContextState<B> {
        if !self.is_current_thread() {
            panic!(
                "graphics context of {:?} used from {:?}",
                self.0.owner,
                thread::current().id()
            );
        }
        &self.0
    }

    pub fn backend(&self) -> &B {
        &self.state().backend
    }

    /// Name of the program currently in use, if any.
    pub fn active_program(&self) -> Option<NonZeroU32> {
        self.state().active_program.get()
    }

    pub fn live_resources(&self) -> ResourceCounts {
        self.state().live.get()
    }

    /// Texture bound to the 2D target of `unit`, as far as this context knows.
    pub fn bound_texture(&self, unit: u32) -> Option<NonZeroU32> {
        self.state().texture_units.borrow().get(&unit).copied()
    }

    /// Drains the driver error queue.
    pub fn guard(&self) -> Result<()> {
        GlErrorKind::guard(self.backend()).map_err(Error::from)
    }

    /// Turns a freshly created object name into a handle, reporting why the driver refused.
    pub(crate) fn object_name(&self, raw: u32) -> Result<NonZeroU32> {
        NonZeroU32::new(raw).ok_or_else(|| {
            Error::from(
                GlErrorKind::current_error(self.backend()).unwrap_or(GlErrorKind::NoObject),
            )
        })
    }

    pub(crate) fn set_active_program(&self, program: Option<NonZeroU32>) {
        self.backend().use_program(program.map_or(0, NonZeroU32::get));
        self.state().active_program.set(program);
    }

    pub(crate) fn active_unit(&self) -> u32 {
        self.state().active_unit.get()
    }

    /// Binds `texture` to the 2D target of `unit`, returning whatever was bound there before.
    ///
    /// The mirrored unit state only changes once the driver has accepted each call.
    pub(crate) fn bind_texture_2d(
        &self,
        unit: u32,
        texture: Option<NonZeroU32>,
    ) -> Result<Option<NonZeroU32>> {
        if self.state().active_unit.get() != unit {
            self.backend().active_texture(unit);
            self.guard()?;
            self.state().active_unit.set(unit);
        }
        self.backend()
            .bind_texture(gl::TEXTURE_2D, texture.map_or(0, NonZeroU32::get));
        self.guard()?;
        let mut units = self.state().texture_units.borrow_mut();
        Ok(match texture {
            Some(texture) => units.insert(unit, texture),
            None => units.remove(&unit),
        })
    }

    /// Deleting a texture unbinds it from every unit.
    pub(crate) fn forget_texture(&self, texture: NonZeroU32) {
        self.state()
            .texture_units
            .borrow_mut()
            .retain(|_, bound| *bound != texture);
    }

    pub(crate) fn created(&self, kind: ResourceKind) {
        self.update_counts(kind, |n| n + 1);
    }

    pub(crate) fn released(&self, kind: ResourceKind) {
        self.update_counts(kind, |n| n.saturating_sub(1));
    }

    fn update_counts(&self, kind: ResourceKind, f: impl FnOnce(usize) -> usize) {
        let mut counts = self.state().live.get();
        let slot = match kind {
            ResourceKind::Shader => &mut counts.shaders,
            ResourceKind::Program => &mut counts.programs,
            ResourceKind::Texture => &mut counts.textures,
        };
        *slot = f(*slot);
        self.state().live.set(counts);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::{headless::Headless, Context};

    #[test]
    fn other_threads_may_hold_but_not_use_the_context() {
        let ctx = Context::new(Headless::new());
        assert!(ctx.is_current_thread());
        let moved = ctx.clone();
        let outcome = thread::scope(|s| {
            s.spawn(move || {
                assert!(!moved.is_current_thread());
                assert!(format!("{moved:?}").contains("owner"));
                moved.live_resources()
            })
            .join()
        });
        assert!(outcome.is_err());
        assert_eq!(ctx.live_resources().total(), 0);
    }
}
