//! Node handles.
//!
//! A [`Ref`] is a counted, typed reference to a vertex. It does not own the
//! node; it keeps the vertex alive by holding one reference on it.

use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::graph::VertexId;

use super::eager::Eager;
use super::node::{Metadata, Value};
use super::runtime::Shared;

/// A counted reference to a node producing values of type `T`.
///
/// Cloning adds a reference, dropping releases it. When the last reference
/// to a node goes away the node is destroyed together with every dependency
/// nothing else holds.
pub struct Ref<T> {
    engine: Weak<Shared>,
    id: VertexId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    /// Wrap a vertex on which the caller already took a reference.
    pub(crate) fn adopt(engine: &Rc<Shared>, id: VertexId) -> Self {
        Self {
            engine: Rc::downgrade(engine),
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub(crate) fn engine(&self) -> Result<Rc<Shared>> {
        self.engine.upgrade().ok_or(Error::EngineStopped)
    }

    /// The vertex of this handle, checked against the engine it is used with.
    pub(crate) fn id_in(&self, engine: &Rc<Shared>) -> Result<VertexId> {
        if !Rc::ptr_eq(&self.engine()?, engine) {
            return Err(Error::EngineMismatch);
        }
        Ok(self.id)
    }

    pub fn label(&self) -> Result<String> {
        let engine = self.engine()?;
        let node = engine.network.borrow().node(self.id);
        let label = node.borrow().label();
        Ok(label)
    }

    /// Whether the node currently holds a position and receives updates.
    pub fn is_active(&self) -> Result<bool> {
        Ok(self.engine()?.network.borrow().is_active(self.id))
    }

    pub fn ref_count(&self) -> Result<usize> {
        Ok(self.engine()?.network.borrow().graph[self.id].ref_count())
    }

    /// Attach metadata to the node. Ignored while the node is inactive.
    pub fn set_metadata(&self, metadata: Metadata) -> Result<()> {
        let engine = self.engine()?;
        engine.update(|network, _| network.set_metadata(self.id, metadata));
        Ok(())
    }

    pub fn metadata(&self) -> Result<Option<Metadata>> {
        Ok(self.engine()?.network.borrow().metadata(self.id))
    }
}

impl<T: Value> Ref<T> {
    /// Observe the node: activate it and everything it depends on, and keep
    /// its value up to date for as long as the returned handle lives.
    pub fn observe(&self) -> Result<Eager<T>> {
        let engine = self.engine()?;
        Eager::create(&engine, self.id)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        if let Some(engine) = self.engine.upgrade() {
            engine.add_ref(self.id);
        }

        Self {
            engine: self.engine.clone(),
            id: self.id,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Ref<T> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.upgrade() {
            engine.release(self.id);
        }
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}
