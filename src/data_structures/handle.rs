//! Typed indices into the [`Assets`](crate::resources::Assets) arena.

use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

/// A non-owning, copyable reference to a resource stored in an arena.
///
/// The arena owns the GPU object; handles can be freely copied into entities,
/// shader bindings and frame plans without touching reference counts.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>().rsplit("::").next().unwrap_or("?");
        write!(f, "Handle<{}>({})", name, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Thing;

    #[test]
    fn handles_compare_by_index() {
        let a: Handle<Thing> = Handle::new(3);
        let b: Handle<Thing> = Handle::new(3);
        let c: Handle<Thing> = Handle::new(4);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(format!("{:?}", c), "Handle<Thing>(4)");
    }
}
