use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};

use crate::registry::ObjectAddr;
use crate::Traced;

/// A heap-allocated value whose construction and destruction are traced.
///
/// The value lives in a `Box`, so its address is stable for the whole lifetime
/// and identifies it in the live-object table. Dropping a `Tracked` traces the
/// destruction, unless the trace mode filtered the type out when it was built.
///
/// # Examples
///
/// ```rust
/// use lifetrace::{Traced, Tracked};
///
/// #[derive(Traced, Clone)]
/// struct Account {
///     name: String,
/// }
///
/// let account = Tracked::with_signature(Account { name: "Assets".into() }, "String");
/// let copy = account.clone();
/// assert_eq!(copy.name, "Assets");
/// ```
pub struct Tracked<T: Traced> {
    registration: Registration,
    value: Box<T>,
}

/// Live-table entry of one `Tracked` value. Traces the destruction when dropped.
struct Registration {
    addr: ObjectAddr,
    tag: &'static str,
    size: usize,
    recorded: bool,
}

impl Registration {
    fn release(&mut self) {
        if mem::take(&mut self.recorded) {
            super::trace_destruct(self.addr, self.tag, self.size);
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Traced> Tracked<T> {
    /// Traces `value` with the empty constructor signature.
    pub fn new(value: T) -> Self {
        Self::with_signature(value, "")
    }

    /// Traces `value` as built by the constructor described by `signature`.
    pub fn with_signature(value: T, signature: &'static str) -> Self {
        let value = Box::new(value);
        let addr = ObjectAddr::of(&*value);
        let size = mem::size_of::<T>();
        let recorded = super::construct_traced(addr, T::TYPE_TAG, signature, size);
        Self {
            registration: Registration {
                addr,
                tag: T::TYPE_TAG,
                size,
                recorded,
            },
            value,
        }
    }

    /// Address the value is registered under.
    pub fn addr(this: &Self) -> ObjectAddr {
        this.registration.addr
    }

    /// Traces the destruction and hands the value back untraced.
    pub fn into_inner(this: Self) -> T {
        let Tracked {
            mut registration,
            value,
        } = this;
        registration.release();
        *value
    }
}

impl<T: Traced + Clone> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self::with_signature((*self.value).clone(), "&Self")
    }
}

impl<T: Traced + Default> Default for Tracked<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Traced> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Traced> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Traced + fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.value, f)
    }
}

impl<T: Traced + fmt::Display> fmt::Display for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl<T: Traced + PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.value == *other.value
    }
}

impl<T: Traced + Eq> Eq for Tracked<T> {}
