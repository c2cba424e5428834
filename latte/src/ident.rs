use std::fmt;
use std::hash::{Hash, Hasher};

/// A stable identifier for a measurement site.
///
/// Equality and ordering are defined on the *address* an `Id` was built
/// from, never on the bytes it points at — two [`Id`]s compare equal iff
/// they were constructed from the same address. The caller is responsible
/// for ensuring that a given logical site always presents the same address
/// for the lifetime of the process; a `&'static` reference (including a
/// string literal or a file-scope constant) satisfies this trivially, which
/// is why [`Id::new`] only accepts `'static` references.
///
/// `Id` deliberately does not accept owned strings or other heap data: doing
/// so would let two equal-by-value-but-distinct allocations collide or, in
/// the case of a short-lived owned `String`, let a freed allocation's
/// address be reused by something else, silently aliasing an unrelated
/// site. Pointer identity is the whole contract.
///
/// An `Id` also carries an optional display label, set only by the [`id!`]
/// macro when the address happens to come from a `&'static str` literal.
/// The label is purely cosmetic — it exists so the Reporter has something
/// more readable than a hex address to put in the report's COMPONENT
/// column — and never participates in `Eq`, `Ord`, or `Hash`, which remain
/// pointer-identity only.
///
/// [`id!`]: crate::id
#[derive(Copy, Clone)]
pub struct Id {
    addr: *const (),
    label: Option<&'static str>,
}

// SAFETY: an `Id` never reads through the pointer it wraps for comparison
// purposes; it only ever compares and hashes the address itself. The
// pointee is required to be `'static`, so the address is stable for the
// process lifetime regardless of which thread observes it. `label`, when
// present, is itself a `&'static str` and is `Send`/`Sync` on its own.
unsafe impl Send for Id {}
unsafe impl Sync for Id {}

impl Id {
    /// Build an `Id` from the address of a `'static` reference, with no
    /// display label.
    ///
    /// ```
    /// use latte::Id;
    /// static SITE: &str = "checkout.settle";
    /// let id = Id::new(SITE);
    /// assert_eq!(id, Id::new(SITE));
    /// ```
    #[inline]
    pub fn new<T: ?Sized>(reference: &'static T) -> Self {
        Id {
            addr: reference as *const T as *const (),
            label: None,
        }
    }

    /// Build an `Id` from a `&'static str`, using the string itself as the
    /// identity (its address) and as the display label the Reporter shows.
    /// This is what the [`id!`](crate::id) macro expands to.
    #[inline]
    pub fn with_label(label: &'static str) -> Self {
        Id {
            addr: label as *const str as *const (),
            label: Some(label),
        }
    }

    /// This id's display label, if it was built with one.
    pub fn label(self) -> Option<&'static str> {
        self.label
    }

    #[inline]
    fn addr(self) -> usize {
        self.addr as usize
    }
}

impl PartialEq for Id {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Id {}

impl PartialOrd for Id {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl Hash for Id {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "Id({label:?} @ {:#x})", self.addr()),
            None => write!(f, "Id({:#x})", self.addr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_and_hashing_are_address_only_label_is_cosmetic() {
        static SITE: &str = "ident::equality_and_hashing_are_address_only";
        let labeled = Id::with_label(SITE);
        let unlabeled = Id::new(SITE);
        assert_eq!(labeled, unlabeled);
        assert_eq!(labeled.label(), Some(SITE));
        assert_eq!(unlabeled.label(), None);
    }

    #[test]
    fn distinct_statics_are_distinct_ids() {
        static A: &str = "ident::distinct_statics_are_distinct_ids::a";
        static B: &str = "ident::distinct_statics_are_distinct_ids::b";
        assert_ne!(Id::new(A), Id::new(B));
    }
}
