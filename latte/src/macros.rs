/// Build an [`Id`](crate::Id) from a string literal naming a measurement
/// site.
///
/// This is the ergonomic entry point for instrumentation call sites: the
/// literal is promoted to a `&'static str`, its address becomes the site's
/// identity (as [`Id::new`](crate::Id::new) would use), and the literal
/// itself is kept as a display label so reports can print something more
/// readable than a hex address.
///
/// ```
/// use latte::id;
/// let site = id!("order.match");
/// ```
///
/// Each textual occurrence of `id!(...)` expands to its own `static`, so it
/// produces a distinct address per call site even if two occurrences share
/// the same literal text. That is harmless for a `Start`/`Stop` pair written
/// next to each other (`Stop`'s id argument is advisory only — see
/// [`Recorder::stop`](crate::recorder::Recorder::stop)) but means `id!(...)`
/// is the wrong tool for naming a site from two different places in the
/// source, e.g. recording at one call site and calling
/// [`Snapshot`](crate::Snapshot) from another. For that, define the site
/// once as a named `&'static str` and build the `Id` from it directly with
/// [`Id::new`](crate::Id::new) or [`Id::with_label`](crate::Id::with_label)
/// everywhere it is needed.
#[macro_export]
macro_rules! id {
    ($site:expr) => {{
        static __LATTE_SITE: &str = $site;
        $crate::Id::with_label(__LATTE_SITE)
    }};
}

/// Marks a branch as unlikely and keeps it out of line, the way the stack
/// overflow / empty-pop / first-use paths in the hot-path API are meant to
/// be compiled. `#[cold]` alone is a hint; wrapping the body in a
/// `#[inline(never)]` function keeps the compiler from duplicating the cold
/// code back into the hot caller.
macro_rules! cold_path {
    ($body:block) => {{
        #[cold]
        #[inline(never)]
        fn cold() {}
        cold();
        $body
    }};
}

pub(crate) use cold_path;
