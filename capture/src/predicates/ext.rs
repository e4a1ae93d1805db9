//! Extension trait for asserting against collections of captured `Span`s.

use predicates::Predicate;

use bus_telemetry::Span;

/// Helper to wrap iterators over [`Span`]s so that they are more convenient to use
/// with `Predicate`s.
///
/// See [the module-level docs](crate::predicates) for examples of usage.
pub trait ScannerExt<'a>: IntoIterator<Item = &'a Span> + Sized {
    /// Wraps this collection into a [`Scanner`].
    fn scanner(self) -> Scanner<Self>;
}

impl<'a, I: IntoIterator<Item = &'a Span>> ScannerExt<'a> for I {
    fn scanner(self) -> Scanner<Self> {
        Scanner { iter: self }
    }
}

/// Iterator extension that allows using `Predicate`s rather than closures to find
/// matching spans, and panics with informative messages on assertion failures.
///
/// Returned by [`ScannerExt::scanner()`].
#[derive(Debug, Clone, Copy)]
pub struct Scanner<I> {
    iter: I,
}

impl<'a, I: IntoIterator<Item = &'a Span>> Scanner<I> {
    /// Finds the single span matching the predicate.
    ///
    /// # Panics
    ///
    /// Panics with an informative message if no spans, or multiple spans match
    /// the predicate.
    pub fn single<P>(self, predicate: &P) -> &'a Span
    where
        P: Predicate<Span> + ?Sized,
    {
        let mut iter = self.iter.into_iter();
        let first = iter
            .find(|span| predicate.eval(span))
            .unwrap_or_else(|| panic!("no spans have matched predicate {predicate}"));

        if let Some(second) = iter.find(|span| predicate.eval(span)) {
            panic!(
                "multiple spans match predicate {predicate}: {:#?}",
                [first, second]
            );
        }
        first
    }

    /// Finds the first span matching the predicate.
    ///
    /// # Panics
    ///
    /// Panics with an informative message if no spans match the predicate.
    pub fn first<P>(self, predicate: &P) -> &'a Span
    where
        P: Predicate<Span> + ?Sized,
    {
        self.iter
            .into_iter()
            .find(|span| predicate.eval(span))
            .unwrap_or_else(|| panic!("no spans have matched predicate {predicate}"))
    }

    /// Checks whether all spans match the predicate.
    pub fn all<P>(self, predicate: &P) -> bool
    where
        P: Predicate<Span> + ?Sized,
    {
        self.iter.into_iter().all(|span| predicate.eval(span))
    }

    /// Checks whether no span matches the predicate.
    pub fn none<P>(self, predicate: &P) -> bool
    where
        P: Predicate<Span> + ?Sized,
    {
        !self.iter.into_iter().any(|span| predicate.eval(span))
    }
}
