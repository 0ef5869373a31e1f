//! Deciding which units are in scope
//!
//! A [`ScopeFilter`] is a cheap, side-effect free predicate on class names. Filters are used in
//! two places:
//!
//!   - to decide which loaded units get looked at at all (the scan filter)
//!   - to classify units as _checked_ (subject to enforcement) or _unchecked_ (only monitored
//!     for effects crossing into checked code)
//!
//! Opting in through an annotation on a class or its package is not a filter, since finding out
//! requires loading metadata: see [`MarkerLookup`].

mod filters;
mod marker;

pub use filters::*;
pub use marker::*;

use crate::jvm::BinaryName;
use std::sync::Arc;

/// Predicate on class names
pub trait ScopeFilter: Send + Sync {
    fn test(&self, class: &BinaryName) -> bool;

    /// Accept classes accepted by both filters
    fn and<F: ScopeFilter>(self, other: F) -> AndFilter<Self, F>
    where
        Self: Sized,
    {
        AndFilter(self, other)
    }

    /// Accept classes accepted by either filter
    fn or<F: ScopeFilter>(self, other: F) -> OrFilter<Self, F>
    where
        Self: Sized,
    {
        OrFilter(self, other)
    }

    /// Accept classes rejected by this filter
    fn not(self) -> NotFilter<Self>
    where
        Self: Sized,
    {
        NotFilter(self)
    }
}

impl<F: ScopeFilter + ?Sized> ScopeFilter for Arc<F> {
    fn test(&self, class: &BinaryName) -> bool {
        (**self).test(class)
    }
}

impl<F: ScopeFilter + ?Sized> ScopeFilter for Box<F> {
    fn test(&self, class: &BinaryName) -> bool {
        (**self).test(class)
    }
}

pub struct AndFilter<A, B>(A, B);

impl<A: ScopeFilter, B: ScopeFilter> ScopeFilter for AndFilter<A, B> {
    fn test(&self, class: &BinaryName) -> bool {
        self.0.test(class) && self.1.test(class)
    }
}

pub struct OrFilter<A, B>(A, B);

impl<A: ScopeFilter, B: ScopeFilter> ScopeFilter for OrFilter<A, B> {
    fn test(&self, class: &BinaryName) -> bool {
        self.0.test(class) || self.1.test(class)
    }
}

pub struct NotFilter<A>(A);

impl<A: ScopeFilter> ScopeFilter for NotFilter<A> {
    fn test(&self, class: &BinaryName) -> bool {
        !self.0.test(class)
    }
}

/// Filter defined by a closure
pub struct FnFilter<F>(pub F);

impl<F: Fn(&BinaryName) -> bool + Send + Sync> ScopeFilter for FnFilter<F> {
    fn test(&self, class: &BinaryName) -> bool {
        (self.0)(class)
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAll;

impl ScopeFilter for AcceptAll {
    fn test(&self, _class: &BinaryName) -> bool {
        true
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RejectAll;

impl ScopeFilter for RejectAll {
    fn test(&self, _class: &BinaryName) -> bool {
        false
    }
}

pub fn accept_all() -> Arc<dyn ScopeFilter> {
    Arc::new(AcceptAll)
}

pub fn reject_all() -> Arc<dyn ScopeFilter> {
    Arc::new(RejectAll)
}
