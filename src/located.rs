//! Capability-gated values
//!
//! The location parameter `L` on [`Located`] and [`Colocated`] is for the
//! reader's benefit only. At runtime the sole gate is the [`Capability`]: a
//! projection mints exactly one, every real value it produces carries it, and
//! reads succeed only with that same capability. Values produced at other
//! locations are placeholders with no payload and no capability.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ChoreographyError, Result};
use crate::location::Location;

/// Unforgeable read credential of one projection. Equality is identity: two
/// separately minted capabilities never compare equal.
#[derive(Clone)]
pub struct Capability {
    id: Arc<Uuid>,
}

impl Capability {
    pub fn mint() -> Self {
        Capability {
            id: Arc::new(Uuid::new_v4()),
        }
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.id, &other.id)
    }
}

impl Eq for Capability {}

impl Debug for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({})", self.id)
    }
}

fn open<'a, T>(value: &'a Option<T>, token: &Option<Capability>, cap: &Capability) -> Result<&'a T> {
    match (value, token) {
        (Some(value), Some(token)) if token == cap => Ok(value),
        (Some(_), Some(_)) => Err(ChoreographyError::CapabilityViolation(
            "value was minted under a different capability".into(),
        )),
        _ => Err(ChoreographyError::CapabilityViolation(
            "value is not present at this location".into(),
        )),
    }
}

/// Values whose payload is released only against the right capability.
pub trait Guarded {
    type Value;

    fn read(&self, cap: &Capability) -> Result<&Self::Value>;
}

/// A value owned by a single location.
pub struct Located<T, L> {
    value: Option<T>,
    token: Option<Capability>,
    _at: PhantomData<fn() -> L>,
}

impl<T, L: Location> Located<T, L> {
    pub fn new(value: T, cap: &Capability) -> Self {
        Located {
            value: Some(value),
            token: Some(cap.clone()),
            _at: PhantomData,
        }
    }

    /// A value that lives elsewhere.
    pub fn remote() -> Self {
        Located {
            value: None,
            token: None,
            _at: PhantomData,
        }
    }

    pub fn get(&self, cap: &Capability) -> Result<&T> {
        open(&self.value, &self.token, cap)
    }

    pub fn into_inner(self, cap: &Capability) -> Result<T> {
        open(&self.value, &self.token, cap)?;
        self.value.ok_or_else(|| {
            ChoreographyError::CapabilityViolation("value is not present at this location".into())
        })
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

impl<T, L: Location> Guarded for Located<T, L> {
    type Value = T;

    fn read(&self, cap: &Capability) -> Result<&T> {
        self.get(cap)
    }
}

impl<T: Clone, L> Clone for Located<T, L> {
    fn clone(&self) -> Self {
        Located {
            value: self.value.clone(),
            token: self.token.clone(),
            _at: PhantomData,
        }
    }
}

impl<T, L> Debug for Located<T, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Located")
            .field("present", &self.value.is_some())
            .finish()
    }
}

/// A value jointly owned by a set of locations.
///
/// `owners` records which locations the value was addressed to; it is empty
/// on placeholders and plays no part in access control.
pub struct Colocated<T, L> {
    value: Option<T>,
    token: Option<Capability>,
    owners: Vec<L>,
}

impl<T, L: Location> Colocated<T, L> {
    pub fn new(value: T, owners: Vec<L>, cap: &Capability) -> Self {
        Colocated {
            value: Some(value),
            token: Some(cap.clone()),
            owners,
        }
    }

    pub fn remote() -> Self {
        Colocated {
            value: None,
            token: None,
            owners: Vec::new(),
        }
    }

    pub fn get(&self, cap: &Capability) -> Result<&T> {
        open(&self.value, &self.token, cap)
    }

    pub fn into_inner(self, cap: &Capability) -> Result<T> {
        open(&self.value, &self.token, cap)?;
        self.value.ok_or_else(|| {
            ChoreographyError::CapabilityViolation("value is not present at this location".into())
        })
    }

    pub fn owners(&self) -> &[L] {
        &self.owners
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

impl<T, L: Location> Guarded for Colocated<T, L> {
    type Value = T;

    fn read(&self, cap: &Capability) -> Result<&T> {
        self.get(cap)
    }
}

impl<T: Clone, L: Clone> Clone for Colocated<T, L> {
    fn clone(&self) -> Self {
        Colocated {
            value: self.value.clone(),
            token: self.token.clone(),
            owners: self.owners.clone(),
        }
    }
}

impl<T, L: Debug> Debug for Colocated<T, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Colocated")
            .field("owners", &self.owners)
            .field("present", &self.value.is_some())
            .finish()
    }
}

/// One located value per location. Each participant holds a real payload at
/// most under its own key; every other entry is a placeholder.
pub struct Faceted<T, L> {
    facets: HashMap<L, Located<T, L>>,
}

impl<T, L: Location> Faceted<T, L> {
    pub fn facet(&self, at: L) -> Option<&Located<T, L>> {
        self.facets.get(&at)
    }

    pub fn locations(&self) -> impl Iterator<Item = &L> {
        self.facets.keys()
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    pub fn into_inner(self) -> HashMap<L, Located<T, L>> {
        self.facets
    }
}

impl<T, L: Location> FromIterator<(L, Located<T, L>)> for Faceted<T, L> {
    fn from_iter<I: IntoIterator<Item = (L, Located<T, L>)>>(iter: I) -> Self {
        Faceted {
            facets: iter.into_iter().collect(),
        }
    }
}

impl<T, L: Debug> Debug for Faceted<T, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.facets.iter()).finish()
    }
}

/// Result shape of a sub-choreography at a location that did not take part.
///
/// A location outside a `colocally` set never runs the body, yet the code
/// after the call still has to destructure its result. Any type returned from
/// a scoped sub-choreography provides a stand-in for that case; located
/// stand-ins carry no payload and fail every read.
pub trait Placeholder {
    fn placeholder() -> Self;
}

impl<T, L: Location> Placeholder for Located<T, L> {
    fn placeholder() -> Self {
        Located::remote()
    }
}

impl<T, L: Location> Placeholder for Colocated<T, L> {
    fn placeholder() -> Self {
        Colocated::remote()
    }
}

impl<T, L: Location> Placeholder for Faceted<T, L> {
    fn placeholder() -> Self {
        Faceted {
            facets: HashMap::new(),
        }
    }
}

impl Placeholder for () {
    fn placeholder() -> Self {}
}

impl<T> Placeholder for Option<T> {
    fn placeholder() -> Self {
        None
    }
}

impl<T> Placeholder for Vec<T> {
    fn placeholder() -> Self {
        Vec::new()
    }
}

impl<K: Eq + Hash, V> Placeholder for HashMap<K, V> {
    fn placeholder() -> Self {
        HashMap::new()
    }
}

macro_rules! tuple_placeholder {
    ($($name:ident),+) => {
        impl<$($name: Placeholder),+> Placeholder for ($($name,)+) {
            fn placeholder() -> Self {
                ($($name::placeholder(),)+)
            }
        }
    };
}

tuple_placeholder!(A);
tuple_placeholder!(A, B);
tuple_placeholder!(A, B, C);
tuple_placeholder!(A, B, C, D);
tuple_placeholder!(A, B, C, D, E);
tuple_placeholder!(A, B, C, D, E, F);
