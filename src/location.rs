use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// A participant of a choreography.
///
/// Locations are usually a plain enum deriving `Serialize`/`Deserialize`; the
/// serde form is the participant name carried in wire envelopes.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// enum Role {
///     Buyer,
///     Seller,
/// }
///
/// fn assert_location<T: locus::Location>() {}
/// assert_location::<Role>();
/// ```
pub trait Location:
    Copy + Eq + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> Location for T where
    T: Copy + Eq + Hash + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
}
