//! External API integrations

pub mod distance;

pub use distance::{DistanceLookup, DistanceMatrixClient, TravelEstimate};
