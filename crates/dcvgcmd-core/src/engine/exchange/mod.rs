//! Grand-canonical particle exchange confined to the two control regions.
//!
//! A [`restricted::RestrictedExchangeMove`] inserts and deletes molecules of
//! one species inside one [`region::ControlRegion`], drawing new molecules
//! from a relaxed [`reservoir::ReservoirTemplate`].

pub mod region;
pub mod reservoir;
pub mod restricted;
