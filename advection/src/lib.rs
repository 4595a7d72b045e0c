//! # Fog-edge advection
//!
//! `advection` estimates how fast a feature (typically a fog edge in
//! a BTD image) moved between two co-registered rasters, by
//! cross-correlating their profiles along a user-drawn transect.

mod displacement;
mod error;
pub mod pipeline;
pub mod session;
mod speed;

pub use {
    crate::{
        displacement::{estimate, DisplacementEstimate},
        error::AdvectionError,
        pipeline::Advection,
        session::{Outcome, SessionConfig, SessionState, Slot, TransectSession},
        speed::{compute_speed, Direction, SpeedResult},
    },
    raster, transect,
};
