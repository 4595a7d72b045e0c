//! Interactive transect state.
//!
//! [TransectSession] turns pointer events and raster arrivals into
//! pipeline runs. It is a plain state machine driven through
//! `&mut self`; callers serialize events through their own event
//! loop.
//!
//! ```text
//!            pointer_down               pointer_up (len >= 1 px)
//!   Empty ───────────────▶ Drawing ──────────────────────────▶ Defined
//!     ▲ ▲                   │  ▲ pointer_move                  │   │
//!     │ └── len < 1 px ─────┘  └───────┘                       │   │
//!     │                        ▲          pointer_down         │   │
//!     │                        └───────────────────────────────┘   │
//!     └──────────── clear / raster mismatch ───────────────────────┘
//! ```

use crate::{pipeline::Advection, AdvectionError};
use geo::geometry::{Coord, Line};
use log::{debug, warn};
use raster::{Raster, C};
use std::{fmt, sync::Arc};
use transect::Transect;

/// Pipeline parameters held by a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Sample spacing along the transect, in pixels.
    pub spacing: C,

    /// Correlation search half-width, in samples.
    pub max_lag: usize,

    /// Correlation a confident estimate must exceed.
    pub min_correlation: C,

    /// Time between the two rasters.
    pub elapsed: C,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            spacing: 1.0,
            max_lag: 10,
            min_correlation: 0.5,
            elapsed: 1.0,
        }
    }
}

/// Which raster of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Before,
    After,
}

/// Result of the pipeline for a defined transect.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// At least one raster is not loaded yet.
    Pending,

    Ready(Box<Advection>),

    /// The transect is kept but no speed is available.
    Failed(AdvectionError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No transect. `notice` explains why a previous one was dropped.
    Empty { notice: Option<AdvectionError> },

    /// `anchor` is fixed, `cursor` follows the pointer.
    Drawing { anchor: Coord<C>, cursor: Coord<C> },

    Defined { transect: Transect, outcome: Outcome },
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { notice: None } => write!(f, "draw a transect"),
            Self::Empty {
                notice: Some(notice),
            } => write!(f, "transect cleared: {notice}"),
            Self::Drawing { .. } => write!(f, "drawing"),
            Self::Defined {
                outcome: Outcome::Pending,
                ..
            } => write!(f, "waiting for rasters"),
            Self::Defined {
                outcome: Outcome::Ready(advection),
                ..
            } => write!(f, "speed {}", advection.speed),
            Self::Defined {
                outcome: Outcome::Failed(err),
                ..
            } => write!(f, "error: {err}"),
        }
    }
}

pub struct TransectSession {
    config: SessionConfig,
    before: Option<Arc<Raster>>,
    after: Option<Arc<Raster>>,
    state: SessionState,

    /// Number of pipeline runs so far.
    generation: u64,
}

impl TransectSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            before: None,
            after: None,
            state: SessionState::Empty { notice: None },
            generation: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Number of times the pipeline has run. Changes exactly when a
    /// new [Outcome] other than `Pending` is produced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn raster(&self, slot: Slot) -> Option<&Arc<Raster>> {
        match slot {
            Slot::Before => self.before.as_ref(),
            Slot::After => self.after.as_ref(),
        }
    }

    /// True once both rasters are loaded.
    pub fn is_ready(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    /// Line to draw as the overlay, while drawing or once defined.
    pub fn overlay(&self) -> Option<Line<C>> {
        match &self.state {
            SessionState::Empty { .. } => None,
            SessionState::Drawing { anchor, cursor } => Some(Line::new(*anchor, *cursor)),
            SessionState::Defined { transect, .. } => Some(transect.line()),
        }
    }

    /// Latest successful result.
    pub fn advection(&self) -> Option<&Advection> {
        match &self.state {
            SessionState::Defined {
                outcome: Outcome::Ready(advection),
                ..
            } => Some(advection),
            _ => None,
        }
    }

    /// Starts a new transect at `pos`, discarding any previous one.
    pub fn pointer_down(&mut self, pos: Coord<C>) {
        self.state = SessionState::Drawing {
            anchor: pos,
            cursor: pos,
        };
    }

    /// Moves the free end of the transect being drawn. Never runs the
    /// pipeline.
    pub fn pointer_move(&mut self, pos: Coord<C>) {
        if let SessionState::Drawing { cursor, .. } = &mut self.state {
            *cursor = pos;
        }
    }

    /// Finishes the transect being drawn at `pos`.
    pub fn pointer_up(&mut self, pos: Coord<C>) {
        let SessionState::Drawing { anchor, .. } = self.state else {
            return;
        };
        match Transect::new(anchor, pos) {
            Ok(transect) => {
                let outcome = self.run(&transect);
                self.state = SessionState::Defined { transect, outcome };
            }
            Err(err) => {
                warn!("rejecting transect: {err}");
                self.state = SessionState::Empty {
                    notice: Some(err.into()),
                };
            }
        }
    }

    /// Drops the transect.
    pub fn clear(&mut self) {
        self.state = SessionState::Empty { notice: None };
    }

    /// Installs `raster` in `slot` and re-runs a defined transect.
    ///
    /// The raster must match the dimensions and pixel scale of the one
    /// it replaces, or of the other slot if `slot` is empty. On
    /// mismatch the raster is still installed, the other slot is
    /// emptied, and the transect is dropped.
    pub fn set_raster(&mut self, slot: Slot, raster: Arc<Raster>) {
        let reference = self.raster(slot).or(self.raster(other(slot))).cloned();
        let mismatch = reference
            .filter(|reference| !reference.is_co_registered(&raster))
            .map(|reference| AdvectionError::raster_mismatch(&reference, &raster));
        *self.slot_mut(slot) = Some(raster);

        if let Some(err) = mismatch {
            warn!("{slot:?} raster mismatch: {err}");
            *self.slot_mut(other(slot)) = None;
            self.state = SessionState::Empty { notice: Some(err) };
        } else {
            self.refresh();
        }
    }

    /// Replaces both rasters at once, running the pipeline at most
    /// once.
    ///
    /// If the pair disagrees with itself or with the rasters it
    /// replaces, only `before` is installed and the transect is
    /// dropped.
    pub fn set_rasters(&mut self, before: Arc<Raster>, after: Arc<Raster>) {
        let reference = self.before.as_ref().or(self.after.as_ref()).cloned();
        let mismatch = if before.is_co_registered(&after) {
            reference
                .filter(|reference| !reference.is_co_registered(&before))
                .map(|reference| AdvectionError::raster_mismatch(&reference, &before))
        } else {
            Some(AdvectionError::raster_mismatch(&before, &after))
        };

        self.before = Some(before);
        match mismatch {
            Some(err) => {
                warn!("raster pair mismatch: {err}");
                self.after = None;
                self.state = SessionState::Empty { notice: Some(err) };
            }
            None => {
                self.after = Some(after);
                self.refresh();
            }
        }
    }

    /// Marks `slot` as not loaded, e.g. while a replacement decodes.
    pub fn unload(&mut self, slot: Slot) {
        *self.slot_mut(slot) = None;
        self.refresh();
    }

    /// Updates the time between rasters and re-runs a defined
    /// transect.
    pub fn set_elapsed(&mut self, elapsed: C) {
        self.config.elapsed = elapsed;
        self.refresh();
    }
}

/// Private API.
impl TransectSession {
    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Arc<Raster>> {
        match slot {
            Slot::Before => &mut self.before,
            Slot::After => &mut self.after,
        }
    }

    /// Re-runs the pipeline for a defined transect, replacing whatever
    /// outcome it had.
    fn refresh(&mut self) {
        if let SessionState::Defined { transect, .. } = self.state {
            let outcome = self.run(&transect);
            self.state = SessionState::Defined { transect, outcome };
        }
    }

    fn run(&mut self, transect: &Transect) -> Outcome {
        let (Some(before), Some(after)) = (&self.before, &self.after) else {
            debug!("deferring pipeline until both rasters are loaded");
            return Outcome::Pending;
        };
        let SessionConfig {
            spacing,
            max_lag,
            min_correlation,
            elapsed,
        } = self.config;

        let result = Advection::builder()
            .before(before)
            .after(after)
            .transect(*transect)
            .spacing(spacing)
            .max_lag(max_lag)
            .min_correlation(min_correlation)
            .elapsed(elapsed)
            .build();
        self.generation += 1;

        match result {
            Ok(advection) => Outcome::Ready(Box::new(advection)),
            Err(err) => {
                warn!("pipeline failed: {err}");
                Outcome::Failed(err)
            }
        }
    }
}

fn other(slot: Slot) -> Slot {
    match slot {
        Slot::Before => Slot::After,
        Slot::After => Slot::Before,
    }
}
