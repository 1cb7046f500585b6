//! Commodore Agnus OCS — beam counter, DMA controller, copper, and blitter.
//!
//! Agnus is the master DMA controller in the Original Chip Set (OCS). It owns
//! the system bus during DMA slots, generates the beam position counters, and
//! contains the copper coprocessor and blitter sub-units.

mod agnus;
mod blitter;
mod copper;
mod ddf;

pub use agnus::{
    sync_to_e, Agnus, CckBusPlan, PaulaReturnProgressPolicy, SlotOwner, CIA_E_CLOCK_PERIOD_CCKS,
    PAL_CCKS_PER_LINE, PAL_LINES_PER_FRAME, LOWRES_DDF_TO_PLANE,
};
pub use blitter::{apply_fill, apply_minterm, blit_cycle, run_copy_blit, BlitStep, BlitWords, BltCon0, BltCon1};
pub use copper::{Copper, State as CopperState};
pub use ddf::{BitplaneEvent, DasEvent, DdfFlipFlops, DdfWindow, build_bitplane_table, build_das_table};
