//! Pure derivations over the equipment list for the dashboard view.

pub mod memo;
pub mod palette;
pub mod stats;

pub use memo::DashboardMemo;
pub use palette::{section_hash, SectionPalette, PALETTE};
pub use stats::{DashboardStats, Distribution, NO_SECTION, UNDEFINED_TYPE};
