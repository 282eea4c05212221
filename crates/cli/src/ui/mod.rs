//! Terminal output for hitch
//!
//! - `icons`: status markers
//! - `progress`: spinners and progress bars (indicatif)
//! - `report`: pre-commit style status lines and failure details

pub mod icons;
pub mod progress;
pub mod report;

pub use icons::StatusIcon;
pub use progress::{ProgressObserver, create_spinner};
pub use report::Printer;
