#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Stewart platform motion core (hardware-agnostic).
//!
//! This crate drives six linear actuators with potentiometer feedback. All
//! hardware interactions go through `stewart_traits::ActuatorIo` and
//! `stewart_traits::PersistentStore`.
//!
//! ## Architecture
//!
//! - **Filtering**: fixed-depth moving average per actuator (`filter`)
//! - **Actuator**: calibration stage machine and deadband position hold (`actuator`)
//! - **Platform**: six actuators ticked together, atomic multi-axis commands (`platform`)
//! - **Persistence**: checksummed 30-byte calibration record (`persist`)
//! - **Runner**: blocking, time-bounded loops for binaries (`runner`)
//!
//! Nothing in `Actuator` or `Platform` blocks; callers own the loop and call
//! `Platform::tick()` at a steady rate.

pub mod actuator;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod fixed_point;
pub mod hw_error;
pub mod persist;
pub mod platform;
pub mod runner;
pub mod status;

pub use actuator::Actuator;
pub use builder::{Missing, PlatformBuilder, Set};
pub use calibration::{CalibrationOrigin, CalibrationStage, NUM_CALIB_STAGES};
pub use config::{
    ActuatorPins, CalibrationCfg, ControlCfg, FilterCfg, NUM_ACTUATORS, PersistCfg, PlatformCfg,
};
pub use error::{BuildError, CalibrationFault, CommandError, PlatformError, Report, Result};
pub use filter::SmoothingFilter;
pub use persist::{
    CalibrationRecord, LoadOutcome, RECORD_LEN, StaleReason, load_config, save_config,
};
pub use platform::Platform;
pub use runner::{RunParams, RunReport, StartupReport, StartupSource};
pub use status::{ActuatorStatus, PlatformStatus};
