//! Bridge between pack-based csolution builds and the STM32CubeMX
//! vendor GUI.
//!
//! Given a `cbuild-gen-idx.yml` build description, the bridge launches
//! STM32CubeMX on a generated or pre-existing project, then distills
//! the GUI's output (the `.ioc` project file, the `.mxproject`
//! manifest and the generated HAL sources) into two artifacts the
//! build can consume:
//!
//! - `MX_Device.h`, preprocessor definitions for every configured
//!   peripheral and its pins, and
//! - `STM32CubeMX.cgen.yml`, the generator-import layer listing
//!   sources, defines and include paths to merge back into the build.
//!
//! Multi-core and TrustZone projects are handled per context; each
//! declared subsystem runs through the pipeline independently.

pub mod cbuild;
pub mod cgen;
pub mod context;
pub mod cubemx;
pub mod error;
pub mod extract;
pub mod ini;
pub mod ioc;
pub mod mx_device;
pub mod mxproject;
pub mod toolchain;
pub mod util;

pub use crate::error::{Error, Result};
