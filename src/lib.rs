//! Conversion of neuroimaging files between tractography and anatomical
//! formats.
//!
//! This crate reads and writes BrainVoyager fiber files (FBR) and volumes
//! (VMR), TrackVis (TRK) and MRtrix (TCK) streamline files, and moves
//! streamlines and volumes between the coordinate conventions of those
//! formats: RAS+ world millimeters, voxel indices, and the PIL+ system used
//! by BrainVoyager.
//!
//! # Example
//!
//! ```no_run
//! use visubrain::ConversionRequest;
//! # fn run() -> visubrain::Result<()> {
//! ConversionRequest::new("bundle.trk", "bundle.fbr", None)?.convert()?;
//! # Ok(())
//! # }
//! ```
//!
//! The individual codecs are available in their own modules. For instance,
//! [`fbr::FbrFile`] gives access to the groups and fibers of an FBR file.
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

pub mod affine;
pub mod convert;
pub mod error;
pub mod fbr;
pub mod filter;
pub mod reference;
pub mod space;
pub mod streamline;
pub mod tck;
pub mod trk;
mod util;
pub mod vmr;
pub mod volume;

pub use crate::convert::{ConversionKind, ConversionRequest, FbrExportOptions};
pub use crate::error::{ConvertError, Result};
pub use crate::fbr::{FbrFile, FbrHeader, Fiber, FiberGroup};
pub use crate::reference::AnatomicalReference;
pub use crate::streamline::{Point, Space, Streamline, Tractogram};
pub use crate::tck::TckFile;
pub use crate::trk::TrkFile;
pub use crate::vmr::VmrVolume;
pub use crate::volume::Volume;
