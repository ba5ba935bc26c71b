//! Types for error handling go here.

use nifti::NiftiError;
use quick_error::quick_error;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all error kinds coming from this library.
    #[derive(Debug)]
    pub enum ConvertError {
        /// The first four bytes of an FBR stream are not the FBR magic code.
        InvalidMagic(found: [u8; 4]) {
            display("Invalid FBR file: incorrect magic bytes {:02X?}", found)
        }
        /// The stream ended, or failed, while a field was being read.
        Truncated(field: &'static str, err: IOError) {
            source(err)
            display("Failed to read FBR field `{}`: {}", field, err)
        }
        /// Attempted to retrieve an enumerated value from a code which
        /// is not recognized.
        InvalidCode(typename: &'static str, code: u32) {
            display("invalid code `{}` for field {}", code, typename)
        }
        /// The FBR file uses a coordinate convention which the operation
        /// does not handle.
        UnsupportedCoordsType(code: u32) {
            display("Only FBR files with BVI coordinates are supported (coordinate type {})", code)
        }
        /// A group name cannot be written as a null-terminated Latin-1 string.
        InvalidGroupName(name: String) {
            display("Group name {:?} is not a Latin-1 string without NUL characters", name)
        }
        /// The fiber counts declared by the groups do not add up to the
        /// number of fibers given.
        FiberCountMismatch(declared: usize, actual: usize) {
            display("Groups declare {} fibers, but {} fibers were given", declared, actual)
        }
        /// A count is too large for its 32-bit field in the FBR format.
        CountOverflow(field: &'static str, count: usize) {
            display("FBR field `{}` cannot hold a count of {}", field, count)
        }
        /// A fiber has a different number of points and colors.
        ColorCountMismatch(points: usize, colors: usize) {
            display("Fiber has {} points but {} colors", points, colors)
        }
        /// Read an invalid TrackVis file.
        InvalidTrk(reason: &'static str) {
            display("Invalid TRK file: {}", reason)
        }
        /// Read an invalid MRtrix tracks file.
        InvalidTck(reason: String) {
            display("Invalid TCK file: {}", reason)
        }
        /// Read an invalid BrainVoyager VMR file.
        InvalidVmr(reason: &'static str) {
            display("Invalid VMR file: {}", reason)
        }
        /// An affine transformation could not be inverted.
        SingularAffine {
            display("Affine matrix is singular")
        }
        /// The volume has no non-zero voxel to derive an intensity range from.
        EmptyVolume {
            display("Volume has no non-zero voxels")
        }
        /// The volume does not have the number of dimensions required.
        UnsupportedDimensionality(ndim: usize) {
            display("Unsupported volume dimensionality {} (expected at least 3)", ndim)
        }
        /// There is no conversion routine for this pair of extensions.
        UnsupportedConversion(input: String, output: String) {
            display("Conversion ({}, {}) not supported", input, output)
        }
        /// The conversion requires an anatomical reference, but none was given.
        MissingReference(input: String, output: String) {
            display("Converting a {} file to {} needs an anatomical reference file", input, output)
        }
        /// A conversion routine failed.
        ConversionFailed(input: String, output: String, err: Box<ConvertError>) {
            source(&**err)
            display("Conversion {} to {} failed: {}", input, output, err)
        }
        /// Error from the NIfTI reader or writer.
        Nifti(err: NiftiError) {
            from()
            source(err)
            display("{}", err)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("{}", err)
        }
    }
}

/// Alias type for results originating from this crate.
pub type Result<T> = ::std::result::Result<T, ConvertError>;
