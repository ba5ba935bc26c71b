//! Reading and writing of BrainVoyager fiber (FBR) files.
//!
//! An FBR file holds one or more named groups of fibers. Each fiber is a
//! polyline with one RGB color per point. All values are little endian.
//!
//! # Example
//!
//! ```no_run
//! use visubrain::fbr::FbrFile;
//! # fn run() -> visubrain::Result<()> {
//! let fbr = FbrFile::from_file("tracts.fbr")?;
//! for points in fbr.fiber_coordinates() {
//!     println!("{} points", points.len());
//! }
//! # Ok(())
//! # }
//! ```

mod reader;
mod writer;

pub use self::writer::write_fbr;

use crate::error::{ConvertError, Result};
use crate::streamline::Point;
use crate::util::open_file;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use rgb::RGB8;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Magic code opening every FBR file.
pub const MAGIC: [u8; 4] = [0xA4, 0xD3, 0xC2, 0xB1];

/// Coordinate convention of the fiber points.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
#[repr(u32)]
pub enum CoordsType {
    /// Right, Anterior, Superior, in millimeters.
    RasMm = 0,
    /// BrainVoyager internal convention: Posterior, Inferior, Left, in
    /// millimeters.
    Bvi = 2,
}

/// The file-level fields of an FBR file.
#[derive(Debug, PartialEq, Clone)]
pub struct FbrHeader {
    /// Format version, 5 for files written by this crate.
    pub file_version: u32,
    /// Raw coordinate type code, see [`CoordsType`].
    pub coords_type: u32,
    /// Origin of the fiber coordinates.
    pub fibers_origin: [f32; 3],
}

impl Default for FbrHeader {
    fn default() -> Self {
        FbrHeader {
            file_version: 5,
            coords_type: CoordsType::Bvi as u32,
            fibers_origin: [0.; 3],
        }
    }
}

impl FbrHeader {
    /// Retrieve the coordinate convention.
    pub fn coords_type(&self) -> Result<CoordsType> {
        CoordsType::from_u32(self.coords_type)
            .ok_or(ConvertError::InvalidCode("coords type", self.coords_type))
    }
}

/// A single fiber: a sequence of points with one color per point.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Fiber {
    points: Vec<Point>,
    colors: Vec<RGB8>,
}

impl Fiber {
    /// Create a fiber. Fails if `points` and `colors` differ in length.
    pub fn new(points: Vec<Point>, colors: Vec<RGB8>) -> Result<Self> {
        if points.len() != colors.len() {
            return Err(ConvertError::ColorCountMismatch(points.len(), colors.len()));
        }
        Ok(Fiber { points, colors })
    }

    /// The fiber's points, in order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// One color per point.
    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }

    /// Number of points in the fiber.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the fiber has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Take the points and colors out of the fiber.
    pub fn into_parts(self) -> (Vec<Point>, Vec<RGB8>) {
        (self.points, self.colors)
    }
}

/// A named group of fibers sharing display attributes.
#[derive(Debug, PartialEq, Clone)]
pub struct FiberGroup {
    /// Group name, stored as null-terminated Latin-1.
    pub name: String,
    /// Non-zero if the group is shown.
    pub visible: u32,
    /// Animation setting; `-1` disables animation.
    pub animate: i32,
    /// Display thickness of the fibers.
    pub thickness: f32,
    /// Display color of the group.
    pub color: RGB8,
    /// The fibers of the group.
    pub fibers: Vec<Fiber>,
}

impl FiberGroup {
    /// The group's metadata, with its current fiber count.
    pub fn descriptor(&self) -> GroupDescriptor {
        GroupDescriptor {
            name: self.name.clone(),
            visible: self.visible,
            animate: self.animate,
            thickness: self.thickness,
            color: self.color,
            num_fibers: self.fibers.len(),
        }
    }
}

/// Group metadata used by [`write_fbr`], which takes the fibers of all
/// groups as one flat list. `num_fibers` tells how many of them belong to
/// the group.
#[derive(Debug, PartialEq, Clone)]
pub struct GroupDescriptor {
    /// Group name, stored as null-terminated Latin-1.
    pub name: String,
    /// Non-zero if the group is shown.
    pub visible: u32,
    /// Animation setting; `-1` disables animation.
    pub animate: i32,
    /// Display thickness of the fibers.
    pub thickness: f32,
    /// Display color of the group.
    pub color: RGB8,
    /// How many of the fibers belong to this group.
    pub num_fibers: usize,
}

/// A fully parsed FBR file.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct FbrFile {
    /// File-level fields.
    pub header: FbrHeader,
    /// Fiber groups, in file order.
    pub groups: Vec<FiberGroup>,
}

impl FbrFile {
    /// Read an FBR file. Names ending with ".gz" are decompressed on the fly.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = open_file(path)?;
        Self::from_reader(source)
    }

    /// Read an FBR file from a byte source.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        reader::parse_fbr(source)
    }

    /// The points of every fiber, in group order then fiber order.
    pub fn fiber_coordinates(&self) -> Vec<&[Point]> {
        self.fibers().map(Fiber::points).collect()
    }

    /// Iterate over the fibers of all groups.
    pub fn fibers(&self) -> impl Iterator<Item = &Fiber> {
        self.groups.iter().flat_map(|g| g.fibers.iter())
    }

    /// Total number of fibers over all groups.
    pub fn num_fibers(&self) -> usize {
        self.groups.iter().map(|g| g.fibers.len()).sum()
    }

    /// Describe the file's header fields, for display purposes.
    pub fn summary<P: AsRef<Path>>(&self, path: P) -> FbrSummary {
        FbrSummary {
            file: path.as_ref().to_path_buf(),
            animate: self.groups.iter().map(|g| g.animate).collect(),
            color: self.groups.iter().map(|g| g.color).collect(),
            coords_type: self.header.coords_type,
            fibers_origin: self.header.fibers_origin,
            file_version: self.header.file_version,
            name: self.groups.iter().map(|g| g.name.clone()).collect(),
            num_fibers: self.groups.iter().map(|g| g.fibers.len()).collect(),
            num_groups: self.groups.len(),
            thickness: self.groups.iter().map(|g| g.thickness).collect(),
            visible: self.groups.iter().map(|g| g.visible).collect(),
        }
    }
}

/// Header fields of an FBR file, with the per-group fields collected
/// across groups.
#[derive(Debug, PartialEq, Clone)]
pub struct FbrSummary {
    /// Path the file was read from.
    pub file: PathBuf,
    /// Animation setting of each group.
    pub animate: Vec<i32>,
    /// Color of each group.
    pub color: Vec<RGB8>,
    /// Raw coordinate type code.
    pub coords_type: u32,
    /// Origin of the fiber coordinates.
    pub fibers_origin: [f32; 3],
    /// Format version.
    pub file_version: u32,
    /// Name of each group.
    pub name: Vec<String>,
    /// Fiber count of each group.
    pub num_fibers: Vec<usize>,
    /// Number of groups.
    pub num_groups: usize,
    /// Thickness of each group.
    pub thickness: Vec<f32>,
    /// Visibility flag of each group.
    pub visible: Vec<u32>,
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for FbrSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let colors: Vec<_> = self
            .color
            .iter()
            .map(|c| format!("({}, {}, {})", c.r, c.g, c.b))
            .collect();
        let [ox, oy, oz] = self.fibers_origin;
        writeln!(f, "FBRFile: {}", self.file.display())?;
        writeln!(f, "Animate: {}", join(&self.animate))?;
        writeln!(f, "Color: {}", join(&colors))?;
        writeln!(f, "CoordsType: {}", self.coords_type)?;
        writeln!(f, "FibersOrigin: ({}, {}, {})", ox, oy, oz)?;
        writeln!(f, "FileVersion: {}", self.file_version)?;
        writeln!(f, "Name: {}", self.name.join(","))?;
        writeln!(f, "NrOfFibers: {}", join(&self.num_fibers))?;
        writeln!(f, "NrOfGroups: {}", self.num_groups)?;
        writeln!(f, "Thickness: {}", join(&self.thickness))?;
        write!(f, "Visible: {}", join(&self.visible))
    }
}
