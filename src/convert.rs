//! Conversion between neuroimaging file formats.
//!
//! A [`ConversionRequest`] is built from an input path, an output path and,
//! for some conversions, an anatomical reference volume. The conversion to
//! perform is chosen from the compound extensions of both paths, so that
//! `brain.nii.gz` and `brain.nii` are different formats.
//!
//! # Example
//!
//! ```no_run
//! use visubrain::convert::ConversionRequest;
//! use std::path::Path;
//! # fn run() -> visubrain::Result<()> {
//! let request = ConversionRequest::new("tracts.fbr", "tracts.trk", Some(Path::new("t1.nii.gz")))?;
//! request.convert()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ConvertError, Result};
use crate::fbr::{self, CoordsType, FbrFile, FbrHeader, Fiber, GroupDescriptor};
use crate::filter;
use crate::reference::AnatomicalReference;
use crate::space;
use crate::streamline::Tractogram;
use crate::tck::TckFile;
use crate::trk::TrkFile;
use crate::util::compound_extension;
use crate::vmr::pose;
use crate::vmr::{VmrHeader, VmrVolume};
use crate::volume::{self, Volume};
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use nalgebra::Vector3;
use rgb::RGB8;
use std::convert::TryFrom;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The supported (input, output) extension pairs.
pub const SUPPORTED: [(&str, &str); 12] = [
    ("trk", "fbr"),
    ("fbr", "trk"),
    ("trk", "tck"),
    ("tck", "trk"),
    ("voi", "nii"),
    ("voi", "nii.gz"),
    ("nii", "voi"),
    ("nii.gz", "voi"),
    ("vmr", "nii"),
    ("vmr", "nii.gz"),
    ("nii", "vmr"),
    ("nii.gz", "vmr"),
];

/// The conversion routine to run. Conversions which need an anatomical
/// reference carry its path.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ConversionKind {
    /// TrackVis streamlines to a single-group FBR file.
    TrkToFbr,
    /// FBR fibers to TrackVis streamlines placed in a reference volume.
    FbrToTrk {
        /// NIfTI file giving the anatomical space.
        reference: PathBuf,
    },
    /// TrackVis streamlines to an MRtrix tracks file.
    TrkToTck,
    /// MRtrix streamlines to TrackVis, placed in a reference volume.
    TckToTrk {
        /// NIfTI file giving the anatomical space.
        reference: PathBuf,
    },
    /// Decompress a VOI file into plain NIfTI.
    VoiToNii,
    /// Copy a VOI file as compressed NIfTI.
    VoiToNiiGz,
    /// Compress a NIfTI file into a VOI file.
    NiiToVoi,
    /// Copy compressed NIfTI as a VOI file.
    NiiGzToVoi,
    /// VMR volume to NIfTI, plain or compressed.
    VmrToNii,
    /// NIfTI volume, plain or compressed, to VMR.
    NiiToVmr,
}

impl ConversionKind {
    /// Select the conversion for a pair of extensions.
    pub fn resolve(input_ext: &str, output_ext: &str, reference: Option<&Path>) -> Result<Self> {
        let missing = || ConvertError::MissingReference(input_ext.to_owned(), output_ext.to_owned());
        let kind = match (input_ext, output_ext) {
            ("trk", "fbr") => ConversionKind::TrkToFbr,
            ("fbr", "trk") => ConversionKind::FbrToTrk {
                reference: reference.ok_or_else(missing)?.to_path_buf(),
            },
            ("trk", "tck") => ConversionKind::TrkToTck,
            ("tck", "trk") => ConversionKind::TckToTrk {
                reference: reference.ok_or_else(missing)?.to_path_buf(),
            },
            ("voi", "nii") => ConversionKind::VoiToNii,
            ("voi", "nii.gz") => ConversionKind::VoiToNiiGz,
            ("nii", "voi") => ConversionKind::NiiToVoi,
            ("nii.gz", "voi") => ConversionKind::NiiGzToVoi,
            ("vmr", "nii") | ("vmr", "nii.gz") => ConversionKind::VmrToNii,
            ("nii", "vmr") | ("nii.gz", "vmr") => ConversionKind::NiiToVmr,
            _ => {
                return Err(ConvertError::UnsupportedConversion(
                    input_ext.to_owned(),
                    output_ext.to_owned(),
                ))
            }
        };
        Ok(kind)
    }

    /// Name of the conversion routine.
    pub fn name(&self) -> &'static str {
        match self {
            ConversionKind::TrkToFbr => "trk_to_fbr",
            ConversionKind::FbrToTrk { .. } => "fbr_to_trk",
            ConversionKind::TrkToTck => "trk_to_tck",
            ConversionKind::TckToTrk { .. } => "tck_to_trk",
            ConversionKind::VoiToNii => "voi_to_nii",
            ConversionKind::VoiToNiiGz => "voi_to_nii_gz",
            ConversionKind::NiiToVoi => "nii_to_voi",
            ConversionKind::NiiGzToVoi => "nii_gz_to_voi",
            ConversionKind::VmrToNii => "vmr_to_nii",
            ConversionKind::NiiToVmr => "nii_to_vmr",
        }
    }
}

/// Attributes of the fiber group written when converting to FBR.
#[derive(Debug, PartialEq, Clone)]
pub struct FbrExportOptions {
    file_version: u32,
    group_name: String,
    visible: u32,
    animate: i32,
    thickness: f32,
    color: RGB8,
}

impl Default for FbrExportOptions {
    fn default() -> Self {
        FbrExportOptions {
            file_version: 5,
            group_name: "trk_conversion_PIL+mm".to_owned(),
            visible: 1,
            animate: -1,
            thickness: 0.3,
            color: RGB8::new(0, 255, 255),
        }
    }
}

impl FbrExportOptions {
    /// Options with the default group attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// FBR format version written in the header.
    pub fn file_version(mut self, file_version: u32) -> Self {
        self.file_version = file_version;
        self
    }

    /// Name of the single fiber group. It must be Latin-1 without NUL
    /// characters.
    pub fn group_name<S: Into<String>>(mut self, name: S) -> Self {
        self.group_name = name.into();
        self
    }

    /// Whether BrainVoyager shows the group.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = u32::from(visible);
        self
    }

    /// Animation setting of the group, `-1` to disable.
    pub fn animate(mut self, animate: i32) -> Self {
        self.animate = animate;
        self
    }

    /// Display thickness of the fibers.
    pub fn thickness(mut self, thickness: f32) -> Self {
        self.thickness = thickness;
        self
    }

    /// Display color of the group.
    pub fn color(mut self, color: RGB8) -> Self {
        self.color = color;
        self
    }
}

/// A validated conversion between two files.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    input: PathBuf,
    output: PathBuf,
    input_ext: String,
    output_ext: String,
    kind: ConversionKind,
    fbr_options: FbrExportOptions,
}

impl ConversionRequest {
    /// Validate a conversion request. No file is accessed: the extensions
    /// must form a supported pair, and conversions producing TRK from FBR
    /// or TCK need a reference.
    pub fn new<P, Q>(input: P, output: Q, reference: Option<&Path>) -> Result<Self>
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        let input = input.into();
        let output = output.into();
        let input_ext = compound_extension(&input).unwrap_or_default();
        let output_ext = compound_extension(&output).unwrap_or_default();
        let kind = ConversionKind::resolve(&input_ext, &output_ext, reference)?;
        Ok(ConversionRequest {
            input,
            output,
            input_ext,
            output_ext,
            kind,
            fbr_options: FbrExportOptions::default(),
        })
    }

    /// Set the group attributes used when writing FBR files.
    pub fn fbr_options(mut self, options: FbrExportOptions) -> Self {
        self.fbr_options = options;
        self
    }

    /// File to read.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// File to create.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Lowercased extension of the input, such as `"nii.gz"`.
    pub fn input_ext(&self) -> &str {
        &self.input_ext
    }

    /// Lowercased extension of the output.
    pub fn output_ext(&self) -> &str {
        &self.output_ext
    }

    /// The routine selected for the extension pair.
    pub fn kind(&self) -> &ConversionKind {
        &self.kind
    }

    /// Run the conversion. Errors are reported as
    /// [`ConvertError::ConversionFailed`], with the cause as source.
    pub fn convert(&self) -> Result<()> {
        let (input, output) = (self.input.as_path(), self.output.as_path());
        debug!(routine = self.kind.name(), input = %input.display(), "starting conversion");
        let result = match &self.kind {
            ConversionKind::TrkToFbr => trk_to_fbr(input, output, &self.fbr_options),
            ConversionKind::FbrToTrk { reference } => fbr_to_trk(input, output, reference),
            ConversionKind::TrkToTck => trk_to_tck(input, output),
            ConversionKind::TckToTrk { reference } => tck_to_trk(input, output, reference),
            ConversionKind::VoiToNii => voi_to_nii(input, output),
            ConversionKind::VoiToNiiGz => voi_to_nii_gz(input, output),
            ConversionKind::NiiToVoi => nii_to_voi(input, output),
            ConversionKind::NiiGzToVoi => nii_gz_to_voi(input, output),
            ConversionKind::VmrToNii => vmr_to_nii(input, output),
            ConversionKind::NiiToVmr => nii_to_vmr(input, output),
        };
        match result {
            Ok(()) => {
                info!(
                    input = %input.display(),
                    output = %output.display(),
                    "converted {} to {}",
                    self.input_ext,
                    self.output_ext
                );
                Ok(())
            }
            Err(e) => Err(ConvertError::ConversionFailed(
                self.input_ext.clone(),
                self.output_ext.clone(),
                Box::new(e),
            )),
        }
    }
}

/// Convert TrackVis streamlines to an FBR file with a single group.
///
/// Points are taken in voxmm space, colored by their local direction and
/// mapped to PIL+ millimeters around the centre of the volume.
pub fn trk_to_fbr<P, Q>(input: P, output: Q, options: &FbrExportOptions) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let trk = TrkFile::from_file(input)?;
    let reference = trk.header.reference()?;
    let origin = space::pil_origin(&reference.dims_mm());

    let fibers = trk
        .streamlines
        .iter()
        .map(|s| {
            let colors = space::tangent_colors(s);
            Fiber::new(space::streamline_ras_to_pil(s, &origin), colors)
        })
        .collect::<Result<Vec<_>>>()?;

    let header = FbrHeader {
        file_version: options.file_version,
        coords_type: CoordsType::Bvi as u32,
        fibers_origin: [origin.x, origin.y, origin.z],
    };
    let group = GroupDescriptor {
        name: options.group_name.clone(),
        visible: options.visible,
        animate: options.animate,
        thickness: options.thickness,
        color: options.color,
        num_fibers: fibers.len(),
    };
    fbr::write_fbr(output, &header, &[group], &fibers)
}

/// Convert an FBR file in BVI coordinates to TrackVis, tied to the given
/// reference volume. Fibers which are too short or leave the volume are
/// discarded.
pub fn fbr_to_trk<P, Q, R>(input: P, output: Q, reference: R) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let reference = AnatomicalReference::from_nifti_file(reference)?;
    let fbr = FbrFile::from_file(input)?;
    if fbr.header.coords_type != CoordsType::Bvi as u32 {
        return Err(ConvertError::UnsupportedCoordsType(fbr.header.coords_type));
    }

    let streamlines = filter::drop_short(fbr.fibers().map(|f| f.points().to_vec()).collect());
    let origin = Vector3::zeros();
    let streamlines = streamlines
        .iter()
        .map(|s| space::streamline_pil_to_ras(s, &origin))
        .collect();
    let streamlines = filter::validate_streamlines(streamlines, &reference)?;

    let tractogram = Tractogram::new(streamlines, reference);
    TrkFile::from_tractogram(&tractogram)?.write_file(output)
}

/// Convert TrackVis streamlines to an MRtrix tracks file in RAS+mm.
pub fn trk_to_tck<P, Q>(input: P, output: Q) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let tractogram = TrkFile::from_file(input)?.into_tractogram()?;
    TckFile::from_tractogram(&tractogram).write_file(output)
}

/// Convert an MRtrix tracks file to TrackVis, tied to the given reference
/// volume.
pub fn tck_to_trk<P, Q, R>(input: P, output: Q, reference: R) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let reference = AnatomicalReference::from_nifti_file(reference)?;
    let tractogram = TckFile::from_file(input)?.into_tractogram(reference);
    TrkFile::from_tractogram(&tractogram)?.write_file(output)
}

/// Decompress a VOI file (a GZip-compressed NIfTI volume) into a ".nii"
/// file.
pub fn voi_to_nii<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let mut source = GzDecoder::new(BufReader::new(File::open(input)?));
    let mut sink = BufWriter::new(File::create(output)?);
    let _ = io::copy(&mut source, &mut sink)?;
    sink.flush()?;
    Ok(())
}

/// A VOI file is already a compressed NIfTI volume: copy it.
pub fn voi_to_nii_gz<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let _ = fs::copy(input, output)?;
    Ok(())
}

/// Compress a ".nii" file into a VOI file.
pub fn nii_to_voi<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let mut source = BufReader::new(File::open(input)?);
    let mut sink = GzEncoder::new(BufWriter::new(File::create(output)?), Compression::default());
    let _ = io::copy(&mut source, &mut sink)?;
    sink.finish()?.flush()?;
    Ok(())
}

/// A compressed NIfTI file is already a VOI file: copy it.
pub fn nii_gz_to_voi<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let _ = fs::copy(input, output)?;
    Ok(())
}

/// Convert a VMR volume to NIfTI, placing it in RAS+ space from the
/// position information of its header.
pub fn vmr_to_nii<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let vmr = VmrVolume::from_file(input)?;
    let affine = pose::affine_from_vmr(&vmr.header);
    let data = pose::vmr_to_nifti_data(&vmr.data);
    volume::write_nifti(output, &data, &affine)
}

/// Convert a NIfTI volume to VMR. The volume is reoriented to RAS+ and its
/// intensities are rescaled to the 8-bit VMR range.
pub fn nii_to_vmr<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let volume = Volume::from_nifti_file(input)?.as_closest_canonical();
    let [nx, ny, nz] = volume.shape();
    let [vx, vy, vz] = volume.voxel_sizes();
    let pose = pose::pose_from_nifti(volume.affine(), volume.shape(), volume.voxel_sizes())?;
    let (v16_min, v16_mean, v16_max) = pose::v16_statistics(volume.data())?;
    let data = pose::nifti_to_vmr_data(&pose::rescale_intensity(volume.data())?);

    let dim = |n: usize| {
        u16::try_from(n).map_err(|_| ConvertError::InvalidVmr("volume dimensions exceed the VMR limit"))
    };
    let mut header = VmrHeader {
        dim_x: dim(ny)?,
        dim_y: dim(nz)?,
        dim_z: dim(nx)?,
        framing_cube_dim: i16::try_from(nx.max(ny).max(nz)).unwrap_or(i16::MAX),
        pos_infos_verified: 1,
        voxel_size: [vx as f32, vy as f32, vz as f32],
        voxel_resolution_verified: 1,
        voxel_resolution_in_tal_mm: 1,
        v16_min,
        v16_mean,
        v16_max,
        ..VmrHeader::default()
    };
    pose.apply_to(&mut header);
    VmrVolume { header, data }.write_file(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_pair_resolves() {
        let reference = Path::new("t1.nii");
        for (input, output) in SUPPORTED.iter() {
            let kind = ConversionKind::resolve(input, output, Some(reference)).unwrap();
            assert!(kind.name().starts_with(input.split('.').next().unwrap()));
        }
    }

    #[test]
    fn reference_is_carried() {
        let kind = ConversionKind::resolve("tck", "trk", Some(Path::new("t1.nii.gz"))).unwrap();
        assert_eq!(
            kind,
            ConversionKind::TckToTrk {
                reference: PathBuf::from("t1.nii.gz")
            }
        );
    }

    #[test]
    fn options_builder() {
        let options = FbrExportOptions::new()
            .group_name("CST")
            .visible(false)
            .color(RGB8::new(255, 0, 0));
        assert_eq!(options.group_name, "CST");
        assert_eq!(options.visible, 0);
        assert_eq!(options.thickness, 0.3);
        assert_eq!(options.file_version, 5);
    }
}
