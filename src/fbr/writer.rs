use super::{FbrFile, FbrHeader, Fiber, GroupDescriptor, MAGIC};
use crate::error::{ConvertError, Result};
use crate::util::{encode_latin1, is_gz_file};
use byteordered::{ByteOrdered, Endian};
use flate2::write::GzEncoder;
use flate2::Compression;
use rgb::RGB8;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Group fields in their on-disk form, with the name already encoded.
struct GroupRecord<'a> {
    name: Vec<u8>,
    visible: u32,
    animate: i32,
    thickness: f32,
    color: RGB8,
    fibers: &'a [Fiber],
}

fn encode_name(name: &str) -> Result<Vec<u8>> {
    match encode_latin1(name) {
        Some(bytes) if !bytes.contains(&0) => Ok(bytes),
        _ => Err(ConvertError::InvalidGroupName(name.to_owned())),
    }
}

impl FbrFile {
    /// Write the file. If the name ends with ".gz", the output is
    /// GZip-compressed.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let records = self.records()?;
        write_records_to_path(path.as_ref(), &self.header, &records)
    }

    /// Serialize the file into the given writer.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let records = self.records()?;
        write_records(writer, &self.header, &records)
    }

    fn records(&self) -> Result<Vec<GroupRecord<'_>>> {
        self.groups
            .iter()
            .map(|g| {
                Ok(GroupRecord {
                    name: encode_name(&g.name)?,
                    visible: g.visible,
                    animate: g.animate,
                    thickness: g.thickness,
                    color: g.color,
                    fibers: &g.fibers,
                })
            })
            .collect()
    }
}

/// Write an FBR file from group metadata and a flat list of fibers.
///
/// The fibers are handed out to the groups in order, each group taking as
/// many as its descriptor declares. The declared counts must add up to the
/// number of fibers, and every group name must be representable in Latin-1
/// without NUL characters. Both conditions are checked before the file is
/// created.
pub fn write_fbr<P: AsRef<Path>>(
    path: P,
    header: &FbrHeader,
    groups: &[GroupDescriptor],
    fibers: &[Fiber],
) -> Result<()> {
    let declared: usize = groups.iter().map(|g| g.num_fibers).sum();
    if declared != fibers.len() {
        return Err(ConvertError::FiberCountMismatch(declared, fibers.len()));
    }

    let mut records = Vec::with_capacity(groups.len());
    let mut start = 0;
    for g in groups {
        let end = start + g.num_fibers;
        records.push(GroupRecord {
            name: encode_name(&g.name)?,
            visible: g.visible,
            animate: g.animate,
            thickness: g.thickness,
            color: g.color,
            fibers: &fibers[start..end],
        });
        start = end;
    }
    write_records_to_path(path.as_ref(), header, &records)
}

fn write_records_to_path(path: &Path, header: &FbrHeader, records: &[GroupRecord]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    if is_gz_file(path) {
        write_compressed(writer, header, records)
    } else {
        let mut writer = writer;
        write_records(&mut writer, header, records)?;
        writer.flush()?;
        Ok(())
    }
}

/// GZip the records into `writer`. The inner writer is flushed once the
/// trailer is written, so buffered bytes that fail to land are reported.
fn write_compressed<W: Write>(writer: W, header: &FbrHeader, records: &[GroupRecord]) -> Result<()> {
    let mut e = GzEncoder::new(writer, Compression::default());
    write_records(&mut e, header, records)?;
    e.finish()?.flush()?;
    Ok(())
}

fn encode_count(field: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| ConvertError::CountOverflow(field, count))
}

fn write_records<W: Write>(writer: W, header: &FbrHeader, records: &[GroupRecord]) -> Result<()> {
    let mut out = ByteOrdered::le(writer);
    out.write_all(&MAGIC)?;
    out.write_u32(header.file_version)?;
    out.write_u32(header.coords_type)?;
    for v in &header.fibers_origin {
        out.write_f32(*v)?;
    }
    out.write_u32(encode_count("NrOfGroups", records.len())?)?;
    for record in records {
        write_group(&mut out, record)?;
    }
    Ok(())
}

fn write_group<W, E>(out: &mut ByteOrdered<W, E>, group: &GroupRecord) -> Result<()>
where
    W: Write,
    E: Endian,
{
    out.write_all(&group.name)?;
    out.write_u8(0)?;
    out.write_u32(group.visible)?;
    out.write_i32(group.animate)?;
    out.write_f32(group.thickness)?;
    out.write_all(&[group.color.r, group.color.g, group.color.b])?;
    out.write_u32(encode_count("NrOfFibers", group.fibers.len())?)?;

    for fiber in group.fibers {
        let points = fiber.points();
        out.write_u32(encode_count("NrOfPoints", points.len())?)?;
        for axis in 0..3 {
            for p in points {
                out.write_f32(p[axis])?;
            }
        }
        let colors = fiber.colors();
        let rs: Vec<u8> = colors.iter().map(|c| c.r).collect();
        let gs: Vec<u8> = colors.iter().map(|c| c.g).collect();
        let bs: Vec<u8> = colors.iter().map(|c| c.b).collect();
        out.write_all(&rs)?;
        out.write_all(&gs)?;
        out.write_all(&bs)?;
    }
    Ok(())
}
