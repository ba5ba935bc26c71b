use super::{FbrFile, FbrHeader, Fiber, FiberGroup, MAGIC};
use crate::error::{ConvertError, Result};
use crate::streamline::Point;
use crate::util::{decode_latin1, PREALLOC_LIMIT};
use byteordered::{ByteOrdered, Endian};
use rgb::RGB8;
use std::io::{self, Read};
use tracing::debug;

/// Attach the name of the field being read to a read failure.
fn field<T>(name: &'static str, value: io::Result<T>) -> Result<T> {
    value.map_err(|e| ConvertError::Truncated(name, e))
}

pub(crate) fn parse_fbr<R: Read>(mut source: R) -> Result<FbrFile> {
    let mut magic = Vec::with_capacity(4);
    let _ = source.by_ref().take(4).read_to_end(&mut magic)?;
    if magic[..] != MAGIC {
        let mut found = [0u8; 4];
        found[..magic.len()].copy_from_slice(&magic);
        return Err(ConvertError::InvalidMagic(found));
    }

    let mut input = ByteOrdered::le(source);
    let file_version = field("FileVersion", input.read_u32())?;
    let coords_type = field("CoordsType", input.read_u32())?;
    let mut fibers_origin = [0.; 3];
    for v in &mut fibers_origin {
        *v = field("FibersOrigin", input.read_f32())?;
    }
    let num_groups = field("NrOfGroups", input.read_u32())? as usize;

    let mut groups = Vec::with_capacity(num_groups.min(PREALLOC_LIMIT));
    for _ in 0..num_groups {
        groups.push(parse_group(&mut input)?);
    }

    let fbr = FbrFile {
        header: FbrHeader {
            file_version,
            coords_type,
            fibers_origin,
        },
        groups,
    };
    debug!(
        version = file_version,
        coords_type,
        groups = fbr.groups.len(),
        fibers = fbr.num_fibers(),
        "parsed FBR file"
    );
    Ok(fbr)
}

fn parse_group<R, E>(input: &mut ByteOrdered<R, E>) -> Result<FiberGroup>
where
    R: Read,
    E: Endian,
{
    let mut name = Vec::new();
    loop {
        match field("Name", input.read_u8())? {
            0 => break,
            c => name.push(c),
        }
    }
    let name = decode_latin1(&name);
    let visible = field("Visible", input.read_u32())?;
    let animate = field("Animate", input.read_i32())?;
    let thickness = field("Thickness", input.read_f32())?;
    let mut color = [0u8; 3];
    field("Color", input.read_exact(&mut color))?;
    let num_fibers = field("NrOfFibers", input.read_u32())? as usize;

    let mut fibers = Vec::with_capacity(num_fibers.min(PREALLOC_LIMIT));
    for _ in 0..num_fibers {
        fibers.push(parse_fiber(input)?);
    }

    Ok(FiberGroup {
        name,
        visible,
        animate,
        thickness,
        color: RGB8::new(color[0], color[1], color[2]),
        fibers,
    })
}

fn parse_fiber<R, E>(input: &mut ByteOrdered<R, E>) -> Result<Fiber>
where
    R: Read,
    E: Endian,
{
    let n = field("NrOfPoints", input.read_u32())? as usize;
    let xs = read_f32s(input, n, "X")?;
    let ys = read_f32s(input, n, "Y")?;
    let zs = read_f32s(input, n, "Z")?;
    let rs = read_u8s(input, n, "R")?;
    let gs = read_u8s(input, n, "G")?;
    let bs = read_u8s(input, n, "B")?;

    let points = xs
        .into_iter()
        .zip(ys)
        .zip(zs)
        .map(|((x, y), z)| Point::new(x, y, z))
        .collect();
    let colors = rs
        .into_iter()
        .zip(gs)
        .zip(bs)
        .map(|((r, g), b)| RGB8::new(r, g, b))
        .collect();
    Fiber::new(points, colors)
}

fn read_f32s<R, E>(input: &mut ByteOrdered<R, E>, n: usize, name: &'static str) -> Result<Vec<f32>>
where
    R: Read,
    E: Endian,
{
    let mut values = Vec::with_capacity(n.min(PREALLOC_LIMIT));
    for _ in 0..n {
        values.push(field(name, input.read_f32())?);
    }
    Ok(values)
}

fn read_u8s<R, E>(input: &mut ByteOrdered<R, E>, n: usize, name: &'static str) -> Result<Vec<u8>>
where
    R: Read,
    E: Endian,
{
    let mut values = Vec::with_capacity(n.min(PREALLOC_LIMIT));
    let _ = input.by_ref().take(n as u64).read_to_end(&mut values)?;
    if values.len() < n {
        return Err(ConvertError::Truncated(
            name,
            io::Error::new(io::ErrorKind::UnexpectedEof, "failed to fill whole buffer"),
        ));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_not_fbr() {
        let err = parse_fbr(&[][..]).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidMagic([0, 0, 0, 0])));
    }

    #[test]
    fn missing_header_field_is_named() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&[2, 0]);
        match parse_fbr(&bytes[..]).unwrap_err() {
            ConvertError::Truncated(field, _) => assert_eq!(field, "CoordsType"),
            e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn empty_file_body() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        for v in &[1.0f32, 2.0, 3.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let fbr = parse_fbr(&bytes[..]).unwrap();
        assert_eq!(fbr.header.fibers_origin, [1.0, 2.0, 3.0]);
        assert!(fbr.groups.is_empty());
    }
}
