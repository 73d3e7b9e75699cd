//! MeshScan capture recording format (.mscap)
//!
//! A capture stores the sensor events of one scan so the whole pipeline can
//! be replayed without sensor hardware. Raw buffers are stored verbatim, in
//! the recording machine's byte order; every header field is little-endian.
//!
//! # Layout
//! ```text
//! File header (12 bytes)
//! 0x00: magic "MSCP"
//! 0x04: version u16
//! 0x06: reserved u16
//! 0x08: record_count u32
//!
//! Record header (13 bytes), repeated record_count times
//! 0x00: kind u8 (0 = added, 1 = updated, 2 = removed)
//! 0x01: anchor_count u32
//! 0x05: at_micros u64 (since capture start)
//!
//! Per anchor
//! 0x00: id [u8; 16]
//! removed records stop here, others continue with the mesh header (78 bytes):
//! 0x10: transform [f32; 16] (column-major)
//! 0x50: vertex_stride u32
//! 0x54: vertex_count u32
//! 0x58: index_width u8
//! 0x59: indices_per_primitive u8
//! 0x5A: primitive_count u32
//! 0x5E: vertex data (max(vertex_stride × vertex_count, (vertex_count - 1) × vertex_stride + 12) bytes)
//!       index data (index_width × indices_per_primitive × primitive_count bytes)
//! ```

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use glam::Mat4;
use meshscan_shared::fs::{MAX_CAPTURE_BYTES, read_file_with_limit};
use meshscan_shared::{AnchorId, SCAN_FORMAT};

use crate::anchor::AnchorUpdate;
use crate::decode::{RawIndexBuffer, RawVertexBuffer, VERTEX_SIZE};

/// Capture file header (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHeader {
    pub version: u16,
    pub record_count: u32,
}

impl CaptureHeader {
    pub const SIZE: usize = 12;

    pub fn new(record_count: u32) -> Self {
        Self {
            version: SCAN_FORMAT.capture_version,
            record_count,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(SCAN_FORMAT.capture_magic);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.record_count.to_le_bytes());
        bytes
    }

    /// Read header from bytes. `None` when too short or the magic is wrong.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || &bytes[0..4] != SCAN_FORMAT.capture_magic {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[4], bytes[5]]),
            record_count: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
        })
    }
}

/// Kind of sensor event stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Added = 0,
    Updated = 1,
    Removed = 2,
}

impl RecordKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Added),
            1 => Some(Self::Updated),
            2 => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Record header (13 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: RecordKind,
    pub anchor_count: u32,
    pub at_micros: u64,
}

impl RecordHeader {
    pub const SIZE: usize = 13;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.kind as u8;
        bytes[1..5].copy_from_slice(&self.anchor_count.to_le_bytes());
        bytes[5..13].copy_from_slice(&self.at_micros.to_le_bytes());
        bytes
    }

    /// `None` when too short or the kind byte is unknown.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            kind: RecordKind::from_u8(bytes[0])?,
            anchor_count: u32::from_le_bytes(bytes[1..5].try_into().ok()?),
            at_micros: u64::from_le_bytes(bytes[5..13].try_into().ok()?),
        })
    }
}

/// Mesh header following the id of an added or updated anchor (78 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorMeshHeader {
    pub transform: [f32; 16],
    pub vertex_stride: u32,
    pub vertex_count: u32,
    pub index_width: u8,
    pub indices_per_primitive: u8,
    pub primitive_count: u32,
}

impl AnchorMeshHeader {
    pub const SIZE: usize = 78;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        for (chunk, value) in bytes[0..64].chunks_exact_mut(4).zip(self.transform) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes[64..68].copy_from_slice(&self.vertex_stride.to_le_bytes());
        bytes[68..72].copy_from_slice(&self.vertex_count.to_le_bytes());
        bytes[72] = self.index_width;
        bytes[73] = self.indices_per_primitive;
        bytes[74..78].copy_from_slice(&self.primitive_count.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut transform = [0f32; 16];
        for (value, chunk) in transform.iter_mut().zip(bytes[0..64].chunks_exact(4)) {
            *value = f32::from_le_bytes(chunk.try_into().ok()?);
        }
        Some(Self {
            transform,
            vertex_stride: u32::from_le_bytes(bytes[64..68].try_into().ok()?),
            vertex_count: u32::from_le_bytes(bytes[68..72].try_into().ok()?),
            index_width: bytes[72],
            indices_per_primitive: bytes[73],
            primitive_count: u32::from_le_bytes(bytes[74..78].try_into().ok()?),
        })
    }

    /// Stored vertex bytes: whole strides, or up to the end of the last
    /// position when the stride is narrower than one.
    pub fn vertex_data_len(&self) -> Option<usize> {
        let stride = self.vertex_stride as usize;
        let count = self.vertex_count as usize;
        if count == 0 {
            return Some(0);
        }
        let whole = stride.checked_mul(count)?;
        let last_end = (count - 1).checked_mul(stride)?.checked_add(VERTEX_SIZE)?;
        Some(whole.max(last_end))
    }

    pub fn index_data_len(&self) -> Option<usize> {
        (self.index_width as usize)
            .checked_mul(self.indices_per_primitive as usize)?
            .checked_mul(self.primitive_count as usize)
    }
}

/// One recorded sensor event.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Added(Vec<AnchorUpdate>),
    Updated(Vec<AnchorUpdate>),
    Removed(Vec<AnchorId>),
}

impl CaptureEvent {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Added(_) => RecordKind::Added,
            Self::Updated(_) => RecordKind::Updated,
            Self::Removed(_) => RecordKind::Removed,
        }
    }

    pub fn anchor_count(&self) -> usize {
        match self {
            Self::Added(updates) | Self::Updated(updates) => updates.len(),
            Self::Removed(ids) => ids.len(),
        }
    }
}

/// A sensor event and when it happened, relative to the start of the capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub at: Duration,
    pub event: CaptureEvent,
}

impl CaptureRecord {
    pub fn new(at: Duration, event: CaptureEvent) -> Self {
        Self { at, event }
    }
}

/// Streams records into a capture.
///
/// The record count in the file header is patched in by [`finish`](Self::finish).
pub struct CaptureWriter<W: Write + Seek> {
    out: W,
    start: u64,
    records: u32,
}

impl<W: Write + Seek> CaptureWriter<W> {
    pub fn new(mut out: W) -> Result<Self> {
        let start = out.stream_position()?;
        out.write_all(&CaptureHeader::new(0).to_bytes())?;
        Ok(Self {
            out,
            start,
            records: 0,
        })
    }

    pub fn write_record(&mut self, record: &CaptureRecord) -> Result<()> {
        let header = RecordHeader {
            kind: record.event.kind(),
            anchor_count: u32::try_from(record.event.anchor_count())
                .context("Too many anchors in one record")?,
            at_micros: u64::try_from(record.at.as_micros())
                .context("Record timestamp out of range")?,
        };
        self.out.write_all(&header.to_bytes())?;

        match &record.event {
            CaptureEvent::Added(updates) | CaptureEvent::Updated(updates) => {
                for update in updates {
                    self.write_anchor(update)
                        .with_context(|| format!("Failed to record anchor {}", update.id))?;
                }
            }
            CaptureEvent::Removed(ids) => {
                for id in ids {
                    self.out.write_all(&id.to_bytes())?;
                }
            }
        }

        self.records = self.records.checked_add(1).context("Too many records")?;
        Ok(())
    }

    fn write_anchor(&mut self, update: &AnchorUpdate) -> Result<()> {
        let vertices = &update.vertices;
        let faces = &update.faces;

        let header = AnchorMeshHeader {
            transform: update.transform.to_cols_array(),
            vertex_stride: u32::try_from(vertices.stride).context("Vertex stride too large")?,
            vertex_count: u32::try_from(vertices.count).context("Too many vertices")?,
            index_width: u8::try_from(faces.bytes_per_index).context("Index width too large")?,
            indices_per_primitive: u8::try_from(faces.indices_per_primitive)
                .context("Too many indices per primitive")?,
            primitive_count: u32::try_from(faces.primitive_count)
                .context("Too many primitives")?,
        };

        let vertex_len = header.vertex_data_len().context("Vertex data too large")?;
        let needed = vertices.required_len().context("Vertex data too large")?;
        if vertices.count > 0 && needed > vertices.bytes.len() {
            bail!(
                "Vertex buffer too short: need {} bytes, have {}",
                needed,
                vertices.bytes.len()
            );
        }
        // The last vertex may lack its padding; store whole strides, zero-filled.
        let mut vertex_data: Vec<u8> = vertices
            .bytes
            .get(vertices.offset..)
            .unwrap_or_default()
            .iter()
            .take(vertex_len)
            .copied()
            .collect();
        vertex_data.resize(vertex_len, 0);

        let index_len = header.index_data_len().context("Index data too large")?;
        let index_data = faces
            .bytes
            .get(faces.offset..)
            .and_then(|rest| rest.get(..index_len))
            .with_context(|| {
                format!(
                    "Index buffer too short: need {} bytes after offset {}, have {}",
                    index_len,
                    faces.offset,
                    faces.bytes.len()
                )
            })?;

        self.out.write_all(&update.id.to_bytes())?;
        self.out.write_all(&header.to_bytes())?;
        self.out.write_all(&vertex_data)?;
        self.out.write_all(index_data)?;
        Ok(())
    }

    pub fn record_count(&self) -> u32 {
        self.records
    }

    /// Patch the header with the final record count and return the writer.
    pub fn finish(mut self) -> Result<W> {
        let end = self.out.stream_position()?;
        self.out.seek(SeekFrom::Start(self.start))?;
        self.out
            .write_all(&CaptureHeader::new(self.records).to_bytes())?;
        self.out.seek(SeekFrom::Start(end))?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Write a complete capture file.
pub fn save_capture(path: &Path, records: &[CaptureRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create capture: {}", path.display()))?;
    let mut writer = CaptureWriter::new(BufWriter::new(file))?;
    for record in records {
        writer.write_record(record)?;
    }
    writer
        .finish()
        .with_context(|| format!("Failed to write capture: {}", path.display()))?;
    Ok(())
}

/// Read a capture file from disk.
pub fn load_capture(path: &Path) -> Result<Vec<CaptureRecord>> {
    let bytes = read_file_with_limit(path, MAX_CAPTURE_BYTES)?;
    read_capture(&bytes).with_context(|| format!("Failed to parse capture: {}", path.display()))
}

/// Parse an in-memory capture.
///
/// Buffers come back with offset 0 and whole strides; they decode to the
/// same meshes as the buffers that were recorded.
pub fn read_capture(bytes: &[u8]) -> Result<Vec<CaptureRecord>> {
    if !bytes.starts_with(SCAN_FORMAT.capture_magic) {
        bail!("Not a MeshScan capture (bad magic bytes)");
    }

    let mut reader = ByteReader::new(bytes);
    let header = CaptureHeader::from_bytes(reader.take(CaptureHeader::SIZE)?)
        .context("Invalid capture header")?;
    if header.version != SCAN_FORMAT.capture_version {
        bail!(
            "Unsupported capture version {} (expected {})",
            header.version,
            SCAN_FORMAT.capture_version
        );
    }

    let mut records = Vec::with_capacity((header.record_count as usize).min(4096));
    for index in 0..header.record_count {
        let record = read_record(&mut reader).with_context(|| format!("Invalid record {index}"))?;
        records.push(record);
    }

    if reader.remaining() > 0 {
        bail!("{} trailing bytes after the last record", reader.remaining());
    }
    Ok(records)
}

fn read_record(reader: &mut ByteReader<'_>) -> Result<CaptureRecord> {
    let header_bytes = reader.take(RecordHeader::SIZE)?;
    let header = RecordHeader::from_bytes(header_bytes)
        .with_context(|| format!("Unknown record kind {}", header_bytes[0]))?;
    let count = header.anchor_count as usize;
    let at = Duration::from_micros(header.at_micros);

    let event = match header.kind {
        RecordKind::Removed => {
            let ids = (0..count)
                .map(|_| reader.array::<16>().map(AnchorId::from_bytes))
                .collect::<Result<Vec<_>>>()?;
            CaptureEvent::Removed(ids)
        }
        kind => {
            let updates = (0..count)
                .map(|_| read_anchor(reader))
                .collect::<Result<Vec<_>>>()?;
            if kind == RecordKind::Added {
                CaptureEvent::Added(updates)
            } else {
                CaptureEvent::Updated(updates)
            }
        }
    };
    Ok(CaptureRecord::new(at, event))
}

fn read_anchor(reader: &mut ByteReader<'_>) -> Result<AnchorUpdate> {
    let id = AnchorId::from_bytes(reader.array::<16>()?);
    let header = AnchorMeshHeader::from_bytes(reader.take(AnchorMeshHeader::SIZE)?)
        .context("Invalid anchor mesh header")?;

    let vertex_len = header.vertex_data_len().context("Vertex data too large")?;
    let vertices = RawVertexBuffer::new(
        reader.take(vertex_len)?.to_vec(),
        header.vertex_stride as usize,
        header.vertex_count as usize,
    );

    let index_len = header.index_data_len().context("Index data too large")?;
    let faces = RawIndexBuffer::new(
        reader.take(index_len)?.to_vec(),
        header.index_width as usize,
        header.indices_per_primitive as usize,
        header.primitive_count as usize,
    );

    Ok(AnchorUpdate::new(
        id,
        Mat4::from_cols_array(&header.transform),
        vertices,
        faces,
    ))
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            bail!(
                "Unexpected end of capture at byte {}: need {} bytes, {} left",
                self.pos,
                len,
                self.remaining()
            );
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
