//! Binary diagnostic capture files.
//!
//! Solves can optionally persist every residual/state evaluation and every
//! Jacobian build to an append-style binary file for post-hoc debugging.
//! Record layout, all little-endian:
//!
//! ```text
//! f64 time | u32 code | u32 call index | u32 offset key | u32 count | payload
//! ```
//!
//! The payload is `count` doubles for vector records, or `count`
//! `(u32 row, u32 col, f64 value)` triples for array records. Bit 16 of
//! the code distinguishes the two; the low half carries the caller's
//! record kind (state, Jacobian, residual).

use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use gridflow_core::{GridResult, Index};
use gridflow_sparse::MatrixData;

/// Record-kind codes stored in the low half of the code word.
pub const CODE_STATE: u32 = 0;
pub const CODE_JACOBIAN: u32 = 1;
pub const CODE_RESIDUAL: u32 = 2;

/// Bit flagging an array (triple-payload) record.
const ARRAY_FLAG: u32 = 0x0001_0000;

/// Append or create a vector record.
pub fn write_vector(
    path: &Path,
    append: bool,
    time: f64,
    code: u32,
    call_index: u32,
    key: u32,
    data: &[f64],
) -> GridResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    let mut w = BufWriter::new(file);
    write_header(&mut w, time, code & 0xFFFF, call_index, key, data.len() as u32)?;
    for v in data {
        w.write_all(&v.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

/// Append or create an array record holding a container's entries in
/// traversal order.
pub fn write_array(
    path: &Path,
    append: bool,
    time: f64,
    code: u32,
    call_index: u32,
    key: u32,
    md: &mut dyn MatrixData,
) -> GridResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    let mut w = BufWriter::new(file);
    write_header(
        &mut w,
        time,
        (code & 0xFFFF) | ARRAY_FLAG,
        call_index,
        key,
        md.size(),
    )?;
    md.start();
    while md.more_data() {
        let el = md.next_element();
        w.write_all(&el.row.to_le_bytes())?;
        w.write_all(&el.col.to_le_bytes())?;
        w.write_all(&el.value.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

fn write_header<W: Write>(
    w: &mut W,
    time: f64,
    code: u32,
    call_index: u32,
    key: u32,
    count: u32,
) -> std::io::Result<()> {
    w.write_all(&time.to_le_bytes())?;
    w.write_all(&code.to_le_bytes())?;
    w.write_all(&call_index.to_le_bytes())?;
    w.write_all(&key.to_le_bytes())?;
    w.write_all(&count.to_le_bytes())?;
    Ok(())
}

/// One decoded capture record.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureRecord {
    Vector {
        time: f64,
        code: u32,
        call_index: u32,
        key: u32,
        data: Vec<f64>,
    },
    Array {
        time: f64,
        code: u32,
        call_index: u32,
        key: u32,
        entries: Vec<(Index, Index, f64)>,
    },
}

/// Decode every record in a capture file.
pub fn read_capture(path: &Path) -> GridResult<Vec<CaptureRecord>> {
    let mut r = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();
    loop {
        let mut time_buf = [0u8; 8];
        match r.read_exact(&mut time_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let time = f64::from_le_bytes(time_buf);
        let code = read_u32(&mut r)?;
        let call_index = read_u32(&mut r)?;
        let key = read_u32(&mut r)?;
        let count = read_u32(&mut r)?;
        if code & ARRAY_FLAG != 0 {
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let row = read_u32(&mut r)?;
                let col = read_u32(&mut r)?;
                entries.push((row, col, read_f64(&mut r)?));
            }
            records.push(CaptureRecord::Array {
                time,
                code: code & 0xFFFF,
                call_index,
                key,
                entries,
            });
        } else {
            let mut data = Vec::with_capacity(count as usize);
            for _ in 0..count {
                data.push(read_f64(&mut r)?);
            }
            records.push(CaptureRecord::Vector {
                time,
                code,
                call_index,
                key,
                data,
            });
        }
    }
    Ok(records)
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}
