//! Property-indexed stream reader/writer layered over the byte codec.
//!
//! A POF user-type frame is a packed type id, a packed version id, a strictly ascending sequence
//! of `(property index, value)` pairs, and a remainder of bytes this code did not interpret
//! (either because they belong to a newer minor version of the same type, or because the frame
//! itself is nested and its type is unknown to this process). [PofWriter] and [PofReader] give a
//! serializer strategy ([crate::serializer]) a safe way to produce and consume that shape without
//! hand-rolling the sequencing rules itself.
//!
//! Every frame this module writes or reads is bounded: the outermost frame by the exact byte
//! buffer handed to [write_user_type]/[read_user_type], a nested frame by the length prefix
//! [PofWriter::write_nested] adds around it. That means "end of frame" is always just "end of the
//! underlying buffer" and [PofReader::read_remainder] never has to interpret a property it does
//! not recognize: it just copies the remaining bytes verbatim.

use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::codec::{
    read_f32, read_f64, read_i16, read_i32, read_i64, read_packed_i128, read_packed_i32,
    read_packed_i64, read_string, read_u16, read_u32, read_u64, write_f32, write_f64, write_i16,
    write_i32, write_i64, write_packed_i128, write_packed_i32, write_packed_i64, write_string,
    write_u16, write_u32, write_u64, RawInt128,
};
use crate::error::{Error, ErrorKind, ErrorLocation, MalformedError, SequenceError};
use crate::identity::{ReaderIdentityTable, WriterIdentityTable};

/// The pseudo property-index a frame's terminator is recorded at.
const TERMINATOR_INDEX: i32 = -1;

/// Bounds how large a single length-prefixed allocation (bytes property, string, nested frame) a
/// [PofReader] will make while decoding.
///
/// Every frame this module reads is nested inside a buffer the caller already fully holds in
/// memory, so a length prefix can never make a reader allocate more than the input it was handed.
/// But a corrupted or hostile length prefix claiming far more bytes than actually follow still
/// forces an allocation attempt before [std::io::Read::read_exact] gets the chance to fail on the
/// short read, which is wasted work at best and an abuse vector at worst when decoding bytes from
/// an untrusted source. `Config` lets a caller cap that allocation ahead of time.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    max_len: usize,
}

impl Config {
    /// `max_len` is the largest single length-prefixed allocation (in bytes) a reader built with
    /// this config will attempt.
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for Config {
    /// 64 MiB, generous enough for any realistically-sized POF value while still refusing a
    /// length prefix that claims gigabytes.
    fn default() -> Self {
        Self {
            max_len: 64 * 1024 * 1024,
        }
    }
}

fn out_of_order(previous: i32, next: i32) -> Error {
    Error::at(
        ErrorKind::from(SequenceError::OutOfOrder { previous, next }),
        ErrorLocation::unknown().with_property_index(next),
    )
}

fn already_terminated() -> Error {
    Error::at(
        ErrorKind::from(SequenceError::FrameAlreadyTerminated),
        ErrorLocation::unknown(),
    )
}

// --- PofWriter ------------------------------------------------------------------------------

/// Writes a single user-type frame's properties in ascending index order.
///
/// `W` is almost always `Vec<u8>` (the outermost frame) or `&mut Vec<u8>` (a frame nested inside
/// another via [PofWriter::write_nested]); any [Write] works.
pub struct PofWriter<W: Write> {
    sink: W,
    last_index: i32,
    terminated: bool,
    identities: Rc<RefCell<WriterIdentityTable>>,
}

impl<W: Write> PofWriter<W> {
    fn new(sink: W, identities: Rc<RefCell<WriterIdentityTable>>) -> Self {
        Self {
            sink,
            last_index: TERMINATOR_INDEX,
            terminated: false,
            identities,
        }
    }

    fn begin_property(&mut self, index: i32) -> crate::error::Result<()> {
        if self.terminated {
            return Err(already_terminated());
        }
        if index <= self.last_index {
            return Err(out_of_order(self.last_index, index));
        }
        trace!(property_index = index, "writing property");
        write_packed_i32(&mut self.sink, index)?;
        self.last_index = index;
        Ok(())
    }

    /// Look up or register an identity for reference-cycle support. Returns `Some(existing_id)`
    /// if this identity has already been written and the caller should emit a back-reference
    /// instead of the full value; `None` if it is new (the caller should register it with
    /// [PofWriter::register_identity] and write the value in full) or references are disabled.
    pub fn lookup_identity(&self, key: usize) -> Option<i32> {
        self.identities.borrow().lookup(key)
    }

    pub fn register_identity(&self, key: usize) -> Option<i32> {
        self.identities.borrow_mut().register(key)
    }

    pub fn write_i32(&mut self, index: i32, value: i32) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_packed_i32(&mut self.sink, value)
    }

    pub fn write_i64(&mut self, index: i32, value: i64) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_packed_i64(&mut self.sink, value)
    }

    pub fn write_raw_int128(&mut self, index: i32, value: &RawInt128) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_packed_i128(&mut self.sink, value)
    }

    pub fn write_fixed_i16(&mut self, index: i32, value: i16) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_i16(&mut self.sink, value)
    }

    pub fn write_fixed_u16(&mut self, index: i32, value: u16) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_u16(&mut self.sink, value)
    }

    pub fn write_fixed_i32(&mut self, index: i32, value: i32) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_i32(&mut self.sink, value)
    }

    pub fn write_fixed_u32(&mut self, index: i32, value: u32) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_u32(&mut self.sink, value)
    }

    pub fn write_fixed_i64(&mut self, index: i32, value: i64) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_i64(&mut self.sink, value)
    }

    pub fn write_fixed_u64(&mut self, index: i32, value: u64) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_u64(&mut self.sink, value)
    }

    pub fn write_f32(&mut self, index: i32, value: f32) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_f32(&mut self.sink, value)
    }

    pub fn write_f64(&mut self, index: i32, value: f64) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_f64(&mut self.sink, value)
    }

    pub fn write_string(&mut self, index: i32, value: Option<&str>) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_string(&mut self.sink, value)
    }

    /// Length-prefixed opaque bytes, used for byte-array properties and for carrying a raw
    /// fallback-serialized payload (see [crate::registry::safe]).
    pub fn write_bytes(&mut self, index: i32, value: &[u8]) -> crate::error::Result<()> {
        self.begin_property(index)?;
        write_packed_i32(&mut self.sink, value.len() as i32)?;
        self.sink.write_all(value)?;
        Ok(())
    }

    /// Open a length-prefixed nested frame at `property_index`, whose own type id is
    /// `nested_type_id` and version is `version`. `body` writes the nested frame's own properties;
    /// it does not need to call `write_remainder` itself, an empty remainder is added if it didn't.
    ///
    /// This is the mechanism behind both "a property whose value is itself a user type" and each
    /// per-class frame of a [hierarchical serializer](crate::serializer::hierarchical).
    pub fn write_nested<F>(
        &mut self,
        property_index: i32,
        nested_type_id: i32,
        version: i32,
        body: F,
    ) -> crate::error::Result<()>
    where
        F: FnOnce(&mut PofWriter<&mut Vec<u8>>) -> crate::error::Result<()>,
    {
        self.begin_property(property_index)?;
        debug!(type_id = nested_type_id, version, "opening nested frame");
        let mut content = Vec::new();
        {
            let mut nested = PofWriter::new(&mut content, self.identities.clone());
            write_packed_i32(&mut nested.sink, nested_type_id)?;
            write_packed_i32(&mut nested.sink, version)?;
            body(&mut nested).map_err(|e| e.while_in_frame(nested_type_id))?;
            if !nested.terminated {
                nested.write_remainder(&[])?;
            }
        }
        write_packed_i32(&mut self.sink, content.len() as i32)?;
        self.sink.write_all(&content)?;
        debug!(type_id = nested_type_id, len = content.len(), "closed nested frame");
        Ok(())
    }

    /// Write a nested frame whose bytes were already fully assembled (the "unknown nested frame"
    /// case: when re-serializing a type this process doesn't recognize, its captured content is
    /// replayed verbatim rather than re-encoded).
    pub fn write_nested_raw(&mut self, property_index: i32, content: &[u8]) -> crate::error::Result<()> {
        self.begin_property(property_index)?;
        write_packed_i32(&mut self.sink, content.len() as i32)?;
        self.sink.write_all(content)?;
        Ok(())
    }

    /// Terminate the frame, writing `future_data` (typically empty, or a verbatim-preserved
    /// capture from [PofReader::read_remainder]) as the trailing bytes of the frame.
    pub fn write_remainder(&mut self, future_data: &[u8]) -> crate::error::Result<()> {
        if self.terminated {
            return Err(already_terminated());
        }
        self.sink.write_all(future_data)?;
        self.terminated = true;
        Ok(())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

/// Write a complete top-level user-type frame (type id, version, properties, remainder) into a
/// fresh buffer.
pub fn write_user_type<F>(
    type_id: i32,
    version: i32,
    references_enabled: bool,
    body: F,
) -> crate::error::Result<Vec<u8>>
where
    F: FnOnce(&mut PofWriter<&mut Vec<u8>>) -> crate::error::Result<()>,
{
    let mut buf = Vec::new();
    let identities = Rc::new(RefCell::new(WriterIdentityTable::new(references_enabled)));
    {
        let mut writer = PofWriter::new(&mut buf, identities);
        write_packed_i32(&mut writer.sink, type_id)?;
        write_packed_i32(&mut writer.sink, version)?;
        body(&mut writer).map_err(|e| e.while_in_frame(type_id))?;
        if !writer.terminated {
            writer.write_remainder(&[])?;
        }
    }
    Ok(buf)
}

// --- PofReader ------------------------------------------------------------------------------

/// Reads a single user-type frame's properties in ascending index order.
///
/// `R` must be [Read] + [Seek] because peeking the next property index (to decide whether a
/// requested optional property is present) reads a packed int and then seeks back if it turns out
/// the caller wants to consume it.
pub struct PofReader<R: Read + Seek> {
    src: R,
    pending_index: Option<i32>,
    last_index: i32,
    terminated: bool,
    identities: Rc<RefCell<ReaderIdentityTable>>,
    config: Config,
}

impl<R: Read + Seek> PofReader<R> {
    fn new(src: R, identities: Rc<RefCell<ReaderIdentityTable>>, config: Config) -> Self {
        Self {
            src,
            pending_index: None,
            last_index: TERMINATOR_INDEX,
            terminated: false,
            identities,
            config,
        }
    }

    /// Validate a length prefix read off the wire against this reader's [Config], returning it as
    /// a `usize` ready to size an allocation with.
    fn checked_len(&self, len: i32) -> crate::error::Result<usize> {
        let len = len.max(0) as usize;
        if len > self.config.max_len {
            return Err(Error::at(
                ErrorKind::from(MalformedError::LengthExceedsLimit {
                    len,
                    max: self.config.max_len,
                }),
                ErrorLocation::unknown(),
            ));
        }
        Ok(len)
    }

    /// Peek the next property index without consuming it. Returns the negative terminator
    /// sentinel once the frame is exhausted.
    pub fn next_property_index(&mut self) -> crate::error::Result<i32> {
        if let Some(idx) = self.pending_index {
            return Ok(idx);
        }
        let pos = self.src.stream_position()?;
        let mut probe = [0u8; 1];
        let n = self.src.read(&mut probe)?;
        if n == 0 {
            self.pending_index = Some(TERMINATOR_INDEX);
            return Ok(TERMINATOR_INDEX);
        }
        self.src.seek(SeekFrom::Start(pos))?;
        let idx = read_packed_i32(&mut self.src)?;
        self.pending_index = Some(idx);
        Ok(idx)
    }

    pub fn register_identity(&self) -> Option<i32> {
        self.identities.borrow_mut().register()
    }

    pub fn is_registered_identity(&self, id: i32) -> bool {
        self.identities.borrow().is_registered(id)
    }

    /// Returns `true` and consumes the pending index if `index` is next on the wire; `false`
    /// (leaving the pending index untouched) if the wire has moved past `index` or ended, meaning
    /// the property is simply absent (an older payload missing a newer optional field). Errors if
    /// the caller asks for an index at or before one already consumed, or for one strictly greater
    /// than an index still pending that this reader does not know how to skip: POF types may only
    /// append higher-indexed properties across versions, never insert between existing ones.
    fn expect_index(&mut self, index: i32) -> crate::error::Result<bool> {
        if self.terminated || index <= self.last_index {
            return Err(self.with_current_offset(out_of_order(self.last_index, index)));
        }
        let next = self.next_property_index()?;
        if next == index {
            self.pending_index = None;
            self.last_index = index;
            trace!(property_index = index, "reading property");
            Ok(true)
        } else if next == TERMINATOR_INDEX || next > index {
            Ok(false)
        } else {
            Err(self.with_current_offset(out_of_order(next, index)))
        }
    }

    /// Tag an error with this reader's current stream position, when it can be read without
    /// masking the original failure.
    fn with_current_offset(&mut self, err: Error) -> Error {
        match self.src.stream_position() {
            Ok(offset) => err.while_at_offset(offset),
            Err(_) => err,
        }
    }

    pub fn read_i32(&mut self, index: i32) -> crate::error::Result<Option<i32>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_packed_i32(&mut self.src)?))
    }

    pub fn read_i64(&mut self, index: i32) -> crate::error::Result<Option<i64>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_packed_i64(&mut self.src)?))
    }

    pub fn read_raw_int128(&mut self, index: i32) -> crate::error::Result<Option<RawInt128>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_packed_i128(&mut self.src)?))
    }

    pub fn read_fixed_i16(&mut self, index: i32) -> crate::error::Result<Option<i16>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_i16(&mut self.src)?))
    }

    pub fn read_fixed_u16(&mut self, index: i32) -> crate::error::Result<Option<u16>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_u16(&mut self.src)?))
    }

    pub fn read_fixed_i32(&mut self, index: i32) -> crate::error::Result<Option<i32>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_i32(&mut self.src)?))
    }

    pub fn read_fixed_u32(&mut self, index: i32) -> crate::error::Result<Option<u32>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_u32(&mut self.src)?))
    }

    pub fn read_fixed_i64(&mut self, index: i32) -> crate::error::Result<Option<i64>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_i64(&mut self.src)?))
    }

    pub fn read_fixed_u64(&mut self, index: i32) -> crate::error::Result<Option<u64>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_u64(&mut self.src)?))
    }

    pub fn read_f32(&mut self, index: i32) -> crate::error::Result<Option<f32>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_f32(&mut self.src)?))
    }

    pub fn read_f64(&mut self, index: i32) -> crate::error::Result<Option<f64>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_f64(&mut self.src)?))
    }

    pub fn read_string(&mut self, index: i32) -> crate::error::Result<Option<Option<String>>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        Ok(Some(read_string(&mut self.src)?))
    }

    pub fn read_bytes(&mut self, index: i32) -> crate::error::Result<Option<Vec<u8>>> {
        if !self.expect_index(index)? {
            return Ok(None);
        }
        let len = read_packed_i32(&mut self.src)?;
        let len = self.checked_len(len)?;
        let mut buf = vec![0u8; len];
        self.src.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    /// Read a nested frame written by [PofWriter::write_nested], returning its type id, version,
    /// and a reader scoped to its properties. `None` if the property is absent.
    pub fn read_nested(
        &mut self,
        property_index: i32,
    ) -> crate::error::Result<Option<(i32, i32, PofReader<Cursor<Vec<u8>>>)>> {
        if !self.expect_index(property_index)? {
            return Ok(None);
        }
        let len = read_packed_i32(&mut self.src)?;
        let len = self.checked_len(len)?;
        let mut content = vec![0u8; len];
        self.src.read_exact(&mut content)?;
        let mut cursor = Cursor::new(content);
        let type_id = read_packed_i32(&mut cursor)?;
        let version = read_packed_i32(&mut cursor)?;
        debug!(type_id, version, "opening nested frame");
        let inner_identities = Rc::new(RefCell::new(ReaderIdentityTable::new(
            self.identities.borrow().is_enabled(),
        )));
        Ok(Some((
            type_id,
            version,
            PofReader::new(cursor, inner_identities, self.config),
        )))
    }

    /// Read the raw, unparsed bytes of a nested frame (type id, version, properties and all),
    /// without attempting to interpret it. Used when a class id or nested type is unknown to this
    /// process, so that it can be preserved verbatim on re-serialization.
    pub fn read_nested_raw(&mut self, property_index: i32) -> crate::error::Result<Option<Vec<u8>>> {
        if !self.expect_index(property_index)? {
            return Ok(None);
        }
        let len = read_packed_i32(&mut self.src)?;
        let len = self.checked_len(len)?;
        let mut content = vec![0u8; len];
        self.src.read_exact(&mut content)?;
        Ok(Some(content))
    }

    /// Capture every byte this reader has not yet consumed, including the index of a property
    /// that was peeked but never read (re-encoded so the capture stays byte-identical to what a
    /// caller that never peeked would have captured). Because every frame this module reads is
    /// bounded, this is always exactly "the rest of the buffer"; the caller does not need to know
    /// the type of any property it is skipping.
    pub fn read_remainder(&mut self) -> crate::error::Result<Vec<u8>> {
        let mut out = Vec::new();
        if let Some(idx) = self.pending_index.take() {
            if idx != TERMINATOR_INDEX {
                write_packed_i32(&mut out, idx)?;
            }
        }
        self.src.read_to_end(&mut out)?;
        self.terminated = true;
        if !out.is_empty() {
            tracing::warn!(len = out.len(), "frame carries unrecognized trailing future data");
        }
        Ok(out)
    }
}

/// Read a complete top-level user-type frame's header, returning its type id, version, and a
/// reader scoped to its properties. Equivalent to
/// [read_user_type_with_config] with a default-sized [Config].
pub fn read_user_type(
    bytes: Vec<u8>,
    references_enabled: bool,
) -> crate::error::Result<(i32, i32, PofReader<Cursor<Vec<u8>>>)> {
    read_user_type_with_config(bytes, references_enabled, Config::default())
}

/// Read a complete top-level user-type frame's header, bounding every length-prefixed allocation
/// the returned reader (and any reader it nests) performs by `config`.
pub fn read_user_type_with_config(
    bytes: Vec<u8>,
    references_enabled: bool,
    config: Config,
) -> crate::error::Result<(i32, i32, PofReader<Cursor<Vec<u8>>>)> {
    let mut cursor = Cursor::new(bytes);
    let type_id = read_packed_i32(&mut cursor)?;
    let version = read_packed_i32(&mut cursor)?;
    let identities = Rc::new(RefCell::new(ReaderIdentityTable::new(references_enabled)));
    Ok((type_id, version, PofReader::new(cursor, identities, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flat_round_trip() {
        let bytes = write_user_type(1001, 0, false, |w| {
            w.write_i32(0, 42)?;
            w.write_string(1, Some("hello"))?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (type_id, version, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(type_id, 1001);
        assert_eq!(version, 0);
        assert_eq!(reader.read_i32(0).unwrap(), Some(42));
        assert_eq!(reader.read_string(1).unwrap(), Some(Some("hello".to_string())));
        assert_eq!(reader.read_remainder().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn out_of_order_write_is_rejected() {
        let result = write_user_type(1, 0, false, |w| {
            w.write_i32(2, 1)?;
            w.write_i32(1, 2)
        });
        assert!(result.is_err());
    }

    #[test]
    fn missing_optional_property_reads_as_none() {
        let bytes = write_user_type(1, 0, false, |w| {
            w.write_i32(0, 1)?;
            w.write_i32(5, 2)?;
            w.write_remainder(&[])
        })
        .unwrap();
        let (_, _, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(reader.read_i32(0).unwrap(), Some(1));
        // index 2 was never written; the wire has moved on to index 5.
        assert_eq!(reader.read_i32(2).unwrap(), None);
        assert_eq!(reader.read_i32(5).unwrap(), Some(2));
    }

    #[test]
    fn trailing_unknown_property_is_preserved_as_remainder() {
        // Simulate a newer writer that wrote an extra trailing property (index 9) this reader's
        // schema doesn't know about.
        let newer = write_user_type(1, 1, false, |w| {
            w.write_i32(0, 1)?;
            w.write_i32(9, 999)?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (type_id, version, mut reader) = read_user_type(newer.clone(), false).unwrap();
        assert_eq!(reader.read_i32(0).unwrap(), Some(1));
        let future_data = reader.read_remainder().unwrap();
        assert!(!future_data.is_empty());

        // Re-serializing with only the known property plus the captured future data reproduces
        // the original bytes exactly.
        let roundtripped = write_user_type(type_id, version, false, |w| {
            w.write_i32(0, 1)?;
            w.write_remainder(&future_data)
        })
        .unwrap();
        assert_eq!(roundtripped, newer);
    }

    #[test]
    fn nested_frame_round_trip() {
        let bytes = write_user_type(1, 0, false, |w| {
            w.write_i32(0, 7)?;
            w.write_nested(1, 2000, 0, |nested| {
                nested.write_string(0, Some("inner"))?;
                nested.write_remainder(&[])
            })?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (_, _, mut reader) = read_user_type(bytes, false).unwrap();
        assert_eq!(reader.read_i32(0).unwrap(), Some(7));
        let (nested_type, nested_version, mut nested_reader) =
            reader.read_nested(1).unwrap().unwrap();
        assert_eq!(nested_type, 2000);
        assert_eq!(nested_version, 0);
        assert_eq!(
            nested_reader.read_string(0).unwrap(),
            Some(Some("inner".to_string()))
        );
        assert_eq!(nested_reader.read_remainder().unwrap(), Vec::<u8>::new());
        assert_eq!(reader.read_remainder().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn unknown_nested_frame_round_trips_verbatim() {
        let bytes = write_user_type(1, 0, false, |w| {
            w.write_nested(5, 3000, 0, |nested| {
                nested.write_i32(0, 11)?;
                nested.write_remainder(&[])
            })?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (type_id, version, mut reader) = read_user_type(bytes.clone(), false).unwrap();
        let raw = reader.read_nested_raw(5).unwrap().unwrap();
        reader.read_remainder().unwrap();

        let replayed = write_user_type(type_id, version, false, |w| w.write_nested_raw(5, &raw)).unwrap();
        assert_eq!(replayed, bytes);
    }

    #[test]
    fn oversized_length_prefix_is_rejected_before_allocating() {
        let bytes = write_user_type(1, 0, false, |w| {
            w.write_bytes(0, &[1, 2, 3])?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (_, _, mut reader) =
            read_user_type_with_config(bytes, false, Config::new(2)).unwrap();
        let err = reader.read_bytes(0).unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::ErrorKind::Malformed(crate::error::MalformedError::LengthExceedsLimit {
                len: 3,
                max: 2
            })
        ));
    }

    #[test]
    fn length_prefix_within_config_bound_is_accepted() {
        let bytes = write_user_type(1, 0, false, |w| {
            w.write_bytes(0, &[1, 2, 3])?;
            w.write_remainder(&[])
        })
        .unwrap();

        let (_, _, mut reader) =
            read_user_type_with_config(bytes, false, Config::new(3)).unwrap();
        assert_eq!(reader.read_bytes(0).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn identities_disabled_never_register() {
        let bytes = write_user_type(1, 0, false, |w| {
            assert_eq!(w.lookup_identity(0xAAAA), None);
            assert_eq!(w.register_identity(0xAAAA), None);
            w.write_remainder(&[])
        })
        .unwrap();
        let _ = bytes;
    }
}
