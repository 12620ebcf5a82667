//! Fixed, versioned, little-endian wire types for the rendezvous protocol.
//!
//! Every discovery message starts with a [`WireHdr`] followed by a sequence of
//! fixed-size records. Records are decoded with unaligned reads, so received
//! byte buffers never need special alignment.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

use crate::data::halo::HaloId;
use crate::geometry::DomainKey;
use crate::halo_error::HaloError;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

pub const KIND_COUNT: u16 = 1;
pub const KIND_EDGES: u16 = 2;
pub const KIND_REQUEST: u16 = 3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub len_le: u32, // number of records following the header
}

impl WireHdr {
    pub fn new(kind: u16, len: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            len_le: (len as u32).to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn len(&self) -> usize {
        u32::from_le(self.len_le) as usize
    }
}

/// `[rank, count]` pair gathered on the master.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub rank_le: u32,
    pub n_le: u32,
}

/// One halo edge: `receiver` will read window `receiver_halo` from `sender`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEdge {
    pub sender_le: u32,
    pub receiver_le: u32,
    pub level_le: u32,
    pub halo_le: u32,
}

/// Fixed part of a transmit-setup request. Followed by `ndim` key words
/// (`u64`), then `ndim` lower and `ndim` upper corner coordinates (`f64` bits).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireRequest {
    pub level_le: u32,
    pub receiver_le: u32,
    pub halo_le: u32,
    pub ndim_le: u32,
}

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireCount>(), 8);
const_assert_eq!(size_of::<WireEdge>(), 16);
const_assert_eq!(size_of::<WireRequest>(), 16);

/// Decoded [`WireEdge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HaloEdge {
    pub sender: usize,
    pub receiver: usize,
    pub level: usize,
    pub receiver_halo: HaloId,
}

impl HaloEdge {
    /// `(sender, receiver, level)`: the part both sides can derive from geometry.
    pub fn triple(&self) -> (usize, usize, usize) {
        (self.sender, self.receiver, self.level)
    }
}

/// Decoded transmit-setup request: "serve window `[from, to]` of your domain
/// `sender_key` to halo `receiver_halo` of rank `receiver_rank`".
#[derive(Clone, Debug, PartialEq)]
pub struct TransmitRequest {
    pub sender_key: DomainKey,
    pub level: usize,
    pub receiver_rank: usize,
    pub receiver_halo: HaloId,
    pub from: Vec<f64>,
    pub to: Vec<f64>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    neighbor: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], neighbor: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            neighbor,
        }
    }

    fn read<T: Pod>(&mut self) -> Result<T, HaloError> {
        let end = self.pos + size_of::<T>();
        let chunk = self.bytes.get(self.pos..end).ok_or_else(|| HaloError::Wire {
            neighbor: self.neighbor,
            reason: format!("truncated record at byte {} of {}", self.pos, self.bytes.len()),
        })?;
        self.pos = end;
        Ok(bytemuck::pod_read_unaligned(chunk))
    }

    fn header(&mut self, kind: u16) -> Result<usize, HaloError> {
        let hdr: WireHdr = self.read()?;
        if hdr.version() != WIRE_VERSION {
            return Err(self.error(format!("wire version {} != {WIRE_VERSION}", hdr.version())));
        }
        if hdr.kind() != kind {
            return Err(self.error(format!("expected kind {kind}, got {}", hdr.kind())));
        }
        Ok(hdr.len())
    }

    fn finish(self) -> Result<(), HaloError> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(self.error(format!(
                "{} trailing bytes",
                self.bytes.len() - self.pos
            )))
        }
    }

    fn error(&self, reason: String) -> HaloError {
        HaloError::Wire {
            neighbor: self.neighbor,
            reason,
        }
    }
}

pub fn encode_count(rank: usize, n: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + size_of::<WireCount>());
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_COUNT, 1)));
    out.extend_from_slice(bytemuck::bytes_of(&WireCount {
        rank_le: (rank as u32).to_le(),
        n_le: (n as u32).to_le(),
    }));
    out
}

pub fn decode_count(bytes: &[u8], neighbor: usize) -> Result<(usize, usize), HaloError> {
    let mut r = Reader::new(bytes, neighbor);
    if r.header(KIND_COUNT)? != 1 {
        return Err(r.error("count message must carry exactly one record".into()));
    }
    let rec: WireCount = r.read()?;
    r.finish()?;
    Ok((u32::from_le(rec.rank_le) as usize, u32::from_le(rec.n_le) as usize))
}

pub fn encode_edges(edges: &[HaloEdge]) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + edges.len() * size_of::<WireEdge>());
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_EDGES, edges.len())));
    for e in edges {
        out.extend_from_slice(bytemuck::bytes_of(&WireEdge {
            sender_le: (e.sender as u32).to_le(),
            receiver_le: (e.receiver as u32).to_le(),
            level_le: (e.level as u32).to_le(),
            halo_le: e.receiver_halo.0.to_le(),
        }));
    }
    out
}

pub fn decode_edges(bytes: &[u8], neighbor: usize) -> Result<Vec<HaloEdge>, HaloError> {
    let mut r = Reader::new(bytes, neighbor);
    let n = r.header(KIND_EDGES)?;
    let mut edges = Vec::with_capacity(n);
    for _ in 0..n {
        let rec: WireEdge = r.read()?;
        edges.push(HaloEdge {
            sender: u32::from_le(rec.sender_le) as usize,
            receiver: u32::from_le(rec.receiver_le) as usize,
            level: u32::from_le(rec.level_le) as usize,
            receiver_halo: HaloId(u32::from_le(rec.halo_le)),
        });
    }
    r.finish()?;
    Ok(edges)
}

pub fn encode_request(req: &TransmitRequest) -> Vec<u8> {
    let ndim = req.sender_key.len();
    let mut out = Vec::with_capacity(
        size_of::<WireHdr>() + size_of::<WireRequest>() + 3 * ndim * size_of::<u64>(),
    );
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(KIND_REQUEST, 1)));
    out.extend_from_slice(bytemuck::bytes_of(&WireRequest {
        level_le: (req.level as u32).to_le(),
        receiver_le: (req.receiver_rank as u32).to_le(),
        halo_le: req.receiver_halo.0.to_le(),
        ndim_le: (ndim as u32).to_le(),
    }));
    for &c in req.sender_key.iter() {
        out.extend_from_slice(&(c as u64).to_le_bytes());
    }
    for &x in req.from.iter().chain(req.to.iter()) {
        out.extend_from_slice(&x.to_bits().to_le_bytes());
    }
    out
}

pub fn decode_request(bytes: &[u8], neighbor: usize) -> Result<TransmitRequest, HaloError> {
    let mut r = Reader::new(bytes, neighbor);
    if r.header(KIND_REQUEST)? != 1 {
        return Err(r.error("request message must carry exactly one record".into()));
    }
    let rec: WireRequest = r.read()?;
    let ndim = u32::from_le(rec.ndim_le) as usize;
    let mut key = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        key.push(u64::from_le(r.read::<u64>()?) as usize);
    }
    let mut coords = Vec::with_capacity(2 * ndim);
    for _ in 0..2 * ndim {
        coords.push(f64::from_bits(u64::from_le(r.read::<u64>()?)));
    }
    r.finish()?;
    let to = coords.split_off(ndim);
    Ok(TransmitRequest {
        sender_key: DomainKey::from(key),
        level: u32::from_le(rec.level_le) as usize,
        receiver_rank: u32::from_le(rec.receiver_le) as usize,
        receiver_halo: HaloId(u32::from_le(rec.halo_le)),
        from: coords,
        to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_survives_unaligned_buffer() {
        let req = TransmitRequest {
            sender_key: DomainKey::from(vec![1, 0]),
            level: 1,
            receiver_rank: 3,
            receiver_halo: HaloId(7),
            from: vec![0.5, -1.25],
            to: vec![0.5, 2.0],
        };
        let mut shifted = vec![0u8];
        shifted.extend(encode_request(&req));
        let got = decode_request(&shifted[1..], 3).unwrap();
        assert_eq!(got, req);
    }

    #[test]
    fn empty_edge_list_is_valid() {
        let bytes = encode_edges(&[]);
        assert_eq!(bytes.len(), size_of::<WireHdr>());
        assert!(decode_edges(&bytes, 0).unwrap().is_empty());
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let bytes = encode_count(2, 5);
        assert!(matches!(
            decode_edges(&bytes, 2),
            Err(HaloError::Wire { neighbor: 2, .. })
        ));
        assert_eq!(decode_count(&bytes, 2).unwrap(), (2, 5));
    }

    #[test]
    fn truncated_edges_are_rejected() {
        let edge = HaloEdge {
            sender: 1,
            receiver: 0,
            level: 0,
            receiver_halo: HaloId(0),
        };
        let bytes = encode_edges(&[edge, edge]);
        let err = decode_edges(&bytes[..bytes.len() - 4], 1).unwrap_err();
        assert!(matches!(err, HaloError::Wire { .. }));
    }
}
