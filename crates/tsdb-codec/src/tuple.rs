//! A small deterministic tuple encoding shared by the Descriptor,
//! ID-counter, and Dashboard key families (tags 5, 6, 7).
//!
//! Each element is length-prefixed so the encoding stays prefix-free: no
//! key from one of these families can ever be a byte-prefix of a key from
//! another, which keeps range scans bounded to exactly the family being
//! scanned.

use byteorder::{LittleEndian, WriteBytesExt};

pub(crate) enum TupleElement<'a> {
    Str(&'a str),
    Pairs(&'a [(String, String)]),
}

pub(crate) fn pack_tuple(tag: u8, elements: &[TupleElement<'_>]) -> Vec<u8> {
    let mut out = vec![tag];
    for element in elements {
        match element {
            TupleElement::Str(s) => write_str(&mut out, s),
            TupleElement::Pairs(pairs) => {
                out.write_u32::<LittleEndian>(pairs.len() as u32).unwrap();
                for (k, v) in pairs.iter() {
                    write_str(&mut out, k);
                    write_str(&mut out, v);
                }
            }
        }
    }
    out
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.write_u32::<LittleEndian>(s.len() as u32).unwrap();
    out.extend_from_slice(s.as_bytes());
}
