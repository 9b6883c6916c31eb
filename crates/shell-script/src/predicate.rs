use serde::{Deserialize, Serialize};

use shell_core::error::ShellError;
use shell_core::types::{Hash256, Timestamp};
use shell_crypto::hash::sha256;

/// Maximum nesting depth of combinator predicates. Anything deeper is a
/// hostile blob, not a real escrow condition.
const MAX_PREDICATE_DEPTH: usize = 16;

const TAG_UNCONDITIONAL: u8 = 0x00;
const TAG_AFTER_TIME: u8 = 0x01;
const TAG_BEFORE_TIME: u8 = 0x02;
const TAG_HASH_PREIMAGE: u8 = 0x03;
const TAG_AND: u8 = 0x04;
const TAG_OR: u8 = 0x05;
const TAG_NOT: u8 = 0x06;

/// A claim predicate guarding one claimant of a claimable balance.
///
/// Time predicates compare against the timestamp supplied at evaluation,
/// never the system clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Unconditional,
    AfterTime(Timestamp),
    BeforeTime(Timestamp),
    HashPreimage(Hash256),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Evaluate against a claim proof and the evaluation timestamp.
    /// Combinators short-circuit.
    pub fn evaluate(&self, proof: &[u8], now: Timestamp) -> bool {
        match self {
            Predicate::Unconditional => true,
            Predicate::AfterTime(t) => now >= *t,
            Predicate::BeforeTime(t) => now < *t,
            Predicate::HashPreimage(h) => sha256(proof) == *h.as_bytes(),
            Predicate::And(a, b) => a.evaluate(proof, now) && b.evaluate(proof, now),
            Predicate::Or(a, b) => a.evaluate(proof, now) || b.evaluate(proof, now),
            Predicate::Not(p) => !p.evaluate(proof, now),
        }
    }

    /// Canonical blob encoding used inside claimable-create witnesses.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Predicate::Unconditional => buf.push(TAG_UNCONDITIONAL),
            Predicate::AfterTime(t) => {
                buf.push(TAG_AFTER_TIME);
                buf.extend_from_slice(&t.to_le_bytes());
            }
            Predicate::BeforeTime(t) => {
                buf.push(TAG_BEFORE_TIME);
                buf.extend_from_slice(&t.to_le_bytes());
            }
            Predicate::HashPreimage(h) => {
                buf.push(TAG_HASH_PREIMAGE);
                buf.extend_from_slice(h.as_bytes());
            }
            Predicate::And(a, b) => {
                buf.push(TAG_AND);
                a.encode_into(buf);
                b.encode_into(buf);
            }
            Predicate::Or(a, b) => {
                buf.push(TAG_OR);
                a.encode_into(buf);
                b.encode_into(buf);
            }
            Predicate::Not(p) => {
                buf.push(TAG_NOT);
                p.encode_into(buf);
            }
        }
    }

    /// Decode a predicate blob; the whole blob must be consumed.
    pub fn decode(blob: &[u8]) -> Result<Self, ShellError> {
        let (predicate, consumed) = Self::decode_at(blob, 0)?;
        if consumed != blob.len() {
            return Err(ShellError::InvalidScript(
                "trailing bytes after predicate".into(),
            ));
        }
        Ok(predicate)
    }

    fn decode_at(blob: &[u8], depth: usize) -> Result<(Self, usize), ShellError> {
        if depth > MAX_PREDICATE_DEPTH {
            return Err(ShellError::InvalidScript("predicate nested too deep".into()));
        }
        let tag = *blob
            .first()
            .ok_or_else(|| ShellError::InvalidScript("empty predicate".into()))?;
        let rest = &blob[1..];

        let read_i64 = |bytes: &[u8]| -> Result<i64, ShellError> {
            let arr: [u8; 8] = bytes
                .get(..8)
                .ok_or_else(|| ShellError::InvalidScript("truncated predicate".into()))?
                .try_into()
                .expect("slice length checked");
            Ok(i64::from_le_bytes(arr))
        };

        match tag {
            TAG_UNCONDITIONAL => Ok((Predicate::Unconditional, 1)),
            TAG_AFTER_TIME => Ok((Predicate::AfterTime(read_i64(rest)?), 9)),
            TAG_BEFORE_TIME => Ok((Predicate::BeforeTime(read_i64(rest)?), 9)),
            TAG_HASH_PREIMAGE => {
                let bytes: [u8; 32] = rest
                    .get(..32)
                    .ok_or_else(|| ShellError::InvalidScript("truncated predicate".into()))?
                    .try_into()
                    .expect("slice length checked");
                Ok((Predicate::HashPreimage(Hash256::from_bytes(bytes)), 33))
            }
            TAG_AND | TAG_OR => {
                let (a, used_a) = Self::decode_at(rest, depth + 1)?;
                let (b, used_b) = Self::decode_at(&rest[used_a..], depth + 1)?;
                let combined = if tag == TAG_AND {
                    Predicate::And(Box::new(a), Box::new(b))
                } else {
                    Predicate::Or(Box::new(a), Box::new(b))
                };
                Ok((combined, 1 + used_a + used_b))
            }
            TAG_NOT => {
                let (p, used) = Self::decode_at(rest, depth + 1)?;
                Ok((Predicate::Not(Box::new(p)), 1 + used))
            }
            other => Err(ShellError::InvalidScript(format!(
                "unknown predicate tag {other:#04x}"
            ))),
        }
    }
}
