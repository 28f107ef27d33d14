use anchor_lang::prelude::*;
use anchor_lang::solana_program::{keccak, secp256k1_recover::*};
use arrayref::array_refs;

use std::collections::BTreeSet;
use std::convert::TryInto;

use crate::state::{Config, SigningKey, DIGEST_SIZE};
use crate::ErrorCode;

/// 32 byte r, 32 byte s, 20 byte signer address
pub const SIGNATURE_LEN: usize = 32 + 32 + 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransmissionSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub signer: SigningKey,
}

impl TransmissionSignature {
    /// Decodes `[count: u8][r | s | signer]*count`. The declared count has to
    /// describe the buffer exactly.
    pub fn unpack_all(raw_signatures: &[u8]) -> Result<Vec<Self>> {
        let (count, raw_signatures) = raw_signatures
            .split_first()
            .ok_or(ErrorCode::InvalidInput)?;
        require!(
            raw_signatures.len() == usize::from(*count) * SIGNATURE_LEN,
            ErrorCode::InvalidInput
        );

        raw_signatures
            .chunks_exact(SIGNATURE_LEN)
            .map(|raw| -> Result<Self> {
                let raw: &[u8; SIGNATURE_LEN] =
                    raw.try_into().map_err(|_| ErrorCode::InvalidInput)?;
                #[allow(clippy::ptr_offset_with_cast)] // complains about arrayref internals
                let (r, s, signer) = array_refs![raw, 32, 32, 20];
                Ok(Self {
                    r: *r,
                    s: *s,
                    signer: SigningKey { key: *signer },
                })
            })
            .collect()
    }

    pub fn pack_all(signatures: &[Self]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(1 + signatures.len() * SIGNATURE_LEN);
        raw.push(signatures.len() as u8);
        for signature in signatures {
            raw.extend_from_slice(&signature.r);
            raw.extend_from_slice(&signature.s);
            raw.extend_from_slice(&signature.signer.key);
        }
        raw
    }

    /// Whether public key recovery over `hash` yields the claimed signer.
    pub fn is_valid(&self, hash: &[u8; DIGEST_SIZE]) -> bool {
        let mut signature = [0u8; SECP256K1_SIGNATURE_LENGTH];
        signature[..32].copy_from_slice(&self.r);
        signature[32..].copy_from_slice(&self.s);

        // the recovery id isn't transmitted, try both candidates for the R point
        (0..2).any(|recovery_id| match secp256k1_recover(hash, recovery_id, &signature) {
            // convert to a raw 20 byte Ethereum address
            Ok(pubkey) => keccak::hash(&pubkey.0).to_bytes()[12..] == self.signer.key,
            Err(_) => false,
        })
    }
}

/// Checks that exactly `f + 1` distinct members of `config` signed `hash`.
///
/// Returns the oracle indices of the signers. The order of `signatures` is
/// irrelevant.
pub fn verify(
    hash: &[u8; DIGEST_SIZE],
    signatures: &[TransmissionSignature],
    config: &Config,
) -> Result<BTreeSet<usize>> {
    require!(signatures.len() == usize::from(config.f) + 1, ErrorCode::WrongSignatureCount);

    // this fits MAX_ORACLES
    let mut uniques: u32 = 0;

    for signature in signatures {
        let index = config
            .signer_index(&signature.signer)
            .ok_or(ErrorCode::UnknownSigner)?;

        require!(signature.is_valid(hash), ErrorCode::InvalidSignature);

        require!(uniques & (1 << index) == 0, ErrorCode::DuplicateSigner);
        uniques |= 1 << index;
    }

    Ok((0..config.oracles.len())
        .filter(|index| uniques & (1 << index) != 0)
        .collect())
}
