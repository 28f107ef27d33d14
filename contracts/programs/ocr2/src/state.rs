use anchor_lang::prelude::*;
use static_assertions::const_assert;

use std::collections::BTreeSet;

use crate::ErrorCode;

pub const MAX_ORACLES: usize = 31;
// OCR2 is designed for a maximum of 31 oracles, and there are various assumptions made around
// this value. Observer indices are packed one byte each into a single field element and signers
// into a u32 bitmask.
const_assert!(MAX_ORACLES <= 31);

pub const DIGEST_SIZE: usize = 32;
pub const MAX_OFFCHAIN_CONFIG_LEN: usize = 4096;
pub const MAX_DESCRIPTION_LEN: usize = 32;

/// Construction-time parameters of an aggregator. Immutable once initialized.
#[derive(Clone, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct AggregatorConfig {
    pub min_answer: i128,
    pub max_answer: i128,
    pub decimals: u8,
    /// Human readable feed name, at most 32 bytes of UTF-8.
    pub description: String,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AnchorSerialize,
    AnchorDeserialize,
)]
pub struct SigningKey {
    /// Raw 20 byte secp256k1 address, `keccak256(pubkey)[12..]`
    pub key: [u8; 20],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct NewOracle {
    pub signer: [u8; 20],
    pub transmitter: Pubkey,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Oracle {
    /// secp256k1 signing key for reports
    pub signer: SigningKey,
    /// Address allowed to submit transmissions on behalf of this oracle
    pub transmitter: Pubkey,
}

/// An installed oracle set. Never mutated after installation, only replaced.
#[derive(Clone, Debug, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Config {
    pub oracles: Vec<Oracle>,
    pub f: u8,
    pub onchain_config: Vec<u8>,
    pub offchain_config_version: u64,
    pub offchain_config: Vec<u8>,
    pub config_count: u32,
    pub config_digest: [u8; DIGEST_SIZE],
    /// Slot in which this configuration was installed.
    pub block_number: u64,
}

impl Config {
    pub fn config_digest_from_data(&self, contract_address: &Pubkey) -> [u8; DIGEST_SIZE] {
        // NOTE: keccak256 is also available, but SHA256 is faster
        use anchor_lang::solana_program::hash;
        // NOTE: calling hash::hashv is orders of magnitude cheaper than using Hasher::hashv
        let mut data: Vec<&[u8]> = Vec::with_capacity(9 + 2 * self.oracles.len());
        let addr = contract_address.to_bytes();
        data.push(&addr);
        let count = self.config_count.to_be_bytes();
        data.push(&count);
        let n = [self.oracles.len() as u8]; // safe because it will always fit in MAX_ORACLES
        data.push(&n);
        for oracle in &self.oracles {
            data.push(&oracle.signer.key);
        }
        for oracle in &self.oracles {
            data.push(oracle.transmitter.as_ref());
        }
        let f = [self.f];
        data.push(&f);
        let onchain_config_len = (self.onchain_config.len() as u32).to_be_bytes();
        data.push(&onchain_config_len);
        data.push(&self.onchain_config);
        let offchain_version = self.offchain_config_version.to_be_bytes();
        data.push(&offchain_version);
        let offchain_config_len = (self.offchain_config.len() as u32).to_be_bytes();
        data.push(&offchain_config_len);
        data.push(&self.offchain_config);
        let result = hash::hashv(&data);

        let mut result: [u8; DIGEST_SIZE] = result.to_bytes();
        // prefix masking, which also keeps the digest below the field modulus
        result[0] = 0x00;
        result[1] = 0x03;
        result
    }

    pub fn transmitter_index(&self, address: &Pubkey) -> Option<usize> {
        self.oracles
            .iter()
            .position(|oracle| &oracle.transmitter == address)
    }

    pub fn signer_index(&self, key: &SigningKey) -> Option<usize> {
        self.oracles.iter().position(|oracle| &oracle.signer == key)
    }

    pub fn signers(&self) -> Vec<[u8; 20]> {
        self.oracles.iter().map(|oracle| oracle.signer.key).collect()
    }

    pub fn transmitters(&self) -> Vec<Pubkey> {
        self.oracles.iter().map(|oracle| oracle.transmitter).collect()
    }
}

/// Sole owner of the current oracle set.
#[derive(Clone, Debug, Default)]
pub struct ConfigRegistry {
    contract_address: Pubkey,
    config_count: u32,
    current: Option<Config>,
}

impl ConfigRegistry {
    pub fn new(contract_address: Pubkey) -> Self {
        Self {
            contract_address,
            config_count: 0,
            current: None,
        }
    }

    /// Validates and installs a new oracle set, replacing the current one in full.
    ///
    /// Nothing is written unless every check passes.
    pub fn set_config(
        &mut self,
        new_oracles: Vec<NewOracle>,
        f: u8,
        onchain_config: Vec<u8>,
        offchain_config_version: u64,
        offchain_config: Vec<u8>,
        block_number: u64,
    ) -> Result<&Config> {
        let len = new_oracles.len();
        require!(f != 0, ErrorCode::InvalidOracleCount);
        require!(len <= MAX_ORACLES, ErrorCode::TooManyOracles);
        require!(3 * usize::from(f) < len, ErrorCode::InvalidOracleCount);
        require!(offchain_config_version != 0, ErrorCode::InvalidInput);
        require!(offchain_config.len() <= MAX_OFFCHAIN_CONFIG_LEN, ErrorCode::InvalidInput);

        let mut signers = BTreeSet::new();
        let mut transmitters = BTreeSet::new();
        for oracle in &new_oracles {
            let inserted = signers.insert(oracle.signer);
            require!(inserted, ErrorCode::DuplicateOracle);
            let inserted = transmitters.insert(oracle.transmitter);
            require!(inserted, ErrorCode::DuplicateOracle);
        }

        let config_count = self
            .config_count
            .checked_add(1)
            .ok_or(ErrorCode::Overflow)?;

        let mut config = Config {
            oracles: new_oracles
                .into_iter()
                .map(|oracle| Oracle {
                    signer: SigningKey { key: oracle.signer },
                    transmitter: oracle.transmitter,
                })
                .collect(),
            f,
            onchain_config,
            offchain_config_version,
            offchain_config,
            config_count,
            config_digest: [0u8; DIGEST_SIZE],
            block_number,
        };
        config.config_digest = config.config_digest_from_data(&self.contract_address);

        self.config_count = config_count;
        Ok(self.current.insert(config))
    }

    pub fn current_config(&self) -> Option<&Config> {
        self.current.as_ref()
    }

    pub fn config_count(&self) -> u32 {
        self.config_count
    }

    pub fn contract_address(&self) -> &Pubkey {
        &self.contract_address
    }

    pub fn is_transmitter(&self, address: &Pubkey) -> Option<usize> {
        self.current.as_ref()?.transmitter_index(address)
    }

    pub fn is_signer(&self, key: &SigningKey) -> Option<usize> {
        self.current.as_ref()?.signer_index(key)
    }
}
