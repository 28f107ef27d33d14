use anchor_lang::prelude::*;

#[event]
pub struct ConfigSet {
    pub config_digest: [u8; 32],
    pub config_count: u32,
    pub f: u8,
    pub signers: Vec<[u8; 20]>,
    pub transmitters: Vec<Pubkey>,
    pub onchain_config: Vec<u8>,
    pub offchain_config_version: u64,
    pub offchain_config: Vec<u8>,
}

#[event]
pub struct RoundRequested {
    pub config_digest: [u8; 32],
    pub requester: Pubkey,
    pub epoch: u32,
    pub round: u8,
}

#[event]
pub struct Transmitted {
    pub round_id: u32,
    pub answer: i128,
    pub transmitter: Pubkey,
    pub observations_timestamp: u64,
    pub config_digest: [u8; 32],
    pub epoch_and_round: u64,
    pub observers: Vec<u8>,
    pub observations: Vec<i128>,
    pub juels_per_fee_coin: u128,
}
