//! Caller contexts for the aggregator entrypoints.
//!
//! Each context carries the identity authenticated by the transaction layer
//! plus whatever the environment contributes (slot, clock). The aggregator
//! trusts these values as given.

use anchor_lang::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Initialize {
    /// Address of the aggregator itself, bound into every config digest
    pub feed: Pubkey,
    pub owner: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetConfig {
    pub authority: Pubkey,
    pub slot: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transmit {
    /// Transmitter, signing the current transaction call
    pub transmitter: Pubkey,
    pub unix_timestamp: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestNewRound {
    pub authority: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferOwnership {
    pub authority: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptOwnership {
    pub authority: Pubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetAccessController {
    pub authority: Pubkey,
}
