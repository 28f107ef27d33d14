use anchor_lang::prelude::*;

use crate::report::Report;
use crate::state::DIGEST_SIZE;
use crate::ErrorCode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct Round {
    pub round_id: u32,
    pub answer: i128,
    /// Observations timestamp of the report that produced this round
    pub started_at: u64,
    /// Time at which the round was transmitted
    pub updated_at: u64,
    pub transmitter: Pubkey,
    pub config_digest: [u8; DIGEST_SIZE],
    pub epoch_and_round: u64,
}

/// Lower median, the middle element for odd lengths and the lower of the two
/// middle elements for even lengths.
pub fn median(observations: &[i128]) -> Option<i128> {
    if observations.is_empty() {
        return None;
    }
    let mut sorted = observations.to_vec();
    sorted.sort_unstable();
    Some(sorted[(sorted.len() - 1) / 2])
}

/// Sole owner of the round history.
///
/// Round ids are dense and start at 1, round `n` lives at `rounds[n - 1]`.
#[derive(Clone, Debug)]
pub struct RoundLedger {
    min_answer: i128,
    max_answer: i128,
    /// Digest of the configuration reports are accepted for
    config_digest: [u8; DIGEST_SIZE],
    /// Watermark of the active configuration, reset on every config change
    latest_epoch_and_round: u64,
    rounds: Vec<Round>,
}

impl RoundLedger {
    pub fn new(min_answer: i128, max_answer: i128) -> Result<Self> {
        require!(min_answer <= max_answer, ErrorCode::InvalidInput);
        Ok(Self {
            min_answer,
            max_answer,
            config_digest: [0u8; DIGEST_SIZE],
            latest_epoch_and_round: 0,
            rounds: Vec::new(),
        })
    }

    /// Starts a fresh monotonic sequence for a newly installed configuration.
    pub fn begin_config(&mut self, config_digest: [u8; DIGEST_SIZE]) {
        self.config_digest = config_digest;
        self.latest_epoch_and_round = 0;
    }

    pub fn accept(
        &mut self,
        epoch_and_round: u64,
        report: &Report,
        transmitter: Pubkey,
        config_digest: [u8; DIGEST_SIZE],
        timestamp: u64,
    ) -> Result<Round> {
        require!(self.config_digest == config_digest, ErrorCode::ConfigMismatch);
        // Either newer epoch, or same epoch but higher round
        require!(epoch_and_round > self.latest_epoch_and_round, ErrorCode::StaleReport);

        let answer = median(&report.observations).ok_or(ErrorCode::InvalidInput)?;
        require!(answer >= self.min_answer && answer <= self.max_answer, ErrorCode::OutOfBounds);

        let round_id = (self.rounds.len() as u32)
            .checked_add(1)
            .ok_or(ErrorCode::Overflow)?; // this should never occur, but let's check for it anyway

        let round = Round {
            round_id,
            answer,
            started_at: report.observations_timestamp,
            updated_at: timestamp,
            transmitter,
            config_digest,
            epoch_and_round,
        };
        self.latest_epoch_and_round = epoch_and_round;
        self.rounds.push(round);
        Ok(round)
    }

    pub fn latest_round(&self) -> Result<Round> {
        self.rounds
            .last()
            .copied()
            .ok_or_else(|| ErrorCode::NotFound.into())
    }

    pub fn round_at(&self, round_id: u32) -> Result<Round> {
        let index = round_id.checked_sub(1).ok_or(ErrorCode::NotFound)?;
        self.rounds
            .get(index as usize)
            .copied()
            .ok_or_else(|| ErrorCode::NotFound.into())
    }

    pub fn latest_round_id(&self) -> u32 {
        self.rounds.len() as u32
    }

    pub fn latest_epoch_and_round(&self) -> u64 {
        self.latest_epoch_and_round
    }

    pub fn config_digest(&self) -> &[u8; DIGEST_SIZE] {
        &self.config_digest
    }

    pub fn bounds(&self) -> (i128, i128) {
        (self.min_answer, self.max_answer)
    }
}
