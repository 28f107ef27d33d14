use anchor_lang::prelude::*;
use static_assertions::assert_impl_all;

pub mod context;
pub mod event;
pub mod felt;
pub mod ledger;
pub mod report;
pub mod signature;
pub mod state;

pub use crate::context::*;
pub use crate::felt::Felt;
pub use crate::ledger::{median, Round, RoundLedger};
pub use crate::report::{Report, ReportContext};
pub use crate::signature::TransmissionSignature;
pub use crate::state::{
    AggregatorConfig, Config, ConfigRegistry, NewOracle, Oracle, SigningKey, DIGEST_SIZE,
    MAX_DESCRIPTION_LEN, MAX_ORACLES,
};

use access_controller::AccessControl;

pub const VERSION: u8 = 1;

pub type DynAccessControl = Box<dyn AccessControl + Send + Sync>;

/// An OCR2 aggregator: one oracle set at a time, one median answer per accepted report.
///
/// Every entrypoint either commits in full or fails without touching state.
pub struct Aggregator {
    owner: Pubkey,
    proposed_owner: Pubkey,

    /// Raw UTF-8 byte string
    description: [u8; MAX_DESCRIPTION_LEN],
    decimals: u8,

    registry: ConfigRegistry,
    ledger: RoundLedger,

    /// Access controller managing access to `set_config`
    governance_access_controller: DynAccessControl,
    /// Access controller managing access to `request_new_round`
    requester_access_controller: DynAccessControl,
}

assert_impl_all!(Aggregator: Send, Sync);

impl Aggregator {
    pub fn initialize(
        ctx: &Initialize,
        config: AggregatorConfig,
        governance_access_controller: DynAccessControl,
        requester_access_controller: DynAccessControl,
    ) -> Result<Self> {
        let raw_description = config.description.as_bytes();
        require!(raw_description.len() <= MAX_DESCRIPTION_LEN, ErrorCode::InvalidInput);
        let mut description = [0u8; MAX_DESCRIPTION_LEN];
        description[..raw_description.len()].copy_from_slice(raw_description);

        let ledger = RoundLedger::new(config.min_answer, config.max_answer)?;

        msg!(
            "initialized aggregator {} ({}), answers in [{}, {}]",
            ctx.feed,
            config.description,
            config.min_answer,
            config.max_answer
        );

        Ok(Self {
            owner: ctx.owner,
            proposed_owner: Pubkey::default(),
            description,
            decimals: config.decimals,
            registry: ConfigRegistry::new(ctx.feed),
            ledger,
            governance_access_controller,
            requester_access_controller,
        })
    }

    pub fn transfer_ownership(
        &mut self,
        ctx: &TransferOwnership,
        proposed_owner: Pubkey,
    ) -> Result<()> {
        self.only_owner(&ctx.authority)?;
        require!(proposed_owner != Pubkey::default(), ErrorCode::InvalidInput);
        self.proposed_owner = proposed_owner;
        Ok(())
    }

    pub fn accept_ownership(&mut self, ctx: &AcceptOwnership) -> Result<()> {
        require!(
            self.proposed_owner != Pubkey::default() && ctx.authority == self.proposed_owner,
            ErrorCode::Unauthorized
        );
        self.owner = std::mem::take(&mut self.proposed_owner);
        Ok(())
    }

    pub fn set_governance_access_controller(
        &mut self,
        ctx: &SetAccessController,
        access_controller: DynAccessControl,
    ) -> Result<()> {
        self.only_owner(&ctx.authority)?;
        self.governance_access_controller = access_controller;
        Ok(())
    }

    pub fn set_requester_access_controller(
        &mut self,
        ctx: &SetAccessController,
        access_controller: DynAccessControl,
    ) -> Result<()> {
        self.only_owner(&ctx.authority)?;
        self.requester_access_controller = access_controller;
        Ok(())
    }

    /// Installs a new oracle set and returns its config digest.
    ///
    /// Resets the epoch and round watermark, reports for the previous set are
    /// rejected from here on.
    pub fn set_config(
        &mut self,
        ctx: &SetConfig,
        new_oracles: Vec<NewOracle>,
        f: u8,
        onchain_config: Vec<u8>,
        offchain_config_version: u64,
        offchain_config: Vec<u8>,
    ) -> Result<[u8; DIGEST_SIZE]> {
        let is_owner = ctx.authority == self.owner;
        require!(
            is_owner || self.governance_access_controller.has_access(&ctx.authority),
            ErrorCode::Unauthorized
        );

        let config = self.registry.set_config(
            new_oracles,
            f,
            onchain_config,
            offchain_config_version,
            offchain_config,
            ctx.slot,
        )?;
        self.ledger.begin_config(config.config_digest);

        msg!(
            "config {} set: {} oracles, f = {}",
            config.config_count,
            config.oracles.len(),
            config.f
        );
        emit!(event::ConfigSet {
            config_digest: config.config_digest,
            config_count: config.config_count,
            f: config.f,
            signers: config.signers(),
            transmitters: config.transmitters(),
            onchain_config: config.onchain_config.clone(),
            offchain_config_version: config.offchain_config_version,
            offchain_config: config.offchain_config.clone(),
        });

        Ok(config.config_digest)
    }

    /// Decodes raw calldata and transmits it, see [`Aggregator::transmit`].
    pub fn transmit_raw(
        &mut self,
        ctx: &Transmit,
        raw_report_context: &[Felt],
        raw_report: &[Felt],
        raw_signatures: &[u8],
    ) -> Result<Round> {
        // unauthorized callers don't get to learn anything about their calldata
        require!(self.registry.is_transmitter(&ctx.transmitter).is_some(), ErrorCode::Unauthorized);

        let report_context = ReportContext::unpack(raw_report_context)?;
        let report = Report::unpack(raw_report)?;
        let signatures = TransmissionSignature::unpack_all(raw_signatures)?;

        self.transmit(ctx, &report_context, &report, &signatures)
    }

    /// Verifies a signed report against the current oracle set and records its median.
    pub fn transmit(
        &mut self,
        ctx: &Transmit,
        report_context: &ReportContext,
        report: &Report,
        signatures: &[TransmissionSignature],
    ) -> Result<Round> {
        // validate transmitter, the signatures are checked against the signing keys instead
        let oracle_idx = self
            .registry
            .is_transmitter(&ctx.transmitter)
            .ok_or(ErrorCode::Unauthorized)?;
        let config = self
            .registry
            .current_config()
            .ok_or(ErrorCode::Unauthorized)?;

        let config_digest = report_context.config_digest.to_bytes_be();
        require!(config.config_digest == config_digest, ErrorCode::ConfigMismatch);

        report_context.validate()?;
        report.validate(config.oracles.len(), config.f)?;

        let hash = report::digest(report_context, report)?;
        let signers = signature::verify(&hash, signatures, config)?;

        let round = self.ledger.accept(
            report_context.epoch_and_round,
            report,
            ctx.transmitter,
            config_digest,
            ctx.unix_timestamp,
        )?;

        msg!(
            "round {} transmitted by oracle {}: answer {}, {} observations, {} signers",
            round.round_id,
            oracle_idx,
            round.answer,
            report.observations.len(),
            signers.len()
        );
        emit!(event::Transmitted {
            round_id: round.round_id,
            answer: round.answer,
            transmitter: ctx.transmitter,
            observations_timestamp: report.observations_timestamp,
            config_digest,
            epoch_and_round: report_context.epoch_and_round,
            observers: report.observers.clone(),
            observations: report.observations.clone(),
            juels_per_fee_coin: report.juels_per_fee_coin,
        });

        Ok(round)
    }

    pub fn request_new_round(&self, ctx: &RequestNewRound) -> Result<()> {
        let is_owner = ctx.authority == self.owner;
        require!(
            is_owner || self.requester_access_controller.has_access(&ctx.authority),
            ErrorCode::Unauthorized
        );

        let (epoch, round) = report::unpack_epoch_and_round(self.ledger.latest_epoch_and_round());

        msg!("round requested by {} after epoch {} round {}", ctx.authority, epoch, round);
        // NOTE: can't really return round_id + 1, assume it on the client side
        emit!(event::RoundRequested {
            config_digest: *self.ledger.config_digest(),
            requester: ctx.authority,
            epoch,
            round,
        });
        Ok(())
    }

    pub fn latest_round(&self) -> Result<Round> {
        self.ledger.latest_round()
    }

    pub fn round_at(&self, round_id: u32) -> Result<Round> {
        self.ledger.round_at(round_id)
    }

    pub fn current_config(&self) -> Option<&Config> {
        self.registry.current_config()
    }

    pub fn is_transmitter(&self, address: &Pubkey) -> Option<usize> {
        self.registry.is_transmitter(address)
    }

    pub fn is_signer(&self, key: &SigningKey) -> Option<usize> {
        self.registry.is_signer(key)
    }

    pub fn owner(&self) -> &Pubkey {
        &self.owner
    }

    pub fn feed(&self) -> &Pubkey {
        self.registry.contract_address()
    }

    fn only_owner(&self, authority: &Pubkey) -> Result<()> {
        require!(authority == &self.owner, ErrorCode::Unauthorized);
        Ok(())
    }
}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Too many oracles")]
    TooManyOracles = 2,

    #[msg("Stale report")]
    StaleReport = 3,

    #[msg("Config digest mismatch")]
    ConfigMismatch = 4,

    #[msg("Wrong number of signatures")]
    WrongSignatureCount = 5,

    #[msg("Overflow")]
    Overflow = 6,

    #[msg("Median out of bounds")]
    OutOfBounds = 7,

    #[msg("Duplicate signer")]
    DuplicateSigner,

    #[msg("Duplicate oracle signer or transmitter")]
    DuplicateOracle,

    #[msg("Oracle count must be at least 3f + 1 with f > 0")]
    InvalidOracleCount,

    #[msg("Invalid signature")]
    InvalidSignature,

    #[msg("Oracle signer key not found")]
    UnknownSigner,

    #[msg("Round not found")]
    NotFound,
}

impl ErrorCode {
    /// Whether resubmitting with fresher data can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::StaleReport | ErrorCode::ConfigMismatch)
    }
}

pub mod query {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
    pub struct LatestConfig {
        pub config_count: u32,
        pub config_digest: [u8; DIGEST_SIZE],
        pub block_number: u64,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
    pub struct LatestTransmission {
        pub config_digest: [u8; DIGEST_SIZE],
        pub epoch: u32,
        pub round: u8,
        pub latest_answer: i128,
        pub latest_timestamp: u64,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
    pub struct RoundData {
        pub round_id: u32,
        pub answer: i128,
        pub started_at: u64,
        pub updated_at: u64,
    }

    impl From<Round> for RoundData {
        fn from(round: Round) -> Self {
            Self {
                round_id: round.round_id,
                answer: round.answer,
                started_at: round.started_at,
                updated_at: round.updated_at,
            }
        }
    }

    /// Zeroed until the first configuration is installed.
    pub fn latest_config_details(aggregator: &Aggregator) -> LatestConfig {
        aggregator
            .current_config()
            .map(|config| LatestConfig {
                config_count: config.config_count,
                config_digest: config.config_digest,
                block_number: config.block_number,
            })
            .unwrap_or_default()
    }

    // Epoch and round are those of the current configuration, the answer is the
    // latest one regardless of which configuration produced it.
    pub fn latest_transmission_details(aggregator: &Aggregator) -> LatestTransmission {
        let (epoch, round) =
            report::unpack_epoch_and_round(aggregator.ledger.latest_epoch_and_round());
        let latest = aggregator.latest_round().ok();
        LatestTransmission {
            config_digest: *aggregator.ledger.config_digest(),
            epoch,
            round,
            latest_answer: latest.map_or(0, |round| round.answer),
            latest_timestamp: latest.map_or(0, |round| round.updated_at),
        }
    }

    pub fn latest_round_data(aggregator: &Aggregator) -> Result<RoundData> {
        aggregator.latest_round().map(RoundData::from)
    }

    pub fn round_data(aggregator: &Aggregator, round_id: u32) -> Result<RoundData> {
        aggregator.round_at(round_id).map(RoundData::from)
    }

    pub fn description(aggregator: &Aggregator) -> String {
        let len = aggregator
            .description
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(MAX_DESCRIPTION_LEN);
        String::from_utf8_lossy(&aggregator.description[..len]).into_owned()
    }

    pub fn decimals(aggregator: &Aggregator) -> u8 {
        aggregator.decimals
    }

    pub fn bounds(aggregator: &Aggregator) -> (i128, i128) {
        aggregator.ledger.bounds()
    }

    pub fn version() -> u8 {
        VERSION
    }
}
