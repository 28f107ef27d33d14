use anchor_lang::prelude::*;

use crate::felt::{Felt, FELT_SIZE};
use crate::state::{DIGEST_SIZE, MAX_ORACLES};
use crate::ErrorCode;

/// `[config_digest, epoch_and_round, extra_hash]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportContext {
    pub config_digest: Felt,
    /// 4 byte epoch followed by a 1 byte round, big-endian
    pub epoch_and_round: u64,
    pub extra_hash: Felt,
}

impl ReportContext {
    pub const LEN: usize = 3;

    pub fn new(
        config_digest: [u8; DIGEST_SIZE],
        epoch: u32,
        round: u8,
        extra_hash: Felt,
    ) -> Result<Self> {
        Ok(Self {
            config_digest: Felt::from_bytes_be(&config_digest)?,
            epoch_and_round: pack_epoch_and_round(epoch, round),
            extra_hash,
        })
    }

    pub fn epoch(&self) -> u32 {
        unpack_epoch_and_round(self.epoch_and_round).0
    }

    pub fn round(&self) -> u8 {
        unpack_epoch_and_round(self.epoch_and_round).1
    }

    /// Rejects an `epoch_and_round` wider than a 4 byte epoch and a 1 byte round.
    pub fn validate(&self) -> Result<()> {
        require!(self.epoch_and_round >> 40 == 0, ErrorCode::InvalidInput);
        Ok(())
    }

    pub fn unpack(raw: &[Felt]) -> Result<Self> {
        require!(raw.len() == Self::LEN, ErrorCode::InvalidInput);
        // 27 bytes of padding, 4 byte epoch, 1 byte round
        let context = Self {
            config_digest: raw[0],
            epoch_and_round: raw[1].to_u64()?,
            extra_hash: raw[2],
        };
        context.validate()?;
        Ok(context)
    }

    pub fn pack(&self) -> [Felt; Self::LEN] {
        [
            self.config_digest,
            Felt::from(self.epoch_and_round),
            self.extra_hash,
        ]
    }
}

pub fn pack_epoch_and_round(epoch: u32, round: u8) -> u64 {
    (u64::from(epoch) << 8) | u64::from(round)
}

pub fn unpack_epoch_and_round(epoch_and_round: u64) -> (u32, u8) {
    ((epoch_and_round >> 8) as u32, epoch_and_round as u8)
}

/// `[observations_timestamp, observers, observations_len, ...observations, juels_per_fee_coin]`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub observations_timestamp: u64,
    /// Oracle index of each observation, one byte per observer
    pub observers: Vec<u8>,
    pub observations: Vec<i128>,
    pub juels_per_fee_coin: u128,
}

impl Report {
    // everything except the observations themselves
    pub const MIN_LEN: usize = 4;

    pub fn unpack(raw: &[Felt]) -> Result<Self> {
        require!(raw.len() >= Self::MIN_LEN, ErrorCode::InvalidInput);

        let observations_timestamp = raw[0].to_u64()?;
        let observations_len = raw[2].to_u64()? as usize;
        require!(observations_len <= MAX_ORACLES, ErrorCode::InvalidInput);
        require!(raw.len() == Self::MIN_LEN + observations_len, ErrorCode::InvalidInput);

        // observers are right-aligned, so a leading index 0 survives the packing
        let packed = raw[1].to_bytes_be();
        let (padding, observers) = packed.split_at(FELT_SIZE - observations_len);
        require!(padding.iter().all(|byte| *byte == 0), ErrorCode::InvalidInput);

        let observations = raw[3..3 + observations_len]
            .iter()
            .map(Felt::to_i128)
            .collect::<Result<Vec<_>>>()?;
        let juels_per_fee_coin = raw[3 + observations_len].to_u128()?;

        Ok(Self {
            observations_timestamp,
            observers: observers.to_vec(),
            observations,
            juels_per_fee_coin,
        })
    }

    /// Fails when the observers can't be packed at the width of the observations.
    pub fn pack(&self) -> Result<Vec<Felt>> {
        let mut raw = Vec::with_capacity(Self::MIN_LEN + self.observations.len());
        raw.push(Felt::from(self.observations_timestamp));
        raw.push(self.packed_observers()?);
        raw.push(Felt::from(self.observations.len() as u64));
        raw.extend(self.observations.iter().copied().map(Felt::from_i128));
        raw.push(Felt::from(self.juels_per_fee_coin));
        Ok(raw)
    }

    fn packed_observers(&self) -> Result<Felt> {
        let len = self.observers.len();
        require!(len == self.observations.len(), ErrorCode::InvalidInput);
        require!(len <= MAX_ORACLES, ErrorCode::InvalidInput);
        // at most 31 bytes, so the top byte is zero and the value is canonical
        let mut packed = [0u8; FELT_SIZE];
        packed[FELT_SIZE - len..].copy_from_slice(&self.observers);
        Felt::from_bytes_be(&packed)
    }

    /// Bitset of the oracle indices that contributed an observation.
    pub fn observer_mask(&self) -> u32 {
        self.observers
            .iter()
            .filter(|index| usize::from(**index) < MAX_ORACLES)
            .fold(0u32, |mask, index| mask | 1u32 << index)
    }

    /// Checks the report against the shape of the oracle set it claims to come from.
    pub fn validate(&self, oracle_count: usize, f: u8) -> Result<()> {
        let observer_count = self.observers.len();
        require!(observer_count == self.observations.len(), ErrorCode::InvalidInput);
        require!(observer_count > usize::from(f), ErrorCode::InvalidInput);
        require!(observer_count <= oracle_count, ErrorCode::InvalidInput);
        let increasing = self.observers.windows(2).all(|pair| pair[0] < pair[1]);
        require!(increasing, ErrorCode::InvalidInput);
        let in_range = self.observers.iter().all(|index| usize::from(*index) < oracle_count);
        require!(in_range, ErrorCode::InvalidInput);
        Ok(())
    }
}

/// Hash signed by the oracles: the context felts followed by the report felts,
/// terminated by the element count.
pub fn digest(report_context: &ReportContext, report: &Report) -> Result<[u8; DIGEST_SIZE]> {
    use anchor_lang::solana_program::hash;

    report_context.validate()?;
    let raw_report = report.pack()?;
    let elements: Vec<[u8; FELT_SIZE]> = report_context
        .pack()
        .iter()
        .chain(raw_report.iter())
        .map(Felt::to_bytes_be)
        .collect();
    let len = (elements.len() as u64).to_be_bytes();

    let mut data: Vec<&[u8]> = Vec::with_capacity(elements.len() + 1);
    data.extend(elements.iter().map(|element| element.as_slice()));
    data.push(&len);
    Ok(hash::hashv(&data).to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ReportContext {
        let mut digest = [7u8; DIGEST_SIZE];
        digest[0] = 0x00;
        digest[1] = 0x03;
        ReportContext::new(digest, 1, 2, Felt::from(1u64)).unwrap()
    }

    fn report(observations: Vec<i128>) -> Report {
        Report {
            observations_timestamp: 1,
            observers: (0..observations.len() as u8).collect(),
            observations,
            juels_per_fee_coin: 1,
        }
    }

    #[test]
    fn epoch_and_round_packing() {
        let context = ReportContext::new([0u8; 32], 0x0102_0304, 5, Felt::ZERO).unwrap();
        assert_eq!(context.epoch_and_round, 0x01_0203_0405);
        assert_eq!(context.epoch(), 0x0102_0304);
        assert_eq!(context.round(), 5);
        assert_eq!(ReportContext::unpack(&context.pack()).unwrap(), context);

        let raw = [Felt::ZERO, Felt::from(1u64 << 40), Felt::ZERO];
        assert_eq!(
            ReportContext::unpack(&raw).unwrap_err(),
            ErrorCode::InvalidInput.into()
        );
        assert_eq!(
            ReportContext::unpack(&raw[..2]).unwrap_err(),
            ErrorCode::InvalidInput.into()
        );
    }

    #[test]
    fn layout() {
        let report = Report {
            observations_timestamp: 42,
            observers: vec![0, 1, 3],
            observations: vec![-1, 5, 99],
            juels_per_fee_coin: 7,
        };
        let raw = report.pack().unwrap();
        assert_eq!(raw.len(), 7);
        assert_eq!(raw[0], Felt::from(42u64));
        let mut observers = [0u8; 32];
        observers[29..].copy_from_slice(&[0, 1, 3]);
        assert_eq!(raw[1].to_bytes_be(), observers);
        assert_eq!(raw[2], Felt::from(3u64));
        assert_eq!(raw[3], Felt::from_i128(-1));
        assert_eq!(raw[6], Felt::from(7u128));

        // the leading index 0 is recovered from the declared count
        assert_eq!(Report::unpack(&raw).unwrap(), report);
        assert_eq!(report.observer_mask(), 0b1011);
    }

    #[test]
    fn malformed_reports() {
        let raw = report(vec![1, 2, 3, 4]).pack().unwrap();

        // truncated
        let err = Report::unpack(&raw[..raw.len() - 1]).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());
        let err = Report::unpack(&raw[..3]).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        // declared count disagrees with observers width
        let mut lying = raw.clone();
        lying[1] = Felt::from(0x01_00_01_02_03u64);
        let err = Report::unpack(&lying).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        // observation without a signed interpretation
        let mut unsigned = raw.clone();
        unsigned[3] = Felt::from(u128::MAX);
        let err = Report::unpack(&unsigned).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        // too many observations
        let mut oversized = raw;
        oversized[2] = Felt::from(32u64);
        let err = Report::unpack(&oversized).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());
    }

    #[test]
    fn oversized_epoch_and_round() {
        let mut context = context();
        context.epoch_and_round = (1 << 40) | 5;
        assert_eq!(context.validate().unwrap_err(), ErrorCode::InvalidInput.into());

        // unhashable, so no signature can ever be produced for it
        let err = digest(&context, &report(vec![1, 2])).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        context.epoch_and_round = pack_epoch_and_round(u32::MAX, u8::MAX);
        assert!(context.validate().is_ok());
        assert_eq!(unpack_epoch_and_round(context.epoch_and_round), (u32::MAX, u8::MAX));
    }

    #[test]
    fn unpackable_observers() {
        // observers and observations disagree
        let mut mismatched = report(vec![1, 2, 3]);
        mismatched.observers.pop();
        assert_eq!(mismatched.pack().unwrap_err(), ErrorCode::InvalidInput.into());
        let err = digest(&context(), &mismatched).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        // more observers than fit the field element
        let oversized = report(vec![1; 32]);
        assert_eq!(oversized.pack().unwrap_err(), ErrorCode::InvalidInput.into());

        let widest = report(vec![1; MAX_ORACLES]);
        assert_eq!(widest.pack().unwrap().len(), Report::MIN_LEN + MAX_ORACLES);
    }

    #[test]
    fn validation() {
        assert!(report(vec![1, 2, 3, 4]).validate(4, 1).is_ok());
        assert!(report(vec![1, 2]).validate(4, 1).is_ok());

        // not more than f observations
        let err = report(vec![1]).validate(4, 1).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        // more observers than oracles
        let err = report(vec![1, 2, 3, 4, 5]).validate(4, 1).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        let mut r = report(vec![1, 2, 3]);
        r.observers = vec![0, 2, 2];
        let err = r.validate(4, 1).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        r.observers = vec![2, 1, 0];
        let err = r.validate(4, 1).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        r.observers = vec![0, 1, 4];
        let err = r.validate(4, 1).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());

        r.observers = vec![0, 1];
        let err = r.validate(4, 1).unwrap_err();
        assert_eq!(err, ErrorCode::InvalidInput.into());
    }

    #[test]
    fn digest_is_deterministic_and_content_bound() {
        let context = context();
        let original = report(vec![99, 99, 99, 99]);
        let digest = digest(&context, &original).unwrap();

        let decoded = Report::unpack(&original.pack().unwrap()).unwrap();
        assert_eq!(super::digest(&context, &decoded).unwrap(), digest);

        let mut changed = original.clone();
        changed.observations[2] = 98;
        assert_ne!(super::digest(&context, &changed).unwrap(), digest);

        let mut later = context;
        later.epoch_and_round += 1;
        assert_ne!(super::digest(&later, &original).unwrap(), digest);

        let mut observers = original.clone();
        observers.observers = vec![0, 1, 2, 4];
        assert_ne!(super::digest(&context, &observers).unwrap(), digest);
    }
}
