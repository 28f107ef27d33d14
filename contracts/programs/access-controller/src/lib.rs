use anchor_lang::prelude::*;
use static_assertions::const_assert;

pub const MAX_ADDRS: usize = 64;
const_assert!(MAX_ADDRS <= u8::MAX as usize);

/// A capability check answering whether `address` may call a gated entrypoint.
///
/// The aggregator never embeds a policy of its own, it asks an injected
/// implementation of this trait.
pub trait AccessControl {
    fn has_access(&self, address: &Pubkey) -> bool;
}

impl<F> AccessControl for F
where
    F: Fn(&Pubkey) -> bool,
{
    fn has_access(&self, address: &Pubkey) -> bool {
        self(address)
    }
}

/// Grants access to nobody. Entrypoints gated by it stay owner-only.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAccess;

impl AccessControl for NoAccess {
    fn has_access(&self, _address: &Pubkey) -> bool {
        false
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct AccessController {
    pub owner: Pubkey,
    pub proposed_owner: Pubkey,
    // kept sorted so lookups can binary search
    access_list: Vec<Pubkey>,
}

impl AccessController {
    pub fn initialize(owner: Pubkey) -> Self {
        Self {
            owner,
            proposed_owner: Pubkey::default(),
            access_list: Vec::with_capacity(MAX_ADDRS),
        }
    }

    pub fn transfer_ownership(&mut self, authority: &Pubkey, proposed_owner: Pubkey) -> Result<()> {
        self.only_owner(authority)?;
        require!(proposed_owner != Pubkey::default(), ErrorCode::InvalidInput);
        self.proposed_owner = proposed_owner;
        Ok(())
    }

    pub fn accept_ownership(&mut self, authority: &Pubkey) -> Result<()> {
        require!(
            self.proposed_owner != Pubkey::default() && authority == &self.proposed_owner,
            ErrorCode::Unauthorized
        );
        self.owner = std::mem::take(&mut self.proposed_owner);
        Ok(())
    }

    pub fn add_access(&mut self, authority: &Pubkey, address: Pubkey) -> Result<()> {
        self.only_owner(authority)?;

        match self.access_list.binary_search(&address) {
            // already present
            Ok(_i) => (),
            // not found, insert
            Err(i) => {
                require!(self.access_list.len() < MAX_ADDRS, ErrorCode::Full);
                self.access_list.insert(i, address);
                msg!("access granted to {}", address);
            }
        }
        Ok(())
    }

    pub fn remove_access(&mut self, authority: &Pubkey, address: &Pubkey) -> Result<()> {
        self.only_owner(authority)?;

        if let Ok(index) = self.access_list.binary_search(address) {
            // the list is still sorted after a removal
            self.access_list.remove(index);
            msg!("access revoked from {}", address);
        }
        Ok(())
    }

    pub fn access_list(&self) -> &[Pubkey] {
        &self.access_list
    }

    fn only_owner(&self, authority: &Pubkey) -> Result<()> {
        require!(authority == &self.owner, ErrorCode::Unauthorized);
        Ok(())
    }
}

impl AccessControl for AccessController {
    /// Check if `address` is on the access control list.
    fn has_access(&self, address: &Pubkey) -> bool {
        self.access_list.binary_search(address).is_ok()
    }
}

#[error_code]
pub enum ErrorCode {
    #[msg("Unauthorized")]
    Unauthorized = 0,

    #[msg("Invalid input")]
    InvalidInput = 1,

    #[msg("Access list is full")]
    Full = 2,
}
