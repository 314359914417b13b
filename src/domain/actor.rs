use super::error::WalletError;

pub type AccountId = u64;

/// Account that platform commissions and fees are credited to.
pub const PLATFORM_ACCOUNT: AccountId = 0;

/// Identity handed in by the enclosing application's auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: AccountId,
    pub is_admin: bool,
}

/// Capability token proving the holder passed an admin check.
///
/// Settlement decisions take this by reference instead of re-reading
/// ambient session state; it can only be obtained through [`verify`].
///
/// [`verify`]: AdminActor::verify
#[derive(Debug, Clone, Copy)]
pub struct AdminActor {
    id: AccountId,
}

impl AdminActor {
    pub fn verify(actor: Actor) -> Result<Self, WalletError> {
        if actor.is_admin {
            Ok(Self { id: actor.id })
        } else {
            Err(WalletError::Forbidden)
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }
}
