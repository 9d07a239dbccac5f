use chrono::{DateTime, Utc};
use trellis_types::CachePolicy;

use crate::base::RequestKind;
use crate::error::UsageError;

/// Cache metadata stamped on a read result by the connector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheState {
    policy: Option<CachePolicy>,
    time_loaded: Option<DateTime<Utc>>,
}

/// A read-only request whose results may be cached.
pub trait CacheableRequest: RequestKind {
    fn cache_state(&self) -> &CacheState;

    fn cache_state_mut(&mut self) -> &mut CacheState;

    fn cache_policy(&self) -> Option<CachePolicy> {
        self.cache_state().policy
    }

    fn time_loaded(&self) -> Option<DateTime<Utc>> {
        self.cache_state().time_loaded
    }

    fn set_cache_policy(&mut self, policy: CachePolicy) -> Result<(), UsageError> {
        self.state().check_not_frozen()?;
        self.cache_state_mut().policy = Some(policy);
        Ok(())
    }

    fn set_time_loaded(&mut self, loaded: DateTime<Utc>) -> Result<(), UsageError> {
        self.state().check_not_frozen()?;
        self.cache_state_mut().time_loaded = Some(loaded);
        Ok(())
    }

    /// Returns `true` once the cached result has outlived its policy.
    ///
    /// Results without a policy or load time never expire.
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match (self.cache_policy(), self.time_loaded()) {
            (Some(policy), Some(loaded)) => policy.is_expired(loaded, now),
            _ => false,
        }
    }
}

macro_rules! impl_cacheable {
    ($ty:ty) => {
        impl $crate::cache::CacheableRequest for $ty {
            fn cache_state(&self) -> &$crate::cache::CacheState {
                &self.cache
            }

            fn cache_state_mut(&mut self) -> &mut $crate::cache::CacheState {
                &mut self.cache
            }
        }
    };
}

pub(crate) use impl_cacheable;
