//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use admitflow_auth::{InMemoryRateLimitStore, PrincipalResolver, RateLimitStore, RateLimiter};
use admitflow_engine::Crm;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
pub struct GatewayState<C, R>
where
    C: Crm,
    R: PrincipalResolver,
{
    /// The CRM core.
    pub crm: Arc<C>,
    /// Turns bearer tokens into principals.
    pub resolver: Arc<R>,
    /// Per-principal request limiter.
    pub rate_limiter: RateLimiter,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<C, R> GatewayState<C, R>
where
    C: Crm,
    R: PrincipalResolver,
{
    /// Create a gateway state that counts requests in process memory.
    #[must_use]
    pub fn new(crm: Arc<C>, resolver: Arc<R>, config: GatewayConfig) -> Self {
        Self::with_rate_limit_store(crm, resolver, config, Arc::new(InMemoryRateLimitStore::new()))
    }

    /// Create a gateway state over an external rate-limit counter store.
    #[must_use]
    pub fn with_rate_limit_store(
        crm: Arc<C>,
        resolver: Arc<R>,
        config: GatewayConfig,
        counters: Arc<dyn RateLimitStore>,
    ) -> Self {
        let rate_limiter = RateLimiter::per_minute(counters, config.rate_limit_per_minute);
        Self {
            crm,
            resolver,
            rate_limiter,
            config,
        }
    }
}

impl<C, R> Clone for GatewayState<C, R>
where
    C: Crm,
    R: PrincipalResolver,
{
    fn clone(&self) -> Self {
        Self {
            crm: Arc::clone(&self.crm),
            resolver: Arc::clone(&self.resolver),
            rate_limiter: self.rate_limiter.clone(),
            config: self.config.clone(),
        }
    }
}
