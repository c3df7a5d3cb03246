use std::{net::IpAddr, time::Duration};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use check_if_email_exists::syntax::check_syntax;
use trust_dns_resolver::{
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    TokioAsyncResolver,
};

use crate::{
    configuration::VerificationSettings,
    domain::lead::{is_unknown, VerificationOutcome},
};

/// Classifies an email address. Never fails: lookup problems become `Risky`.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn verify(&self, email: &str) -> VerificationOutcome;
}

#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn mx_record_count(&self, domain: &str) -> anyhow::Result<usize>;
}

pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsMxResolver {
    pub fn new(settings: &VerificationSettings) -> anyhow::Result<Self> {
        let servers: Vec<IpAddr> = settings
            .dns_servers
            .iter()
            .filter_map(|server| match server.parse() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    log::warn!("Ignoring invalid DNS server address: {}", server);
                    None
                }
            })
            .collect();
        if servers.is_empty() {
            bail!("No valid DNS server configured for MX lookups");
        }

        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(&servers, 53, true),
        );
        let mut opts = ResolverOpts::default();
        opts.timeout = settings.dns_timeout();
        opts.attempts = 1;

        Ok(DnsMxResolver {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout: settings.dns_timeout(),
        })
    }
}

#[async_trait]
impl MxResolver for DnsMxResolver {
    async fn mx_record_count(&self, domain: &str) -> anyhow::Result<usize> {
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(fqdn))
            .await
            .map_err(|_| anyhow!("MX lookup for {} timed out", domain))?;

        match lookup {
            Ok(records) => Ok(records.iter().count()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(0),
                _ => Err(e.into()),
            },
        }
    }
}

pub struct Sentinel<R = DnsMxResolver> {
    resolver: R,
}

impl<R: MxResolver> Sentinel<R> {
    pub fn new(resolver: R) -> Self {
        Sentinel { resolver }
    }
}

#[async_trait]
impl<R: MxResolver> EmailVerifier for Sentinel<R> {
    async fn verify(&self, email: &str) -> VerificationOutcome {
        let email = email.trim().to_lowercase();
        if is_unknown(&email) {
            return VerificationOutcome::missing();
        }

        let Some((mailbox, domain)) = email.rsplit_once('@') else {
            log::info!("{} is not an email address", email);
            return VerificationOutcome::invalid();
        };
        if mailbox.is_empty() || !domain.contains('.') || !check_syntax(&email).is_valid_syntax {
            log::info!("{} failed the syntax check", email);
            return VerificationOutcome::invalid();
        }

        match self.resolver.mx_record_count(domain).await {
            Ok(count) if count > 0 => VerificationOutcome::valid(),
            Ok(_) => {
                log::info!("{} has no MX record", domain);
                VerificationOutcome::risky()
            }
            Err(e) => {
                log::warn!("MX lookup failed for {}: {:?}", domain, e);
                VerificationOutcome::risky()
            }
        }
    }
}
