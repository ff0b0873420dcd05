//! DNS enrichment: a domain's address and its authoritative nameservers.

use super::{Enricher, EnrichmentBuilder};
use crate::config::{ComponentKind, Descriptor};
use crate::time::StartTime;
use crate::{Subgraph, VerumError};
use hickory_resolver::Resolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Producer name: the enrichment node's value and every edge's origin.
pub const DNS_ORIGIN: &str = "dns";

/// Observable key of a domain and of each nameserver.
const DOMAIN_KEY: &str = "domain";
const IP_KEY: &str = "ip";
const NAMESERVER_ROLE: &str = "nameserver";

// =============================================================================
// RESOLVER
// =============================================================================

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The name resolved.
    Found(T),
    /// The name does not exist or has no such record.
    Absent,
    /// The resolver itself failed (timeout, network, malformed reply).
    Failed(String),
}

/// Blocking lookups used by [`DnsEnricher`].
pub trait DnsResolver {
    /// Addresses of `host`, in answer order.
    fn lookup_ip(&self, host: &str) -> Resolution<Vec<IpAddr>>;

    /// Authoritative nameservers of `domain`, without trailing dots.
    fn lookup_ns(&self, domain: &str) -> Resolution<Vec<String>>;
}

/// Resolver using the host's DNS configuration.
pub struct SystemResolver {
    inner: Resolver,
}

impl std::fmt::Debug for SystemResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemResolver").finish_non_exhaustive()
    }
}

impl SystemResolver {
    /// Read the system resolver configuration, or fall back to the library
    /// default upstreams if it cannot be read.
    pub fn new() -> Result<Self, VerumError> {
        let inner = match Resolver::from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!(error = %e, "system resolver configuration unavailable, using defaults");
                Resolver::new(ResolverConfig::default(), ResolverOpts::default())
                    .map_err(|e| VerumError::Configuration(format!("DNS resolver: {e}")))?
            }
        };
        Ok(Self { inner })
    }
}

fn classify<T>(result: Result<T, ResolveError>) -> Resolution<T> {
    match result {
        Ok(found) => Resolution::Found(found),
        Err(e) => match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => Resolution::Absent,
            _ => Resolution::Failed(e.to_string()),
        },
    }
}

impl DnsResolver for SystemResolver {
    fn lookup_ip(&self, host: &str) -> Resolution<Vec<IpAddr>> {
        match classify(self.inner.lookup_ip(host)) {
            Resolution::Found(lookup) => {
                let addresses: Vec<IpAddr> = lookup.iter().collect();
                if addresses.is_empty() {
                    Resolution::Absent
                } else {
                    Resolution::Found(addresses)
                }
            }
            Resolution::Absent => Resolution::Absent,
            Resolution::Failed(reason) => Resolution::Failed(reason),
        }
    }

    fn lookup_ns(&self, domain: &str) -> Resolution<Vec<String>> {
        match classify(self.inner.ns_lookup(domain)) {
            Resolution::Found(lookup) => Resolution::Found(
                lookup
                    .iter()
                    .map(|ns| ns.to_string().trim_end_matches('.').to_string())
                    .collect(),
            ),
            Resolution::Absent => Resolution::Absent,
            Resolution::Failed(reason) => Resolution::Failed(reason),
        }
    }
}

// =============================================================================
// ENRICHER
// =============================================================================

/// Resolves a domain to an address and lists its nameservers.
///
/// Output for a resolvable domain:
/// - nodes: the domain, `enrichment=dns`, the address, one per nameserver
/// - edges: domain→address, domain→`dns`, domain→each nameserver
///
/// Nameserver edges also carry `describedBy = nameserver`.
#[derive(Debug)]
pub struct DnsEnricher<R> {
    resolver: R,
    descriptor: Descriptor,
}

impl<R: DnsResolver> DnsEnricher<R> {
    /// An enricher with the built-in descriptor (accepts `domain`).
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            descriptor: Descriptor {
                name: DNS_ORIGIN.to_string(),
                kind: ComponentKind::Enrichment,
                accepted_input_kinds: BTreeSet::from([DOMAIN_KEY.to_string()]),
                approx_cost: 3,
                approx_speed: 2,
            },
        }
    }

    /// An enricher advertising a configured descriptor.
    pub fn with_descriptor(resolver: R, descriptor: Descriptor) -> Self {
        Self {
            resolver,
            descriptor,
        }
    }

    /// The address recorded for a domain: the first IPv4 answer if there is
    /// one, else the first answer.
    fn pick_address(addresses: &[IpAddr]) -> Option<IpAddr> {
        addresses
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addresses.first())
            .copied()
    }
}

impl<R: DnsResolver> Enricher for DnsEnricher<R> {
    fn produce(&self, observable: &str, start_time: Option<&StartTime>) -> Subgraph {
        let time = StartTime::resolve(start_time);
        let mut builder = EnrichmentBuilder::new(DNS_ORIGIN, DOMAIN_KEY, observable, time);

        let address = match self.resolver.lookup_ip(observable) {
            Resolution::Found(addresses) => Self::pick_address(&addresses),
            Resolution::Absent => None,
            Resolution::Failed(reason) => {
                warn!(domain = %observable, %reason, "address lookup failed");
                None
            }
        };
        let Some(address) = address else {
            debug!(domain = %observable, "domain did not resolve");
            return builder.observable_only();
        };
        builder.datum(IP_KEY, &address.to_string());

        match self.resolver.lookup_ns(observable) {
            Resolution::Found(nameservers) => {
                for ns in nameservers {
                    builder.datum_as(DOMAIN_KEY, &ns, NAMESERVER_ROLE);
                }
            }
            Resolution::Absent => debug!(domain = %observable, "no nameserver answer"),
            Resolution::Failed(reason) => {
                warn!(domain = %observable, %reason, "nameserver lookup failed");
            }
        }

        builder.finish()
    }

    fn describe(&self) -> Descriptor {
        self.descriptor.clone()
    }
}

// =============================================================================
// TESTS
// =============================================================================
