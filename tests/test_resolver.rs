//! Tests for destination resolution

use async_trait::async_trait;
use devproxy::discovery::{DiscoveryProvider, ServiceEndpoints};
use devproxy::error::{ConfigError, DiscoveryError, ResolveError};
use devproxy::proxy::{
    CancellationSignal, ChangeTrigger, DestinationMap, DestinationOverride, DestinationResolver,
    DestinationSpec, SchemePolicy, cancellation, change_token,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers from a fixed map of service name to endpoints
struct StaticProvider {
    services: HashMap<String, Vec<String>>,
    trigger: ChangeTrigger,
    lookups: AtomicUsize,
}

impl StaticProvider {
    fn new(services: &[(&str, &[&str])]) -> Self {
        let (trigger, _) = change_token();
        Self {
            services: services
                .iter()
                .map(|(name, endpoints)| {
                    (
                        name.to_string(),
                        endpoints.iter().map(|e| e.to_string()).collect(),
                    )
                })
                .collect(),
            trigger,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DiscoveryProvider for StaticProvider {
    async fn lookup(
        &self,
        service_name: &str,
        _cancel: &CancellationSignal,
    ) -> Result<Option<ServiceEndpoints>, DiscoveryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .services
            .get(service_name)
            .map(|endpoints| ServiceEndpoints::new(endpoints.clone(), Some(self.trigger.token()))))
    }
}

/// Fails for one service name and passes everything else through
struct FailingProvider {
    failing: String,
}

#[async_trait]
impl DiscoveryProvider for FailingProvider {
    async fn lookup(
        &self,
        service_name: &str,
        _cancel: &CancellationSignal,
    ) -> Result<Option<ServiceEndpoints>, DiscoveryError> {
        if service_name == self.failing {
            Err(DiscoveryError::Unavailable("registry offline".to_string()))
        } else {
            Ok(None)
        }
    }
}

/// Never answers
struct PendingProvider;

#[async_trait]
impl DiscoveryProvider for PendingProvider {
    async fn lookup(
        &self,
        _service_name: &str,
        _cancel: &CancellationSignal,
    ) -> Result<Option<ServiceEndpoints>, DiscoveryError> {
        std::future::pending().await
    }
}

fn destinations(entries: &[(&str, DestinationSpec)]) -> DestinationMap {
    entries
        .iter()
        .map(|(name, spec)| (name.to_string(), spec.clone()))
        .collect()
}

fn resolver(provider: StaticProvider, policy: SchemePolicy) -> DestinationResolver {
    DestinationResolver::new(Arc::new(provider), policy)
}

#[tokio::test]
async fn test_unknown_service_passes_address_through() {
    let resolver = resolver(StaticProvider::new(&[]), SchemePolicy::AllowAll);
    let input = destinations(&[("api", DestinationSpec::new("http://somewhere.local:1756/v1"))]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 1);
    let resolved = result.get("api[somewhere.local:1756]").unwrap();
    assert_eq!(resolved.address, "http://somewhere.local:1756/v1");
    assert_eq!(resolved.host.as_deref(), Some("somewhere.local:1756"));
    assert!(result.change_token.is_empty());
}

#[tokio::test]
async fn test_unknown_loopback_service_has_no_host() {
    let resolver = resolver(StaticProvider::new(&[]), SchemePolicy::AllowAll);
    let input = destinations(&[
        ("local", DestinationSpec::new("http://localhost:5000")),
        (
            "pinned",
            DestinationSpec::new("http://127.0.0.1:5001").with_host("app.example.com"),
        ),
    ]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.get("local[localhost:5000]").unwrap().host, None);
    assert_eq!(
        result.get("pinned[127.0.0.1:5001]").unwrap().host.as_deref(),
        Some("app.example.com")
    );
}

#[tokio::test]
async fn test_override_with_compound_scheme_destination() {
    let provider = StaticProvider::new(&[("http://override-host:9000", &["10.0.0.5:9000"])]);
    let resolver = resolver(provider, SchemePolicy::allowed(["http"]));
    let input = destinations(&[("backend", DestinationSpec::new("https+http://svc"))]);
    let backend = DestinationOverride::new("backend", Some("http://override-host:9000".to_string()));

    let result = resolver
        .resolve(&input, Some(&backend), &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 1);
    let resolved = result.get("backend[10.0.0.5:9000]").unwrap();
    assert_eq!(resolved.address, "http://10.0.0.5:9000/");
    assert_eq!(resolved.host.as_deref(), Some("override-host:9000"));
    assert_eq!(result.change_token.len(), 1);
}

#[tokio::test]
async fn test_override_only_applies_to_named_destination() {
    let provider = StaticProvider::new(&[
        ("http://override-host", &["10.0.0.5:8080"]),
        ("http://other", &["10.0.0.6:8080"]),
    ]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[
        ("backend", DestinationSpec::new("http://svc")),
        ("other", DestinationSpec::new("http://other")),
    ]);
    let backend = DestinationOverride::new("backend", Some("override-host".to_string()));

    let result = resolver
        .resolve(&input, Some(&backend), &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(
        result.get("backend[10.0.0.5:8080]").unwrap().address,
        "http://10.0.0.5:8080/"
    );
    assert_eq!(
        result.get("other[10.0.0.6:8080]").unwrap().address,
        "http://10.0.0.6:8080/"
    );
}

#[tokio::test]
async fn test_schemeless_override_defaults_to_http() {
    let resolver = resolver(StaticProvider::new(&[]), SchemePolicy::AllowAll);
    let input = destinations(&[("backend", DestinationSpec::new("https://ignored"))]);
    let backend = DestinationOverride::new("backend", Some("myhost:1234".to_string()));

    let result = resolver
        .resolve(&input, Some(&backend), &CancellationSignal::none())
        .await
        .unwrap();

    let resolved = result.get("backend[myhost:1234]").unwrap();
    assert_eq!(resolved.address, "http://myhost:1234");
    assert!(resolved.address.starts_with("http://"));
}

#[tokio::test]
async fn test_missing_override_address_is_config_error() {
    let resolver = resolver(StaticProvider::new(&[]), SchemePolicy::AllowAll);
    let input = destinations(&[("backend", DestinationSpec::new("http://svc"))]);
    let backend = DestinationOverride::new("backend", None);

    let err = resolver
        .resolve(&input, Some(&backend), &CancellationSignal::none())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ResolveError::Config(ConfigError::MissingOverrideAddress {
            name: "backend".to_string()
        })
    );
}

#[tokio::test]
async fn test_compound_scheme_negotiated_for_bare_endpoint() {
    let provider = StaticProvider::new(&[("https+http://svc", &["10.0.0.1:8443"])]);
    let resolver = resolver(provider, SchemePolicy::allowed(["http"]));
    let input = destinations(&[("api", DestinationSpec::new("https+http://svc/api"))]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    let resolved = result.get("api[10.0.0.1:8443]").unwrap();
    assert_eq!(resolved.address, "http://10.0.0.1:8443/api");
    assert_eq!(resolved.host.as_deref(), Some("svc"));
}

#[tokio::test]
async fn test_full_uri_endpoint_bypasses_negotiation() {
    let provider = StaticProvider::new(&[("https+http://svc", &["https://10.0.0.1:8443"])]);
    // No scheme allowed at all: only a bare endpoint would need negotiation.
    let resolver = resolver(provider, SchemePolicy::allowed(["ftp"]));
    let input = destinations(&[("api", DestinationSpec::new("https+http://svc"))]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(
        result.get("api[https://10.0.0.1:8443]").unwrap().address,
        "https://10.0.0.1:8443/"
    );
}

#[tokio::test]
async fn test_rejected_schemes_fail_resolution() {
    let provider = StaticProvider::new(&[("https+http://svc", &["10.0.0.1:8443"])]);
    let resolver = resolver(provider, SchemePolicy::allowed(["ftp"]));
    let input = destinations(&[("api", DestinationSpec::new("https+http://svc"))]);

    let err = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ResolveError::Config(ConfigError::SchemesRejected {
            candidates: vec!["https".to_string(), "http".to_string()],
        })
    );
}

#[tokio::test]
async fn test_path_and_query_preserved() {
    let provider = StaticProvider::new(&[("https://svc:8443", &["https://10.0.0.9:9443"])]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[(
        "api",
        DestinationSpec::new("https://svc:8443/api/v1/items?limit=10&sort=desc"),
    )]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    let resolved = result.get("api[https://10.0.0.9:9443]").unwrap();
    assert_eq!(
        resolved.address,
        "https://10.0.0.9:9443/api/v1/items?limit=10&sort=desc"
    );
    assert_eq!(resolved.host.as_deref(), Some("svc:8443"));
}

#[tokio::test]
async fn test_loopback_endpoint_leaves_host_unset() {
    let provider = StaticProvider::new(&[("https://svc.example.com", &["localhost:5613", "[::1]:5614"])]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[("web", DestinationSpec::new("https://svc.example.com"))]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.get("web[localhost:5613]").unwrap().host, None);
    assert_eq!(result.get("web[[::1]:5614]").unwrap().host, None);
}

#[tokio::test]
async fn test_explicit_host_wins_over_loopback() {
    let provider = StaticProvider::new(&[("http://svc", &["127.0.0.1:5000"])]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[("web", DestinationSpec::new("http://svc").with_host("svc.local"))]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(
        result.get("web[127.0.0.1:5000]").unwrap().host.as_deref(),
        Some("svc.local")
    );
}

#[tokio::test]
async fn test_health_address_rewritten_per_endpoint() {
    let provider = StaticProvider::new(&[("https://svc", &["10.0.0.5:9000", "10.0.0.6:9001"])]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[(
        "web",
        DestinationSpec::new("https://svc/app").with_health("http://svc:8080/healthz?full=1"),
    )]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);

    let first = result.get("web[10.0.0.5:9000]").unwrap();
    assert_eq!(first.address, "https://10.0.0.5:9000/app");
    assert_eq!(first.health.as_deref(), Some("http://10.0.0.5:9000/healthz?full=1"));

    let second = result.get("web[10.0.0.6:9001]").unwrap();
    assert_eq!(second.address, "https://10.0.0.6:9001/app");
    assert_eq!(second.health.as_deref(), Some("http://10.0.0.6:9001/healthz?full=1"));
}

#[tokio::test]
async fn test_zero_endpoints_yield_no_entries() {
    let none: &[&str] = &[];
    let provider = StaticProvider::new(&[("http://gone", none), ("http://here", &["10.0.0.1:80"])]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[
        ("gone", DestinationSpec::new("http://gone")),
        ("here", DestinationSpec::new("http://here")),
    ]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(result.len(), 1);
    assert!(result.destinations.keys().all(|name| !name.starts_with("gone")));
    assert_eq!(result.get("here[10.0.0.1:80]").unwrap().address, "http://10.0.0.1/");
    assert_eq!(result.change_token.len(), 2);
}

#[tokio::test]
async fn test_invalid_address_is_config_error() {
    let resolver = resolver(StaticProvider::new(&[]), SchemePolicy::AllowAll);
    let input = destinations(&[("bad", DestinationSpec::new("not a uri"))]);

    let err = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResolveError::Config(ConfigError::InvalidAddress { ref destination, .. }) if destination == "bad"
    ));
}

#[tokio::test]
async fn test_discovery_failure_fails_whole_pass() {
    let provider = FailingProvider {
        failing: "http://broken".to_string(),
    };
    let resolver = DestinationResolver::new(Arc::new(provider), SchemePolicy::AllowAll);
    let input = destinations(&[
        ("ok", DestinationSpec::new("http://fine")),
        ("broken", DestinationSpec::new("http://broken/path")),
    ]);

    let err = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ResolveError::Discovery {
            service: "http://broken".to_string(),
            source: DiscoveryError::Unavailable("registry offline".to_string()),
        }
    );
}

#[tokio::test]
async fn test_cancellation_aborts_pending_lookups() {
    let resolver = DestinationResolver::new(Arc::new(PendingProvider), SchemePolicy::AllowAll);
    let input = destinations(&[
        ("a", DestinationSpec::new("http://a")),
        ("b", DestinationSpec::new("http://b")),
    ]);
    let (source, signal) = cancellation();

    let (result, _) = tokio::join!(resolver.resolve(&input, None, &signal), async {
        tokio::task::yield_now().await;
        source.cancel();
    });

    assert_eq!(result.unwrap_err(), ResolveError::Cancelled);
}

#[tokio::test]
async fn test_already_cancelled_skips_lookups() {
    let provider = Arc::new(StaticProvider::new(&[("http://a", &["10.0.0.1:80"])]));
    let resolver = DestinationResolver::new(provider.clone(), SchemePolicy::AllowAll);
    let input = destinations(&[("a", DestinationSpec::new("http://a"))]);
    let (source, signal) = cancellation();
    source.cancel();

    let err = resolver.resolve(&input, None, &signal).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(provider.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_try_resolve_reports_cancellation_as_none() {
    let resolver = DestinationResolver::new(Arc::new(PendingProvider), SchemePolicy::AllowAll);
    let input = destinations(&[("a", DestinationSpec::new("http://a"))]);
    let (source, signal) = cancellation();

    let (result, _) = tokio::join!(resolver.try_resolve(&input, None, &signal), async {
        tokio::task::yield_now().await;
        source.cancel();
    });

    assert!(result.is_none());
}

#[tokio::test]
async fn test_try_resolve_keeps_failures() {
    let provider = FailingProvider {
        failing: "http://a".to_string(),
    };
    let resolver = DestinationResolver::new(Arc::new(provider), SchemePolicy::AllowAll);
    let input = destinations(&[("a", DestinationSpec::new("http://a"))]);
    let (_source, signal) = cancellation();

    let result = resolver.try_resolve(&input, None, &signal).await;

    assert!(matches!(result, Some(Err(ResolveError::Discovery { .. }))));
}

#[tokio::test]
async fn test_change_token_follows_provider() {
    let provider = Arc::new(StaticProvider::new(&[("http://a", &["10.0.0.1:80"])]));
    let resolver = DestinationResolver::new(provider.clone(), SchemePolicy::AllowAll);
    let input = destinations(&[("a", DestinationSpec::new("http://a"))]);

    let result = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();
    assert!(!result.change_token.has_changed());

    provider.trigger.fire();

    assert!(result.change_token.has_changed());
    result.change_token.changed().await;
}

#[tokio::test]
async fn test_input_destinations_are_not_mutated() {
    let provider = StaticProvider::new(&[("http://svc", &["10.0.0.1:8080"])]);
    let resolver = resolver(provider, SchemePolicy::AllowAll);
    let input = destinations(&[("svc", DestinationSpec::new("http://svc/x"))]);
    let before = input.clone();

    let first = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();
    let second = resolver
        .resolve(&input, None, &CancellationSignal::none())
        .await
        .unwrap();

    assert_eq!(input, before);
    assert_eq!(first.destinations, second.destinations);
}
