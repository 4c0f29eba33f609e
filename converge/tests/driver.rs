//! Driver behavior against the simulated remote.
//!
//! Run with: cargo test -p converge --features sim

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_test::assert_ok;

use converge::model::{ServiceEndpoint, Subnet};
use converge::remote::memory::{MemoryRemote, Method};
use converge::spec::{RoleAssignmentSpec, SubnetSpec};
use converge::{
    ConvergeError, ConvergenceDriver, DriverConfig, OperationKey, OperationKind, OperationState, OperationStore,
    Outcome, PollStatus, RemoteClient, RemoteError, RemoteObject, RemoteResponse, ResourceIdentity, ResourceSpec,
    ValidationError,
};

fn subnet_spec() -> SubnetSpec {
    SubnetSpec {
        name: "node-subnet".into(),
        resource_group: "rg".into(),
        subscription_id: "sub".into(),
        cidrs: vec!["10.0.1.0/24".into()],
        vnet_name: "vnet-a".into(),
        vnet_resource_group: "rg".into(),
        is_vnet_managed: true,
        route_table_name: None,
        security_group_name: None,
        nat_gateway_name: None,
        service_endpoints: vec![],
    }
}

fn owner_present(_: &ResourceIdentity) -> bool {
    true
}

fn owner_absent(_: &ResourceIdentity) -> bool {
    false
}

fn driver(remote: MemoryRemote) -> ConvergenceDriver<MemoryRemote> {
    ConvergenceDriver::new(remote, DriverConfig::default())
}

fn key(spec: &dyn ResourceSpec) -> OperationKey {
    OperationKey::for_resource(&spec.identity())
}

#[tokio::test]
async fn test_idempotent_when_up_to_date() {
    let spec = subnet_spec();
    let remote = MemoryRemote::new();
    remote
        .insert(
            &spec.identity(),
            RemoteObject::Subnet(Subnet {
                address_prefix: Some("10.0.1.0/24".into()),
                ..Default::default()
            }),
        )
        .await;
    let driver = driver(remote);
    let mut store = OperationStore::new();

    for _ in 0..5 {
        assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::UpToDate);
    }
    assert!(store.is_empty());
    let calls = driver.client().calls().await;
    assert_eq!(calls.mutations(), 0);
    assert_eq!(calls.get, 5);
}

#[tokio::test]
async fn test_polls_instead_of_reissuing() {
    let spec = subnet_spec();
    let driver = driver(MemoryRemote::with_async_polls(4));
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    let first_handle = store.get(&key(&spec)).unwrap().poll_handle.clone();

    for _ in 0..3 {
        assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key(&spec)).unwrap().poll_handle, first_handle);
    }

    let calls = driver.client().calls().await;
    assert_eq!(calls.create, 1);
    assert_eq!(calls.update, 0);
    assert_eq!(calls.poll, 3);
    // While pending, nothing else is fetched either
    assert_eq!(calls.get, 1);

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Converged);
    assert!(store.is_empty());
    assert_eq!(driver.client().calls().await.create, 1);
}

#[tokio::test]
async fn test_owner_then_poll_then_converged_scenario() {
    let spec = subnet_spec();
    let remote = MemoryRemote::with_async_polls(1);
    remote.push_poll_handle("op-123").await;
    let driver = driver(remote);
    let mut store = OperationStore::new();

    // Pass 1: absent, owner present, create accepted
    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    assert_eq!(store.len(), 1);
    let state = store.get(&key(&spec)).unwrap();
    assert_eq!(state.poll_handle, "op-123");
    assert_eq!(state.kind, OperationKind::Create);
    assert_eq!(state.service_name, "subnets");

    // Pass 2: done; re-fetched object matches
    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Converged);
    assert!(store.is_empty());

    // And stays converged without further calls
    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::UpToDate);
    assert_eq!(driver.client().calls().await.mutations(), 1);
}

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let mut spec = subnet_spec();
    spec.is_vnet_managed = false;
    let driver = driver(MemoryRemote::new());

    let unrelated = ResourceIdentity {
        name: "other".into(),
        resource_group: "rg".into(),
        owner: String::new(),
        kind: converge::ResourceKind::VirtualNetwork,
    };
    let mut store = OperationStore::new();
    store.set(OperationState::new(OperationKind::Create, &unrelated, "op-x".into(), Utc::now()));
    let before = store.clone();

    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    assert_eq!(
        outcome,
        Outcome::Failed(ConvergeError::Validation(ValidationError::UnmanagedPrerequisiteMissing(
            "node-subnet".into()
        )))
    );
    assert!(!outcome.error().unwrap().is_retryable());
    assert_eq!(store, before);
    assert_eq!(driver.client().calls().await.mutations(), 0);
}

#[tokio::test]
async fn test_blocked_on_owner() {
    let spec = subnet_spec();
    let driver = driver(MemoryRemote::new());
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_absent).await, Outcome::BlockedOnOwner);
    let calls = driver.client().calls().await;
    assert_eq!(calls.mutations(), 0);
    assert_eq!(calls.get, 0);
    assert!(store.is_empty());

    // Specs without an owner never consult the check
    let ra = RoleAssignmentSpec {
        name: "ra".into(),
        resource_group: "rg".into(),
        principal_id: None,
        role_definition_id: "reader".into(),
        scope: String::new(),
    };
    assert_eq!(driver.reconcile(&ra, &mut store, &owner_absent).await, Outcome::Converged);
}

#[tokio::test]
async fn test_stale_operation_is_abandoned() {
    let spec = subnet_spec();
    let config = DriverConfig {
        staleness_bound: Duration::from_secs(60),
        ..Default::default()
    };
    let driver = ConvergenceDriver::new(MemoryRemote::new(), config);

    let mut store = OperationStore::new();
    store.set(OperationState::new(
        OperationKind::Create,
        &spec.identity(),
        "op-lost".into(),
        Utc::now() - chrono::Duration::minutes(5),
    ));

    // Discarded without polling; the next pass starts fresh
    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    assert!(store.is_empty());
    assert_eq!(driver.client().calls().await.poll, 0);

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Converged);
    assert_eq!(driver.client().calls().await.create, 1);
}

#[tokio::test]
async fn test_operation_failure_clears_state() {
    let spec = subnet_spec();
    let remote = MemoryRemote::with_async_polls(0);
    remote.fail_operations(Some("InternalServerError")).await;
    let driver = driver(remote);
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    match outcome {
        Outcome::Failed(ConvergeError::OperationFailed { kind, name, message }) => {
            assert_eq!(kind, "create");
            assert_eq!(name, "node-subnet");
            assert_eq!(message, "InternalServerError");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(store.is_empty());

    // The caller may try again with a fresh operation
    driver.client().fail_operations(None).await;
    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Converged);
    assert_eq!(driver.client().calls().await.create, 2);
}

#[tokio::test]
async fn test_lost_handle_recomputes() {
    let spec = subnet_spec();
    let driver = driver(MemoryRemote::with_async_polls(5));
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    driver.client().forget_operations().await;

    // Handle unknown: state dropped and a new create issued in the same pass
    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    assert_eq!(store.len(), 1);
    assert_eq!(driver.client().calls().await.create, 2);
}

#[tokio::test]
async fn test_transient_failures_leave_store_unchanged() {
    let spec = subnet_spec();
    let driver = driver(MemoryRemote::with_async_polls(1));
    let mut store = OperationStore::new();

    // Get fails before anything is issued
    driver
        .client()
        .fail_next(Method::Get, RemoteError::Unavailable("503 Service Unavailable".into()))
        .await;
    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    assert!(matches!(outcome, Outcome::Failed(ConvergeError::RemoteUnavailable { operation: "get", .. })));
    assert!(outcome.error().unwrap().is_retryable());
    assert!(store.is_empty());

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    let pending = store.clone();

    // Poll fails: pending state kept as is
    driver
        .client()
        .fail_next(Method::Poll, RemoteError::Unavailable("connection reset".into()))
        .await;
    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    assert!(matches!(outcome, Outcome::Failed(ConvergeError::RemoteUnavailable { operation: "poll", .. })));
    assert_eq!(store, pending);
}

#[tokio::test]
async fn test_rejections_are_classified() {
    let spec = subnet_spec();
    let driver = driver(MemoryRemote::new());
    let mut store = OperationStore::new();

    driver
        .client()
        .fail_next(
            Method::Create,
            RemoteError::Rejected {
                status: 400,
                code: "InvalidAddressPrefix".into(),
                message: "prefix outside vnet".into(),
            },
        )
        .await;
    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    let err = outcome.error().unwrap();
    assert!(matches!(err, ConvergeError::RemoteRejected { operation: "create", .. }));
    assert!(!err.is_retryable());

    driver
        .client()
        .fail_next(
            Method::Create,
            RemoteError::Rejected {
                status: 409,
                code: "AnotherOperationInProgress".into(),
                message: "busy".into(),
            },
        )
        .await;
    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    assert!(outcome.error().unwrap().is_retryable());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_divergent_object_is_updated() {
    let mut spec = subnet_spec();
    spec.service_endpoints = vec![ServiceEndpoint {
        service: "Microsoft.Storage".into(),
        locations: vec!["*".into()],
    }];
    let remote = MemoryRemote::with_async_polls(0);
    remote.insert(&spec.identity(), RemoteObject::Subnet(Subnet::default())).await;
    let driver = driver(remote);
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Converged);
    let calls = driver.client().calls().await;
    assert_eq!(calls.update, 1);
    assert_eq!(calls.create, 0);

    let Some(RemoteObject::Subnet(updated)) = driver.client().object(&spec.identity()).await else {
        panic!("subnet missing");
    };
    assert_eq!(updated.service_endpoints.len(), 1);
}

#[tokio::test]
async fn test_async_delete() {
    let spec = subnet_spec();
    let remote = MemoryRemote::with_async_polls(2);
    remote.insert(&spec.identity(), RemoteObject::Subnet(Subnet::default())).await;
    let driver = driver(remote);
    let mut store = OperationStore::new();

    assert_eq!(driver.delete(&spec, &mut store).await, Outcome::Incomplete);
    assert_eq!(store.get(&key(&spec)).unwrap().kind, OperationKind::Delete);
    assert_eq!(driver.delete(&spec, &mut store).await, Outcome::Incomplete);
    assert_eq!(driver.delete(&spec, &mut store).await, Outcome::Converged);
    assert!(store.is_empty());
    assert!(driver.client().object(&spec.identity()).await.is_none());
    assert_eq!(driver.delete(&spec, &mut store).await, Outcome::UpToDate);
    assert_eq!(driver.client().calls().await.delete, 1);
}

#[tokio::test]
async fn test_delete_after_failed_create() {
    let spec = subnet_spec();
    let remote = MemoryRemote::with_async_polls(0);
    remote.fail_operations(Some("quota exceeded")).await;
    let driver = driver(remote);
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);

    // The failed create is cleared and does not block the delete
    assert_eq!(driver.delete(&spec, &mut store).await, Outcome::UpToDate);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_resume_across_restart() {
    let spec = subnet_spec();

    // Uninterrupted run
    let uninterrupted = {
        let driver = driver(MemoryRemote::with_async_polls(3));
        let mut store = OperationStore::new();
        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(driver.reconcile(&spec, &mut store, &owner_present).await);
        }
        outcomes
    };

    // Same remote, but every pass runs in a "new process": the store is
    // loaded from its persisted form and a fresh driver is built.
    let remote = Arc::new(MemoryRemote::with_async_polls(3));
    let mut persisted = serde_json::to_string(&OperationStore::new()).unwrap();
    let mut restarted = Vec::new();
    for _ in 0..5 {
        let driver = ConvergenceDriver::new(Arc::clone(&remote), DriverConfig::default());
        let mut store: OperationStore = assert_ok!(serde_json::from_str(&persisted));
        restarted.push(driver.reconcile(&spec, &mut store, &owner_present).await);
        persisted = serde_json::to_string(&store).unwrap();
    }

    assert_eq!(restarted, uninterrupted);
    assert_eq!(
        restarted,
        vec![
            Outcome::Incomplete,
            Outcome::Incomplete,
            Outcome::Incomplete,
            Outcome::Converged,
            Outcome::UpToDate
        ]
    );
    assert_eq!(remote.calls().await.create, 1);
}

/// Simulated remote whose calls to one method never finish in time.
struct StallingRemote {
    inner: MemoryRemote,
    stalled: Method,
}

impl StallingRemote {
    async fn enter(&self, method: Method) {
        if method == self.stalled {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }
}

#[async_trait]
impl RemoteClient for StallingRemote {
    async fn get(&self, id: &ResourceIdentity) -> Result<RemoteObject, RemoteError> {
        self.enter(Method::Get).await;
        self.inner.get(id).await
    }

    async fn create(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError> {
        self.enter(Method::Create).await;
        self.inner.create(id, payload).await
    }

    async fn update(&self, id: &ResourceIdentity, payload: RemoteObject) -> Result<RemoteResponse, RemoteError> {
        self.enter(Method::Update).await;
        self.inner.update(id, payload).await
    }

    async fn delete(&self, id: &ResourceIdentity) -> Result<RemoteResponse, RemoteError> {
        self.enter(Method::Delete).await;
        self.inner.delete(id).await
    }

    async fn poll_operation(&self, poll_handle: &str) -> Result<PollStatus, RemoteError> {
        self.enter(Method::Poll).await;
        self.inner.poll_operation(poll_handle).await
    }
}

fn stalling_driver(
    inner: MemoryRemote,
    stalled: Method,
    call_timeout: Option<Duration>,
) -> ConvergenceDriver<StallingRemote> {
    let config = DriverConfig {
        call_timeout,
        ..Default::default()
    };
    ConvergenceDriver::new(StallingRemote { inner, stalled }, config)
}

const SHORT: Duration = Duration::from_millis(20);

#[tokio::test]
async fn test_call_timeout_is_transient() {
    let driver = stalling_driver(MemoryRemote::new(), Method::Get, Some(SHORT));
    let mut store = OperationStore::new();

    let outcome = driver.reconcile(&subnet_spec(), &mut store, &owner_present).await;
    assert!(matches!(outcome, Outcome::Failed(ConvergeError::RemoteUnavailable { operation: "get", .. })));
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_poll_timeout_leaves_pending_state() {
    let spec = subnet_spec();
    let driver = stalling_driver(MemoryRemote::with_async_polls(3), Method::Poll, Some(SHORT));
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    let before = serde_json::to_vec(&store).unwrap();

    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    assert!(matches!(outcome, Outcome::Failed(ConvergeError::RemoteUnavailable { operation: "poll", .. })));
    assert_eq!(serde_json::to_vec(&store).unwrap(), before);
}

#[tokio::test]
async fn test_dropped_poll_leaves_pending_state() {
    let spec = subnet_spec();
    let driver = stalling_driver(MemoryRemote::with_async_polls(3), Method::Poll, None);
    let mut store = OperationStore::new();

    assert_eq!(driver.reconcile(&spec, &mut store, &owner_present).await, Outcome::Incomplete);
    let before = serde_json::to_vec(&store).unwrap();

    let pass = driver.reconcile(&spec, &mut store, &owner_present);
    assert!(tokio::time::timeout(SHORT, pass).await.is_err());
    assert_eq!(serde_json::to_vec(&store).unwrap(), before);
    assert_eq!(driver.client().inner.calls().await.create, 1);
}

#[tokio::test]
async fn test_create_timeout_stores_nothing() {
    let spec = subnet_spec();
    let driver = stalling_driver(MemoryRemote::with_async_polls(3), Method::Create, Some(SHORT));
    let mut store = OperationStore::new();

    let outcome = driver.reconcile(&spec, &mut store, &owner_present).await;
    assert!(matches!(outcome, Outcome::Failed(ConvergeError::RemoteUnavailable { operation: "create", .. })));
    assert!(outcome.error().unwrap().is_retryable());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_dropped_create_stores_nothing() {
    let spec = subnet_spec();
    let driver = stalling_driver(MemoryRemote::with_async_polls(3), Method::Create, None);
    let mut store = OperationStore::new();

    let pass = driver.reconcile(&spec, &mut store, &owner_present);
    assert!(tokio::time::timeout(SHORT, pass).await.is_err());
    assert!(store.is_empty());
    assert_eq!(driver.client().inner.pending_operations().await, 0);
}
