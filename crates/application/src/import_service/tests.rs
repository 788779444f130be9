use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::DateTime;
use iamgraph_domain::{Binding, ModelStatus, Permission, Principal, Resource, Role};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::*;

#[derive(Default)]
struct StoreState {
    models: HashMap<ModelId, Model>,
    heartbeats: Vec<DateTime<Utc>>,
    resources: BTreeMap<(ModelId, String), Resource>,
    principals: BTreeMap<(ModelId, String), Principal>,
    permissions: BTreeSet<(ModelId, Permission)>,
    roles: BTreeMap<(ModelId, String), Role>,
    bindings: Vec<(ModelId, Binding)>,
}

#[derive(Default)]
struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    async fn status(&self, model_id: ModelId) -> Option<ModelStatus> {
        self.state
            .lock()
            .await
            .models
            .get(&model_id)
            .map(|model| model.status)
    }

    async fn heartbeats(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().await.heartbeats.clone()
    }

    async fn transition(
        &self,
        model_id: ModelId,
        allowed: &[ModelStatus],
        next: ModelStatus,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let model = state
            .models
            .get_mut(&model_id)
            .ok_or_else(|| AppError::NotFound(format!("model '{model_id}' not found")))?;
        if !allowed.contains(&model.status) {
            return Err(AppError::Validation(format!(
                "model '{model_id}' cannot move from {} to {next}",
                model.status
            )));
        }
        model.status = next;
        Ok(())
    }
}

#[async_trait]
impl ModelRepository for FakeStore {
    async fn create_model(&self, model: Model) -> AppResult<Model> {
        self.state
            .lock()
            .await
            .models
            .insert(model.model_id, model.clone());
        Ok(model)
    }

    async fn find_model(&self, model_id: ModelId) -> AppResult<Option<Model>> {
        Ok(self.state.lock().await.models.get(&model_id).cloned())
    }

    async fn mark_in_progress(&self, model_id: ModelId) -> AppResult<()> {
        self.transition(
            model_id,
            &[ModelStatus::Pending, ModelStatus::Broken],
            ModelStatus::Running,
        )
        .await
    }

    async fn refresh_heartbeat(&self, model_id: ModelId, at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(model) = state.models.get_mut(&model_id) {
            model.last_heartbeat_at = Some(at);
        }
        state.heartbeats.push(at);
        Ok(())
    }

    async fn mark_done(&self, model_id: ModelId) -> AppResult<()> {
        self.transition(model_id, &[ModelStatus::Running], ModelStatus::Done)
            .await
    }

    async fn mark_stale_models_broken(&self, threshold: DateTime<Utc>) -> AppResult<Vec<ModelId>> {
        let mut state = self.state.lock().await;
        let mut broken = Vec::new();
        for model in state.models.values_mut() {
            if model.is_stale(threshold) {
                model.status = ModelStatus::Broken;
                broken.push(model.model_id);
            }
        }
        Ok(broken)
    }
}

#[async_trait]
impl GraphRepository for FakeStore {
    async fn upsert_resource(&self, model_id: ModelId, resource: Resource) -> AppResult<Resource> {
        self.state
            .lock()
            .await
            .resources
            .insert((model_id, resource.name().to_owned()), resource.clone());
        Ok(resource)
    }

    async fn find_resource(&self, model_id: ModelId, name: &str) -> AppResult<Option<Resource>> {
        Ok(self
            .state
            .lock()
            .await
            .resources
            .get(&(model_id, name.to_owned()))
            .cloned())
    }

    async fn get_or_create_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal> {
        Ok(self
            .state
            .lock()
            .await
            .principals
            .entry((model_id, principal.name().to_owned()))
            .or_insert(principal)
            .clone())
    }

    async fn upsert_principal(
        &self,
        model_id: ModelId,
        principal: Principal,
    ) -> AppResult<Principal> {
        self.state
            .lock()
            .await
            .principals
            .insert((model_id, principal.name().to_owned()), principal.clone());
        Ok(principal)
    }

    async fn upsert_permission(&self, model_id: ModelId, permission: &Permission) -> AppResult<()> {
        self.state
            .lock()
            .await
            .permissions
            .insert((model_id, permission.clone()));
        Ok(())
    }

    async fn find_role(&self, model_id: ModelId, name: &str) -> AppResult<Option<Role>> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .get(&(model_id, name.to_owned()))
            .cloned())
    }

    async fn create_role(&self, model_id: ModelId, role: Role) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        for permission in role.permissions() {
            state.permissions.insert((model_id, permission.clone()));
        }
        Ok(state
            .roles
            .entry((model_id, role.name().to_owned()))
            .or_insert(role)
            .clone())
    }

    async fn insert_binding(&self, model_id: ModelId, binding: Binding) -> AppResult<String> {
        let mut state = self.state.lock().await;
        state.bindings.push((model_id, binding));
        Ok(state.bindings.len().to_string())
    }

    async fn list_resources(&self, model_id: ModelId) -> AppResult<Vec<Resource>> {
        let state = self.state.lock().await;
        let mut resources: Vec<Resource> = state
            .resources
            .iter()
            .filter(|((owner, _), _)| *owner == model_id)
            .map(|(_, resource)| resource.clone())
            .collect();
        resources.sort_by(|left, right| left.full_name().cmp(right.full_name()));
        Ok(resources)
    }

    async fn list_principals(&self, model_id: ModelId) -> AppResult<Vec<Principal>> {
        let state = self.state.lock().await;
        Ok(state
            .principals
            .iter()
            .filter(|((owner, _), _)| *owner == model_id)
            .map(|(_, principal)| principal.clone())
            .collect())
    }

    async fn list_roles(&self, model_id: ModelId) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .iter()
            .filter(|((owner, _), _)| *owner == model_id)
            .map(|(_, role)| role.clone())
            .collect())
    }

    async fn list_bindings(&self, model_id: ModelId) -> AppResult<Vec<Binding>> {
        let state = self.state.lock().await;
        Ok(state
            .bindings
            .iter()
            .filter(|(owner, _)| *owner == model_id)
            .map(|(_, binding)| binding.clone())
            .collect())
    }

    async fn graph_counts(&self, model_id: ModelId) -> AppResult<GraphCounts> {
        let state = self.state.lock().await;
        Ok(GraphCounts {
            resources: state.resources.keys().filter(|(owner, _)| *owner == model_id).count(),
            principals: state
                .principals
                .keys()
                .filter(|(owner, _)| *owner == model_id)
                .count(),
            roles: state.roles.keys().filter(|(owner, _)| *owner == model_id).count(),
            permissions: state
                .permissions
                .iter()
                .filter(|(owner, _)| *owner == model_id)
                .count(),
            bindings: state
                .bindings
                .iter()
                .filter(|(owner, _)| *owner == model_id)
                .count(),
        })
    }
}

#[derive(Default)]
struct FakePermissionSource {
    roles: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakePermissionSource {
    fn with_role(mut self, role: &str, permissions: &[&str]) -> Self {
        self.roles.insert(
            role.to_owned(),
            permissions.iter().map(|value| (*value).to_owned()).collect(),
        );
        self
    }
}

#[async_trait]
impl PermissionSource for FakePermissionSource {
    async fn permissions_for_role(&self, role_name: &str) -> AppResult<Vec<Permission>> {
        self.calls.lock().await.push(role_name.to_owned());
        self.roles
            .get(role_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(Permission::new)
            .collect()
    }
}

struct VecRecordSource {
    records: VecDeque<RawRecord>,
    delay: Option<Duration>,
}

impl VecRecordSource {
    fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records: records.into(),
            delay: None,
        }
    }

    fn paced(records: Vec<RawRecord>, delay: Duration) -> Self {
        Self {
            records: records.into(),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl RecordSource for VecRecordSource {
    async fn next_record(&mut self) -> AppResult<Option<RawRecord>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.records.pop_front())
    }
}

struct Harness {
    store: Arc<FakeStore>,
    permissions: Arc<FakePermissionSource>,
    service: ImportService,
}

impl Harness {
    fn new(permissions: FakePermissionSource) -> Self {
        Self::with_settings(permissions, ImportSettings::default())
    }

    fn with_settings(permissions: FakePermissionSource, settings: ImportSettings) -> Self {
        let store = Arc::new(FakeStore::default());
        let permissions = Arc::new(permissions);
        let service = ImportService::new(store.clone(), store.clone(), permissions.clone())
            .with_settings(settings);

        Self {
            store,
            permissions,
            service,
        }
    }

    async fn model_id(&self) -> ModelId {
        self.service
            .create_model()
            .await
            .map(|model| model.model_id)
            .unwrap_or_else(|_| unreachable!())
    }

    async fn import(&self, records: Vec<RawRecord>) -> (ModelId, AppResult<ImportSummary>) {
        self.import_from(VecRecordSource::new(records)).await
    }

    async fn import_from(&self, source: VecRecordSource) -> (ModelId, AppResult<ImportSummary>) {
        let model_id = self.model_id().await;
        let result = self
            .service
            .run_import(
                model_id,
                ImportRequest::Forseti(Box::new(source)),
                CancellationToken::new(),
            )
            .await;
        (model_id, result)
    }
}

fn record(kind: &str, payload: Value) -> RawRecord {
    RawRecord::new(kind, payload)
}

fn organization(org_id: &str, display_name: &str) -> RawRecord {
    record(
        "organizations",
        json!({ "org_id": org_id, "display_name": display_name }),
    )
}

fn project(project_number: &str, parent_type: &str, parent_id: &str) -> RawRecord {
    record(
        "projects",
        json!({
            "project_number": project_number,
            "project_id": format!("project-{project_number}"),
            "parent_type": parent_type,
            "parent_id": parent_id,
        }),
    )
}

fn policy(resource_type: &str, resource_id: &str, bindings: Value) -> RawRecord {
    record(
        "policy",
        json!({
            "resource_type": resource_type,
            "resource_id": resource_id,
            "policy": { "etag": "BwW", "bindings": bindings },
        }),
    )
}

#[tokio::test]
async fn project_full_name_includes_organization() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![
            organization("123", "Acme"),
            project("456", "organization", "123"),
        ])
        .await;

    assert!(result.is_ok());
    let resources = harness
        .store
        .list_resources(model_id)
        .await
        .unwrap_or_default();
    let full_names: Vec<&str> = resources.iter().map(Resource::full_name).collect();
    assert_eq!(
        full_names,
        vec!["organization/123", "organization/123/project/456"]
    );
    assert_eq!(harness.store.status(model_id).await, Some(ModelStatus::Done));
}

#[tokio::test]
async fn child_before_parent_fails_and_leaves_model_running() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![project("456", "organization", "999")])
        .await;

    assert!(matches!(result, Err(AppError::Resolution(_))));
    assert_eq!(
        harness.store.status(model_id).await,
        Some(ModelStatus::Running)
    );
}

#[tokio::test]
async fn repeated_resource_keeps_latest_display_name() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![organization("123", "Old"), organization("123", "New")])
        .await;

    assert!(result.is_ok());
    let resources = harness
        .store
        .list_resources(model_id)
        .await
        .unwrap_or_default();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].display_name(), Some("New"));
}

#[tokio::test]
async fn policy_creates_role_principals_and_binding() {
    let harness = Harness::new(
        FakePermissionSource::default()
            .with_role("roles/viewer", &["storage.buckets.get", "storage.objects.list"]),
    );
    let (model_id, result) = harness
        .import(vec![
            organization("123", "Acme"),
            project("456", "organization", "123"),
            policy(
                "project",
                "456",
                json!([{
                    "role": "roles/viewer",
                    "members": ["user:alice@example.com", "group:ops@example.com", "allUsers"],
                }]),
            ),
        ])
        .await;

    assert!(result.is_ok());
    let bindings = harness
        .store
        .list_bindings(model_id)
        .await
        .unwrap_or_default();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].resource_name(), "project/456");
    assert_eq!(bindings[0].role_name(), "roles/viewer");
    let members: Vec<&str> = bindings[0].members().iter().map(String::as_str).collect();
    assert_eq!(
        members,
        vec![
            "group/ops@example.com",
            "special/allUsers",
            "user/alice@example.com"
        ]
    );

    let roles = harness.store.list_roles(model_id).await.unwrap_or_default();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].permissions().len(), 2);

    let counts = result
        .map(|summary| summary.counts)
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(counts.permissions, 2);
    assert_eq!(counts.principals, 3);
}

#[tokio::test]
async fn convenience_and_deleted_members_become_principals() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![
            organization("123", "Acme"),
            project("456", "organization", "123"),
            policy(
                "project",
                "456",
                json!([{
                    "role": "roles/owner",
                    "members": [
                        "projectOwner:my-project",
                        "deleted:user:gone@example.com?uid=42",
                        "user:alice",
                    ],
                }]),
            ),
        ])
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.store.status(model_id).await, Some(ModelStatus::Done));
    let principals = harness
        .store
        .list_principals(model_id)
        .await
        .unwrap_or_default();
    let names: Vec<&str> = principals.iter().map(Principal::name).collect();
    assert_eq!(
        names,
        vec![
            "deleted/user:gone@example.com?uid=42",
            "projectOwner/my-project",
            "user/alice",
        ]
    );
}

#[tokio::test]
async fn membership_keeps_unlisted_member_types() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![record(
            "membership",
            json!({
                "member": { "member_type": "CUSTOMER", "member_email": "C0abc" },
                "groups": ["all@example.com"],
            }),
        )])
        .await;

    assert!(result.is_ok());
    let customer = harness
        .store
        .list_principals(model_id)
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|principal| principal.name() == "customer/C0abc");
    let parents: Vec<String> = customer
        .map(|principal| principal.parents().iter().cloned().collect())
        .unwrap_or_default();
    assert_eq!(parents, vec!["group/all@example.com".to_owned()]);
}

#[tokio::test]
async fn policy_on_unknown_resource_fails() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![policy(
            "project",
            "404",
            json!([{ "role": "roles/owner", "members": ["user:a@example.com"] }]),
        )])
        .await;

    assert!(matches!(result, Err(AppError::Resolution(_))));
    assert_eq!(
        harness.store.status(model_id).await,
        Some(ModelStatus::Running)
    );
}

#[tokio::test]
async fn reused_role_queries_permission_source_once() {
    let harness =
        Harness::new(FakePermissionSource::default().with_role("roles/editor", &["a.b.c"]));
    let binding = json!([{ "role": "roles/editor", "members": ["user:bob@example.com"] }]);
    let (model_id, result) = harness
        .import(vec![
            organization("1", "Acme"),
            project("2", "organization", "1"),
            policy("organization", "1", binding.clone()),
            policy("project", "2", binding.clone()),
            policy("project", "2", binding),
        ])
        .await;

    assert!(result.is_ok());
    assert_eq!(harness.permissions.calls.lock().await.len(), 1);
    let bindings = harness
        .store
        .list_bindings(model_id)
        .await
        .unwrap_or_default();
    assert_eq!(bindings.len(), 3);
}

#[tokio::test]
async fn unknown_kind_fails_by_default() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![record("firewalls", json!({ "id": 1 }))])
        .await;

    assert!(matches!(result, Err(AppError::UnsupportedRecordKind(kind)) if kind == "firewalls"));
    assert_eq!(
        harness.store.status(model_id).await,
        Some(ModelStatus::Running)
    );
}

#[tokio::test]
async fn unknown_kind_is_skipped_when_configured() {
    let harness = Harness::with_settings(
        FakePermissionSource::default(),
        ImportSettings {
            unknown_kind_policy: UnknownRecordKindPolicy::Skip,
            ..ImportSettings::default()
        },
    );
    let (model_id, result) = harness
        .import(vec![
            record("firewalls", json!({ "id": 1 })),
            organization("1", "Acme"),
        ])
        .await;

    let summary = result.unwrap_or_else(|_| unreachable!());
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(summary.records_processed, 1);
    assert_eq!(harness.store.status(model_id).await, Some(ModelStatus::Done));
}

#[tokio::test]
async fn customer_records_are_ignored() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![
            record("customer", json!({ "customer_id": "C01" })),
            organization("1", "Acme"),
        ])
        .await;

    let summary = result.unwrap_or_else(|_| unreachable!());
    assert_eq!(summary.records_skipped, 1);
    assert_eq!(
        summary.records_by_kind.get(&RecordKind::Organizations),
        Some(&1)
    );
    assert_eq!(summary.counts.resources, 1);
    assert_eq!(harness.store.status(model_id).await, Some(ModelStatus::Done));
}

#[tokio::test]
async fn malformed_payload_is_a_validation_error() {
    let harness = Harness::new(FakePermissionSource::default());
    let (_, result) = harness
        .import(vec![record("buckets", json!({ "bucket_id": "b" }))])
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn membership_sets_parents_without_duplicating_groups() {
    let harness = Harness::new(FakePermissionSource::default());
    let (model_id, result) = harness
        .import(vec![
            record("group", json!({ "group_email": "g1@example.com" })),
            record(
                "membership",
                json!({
                    "member": { "member_type": "USER", "member_email": "u@example.com" },
                    "groups": ["g1@example.com", { "group_email": "g2@example.com" }],
                }),
            ),
        ])
        .await;

    assert!(result.is_ok());
    let principals = harness
        .store
        .list_principals(model_id)
        .await
        .unwrap_or_default();
    let names: Vec<&str> = principals.iter().map(Principal::name).collect();
    assert_eq!(
        names,
        vec!["group/g1@example.com", "group/g2@example.com", "user/u@example.com"]
    );

    let user = principals
        .iter()
        .find(|principal| principal.name() == "user/u@example.com");
    let parents: Vec<&str> = user
        .map(|principal| principal.parents().iter().map(String::as_str).collect())
        .unwrap_or_default();
    assert_eq!(parents, vec!["group/g1@example.com", "group/g2@example.com"]);
}

#[tokio::test]
async fn later_membership_replaces_parents() {
    let harness = Harness::new(FakePermissionSource::default());
    let membership = |groups: Value| {
        record(
            "membership",
            json!({
                "member": { "member_type": "USER", "member_email": "u@example.com" },
                "groups": groups,
            }),
        )
    };
    let (model_id, result) = harness
        .import(vec![
            membership(json!(["a@example.com"])),
            membership(json!(["b@example.com"])),
        ])
        .await;

    assert!(result.is_ok());
    let user = harness
        .store
        .list_principals(model_id)
        .await
        .unwrap_or_default()
        .into_iter()
        .find(|principal| principal.name() == "user/u@example.com");
    let parents: Vec<String> = user
        .map(|principal| principal.parents().iter().cloned().collect())
        .unwrap_or_default();
    assert_eq!(parents, vec!["group/b@example.com".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_is_written_at_least_once_per_interval() {
    let harness = Harness::with_settings(
        FakePermissionSource::default(),
        ImportSettings {
            heartbeat_interval: Duration::from_secs(10),
            ..ImportSettings::default()
        },
    );
    let records = (0..25)
        .map(|index| record("group", json!(format!("g{index}@example.com"))))
        .collect();
    let (_, result) = harness
        .import_from(VecRecordSource::paced(records, Duration::from_secs(1)))
        .await;

    let summary = result.unwrap_or_else(|_| unreachable!());
    assert!(summary.heartbeats >= 2);

    let heartbeats = harness.store.heartbeats().await;
    assert_eq!(heartbeats.len() as u64, summary.heartbeats);
    assert!(heartbeats.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_keeps_beating_while_stream_stalls() {
    let interval = Duration::from_secs(10);
    let harness = Harness::with_settings(
        FakePermissionSource::default(),
        ImportSettings {
            heartbeat_interval: interval,
            ..ImportSettings::default()
        },
    );
    let started = tokio::time::Instant::now();
    let (_, result) = harness
        .import_from(VecRecordSource::paced(
            vec![record("group", json!("slow@example.com"))],
            Duration::from_secs(35),
        ))
        .await;
    let elapsed = started.elapsed();

    let summary = result.unwrap_or_else(|_| unreachable!());
    let floor = elapsed.as_secs() / interval.as_secs();
    assert!(floor >= 7);
    assert!(summary.heartbeats >= floor);
    assert_eq!(harness.store.heartbeats().await.len() as u64, summary.heartbeats);
}

#[tokio::test]
async fn cancelled_import_leaves_model_running() {
    let harness = Harness::new(FakePermissionSource::default());
    let model_id = harness.model_id().await;
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let result = harness
        .service
        .run_import(
            model_id,
            ImportRequest::Forseti(Box::new(VecRecordSource::new(vec![organization(
                "1", "Acme",
            )]))),
            cancellation,
        )
        .await;

    assert!(matches!(result, Err(AppError::Cancelled(_))));
    assert_eq!(
        harness.store.status(model_id).await,
        Some(ModelStatus::Running)
    );
}

#[tokio::test]
async fn empty_import_completes_model() {
    let harness = Harness::new(FakePermissionSource::default());
    let model_id = harness.model_id().await;

    let result = harness
        .service
        .run_import(model_id, ImportRequest::Empty, CancellationToken::new())
        .await;

    let summary = result.unwrap_or_else(|_| unreachable!());
    assert_eq!(summary.counts, GraphCounts::default());
    let model = harness.service.model(model_id).await;
    assert!(matches!(model, Ok(model) if model.is_complete()));
}

#[tokio::test]
async fn test_fixture_seeds_expected_graph() {
    let harness = Harness::new(FakePermissionSource::default());
    let model_id = harness.model_id().await;

    let result = harness
        .service
        .spawn_import(model_id, ImportRequest::Test, CancellationToken::new())
        .await;

    let summary = match result {
        Ok(Ok(summary)) => summary,
        _ => unreachable!(),
    };
    assert_eq!(
        summary.counts,
        GraphCounts {
            resources: 3,
            principals: 4,
            roles: 2,
            permissions: 2,
            bindings: 2,
        }
    );
    assert!(harness.permissions.calls.lock().await.is_empty());
    assert_eq!(harness.store.status(model_id).await, Some(ModelStatus::Done));
}

#[tokio::test]
async fn forseti_request_requires_a_record_source() {
    let request = ImportRequest::from_source(ImportSource::Forseti, None);
    assert!(matches!(request, Err(AppError::Validation(_))));

    let request = ImportRequest::from_source(ImportSource::Test, None);
    assert!(matches!(request, Ok(ImportRequest::Test)));
}

#[tokio::test]
async fn completed_model_cannot_be_imported_again() {
    let harness = Harness::new(FakePermissionSource::default());
    let model_id = harness.model_id().await;
    let first = harness
        .service
        .run_import(model_id, ImportRequest::Empty, CancellationToken::new())
        .await;
    assert!(first.is_ok());

    let second = harness
        .service
        .run_import(model_id, ImportRequest::Empty, CancellationToken::new())
        .await;
    assert!(second.is_err());
}

#[tokio::test]
async fn stale_running_model_is_marked_broken() {
    let harness = Harness::new(FakePermissionSource::default());
    let stale = harness.model_id().await;
    let fresh = harness.model_id().await;

    for model_id in [stale, fresh] {
        assert!(harness.store.mark_in_progress(model_id).await.is_ok());
    }
    let stale_beat = Utc::now() - chrono::Duration::minutes(30);
    assert!(
        harness
            .store
            .refresh_heartbeat(stale, stale_beat)
            .await
            .is_ok()
    );
    assert!(
        harness
            .store
            .refresh_heartbeat(fresh, Utc::now())
            .await
            .is_ok()
    );

    let broken = harness
        .service
        .sweep_stale_models(Duration::from_secs(120))
        .await
        .unwrap_or_default();

    assert_eq!(broken, vec![stale]);
    assert_eq!(harness.store.status(stale).await, Some(ModelStatus::Broken));
    assert_eq!(harness.store.status(fresh).await, Some(ModelStatus::Running));
}

#[tokio::test]
async fn oversized_stale_threshold_is_rejected() {
    let harness = Harness::new(FakePermissionSource::default());
    let model_id = harness.model_id().await;
    assert!(harness.store.mark_in_progress(model_id).await.is_ok());

    let result = harness
        .service
        .sweep_stale_models(Duration::from_secs(100_000_000_000_000))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(
        harness.store.status(model_id).await,
        Some(ModelStatus::Running)
    );
}

#[tokio::test]
async fn missing_model_is_not_found() {
    let harness = Harness::new(FakePermissionSource::default());
    let result = harness.service.model(ModelId::new()).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
