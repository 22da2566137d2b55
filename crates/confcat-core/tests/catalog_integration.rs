//! Integration tests for the catalog service.

use confcat_core::{
    CatalogPath, CatalogService, CollectionSchema, CollectionSpec, CollectionValue, EngineConfig,
    Error, ErrorKind, ObjectKind, ParameterSchema, ParameterSpec, PutOutcome, SaveOptions,
    SaveState, SchemaMetadata, SlotSpec, StorageConfig, ValueSpec, WorkspaceId, DataTypeRegistry,
    SCHEMA_VERSION,
};
use serde_json::{json, Value};

struct TestContext {
    service: CatalogService,
    workspace: WorkspaceId,
}

impl TestContext {
    fn new() -> Self {
        let service = CatalogService::temporary().unwrap();
        service.scopes().create_catalog("acme", "test catalog").unwrap();
        let workspace = service.scopes().create_workspace("acme", None).unwrap();
        Self {
            service,
            workspace: workspace.workspace_id(),
        }
    }

    fn save_parameter(&self, path: &str, name: &str, validation: Value) -> Result<confcat_core::SaveResult, Error> {
        self.service
            .save_parameter_schema(parameter(path, name, validation), &SaveOptions::new())
    }

    fn save_collection(&self, path: &str, name: &str, spec: CollectionSpec) -> Result<confcat_core::SaveResult, Error> {
        self.service
            .save_collection_schema(collection(path, name, spec), &SaveOptions::new())
    }

    fn save_value(&self, name: &str, schema: &str, values: &[(&str, Value)]) -> Result<confcat_core::SaveResult, Error> {
        let mut spec = ValueSpec::new(CatalogPath::parse(schema).unwrap());
        for (slot, v) in values {
            spec = spec.with_value(*slot, v.clone());
        }
        let value = CollectionValue {
            version: SCHEMA_VERSION.to_string(),
            metadata: meta("/", name),
            spec,
        };
        self.service.save_collection_value(value, &SaveOptions::new())
    }

    fn referrers(&self, kind: ObjectKind, path: &str, name: &str) -> Vec<String> {
        self.service.load_by_path(kind, &meta(path, name)).unwrap().referrers
    }
}

fn meta(path: &str, name: &str) -> SchemaMetadata {
    SchemaMetadata::new("acme", CatalogPath::parse(path).unwrap(), name)
}

fn parameter(path: &str, name: &str, validation: Value) -> ParameterSchema {
    ParameterSchema {
        version: SCHEMA_VERSION.to_string(),
        metadata: meta(path, name),
        spec: ParameterSpec::new("Integer").with_validation(validation),
    }
}

fn collection(path: &str, name: &str, spec: CollectionSpec) -> CollectionSchema {
    CollectionSchema {
        version: SCHEMA_VERSION.to_string(),
        metadata: meta(path, name),
        spec,
    }
}

#[test]
fn test_identical_specs_share_one_blob() {
    let ctx = TestContext::new();

    let first = ctx.save_parameter("/", "retries", json!({"maxValue": 10})).unwrap();
    let second = ctx.save_parameter("/", "attempts", json!({"maxValue": 10})).unwrap();

    assert_eq!(first.hash, second.hash);
    assert_eq!(first.blob, PutOutcome::Created);
    assert_eq!(second.blob, PutOutcome::AlreadyExists);
    assert_eq!(second.state, SaveState::Created);
    assert_eq!(ctx.service.store().blobs().len(), 1);

    let by_hash = ctx.service.load_by_hash(&first.hash).unwrap();
    assert_eq!(by_hash.kind, ObjectKind::ParameterSchema);
    assert_eq!(by_hash.spec["validation"]["maxValue"], json!(10));
    assert!(by_hash.path.is_none());
}

#[test]
fn test_resave_is_idempotent() {
    let ctx = TestContext::new();
    let first = ctx.save_parameter("/", "retries", json!({"maxValue": 10})).unwrap();
    let again = ctx.save_parameter("/", "retries", json!({"maxValue": 10})).unwrap();
    assert_eq!(again.state, SaveState::Unchanged);
    assert_eq!(again.hash, first.hash);

    let strict = SaveOptions::new().with_error_if_equal(true);
    let err = ctx
        .service
        .save_parameter_schema(parameter("/", "retries", json!({"maxValue": 10})), &strict)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOp);

    let create_only = SaveOptions::new().with_error_if_exists(true);
    let err = ctx
        .service
        .save_parameter_schema(parameter("/", "retries", json!({"maxValue": 20})), &create_only)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let updated = ctx.save_parameter("/", "retries", json!({"maxValue": 20})).unwrap();
    assert_eq!(updated.state, SaveState::Updated);
    assert_ne!(updated.hash, first.hash);
}

#[test]
fn test_structural_errors_are_reported_together() {
    let ctx = TestContext::new();
    let mut schema = parameter("/", "9bad", json!({"minValue": 5, "maxValue": 1}));
    schema.version = "v0".to_string();

    match ctx.service.save_parameter_schema(schema, &SaveOptions::new()).unwrap_err() {
        Error::Validation(errors) => {
            assert!(errors.has_field("metadata.name"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let mut schema = parameter("/", "retries", json!({"minValue": 5, "maxValue": 1}));
    schema.version = "v0".to_string();
    match ctx.service.save_parameter_schema(schema, &SaveOptions::new()).unwrap_err() {
        Error::Validation(errors) => {
            assert!(errors.has_field("version"));
            assert!(errors.has_field("spec.validation.maxValue"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(ctx.service.store().blobs().is_empty());
}

#[test]
fn test_closest_parent_resolution_moves_edges() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"maxValue": 100})).unwrap();
    ctx.save_collection("/", "A", CollectionSpec::default()).unwrap();

    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("P"));
    let saved = ctx.save_collection("/A", "B", spec.clone()).unwrap();
    assert_eq!(saved.references.len(), 1);
    assert_eq!(saved.references[0].to_string(), "_root:/P");
    assert_eq!(ctx.referrers(ObjectKind::ParameterSchema, "/", "P"), vec!["_root:/A/B"]);

    // A closer definition shadows the root one on the next save.
    ctx.save_parameter("/A", "P", json!({"maxValue": 50})).unwrap();
    let moved = ctx.save_collection("/A", "B", spec).unwrap();
    assert_eq!(moved.state, SaveState::Updated);
    assert_eq!(moved.hash, saved.hash);
    assert_eq!(moved.references[0].to_string(), "_root:/A/P");

    assert!(ctx.referrers(ObjectKind::ParameterSchema, "/", "P").is_empty());
    assert_eq!(ctx.referrers(ObjectKind::ParameterSchema, "/A", "P"), vec!["_root:/A/B"]);

    let loaded = ctx
        .service
        .load_by_path(ObjectKind::CollectionSchema, &meta("/A", "B"))
        .unwrap();
    assert_eq!(loaded.references, vec!["_root:/A/P"]);
}

#[test]
fn test_parent_collection_must_exist() {
    let ctx = TestContext::new();
    let err = ctx.save_parameter("/missing", "P", Value::Null).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);

    let err = ctx
        .save_collection("/missing", "C", CollectionSpec::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);
}

#[test]
fn test_unresolved_reference_is_not_found() {
    let ctx = TestContext::new();
    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("nope"));
    let err = ctx.save_collection("/", "C", spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("/no/such"));
    let err = ctx.save_collection("/", "C", spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_delete_guarded_by_referrers_and_children() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", Value::Null).unwrap();
    ctx.save_collection("/", "A", CollectionSpec::default()).unwrap();
    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("P"));
    ctx.save_collection("/A", "B", spec).unwrap();

    match ctx.service.delete_parameter_schema(&meta("/", "P")).unwrap_err() {
        Error::DeletionConflict { blockers, .. } => assert_eq!(blockers, vec!["_root:/A/B"]),
        other => panic!("unexpected error {:?}", other),
    }

    match ctx.service.delete_collection_schema(&meta("/", "A")).unwrap_err() {
        Error::DeletionConflict { blockers, .. } => assert_eq!(blockers, vec!["_root:/A/B"]),
        other => panic!("unexpected error {:?}", other),
    }

    ctx.service.delete_collection_schema(&meta("/A", "B")).unwrap();
    assert!(ctx.referrers(ObjectKind::ParameterSchema, "/", "P").is_empty());

    ctx.service.delete_parameter_schema(&meta("/", "P")).unwrap();
    ctx.service.delete_collection_schema(&meta("/", "A")).unwrap();

    let err = ctx
        .service
        .load_by_path(ObjectKind::ParameterSchema, &meta("/", "P"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = ctx.service.delete_parameter_schema(&meta("/", "P")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_tightening_a_parameter_revalidates_dependents() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"maxValue": 100})).unwrap();
    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference_with_value("P", json!(50)));
    ctx.save_collection("/", "C", spec).unwrap();

    let err = ctx.save_parameter("/", "P", json!({"maxValue": 10})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);
    let stored = ctx
        .service
        .load_by_path(ObjectKind::ParameterSchema, &meta("/", "P"))
        .unwrap();
    assert_eq!(stored.spec["validation"]["maxValue"], json!(100));

    ctx.save_parameter("/", "P", json!({"maxValue": 60})).unwrap();
    ctx.save_value("prod", "/C", &[("x", json!(55))]).unwrap();

    // The override still fits; the stored value does not.
    let err = ctx.save_parameter("/", "P", json!({"maxValue": 52})).unwrap_err();
    match err {
        Error::Dependency { path, .. } => assert_eq!(path, "_root:/prod"),
        other => panic!("unexpected error {:?}", other),
    }

    // Skipping dependency checks lets the change through.
    let unchecked = SaveOptions::new().with_validate_dependencies(false);
    ctx.service
        .save_parameter_schema(parameter("/", "P", json!({"maxValue": 52})), &unchecked)
        .unwrap();
}

#[test]
fn test_override_is_checked_against_parameter() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"maxValue": 10})).unwrap();
    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference_with_value("P", json!(11)));
    let err = ctx.save_collection("/", "C", spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);
}

#[test]
fn test_collection_defaults_are_filled_on_request() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"minValue": 3})).unwrap();
    let spec = CollectionSpec::default()
        .with_slot("x", SlotSpec::reference("P"))
        .with_slot("flag", SlotSpec::inline("Boolean", Value::Null));

    let options = SaveOptions::new().with_set_defaults(true);
    ctx.service
        .save_collection_schema(collection("/", "C", spec), &options)
        .unwrap();

    let loaded = ctx
        .service
        .load_by_path(ObjectKind::CollectionSchema, &meta("/", "C"))
        .unwrap();
    assert_eq!(loaded.spec["parameters"]["x"]["value"], json!(3));
    assert_eq!(loaded.spec["parameters"]["flag"]["default"], json!(false));
}

#[test]
fn test_collection_value_lifecycle() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"maxValue": 100})).unwrap();
    let spec = CollectionSpec::default()
        .with_slot("x", SlotSpec::reference_with_value("P", json!(7)))
        .with_slot("y", SlotSpec::reference("P"));
    ctx.save_collection("/", "C", spec).unwrap();
    ctx.save_collection("/", "D", CollectionSpec::default()).unwrap();

    let saved = ctx.save_value("prod", "/C", &[("y", json!(42))]).unwrap();
    assert_eq!(saved.state, SaveState::Created);
    assert_eq!(saved.references[0].to_string(), "_root:/C");
    assert_eq!(ctx.referrers(ObjectKind::CollectionSchema, "/", "C"), vec!["_root:/prod"]);

    let loaded = ctx.service.get_collection_value(&meta("/", "prod")).unwrap();
    assert_eq!(loaded.spec["values"]["x"].as_i64(), Some(7));
    assert_eq!(loaded.spec["values"]["y"].as_i64(), Some(42));

    let err = ctx.save_value("prod", "/C", &[("z", json!(1))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ctx.save_value("prod", "/C", &[("y", json!(101))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);

    let err = ctx.save_value("prod", "/D", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Immutable);

    let err = ctx.save_value("other", "/missing", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // A slot still holding a value cannot be dropped from the collection.
    let shrunk = CollectionSpec::default().with_slot("x", SlotSpec::reference_with_value("P", json!(7)));
    let err = ctx.save_collection("/", "C", shrunk).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);

    let err = ctx.service.delete_collection_schema(&meta("/", "C")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeletionConflict);

    ctx.service.delete_collection_value(&meta("/", "prod")).unwrap();
    assert!(ctx.referrers(ObjectKind::CollectionSchema, "/", "C").is_empty());
    ctx.service.delete_collection_schema(&meta("/", "C")).unwrap();
}

#[test]
fn test_namespace_falls_back_to_root() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", Value::Null).unwrap();

    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("P"));
    let mut schema = collection("/", "C", spec.clone());
    schema.metadata = schema.metadata.with_namespace("team");
    let saved = ctx
        .service
        .save_collection_schema(schema, &SaveOptions::new())
        .unwrap();
    assert_eq!(saved.path.to_string(), "team:/C");
    assert_eq!(saved.references[0].to_string(), "_root:/P");

    // Once the namespace has its own P, it wins.
    let mut local = parameter("/", "P", json!({"maxValue": 5}));
    local.metadata = local.metadata.with_namespace("team");
    ctx.service
        .save_parameter_schema(local, &SaveOptions::new())
        .unwrap();
    let mut schema = collection("/", "C", spec);
    schema.metadata = schema.metadata.with_namespace("team");
    let saved = ctx
        .service
        .save_collection_schema(schema, &SaveOptions::new())
        .unwrap();
    assert_eq!(saved.references[0].to_string(), "team:/P");

    let team = ctx
        .service
        .list(&ctx.workspace, ObjectKind::ParameterSchema, Some("team"))
        .unwrap();
    assert_eq!(team.len(), 1);
    let root = ctx
        .service
        .list(&ctx.workspace, ObjectKind::ParameterSchema, None)
        .unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].to_string(), "_root:/P");
}

#[test]
fn test_variants_are_isolated() {
    let ctx = TestContext::new();
    ctx.service.scopes().create_variant("acme", "staging").unwrap();
    let staging = ctx
        .service
        .scopes()
        .create_workspace("acme", Some("staging"))
        .unwrap();

    let mut schema = parameter("/", "P", Value::Null);
    schema.metadata = schema.metadata.with_variant("staging");
    ctx.service
        .save_parameter_schema(schema, &SaveOptions::new())
        .unwrap();

    let in_staging = ctx
        .service
        .list(&staging.workspace_id(), ObjectKind::ParameterSchema, None)
        .unwrap();
    assert_eq!(in_staging.len(), 1);
    let in_default = ctx
        .service
        .list(&ctx.workspace, ObjectKind::ParameterSchema, None)
        .unwrap();
    assert!(in_default.is_empty());

    let mut orphan = parameter("/", "P", Value::Null);
    orphan.metadata = orphan.metadata.with_variant("prod");
    let err = ctx
        .service
        .save_parameter_schema(orphan, &SaveOptions::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scope);
}

#[test]
fn test_depth_limit() {
    let service = CatalogService::open(
        StorageConfig::temporary(),
        EngineConfig::default().with_max_path_depth(2),
        DataTypeRegistry::with_builtins(),
    )
    .unwrap();
    service.scopes().create_catalog("acme", "").unwrap();
    service.scopes().create_workspace("acme", None).unwrap();

    let err = service
        .save_parameter_schema(parameter("/a/b", "P", Value::Null), &SaveOptions::new())
        .unwrap_err();
    match err {
        Error::Validation(errors) => assert!(errors.has_field("metadata.path")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_reopen_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let hash = {
        let service = CatalogService::open(
            StorageConfig::new(dir.path()),
            EngineConfig::default(),
            DataTypeRegistry::with_builtins(),
        )
        .unwrap();
        service.scopes().create_catalog("acme", "").unwrap();
        service.scopes().create_workspace("acme", None).unwrap();
        let saved = service
            .save_parameter_schema(parameter("/", "P", json!({"maxValue": 3})), &SaveOptions::new())
            .unwrap();
        service.store().flush().unwrap();
        saved.hash
    };

    let service = CatalogService::open(
        StorageConfig::new(dir.path()),
        EngineConfig::default(),
        DataTypeRegistry::with_builtins(),
    )
    .unwrap();
    let loaded = service
        .load_by_path(ObjectKind::ParameterSchema, &meta("/", "P"))
        .unwrap();
    assert_eq!(loaded.hash, hash);
    assert_eq!(loaded.version, SCHEMA_VERSION);
}

#[test]
fn test_lowering_override_first_allows_tightening() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"maxValue": 10})).unwrap();
    ctx.save_collection("/", "a", CollectionSpec::default()).unwrap();
    let with_override = |v: i64| {
        CollectionSpec::default().with_slot("x", SlotSpec::reference_with_value("P", json!(v)))
    };
    ctx.save_collection("/a", "b", with_override(8)).unwrap();

    let err = ctx.save_parameter("/", "P", json!({"maxValue": 5})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dependency);

    ctx.save_collection("/a", "b", with_override(5)).unwrap();
    let saved = ctx.save_parameter("/", "P", json!({"maxValue": 5})).unwrap();
    assert_eq!(saved.state, SaveState::Updated);
}

#[test]
fn test_load_round_trip() {
    let ctx = TestContext::new();
    let mut schema = parameter("/", "timeout", json!({"minValue": 1, "maxValue": 60}));
    schema.metadata = schema.metadata.with_description("request timeout in seconds");
    schema.spec = schema.spec.with_default(json!(30));
    let saved = ctx
        .service
        .save_parameter_schema(schema.clone(), &SaveOptions::new())
        .unwrap();

    let loaded = ctx
        .service
        .load_by_path(ObjectKind::ParameterSchema, &meta("/", "timeout"))
        .unwrap();
    assert_eq!(loaded.kind, ObjectKind::ParameterSchema);
    assert_eq!(loaded.version, SCHEMA_VERSION);
    assert_eq!(loaded.description, "request timeout in seconds");
    assert_eq!(loaded.hash, saved.hash);
    assert_eq!(loaded.path.as_deref(), Some("_root:/timeout"));
    assert_eq!(ParameterSpec::from_value(loaded.spec).unwrap(), schema.spec);

    let again = ctx
        .service
        .save_parameter_schema(schema, &SaveOptions::new())
        .unwrap();
    assert_eq!(again.hash, saved.hash);
    assert_eq!(again.state, SaveState::Unchanged);
}

#[test]
fn test_collection_resave_writes_nothing() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", Value::Null).unwrap();
    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("P"));
    let first = ctx.save_collection("/", "C", spec.clone()).unwrap();
    let blobs = ctx.service.store().blobs().len();

    let second = ctx.save_collection("/", "C", spec.clone()).unwrap();
    assert_eq!(second.state, SaveState::Unchanged);
    assert_eq!(second.hash, first.hash);
    assert_eq!(ctx.service.store().blobs().len(), blobs);
    assert_eq!(ctx.referrers(ObjectKind::ParameterSchema, "/", "P"), vec!["_root:/C"]);

    let err = ctx
        .service
        .save_collection_schema(collection("/", "C", spec), &SaveOptions::new().with_error_if_equal(true))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOp);
}

fn string_parameter(path: &str, name: &str, validation: Value) -> ParameterSchema {
    ParameterSchema {
        version: SCHEMA_VERSION.to_string(),
        metadata: meta(path, name),
        spec: ParameterSpec::new("String").with_validation(validation),
    }
}

#[test]
fn test_missing_slot_without_valid_default_is_rejected() {
    let ctx = TestContext::new();
    ctx.service
        .save_parameter_schema(string_parameter("/", "name", json!({"minLength": 3})), &SaveOptions::new())
        .unwrap();
    let spec = CollectionSpec::default().with_slot("n", SlotSpec::reference("name"));
    ctx.save_collection("/", "C", spec.clone()).unwrap();

    match ctx.save_value("prod", "/C", &[]).unwrap_err() {
        Error::Validation(errors) => assert!(errors.has_field("spec.values.n")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(ctx
        .service
        .list(&ctx.workspace, ObjectKind::CollectionValue, None)
        .unwrap()
        .is_empty());

    ctx.save_value("prod", "/C", &[("n", json!("abc"))]).unwrap();
    let loaded = ctx.service.get_collection_value(&meta("/", "prod")).unwrap();
    assert_eq!(loaded.spec["values"]["n"], json!("abc"));

    let options = SaveOptions::new().with_set_defaults(true);
    match ctx
        .service
        .save_collection_schema(collection("/", "D", spec), &options)
        .unwrap_err()
    {
        Error::Validation(errors) => assert!(errors.has_field("spec.parameters.n")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_filled_defaults_land_on_step() {
    let ctx = TestContext::new();
    ctx.save_parameter("/", "P", json!({"maxValue": -3, "step": 2})).unwrap();
    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("P"));

    let options = SaveOptions::new().with_set_defaults(true);
    ctx.service
        .save_collection_schema(collection("/", "C", spec.clone()), &options)
        .unwrap();
    let loaded = ctx
        .service
        .load_by_path(ObjectKind::CollectionSchema, &meta("/", "C"))
        .unwrap();
    assert_eq!(loaded.spec["parameters"]["x"]["value"], json!(-4));

    ctx.save_collection("/", "D", spec).unwrap();
    ctx.save_value("prod", "/D", &[]).unwrap();
    let value = ctx.service.get_collection_value(&meta("/", "prod")).unwrap();
    assert_eq!(value.spec["values"]["x"], json!(-4));
}

#[test]
fn test_root_collection_delete_sees_other_namespaces() {
    let ctx = TestContext::new();
    ctx.save_collection("/", "A", CollectionSpec::default()).unwrap();

    let mut nested = collection("/A", "X", CollectionSpec::default());
    nested.metadata = nested.metadata.with_namespace("team");
    ctx.service
        .save_collection_schema(nested, &SaveOptions::new())
        .unwrap();

    match ctx.service.delete_collection_schema(&meta("/", "A")).unwrap_err() {
        Error::DeletionConflict { blockers, .. } => assert_eq!(blockers, vec!["team:/A/X"]),
        other => panic!("unexpected error {:?}", other),
    }

    // With its own /A the namespace no longer hangs off the root collection.
    let mut local = collection("/", "A", CollectionSpec::default());
    local.metadata = local.metadata.with_namespace("team");
    ctx.service
        .save_collection_schema(local, &SaveOptions::new())
        .unwrap();
    ctx.service.delete_collection_schema(&meta("/", "A")).unwrap();
}

#[test]
fn test_reference_edges_follow_text_order() {
    let ctx = TestContext::new();
    ctx.save_collection("/", "a", CollectionSpec::default()).unwrap();
    ctx.save_parameter("/a", "b", Value::Null).unwrap();
    ctx.save_parameter("/a", "c", Value::Null).unwrap();
    ctx.save_parameter("/", "a-x", Value::Null).unwrap();

    let spec = CollectionSpec::default()
        .with_slot("b", SlotSpec::reference("b"))
        .with_slot("c", SlotSpec::reference("c"))
        .with_slot("x", SlotSpec::reference("a-x"));
    ctx.save_collection("/a", "C", spec).unwrap();

    let loaded = ctx
        .service
        .load_by_path(ObjectKind::CollectionSchema, &meta("/a", "C"))
        .unwrap();
    assert_eq!(loaded.references, vec!["_root:/a-x", "_root:/a/b", "_root:/a/c"]);
    assert_eq!(ctx.referrers(ObjectKind::ParameterSchema, "/", "a-x"), vec!["_root:/a/C"]);

    let shrunk = CollectionSpec::default().with_slot("b", SlotSpec::reference("b"));
    ctx.save_collection("/a", "C", shrunk).unwrap();
    assert!(ctx.referrers(ObjectKind::ParameterSchema, "/", "a-x").is_empty());
    assert!(ctx.referrers(ObjectKind::ParameterSchema, "/a", "c").is_empty());
    ctx.service.delete_parameter_schema(&meta("/", "a-x")).unwrap();
}

#[test]
fn test_flat_paths_bind_everything_at_root() {
    let service = CatalogService::open(
        StorageConfig::temporary(),
        EngineConfig::default().with_hierarchical_paths(false),
        DataTypeRegistry::with_builtins(),
    )
    .unwrap();
    service.scopes().create_catalog("acme", "").unwrap();
    service.scopes().create_workspace("acme", None).unwrap();

    let saved = service
        .save_parameter_schema(parameter("/missing", "P", json!({"maxValue": 5})), &SaveOptions::new())
        .unwrap();
    assert_eq!(saved.path.to_string(), "_root:/P");

    let spec = CollectionSpec::default().with_slot("x", SlotSpec::reference("P"));
    let saved = service
        .save_collection_schema(collection("/deep/er", "C", spec), &SaveOptions::new())
        .unwrap();
    assert_eq!(saved.path.to_string(), "_root:/C");
    assert_eq!(saved.references[0].to_string(), "_root:/P");

    let value = CollectionValue {
        version: SCHEMA_VERSION.to_string(),
        metadata: meta("/elsewhere", "prod"),
        spec: ValueSpec::new(CatalogPath::parse("/C").unwrap()).with_value("x", json!(4)),
    };
    let saved = service
        .save_collection_value(value, &SaveOptions::new())
        .unwrap();
    assert_eq!(saved.path.to_string(), "_root:/prod");

    let loaded = service
        .load_by_path(ObjectKind::ParameterSchema, &meta("/anywhere", "P"))
        .unwrap();
    assert_eq!(loaded.referrers, vec!["_root:/C"]);
}
