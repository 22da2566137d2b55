//! Subcommands and their execution.

use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Subcommand, ValueEnum};
use confcat_core::{
    CatalogPath, CatalogService, CollectionSchema, CollectionValue, ObjectKind, ParameterSchema,
    PutOutcome, SaveOptions, SaveResult, SchemaMetadata, Variant, Workspace, WorkspaceId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage catalogs
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage variants of a catalog
    Variant {
        #[command(subcommand)]
        action: VariantAction,
    },
    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    /// Parameter schemas
    Parameter {
        #[command(subcommand)]
        action: ObjectAction,
    },
    /// Collection schemas
    Collection {
        #[command(subcommand)]
        action: ObjectAction,
    },
    /// Collection values
    Value {
        #[command(subcommand)]
        action: ObjectAction,
    },
    /// Content-addressed objects
    Object {
        #[command(subcommand)]
        action: HashAction,
    },
    /// List the paths bound in a workspace
    List(ListArgs),
}

#[derive(Subcommand, Debug)]
pub enum CatalogAction {
    /// Create a catalog and its default variant
    Create {
        /// Catalog name
        name: String,
        /// Human description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List catalogs
    List,
}

#[derive(Subcommand, Debug)]
pub enum VariantAction {
    /// Create a variant
    Create {
        /// Owning catalog
        catalog: String,
        /// Variant name
        name: String,
    },
    /// List the variants of a catalog
    List {
        /// Owning catalog
        catalog: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceAction {
    /// Create the workspace of a variant
    Create {
        /// Owning catalog
        catalog: String,
        /// Variant; the catalog's default when omitted
        #[arg(long)]
        variant: Option<String>,
    },
    /// Show the workspace of a variant
    Show {
        /// Owning catalog
        catalog: String,
        /// Variant; the catalog's default when omitted
        #[arg(long)]
        variant: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ObjectAction {
    /// Save a document read from a JSON file
    Save {
        /// JSON document
        file: PathBuf,
        #[command(flatten)]
        options: SaveFlags,
    },
    /// Show the object bound at a path
    Get(Locator),
    /// Delete the object bound at a path
    Delete(Locator),
}

#[derive(Subcommand, Debug)]
pub enum HashAction {
    /// Show an object by content hash
    Get {
        /// Hex SHA-512 hash
        hash: String,
    },
}

/// Save switches.
#[derive(ClapArgs, Debug, Default)]
pub struct SaveFlags {
    /// Skip structural validation
    #[arg(long)]
    pub skip_structure: bool,
    /// Skip dependency validation
    #[arg(long)]
    pub skip_dependencies: bool,
    /// Fill unset collection slot values with their defaults
    #[arg(long)]
    pub set_defaults: bool,
    /// Fail if something is already bound at the path
    #[arg(long)]
    pub error_if_exists: bool,
    /// Fail if the save would change nothing
    #[arg(long)]
    pub error_if_equal: bool,
}

impl SaveFlags {
    fn to_options(&self) -> SaveOptions {
        SaveOptions::new()
            .with_validate_structure(!self.skip_structure)
            .with_validate_dependencies(!self.skip_dependencies)
            .with_set_defaults(self.set_defaults)
            .with_error_if_exists(self.error_if_exists)
            .with_error_if_equal(self.error_if_equal)
    }
}

/// Where an object lives.
#[derive(ClapArgs, Debug)]
pub struct Locator {
    /// Owning catalog
    pub catalog: String,
    /// Full path including the object's name, e.g. /app/db/timeout
    pub path: String,
    /// Variant; the catalog's default when omitted
    #[arg(long)]
    pub variant: Option<String>,
    /// Namespace; the root namespace when omitted
    #[arg(long)]
    pub namespace: Option<String>,
}

impl Locator {
    fn to_metadata(&self) -> Result<SchemaMetadata> {
        let full = CatalogPath::parse(&self.path).map_err(Error::Argument)?;
        let (parent, name) = match (full.parent(), full.leaf()) {
            (Some(parent), Some(name)) => (parent, name.to_string()),
            _ => return Err(Error::Argument(format!("path '{}' names no object", self.path))),
        };
        let mut metadata = SchemaMetadata::new(&self.catalog, parent, name);
        metadata.variant = self.variant.clone();
        metadata.namespace = self.namespace.clone();
        Ok(metadata)
    }
}

#[derive(ClapArgs, Debug)]
pub struct ListArgs {
    /// Object kind
    #[arg(value_enum)]
    pub kind: KindArg,
    /// Workspace id; use --catalog instead to look it up
    #[arg(long, conflicts_with = "catalog")]
    pub workspace: Option<String>,
    /// Catalog whose workspace to list
    #[arg(long)]
    pub catalog: Option<String>,
    /// Variant, with --catalog
    #[arg(long, requires = "catalog")]
    pub variant: Option<String>,
    /// Namespace; the root namespace when omitted
    #[arg(long)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Parameter schemas
    Parameter,
    /// Collection schemas
    Collection,
    /// Collection values
    Value,
}

impl From<KindArg> for ObjectKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Parameter => ObjectKind::ParameterSchema,
            KindArg::Collection => ObjectKind::CollectionSchema,
            KindArg::Value => ObjectKind::CollectionValue,
        }
    }
}

/// Run a command and render its pretty JSON output.
pub fn execute(service: &CatalogService, command: &Command) -> Result<String> {
    let output = match command {
        Command::Catalog { action } => match action {
            CatalogAction::Create { name, description } => {
                let catalog = service.scopes().create_catalog(name, description)?;
                json!({
                    "name": catalog.name,
                    "description": catalog.description,
                    "defaultVariant": catalog.default_variant,
                    "createdAt": catalog.created_at,
                })
            }
            CatalogAction::List => {
                let catalogs = service.scopes().list_catalogs()?;
                Value::Array(catalogs.into_iter().map(|c| json!(c.name)).collect())
            }
        },
        Command::Variant { action } => match action {
            VariantAction::Create { catalog, name } => {
                variant_json(&service.scopes().create_variant(catalog, name)?)
            }
            VariantAction::List { catalog } => {
                let variants = service.scopes().list_variants(catalog)?;
                Value::Array(variants.iter().map(variant_json).collect())
            }
        },
        Command::Workspace { action } => match action {
            WorkspaceAction::Create { catalog, variant } => {
                workspace_json(&service.scopes().create_workspace(catalog, variant.as_deref())?)
            }
            WorkspaceAction::Show { catalog, variant } => {
                workspace_json(&service.scopes().workspace_for(catalog, variant.as_deref())?)
            }
        },
        Command::Parameter { action } => {
            run_object(service, ObjectKind::ParameterSchema, action, |file, options| {
                let schema: ParameterSchema = read_document(file)?;
                Ok(service.save_parameter_schema(schema, options)?)
            })?
        }
        Command::Collection { action } => {
            run_object(service, ObjectKind::CollectionSchema, action, |file, options| {
                let schema: CollectionSchema = read_document(file)?;
                Ok(service.save_collection_schema(schema, options)?)
            })?
        }
        Command::Value { action } => {
            run_object(service, ObjectKind::CollectionValue, action, |file, options| {
                let value: CollectionValue = read_document(file)?;
                Ok(service.save_collection_value(value, options)?)
            })?
        }
        Command::Object {
            action: HashAction::Get { hash },
        } => to_json(&service.load_by_hash(hash)?)?,
        Command::List(args) => {
            let workspace = match (&args.workspace, &args.catalog) {
                (Some(id), _) => id.parse::<WorkspaceId>()?,
                (None, Some(catalog)) => service
                    .scopes()
                    .workspace_for(catalog, args.variant.as_deref())?
                    .workspace_id(),
                (None, None) => {
                    return Err(Error::Argument("one of --workspace or --catalog is required".into()))
                }
            };
            let paths = service.list(&workspace, args.kind.into(), args.namespace.as_deref())?;
            Value::Array(paths.iter().map(|p| json!(p.to_string())).collect())
        }
    };

    serde_json::to_string_pretty(&output).map_err(|source| Error::Json {
        context: "output".into(),
        source,
    })
}

fn run_object<F>(
    service: &CatalogService,
    kind: ObjectKind,
    action: &ObjectAction,
    save: F,
) -> Result<Value>
where
    F: FnOnce(&Path, &SaveOptions) -> Result<SaveResult>,
{
    match action {
        ObjectAction::Save { file, options } => {
            let result = save(file, &options.to_options())?;
            Ok(save_json(&result))
        }
        ObjectAction::Get(locator) => {
            let loaded = service.load_by_path(kind, &locator.to_metadata()?)?;
            to_json(&loaded)
        }
        ObjectAction::Delete(locator) => {
            let metadata = locator.to_metadata()?;
            let hash = match kind {
                ObjectKind::ParameterSchema => service.delete_parameter_schema(&metadata)?,
                ObjectKind::CollectionSchema => service.delete_collection_schema(&metadata)?,
                ObjectKind::CollectionValue => service.delete_collection_value(&metadata)?,
            };
            Ok(json!({ "deleted": locator.path, "hash": hash }))
        }
    }
}

fn read_document<T: DeserializeOwned>(file: &Path) -> Result<T> {
    let text = std::fs::read_to_string(file).map_err(|source| Error::Read {
        path: file.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| Error::Json {
        context: file.display().to_string(),
        source,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|source| Error::Json {
        context: "output".into(),
        source,
    })
}

fn save_json(result: &SaveResult) -> Value {
    let blob = match result.blob {
        PutOutcome::Created => "created",
        PutOutcome::AlreadyExists => "alreadyExists",
    };
    json!({
        "path": result.path.to_string(),
        "hash": result.hash,
        "state": result.state,
        "blob": blob,
        "references": result.references.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
    })
}

fn variant_json(variant: &Variant) -> Value {
    json!({
        "catalog": variant.catalog,
        "name": variant.name,
        "workspace": variant.workspace_id().map(|id| id.to_string()),
    })
}

fn workspace_json(workspace: &Workspace) -> Value {
    json!({
        "id": workspace.workspace_id().to_string(),
        "catalog": workspace.catalog,
        "variant": workspace.variant,
        "createdAt": workspace.created_at,
    })
}
