use crate::common::{Document, Value};
use crate::errors::RunwayResult;
use crate::store::DocumentStore;
use crate::transaction::MigrationContext;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A unit of work inside a migration process.
///
/// Commands run inside the atomic scope of their migration and act on the
/// target store only through [MigrationContext::store]. A failing command
/// rolls back the whole migration; commands are never retried one by one.
///
/// `name` and `definition` identify the command for the checksum: two
/// commands with the same name and definition must do the same thing.
pub trait Command: Send + Sync {
    /// Returns the registry name of the command.
    fn name(&self) -> &str;

    /// Returns the identifying configuration of the command, rendered
    /// deterministically.
    fn definition(&self) -> String;

    /// Runs the command against the scope held by the context.
    fn execute(&self, ctx: &MigrationContext) -> RunwayResult<()>;
}

/// Closure run by a [MigrationCommand::Custom] command.
pub type CustomAction = Arc<dyn Fn(&MigrationContext) -> RunwayResult<()> + Send + Sync>;

/// The built-in commands.
///
/// Every variant except `Custom` can be rebuilt from its
/// [arguments](MigrationCommand::arguments) by the
/// [CommandRegistry](crate::migration::CommandRegistry).
#[derive(Clone)]
pub enum MigrationCommand {
    /// Creates an empty collection; fails if it exists.
    CreateCollection { collection: String },
    /// Drops a collection and all its documents.
    DropCollection { collection: String },
    /// Renames a collection; fails if the target name is taken.
    RenameCollection { from: String, to: String },
    /// Inserts documents into an existing collection.
    InsertDocuments {
        collection: String,
        documents: Vec<Document>,
    },
    /// Sets `field` to `default` on every document that lacks it.
    AddField {
        collection: String,
        field: String,
        default: Value,
    },
    /// Moves the value of `from` to `to` on every document that has `from`.
    RenameField {
        collection: String,
        from: String,
        to: String,
    },
    /// Removes `field` from every document.
    DeleteField { collection: String, field: String },
    /// Runs arbitrary code. The definition string stands in for the code
    /// in the checksum, so it must change whenever the behaviour does.
    Custom {
        name: String,
        definition: String,
        action: CustomAction,
    },
}

impl MigrationCommand {
    pub fn create_collection(collection: &str) -> Self {
        MigrationCommand::CreateCollection {
            collection: collection.to_string(),
        }
    }

    pub fn drop_collection(collection: &str) -> Self {
        MigrationCommand::DropCollection {
            collection: collection.to_string(),
        }
    }

    pub fn rename_collection(from: &str, to: &str) -> Self {
        MigrationCommand::RenameCollection {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn insert_documents(collection: &str, documents: Vec<Document>) -> Self {
        MigrationCommand::InsertDocuments {
            collection: collection.to_string(),
            documents,
        }
    }

    pub fn add_field<V: Into<Value>>(collection: &str, field: &str, default: V) -> Self {
        MigrationCommand::AddField {
            collection: collection.to_string(),
            field: field.to_string(),
            default: default.into(),
        }
    }

    pub fn rename_field(collection: &str, from: &str, to: &str) -> Self {
        MigrationCommand::RenameField {
            collection: collection.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn delete_field(collection: &str, field: &str) -> Self {
        MigrationCommand::DeleteField {
            collection: collection.to_string(),
            field: field.to_string(),
        }
    }

    pub fn custom<F>(name: &str, definition: &str, action: F) -> Self
    where
        F: Fn(&MigrationContext) -> RunwayResult<()> + Send + Sync + 'static,
    {
        MigrationCommand::Custom {
            name: name.to_string(),
            definition: definition.to_string(),
            action: Arc::new(action),
        }
    }

    /// Returns the arguments the command was built from. `Custom` commands
    /// report their definition under `definition`.
    pub fn arguments(&self) -> Document {
        let mut args = Document::new();
        // keys are non-empty literals, put cannot fail
        let mut set = |key: &str, value: Value| {
            let _ = args.put(key, value);
        };
        match self {
            MigrationCommand::CreateCollection { collection }
            | MigrationCommand::DropCollection { collection } => {
                set("collection", collection.into());
            }
            MigrationCommand::RenameCollection { from, to } => {
                set("from", from.into());
                set("to", to.into());
            }
            MigrationCommand::InsertDocuments {
                collection,
                documents,
            } => {
                set("collection", collection.into());
                set("documents", documents.clone().into());
            }
            MigrationCommand::AddField {
                collection,
                field,
                default,
            } => {
                set("collection", collection.into());
                set("field", field.into());
                set("default", default.clone());
            }
            MigrationCommand::RenameField {
                collection,
                from,
                to,
            } => {
                set("collection", collection.into());
                set("from", from.into());
                set("to", to.into());
            }
            MigrationCommand::DeleteField { collection, field } => {
                set("collection", collection.into());
                set("field", field.into());
            }
            MigrationCommand::Custom { definition, .. } => {
                set("definition", definition.into());
            }
        }
        args
    }

    fn update_documents<F>(ctx: &MigrationContext, collection: &str, update: F) -> RunwayResult<()>
    where
        F: Fn(&mut Document) -> RunwayResult<bool>,
    {
        let store = ctx.store();
        for (id, document) in store.find_all(collection)? {
            let mut document = document;
            if update(&mut document)? {
                store.put(collection, id, document)?;
            }
        }
        Ok(())
    }
}

impl Command for MigrationCommand {
    fn name(&self) -> &str {
        match self {
            MigrationCommand::CreateCollection { .. } => "create_collection",
            MigrationCommand::DropCollection { .. } => "drop_collection",
            MigrationCommand::RenameCollection { .. } => "rename_collection",
            MigrationCommand::InsertDocuments { .. } => "insert_documents",
            MigrationCommand::AddField { .. } => "add_field",
            MigrationCommand::RenameField { .. } => "rename_field",
            MigrationCommand::DeleteField { .. } => "delete_field",
            MigrationCommand::Custom { name, .. } => name,
        }
    }

    fn definition(&self) -> String {
        match self {
            MigrationCommand::Custom { definition, .. } => definition.clone(),
            _ => self.arguments().to_string(),
        }
    }

    fn execute(&self, ctx: &MigrationContext) -> RunwayResult<()> {
        let store = ctx.store();
        match self {
            MigrationCommand::CreateCollection { collection } => {
                store.create_collection(collection)
            }
            MigrationCommand::DropCollection { collection } => store.drop_collection(collection),
            MigrationCommand::RenameCollection { from, to } => store.rename_collection(from, to),
            MigrationCommand::InsertDocuments {
                collection,
                documents,
            } => {
                for document in documents {
                    store.insert(collection, document.clone())?;
                }
                Ok(())
            }
            MigrationCommand::AddField {
                collection,
                field,
                default,
            } => Self::update_documents(ctx, collection, |document| {
                if document.contains_key(field) {
                    return Ok(false);
                }
                document.put(field, default.clone())?;
                Ok(true)
            }),
            MigrationCommand::RenameField {
                collection,
                from,
                to,
            } => Self::update_documents(ctx, collection, |document| {
                match document.remove(from) {
                    Some(value) => {
                        document.put(to, value)?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }),
            MigrationCommand::DeleteField { collection, field } => {
                Self::update_documents(ctx, collection, |document| {
                    Ok(document.remove(field).is_some())
                })
            }
            MigrationCommand::Custom { action, .. } => action(ctx),
        }
    }
}

impl Debug for MigrationCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name(), self.definition())
    }
}
