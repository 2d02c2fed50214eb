use crate::common::{Document, Value};
use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::migration::{Command, MigrationCommand};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Builds a command from its argument document.
pub type CommandFactory = Arc<dyn Fn(&Document) -> RunwayResult<Arc<dyn Command>> + Send + Sync>;

/// Name-keyed table of command factories.
///
/// Discovery collaborators that read migration definitions from data turn
/// each `(name, arguments)` pair into a command through the registry. It
/// starts out with the built-in commands; more can be registered at startup.
/// Clones share the same table.
///
/// # Examples
///
/// ```rust
/// use runway::doc;
/// use runway::migration::CommandRegistry;
///
/// let registry = CommandRegistry::new();
/// let command = registry.build("create_collection", &doc! { "collection": "users" }).unwrap();
/// assert_eq!(command.name(), "create_collection");
/// ```
#[derive(Clone)]
pub struct CommandRegistry {
    factories: Arc<RwLock<IndexMap<String, CommandFactory>>>,
}

impl CommandRegistry {
    /// Creates a registry holding the built-in commands.
    pub fn new() -> Self {
        let registry = CommandRegistry {
            factories: Arc::new(RwLock::new(IndexMap::new())),
        };
        registry.register_builtins();
        registry
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the name is already taken.
    pub fn register<F>(&self, name: &str, factory: F) -> RunwayResult<()>
    where
        F: Fn(&Document) -> RunwayResult<Arc<dyn Command>> + Send + Sync + 'static,
    {
        let mut factories = self.factories.write();
        if factories.contains_key(name) {
            log::error!("Command '{}' is already registered", name);
            return Err(RunwayError::new(
                &format!("Command '{}' is already registered", name),
                ErrorKind::InvalidOperation,
            ));
        }
        factories.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    /// Returns the registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    /// Builds the command registered under `name` from `arguments`.
    pub fn build(&self, name: &str, arguments: &Document) -> RunwayResult<Arc<dyn Command>> {
        let factory = self.factories.read().get(name).cloned();
        match factory {
            Some(factory) => factory(arguments),
            None => Err(RunwayError::new(
                &format!("No command registered under '{}'", name),
                ErrorKind::NotFound,
            )),
        }
    }

    fn register_builtins(&self) {
        let builtins: [(&str, fn(&Document) -> RunwayResult<MigrationCommand>); 7] = [
            ("create_collection", |args| {
                Ok(MigrationCommand::create_collection(args.get_str("collection")?))
            }),
            ("drop_collection", |args| {
                Ok(MigrationCommand::drop_collection(args.get_str("collection")?))
            }),
            ("rename_collection", |args| {
                Ok(MigrationCommand::rename_collection(
                    args.get_str("from")?,
                    args.get_str("to")?,
                ))
            }),
            ("insert_documents", |args| {
                Ok(MigrationCommand::insert_documents(
                    args.get_str("collection")?,
                    documents_argument(args)?,
                ))
            }),
            ("add_field", |args| {
                Ok(MigrationCommand::add_field(
                    args.get_str("collection")?,
                    args.get_str("field")?,
                    args.get("default").cloned().unwrap_or(Value::Null),
                ))
            }),
            ("rename_field", |args| {
                Ok(MigrationCommand::rename_field(
                    args.get_str("collection")?,
                    args.get_str("from")?,
                    args.get_str("to")?,
                ))
            }),
            ("delete_field", |args| {
                Ok(MigrationCommand::delete_field(
                    args.get_str("collection")?,
                    args.get_str("field")?,
                ))
            }),
        ];

        let mut factories = self.factories.write();
        for (name, build) in builtins {
            let factory: CommandFactory =
                Arc::new(move |args: &Document| -> RunwayResult<Arc<dyn Command>> {
                    Ok(Arc::new(build(args)?))
                });
            factories.insert(name.to_string(), factory);
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn documents_argument(args: &Document) -> RunwayResult<Vec<Document>> {
    let values = args
        .get("documents")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            RunwayError::new(
                "Field 'documents' must be an array of documents",
                ErrorKind::ValidationError,
            )
        })?;

    values
        .iter()
        .map(|value| {
            value.as_document().cloned().ok_or_else(|| {
                RunwayError::new(
                    &format!("Expected a document, found {}", value.type_name()),
                    ErrorKind::ValidationError,
                )
            })
        })
        .collect()
}
