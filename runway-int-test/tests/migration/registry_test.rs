use runway::common::Document;
use runway::doc;
use runway::errors::{ErrorKind, RunwayResult};
use runway::migration::{
    ChecksumService, Command, CommandRegistry, Migration, MigrationCommand, MigrationProcess,
};
use runway::store::DocumentStore;
use runway::Runway;
use runway_int_test::test_util::{cleanup, create_test_context, run_test, TestContext};
use std::sync::Arc;

/// A migration as it would be read from a definition file.
struct Definition {
    version: u64,
    name: &'static str,
    up: Vec<(&'static str, Document)>,
    down: Vec<(&'static str, Document)>,
}

fn definitions() -> Vec<Definition> {
    vec![
        Definition {
            version: 1,
            name: "create_users",
            up: vec![("create_collection", doc! { "collection": "users" })],
            down: vec![("drop_collection", doc! { "collection": "users" })],
        },
        Definition {
            version: 2,
            name: "archive_users",
            up: vec![("archive", doc! { "collection": "users" })],
            down: vec![("drop_collection", doc! { "collection": "users_archive" })],
        },
    ]
}

fn process(registry: &CommandRegistry, steps: &[(&str, Document)]) -> RunwayResult<MigrationProcess> {
    let mut process = MigrationProcess::new();
    for (name, args) in steps {
        process = process.shared_command(registry.build(name, args)?);
    }
    Ok(process)
}

fn discover(registry: &CommandRegistry) -> RunwayResult<Vec<Migration>> {
    definitions()
        .iter()
        .map(|d| {
            Ok(Migration::new(
                d.version,
                d.name,
                "",
                process(registry, &d.up)?,
                process(registry, &d.down)?,
            ))
        })
        .collect()
}

fn register_archive(registry: &CommandRegistry) -> RunwayResult<()> {
    registry.register("archive", |args| {
        let archive = format!("{}_archive", args.get_str("collection")?);
        let command: Arc<dyn Command> = Arc::new(MigrationCommand::create_collection(&archive));
        Ok(command)
    })
}

/// Opens a runway over the context's store whose migrations are discovered
/// through its own command registry.
fn open(ctx: &TestContext) -> RunwayResult<Runway> {
    let builder = Runway::builder()
        .app_name("int-test")
        .in_memory(ctx.store())
        .lock_provider(ctx.locks());
    let registry = builder.command_registry();
    register_archive(&registry)?;
    builder.migrations(discover(&registry)?).open()
}

#[test]
fn test_migrations_built_from_registered_commands() {
    run_test(
        || create_test_context(Vec::new()),
        |ctx| {
            let store = ctx.store();
            let runway = open(&ctx)?;
            assert!(runway.config().command_registry().contains("archive"));

            let outcome = runway.upgrade_all()?;
            assert_eq!(outcome.completed, vec![1, 2]);
            assert!(store.has_collection("users")?);
            assert!(store.has_collection("users_archive")?);

            runway.downgrade_to(1)?;
            assert!(!store.has_collection("users_archive")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rebuilt_definitions_keep_their_checksums() {
    run_test(
        || create_test_context(Vec::new()),
        |ctx| {
            open(&ctx)?.upgrade_all()?;

            // a later process discovers the same definitions again
            let reopened = open(&ctx)?;
            assert!(reopened.validate()?.is_valid());
            assert!(reopened.is_up_to_date(None)?);

            let built = discover(&reopened.config().command_registry())?;
            let direct = Migration::new(
                1,
                "create_users",
                "",
                MigrationProcess::new().command(MigrationCommand::create_collection("users")),
                MigrationProcess::new().command(MigrationCommand::drop_collection("users")),
            );
            assert_eq!(ChecksumService::compute(&built[0]), ChecksumService::compute(&direct));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unknown_command_fails_discovery() {
    let registry = CommandRegistry::new();
    let error = registry
        .build("truncate", &doc! { "collection": "users" })
        .err()
        .map(|e| e.kind().clone());
    assert_eq!(error, Some(ErrorKind::NotFound));

    register_archive(&registry).unwrap();
    let duplicate = register_archive(&registry).unwrap_err();
    assert_eq!(duplicate.kind(), &ErrorKind::InvalidOperation);
}
