use runway::common::MIGRATIONS_COLLECTION;
use runway::errors::ErrorKind;
use runway::migration::{ChecksumService, Migration, MigrationCommand, MigrationProcess};
use runway::store::{DocumentStore, MigrationRecord};
use runway_int_test::test_util::{cleanup, collection_migration, create_test_context, run_test};

fn users(collection: &str) -> Migration {
    Migration::new(
        1,
        "create_users",
        "",
        MigrationProcess::new().command(MigrationCommand::create_collection(collection)),
        MigrationProcess::new().command(MigrationCommand::drop_collection(collection)),
    )
}

#[test]
fn test_persisted_checksum_verifies_against_definition() {
    run_test(
        || create_test_context(vec![users("users")]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let docs = ctx.store().find_all(MIGRATIONS_COLLECTION)?;
            assert_eq!(docs.len(), 1);

            let record = MigrationRecord::from_document(&docs[0].1)?;
            assert_eq!(record.checksum, ChecksumService::compute(&users("users")));
            assert!(ChecksumService::verify(&users("users"), &record.checksum));
            assert!(!ChecksumService::verify(&users("accounts"), &record.checksum));
            assert_eq!(record.applied_by.as_deref(), Some("int-test"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_edited_migration_blocks_new_runs() {
    run_test(
        || create_test_context(vec![users("users")]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let edited = ctx.reopen(vec![users("accounts"), collection_migration(2)], |b| b)?;

            let report = edited.validate()?;
            assert!(!report.is_valid());
            assert_eq!(report.drifted().len(), 1);
            assert_eq!(report.drifted()[0].version(), 1);

            let error = edited.upgrade_all().unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::DriftDetected);
            assert!(!ctx.store().has_collection("c2")?);
            assert_eq!(edited.status()?.current_version, Some(1));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_allow_drift_proceeds() {
    run_test(
        || create_test_context(vec![users("users")]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let edited = ctx.reopen(vec![users("accounts"), collection_migration(2)], |b| {
                b.allow_drift(true)
            })?;

            let outcome = edited.upgrade_all()?;
            assert_eq!(outcome.completed, vec![2]);
            // drift is still reported
            assert_eq!(edited.validate()?.drifted().len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_recalculated_checksums_clear_drift() {
    run_test(
        || create_test_context(vec![users("users")]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let edited = ctx.reopen(vec![users("accounts"), collection_migration(2)], |b| b)?;
            assert_eq!(edited.upgrade_all().unwrap_err().kind(), &ErrorKind::DriftDetected);

            assert_eq!(edited.recalculate_checksums()?, vec![1]);
            assert!(edited.validate()?.is_valid());

            let outcome = edited.upgrade_all()?;
            assert_eq!(outcome.completed, vec![2]);
            assert!(ctx.store().has_collection("c2")?);

            let docs = ctx.store().find_all(MIGRATIONS_COLLECTION)?;
            let record = docs
                .iter()
                .map(|(_, doc)| MigrationRecord::from_document(doc))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .find(|r| r.version == 1)
                .expect("record of version 1");
            assert!(ChecksumService::verify(&users("accounts"), &record.checksum));
            // the data itself is left alone
            assert!(ctx.store().has_collection("users")?);
            assert!(!ctx.store().has_collection("accounts")?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unchanged_history_validates() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(2)]),
        |ctx| {
            ctx.runway().upgrade_one()?;
            let report = ctx.runway().validate()?;
            assert!(report.is_valid());
            assert!(ctx.runway().is_up_to_date(Some(1))?);
            assert!(!ctx.runway().is_up_to_date(None)?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_version_is_a_gap() {
    run_test(
        || create_test_context(vec![collection_migration(1), collection_migration(3)]),
        |ctx| {
            ctx.runway().upgrade_all()?;
            let grown = ctx.reopen(
                vec![collection_migration(1), collection_migration(2), collection_migration(3)],
                |b| b,
            )?;

            let report = grown.validate()?;
            assert_eq!(report.ordering().len(), 1);
            assert_eq!(report.ordering()[0].version(), 2);

            let error = grown.upgrade_all().unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::VersionGap);
            Ok(())
        },
        cleanup,
    )
}
