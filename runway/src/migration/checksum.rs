use crate::migration::{Checksum, Migration, MigrationProcess};
use sha2::{Digest, Sha256};

/// Computes and verifies migration fingerprints.
///
/// The fingerprint is a SHA-256 digest over the upgrade commands followed by
/// the downgrade commands, each contributing its name and definition. Rules,
/// version, name and description do not take part: renaming a migration is
/// not drift, changing what it does is.
pub struct ChecksumService;

impl ChecksumService {
    /// Returns the fingerprint of the migration's current definition as
    /// lowercase hex.
    pub fn compute(migration: &Migration) -> Checksum {
        Self::compute_processes(migration.upgrade(), migration.downgrade())
    }

    /// Returns `true` if the migration still hashes to `persisted`.
    pub fn verify(migration: &Migration, persisted: &str) -> bool {
        Self::compute(migration) == persisted
    }

    pub(crate) fn compute_processes(
        upgrade: &MigrationProcess,
        downgrade: &MigrationProcess,
    ) -> Checksum {
        let mut hasher = Sha256::new();
        Self::hash_section(&mut hasher, "upgrade", upgrade);
        Self::hash_section(&mut hasher, "downgrade", downgrade);
        format!("{:x}", hasher.finalize())
    }

    fn hash_section(hasher: &mut Sha256, marker: &str, process: &MigrationProcess) {
        hasher.update(b"[");
        hasher.update(marker.as_bytes());
        hasher.update(b"]\n");
        for command in process.commands() {
            let definition = command.definition();
            // length prefixes keep adjacent fields from running together
            hasher.update((command.name().len() as u64).to_le_bytes());
            hasher.update(command.name().as_bytes());
            hasher.update((definition.len() as u64).to_le_bytes());
            hasher.update(definition.as_bytes());
        }
    }
}
