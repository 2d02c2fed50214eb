use crate::errors::{ErrorKind, RunwayError, RunwayResult};
use crate::transaction::MigrationContext;
use std::sync::Arc;

/// A business rule guarding a migration process.
///
/// Rules are checked inside the migration's atomic scope before the first
/// command runs. The rules a rule depends on are checked first, depth
/// first, so a rule can assume its prerequisites hold. A broken rule fails
/// the migration with `BusinessRuleBroken` and nothing is executed.
pub trait MigrationRule: Send + Sync {
    fn name(&self) -> &str;

    /// Rules that must hold before this one is evaluated.
    fn depends_on(&self) -> Vec<Arc<dyn MigrationRule>> {
        Vec::new()
    }

    /// Returns `true` if the rule does not hold for the current store state.
    fn check_is_broken(&self, ctx: &MigrationContext) -> RunwayResult<bool>;
}

type RuleCheck = Arc<dyn Fn(&MigrationContext) -> RunwayResult<bool> + Send + Sync>;

/// A [MigrationRule] backed by a closure.
///
/// ```rust
/// use runway::migration::FnRule;
/// use runway::store::DocumentStore;
///
/// let users_exist = FnRule::new("users_exist", |ctx| {
///     Ok(!ctx.store().has_collection("users")?)
/// });
/// let users_not_empty = FnRule::new("users_not_empty", |ctx| {
///     Ok(ctx.store().find_all("users")?.is_empty())
/// })
/// .depends_on(users_exist);
/// ```
#[derive(Clone)]
pub struct FnRule {
    name: String,
    depends_on: Vec<Arc<dyn MigrationRule>>,
    check: RuleCheck,
}

impl FnRule {
    /// Creates a rule that is broken whenever `check` returns `true`.
    pub fn new<F>(name: &str, check: F) -> Self
    where
        F: Fn(&MigrationContext) -> RunwayResult<bool> + Send + Sync + 'static,
    {
        FnRule {
            name: name.to_string(),
            depends_on: Vec::new(),
            check: Arc::new(check),
        }
    }

    /// Adds a prerequisite rule.
    pub fn depends_on<R: MigrationRule + 'static>(mut self, rule: R) -> Self {
        self.depends_on.push(Arc::new(rule));
        self
    }
}

impl MigrationRule for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<Arc<dyn MigrationRule>> {
        self.depends_on.clone()
    }

    fn check_is_broken(&self, ctx: &MigrationContext) -> RunwayResult<bool> {
        (self.check)(ctx)
    }
}

/// Checks `rules` in order, each after its dependencies.
///
/// # Errors
///
/// Returns `BusinessRuleBroken` naming the first broken rule, or the error a
/// rule check raised.
pub fn validate_rules(
    rules: &[Arc<dyn MigrationRule>],
    ctx: &MigrationContext,
) -> RunwayResult<()> {
    for rule in rules {
        validate_rule(rule.as_ref(), ctx)?;
    }
    Ok(())
}

fn validate_rule(rule: &dyn MigrationRule, ctx: &MigrationContext) -> RunwayResult<()> {
    validate_rules(&rule.depends_on(), ctx)?;

    log::debug!(
        "Checking rule '{}' of migration {} ({})",
        rule.name(),
        ctx.version(),
        ctx.direction()
    );
    if rule.check_is_broken(ctx)? {
        log::error!(
            "Business rule '{}' of migration {} is broken",
            rule.name(),
            ctx.version()
        );
        return Err(RunwayError::new(
            &format!(
                "Business rule '{}' of migration {} is broken",
                rule.name(),
                ctx.version()
            ),
            ErrorKind::BusinessRuleBroken,
        ));
    }
    Ok(())
}
