mod atomicity_test;
mod rule_test;
mod journal_test;
