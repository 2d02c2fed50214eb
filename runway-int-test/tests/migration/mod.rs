mod bounded_test;
mod drift_test;
mod lifecycle_test;
mod registry_test;
