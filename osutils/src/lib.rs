pub mod maas;

#[cfg(any(test, feature = "test-utilities"))]
pub mod testutils;
