pub mod cache;
pub mod db;
pub mod errors;
pub mod fetch;
pub mod object_url;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
