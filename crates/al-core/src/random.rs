//! Random identifier helpers

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a random string of `length` ASCII letters and digits
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
