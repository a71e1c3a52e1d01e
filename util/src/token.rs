use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random alphanumeric token, used to give each run a unique log directory.
pub fn alnum_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
