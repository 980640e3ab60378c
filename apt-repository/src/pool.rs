//! Pool path derivation.
//!
//! Package artifacts live under a `pool/` prefix sharded by distribution and
//! the first character of the package name:
//! `pool/<dist>/<c>/<name>/<filename>`.

/// The pool directory holding every artifact of one package in one
/// distribution.
pub fn pool_dir(dist: &str, name: &str) -> String {
    let shard: String = name.chars().take(1).collect();
    format!("pool/{}/{}/{}", dist, shard, name)
}

/// The pool path of one artifact file.
pub fn pool_path(dist: &str, name: &str, filename: &str) -> String {
    format!("{}/{}", pool_dir(dist, name), filename)
}
