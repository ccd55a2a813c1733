// Key layout of the backing store

pub const ACCOUNTS: &str = "users";
pub const TOKENS: &str = "tokens";
pub const PACKAGES: &str = "packages";

pub fn account(username: &str) -> String {
    format!("user:{username}")
}

pub fn account_tokens(username: &str) -> String {
    format!("user:{username}:tokens")
}

pub fn account_packages(username: &str) -> String {
    format!("user:{username}:packages")
}

pub fn account_comments(username: &str) -> String {
    format!("user:{username}:comments")
}

pub fn token(hash: &str) -> String {
    format!("token:{hash}")
}

pub fn package(owner: &str, name: &str) -> String {
    format!("package:{owner}/{name}")
}

pub fn package_comments(owner: &str, name: &str) -> String {
    format!("package:{owner}/{name}:comments")
}

pub fn comment(id: &str) -> String {
    format!("comment:{id}")
}

pub fn artifacts(owner: &str, name: &str) -> String {
    format!("artifacts:{owner}/{name}")
}

/// Strips a `prefix:` from an indexed key, e.g. `user:alice` -> `alice`
pub fn strip<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.strip_prefix(':')
}

/// Splits `package:{owner}/{name}` into its parts
pub fn split_package(key: &str) -> Option<(&str, &str)> {
    strip("package", key)?.split_once('/')
}
