//! MD5 password challenge (`AuthenticationMD5Password`).

/// Credential for an MD5 challenge: `"md5" + hex(md5(hex(md5(password + user)) + salt))`.
pub fn postgres_md5(password: &str, user: &str, salt: &[u8; 4]) -> String {
    fn md5_hex(bytes: &[u8]) -> String {
        let digest = ::md5::compute(bytes);
        format!("{:x}", digest)
    }
    let inner = md5_hex(format!("{password}{user}").as_bytes());
    let mut outer = Vec::with_capacity(inner.len() + 4);
    outer.extend_from_slice(inner.as_bytes());
    outer.extend_from_slice(salt);
    format!("md5{}", md5_hex(&outer))
}
