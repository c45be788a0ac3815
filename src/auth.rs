use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

pub const CHALLENGE_LEN: usize = 6;

const CHALLENGE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SALT_ALPHABET: &[u8] = b"0123456789abcdef";
const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "faculty" => Some(Role::Faculty),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub login_id: String,
    pub salt: String,
    pub password_digest: String,
    pub role: Role,
    pub display_name: String,
}

/// 6-character uppercase alphanumeric token shown by the login form.
pub fn generate_challenge(rng: &mut fastrand::Rng) -> String {
    (0..CHALLENGE_LEN)
        .map(|_| CHALLENGE_ALPHABET[rng.usize(..CHALLENGE_ALPHABET.len())] as char)
        .collect()
}

/// Case-insensitive comparison; the form echoes whatever the user typed.
pub fn verify_challenge(input: &str, active: &str) -> bool {
    input.trim().eq_ignore_ascii_case(active)
}

pub fn generate_salt(rng: &mut fastrand::Rng) -> String {
    (0..SALT_LEN)
        .map(|_| SALT_ALPHABET[rng.usize(..SALT_ALPHABET.len())] as char)
        .collect()
}

/// Salted SHA-256, hex-encoded. A slow KDF is the production follow-up; the
/// salt is what the stored digests require at minimum.
pub fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(cred: &Credential, password: &str) -> bool {
    password_digest(&cred.salt, password) == cred.password_digest
}

pub fn find_credential(
    conn: &Connection,
    login_id: &str,
) -> rusqlite::Result<Option<Credential>> {
    conn.query_row(
        "SELECT login_id, salt, password_digest, role, display_name
         FROM credentials
         WHERE login_id = ?",
        [login_id],
        |r| {
            let role_str: String = r.get(3)?;
            Ok(Credential {
                login_id: r.get(0)?,
                salt: r.get(1)?,
                password_digest: r.get(2)?,
                role: Role::parse(&role_str).unwrap_or(Role::Student),
                display_name: r.get(4)?,
            })
        },
    )
    .optional()
}
