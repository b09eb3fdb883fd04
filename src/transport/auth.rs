//! Answers to `WWW-Authenticate` challenges.
//!
//! Basic credentials are sent up front, so only challenge-driven schemes end up here. Digest
//! follows RFC 2617 with MD5 or MD5-sess and `qop=auth`; NTLM challenges are not answered.

use base64::{engine::general_purpose, Engine as _};
use md5::{Digest, Md5};
use std::collections::HashMap;

use crate::options::{AuthScheme, Credentials};

const NONCE_COUNT: &str = "00000001";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    params: HashMap<String, String>,
}

impl Challenge {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

fn take_token(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| c.is_whitespace() || c == '=' || c == ',')
        .unwrap_or(input.len());
    input.split_at(end)
}

fn take_value(input: &str) -> (String, &str) {
    let Some(quoted) = input.strip_prefix('"') else {
        let end = input.find(',').unwrap_or(input.len());
        return (input[..end].trim().to_owned(), &input[end..]);
    };

    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => return (value, &quoted[index + 1..]),
            c => value.push(c),
        }
    }

    (value, "")
}

/// Splits a `WWW-Authenticate` value into its challenges. One header may carry several.
pub fn parse_challenges(header: &str) -> Vec<Challenge> {
    let mut challenges: Vec<Challenge> = Vec::new();
    let mut rest = header;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let (token, after) = take_token(rest);
        if token.is_empty() {
            // stray '=' from a token68 credential
            rest = &after[1..];
            continue;
        }

        let after_space = after.trim_start();
        match after_space.strip_prefix('=') {
            Some(value) => {
                let (value, after) = take_value(value.trim_start());
                if let Some(challenge) = challenges.last_mut() {
                    challenge.params.insert(token.to_ascii_lowercase(), value);
                }
                rest = after;
            }
            None => {
                challenges.push(Challenge {
                    scheme: token.to_owned(),
                    params: HashMap::new(),
                });
                rest = after;
            }
        }
    }

    challenges
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn basic_authorization(credentials: &Credentials) -> String {
    let token = general_purpose::STANDARD.encode(format!(
        "{}:{}",
        credentials.login, credentials.password
    ));
    format!("Basic {}", token)
}

/// Builds a Digest `Authorization` value, or `None` when the challenge asks for an algorithm
/// or quality of protection this client does not implement.
pub fn digest_authorization(
    challenge: &Challenge,
    credentials: &Credentials,
    method: &str,
    uri: &str,
    cnonce: &str,
) -> Option<String> {
    let realm = challenge.param("realm").unwrap_or_default();
    let nonce = challenge.param("nonce")?;
    let algorithm = challenge.param("algorithm").unwrap_or("MD5");

    let session = match algorithm.to_ascii_uppercase().as_str() {
        "MD5" => false,
        "MD5-SESS" => true,
        _ => return None,
    };

    let qop = match challenge.param("qop") {
        None => None,
        Some(offered) if offered.split(',').any(|q| q.trim() == "auth") => Some("auth"),
        Some(_) => return None,
    };

    let mut ha1 = md5_hex(&format!(
        "{}:{}:{}",
        credentials.login, realm, credentials.password
    ));
    if session {
        ha1 = md5_hex(&format!("{}:{}:{}", ha1, nonce, cnonce));
    }
    let ha2 = md5_hex(&format!("{}:{}", method, uri));

    let response = match qop {
        Some(qop) => md5_hex(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, nonce, NONCE_COUNT, cnonce, qop, ha2
        )),
        None => md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2)),
    };

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}", algorithm={}"#,
        credentials.login, realm, nonce, uri, response, algorithm
    );
    if let Some(qop) = qop {
        header.push_str(&format!(
            r#", qop={}, nc={}, cnonce="{}""#,
            qop, NONCE_COUNT, cnonce
        ));
    }
    if let Some(opaque) = challenge.param("opaque") {
        header.push_str(&format!(r#", opaque="{}""#, opaque));
    }

    Some(header)
}

fn cnonce() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// Picks the strongest challenge `scheme` allows and answers it.
pub fn authorization(
    challenges: &[Challenge],
    scheme: AuthScheme,
    credentials: &Credentials,
    method: &str,
    uri: &str,
) -> Option<String> {
    let find = |name: &str| {
        challenges
            .iter()
            .find(|challenge| challenge.scheme.eq_ignore_ascii_case(name))
    };
    let digest = || {
        find("digest").and_then(|challenge| {
            digest_authorization(challenge, credentials, method, uri, &cnonce())
        })
    };
    let basic = || find("basic").map(|_| basic_authorization(credentials));

    match scheme {
        AuthScheme::Digest | AuthScheme::AnySafe => digest(),
        AuthScheme::Any => digest().or_else(basic),
        AuthScheme::Basic | AuthScheme::Ntlm => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mufasa() -> Credentials {
        Credentials {
            login: "Mufasa".into(),
            password: "Circle Of Life".into(),
        }
    }

    const RFC_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn parses_multiple_challenges() {
        let challenges =
            parse_challenges(r#"Negotiate, NTLM, Digest realm="a, b", nonce=abc, Basic realm="x""#);

        let schemes: Vec<_> = challenges.iter().map(|c| c.scheme.as_str()).collect();
        assert_eq!(schemes, ["Negotiate", "NTLM", "Digest", "Basic"]);
        assert_eq!(challenges[2].param("realm"), Some("a, b"));
        assert_eq!(challenges[2].param("nonce"), Some("abc"));
        assert_eq!(challenges[3].param("REALM"), Some("x"));
    }

    #[test]
    fn computes_rfc2617_digest() {
        let challenge = parse_challenges(RFC_CHALLENGE).remove(0);
        let header =
            digest_authorization(&challenge, &mufasa(), "GET", "/dir/index.html", "0a4f113b")
                .unwrap();

        assert!(header.starts_with(r#"Digest username="Mufasa", realm="testrealm@host.com""#));
        assert!(header.contains(r#"response="6629fae49393a05397450978507c4ef1""#));
        assert!(header.contains(r#"qop=auth, nc=00000001, cnonce="0a4f113b""#));
        assert!(header.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#));
    }

    #[test]
    fn computes_legacy_digest_without_qop() {
        let challenge =
            parse_challenges(r#"Digest realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093""#)
                .remove(0);
        let header =
            digest_authorization(&challenge, &mufasa(), "GET", "/dir/index.html", "0a4f113b")
                .unwrap();

        assert!(header.contains(r#"response="670fd8c2df070c60b045671b8b24ff02""#));
        assert!(!header.contains("qop="));
    }

    #[test]
    fn skips_unsupported_digest_variants() {
        let challenge =
            parse_challenges(r#"Digest realm="r", nonce="n", algorithm=SHA-256"#).remove(0);
        assert!(digest_authorization(&challenge, &mufasa(), "GET", "/", "c").is_none());

        let challenge = parse_challenges(r#"Digest realm="r", nonce="n", qop="auth-int""#).remove(0);
        assert!(digest_authorization(&challenge, &mufasa(), "GET", "/", "c").is_none());
    }

    #[test]
    fn selects_challenges_by_scheme() {
        let basic_only = parse_challenges(r#"Basic realm="x""#);
        let both = parse_challenges(&format!(r#"Basic realm="x", {}"#, RFC_CHALLENGE));
        let ntlm = parse_challenges("NTLM");

        assert_eq!(
            authorization(&basic_only, AuthScheme::Any, &mufasa(), "POST", "/"),
            Some("Basic TXVmYXNhOkNpcmNsZSBPZiBMaWZl".to_owned())
        );
        assert!(authorization(&basic_only, AuthScheme::AnySafe, &mufasa(), "POST", "/").is_none());
        assert!(authorization(&both, AuthScheme::Any, &mufasa(), "POST", "/")
            .unwrap()
            .starts_with("Digest "));
        assert!(authorization(&ntlm, AuthScheme::Ntlm, &mufasa(), "POST", "/").is_none());
    }
}
