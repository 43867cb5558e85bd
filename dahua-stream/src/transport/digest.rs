//! HTTP Digest authentication (RFC 2617)
//!
//! Only what the event endpoint needs: MD5 and MD5-sess, with `qop=auth`
//! or the legacy no-qop form.

use std::collections::HashMap;

use md5::{Digest, Md5};

use crate::device::Credentials;
use crate::error::DigestError;

/// Hash algorithm requested by the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

impl Algorithm {
    fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        }
    }
}

/// A parsed `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    /// Whether `qop=auth` was offered
    pub qop_auth: bool,
}

impl DigestChallenge {
    /// Parse the value of a `WWW-Authenticate` header
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let header = header.trim_start();
        let (scheme, rest) = header.split_at(header.find(' ').unwrap_or(header.len()));
        if !scheme.eq_ignore_ascii_case("Digest") {
            return Err(DigestError::NotDigest);
        }

        let mut params = parse_params(rest);

        let realm = params
            .remove("realm")
            .ok_or(DigestError::MissingParameter("realm"))?;
        let nonce = params
            .remove("nonce")
            .ok_or(DigestError::MissingParameter("nonce"))?;

        let algorithm = match params.remove("algorithm") {
            None => Algorithm::Md5,
            Some(a) if a.eq_ignore_ascii_case("MD5") => Algorithm::Md5,
            Some(a) if a.eq_ignore_ascii_case("MD5-sess") => Algorithm::Md5Sess,
            Some(a) => return Err(DigestError::UnsupportedAlgorithm(a)),
        };

        let qop_auth = match params.remove("qop") {
            None => false,
            Some(qop) if qop.split(',').any(|q| q.trim() == "auth") => true,
            Some(qop) => return Err(DigestError::UnsupportedQop(qop)),
        };

        Ok(Self {
            realm,
            nonce,
            opaque: params.remove("opaque"),
            algorithm,
            qop_auth,
        })
    }

    /// Compute the response digest for one request
    pub fn response(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        cnonce: &str,
        nc: u32,
    ) -> String {
        let mut ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.user,
            self.realm,
            credentials.password()
        ));
        if self.algorithm == Algorithm::Md5Sess {
            ha1 = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, cnonce));
        }
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        if self.qop_auth {
            md5_hex(&format!(
                "{}:{}:{:08x}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        }
    }

    /// Build the `Authorization` header value answering this challenge
    pub fn authorization(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        cnonce: &str,
        nc: u32,
    ) -> String {
        let response = self.response(credentials, method, uri, cnonce, nc);

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            quote(&credentials.user),
            quote(&self.realm),
            quote(&self.nonce),
            quote(uri),
            self.algorithm.as_str(),
            response
        );
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
        }
        if self.qop_auth {
            header.push_str(&format!(", qop=auth, nc={:08x}, cnonce=\"{}\"", nc, quote(cnonce)));
        }
        header
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Split `key=value, key="quoted, value"` pairs. Keys are lowercased.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ',' {
                break;
            }
            key.push(c);
            chars.next();
        }

        // A bare token without a value
        if chars.next() != Some('=') {
            continue;
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
            value = value.trim_end().to_string();
        }

        params.insert(key.trim().to_ascii_lowercase(), value);
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RFC_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn test_rfc2617_reference_vector() {
        let challenge = DigestChallenge::parse(RFC_CHALLENGE).unwrap();
        let credentials = Credentials::new("Mufasa", "Circle Of Life");

        let response = challenge.response(&credentials, "GET", "/dir/index.html", "0a4f113b", 1);
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn test_parse_rfc_challenge() {
        let challenge = DigestChallenge::parse(RFC_CHALLENGE).unwrap();
        assert_eq!(challenge.realm, "testrealm@host.com");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert_eq!(challenge.algorithm, Algorithm::Md5);
        assert!(challenge.qop_auth);
    }

    #[test]
    fn test_authorization_header_fields() {
        let challenge = DigestChallenge::parse(RFC_CHALLENGE).unwrap();
        let credentials = Credentials::new("Mufasa", "Circle Of Life");

        let header = challenge.authorization(&credentials, "GET", "/dir/index.html", "0a4f113b", 1);
        assert!(header.starts_with("Digest username=\"Mufasa\""));
        assert!(header.contains("uri=\"/dir/index.html\""));
        assert!(header.contains("response=\"6629fae49393a05397450978507c4ef1\""));
        assert!(header.contains("opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""));
        assert!(header.contains("qop=auth, nc=00000001, cnonce=\"0a4f113b\""));
    }

    #[test]
    fn test_dahua_style_challenge() {
        let header = r#"Digest realm="Login to 4M0C2D5PAZ4B7B2", qop="auth", nonce="1215412366", opaque="bd2ab30e9c2dd5a4f5f8c2fc8f7e05c8e3e9b4bd""#;
        let challenge = DigestChallenge::parse(header).unwrap();
        assert_eq!(challenge.realm, "Login to 4M0C2D5PAZ4B7B2");
        assert!(challenge.qop_auth);
    }

    #[test]
    fn test_legacy_challenge_without_qop() {
        let header = r#"Digest nonce="abc", realm="cam""#;
        let challenge = DigestChallenge::parse(header).unwrap();
        assert!(!challenge.qop_auth);

        let credentials = Credentials::new("admin", "admin");
        let header = challenge.authorization(&credentials, "GET", "/", "ignored", 1);
        assert!(!header.contains("qop="));
        assert!(!header.contains("opaque="));
    }

    #[test]
    fn test_md5_sess_changes_response() {
        let credentials = Credentials::new("admin", "admin");
        let md5 = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth""#).unwrap();
        let sess = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth", algorithm=MD5-sess"#).unwrap();
        assert_eq!(sess.algorithm, Algorithm::Md5Sess);
        assert_ne!(
            md5.response(&credentials, "GET", "/", "c", 1),
            sess.response(&credentials, "GET", "/", "c", 1)
        );
    }

    #[test]
    fn test_quoted_value_with_comma_and_escape() {
        let params = parse_params(r#" realm="a, \"b\"", nonce=xyz , stale=FALSE"#);
        assert_eq!(params.get("realm").map(String::as_str), Some("a, \"b\""));
        assert_eq!(params.get("nonce").map(String::as_str), Some("xyz"));
        assert_eq!(params.get("stale").map(String::as_str), Some("FALSE"));
    }

    #[rstest]
    #[case(r#"Basic realm="cam""#, DigestError::NotDigest)]
    #[case(r#"Digest nonce="n""#, DigestError::MissingParameter("realm"))]
    #[case(r#"Digest realm="r""#, DigestError::MissingParameter("nonce"))]
    #[case(r#"Digest realm="r", nonce="n", algorithm=SHA-256"#, DigestError::UnsupportedAlgorithm("SHA-256".to_string()))]
    #[case(r#"Digest realm="r", nonce="n", qop="auth-int""#, DigestError::UnsupportedQop("auth-int".to_string()))]
    fn test_rejected_challenges(#[case] header: &str, #[case] expected: DigestError) {
        assert_eq!(DigestChallenge::parse(header), Err(expected));
    }
}
