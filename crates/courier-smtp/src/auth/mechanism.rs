//! SASL payload encoders.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;

type HmacMd5 = Hmac<Md5>;

/// Generates the PLAIN initial response (RFC 4616).
///
/// Format: `base64("\0" + user + "\0" + pass)`. The bytes are encoded as
/// given, so non-ASCII passwords survive unchanged.
#[must_use]
pub fn plain_response(user: &str, pass: &str) -> String {
    let mut payload = Vec::with_capacity(user.len() + pass.len() + 2);
    payload.push(0);
    payload.extend_from_slice(user.as_bytes());
    payload.push(0);
    payload.extend_from_slice(pass.as_bytes());
    STANDARD.encode(payload)
}

/// Generates the XOAUTH2 initial response.
///
/// Format: `base64("user=" + user + "\x01auth=Bearer " + token + "\x01\x01")`
#[must_use]
pub fn xoauth2_response(user: &str, access_token: &str) -> String {
    STANDARD.encode(format!("user={user}\x01auth=Bearer {access_token}\x01\x01"))
}

/// Answers a CRAM-MD5 challenge (RFC 2195).
///
/// `challenge` is the base64 text of the `334` reply. The answer is
/// `base64(user + " " + hex(HMAC-MD5(pass, challenge)))`, or `None` when
/// the challenge is not valid base64.
#[must_use]
pub fn cram_md5_response(user: &str, pass: &str, challenge: &str) -> Option<String> {
    let challenge = STANDARD.decode(challenge).ok()?;
    let mut mac = HmacMd5::new_from_slice(pass.as_bytes()).ok()?;
    mac.update(&challenge);
    let digest = hex::encode(mac.finalize().into_bytes());

    Some(STANDARD.encode(format!("{user} {digest}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn plain_keeps_special_characters() {
        let encoded = plain_response("user@example.com", "p@ss=w0rd!");
        let decoded = STANDARD.decode(encoded).unwrap();
        let parts: Vec<&[u8]> = decoded.split(|&b| b == 0).collect();
        assert_eq!(parts, vec![&b""[..], b"user@example.com", b"p@ss=w0rd!"]);
    }

    #[test]
    fn plain_is_binary_safe() {
        let encoded = plain_response("üser", "pässwörd");
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, "\0üser\0pässwörd".as_bytes());
    }

    #[test]
    fn xoauth2_format() {
        let decoded = STANDARD.decode(xoauth2_response("a@b.com", "tok")).unwrap();
        assert_eq!(decoded, b"user=a@b.com\x01auth=Bearer tok\x01\x01");
    }

    #[test]
    fn cram_md5_rfc2195_vector() {
        let challenge = STANDARD.encode("<1896.697170952@postoffice.reston.mci.net>");
        let answer = cram_md5_response("tim", "tanstaaftanstaaf", &challenge).unwrap();
        assert_eq!(
            STANDARD.decode(answer).unwrap(),
            b"tim b913a602c7eda7a495b4e6e7334d3890"
        );
    }

    #[test]
    fn cram_md5_rejects_bad_challenge() {
        assert!(cram_md5_response("u", "p", "***").is_none());
    }
}
