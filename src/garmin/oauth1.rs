//! OAuth 1.0a request signing (HMAC-SHA1), as required by Garmin's
//! `oauth-service` pre-authorisation and token exchange endpoints.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

/// Consumer pair plus the (optional) user token being used.
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: Option<&'a str>,
    pub token_secret: Option<&'a str>,
}

/// RFC 3986 percent-encoding: everything but `A-Za-z0-9-._~`.
fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

pub fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl Signer<'_> {
    /// `Authorization` header value for a request with a fresh nonce and
    /// the current time.
    pub fn authorize(&self, method: &str, base_url: &str, params: &[(String, String)]) -> String {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorize_with(method, base_url, params, &nonce(), &timestamp)
    }

    /// Deterministic variant of [`Signer::authorize`].
    ///
    /// `params` are the query-string and form-body parameters; `base_url`
    /// carries no query string.
    pub fn authorize_with(
        &self,
        method: &str,
        base_url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.to_string()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
        ];
        if let Some(token) = self.token {
            oauth.push(("oauth_token".to_string(), token.to_string()));
        }
        oauth.push(("oauth_version".to_string(), "1.0".to_string()));

        let base = signature_base(method, base_url, oauth.iter().chain(params.iter()));
        let signature = self.sign(&base);
        oauth.push(("oauth_signature".to_string(), signature));

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    fn sign(&self, base: &str) -> String {
        let key = format!(
            "{}&{}",
            encode(self.consumer_secret),
            encode(self.token_secret.unwrap_or(""))
        );
        let mut mac =
            Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
        mac.update(base.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// `METHOD&url&sorted-params`, each part percent-encoded.
pub fn signature_base<'p>(
    method: &str,
    base_url: &str,
    params: impl Iterator<Item = &'p (String, String)>,
) -> String {
    let mut pairs: Vec<(String, String)> = params.map(|(k, v)| (encode(k), encode(v))).collect();
    pairs.sort();
    let normalized: Vec<String> = pairs.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(base_url),
        encode(&normalized.join("&"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn base_string_sorts_and_double_encodes() {
        let params = [pair("b", "2"), pair("a", "x y"), pair("a", "+")];
        let base = signature_base("get", "https://example.com/p", params.iter());
        assert_eq!(
            base,
            "GET&https%3A%2F%2Fexample.com%2Fp&a%3D%252B%26a%3Dx%2520y%26b%3D2"
        );
    }

    #[test]
    fn header_lists_oauth_fields() {
        let signer = Signer {
            consumer_key: "ck",
            consumer_secret: "cs",
            token: Some("tok"),
            token_secret: Some("ts"),
        };
        let header = signer.authorize_with("POST", "https://example.com/x", &[], "abc", "1700000000");
        assert!(header.starts_with("OAuth oauth_consumer_key=\"ck\", oauth_nonce=\"abc\""));
        assert!(header.contains("oauth_token=\"tok\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(header.contains("oauth_version=\"1.0\""));

        let sig = header
            .split("oauth_signature=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        let decoded = STANDARD
            .decode(urlencoding::decode(sig).unwrap().as_bytes())
            .unwrap();
        assert_eq!(decoded.len(), 20);
    }

    #[test]
    fn signature_depends_on_token_secret() {
        let mut signer = Signer {
            consumer_key: "ck",
            consumer_secret: "cs",
            token: None,
            token_secret: None,
        };
        let a = signer.authorize_with("GET", "https://example.com/x", &[], "n", "1");
        signer.token_secret = Some("other");
        let b = signer.authorize_with("GET", "https://example.com/x", &[], "n", "1");
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_is_alphanumeric() {
        let n = nonce();
        assert_eq!(n.len(), 32);
        assert!(n.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
