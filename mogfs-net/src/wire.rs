//! Request encoding and response decoding

use mogfs_core::FieldSet;
use url::form_urlencoded;

use crate::protocol::{ProtocolError, LINE_TERMINATOR};

/// Ordered request parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// Add the parameter only when a value is present
    pub fn with_opt<V: ToString>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    pub fn push(&mut self, key: &str, value: impl ToString) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Error outcome reported by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// A decoded tracker response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(FieldSet),
    Err(TrackerError),
}

/// Build the request line for `command`
pub fn encode_request(command: &str, params: &Params) -> String {
    let query = encode_payload(params);

    let mut line = String::with_capacity(command.len() + query.len() + 3);
    line.push_str(command);
    line.push(' ');
    line.push_str(&query);
    line.push_str(LINE_TERMINATOR);
    line
}

/// Decode one response line.
///
/// `ERR <code> <message>` becomes [`Response::Err`], `OK [<seq>] [<payload>]`
/// becomes [`Response::Ok`]. Anything else is a protocol violation.
pub fn decode_response(line: &str) -> std::result::Result<Response, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = strip_verb(line, "ERR") {
        let rest = rest.trim_start();
        let code_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if code_len == 0 {
            return Err(malformed(line));
        }

        let (code, message) = rest.split_at(code_len);
        return Ok(Response::Err(TrackerError {
            code: code.to_string(),
            message: message.trim().to_string(),
        }));
    }

    if let Some(rest) = strip_verb(line, "OK") {
        let mut tokens = rest.split_whitespace().peekable();
        // The sequence number is optional and carries nothing we use
        if tokens
            .peek()
            .is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
        {
            tokens.next();
        }

        let payload = tokens.next().unwrap_or("");
        return Ok(Response::Ok(decode_payload(payload)));
    }

    Err(malformed(line))
}

/// Percent-escape `params` into an `&`-separated payload
pub fn encode_payload(params: &Params) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Parse an `&`-separated, percent-escaped payload
pub fn decode_payload(payload: &str) -> FieldSet {
    form_urlencoded::parse(payload.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// `line` minus `verb`, provided the verb is a whole word
fn strip_verb<'a>(line: &'a str, verb: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(verb)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn malformed(line: &str) -> ProtocolError {
    const PREVIEW: usize = 128;
    let preview: String = line.chars().take(PREVIEW).collect();
    ProtocolError::MalformedResponse(preview)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_fields(line: &str) -> FieldSet {
        match decode_response(line).unwrap() {
            Response::Ok(fields) => fields,
            other => panic!("expected OK, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_request() {
        let params = Params::new()
            .with("domain", "photos")
            .with("key", "cats/tabby 1.jpg");

        let line = encode_request("create_open", &params);

        assert_eq!(line, "create_open domain=photos&key=cats%2Ftabby+1.jpg\r\n");
    }

    #[test]
    fn test_encode_without_params() {
        assert_eq!(encode_request("noop", &Params::new()), "noop \r\n");
    }

    #[test]
    fn test_with_opt_skips_none() {
        let params = Params::new()
            .with("domain", "d")
            .with_opt("class", None::<&str>)
            .with_opt("key", Some("k"));
        assert_eq!(params.len(), 2);
        assert_eq!(encode_request("x", &params), "x domain=d&key=k\r\n");
    }

    #[test]
    fn test_decode_ok_payload() {
        let fields = ok_fields("OK 1 a=1&b=2\r\n");
        assert_eq!(fields.get("a"), Some("1"));
        assert_eq!(fields.get("b"), Some("2"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_decode_ok_empty_payload() {
        assert!(ok_fields("OK 1 ").is_empty());
        assert!(ok_fields("OK 1 \r\n").is_empty());
        assert!(ok_fields("OK\r\n").is_empty());
    }

    #[test]
    fn test_decode_ok_without_sequence() {
        let fields = ok_fields("OK paths=0\r\n");
        assert_eq!(fields.get("paths"), Some("0"));
    }

    #[test]
    fn test_decode_unescapes_payload() {
        let fields = ok_fields("OK 1 path1=http%3A%2F%2F10.0.0.1%3A7500%2Fdev1%2F1.fid&key=a+b\r\n");
        assert_eq!(fields.get("path1"), Some("http://10.0.0.1:7500/dev1/1.fid"));
        assert_eq!(fields.get("key"), Some("a b"));
    }

    #[test]
    fn test_decode_skips_empty_tokens() {
        let fields = ok_fields("OK 1 &a=1&&b=&c\r\n");
        assert_eq!(fields.get("a"), Some("1"));
        assert_eq!(fields.get("b"), Some(""));
        assert_eq!(fields.get("c"), Some(""));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_decode_error() {
        let response = decode_response("ERR unknown_key Key not found").unwrap();
        assert_eq!(
            response,
            Response::Err(TrackerError {
                code: "unknown_key".to_string(),
                message: "Key not found".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_error_without_message() {
        match decode_response("ERR no_domain\r\n").unwrap() {
            Response::Err(err) => {
                assert_eq!(err.code, "no_domain");
                assert_eq!(err.message, "");
                assert_eq!(err.to_string(), "no_domain");
            }
            other => panic!("expected ERR, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed() {
        for line in ["garbage", "", "\r\n", "OKAY 1 a=1", "ERR", "ERR  ", "ERRx code msg", "err x y"] {
            assert!(
                matches!(decode_response(line), Err(ProtocolError::MalformedResponse(_))),
                "{:?} should be malformed",
                line
            );
        }
    }

    #[test]
    fn test_malformed_preview_is_bounded() {
        let line = "x".repeat(10_000);
        match decode_response(&line) {
            Err(ProtocolError::MalformedResponse(preview)) => assert_eq!(preview.len(), 128),
            other => panic!("expected malformed, got {:?}", other),
        }
    }
}
