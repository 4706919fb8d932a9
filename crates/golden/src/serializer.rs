use http::{HeaderMap, StatusCode, Version};
use serde_json::Value;

use crate::{error::Error, exchange::Exchange};

/// Render the response half of `exchange` as the bytes stored in golden files.
pub fn dump(exchange: &Exchange, include_body: bool) -> Vec<u8> {
    let headers = sorted_headers(&exchange.headers);
    let body = include_body.then_some(exchange.body.as_ref());
    render(exchange.version, exchange.status, &headers, body)
}

pub(crate) fn sorted_headers(headers: &HeaderMap) -> Vec<(String, Vec<u8>)> {
    let mut pairs: Vec<(String, Vec<u8>)> = headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();
    // stable: values of one name keep insertion order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

pub(crate) fn render(
    version: Version,
    status: StatusCode,
    headers: &[(String, Vec<u8>)],
    body: Option<&[u8]>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + body.map_or(0, <[u8]>::len));
    out.extend_from_slice(status_line(version, status).as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    if let Some(body) = body {
        out.extend_from_slice(body);
    }
    out
}

fn status_line(version: Version, status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{version:?} {} {reason}", status.as_u16()),
        None => format!("{version:?} {}", status.as_u16()),
    }
}

/// Decode a JSON document and re-encode it with 2-space indentation.
pub fn indent_json(body: &[u8]) -> Result<Vec<u8>, Error> {
    let value: Value = serde_json::from_slice(body).map_err(|source| Error::InvalidJson {
        context: "response body",
        source,
    })?;
    serde_json::to_vec_pretty(&value).map_err(|source| Error::InvalidJson {
        context: "indented response body",
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request, Response};

    fn health_exchange() -> Exchange {
        let request = Request::get("/v1/health").body(Bytes::new()).unwrap();
        let response = Response::builder()
            .status(StatusCode::OK)
            .header("x-request-id", "b")
            .header("content-type", "application/json")
            .header("x-request-id", "a")
            .body(Bytes::from_static(br#"{"hoge":"fuga"}"#))
            .unwrap();
        Exchange::new(&request, response)
    }

    #[test]
    fn dump_sorts_headers_and_keeps_value_order() {
        let dump = dump(&health_exchange(), true);
        assert_eq!(
            String::from_utf8(dump).unwrap(),
            "HTTP/1.1 200 OK\r\n\
             content-type: application/json\r\n\
             x-request-id: b\r\n\
             x-request-id: a\r\n\
             \r\n\
             {\"hoge\":\"fuga\"}"
        );
    }

    #[test]
    fn dump_without_body_stops_after_headers() {
        let dump = dump(&health_exchange(), false);
        assert!(dump.ends_with(b"x-request-id: a\r\n\r\n"));
    }

    #[test]
    fn dump_is_stable() {
        let exchange = health_exchange();
        assert_eq!(dump(&exchange, true), dump(&exchange, true));
    }

    #[test]
    fn status_line_without_reason() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(status_line(Version::HTTP_11, status), "HTTP/1.1 599");
        assert_eq!(
            status_line(Version::HTTP_2, StatusCode::NO_CONTENT),
            "HTTP/2.0 204 No Content"
        );
    }

    #[test]
    fn indent_json_uses_two_spaces_and_sorted_keys() {
        let pretty = indent_json(br#"{"id":1,"created_time":1677136520}"#).unwrap();
        assert_eq!(
            String::from_utf8(pretty).unwrap(),
            "{\n  \"created_time\": 1677136520,\n  \"id\": 1\n}"
        );
    }

    #[test]
    fn indent_json_is_idempotent() {
        let once = indent_json(br#"{"b":[1,{"c":null}],"a":"x"}"#).unwrap();
        let twice = indent_json(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn indent_json_rejects_malformed_input() {
        let err = indent_json(b"{\"hoge\":").unwrap_err();
        assert!(matches!(err, Error::InvalidJson { .. }));
    }
}
