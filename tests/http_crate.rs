#![cfg(feature = "http")]

use http::{Request, Response, StatusCode};
use http_message_sign::{
    Ed25519, FixedClock, Headers, MessageBody, SignOptions, SignatureInput, SignatureService,
    Signer, StaticKeyDirectory,
};

const NOW: i64 = 1_700_000_000;

fn service() -> SignatureService<Ed25519, StaticKeyDirectory, FixedClock> {
    let signer = Ed25519::from_seed(&[11; 32]).unwrap();
    let keys = StaticKeyDirectory::new().with_key(signer.public_key());
    SignatureService::with_clock(signer, keys, FixedClock(NOW))
}

#[test]
fn sign_and_verify_http_request() {
    let service = service();
    let mut request = Request::builder()
        .method("POST")
        .uri("https://example.com/users?active=true")
        .header("Content-Type", "application/json")
        .body(MessageBody::from(r#"{"name":"John Doe"}"#))
        .unwrap();

    service.sign(&mut request, &SignOptions::default()).unwrap();

    assert!(request.headers().contains_key("content-digest"));
    let input: SignatureInput = request.headers()["signature-input"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(
        input.covered_components(),
        ["@method", "@target-uri", "content-type", "content-digest"]
    );
    assert!(service.verify(&mut request));

    *request.body_mut() = MessageBody::from("{}");
    assert!(!service.verify(&mut request));
}

#[test]
fn sign_and_verify_http_response() {
    let service = service();
    let mut response = Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/plain")
        .body(MessageBody::from("missing"))
        .unwrap();

    service.sign(&mut response, &SignOptions::default()).unwrap();
    assert!(service.verify(&mut response));

    *response.status_mut() = StatusCode::OK;
    assert!(!service.verify(&mut response));
}

#[test]
fn multi_valued_headers_are_combined() {
    let mut request = Request::builder()
        .method("GET")
        .uri("/feed")
        .header("Accept", "text/html")
        .header("Accept", " application/json ")
        .body(MessageBody::default())
        .unwrap();

    assert_eq!(
        request.headers().combined_value("accept").unwrap().as_deref(),
        Some("text/html, application/json")
    );

    let service = service();
    let options = SignOptions::default().with_additional_headers(["accept"]);
    service.sign(&mut request, &options).unwrap();
    assert!(service.verify(&mut request));

    request
        .headers_mut()
        .append("accept", "text/plain".parse().unwrap());
    assert!(!service.verify(&mut request));
}

#[test]
fn invalid_header_values_are_rejected_on_insert() {
    let mut headers = http::HeaderMap::new();
    assert!(headers.insert_header("x-ok", "fine").is_ok());
    assert!(headers.insert_header("bad name", "value").is_err());
    assert!(headers.insert_header("x-bad", "line\nbreak").is_err());
}
