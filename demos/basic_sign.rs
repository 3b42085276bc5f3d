use http_message_sign::{
    Ed25519, OwnedHttpMessage, SignOptions, SignatureService, Signer, StaticKeyDirectory,
};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let pkcs8 = Ed25519::generate_pkcs8().expect("Failed to generate key pair");
    let signer = Ed25519::from_pkcs8(&pkcs8).expect("Failed to load key pair");
    let keys = StaticKeyDirectory::new().with_key(signer.public_key());
    let service = SignatureService::new(signer, keys);

    let mut request = OwnedHttpMessage::request("POST", "https://example.com/foo/bar?foo=bar")
        .with_header("Content-Type", "application/json")
        .with_header("X-Foo", "bar")
        .with_body(r#"{"hello":"world"}"#);

    let options = SignOptions::default().with_additional_headers(["content-type", "x-foo"]);
    service.sign(&mut request, &options).expect("Failed to sign");
    println!("{request:#?}");
    println!("verified: {}", service.verify(&mut request));
}
