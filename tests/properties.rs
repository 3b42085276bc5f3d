use http_message_sign::{
    Ed25519, FixedClock, OwnedHttpMessage, ParamValue, SignOptions, SignatureBase,
    SignatureComponents, SignatureInput, SignatureService, Signer, StaticKeyDirectory,
};
use proptest::prelude::*;

const HEADERS: [(&str, &str); 5] = [
    ("accept", "application/json"),
    ("content-type", "text/plain"),
    ("date", "Tue, 20 Apr 2021 02:07:55 GMT"),
    ("x-request-id", "42"),
    ("x-trace", "abc"),
];

/// Largest integer a structured field can carry.
const MAX_INTEGER: i64 = 999_999_999_999_999;

fn parameters() -> impl Strategy<Value = Vec<(String, ParamValue)>> {
    (
        proptest::option::of(0i64..=MAX_INTEGER),
        proptest::option::of(0i64..=MAX_INTEGER),
        proptest::option::of("[ -~]{1,16}"),
        proptest::option::of("[ -~]{1,64}"),
        proptest::option::of(-MAX_INTEGER..=MAX_INTEGER),
        proptest::option::of("[ -~]{0,16}"),
    )
        .prop_map(|(created, expires, nonce, keyid, custom, tag)| {
            let mut parameters = Vec::new();
            if let Some(created) = created {
                parameters.push(("created".to_string(), ParamValue::Int(created)));
            }
            if let Some(expires) = expires {
                parameters.push(("expires".to_string(), ParamValue::Int(expires)));
            }
            parameters.push(("alg".to_string(), ParamValue::from("ed25519")));
            if let Some(keyid) = keyid {
                parameters.push(("keyid".to_string(), ParamValue::Str(keyid)));
            }
            if let Some(nonce) = nonce {
                parameters.push(("nonce".to_string(), ParamValue::Str(nonce)));
            }
            if let Some(custom) = custom {
                parameters.push(("window".to_string(), ParamValue::Int(custom)));
            }
            if let Some(tag) = tag {
                parameters.push(("tag".to_string(), ParamValue::Str(tag)));
            }
            parameters
        })
}

proptest! {
    #[test]
    fn signature_input_round_trips(
        label in "[a-z][a-z0-9_]{0,9}",
        covered in proptest::collection::vec("@?[a-z][ -~]{0,15}", 1..6),
        parameters in parameters(),
    ) {
        let input = SignatureInput::new(label, covered, parameters).unwrap();
        let parsed: SignatureInput = input.to_string().parse().unwrap();

        prop_assert_eq!(parsed.signature_label(), input.signature_label());
        prop_assert_eq!(parsed.covered_components(), input.covered_components());
        prop_assert_eq!(
            parsed.parameters().collect::<Vec<_>>(),
            input.parameters().collect::<Vec<_>>()
        );
        prop_assert_eq!(parsed, input);
    }

    #[test]
    fn base_order_follows_covered_components(
        insertion in Just(HEADERS.to_vec()).prop_shuffle(),
        covered in Just(HEADERS.iter().map(|(name, _)| *name).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let components = SignatureComponents::new(insertion).unwrap();
        let input = SignatureInput::new("sig1", covered.iter().copied(), Vec::<(String, ParamValue)>::new()).unwrap();
        let base = SignatureBase::new(&input, &components).unwrap();

        let names: Vec<&str> = base
            .as_str()
            .lines()
            .map(|line| line.split('"').nth(1).unwrap())
            .collect();
        let mut expected = covered.clone();
        expected.push("@signature-params");
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn header_whitespace_is_normalised(
        words in proptest::collection::vec(("[a-z;=/]{1,6}", "[ \t]{1,4}"), 1..6),
        leading in "[ \t]{0,3}",
    ) {
        let mut value = leading;
        for (word, separator) in &words {
            value.push_str(word);
            value.push_str(separator);
        }
        let components = SignatureComponents::new([("x-value", value)]).unwrap();
        let input = SignatureInput::new("sig1", ["x-value"], Vec::<(String, ParamValue)>::new()).unwrap();
        let base = SignatureBase::new(&input, &components).unwrap();

        let expected = words
            .iter()
            .map(|(word, _)| word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let first_line = base.as_str().lines().next().unwrap();
        prop_assert_eq!(first_line, format!("\"x-value\": {expected}"));
    }

    #[test]
    fn signed_requests_verify(
        method in "(GET|POST|PUT|DELETE|PATCH)",
        path in "/[a-z0-9/]{0,20}",
        body in proptest::collection::vec(any::<u8>(), 0..256),
        header_value in "[ -~]{1,32}",
        nonce in proptest::option::of("[ -~]{1,24}"),
    ) {
        let signer = Ed25519::from_seed(&[3; 32]).unwrap();
        let keys = StaticKeyDirectory::new().with_key(signer.public_key());
        let service = SignatureService::with_clock(signer, keys, FixedClock(1_700_000_000));

        let mut request = OwnedHttpMessage::request(method, path)
            .with_header("X-Value", header_value)
            .with_body(body);
        let mut options = SignOptions::default().with_additional_headers(["x-value"]);
        if let Some(nonce) = nonce {
            options = options.with_nonce(nonce);
        }
        service.sign(&mut request, &options).unwrap();

        prop_assert!(service.verify(&mut request));
    }
}
