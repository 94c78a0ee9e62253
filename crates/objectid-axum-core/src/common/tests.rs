use crate::{ApiError, ErrorBody, ErrorCode, TypeKey, cache_control, parse_max_age};
use axum::{http::StatusCode, response::IntoResponse};
use core::time::Duration;
use objectid::Error;

#[test]
fn type_keys() {
    assert_eq!(TypeKey::parse("42"), TypeKey::Id(42));
    assert_eq!(TypeKey::parse("user"), TypeKey::Name("user".into()));
    assert_eq!(TypeKey::parse("v2"), TypeKey::Name("v2".into()));
    // Too large for an id; can only ever be an unknown name.
    assert_eq!(
        TypeKey::parse("99999999999"),
        TypeKey::Name("99999999999".into())
    );
}

#[test]
fn cache_control_round_trip() {
    assert_eq!(cache_control(Duration::from_secs(86_400)), "max-age=86400");
    assert_eq!(
        parse_max_age("public, max-age=300"),
        Some(Duration::from_secs(300))
    );
    assert_eq!(parse_max_age("no-store"), Some(Duration::ZERO));
    assert_eq!(parse_max_age("public"), None);
    assert_eq!(parse_max_age("max-age=abc"), None);
}

#[test]
fn error_codes_serialize_snake_case() {
    let body = ErrorBody::from(&Error::NotFound { key: "user".into() });
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["code"], "not_found");
    assert_eq!(json["key"], "user");
    assert!(json.get("amount").is_none());

    let parsed: ErrorBody =
        serde_json::from_str(r#"{"code":"brand_new","message":"?"}"#).unwrap();
    assert_eq!(parsed.code, ErrorCode::Unknown);
}

#[test]
fn statuses_follow_error_class() {
    let cases = [
        (Error::NotFound { key: "x".into() }, StatusCode::NOT_FOUND),
        (
            Error::InvalidRequest { reason: "x".into() },
            StatusCode::BAD_REQUEST,
        ),
        (
            Error::RangeExhausted {
                type_name: "x".into(),
                last_value: 1,
                amount: 2,
            },
            StatusCode::CONFLICT,
        ),
        (
            Error::Consistency {
                type_name: "x".into(),
                expected: 1,
                found: 2,
            },
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
        (
            Error::communication("x"),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (err, status) in cases {
        assert_eq!(ApiError(err).into_response().status(), status);
    }
}

#[test]
fn client_rebuilds_caller_errors() {
    let exhausted = Error::RangeExhausted {
        type_name: "user".into(),
        last_value: u64::MAX,
        amount: 10,
    };
    match ErrorBody::from(&exhausted).into_error() {
        Error::RangeExhausted {
            type_name,
            last_value,
            amount,
        } => assert_eq!((type_name.as_str(), last_value, amount), ("user", u64::MAX, 10)),
        other => panic!("unexpected error: {other:?}"),
    }

    let missing = ErrorBody::from(&Error::NotFound { key: "7".into() }).into_error();
    assert!(matches!(missing, Error::NotFound { key } if key == "7"));

    let halted = ErrorBody::from(&Error::Consistency {
        type_name: "user".into(),
        expected: 1,
        found: 0,
    })
    .into_error();
    assert!(halted.is_fatal());
    assert!(!halted.is_retryable());
    assert!(matches!(halted, Error::Remote { code, .. } if code == "consistency"));
}
