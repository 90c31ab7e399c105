use ember::codec::{parse_exact, tokenize, ArgKind, Signature};
use ember::error::ParseError;
use proptest::prelude::*;

fn signature_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just('s'), Just('d'), Just('f')], 0..6)
        .prop_map(|kinds| kinds.into_iter().collect())
}

fn token_for(kind: char) -> BoxedStrategy<String> {
    match kind {
        'd' => any::<i64>().prop_map(|n| n.to_string()).boxed(),
        'f' => (-1.0e9f64..1.0e9).prop_map(|x| x.to_string()).boxed(),
        _ => "[a-zA-Z/._-]{1,12}".boxed(),
    }
}

fn line_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    signature_strategy().prop_flat_map(|sig| {
        let tokens: Vec<_> = sig.chars().map(token_for).collect();
        (Just(sig), tokens)
    })
}

proptest! {
    #[test]
    fn exact_token_count_parses((sig, tokens) in line_strategy()) {
        let signature = Signature::parse(&sig).unwrap();
        let line = tokens.join(" ");
        let args = parse_exact(&signature, tokenize(&line)).unwrap();

        prop_assert_eq!(args.len(), signature.len());
        prop_assert_eq!(args.capacity(), signature.len());
        for (arg, kind) in args.iter().zip(signature.kinds()) {
            prop_assert_eq!(arg.kind(), *kind);
        }
    }

    #[test]
    fn one_token_short_is_missing((sig, tokens) in line_strategy()) {
        prop_assume!(!tokens.is_empty());
        let signature = Signature::parse(&sig).unwrap();
        let line = tokens[..tokens.len() - 1].join(" ");
        let err = parse_exact(&signature, tokenize(&line)).unwrap_err();
        let is_missing = matches!(err, ParseError::MissingArgument { position, .. } if position == tokens.len() - 1);
        prop_assert!(is_missing);
    }

    #[test]
    fn one_token_extra_is_rejected((sig, tokens) in line_strategy()) {
        let signature = Signature::parse(&sig).unwrap();
        let line = format!("{} extra", tokens.join(" "));
        let err = parse_exact(&signature, tokenize(&line)).unwrap_err();
        let is_extra = matches!(err, ParseError::TooManyArguments { .. });
        prop_assert!(is_extra);
    }

    #[test]
    fn non_numeric_integer_never_coerces(word in "[a-zA-Z][a-zA-Z0-9]{0,8}") {
        let signature = Signature::parse("d").unwrap();
        let err = parse_exact(&signature, tokenize(&word)).unwrap_err();
        let is_invalid = matches!(err, ParseError::InvalidNumber { kind: ArgKind::Integer, .. });
        prop_assert!(is_invalid);
    }

    #[test]
    fn unknown_signature_chars_rejected(sig in "[sdf]{0,3}[a-ceg-rt-z][sdf]{0,3}") {
        prop_assert!(Signature::parse(&sig).is_err());
    }
}
