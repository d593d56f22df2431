//! Property tests for the response parser.

#![allow(clippy::unwrap_used)]

use mailbridge_imap::{Response, ResponseParser, SequenceSet, UntaggedResponse};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parse_never_panics(input in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = ResponseParser::parse(&input);
    }

    #[test]
    fn exists_count_round_trips(n in any::<u32>()) {
        let line = format!("* {n} EXISTS\r\n");
        let parsed = ResponseParser::parse(line.as_bytes()).unwrap();
        prop_assert_eq!(parsed, Response::Untagged(UntaggedResponse::Exists(n)));
    }

    #[test]
    fn range_display_is_ordered(start in 1u32..10_000, len in 0u32..10_000) {
        let set = SequenceSet::range(start, start + len);
        let text = set.to_string();
        if len == 0 {
            prop_assert_eq!(text, start.to_string());
        } else {
            prop_assert_eq!(text, format!("{}:{}", start, start + len));
        }
    }
}
