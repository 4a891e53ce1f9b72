//! Property tests for the frame codec.
//!
//! proptest generates headers, names and payloads (control bytes included)
//! and arbitrary chunk boundaries; the parser must reproduce every frame.

use eventlink::protocol::{encode_frame, Frame, Header, StreamParser, SOH};
use proptest::prelude::*;

/// Name text: at most 10 chars of up to 2 bytes each, control bytes likely.
const NAME_PATTERN: &str = "[\\x01\\x02\\x1f\\x04\\x1ba-zA-Z0-9_é]{0,10}";

/// Payload text: at most 600 chars of up to 3 bytes each.
const PAYLOAD_PATTERN: &str = "[\\x00-\\x7f é✓]{0,600}";

fn header() -> impl Strategy<Value = Header> {
    (any::<[u8; 5]>(), any::<u16>()).prop_map(|(b, message_id)| Header {
        sender: b[0],
        receiver: b[1],
        sender_group: b[2],
        receiver_group: b[3],
        flags: b[4],
        message_id,
    })
}

fn event() -> impl Strategy<Value = (Header, String, String)> {
    (header(), NAME_PATTERN, PAYLOAD_PATTERN)
}

fn parse_all(parser: &mut StreamParser, data: &[u8]) -> Vec<Frame> {
    parser
        .feed(data)
        .into_iter()
        .map(|r| r.expect("well-formed input must parse"))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_roundtrip((header, name, payload) in event()) {
        let wire = encode_frame(&header, name.as_bytes(), payload.as_bytes());

        let frames = parse_all(&mut StreamParser::new(), &wire);

        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(frames[0].header, header);
        prop_assert_eq!(&frames[0].name, &name);
        prop_assert_eq!(&frames[0].payload, &payload);
        prop_assert_eq!(&frames[0].raw, &wire);
    }

    #[test]
    fn prop_chunk_boundaries_do_not_matter(
        events in prop::collection::vec(event(), 1..5),
        splits in prop::collection::vec(1usize..64, 1..200),
    ) {
        let mut stream = Vec::new();
        for (header, name, payload) in &events {
            stream.extend_from_slice(&encode_frame(header, name.as_bytes(), payload.as_bytes()));
        }

        let whole = parse_all(&mut StreamParser::new(), &stream);

        let mut parser = StreamParser::new();
        let mut chunked = Vec::new();
        let mut rest = stream.as_slice();
        let mut sizes = splits.iter().cycle();
        while !rest.is_empty() {
            let size = (*sizes.next().unwrap()).min(rest.len());
            let (chunk, tail) = rest.split_at(size);
            chunked.extend(parse_all(&mut parser, chunk));
            rest = tail;
        }

        prop_assert_eq!(whole.len(), events.len());
        prop_assert_eq!(chunked, whole);
        prop_assert!(parser.is_idle());
    }

    #[test]
    fn prop_recovers_at_next_frame(
        garbage in prop::collection::vec(any::<u8>(), 0..128),
        (header, name, payload) in event(),
    ) {
        let wire = encode_frame(&header, name.as_bytes(), payload.as_bytes());
        let mut data = garbage;
        data.extend_from_slice(&wire);

        let results = StreamParser::new().feed(&data);

        let last = results.last().expect("the trailing frame is always emitted");
        let frame = last.as_ref().expect("the trailing frame parses");
        prop_assert_eq!(frame.header, header);
        prop_assert_eq!(&frame.name, &name);
        prop_assert_eq!(&frame.payload, &payload);
    }

    #[test]
    fn prop_stuffed_segments_hold_no_raw_delimiters((header, name, payload) in event()) {
        let wire = encode_frame(&header, name.as_bytes(), payload.as_bytes());
        let body = &wire[1..wire.len() - 1];

        // exactly two raw delimiters (STX, US) between SOH and EOT
        let raw_delims = body
            .iter()
            .enumerate()
            .filter(|(i, b)| matches!(**b, 0x02 | 0x1F) && (*i == 0 || body[*i - 1] != 0x1B))
            .count();
        prop_assert_eq!(raw_delims, 2);
        prop_assert!(!body.contains(&SOH));
        prop_assert!(!body.contains(&0x04));
    }
}
