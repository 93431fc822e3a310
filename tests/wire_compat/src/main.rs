fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bandbridge_protocol::{FILE_TAG, FileCommand, FileEvent, HandshakeFrame, Inbound, encode, encode_command};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The receiver runs JavaScript, where every number is a double; `65`
    /// and `65.0` are the same value on its side.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    fn assert_same(name: &str, fixture: &serde_json::Value, encoded: &str) {
        let encoded: serde_json::Value = serde_json::from_str(encoded)
            .unwrap_or_else(|e| panic!("encoded {name} is not JSON: {e}"));
        assert_eq!(
            normalize_value(fixture),
            normalize_value(&encoded),
            "wire mismatch for {name}:\n  fixture: {fixture}\n  encoded: {encoded}"
        );
    }

    /// Decodes an outbound fixture into a command and re-encodes it with
    /// its envelope tag.
    fn command_roundtrip(name: &str) -> FileCommand {
        let fixture = load_fixture(name);
        let command: FileCommand = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let encoded = encode_command(&command)
            .unwrap_or_else(|e| panic!("failed to encode {name}: {e}"));
        assert_same(name, &fixture, &encoded);
        command
    }

    /// Decodes an inbound fixture through the envelope router and re-encodes
    /// the event.
    fn event_roundtrip(name: &str) -> FileEvent {
        let fixture = load_fixture(name);
        let event = match Inbound::parse(&fixture) {
            Ok(Inbound::File(event)) => event,
            other => panic!("{name} did not decode as a file event: {other:?}"),
        };
        let encoded = encode(FILE_TAG, &event)
            .unwrap_or_else(|e| panic!("failed to encode {name}: {e}"));
        assert_same(name, &fixture, &encoded);
        event
    }

    // --- Outbound ---

    #[test]
    fn fixture_handshake() {
        let fixture = load_fixture("handshake.json");
        match Inbound::parse(&fixture).unwrap() {
            Inbound::Handshake(frame) => assert_eq!(frame, HandshakeFrame::new(0)),
            other => panic!("unexpected {other:?}"),
        }
        let encoded = bandbridge_protocol::encode_handshake(0).unwrap();
        assert_same("handshake.json", &fixture, &encoded);
    }

    #[test]
    fn fixture_start_transfer() {
        let command = command_roundtrip("start_transfer.json");
        assert_eq!(
            command,
            FileCommand::StartTransfer {
                filename: "book.txt".into(),
                total: 5,
                chunk_size: 20480,
            }
        );
    }

    #[test]
    fn fixture_data_chunk() {
        let command = command_roundtrip("data_chunk.json");
        assert!(matches!(
            command,
            FileCommand::Data {
                count: 3,
                set_count: None,
                ..
            }
        ));
    }

    #[test]
    fn fixture_data_resend() {
        let command = command_roundtrip("data_resend.json");
        assert_eq!(command, FileCommand::data(2, "resumed text", true));
    }

    #[test]
    fn fixture_cancel() {
        assert_eq!(command_roundtrip("cancel.json"), FileCommand::Cancel);
    }

    #[test]
    fn fixture_get_usage() {
        assert_eq!(command_roundtrip("get_usage.json"), FileCommand::GetUsage);
    }

    // --- Inbound ---

    #[test]
    fn fixture_ready() {
        let event = event_roundtrip("ready.json");
        assert_eq!(
            event,
            FileEvent::Ready {
                usage: 1_048_576,
                found: true,
                length: 40960,
            }
        );
    }

    #[test]
    fn fixture_ready_with_float_numbers() {
        let event = event_roundtrip("ready_float.json");
        assert_eq!(
            event,
            FileEvent::Ready {
                usage: 1_048_576,
                found: false,
                length: 0,
            }
        );
    }

    #[test]
    fn fixture_next() {
        assert!(matches!(event_roundtrip("next.json"), FileEvent::Next { count: 4, .. }));
    }

    #[test]
    fn fixture_error() {
        assert!(matches!(event_roundtrip("error.json"), FileEvent::Error { count: 1, .. }));
    }

    #[test]
    fn fixture_success() {
        let event = event_roundtrip("success.json");
        assert_eq!(
            event,
            FileEvent::Success {
                message: "success".into(),
                count: 5,
            }
        );
    }

    #[test]
    fn fixture_remote_cancel() {
        assert_eq!(event_roundtrip("remote_cancel.json"), FileEvent::Cancel);
    }

    #[test]
    fn all_fixtures_decode() {
        let mut count = 0;
        for entry in fs::read_dir(fixtures_dir()).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let fixture = load_fixture(&name);
            let is_outbound = fixture.get("stat").is_some();
            if is_outbound {
                serde_json::from_value::<FileCommand>(fixture)
                    .unwrap_or_else(|e| panic!("{name}: {e}"));
            } else {
                Inbound::parse(&fixture).unwrap_or_else(|e| panic!("{name}: {e}"));
            }
            count += 1;
        }
        assert!(count >= 12, "expected all fixtures, found {count}");
    }
}
