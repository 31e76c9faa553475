use super::*;
use serde_json::json;

#[test]
fn ready_event_deserialize() {
    let line = r#"{"type":"ready","data":{"options":{"table":"readings"}}}"#;
    let event = decode_event(line).unwrap();
    assert_eq!(
        event,
        HostEvent::Ready(ReadyPayload {
            options: json!({"table": "readings"})
        })
    );
}

#[test]
fn data_event_keeps_payload_shape() {
    let single = decode_event(r#"{"type":"data","data":{"temp":1}}"#).unwrap();
    assert_eq!(single, HostEvent::Data(json!({"temp": 1})));

    let batch = decode_event(r#"{"type":"data","data":[{"temp":1},{"temp":2}]}"#).unwrap();
    assert_eq!(batch, HostEvent::Data(json!([{"temp": 1}, {"temp": 2}])));
}

#[test]
fn close_event_deserialize() {
    assert_eq!(decode_event(r#"{"type":"close"}"#).unwrap(), HostEvent::Close);
    assert_eq!(decode_event("  {\"type\":\"close\"}\r").unwrap(), HostEvent::Close);
}

#[test]
fn unknown_or_malformed_events_are_protocol_errors() {
    for line in [r#"{"type":"restart"}"#, "not json", r#"{"data":{}}"#] {
        let error = decode_event(line).unwrap_err();
        assert_eq!(error.kind(), "protocol", "{}", line);
    }
}

#[test]
fn unit_notifications_serialize() {
    assert_eq!(
        encode_notification(&Notification::Ready).unwrap(),
        "{\"type\":\"ready\"}\n"
    );
    assert_eq!(
        encode_notification(&Notification::Close).unwrap(),
        "{\"type\":\"close\"}\n"
    );
}

#[test]
fn error_notification_carries_kind() {
    let error = AdapterError::InvalidData("bad payload".to_string());
    let line = encode_notification(&Notification::error(&error)).unwrap();
    let parsed: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(
        parsed,
        json!({"type": "error", "data": {"message": "bad payload", "kind": "invalid_data"}})
    );
}

#[test]
fn inserted_log_wraps_record_as_json_text() {
    let record = json!({"temp": 23, "device": "a1"});
    let Notification::Log(text) = Notification::inserted(record.as_object().unwrap()) else {
        panic!("expected log notification");
    };

    let entry: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(entry["title"], json!(INSERTED_TITLE));
    assert_eq!(entry["data"], record);
}

#[tokio::test]
async fn event_reader_skips_blank_lines() {
    let input = b"{\"type\":\"ready\",\"data\":{\"options\":{}}}\n\n   \nbroken\n{\"type\":\"close\"}\n";
    let mut reader = EventReader::new(&input[..]);

    assert!(matches!(reader.next_event().await, Some(Ok(HostEvent::Ready(_)))));
    assert!(matches!(reader.next_event().await, Some(Err(AdapterError::Protocol(_)))));
    assert!(matches!(reader.next_event().await, Some(Ok(HostEvent::Close))));
    assert!(reader.next_event().await.is_none());
}

#[tokio::test]
async fn line_notifier_writes_one_line_per_notification() {
    let notifier = LineNotifier::new(Vec::new());
    notifier.notify(Notification::Ready).await.unwrap();
    notifier
        .notify(Notification::Log("{}".to_string()))
        .await
        .unwrap();

    let written = String::from_utf8(notifier.into_inner()).unwrap();
    assert_eq!(
        written,
        "{\"type\":\"ready\"}\n{\"type\":\"log\",\"data\":\"{}\"}\n"
    );
}
