use super::*;

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_csv_leading_frame() {
    let frame = FrameFormat::Csv.leading_frame(&cols(&["id", "name"]));
    assert_eq!(frame.kind, FrameKind::Leading);
    assert_eq!(&frame.bytes[..], b"id,name\n");
}

#[test]
fn test_csv_row_quotes_special_characters() {
    let frame = FrameFormat::Csv.row_frame(&[
        SqlValue::Integer(1),
        SqlValue::Text("a,b".to_string()),
        SqlValue::Text("say \"hi\"".to_string()),
        SqlValue::Null,
    ]);
    assert_eq!(frame.kind, FrameKind::Row);
    assert_eq!(&frame.bytes[..], b"1,\"a,b\",\"say \"\"hi\"\"\",\n");
}

#[test]
fn test_ndjson_frames() {
    let format = FrameFormat::Ndjson;
    let leading = format.leading_frame(&cols(&["id", "ok"]));
    assert_eq!(&leading.bytes[..], b"{\"columns\":[\"id\",\"ok\"]}\n");

    let row = format.row_frame(&[SqlValue::Integer(7), SqlValue::Bool(true)]);
    assert_eq!(&row.bytes[..], b"[7,true]\n");
}

#[test]
fn test_ndjson_null_and_real() {
    let row = FrameFormat::Ndjson.row_frame(&[SqlValue::Null, SqlValue::Real(1.5)]);
    assert_eq!(&row.bytes[..], b"[null,1.5]\n");
}

#[test]
fn test_format_from_str() {
    assert_eq!("csv".parse::<FrameFormat>().unwrap(), FrameFormat::Csv);
    assert_eq!("NDJSON".parse::<FrameFormat>().unwrap(), FrameFormat::Ndjson);
    assert_eq!("jsonl".parse::<FrameFormat>().unwrap(), FrameFormat::Ndjson);
    assert!("xml".parse::<FrameFormat>().is_err());
}

#[test]
fn test_content_types() {
    assert!(FrameFormat::Csv.content_type().starts_with("text/csv"));
    assert_eq!(FrameFormat::Ndjson.content_type(), "application/x-ndjson");
}
