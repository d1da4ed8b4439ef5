//! Start-print command payloads published to the printer's request topic.

/// Builds the `project_file` command starting a print of the given plate.
/// `remote_name` is the artifact's file name on the printer.
pub fn build_project_file_payload(remote_name: &str, plate_index: i64) -> String {
    let plate_index = if plate_index <= 0 { 1 } else { plate_index };
    let plate_path = format!("Metadata/plate_{}.gcode", plate_index);

    format!(
        concat!(
            "{{\"print\":{{",
            "\"command\":\"project_file\",",
            "\"param\":\"{}\",",
            "\"file\":\"{}\",",
            "\"url\":\"ftp:///{}\",",
            "\"bed_leveling\":true,",
            "\"flow_cali\":true,",
            "\"vibration_cali\":true,",
            "\"layer_inspect\":false,",
            "\"sequence_id\":\"10000000\"",
            "}}}}"
        ),
        escape_json(&plate_path),
        escape_json(remote_name),
        escape_json(remote_name)
    )
}

/// Escapes a value for embedding in a JSON string literal.
pub fn escape_json(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            ch => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = build_project_file_payload("x.gcode.3mf", 2);
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(json["print"]["command"], "project_file");
        assert_eq!(json["print"]["param"], "Metadata/plate_2.gcode");
        assert_eq!(json["print"]["file"], "x.gcode.3mf");
        assert_eq!(json["print"]["url"], "ftp:///x.gcode.3mf");
        assert_eq!(json["print"]["bed_leveling"], true);
        assert_eq!(json["print"]["layer_inspect"], false);
        assert_eq!(json["print"]["sequence_id"], "10000000");
    }

    #[test]
    fn test_plate_index_clamped_to_one() {
        for index in [0, -3] {
            let payload = build_project_file_payload("x.gcode.3mf", index);
            let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
            assert_eq!(json["print"]["param"], "Metadata/plate_1.gcode");
        }
    }

    #[test]
    fn test_remote_name_escaped() {
        let payload = build_project_file_payload("odd \"name\".gcode.3mf", 1);
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["print"]["file"], "odd \"name\".gcode.3mf");
    }

    #[test]
    fn test_escape_json_control_characters() {
        assert_eq!(escape_json("a\\b\"c\nd\re\tf"), "a\\\\b\\\"c\\nd\\re\\tf");
    }
}
