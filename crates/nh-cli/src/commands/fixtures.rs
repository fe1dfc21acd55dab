//! Payloads shared by command tests.

use chrono::{DateTime, TimeZone, Utc};
use nh_core::CompactDetail;
use serde_json::json;

fn at(hour: u32, minute: u32) -> String {
    Utc.with_ymd_and_hms(2016, 5, 1, hour, minute, 0)
        .unwrap()
        .to_rfc3339()
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap()
}

/// Skeleton 1: traced 10:00-10:04 with a connector at 10:30, reviewed
/// 11:00-11:02, one node moved at 12:00. Skeleton 2 has a bad timestamp.
pub fn payload() -> CompactDetail {
    serde_json::from_value(json!({
        "skeletons": {
            "1": [
                [
                    [1, null, 3, 0.0, 0.0, 0.0, -1, 5, at(10, 0), null],
                    [2, 1, 3, 3.0, 4.0, 0.0, -1, 5, at(10, 2), null],
                    [3, 2, 3, 3.0, 4.0, 10.0, -1, 5, at(10, 4), at(12, 0)],
                    [3, 2, 3, 3.0, 4.0, 20.0, -1, 5, at(12, 0), null]
                ],
                [[2, 100, 0, 0.0, 0.0, 0.0, at(10, 30), null]],
                {"soma": [[1, 3, at(10, 1), null]]},
                [
                    [7, 1, 1, at(11, 0)],
                    [7, 2, 2, at(11, 2)]
                ]
            ],
            "2": [
                [[1, null, 3, 0.0, 0.0, 0.0, -1, 5, "whenever", null]],
                [],
                {},
                []
            ]
        }
    }))
    .unwrap()
}
