/// Groups a month of tide events into calendar days.
///
/// The feeds deliver every port-month as one flat, time-ordered list of
/// extrema. Each calendar day carries three or four of them. This module
/// walks the list with a cursor, consuming three events per day plus a
/// fourth one when it still falls on the same day, and attaches the
/// morning or evening coefficient to every tide.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::model::{
    AnnotatedTide, CoefficientTable, DayTideGroup, Port, PortMonthDocument, TideError,
    TideEvent, TIME_FORMAT,
};

// ---------------------------------------------------------------------------
// Trailing group policy
// ---------------------------------------------------------------------------

/// What to do with the one or two events left after the last full day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncompleteTrailingGroupPolicy {
    /// Discard them and report how many were discarded.
    #[default]
    Drop,
    /// Fail the whole port-month.
    Error,
}

/// Result of grouping one port-month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthGrouping {
    pub days: BTreeMap<NaiveDate, DayTideGroup>,
    /// Events left over at the end of the sequence (0, 1 or 2).
    pub dropped: usize,
}

impl MonthGrouping {
    /// Attaches port identity and turns the grouping into the persisted document.
    pub fn into_document(self, port: &Port, month: u32) -> PortMonthDocument {
        PortMonthDocument {
            port_id: port.id.clone(),
            port_code: port.code.clone(),
            port_name: port.name.clone(),
            month,
            days: self.days,
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Groups `events` into days of three or four tides.
///
/// Starting at the first unconsumed event, a group always takes the next
/// three events. A fourth is added only when its date equals the date of
/// the group's first event. The group is keyed by that first date.
///
/// Every tide gets the coefficient of the group's day: the morning value
/// before 12:00, the evening value from 12:00 on. A missing coefficient
/// fails the whole month.
pub fn group_month(
    events: &[TideEvent],
    coefficients: &CoefficientTable,
    policy: IncompleteTrailingGroupPolicy,
) -> Result<MonthGrouping, TideError> {
    let mut days = BTreeMap::new();
    let mut i = 0;

    while i + 2 < events.len() {
        let (group, consumed) = build_day(&events[i..], coefficients)?;
        let day = events[i].date;

        match days.entry(day) {
            Entry::Vacant(slot) => {
                slot.insert(group);
            }
            Entry::Occupied(_) => {
                return Err(TideError::MalformedFeed(format!(
                    "more than four tides on {}",
                    day
                )));
            }
        }
        i += consumed;
    }

    let dropped = events.len() - i;
    if dropped > 0 && policy == IncompleteTrailingGroupPolicy::Error {
        return Err(TideError::IncompleteTrailingGroup { remaining: dropped });
    }

    Ok(MonthGrouping { days, dropped })
}

/// Builds the group starting at `events[0]`. Returns the group and the
/// number of events it consumed (3 or 4). Requires at least three events.
fn build_day(
    events: &[TideEvent],
    coefficients: &CoefficientTable,
) -> Result<(DayTideGroup, usize), TideError> {
    let day = events[0].date;

    let fourth_tide = match events.get(3) {
        Some(event) if event.date == day => Some(annotate(event, day, coefficients)?),
        _ => None,
    };

    let group = DayTideGroup {
        first_tide: annotate(&events[0], day, coefficients)?,
        second_tide: annotate(&events[1], day, coefficients)?,
        third_tide: annotate(&events[2], day, coefficients)?,
        fourth_tide,
    };
    let consumed = group.tide_count();
    Ok((group, consumed))
}

fn annotate(
    event: &TideEvent,
    day: NaiveDate,
    coefficients: &CoefficientTable,
) -> Result<AnnotatedTide, TideError> {
    Ok(AnnotatedTide {
        meters: event.height_meters,
        time: event.time.format(TIME_FORMAT).to_string(),
        coefficient: coefficients.coefficient_at(day, event.time)?,
        high_tide: event.is_high_tide,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(date: &str, time: &str, meters: f64) -> TideEvent {
        TideEvent::parse(date, time, meters, None).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn may_table() -> CoefficientTable {
        let mut table = CoefficientTable::new();
        table.insert(ymd(2024, 5, 1), 70.0, 68.0);
        table.insert(ymd(2024, 5, 2), 65.0, 63.0);
        table.insert(ymd(2024, 5, 3), 60.0, 58.0);
        table
    }

    /// Flattens the grouped tides back into (date, time) pairs in group order.
    fn consumed_order(grouping: &MonthGrouping) -> Vec<(NaiveDate, String)> {
        let mut out = Vec::new();
        for (day, group) in &grouping.days {
            let mut tides = vec![&group.first_tide, &group.second_tide, &group.third_tide];
            if let Some(fourth) = &group.fourth_tide {
                tides.push(fourth);
            }
            for tide in tides {
                out.push((*day, tide.time.clone()));
            }
        }
        out
    }

    // --- Day boundaries -----------------------------------------------------

    #[test]
    fn test_three_tide_day_followed_by_partial_day_is_dropped() {
        let events = vec![
            ev("2024-05-01", "08:10", 1.2),
            ev("2024-05-01", "14:22", 0.3),
            ev("2024-05-01", "20:05", 1.1),
            ev("2024-05-02", "02:00", 1.3),
            ev("2024-05-02", "09:00", 0.2),
        ];
        let grouping = group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Drop)
            .expect("grouping should succeed");

        assert_eq!(grouping.days.len(), 1, "only 2024-05-01 has a full group");
        assert_eq!(grouping.dropped, 2);

        let day = &grouping.days[&ymd(2024, 5, 1)];
        // 14:22 is past noon, so only the 08:10 tide takes the morning value.
        assert_eq!(day.first_tide.coefficient, 70.0);
        assert_eq!(day.second_tide.coefficient, 68.0);
        assert_eq!(day.third_tide.coefficient, 68.0);
        assert!(day.fourth_tide.is_none());
    }

    #[test]
    fn test_fourth_event_on_same_day_is_absorbed() {
        let events = vec![
            ev("2024-05-01", "01:10", 1.2),
            ev("2024-05-01", "07:22", 0.3),
            ev("2024-05-01", "13:35", 1.1),
            ev("2024-05-01", "19:50", 0.4),
            ev("2024-05-02", "02:00", 1.3),
            ev("2024-05-02", "08:15", 0.2),
            ev("2024-05-02", "14:30", 1.2),
        ];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Error).unwrap();

        assert_eq!(grouping.days.len(), 2);
        assert_eq!(grouping.dropped, 0, "cursor must advance by 4 on a four-tide day");

        let first = &grouping.days[&ymd(2024, 5, 1)];
        let fourth = first.fourth_tide.as_ref().expect("fourth tide should be present");
        assert_eq!(fourth.time, "19:50");
        assert_eq!(fourth.coefficient, 68.0);

        let second = &grouping.days[&ymd(2024, 5, 2)];
        assert_eq!(second.first_tide.time, "02:00");
        assert!(second.fourth_tide.is_none());
    }

    #[test]
    fn test_fourth_event_on_next_day_starts_next_group() {
        let events = vec![
            ev("2024-05-01", "04:10", 1.2),
            ev("2024-05-01", "10:22", 0.3),
            ev("2024-05-01", "16:35", 1.1),
            ev("2024-05-02", "04:50", 1.3),
            ev("2024-05-02", "11:05", 0.3),
            ev("2024-05-02", "17:15", 1.2),
        ];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Error).unwrap();

        assert_eq!(grouping.days.len(), 2);
        assert!(grouping.days[&ymd(2024, 5, 1)].fourth_tide.is_none());
        assert_eq!(grouping.days[&ymd(2024, 5, 2)].first_tide.time, "04:50");
    }

    #[test]
    fn test_mixed_three_and_four_tide_days_preserve_order() {
        let events = vec![
            ev("2024-05-01", "00:40", 1.0),
            ev("2024-05-01", "06:50", 0.2),
            ev("2024-05-01", "13:05", 1.1),
            ev("2024-05-01", "19:20", 0.3),
            ev("2024-05-02", "07:30", 0.2),
            ev("2024-05-02", "13:45", 1.2),
            ev("2024-05-02", "20:00", 0.3),
            ev("2024-05-03", "02:10", 1.1),
            ev("2024-05-03", "08:20", 0.3),
            ev("2024-05-03", "14:35", 1.0),
            ev("2024-05-03", "20:50", 0.4),
        ];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Error).unwrap();

        let expected: Vec<(NaiveDate, String)> = events
            .iter()
            .map(|e| (e.date, e.time.format(TIME_FORMAT).to_string()))
            .collect();
        assert_eq!(consumed_order(&grouping), expected, "no reordering or duplication");

        let counts: Vec<usize> = grouping.days.values().map(|g| g.tide_count()).collect();
        assert_eq!(counts, vec![4, 3, 4]);
    }

    // --- Trailing policy ----------------------------------------------------

    #[test]
    fn test_single_trailing_event_is_reported_as_dropped() {
        let events = vec![
            ev("2024-05-01", "04:10", 1.2),
            ev("2024-05-01", "10:22", 0.3),
            ev("2024-05-01", "16:35", 1.1),
            ev("2024-05-02", "04:50", 1.3),
        ];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Drop).unwrap();
        assert_eq!(grouping.days.len(), 1);
        assert_eq!(grouping.dropped, 1, "the lone 2024-05-02 event cannot form a day");

        let grouping =
            group_month(&events[..3], &may_table(), IncompleteTrailingGroupPolicy::Drop).unwrap();
        assert_eq!(grouping.dropped, 0);
    }

    #[test]
    fn test_error_policy_rejects_leftover_events() {
        let events = vec![
            ev("2024-05-01", "08:10", 1.2),
            ev("2024-05-01", "14:22", 0.3),
            ev("2024-05-01", "20:05", 1.1),
            ev("2024-05-02", "02:00", 1.3),
            ev("2024-05-02", "09:00", 0.2),
        ];
        let result = group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Error);
        assert!(
            matches!(result, Err(TideError::IncompleteTrailingGroup { remaining: 2 })),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_fewer_than_three_events_yield_no_days() {
        let events = vec![ev("2024-05-01", "08:10", 1.2), ev("2024-05-01", "14:22", 0.3)];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Drop).unwrap();
        assert!(grouping.days.is_empty());
        assert_eq!(grouping.dropped, 2);
    }

    #[test]
    fn test_empty_month_is_not_an_error() {
        let grouping =
            group_month(&[], &may_table(), IncompleteTrailingGroupPolicy::Error).unwrap();
        assert!(grouping.days.is_empty());
        assert_eq!(grouping.dropped, 0);
    }

    // --- Coefficients -------------------------------------------------------

    #[test]
    fn test_missing_coefficient_fails_the_month() {
        let events = vec![
            ev("2024-06-01", "08:10", 1.2),
            ev("2024-06-01", "14:22", 0.3),
            ev("2024-06-01", "20:05", 1.1),
        ];
        let result = group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Drop);
        assert!(
            matches!(result, Err(TideError::MissingCoefficient { .. })),
            "got {:?}",
            result
        );
    }

    #[test]
    fn test_coefficient_is_chosen_per_tide_not_per_day() {
        let events = vec![
            ev("2024-05-02", "11:59", 1.2),
            ev("2024-05-02", "12:00", 0.3),
            ev("2024-05-02", "18:05", 1.1),
            ev("2024-05-02", "23:58", 0.4),
        ];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Error).unwrap();
        let day = &grouping.days[&ymd(2024, 5, 2)];
        assert_eq!(day.first_tide.coefficient, 65.0);
        assert_eq!(day.second_tide.coefficient, 63.0);
        assert_eq!(day.fourth_tide.as_ref().unwrap().coefficient, 63.0);
    }

    #[test]
    fn test_high_tide_flag_is_carried_through() {
        let events = vec![
            TideEvent::parse("2024-05-01", "02:00", 3.4, Some(true)).unwrap(),
            TideEvent::parse("2024-05-01", "08:10", 0.6, Some(false)).unwrap(),
            TideEvent::parse("2024-05-01", "14:30", 3.2, Some(true)).unwrap(),
        ];
        let grouping =
            group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Error).unwrap();
        let day = &grouping.days[&ymd(2024, 5, 1)];
        assert_eq!(day.first_tide.high_tide, Some(true));
        assert_eq!(day.second_tide.high_tide, Some(false));
    }

    // --- Feed anomalies -----------------------------------------------------

    #[test]
    fn test_five_tides_on_one_day_is_a_malformed_feed() {
        let events = vec![
            ev("2024-05-01", "00:10", 1.2),
            ev("2024-05-01", "04:20", 0.3),
            ev("2024-05-01", "09:30", 1.1),
            ev("2024-05-01", "14:40", 0.4),
            ev("2024-05-01", "18:50", 1.0),
            ev("2024-05-01", "22:00", 0.2),
            ev("2024-05-01", "23:30", 1.1),
        ];
        let result = group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Drop);
        assert!(matches!(result, Err(TideError::MalformedFeed(_))), "got {:?}", result);
    }

    #[test]
    fn test_document_carries_port_identity() {
        let events = vec![
            ev("2024-05-01", "08:10", 1.2),
            ev("2024-05-01", "14:22", 0.3),
            ev("2024-05-01", "20:05", 1.1),
        ];
        let port = Port {
            id: Some("11".to_string()),
            code: "vigo".to_string(),
            name: "Vigo".to_string(),
            latitude: Some(42.24),
            longitude: Some(-8.73),
        };
        let doc = group_month(&events, &may_table(), IncompleteTrailingGroupPolicy::Drop)
            .unwrap()
            .into_document(&port, 5);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["port_id"], "11");
        assert_eq!(json["port_code"], "vigo");
        assert_eq!(json["port_name"], "Vigo");
        assert_eq!(json["month"], 5);
        assert_eq!(json["2024-05-01"]["third_tide"]["time"], "20:05");
    }
}
