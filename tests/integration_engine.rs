//! Integration tests for admission, queueing and disconnection in full runs.

mod common;

use chargepark_sim::sim::engine::Engine;
use chargepark_sim::sim::event::EventId;
use chargepark_sim::sim::kpi::KpiReport;
use chargepark_sim::sim::policy::PolicyKind;
use chargepark_sim::sim::types::{DisconnectPolicy, OpeningHours};

use common::{at, event, hourly, scenario, vehicle, wallbox_site};

#[test]
fn queue_is_served_first_in_first_out() {
    let car = vehicle(50.0, 11.0);
    let events = vec![
        event(0, 0, 2, 0.0, &car),
        event(1, 0, 5, 0.0, &car),
        event(2, 0, 5, 0.0, &car),
        event(3, 0, 5, 0.0, &car),
    ];
    let s = scenario(hourly(8), wallbox_site(1, 11.0, None), PolicyKind::Fcfs, events)
        .with_queue_length(2);
    let result = Engine::new(s).unwrap().run().unwrap();

    // event 3 finds the point taken and the queue full
    assert_eq!(result.counter_arrivals, 4);
    assert_eq!(result.counter_rejections, 1);
    assert_eq!(result.counter_connections, 2);

    let periods = &result.charging_periods;
    assert_eq!(periods.get(EventId(0)).map(|p| p.first_charged), Some(at(0)));
    assert_eq!(periods.get(EventId(1)).map(|p| p.first_charged), Some(at(2)));
    // event 2 waited until its own leaving time and never got a point
    assert!(periods.get(EventId(2)).is_none());

    let power = result.point_power_by_name("cp1").unwrap();
    assert_eq!(power, &[11.0, 11.0, 11.0, 11.0, 11.0, 0.0, 0.0, 0.0]);
}

#[test]
fn disconnect_by_soc_frees_the_point_early() {
    let car = vehicle(44.0, 11.0);
    let events = vec![event(0, 0, 6, 0.5, &car), event(1, 0, 6, 0.5, &car)];
    let run = |policy: DisconnectPolicy| {
        let s = scenario(
            hourly(8),
            wallbox_site(1, 11.0, None),
            PolicyKind::Uncontrolled,
            events.clone(),
        )
        .with_queue_length(1)
        .with_disconnect_policy(policy);
        Engine::new(s).unwrap().run().unwrap()
    };

    let by_soc = run(DisconnectPolicy::BySoc);
    assert_eq!(
        by_soc.charging_periods.get(EventId(1)).map(|p| p.first_charged),
        Some(at(2))
    );

    // by time the first car blocks the point until it leaves at 06:00, which
    // is also when the queued car leaves
    let by_time = run(DisconnectPolicy::ByTime);
    assert!(by_time.charging_periods.get(EventId(1)).is_none());
    assert_eq!(by_time.counter_rejections, 0);
}

#[test]
fn arrivals_outside_opening_hours_are_rejected() {
    let car = vehicle(50.0, 11.0);
    let events = vec![
        event(0, 6, 4, 0.2, &car),
        event(1, 9, 4, 0.2, &car),
        event(2, 19, 2, 0.2, &car),
    ];
    let s = scenario(hourly(24), wallbox_site(2, 11.0, None), PolicyKind::Uncontrolled, events)
        .with_opening_hours(OpeningHours::new(8.0, 18.0).unwrap());
    let result = Engine::new(s).unwrap().run().unwrap();

    assert_eq!(result.counter_arrivals, 3);
    assert_eq!(result.counter_rejections, 2);
    assert_eq!(result.counter_connections, 1);
    let kpi = KpiReport::from_result(&result);
    assert!((kpi.rejection_rate - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn nothing_charges_while_closed() {
    let car = vehicle(100.0, 11.0);
    let events = vec![event(0, 10, 12, 0.0, &car)];
    let s = scenario(hourly(24), wallbox_site(1, 11.0, None), PolicyKind::Uncontrolled, events)
        .with_opening_hours(OpeningHours::new(8.0, 18.0).unwrap());
    let result = Engine::new(s).unwrap().run().unwrap();

    let power = result.point_power_by_name("cp1").unwrap();
    assert!(power[..10].iter().all(|p| *p == 0.0));
    // the closing hour itself is still open
    assert!(power[10..=18].iter().all(|p| *p > 0.0));
    assert!(power[19..].iter().all(|p| *p == 0.0));
}

#[test]
fn events_after_the_horizon_are_never_seen() {
    let car = vehicle(50.0, 11.0);
    let events = vec![event(0, 1, 2, 0.2, &car), event(1, 30, 2, 0.2, &car)];
    let s = scenario(hourly(24), wallbox_site(1, 11.0, None), PolicyKind::Uncontrolled, events);
    let result = Engine::new(s).unwrap().run().unwrap();
    assert_eq!(result.counter_arrivals, 1);
    assert_eq!(result.counter_rejections, 0);
}

#[test]
fn unsorted_events_are_admitted_by_arrival() {
    let car = vehicle(50.0, 11.0);
    let events = vec![event(0, 3, 2, 0.2, &car), event(1, 1, 1, 0.2, &car)];
    let s = scenario(hourly(6), wallbox_site(1, 11.0, None), PolicyKind::Uncontrolled, events);
    let result = Engine::new(s).unwrap().run().unwrap();
    assert_eq!(result.counter_connections, 2);
    assert_eq!(
        result.charging_periods.get(EventId(1)).map(|p| p.first_charged),
        Some(at(1))
    );
    assert_eq!(
        result.charging_periods.get(EventId(0)).map(|p| p.first_charged),
        Some(at(3))
    );
}

#[test]
fn closing_empties_the_waiting_queue() {
    let car = vehicle(50.0, 11.0);
    // event 1 waits behind event 0 and would still be parked after reopening
    let events = vec![event(0, 16, 6, 0.0, &car), event(1, 17, 20, 0.0, &car)];
    let s = scenario(hourly(34), wallbox_site(1, 11.0, None), PolicyKind::Uncontrolled, events)
        .with_queue_length(1)
        .with_opening_hours(OpeningHours::new(8.0, 18.0).unwrap());
    let result = Engine::new(s).unwrap().run().unwrap();

    assert_eq!(result.counter_arrivals, 2);
    assert_eq!(result.counter_rejections, 0);
    assert_eq!(result.counter_connections, 1);
    assert!(result.charging_periods.get(EventId(1)).is_none());

    let power = result.point_power_by_name("cp1").unwrap();
    assert!(power[16..=18].iter().all(|p| *p == 11.0));
    // open again from 08:00 on the second day, but nobody is left to connect
    assert!(power[19..].iter().all(|p| *p == 0.0));
    assert_eq!(result.busy_points()[33], 0);
}
