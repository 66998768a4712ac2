//! Widget lifecycle tests against the public Dashboard API
//!
//! Tests cover:
//! - Device switching leaves no listener on the old device
//! - Payloads in flight across a rebind are discarded
//! - Remove then re-add starts from empty jdata
//! - Layout changes and device removal keep bindings consistent
//! - Accessor last-value behavior across ticks

use lupulo_common::events::{BatteryBand, Frame, NoticeLevel};
use lupulo_dash::layout::{DeviceEnvelope, LayoutEnvelope};
use lupulo_dash::widget::WidgetState;
use lupulo_dash::Dashboard;
use serde_json::{json, Value};
use std::time::Duration;

fn envelope(value: Value) -> LayoutEnvelope {
    serde_json::from_value(value).unwrap()
}

fn devices(added: &[&str], removed: &[&str]) -> DeviceEnvelope {
    DeviceEnvelope {
        added: added.iter().map(|d| d.to_string()).collect(),
        removed: removed.iter().map(|d| d.to_string()).collect(),
    }
}

fn battery_layout() -> Value {
    json!({
        "type": "battery",
        "event_names": ["status"],
        "accessors": {"type": "dict", "event": "battery", "key": "level"}
    })
}

/// Test helper: dashboard with one battery widget bound to device 1
fn dashboard() -> Dashboard {
    let mut dash = Dashboard::with_builtins();
    dash.apply_layouts(envelope(json!({"added": {"gauge": battery_layout()}})));
    dash.apply_devices(devices(&["1", "2"], &[]));
    assert_eq!(dash.selected_device(), Some("1"));
    assert!(dash.is_consistent());
    dash
}

fn frame_of(dash: &Dashboard, name: &str) -> Frame {
    dash.widget(name).unwrap().frame().frame
}

// =============================================================================
// Rebinding
// =============================================================================

#[test]
fn test_switch_device_leaves_no_old_listeners() {
    let mut dash = dashboard();
    assert_eq!(dash.bridge().listener_count("id1-battery"), 1);
    assert_eq!(dash.bridge().listener_count("id1-status"), 1);

    dash.select_device("2").unwrap();

    assert_eq!(dash.bridge().listener_count("id1-battery"), 0);
    assert_eq!(dash.bridge().listener_count("id1-status"), 0);
    assert_eq!(dash.bridge().event_names(), vec!["id2-battery", "id2-status"]);
    assert!(dash.is_consistent());

    // Old device traffic reaches nobody
    assert_eq!(dash.ingest("id1-battery", &json!({"level": 90})), 0);
    assert!(dash.widget("gauge").unwrap().jdata().is_none());
}

#[test]
fn test_switch_device_recreates_widget() {
    let mut dash = dashboard();
    dash.ingest("id1-battery", &json!({"level": 90}));
    dash.tick(Duration::from_secs(1));
    let before = dash.widget("gauge").unwrap();
    let (old_id, old_generation) = (before.instance_id(), before.generation());
    assert!(matches!(frame_of(&dash, "gauge"), Frame::Battery { .. }));

    dash.select_device("2").unwrap();

    let after = dash.widget("gauge").unwrap();
    assert_ne!(after.instance_id(), old_id);
    assert!(after.generation() > old_generation);
    assert!(after.jdata().is_none());
    assert_eq!(after.device(), Some("2"));
    assert_eq!(frame_of(&dash, "gauge"), Frame::Blank);
}

#[test]
fn test_in_flight_delivery_rejected_after_rebind() {
    let mut dash = dashboard();

    // Dispatched while bound to device 1, applied after the switch
    let stale = dash.dispatch("id1-battery", &json!({"level": 10}));
    assert_eq!(stale.len(), 1);

    dash.select_device("2").unwrap();
    dash.select_device("1").unwrap();

    // Same physical name again, but a newer generation
    assert!(!dash.deliver(&stale[0]));
    assert!(dash.widget("gauge").unwrap().jdata().is_none());

    assert_eq!(dash.ingest("id1-battery", &json!({"level": 10})), 1);
    assert!(dash.widget("gauge").unwrap().jdata().is_some());
}

// =============================================================================
// Layout lifecycle
// =============================================================================

#[test]
fn test_remove_then_readd_starts_fresh() {
    let mut dash = dashboard();
    dash.ingest("id1-battery", &json!({"level": 75}));
    assert!(dash.widget("gauge").unwrap().jdata().is_some());

    let report = dash.apply_layouts(envelope(json!({"removed": ["gauge"]})));
    assert_eq!(report.removed, vec!["gauge"]);
    assert!(dash.widget("gauge").is_none());
    assert_eq!(dash.bridge().total_listeners(), 0);
    assert!(dash.is_consistent());

    let report = dash.apply_layouts(envelope(json!({"added": {"gauge": battery_layout()}})));
    assert_eq!(report.added, vec!["gauge"]);
    let widget = dash.widget("gauge").unwrap();
    assert!(widget.jdata().is_none());
    assert_eq!(widget.state(), WidgetState::Active);
    assert_eq!(widget.event_sources(), ["id1-battery", "id1-status"]);
    assert!(dash.is_consistent());
}

#[test]
fn test_remove_and_add_in_one_envelope() {
    let mut dash = dashboard();
    dash.ingest("id1-battery", &json!({"level": 75}));

    let report = dash.apply_layouts(envelope(json!({
        "removed": ["gauge"],
        "added": {"gauge": battery_layout()}
    })));
    assert_eq!(report.removed, vec!["gauge"]);
    assert_eq!(report.added, vec!["gauge"]);
    assert!(dash.widget("gauge").unwrap().jdata().is_none());
    assert!(dash.is_consistent());
}

#[test]
fn test_change_rebinds_to_new_sources() {
    let mut dash = dashboard();
    dash.ingest("id1-battery", &json!({"level": 75}));

    let report = dash.apply_layouts(envelope(json!({
        "changed": {"gauge": {
            "type": "digital",
            "accessors": {"type": "primitive", "event": "voltage"}
        }}
    })));
    assert_eq!(report.changed, vec!["gauge"]);

    let widget = dash.widget("gauge").unwrap();
    assert_eq!(widget.event_sources(), ["id1-voltage"]);
    assert!(widget.jdata().is_none());
    assert_eq!(dash.bridge().listener_count("id1-battery"), 0);
    assert!(dash.is_consistent());
}

#[test]
fn test_failed_change_keeps_existing_widget() {
    let mut dash = dashboard();
    let id = dash.widget("gauge").unwrap().instance_id();

    let report = dash.apply_layouts(envelope(json!({
        "changed": {"gauge": {"type": "battery"}}
    })));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(dash.widget("gauge").unwrap().instance_id(), id);
    assert!(dash.is_consistent());

    let notices = dash.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].widget.as_deref(), Some("gauge"));
}

#[test]
fn test_add_existing_name_is_change() {
    let mut dash = dashboard();
    let report = dash.apply_layouts(envelope(json!({"added": {"gauge": battery_layout()}})));
    assert!(report.added.is_empty());
    assert_eq!(report.changed, vec!["gauge"]);
}

// =============================================================================
// Devices
// =============================================================================

#[test]
fn test_selected_device_removed_selects_next() {
    let mut dash = dashboard();
    let update = dash.apply_devices(devices(&[], &["1"]));
    assert_eq!(update.selected.as_deref(), Some("2"));
    assert!(update.selection_changed);
    assert_eq!(dash.bridge().event_names(), vec!["id2-battery", "id2-status"]);
    assert!(dash.is_consistent());
}

#[test]
fn test_last_device_removed_unbinds_everything() {
    let mut dash = dashboard();
    dash.apply_devices(devices(&[], &["1", "2"]));
    assert_eq!(dash.selected_device(), None);
    assert_eq!(dash.bridge().total_listeners(), 0);

    let widget = dash.widget("gauge").unwrap();
    assert_eq!(widget.state(), WidgetState::Rebinding);
    assert!(widget.event_sources().is_empty());
    assert!(dash.is_consistent());

    dash.apply_devices(devices(&["5"], &[]));
    assert_eq!(dash.selected_device(), Some("5"));
    assert_eq!(dash.widget("gauge").unwrap().state(), WidgetState::Active);
}

// =============================================================================
// Painting
// =============================================================================

#[test]
fn test_tick_paints_only_widgets_with_data() {
    let mut dash = dashboard();
    dash.apply_layouts(envelope(json!({"added": {"idle": {
        "type": "digital",
        "accessors": {"type": "primitive", "event": "never"}
    }}})));

    dash.ingest("id1-battery", &json!({"level": 35}));
    let frames = dash.tick(Duration::from_secs(1));
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].name, "gauge");
    assert_eq!(
        frames[0].frame,
        Frame::Battery {
            level: 35.0,
            band: BatteryBand::Medium,
            color: "orange".to_string()
        }
    );
}

#[test]
fn test_missing_key_keeps_last_value_with_notice() {
    let mut dash = dashboard();
    dash.ingest("id1-battery", &json!({"level": 42}));
    dash.tick(Duration::from_secs(1));
    assert!(dash.take_notices().is_empty());

    dash.ingest("id1-battery", &json!({"voltage": 3.7}));
    dash.tick(Duration::from_secs(2));
    assert!(matches!(frame_of(&dash, "gauge"), Frame::Battery { level, .. } if level == 42.0));

    let notices = dash.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert!(notices[0].message.contains("key 'level' missing"));
}

#[test]
fn test_index_accessor_line_chart() {
    let mut dash = Dashboard::with_builtins();
    dash.apply_devices(devices(&["1"], &[]));
    dash.apply_layouts(envelope(json!({"added": {"temps": {
        "type": "multiple_line",
        "seconds": 10,
        "range": [0, 100],
        "accessors": {"type": "index", "event": "temp", "start": 0, "end": 3}
    }}})));

    dash.ingest("id1-temp", &json!([7, 8, 9]));
    dash.tick(Duration::from_secs(1));

    match frame_of(&dash, "temps") {
        Frame::MultipleLine { lines, .. } => {
            let ys: Vec<f64> = lines.iter().map(|l| l.points[0][1]).collect();
            assert_eq!(ys, vec![7.0, 8.0, 9.0]);
        }
        other => panic!("expected multiple_line frame, got {:?}", other),
    }
}

// =============================================================================
// Parameter bounds
// =============================================================================

#[test]
fn test_out_of_bound_layouts_fail_alone() {
    let mut dash = dashboard();
    let report = dash.apply_layouts(envelope(json!({"added": {
        "wide": {
            "type": "digital",
            "precision": u64::MAX,
            "accessors": {"type": "primitive", "event": "battery"}
        },
        "huge": {
            "type": "multiple_line",
            "seconds": 10,
            "range": [0, 1],
            "accessors": {"type": "index", "event": "temp", "start": 0, "end": 1u64 << 40}
        },
        "readout": {
            "type": "digital",
            "digits": 3,
            "accessors": {"type": "dict", "event": "battery", "key": "level"}
        }
    }})));

    assert_eq!(report.added, vec!["readout"]);
    let failed: Vec<&str> = report.failed.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["huge", "wide"]);
    assert!(dash.widget("wide").is_none());
    assert!(dash.widget("huge").is_none());
    assert!(dash.is_consistent());

    dash.ingest("id1-battery", &json!({"level": 7}));
    let frames = dash.tick(Duration::from_secs(1));
    assert_eq!(frames.len(), 2);
    assert_eq!(
        frame_of(&dash, "readout"),
        Frame::Digital {
            values: vec!["007".to_string()]
        }
    );
}
