mod common;

use common::{reply, FakeService, WAIT};
use futures::executor::block_on;
use mindlink::config::Credentials;
use mindlink::data::{Category, Event};
use mindlink::device::{HeadsetManager, SessionStatus, WorkflowError};
use serde_json::{json, Value};
use std::collections::HashMap;

const MET_COLS: [&str; 8] = [
    "eng.isActive",
    "eng",
    "exc.isActive",
    "exc",
    "str.isActive",
    "str",
    "foc.isActive",
    "foc",
];

fn credentials() -> Credentials {
    Credentials {
        client_id: "app-id".into(),
        client_secret: "app-secret".into(),
        license: None,
        debit: 2,
    }
}

/// Answers like a service with any number of headsets that connect on the
/// second status query.
fn service_handler(reject_stream: Option<&'static str>) -> common::Handler {
    let mut queries: HashMap<String, u32> = HashMap::new();
    Box::new(move |req| {
        let id = &req["id"];
        let params = &req["params"];
        let result = match req["method"].as_str()? {
            "requestAccess" => json!({"accessGranted": true, "message": "ok"}),
            "authorize" => json!({"cortexToken": "tok", "warning": {"code": 6}}),
            "controlDevice" => json!({"command": params["command"], "message": "ok"}),
            "queryHeadsets" => {
                let headset = params["id"].as_str().unwrap_or("EPOCX-1").to_string();
                let n = queries.entry(headset.clone()).or_default();
                *n += 1;
                let status = if *n > 1 { "connected" } else { "connecting" };
                json!([{"id": headset, "status": status, "connectedBy": "dongle"}])
            }
            "createSession" => {
                json!({"id": format!("sess-{}", params["headset"].as_str()?), "status": "activated"})
            }
            "subscribe" => {
                let session = params["session"].clone();
                let mut success = vec![];
                let mut failure = vec![];
                for stream in params["streams"].as_array()? {
                    if Some(stream.as_str()?) == reject_stream {
                        failure.push(json!({"streamName": stream, "code": -32016, "message": "Invalid stream"}));
                    } else if stream == "met" {
                        success.push(json!({"streamName": "met", "cols": MET_COLS, "sid": session}));
                    } else {
                        success.push(json!({"streamName": stream, "cols": [], "sid": session}));
                    }
                }
                json!({"success": success, "failure": failure})
            }
            "updateSession" => json!({"id": params["session"], "status": "closed"}),
            _ => return None,
        };
        Some(reply(id, result))
    })
}

fn method_requests(requests: &[Value], method: &str) -> Vec<Value> {
    requests
        .iter()
        .filter(|r| r["method"] == method)
        .cloned()
        .collect()
}

#[test]
fn open_registers_session_and_captures_schema() {
    let service = FakeService::start(service_handler(None));
    let manager = HeadsetManager::new(service.client.clone(), credentials());
    let metrics = service.bus.subscribe(&[Category::Metrics]);

    assert_eq!(block_on(manager.authorize()).unwrap(), "tok");
    let session = block_on(manager.open("EPOCX-1")).unwrap();
    assert_eq!(session, "sess-EPOCX-1");
    assert_eq!(service.registry.session("EPOCX-1").as_deref(), Some("sess-EPOCX-1"));
    assert_eq!(service.registry.status("EPOCX-1"), Some(SessionStatus::Ready));
    assert_eq!(
        service.client.metrics_schema().columns().map(|c| c.len()),
        Some(MET_COLS.len())
    );

    let requests = service.drain_requests();
    let auth = &method_requests(&requests, "authorize")[0];
    assert_eq!(auth["params"]["debit"], 2);
    assert!(auth["params"].get("license").is_none());
    let create = &method_requests(&requests, "createSession")[0];
    assert_eq!(create["params"]["cortexToken"], "tok");
    assert_eq!(create["params"]["status"], "active");
    let subscribe = &method_requests(&requests, "subscribe")[0];
    assert_eq!(subscribe["params"]["streams"], json!(["com", "mot", "met", "sys"]));

    service.send(json!({
        "met": [true, 0.4, false, 0.9, true, 0.2, true, 0.7],
        "sid": "sess-EPOCX-1",
        "time": 3.25
    }));
    match metrics.recv_timeout(WAIT).expect("metrics event") {
        Event::Metrics(m) => {
            assert_eq!(m.device, "EPOCX-1");
            assert_eq!(m.engagement, 0.4);
            assert_eq!(m.excitement, 0.0);
            assert_eq!(m.stress, 0.2);
            assert_eq!(m.focus, 0.7);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn rejected_stream_leaves_device_in_error() {
    let service = FakeService::start(service_handler(Some("mot")));
    let manager = HeadsetManager::new(service.client.clone(), credentials());
    let sessions = service.bus.subscribe(&[Category::Session]);

    block_on(manager.authorize()).unwrap();
    match block_on(manager.open("EPOCX-1")) {
        Err(WorkflowError::SubscriptionRejected { stream, message }) => {
            assert_eq!(stream, "mot");
            assert_eq!(message, "Invalid stream");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(service.registry.status("EPOCX-1"), Some(SessionStatus::Error));
    FakeService::wait_for(&sessions, |e| {
        matches!(e, Event::Session(s) if s.status == Some(SessionStatus::Error))
    });
}

#[test]
fn session_calls_need_authorization() {
    let service = FakeService::start(service_handler(None));
    let manager = HeadsetManager::new(service.client.clone(), credentials());
    assert!(matches!(
        block_on(manager.create_session("EPOCX-1")),
        Err(WorkflowError::NotAuthorized(_))
    ));
}

#[test]
fn denied_access_is_not_authorized() {
    let service = FakeService::start(Box::new(|req| {
        Some(reply(
            &req["id"],
            json!({"accessGranted": false, "message": "Approve the application first."}),
        ))
    }));
    let manager = HeadsetManager::new(service.client.clone(), credentials());
    match block_on(manager.authorize()) {
        Err(WorkflowError::NotAuthorized(message)) => {
            assert_eq!(message, "Approve the application first.")
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn disconnecting_one_headset_keeps_the_other_streaming() {
    let service = FakeService::start(service_handler(None));
    let manager = HeadsetManager::new(service.client.clone(), credentials());
    let sub = service.subscribe();

    block_on(manager.authorize()).unwrap();
    block_on(manager.open("EPOCX-1")).unwrap();
    block_on(manager.open("INSIGHT-2")).unwrap();
    block_on(manager.disconnect_headset("EPOCX-1"));

    assert_eq!(service.registry.devices(), vec!["INSIGHT-2".to_string()]);
    assert!(service.client.is_connected());
    let requests = service.drain_requests();
    let close = &method_requests(&requests, "updateSession")[0];
    assert_eq!(close["params"]["session"], "sess-EPOCX-1");
    assert_eq!(close["params"]["status"], "close");

    FakeService::wait_for(&sub, |e| {
        matches!(e, Event::Session(s) if s.device == "EPOCX-1" && s.status.is_none())
    });

    service.send(json!({"com": ["push", 0.6], "sid": "sess-EPOCX-1", "time": 1.0}));
    service.send(json!({"com": ["push", 0.8], "sid": "sess-INSIGHT-2", "time": 1.1}));
    let event = FakeService::wait_for(&sub, |e| matches!(e, Event::Command(_)));
    assert_eq!(event.device(), Some("INSIGHT-2"));
}
